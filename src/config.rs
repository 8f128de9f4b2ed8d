//! Configuration types for a conversion job.
//!
//! All job behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across tasks, log them, and diff two runs to understand why
//! their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::ConvertError;
use crate::pipeline::transcribe::Transcriber;
use crate::progress::ProgressSink;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable consulted for the API key when
/// [`JobConfig::api_key`] is not set explicitly.
pub const DEFAULT_API_KEY_ENV: &str = "PAGELIFT_API_KEY";

/// Default OpenAI-compatible chat-completions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Configuration for one PDF-to-Markdown job.
///
/// Built via [`JobConfig::builder()`] or [`JobConfig::default()`].
///
/// # Example
/// ```rust
/// use pagelift::JobConfig;
///
/// let config = JobConfig::builder()
///     .pages(3, Some(15))
///     .concurrency(2)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct JobConfig {
    /// First page to convert (1-indexed, inclusive). Default: 1.
    pub start: u32,

    /// Last page to convert (1-indexed, inclusive). `None` means the last
    /// page of the document. Default: `None`.
    pub end: Option<u32>,

    /// Model identifier sent to the transcription endpoint.
    pub model: String,

    /// Explicit API key. Takes precedence over [`JobConfig::api_key_env`].
    pub api_key: Option<String>,

    /// Environment variable read for the API key when `api_key` is `None`.
    /// Default: [`DEFAULT_API_KEY_ENV`].
    pub api_key_env: String,

    /// Chat-completions endpoint URL. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Number of simultaneously in-flight transcription calls. Default: 2.
    ///
    /// Transcription is bound by the endpoint's rate limit, not local
    /// compute. A small pool keeps throughput steady without tripping 429s;
    /// oversubscribing only increases throttling, not speed.
    pub concurrency: usize,

    /// Pages per rasterisation chunk. Default: 5.
    ///
    /// One engine invocation per chunk amortises document-open cost.
    /// Chunking is a throughput detail only: later stages address images
    /// strictly by page number and never see chunk boundaries.
    pub chunk_size: u32,

    /// Maximum retry attempts per page on a retryable transcription
    /// failure. Default: 5.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubling per attempt.
    /// Default: 1000 (1 s → 2 s → 4 s → 8 s → 16 s).
    ///
    /// Exponential backoff avoids the thundering-herd problem where every
    /// pool worker retries simultaneously against a recovering endpoint.
    pub retry_backoff_ms: u64,

    /// Per-transcription-call timeout in seconds. Default: 300.
    ///
    /// Generously long: dense pages can take a vision model minutes to
    /// transcribe, and an early timeout wastes the tokens already spent.
    pub api_timeout_secs: u64,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Default: 2000. Caps memory per page regardless of physical size.
    pub max_rendered_pixels: u32,

    /// Root directory for per-document working state (page images and
    /// checkpoints). `None` uses [`crate::workspace::default_work_root`].
    pub work_root: Option<PathBuf>,

    /// Custom system prompt. `None` uses the built-in default.
    pub system_prompt: Option<String>,

    /// Custom user prompt sent alongside each page image.
    pub user_prompt: Option<String>,

    /// Pre-constructed transcription capability. When set, the coordinator
    /// uses it as-is instead of building an API transcriber from the key,
    /// model, and base URL above. This is the substitution seam for tests.
    pub transcriber: Option<Arc<Transcriber>>,

    /// Progress event sink. `None` means no progress events.
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 2,
            chunk_size: 5,
            max_retries: 5,
            retry_backoff_ms: 1000,
            api_timeout_secs: 300,
            max_rendered_pixels: 2000,
            work_root: None,
            system_prompt: None,
            user_prompt: None,
            transcriber: None,
            progress: None,
        }
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("concurrency", &self.concurrency)
            .field("chunk_size", &self.chunk_size)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("work_root", &self.work_root)
            .field("transcriber", &self.transcriber.as_ref().map(|_| "<Transcriber>"))
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ProgressSink>"))
            .finish()
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API key: explicit value first, then the configured
    /// environment variable.
    pub fn resolve_api_key(&self) -> Result<String, ConvertError> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ConvertError::MissingApiKey {
                var: self.api_key_env.clone(),
            }),
        }
    }
}

/// Builder for [`JobConfig`].
#[derive(Debug)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    /// Inclusive page range; `end = None` means the document's last page.
    pub fn pages(mut self, start: u32, end: Option<u32>) -> Self {
        self.config.start = start;
        self.config.end = end;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn chunk_size(mut self, pages: u32) -> Self {
        self.config.chunk_size = pages.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.work_root = Some(root.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.user_prompt = Some(prompt.into());
        self
    }

    pub fn transcriber(mut self, t: Arc<Transcriber>) -> Self {
        self.config.transcriber = Some(t);
        self
    }

    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.config.progress = Some(sink);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, ConvertError> {
        let c = &self.config;
        if c.start < 1 {
            return Err(ConvertError::InvalidConfig(
                "Start page must be ≥ 1 (pages are 1-indexed)".into(),
            ));
        }
        if let Some(end) = c.end {
            if end < c.start {
                return Err(ConvertError::InvalidConfig(format!(
                    "End page {} is before start page {}",
                    end, c.start
                )));
            }
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.chunk_size == 0 {
            return Err(ConvertError::InvalidConfig("Chunk size must be ≥ 1".into()));
        }
        if c.model.is_empty() {
            return Err(ConvertError::InvalidConfig("Model must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_rate_limit_friendly() {
        let c = JobConfig::default();
        assert_eq!(c.start, 1);
        assert_eq!(c.end, None);
        assert_eq!(c.concurrency, 2);
        assert_eq!(c.chunk_size, 5);
        assert_eq!(c.max_retries, 5);
        assert_eq!(c.retry_backoff_ms, 1000);
        assert_eq!(c.api_timeout_secs, 300);
    }

    #[test]
    fn builder_rejects_inverted_range() {
        let err = JobConfig::builder().pages(5, Some(2)).build().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_start() {
        let err = JobConfig::builder().pages(0, None).build().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn concurrency_setter_clamps_to_one() {
        let c = JobConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn resolve_api_key_prefers_explicit() {
        let c = JobConfig::builder()
            .api_key("sk-test")
            .api_key_env("PAGELIFT_TEST_KEY_THAT_IS_UNSET")
            .build()
            .unwrap();
        assert_eq!(c.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn resolve_api_key_missing_is_config_error() {
        let c = JobConfig::builder()
            .api_key_env("PAGELIFT_TEST_KEY_THAT_IS_UNSET")
            .build()
            .unwrap();
        assert!(matches!(
            c.resolve_api_key().unwrap_err(),
            ConvertError::MissingApiKey { .. }
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = JobConfig::builder().api_key("sk-secret").build().unwrap();
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
