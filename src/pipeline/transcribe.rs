//! Transcription stage: one page image in, Markdown text out.
//!
//! The capability is a closed set of variants behind one interface,
//! selected at job construction time:
//!
//! * [`Transcriber::Api`] — an OpenAI-compatible chat-completions endpoint
//!   reached through a retrying `reqwest` client. The client is built once
//!   per job and passed explicitly, never held in module-level state.
//! * [`Transcriber::Scripted`] — canned page-keyed responses for tests and
//!   dry runs; also records the observed peak concurrency so tests can
//!   verify the fan-out bound.
//!
//! ## Retry strategy
//!
//! Each attempt produces a typed [`TranscribeError`]; the backoff loop
//! retries only variants whose `is_retryable()` is true (HTTP 429, 5xx,
//! transport timeouts) with an exponentially doubling delay. Client errors
//! and malformed responses propagate immediately — retrying will not fix
//! them. With a 1 s base and 5 retries the waits are 1 s → 2 s → 4 s →
//! 8 s → 16 s.
//!
//! The stage has no storage side effects: checkpointing a successful page
//! is the coordinator's job.

use crate::config::JobConfig;
use crate::error::{ConvertError, TranscribeError};
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// The transcription capability for one job.
pub enum Transcriber {
    /// OpenAI-compatible chat-completions endpoint.
    Api(ApiTranscriber),
    /// Canned responses keyed by page number.
    Scripted(ScriptedTranscriber),
}

impl Transcriber {
    /// Transcribe one page image. `page` is used for log attribution and
    /// by the scripted variant; the API variant sends only the image.
    pub async fn transcribe(&self, page: u32, image_png: &[u8]) -> Result<String, TranscribeError> {
        match self {
            Transcriber::Api(api) => api.transcribe(page, image_png).await,
            Transcriber::Scripted(scripted) => scripted.transcribe(page).await,
        }
    }
}

/// Stage entry point: load the page's rasterised image and invoke the
/// capability, trimming surrounding whitespace from the result.
pub async fn transcribe_page(
    transcriber: &Transcriber,
    page: u32,
    image_path: &Path,
) -> Result<String, TranscribeError> {
    let bytes = tokio::fs::read(image_path)
        .await
        .map_err(|_| TranscribeError::ImageUnavailable {
            path: image_path.to_path_buf(),
        })?;
    let text = transcriber.transcribe(page, &bytes).await?;
    Ok(text.trim().to_string())
}

// ── API transcriber ──────────────────────────────────────────────────────

/// Chat-completions transport with retry/backoff.
pub struct ApiTranscriber {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    system_prompt: String,
    user_prompt: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl ApiTranscriber {
    /// Build the per-job transport from the configuration.
    ///
    /// Fails with [`ConvertError::MissingApiKey`] when no key is available;
    /// this is checked at job construction, before any work is dispatched.
    pub fn from_config(config: &JobConfig) -> Result<Self, ConvertError> {
        let api_key = config.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            user_prompt: config
                .user_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_PROMPT.to_string()),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    async fn transcribe(&self, page: u32, image_png: &[u8]) -> Result<String, TranscribeError> {
        let body = request_body(
            &self.model,
            &self.system_prompt,
            &self.user_prompt,
            image_png,
        );

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "Page {}: retry {}/{} after {:?}",
                    page, attempt, self.max_retries, delay
                );
                sleep(delay).await;
            }

            match self.attempt(&body).await {
                Ok(text) => {
                    debug!("Page {}: transcribed ({} chars)", page, text.len());
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Page {}: attempt {} failed — {}", page, attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(TranscribeError::EmptyResponse))
    }

    /// One request/response cycle, classified into the typed outcome.
    async fn attempt(&self, body: &serde_json::Value) -> Result<String, TranscribeError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(TranscribeError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(TranscribeError::ServerError {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(TranscribeError::Rejected {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        text_from_response(&body)
    }
}

/// Build the chat-completions request: a system text message plus a user
/// message carrying the page PNG as a base64 data-URI and the user prompt.
fn request_body(
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
    image_png: &[u8],
) -> serde_json::Value {
    let image_url = format!("data:image/png;base64,{}", STANDARD.encode(image_png));
    serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": [{"type": "text", "text": system_prompt}]
            },
            {
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": image_url}},
                    {"type": "text", "text": user_prompt}
                ]
            }
        ],
        "stream": false
    })
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Extract the transcription text from a 200 response body.
fn text_from_response(body: &str) -> Result<String, TranscribeError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| TranscribeError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or(TranscribeError::EmptyResponse)
}

/// Exponential backoff: `base * 2^(attempt-1)` for attempt ≥ 1.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1u64 << (attempt - 1).min(16)))
}

// ── Scripted transcriber ─────────────────────────────────────────────────

/// Page-keyed canned responses with optional per-call delay.
///
/// Records every dispatched page and the peak number of simultaneously
/// in-flight calls, so tests can assert the fan-out bound and that
/// checkpointed pages were never dispatched.
#[derive(Default)]
pub struct ScriptedTranscriber {
    responses: HashMap<u32, Result<String, String>>,
    delay: Duration,
    calls: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful transcription for `page`.
    pub fn respond(mut self, page: u32, text: impl Into<String>) -> Self {
        self.responses.insert(page, Ok(text.into()));
        self
    }

    /// Script a fatal failure for `page`.
    pub fn fail(mut self, page: u32, detail: impl Into<String>) -> Self {
        self.responses.insert(page, Err(detail.into()));
        self
    }

    /// Hold every call for `delay` before resolving, so calls overlap and
    /// the peak-concurrency counter is meaningful.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Pages dispatched so far, in call order.
    pub fn dispatched(&self) -> Vec<u32> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn transcribe(&self, page: u32) -> Result<String, TranscribeError> {
        self.calls.lock().expect("calls lock").push(page);
        let _guard = InFlightGuard::enter(&self.in_flight, &self.peak);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        match self.responses.get(&page) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(detail)) => Err(TranscribeError::Scripted(detail.clone())),
            None => Err(TranscribeError::Scripted(format!(
                "no scripted response for page {page}"
            ))),
        }
    }
}

/// Decrements the in-flight counter on drop, so cancelled calls are
/// accounted for too.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_layout() {
        let body = request_body("gpt-4o-mini", "sys", "user", b"png-bytes");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"][0]["text"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        let url = body["messages"][1]["content"][0]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(body["messages"][1]["content"][1]["text"], "user");
    }

    #[test]
    fn response_text_extraction() {
        let body = r##"{"choices":[{"message":{"content":"# Hello"}}]}"##;
        assert_eq!(text_from_response(body).unwrap(), "# Hello");
    }

    #[test]
    fn empty_choices_is_fatal() {
        let err = text_from_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, TranscribeError::EmptyResponse));
        assert!(!err.is_retryable());
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = text_from_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, TranscribeError::MalformedResponse(_)));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(500, 4), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn scripted_resolves_and_records() {
        let scripted = ScriptedTranscriber::new()
            .respond(1, "P1")
            .fail(2, "injected failure");
        assert_eq!(scripted.transcribe(1).await.unwrap(), "P1");
        let err = scripted.transcribe(2).await.unwrap_err();
        assert!(matches!(err, TranscribeError::Scripted(_)));
        let err = scripted.transcribe(3).await.unwrap_err();
        assert!(err.to_string().contains("page 3"));
        assert_eq!(scripted.dispatched(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn transcribe_page_trims_and_reads_image() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("1.png");
        std::fs::write(&image, b"fake-png").unwrap();
        let t = Transcriber::Scripted(ScriptedTranscriber::new().respond(1, "  text with space \n"));
        assert_eq!(transcribe_page(&t, 1, &image).await.unwrap(), "text with space");
    }

    #[tokio::test]
    async fn transcribe_page_missing_image_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let t = Transcriber::Scripted(ScriptedTranscriber::new().respond(1, "P1"));
        let err = transcribe_page(&t, 1, &tmp.path().join("1.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::ImageUnavailable { .. }));
        assert!(!err.is_retryable());
    }
}
