//! Default prompts for VLM-based page transcription.
//!
//! Centralising the prompts here keeps the transport module focused on
//! retries and wire format, and lets unit tests inspect the strings without
//! touching a real endpoint. Callers can override both via
//! [`crate::config::JobConfigBuilder::system_prompt`] and
//! [`crate::config::JobConfigBuilder::user_prompt`].

/// Default system prompt used when `JobConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert document transcriber. Convert the supplied page image to clean, well-structured Markdown.

Rules:
1. Preserve ALL text content completely and accurately, in reading order.
2. Use # / ## / ### headings matching the visual hierarchy; - for unordered
   lists and 1. 2. 3. for ordered lists.
3. Convert tables to GFM pipe format.
4. Wrap code in fenced blocks; render formulas as LaTeX ($inline$, $$display$$).
5. Ignore page numbers and repeated running headers/footers.
6. Output ONLY the Markdown content — no commentary, no outer code fence."#;

/// Default user prompt sent alongside each page image.
pub const DEFAULT_USER_PROMPT: &str =
    "Transcribe this page to Markdown following the rules above.";
