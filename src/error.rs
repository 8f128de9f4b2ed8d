//! Error types for the pagelift library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`ConvertError`] — **Fatal** for the current job: the conversion cannot
//!   proceed (bad input, invalid page range, rasterisation failure, a page
//!   that exhausted its retries). Returned as `Err(ConvertError)` from the
//!   top-level `convert*` functions.
//!
//! * [`TranscribeError`] — the typed outcome of one transcription attempt.
//!   The transport's backoff loop consumes it directly: retryable variants
//!   (rate limiting, server-side transient failures, timeouts) are retried
//!   with exponential backoff, everything else propagates immediately and
//!   surfaces as [`ConvertError::TranscriptionFailed`].
//!
//! A failed page aborts the whole job (fail-fast), but checkpoints already
//! written for other pages stay on disk, so a re-run of the same range only
//! re-pays the missing pages.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagelift library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Range errors ──────────────────────────────────────────────────────
    /// The requested page range is malformed or outside the document.
    ///
    /// Never retried: the caller asked for pages that do not exist, and no
    /// rasterisation or transcription work is dispatched.
    #[error("Invalid page range {start}-{end} (document has {total} pages)")]
    InvalidRange { start: u32, end: u32, total: u32 },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The rasterisation engine could not produce images for the range.
    ///
    /// Fatal for the current job: there is no per-chunk resume at this
    /// stage, so a re-run rasterises the whole range again.
    #[error("Rasterisation failed for pages {start}-{end}: {detail}")]
    RasterizationFailed { start: u32, end: u32, detail: String },

    /// A single page's transcription exhausted its retries or returned an
    /// unusable result. Aborts the job; checkpoints for other pages remain.
    #[error("Transcription failed for page {page}")]
    TranscriptionFailed {
        page: u32,
        #[source]
        source: TranscribeError,
    },

    // ── Configuration errors ──────────────────────────────────────────────
    /// No API key was configured and the named environment variable is unset.
    #[error("No API key found: set {var} or provide one via JobConfig::builder().api_key(..)")]
    MissingApiKey { var: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not persist a page checkpoint after a successful transcription.
    #[error("Failed to write checkpoint for page {page}: {source}")]
    CheckpointWriteFailed {
        page: u32,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the job's working directories.
    #[error("Failed to prepare working directory '{path}': {source}")]
    WorkspaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of a single transcription attempt.
///
/// The transport's backoff loop matches on [`TranscribeError::is_retryable`]
/// rather than re-raising and catching: rate limiting and server-side
/// transient failures are retried with a bounded attempt counter, all other
/// variants are final for the page.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// HTTP 429 from the endpoint — back off and retry.
    #[error("rate limited by transcription endpoint (retry-after: {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 5xx — transient server-side failure, safe to retry.
    #[error("transcription endpoint returned HTTP {status}: {detail}")]
    ServerError { status: u16, detail: String },

    /// Request never completed (connect failure, timeout, broken stream).
    #[error("transcription request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other non-2xx status — a client error retrying will not fix.
    #[error("transcription endpoint rejected the request (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// 200 OK but the response carried no choices.
    #[error("transcription endpoint returned an empty result set")]
    EmptyResponse,

    /// 200 OK but the body did not parse as a chat-completions response.
    #[error("malformed transcription response: {0}")]
    MalformedResponse(String),

    /// The page's rasterised image is missing from the shared image
    /// directory — the rasterisation stage never produced it.
    #[error("page image not found at '{path}'")]
    ImageUnavailable { path: PathBuf },

    /// Failure injected by a scripted transcriber (tests, dry runs).
    #[error("{0}")]
    Scripted(String),
}

impl TranscribeError {
    /// Whether the backoff loop should try this page again.
    ///
    /// Only rate limiting, server-side 5xx responses, and transport-level
    /// timeouts/connect failures qualify — these are idempotent-safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranscribeError::RateLimited { .. } | TranscribeError::ServerError { .. } => true,
            TranscribeError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
