//! # pagelift
//!
//! Resumable PDF-to-Markdown conversion using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Traditional PDF-to-text tools (pdftotext, pdf-extract) fail on complex
//! layouts: multi-column text, mathematical symbols, and tables come out
//! garbled or out of reading order. Instead this crate rasterises each page
//! into a PNG and lets a VLM read it as a human would. Because VLM calls are
//! slow, billed per call, and occasionally fail, every completed page is
//! checkpointed on disk so an interrupted job re-pays only for the pages it
//! has not finished.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       validate path and %PDF magic
//!  ├─ 2. Raster      render the page range via pdfium (CPU-bound, chunked
//!  │                 spawn_blocking workers)
//!  ├─ 3. Checkpoint  load per-page results from a previous interrupted run
//!  ├─ 4. Transcribe  bounded pool of VLM calls with retry/backoff; each
//!  │                 success checkpointed immediately
//!  └─ 5. Merge       non-empty pages in ascending order, blank-line
//!                    separated; checkpoints cleared on success
//! ```
//!
//! The first page that exhausts its retries aborts the run, but its
//! predecessors' checkpoints survive: re-running the same command resumes
//! where the job stopped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagelift::{convert, JobConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from PAGELIFT_API_KEY
//!     let config = JobConfig::builder().pages(1, Some(20)).build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!(
//!         "{} pages ({} from checkpoints)",
//!         output.stats.pages_in_range, output.stats.checkpointed_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagelift` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pagelift = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobConfig, JobConfigBuilder, DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL};
pub use convert::{convert, convert_to_file};
pub use error::{ConvertError, TranscribeError};
pub use output::{Conversion, JobStats};
pub use pipeline::transcribe::{ApiTranscriber, ScriptedTranscriber, Transcriber};
pub use progress::{NoopProgressSink, ProgressSink};
