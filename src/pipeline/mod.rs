//! Pipeline stages for resumable PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one stage. Keeping stages separate
//! makes each independently testable and lets us swap implementations
//! (e.g. a different rendering engine) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ raster ──▶ checkpoint(read) ──▶ transcribe ──▶ checkpoint(write)
//! (path)   (pdfium,    (skip done pages)   (bounded VLM    (per page, by the
//!           chunked)                        pool + retry)   coordinator)
//! ```
//!
//! 1. [`input`]      — validate the user-supplied path and `%PDF` magic
//! 2. [`raster`]     — rasterise the whole range to per-page PNGs; chunked
//!    `spawn_blocking` workers because pdfium is CPU-bound and not
//!    async-safe
//! 3. [`checkpoint`] — durable per-page results keyed by page number;
//!    what makes an interrupted job resumable
//! 4. [`transcribe`] — drive the VLM call with retry/backoff; the only
//!    stage with network I/O

pub mod checkpoint;
pub mod input;
pub mod raster;
pub mod transcribe;
