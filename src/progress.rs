//! Progress-event trait for per-page pipeline events.
//!
//! Inject an `Arc<dyn ProgressSink>` via
//! [`crate::config::JobConfigBuilder::progress`] to receive events as pages
//! are restored from checkpoints or transcribed. The callback approach keeps
//! the library free of any opinion about how the host communicates: the CLI
//! forwards events to an indicatif bar, a server might forward them to a
//! WebSocket.
//!
//! Pages are transcribed concurrently, so `on_page_transcribed` may be
//! called from different tasks at the same time; implementations must guard
//! shared mutable state (`Mutex`, atomics).

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProgressSink: Send + Sync {
    /// Called once after range validation, before any work is dispatched.
    ///
    /// `pages_in_range` is the number of pages selected, `from_checkpoint`
    /// how many of those were restored from a prior run.
    fn on_job_start(&self, pages_in_range: usize, from_checkpoint: usize) {
        let _ = (pages_in_range, from_checkpoint);
    }

    /// Called when a page is filled from an existing checkpoint (a skip).
    fn on_page_skipped(&self, page: u32) {
        let _ = page;
    }

    /// Called when a page's transcription succeeds and its checkpoint is
    /// written.
    fn on_page_transcribed(&self, page: u32, chars: usize) {
        let _ = (page, chars);
    }

    /// Called once after the merged artifact is assembled.
    fn on_job_complete(&self, pages_in_range: usize) {
        let _ = pages_in_range;
    }
}

/// A no-op sink for callers that don't need progress events.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        skipped: AtomicUsize,
        transcribed: AtomicUsize,
    }

    impl ProgressSink for Counting {
        fn on_page_skipped(&self, _page: u32) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_transcribed(&self, _page: u32, _chars: usize) {
            self.transcribed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_sink_does_not_panic() {
        let s = NoopProgressSink;
        s.on_job_start(3, 1);
        s.on_page_skipped(2);
        s.on_page_transcribed(1, 42);
        s.on_job_complete(3);
    }

    #[test]
    fn counting_sink_receives_events() {
        let counting = Arc::new(Counting {
            skipped: AtomicUsize::new(0),
            transcribed: AtomicUsize::new(0),
        });
        let sink: Arc<dyn ProgressSink> = counting.clone();
        sink.on_page_skipped(2);
        sink.on_page_transcribed(1, 10);
        sink.on_page_transcribed(3, 20);
        assert_eq!(counting.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(counting.transcribed.load(Ordering::SeqCst), 2);
    }
}
