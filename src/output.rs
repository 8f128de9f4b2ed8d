//! Output types returned by the conversion entry points.

use serde::{Deserialize, Serialize};

/// The result of a successful conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    /// The merged Markdown artifact: every page in the requested range, in
    /// ascending page order, separated by a blank line.
    pub markdown: String,

    /// Per-job statistics.
    pub stats: JobStats,
}

/// Statistics for one conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStats {
    /// Total pages in the source document.
    pub total_pages: u32,

    /// Pages in the requested range (`end - start + 1`).
    pub pages_in_range: u32,

    /// Pages transcribed in this run.
    pub transcribed_pages: u32,

    /// Pages restored from checkpoints written by a prior run.
    pub checkpointed_pages: u32,

    /// Wall-clock time spent rasterising, in milliseconds.
    pub raster_duration_ms: u64,

    /// Wall-clock time spent in the transcription fan-out, in milliseconds.
    pub transcribe_duration_ms: u64,

    /// Total job wall-clock time, in milliseconds.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialise_round_trip() {
        let stats = JobStats {
            total_pages: 12,
            pages_in_range: 3,
            transcribed_pages: 2,
            checkpointed_pages: 1,
            raster_duration_ms: 40,
            transcribe_duration_ms: 900,
            total_duration_ms: 960,
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: JobStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pages_in_range, 3);
        assert_eq!(back.checkpointed_pages, 1);
    }
}
