//! Per-document working directory layout.
//!
//! Each document gets a job-scoped directory under the work root, keyed by
//! its file stem:
//!
//! ```text
//! <work_root>/<stem>/images/<page>.png        rasterised pages
//! <work_root>/<stem>/checkpoints/<page>.md    per-page transcription results
//! ```
//!
//! Both subdirectories are partitioned by page number, so concurrent
//! workers never touch the same file and no locking is needed beyond the
//! filesystem's atomic per-file operations. The whole job directory is
//! removed (best-effort) once the merged artifact is durably saved.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};

/// Resolved working directories for one document's job.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    job_dir: PathBuf,
    image_dir: PathBuf,
    checkpoint_dir: PathBuf,
}

impl JobWorkspace {
    /// Create (or reuse) the workspace for `doc_stem` under `work_root`.
    ///
    /// Reuse matters: a resumed run must land in the same directories as
    /// the interrupted one to find its checkpoints.
    pub fn create(work_root: &Path, doc_stem: &str) -> Result<Self, ConvertError> {
        let job_dir = work_root.join(doc_stem);
        let image_dir = job_dir.join("images");
        let checkpoint_dir = job_dir.join("checkpoints");
        for dir in [&image_dir, &checkpoint_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ConvertError::WorkspaceFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(Self {
            job_dir,
            image_dir,
            checkpoint_dir,
        })
    }

    /// Directory holding one PNG per rasterised page.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Directory holding one checkpoint file per transcribed page.
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Path of the rasterised image for `page` (1-indexed).
    pub fn page_image(&self, page: u32) -> PathBuf {
        self.image_dir.join(format!("{page}.png"))
    }

    /// Remove the whole job directory. Idempotent; an absent directory is
    /// not an error.
    pub fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.job_dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Default work root: `$PAGELIFT_WORK_DIR`, else `<tmp>/pagelift`.
///
/// The directory must survive process restarts within one machine session
/// so an interrupted job can resume from its checkpoints.
pub fn default_work_root() -> PathBuf {
    match std::env::var_os("PAGELIFT_WORK_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir().join("pagelift"),
    }
}

/// The document's file stem, used to key its job directory and to name the
/// final artifact (`<stem>.md`).
pub fn doc_stem(pdf_path: &Path) -> String {
    pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_keyed_by_stem_and_page() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), "report").unwrap();
        assert!(ws.image_dir().ends_with("report/images"));
        assert!(ws.checkpoint_dir().ends_with("report/checkpoints"));
        assert!(ws.page_image(7).ends_with("report/images/7.png"));
        assert!(ws.image_dir().is_dir());
        assert!(ws.checkpoint_dir().is_dir());
    }

    #[test]
    fn create_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        JobWorkspace::create(root.path(), "doc").unwrap();
        JobWorkspace::create(root.path(), "doc").unwrap();
    }

    #[test]
    fn remove_tolerates_absent_dir() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), "doc").unwrap();
        ws.remove().unwrap();
        ws.remove().unwrap();
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(doc_stem(Path::new("/data/paper.pdf")), "paper");
        assert_eq!(doc_stem(Path::new("archive.tar.pdf")), "archive.tar");
    }
}
