//! Checkpoint store: durable per-page transcription results.
//!
//! One file per page (`<page>.md`) under the job's checkpoint directory.
//! Each entry is an independent unit keyed by page number, so concurrent
//! writes for *different* pages never contend and no locking is required.
//! A write uses temp-file + rename so a crash mid-write can never leave a
//! corrupted or partial checkpoint behind — the entry either exists with
//! its full content or not at all.
//!
//! The store is read once at job start to seed already-known pages, written
//! once per page immediately after that page's transcription succeeds, and
//! cleared wholesale only after the merged artifact has been durably saved.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed store of per-page transcription results.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Fetch the checkpoint for `page`. An absent entry is `Ok(None)`,
    /// never an error.
    pub fn get(&self, page: u32) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.entry_path(page)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist the checkpoint for `page`, overwriting any previous entry.
    ///
    /// Atomic: the content lands in a temp file first and is renamed into
    /// place, so readers (and crashed runs) never observe a partial entry.
    pub fn put(&self, page: u32, text: &str) -> io::Result<()> {
        let path = self.entry_path(page);
        let tmp = self.dir.join(format!("{page}.md.tmp"));
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;
        debug!("checkpointed page {} ({} bytes)", page, text.len());
        Ok(())
    }

    /// Load every existing checkpoint for the inclusive page range.
    /// Missing pages are simply absent from the map.
    pub fn load_range(&self, start: u32, end: u32) -> io::Result<BTreeMap<u32, String>> {
        let mut found = BTreeMap::new();
        for page in start..=end {
            if let Some(text) = self.get(page)? {
                found.insert(page, text);
            }
        }
        Ok(found)
    }

    /// Remove every checkpoint entry and the store's directory itself.
    ///
    /// Idempotent and safe on a partially-populated or already-cleared
    /// store.
    pub fn clear_all(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn entry_path(&self, page: u32) -> PathBuf {
        self.dir.join(format!("{page}.md"))
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
