//! Pipeline coordinator: the full-document conversion entry points.
//!
//! ## Control flow
//!
//! validate range → rasterise the whole range (blocking batch) → load
//! checkpoints → fan out transcription for missing pages under the bounded
//! pool → checkpoint each success → merge in page order → persist → clear
//! checkpoints.
//!
//! ## Failure policy
//!
//! The first failed page job aborts the run: the coordinator returns
//! [`ConvertError::TranscriptionFailed`] citing that page, writes no merged
//! artifact, and leaves checkpoints for pages that already completed on
//! disk. Dropping the fan-out stream cancels jobs still in flight; because
//! only the coordinator writes checkpoints — after a page's success — a
//! cancelled job can never leave a partial checkpoint. A re-run of the same
//! range skips the checkpointed pages and redoes the rest.

use crate::config::JobConfig;
use crate::error::ConvertError;
use crate::output::{Conversion, JobStats};
use crate::pipeline::checkpoint::CheckpointStore;
use crate::pipeline::transcribe::{transcribe_page, ApiTranscriber, Transcriber};
use crate::pipeline::{input, raster};
use crate::progress::ProgressSink;
use crate::workspace::{default_work_root, doc_stem, JobWorkspace};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Convert a PDF to Markdown, resuming from any checkpoints left by a
/// previous interrupted run of the same range.
///
/// This is the primary library entry point. The merged artifact is
/// returned in memory; the job's checkpoints and page images are cleared
/// once the merge succeeds. Use [`convert_to_file`] to also persist the
/// artifact.
///
/// # Errors
/// - [`ConvertError::InvalidRange`] — the requested pages are outside the
///   document; nothing is dispatched.
/// - [`ConvertError::RasterizationFailed`] — the engine could not produce
///   images for the range.
/// - [`ConvertError::TranscriptionFailed`] — a page exhausted its retries;
///   checkpoints for other completed pages remain for the next attempt.
pub async fn convert(
    pdf_path: impl AsRef<Path>,
    config: &JobConfig,
) -> Result<Conversion, ConvertError> {
    let (conversion, store, workspace) = run_pipeline(pdf_path.as_ref(), config).await?;
    cleanup(&store, &workspace);
    Ok(conversion)
}

/// Convert a PDF and write `<stem>.md` into `output_dir`.
///
/// The artifact is written atomically (temp file + rename) so an
/// interrupted write never leaves a partial file. Checkpoints are cleared
/// only after the artifact is durably saved.
pub async fn convert_to_file(
    pdf_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &JobConfig,
) -> Result<(PathBuf, JobStats), ConvertError> {
    let pdf_path = pdf_path.as_ref();
    let (conversion, store, workspace) = run_pipeline(pdf_path, config).await?;

    let output_dir = output_dir.as_ref();
    let out_path = output_dir.join(format!("{}.md", doc_stem(pdf_path)));
    let write_err = |source: std::io::Error| ConvertError::OutputWriteFailed {
        path: out_path.clone(),
        source,
    };

    tokio::fs::create_dir_all(output_dir).await.map_err(write_err)?;
    let tmp_path = out_path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &conversion.markdown)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &out_path)
        .await
        .map_err(write_err)?;

    cleanup(&store, &workspace);
    info!("Saved merged artifact to {}", out_path.display());
    Ok((out_path, conversion.stats))
}

// ── Internal pipeline ────────────────────────────────────────────────────

async fn run_pipeline(
    pdf_path: &Path,
    config: &JobConfig,
) -> Result<(Conversion, CheckpointStore, JobWorkspace), ConvertError> {
    let total_start = Instant::now();
    let pdf_path = input::resolve_local(pdf_path)?;
    info!("Starting conversion: {}", pdf_path.display());

    // Configuration errors (missing key) surface before any work is done.
    let transcriber = resolve_transcriber(config)?;

    let total_pages = raster::page_count(&pdf_path).await?;
    let (start, end) = validate_range(config.start, config.end, total_pages)?;
    info!(
        "PDF has {} pages; converting {}-{}",
        total_pages, start, end
    );

    let work_root = config
        .work_root
        .clone()
        .unwrap_or_else(default_work_root);
    let workspace = JobWorkspace::create(&work_root, &doc_stem(&pdf_path))?;
    let store = CheckpointStore::open(workspace.checkpoint_dir()).map_err(|e| {
        ConvertError::WorkspaceFailed {
            path: workspace.checkpoint_dir().to_path_buf(),
            source: e,
        }
    })?;

    // Rasterise the whole range up front, even for checkpointed pages:
    // the batch is cheap relative to transcription and keeps the two
    // stages strictly sequenced with nothing to coordinate between them.
    let raster_start = Instant::now();
    raster::rasterize_range(&pdf_path, start, end, config, workspace.image_dir()).await?;
    let raster_duration_ms = raster_start.elapsed().as_millis() as u64;

    let transcribe_start = Instant::now();
    let (slots, restored) = transcribe_range(
        &transcriber,
        &workspace,
        &store,
        start,
        end,
        config.concurrency,
        config.progress.as_deref(),
    )
    .await?;
    let transcribe_duration_ms = transcribe_start.elapsed().as_millis() as u64;

    let pages_in_range = end - start + 1;
    let checkpointed_pages = restored as u32;
    let markdown = merge_pages(&slots);
    if let Some(progress) = config.progress.as_deref() {
        progress.on_job_complete(pages_in_range as usize);
    }

    let stats = JobStats {
        total_pages,
        pages_in_range,
        transcribed_pages: pages_in_range - checkpointed_pages,
        checkpointed_pages,
        raster_duration_ms,
        transcribe_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} pages ({} from checkpoints) in {}ms",
        stats.pages_in_range, stats.checkpointed_pages, stats.total_duration_ms
    );

    Ok((Conversion { markdown, stats }, store, workspace))
}

/// Resolve the requested range against the document's page count.
///
/// `end = None` means the document's last page.
pub(crate) fn validate_range(
    start: u32,
    end: Option<u32>,
    total_pages: u32,
) -> Result<(u32, u32), ConvertError> {
    let end = end.unwrap_or(total_pages);
    if start < 1 || start > end || end > total_pages {
        return Err(ConvertError::InvalidRange {
            start,
            end,
            total: total_pages,
        });
    }
    Ok((start, end))
}

/// Fill the page-indexed result vector: checkpoint hits directly, the rest
/// through the bounded transcription pool. Returns the slots plus how many
/// pages were restored from checkpoints.
///
/// Checkpoints are written here, by the coordinator, immediately after a
/// page succeeds. The transcription stage itself has no storage side
/// effects. The first failure aborts; dropping the stream cancels the
/// jobs still in flight.
async fn transcribe_range(
    transcriber: &Transcriber,
    workspace: &JobWorkspace,
    store: &CheckpointStore,
    start: u32,
    end: u32,
    concurrency: usize,
    progress: Option<&dyn ProgressSink>,
) -> Result<(Vec<Option<String>>, usize), ConvertError> {
    let pages_in_range = (end - start + 1) as usize;
    let mut slots: Vec<Option<String>> = vec![None; pages_in_range];

    let cached = store
        .load_range(start, end)
        .map_err(|e| ConvertError::WorkspaceFailed {
            path: store.dir().to_path_buf(),
            source: e,
        })?;
    if let Some(p) = progress {
        p.on_job_start(pages_in_range, cached.len());
    }
    for (&page, text) in &cached {
        slots[(page - start) as usize] = Some(text.clone());
        info!("page {} restored from checkpoint", page);
        if let Some(p) = progress {
            p.on_page_skipped(page);
        }
    }

    let missing: Vec<u32> = (start..=end)
        .filter(|page| !cached.contains_key(page))
        .collect();
    info!(
        "{} pages to transcribe, {} restored from checkpoints",
        missing.len(),
        cached.len()
    );

    let mut outcomes = stream::iter(missing.into_iter().map(|page| {
        let image = workspace.page_image(page);
        async move { (page, transcribe_page(transcriber, page, &image).await) }
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some((page, outcome)) = outcomes.next().await {
        match outcome {
            Ok(text) => {
                store
                    .put(page, &text)
                    .map_err(|e| ConvertError::CheckpointWriteFailed { page, source: e })?;
                if let Some(p) = progress {
                    p.on_page_transcribed(page, text.len());
                }
                slots[(page - start) as usize] = Some(text);
            }
            Err(source) => {
                return Err(ConvertError::TranscriptionFailed { page, source });
            }
        }
    }

    Ok((slots, cached.len()))
}

/// Merge the result vector: non-empty slots in ascending page order,
/// separated by a blank line. Completion order never matters here — the
/// vector is indexed by `page - start`.
fn merge_pages(slots: &[Option<String>]) -> String {
    slots
        .iter()
        .flatten()
        .map(String::as_str)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn resolve_transcriber(config: &JobConfig) -> Result<Arc<Transcriber>, ConvertError> {
    if let Some(ref t) = config.transcriber {
        return Ok(Arc::clone(t));
    }
    Ok(Arc::new(Transcriber::Api(ApiTranscriber::from_config(
        config,
    )?)))
}

/// Best-effort post-success cleanup: the artifact is already safe, so a
/// failure here is logged, not escalated.
fn cleanup(store: &CheckpointStore, workspace: &JobWorkspace) {
    if let Err(e) = store.clear_all() {
        warn!("failed to clear checkpoints: {e}");
    }
    if let Err(e) = workspace.remove() {
        warn!("failed to remove job working directory: {e}");
    }
}
