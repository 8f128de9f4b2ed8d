//! Rasterisation stage: render a page range to per-page PNGs via pdfium.
//!
//! ## Why chunked spawn_blocking?
//!
//! pdfium is CPU-bound and not async-safe, so every engine call runs inside
//! `tokio::task::spawn_blocking`. The range is split into consecutive
//! chunks and each chunk worker opens the document once and renders its
//! whole chunk — one engine open per chunk amortises startup cost. Workers
//! are bounded by `min(available_parallelism, chunk_count)` because more
//! workers than cores only adds memory pressure.
//!
//! The stage is a batch with no per-page result channel: it returns only
//! once every page's image is materialised under the shared image
//! directory (`<page>.png`), or fails outright. Later stages address
//! images strictly by page number and never see chunk boundaries.

use crate::config::JobConfig;
use crate::error::ConvertError;
use futures::stream::{self, StreamExt};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Query the document's page count without rendering anything.
pub async fn page_count(pdf_path: &Path) -> Result<u32, ConvertError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document = pdfium
            .load_pdf_from_file(&path, None)
            .map_err(|e| ConvertError::CorruptPdf {
                path: path.clone(),
                detail: format!("{e:?}"),
            })?;
        Ok(document.pages().len() as u32)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Metadata task panicked: {e}")))?
}

/// Rasterise the inclusive page range `[start, end]` to
/// `<image_dir>/<page>.png`, one image per page.
///
/// Side effect only: the caller addresses the produced images by page
/// number. Any engine error fails the whole range — there is no partial
/// resume at this granularity.
pub async fn rasterize_range(
    pdf_path: &Path,
    start: u32,
    end: u32,
    config: &JobConfig,
    image_dir: &Path,
) -> Result<(), ConvertError> {
    let chunks = plan_chunks(start, end, config.chunk_size);
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(chunks.len())
        .max(1);
    info!(
        "Rasterising pages {}-{} in {} chunks across {} workers",
        start,
        end,
        chunks.len(),
        workers
    );

    let max_pixels = config.max_rendered_pixels;
    let mut tasks = stream::iter(chunks.into_iter().map(|(cs, ce)| {
        let path = pdf_path.to_path_buf();
        let dir = image_dir.to_path_buf();
        tokio::task::spawn_blocking(move || rasterize_chunk_blocking(&path, cs, ce, max_pixels, &dir))
    }))
    .buffer_unordered(workers);

    while let Some(joined) = tasks.next().await {
        joined.map_err(|e| ConvertError::Internal(format!("Raster task panicked: {e}")))??;
    }

    Ok(())
}

/// Split the inclusive range into consecutive chunks of `chunk_size` pages;
/// the last chunk may be shorter.
pub(crate) fn plan_chunks(start: u32, end: u32, chunk_size: u32) -> Vec<(u32, u32)> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut p = start;
    while p <= end {
        let chunk_end = (p + chunk_size - 1).min(end);
        chunks.push((p, chunk_end));
        p = chunk_end + 1;
    }
    chunks
}

/// Render one chunk: open the document, rasterise pages `cs..=ce`, write
/// each page's PNG individually.
fn rasterize_chunk_blocking(
    pdf_path: &Path,
    cs: u32,
    ce: u32,
    max_pixels: u32,
    image_dir: &Path,
) -> Result<(), ConvertError> {
    let chunk_err = |detail: String| ConvertError::RasterizationFailed {
        start: cs,
        end: ce,
        detail,
    };

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| chunk_err(format!("failed to open document: {e:?}")))?;
    let pages = document.pages();

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    for page_num in cs..=ce {
        let page = pages
            .get((page_num - 1) as u16)
            .map_err(|e| chunk_err(format!("page {page_num}: {e:?}")))?;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| chunk_err(format!("page {page_num}: {e:?}")))?;
        let image = bitmap.as_image();
        let out: PathBuf = image_dir.join(format!("{page_num}.png"));
        image
            .save(&out)
            .map_err(|e| chunk_err(format!("page {page_num}: failed to save PNG: {e}")))?;
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_exact_multiple() {
        assert_eq!(plan_chunks(1, 10, 5), vec![(1, 5), (6, 10)]);
    }

    #[test]
    fn chunks_last_is_shorter() {
        assert_eq!(plan_chunks(1, 7, 3), vec![(1, 3), (4, 6), (7, 7)]);
    }

    #[test]
    fn chunks_offset_start() {
        assert_eq!(plan_chunks(4, 9, 4), vec![(4, 7), (8, 9)]);
    }

    #[test]
    fn chunks_single_page() {
        assert_eq!(plan_chunks(3, 3, 5), vec![(3, 3)]);
    }

    #[test]
    fn chunks_size_one_is_per_page() {
        assert_eq!(plan_chunks(1, 3, 1), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn chunks_cover_range_without_gaps_or_overlap() {
        let chunks = plan_chunks(2, 23, 5);
        let mut expected = 2;
        for (s, e) in &chunks {
            assert_eq!(*s, expected);
            assert!(e >= s);
            expected = e + 1;
        }
        assert_eq!(expected, 24);
    }
}
