//! End-to-end integration tests for pagelift.
//!
//! These tests need a real pdfium shared library and a sample PDF in
//! `./test_cases/`, and the live test makes a real API call. They are gated
//! behind the `PAGELIFT_E2E` environment variable so they do not run in CI
//! unless explicitly requested.
//!
//! Run with:
//!   PAGELIFT_E2E=1 cargo test --test e2e -- --nocapture

use pagelift::{
    convert, convert_to_file, ConvertError, JobConfig, ScriptedTranscriber, Transcriber,
};
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn sample_pdf() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/sample.pdf")
}

/// Skip this test unless PAGELIFT_E2E is set *and* the sample PDF exists.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("PAGELIFT_E2E").is_err() {
            println!("SKIP — set PAGELIFT_E2E=1 to run e2e tests");
            return;
        }
        let p = sample_pdf();
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            println!("       Place any small PDF at test_cases/sample.pdf");
            return;
        }
        p
    }};
}

/// A scripted transcriber with canned text for every plausible page.
fn scripted_all_pages() -> Arc<Transcriber> {
    let mut scripted = ScriptedTranscriber::new();
    for page in 1..=500 {
        scripted = scripted.respond(page, format!("Content of page {page}"));
    }
    Arc::new(Transcriber::Scripted(scripted))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_with_scripted_transcriber() {
    let pdf = e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();

    let config = JobConfig::builder()
        .transcriber(scripted_all_pages())
        .work_root(work.path())
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();
    assert!(output.stats.total_pages >= 1);
    assert_eq!(output.stats.pages_in_range, output.stats.total_pages);
    assert!(output.markdown.starts_with("Content of page 1"));

    // Success clears the per-document working directory.
    let leftovers: Vec<_> = std::fs::read_dir(work.path())
        .map(|d| d.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "work dir not cleaned: {leftovers:?}");
}

#[tokio::test]
async fn failed_page_leaves_checkpoints_for_resume() {
    let pdf = e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();

    // First run: page 1 succeeds, every later page fails.
    let scripted = ScriptedTranscriber::new().respond(1, "Content of page 1");
    let config = JobConfig::builder()
        .transcriber(Arc::new(Transcriber::Scripted(scripted)))
        .work_root(work.path())
        .concurrency(1)
        .build()
        .unwrap();

    match convert(&pdf, &config).await {
        Err(ConvertError::TranscriptionFailed { .. }) => {}
        Ok(output) => {
            // Single-page document: nothing left to fail, nothing to resume.
            assert_eq!(output.stats.total_pages, 1);
            return;
        }
        Err(other) => panic!("expected TranscriptionFailed, got {other:?}"),
    }

    // Second run resumes: page 1 must come from its checkpoint, so its
    // scripted response is deliberately absent.
    let mut scripted = ScriptedTranscriber::new();
    for page in 2..=500 {
        scripted = scripted.respond(page, format!("Content of page {page}"));
    }
    let config = JobConfig::builder()
        .transcriber(Arc::new(Transcriber::Scripted(scripted)))
        .work_root(work.path())
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();
    assert!(output.markdown.starts_with("Content of page 1"));
    assert!(output.stats.checkpointed_pages >= 1);
}

#[tokio::test]
async fn out_of_bounds_range_is_rejected() {
    let pdf = e2e_skip_unless_ready!();
    let config = JobConfig::builder()
        .pages(5000, Some(5001))
        .transcriber(scripted_all_pages())
        .build()
        .unwrap();

    let err = convert(&pdf, &config).await.unwrap_err();
    assert!(matches!(err, ConvertError::InvalidRange { .. }));
}

#[tokio::test]
async fn convert_to_file_writes_markdown() {
    let pdf = e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let config = JobConfig::builder()
        .transcriber(scripted_all_pages())
        .work_root(work.path())
        .build()
        .unwrap();

    let (out_path, stats) = convert_to_file(&pdf, out.path(), &config).await.unwrap();
    assert_eq!(out_path.extension().and_then(|e| e.to_str()), Some("md"));
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("Content of page 1"));
    assert_eq!(stats.pages_in_range, stats.total_pages);
}

/// Live API smoke test: additionally requires PAGELIFT_API_KEY.
#[tokio::test]
async fn live_api_first_page() {
    let pdf = e2e_skip_unless_ready!();
    if std::env::var("PAGELIFT_API_KEY").is_err() {
        println!("SKIP — set PAGELIFT_API_KEY to run the live API test");
        return;
    }
    let work = tempfile::tempdir().unwrap();

    let config = JobConfig::builder()
        .pages(1, Some(1))
        .work_root(work.path())
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();
    assert!(!output.markdown.trim().is_empty());
    assert_eq!(output.stats.pages_in_range, 1);
}
