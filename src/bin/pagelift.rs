//! CLI binary for pagelift.
//!
//! A thin shim over the library crate that maps CLI flags to `JobConfig`,
//! runs one document or a directory of documents, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagelift::{convert, convert_to_file, JobConfig, JobStats, ProgressSink};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Terminal progress sink: renders a live progress bar and per-page log
/// lines using [indicatif]. Pages complete out of order under the
/// concurrent pool, so every line carries its page number.
struct CliProgress {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
}

impl CliProgress {
    /// Create a sink whose progress-bar length is set by `on_job_start`
    /// (called once the page range is known).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_job_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rasterising pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know the total.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }
}

impl ProgressSink for CliProgress {
    fn on_job_start(&self, pages_in_range: usize, from_checkpoint: usize) {
        self.activate_bar(pages_in_range);
        if from_checkpoint > 0 {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!(
                    "Resuming: {from_checkpoint}/{pages_in_range} pages already checkpointed"
                ))
            ));
        } else {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Transcribing {pages_in_range} pages…"))
            ));
        }
    }

    fn on_page_skipped(&self, page: u32) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            dim("↷"),
            page,
            dim("restored from checkpoint"),
        ));
        self.bar.inc(1);
    }

    fn on_page_transcribed(&self, page: u32, chars: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            green("✓"),
            page,
            dim(&format!("{chars:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, pages_in_range: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages merged",
            green("✔"),
            bold(&pages_in_range.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  pagelift document.pdf

  # Convert to <output-dir>/document.md
  pagelift document.pdf -o out/

  # Specific page range
  pagelift --pages 3-15 paper.pdf -o out/

  # Every PDF in a directory; one failure does not stop the others
  pagelift reports/ -o out/

  # Use a specific model and endpoint
  pagelift --model gpt-4.1 --base-url http://localhost:11434/v1/chat/completions doc.pdf

  # JSON stats on stderr after conversion
  pagelift --json document.pdf -o out/

RESUMING:
  Every transcribed page is checkpointed under the work directory before the
  next page is merged. If a run is interrupted or a page fails, re-running
  the same command skips the checkpointed pages and pays only for the rest.
  Checkpoints are cleared automatically once the merged file is saved.

ENVIRONMENT VARIABLES:
  PAGELIFT_API_KEY    API key for the transcription endpoint (or --api-key-env)
  PAGELIFT_WORK_DIR   Root for per-document work state (default: system temp)

SETUP:
  1. Set API key:     export PAGELIFT_API_KEY=sk-...
  2. Convert:         pagelift document.pdf -o out/
"#;

/// Convert PDF files to Markdown using Vision LLMs, resumably.
#[derive(Parser, Debug)]
#[command(
    name = "pagelift",
    version,
    about = "Convert PDF files to Markdown using Vision LLMs, resumably",
    long_about = "Convert PDF documents to clean, well-structured Markdown using a Vision \
Language Model behind any OpenAI-compatible chat-completions endpoint. Completed pages are \
checkpointed on disk, so interrupted jobs resume without re-paying for finished pages.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A PDF file, or a directory whose PDFs are converted one by one.
    input: PathBuf,

    /// Write `<stem>.md` files into this directory instead of stdout.
    /// Required when the input is a directory.
    #[arg(short = 'o', long, env = "PAGELIFT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Page selection: all, 5, or 3-15 (1-indexed, inclusive).
    #[arg(long, env = "PAGELIFT_PAGES", default_value = "all")]
    pages: String,

    /// Model identifier sent to the transcription endpoint.
    #[arg(long, env = "PAGELIFT_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Chat-completions endpoint URL.
    #[arg(long, env = "PAGELIFT_BASE_URL")]
    base_url: Option<String>,

    /// Environment variable to read the API key from.
    #[arg(long, default_value = pagelift::DEFAULT_API_KEY_ENV)]
    api_key_env: String,

    /// Number of concurrent transcription calls.
    #[arg(short, long, env = "PAGELIFT_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Pages per rasterisation chunk.
    #[arg(long, env = "PAGELIFT_CHUNK_SIZE", default_value_t = 5)]
    chunk_size: u32,

    /// Retries per page on a retryable transcription failure.
    #[arg(long, env = "PAGELIFT_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    /// Per-transcription-call timeout in seconds.
    #[arg(long, env = "PAGELIFT_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Maximum rendered page dimension in pixels.
    #[arg(long, env = "PAGELIFT_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Root directory for page images and checkpoints.
    #[arg(long, env = "PAGELIFT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PAGELIFT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print run statistics as JSON on stderr after each document.
    #[arg(long, env = "PAGELIFT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PAGELIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGELIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGELIFT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli, show_progress).await?;

    if cli.input.is_dir() {
        let output_dir = cli
            .output_dir
            .clone()
            .context("--output-dir is required when the input is a directory")?;
        run_batch(&cli, &config, &output_dir).await
    } else {
        run_single(&cli, &config).await
    }
}

/// Convert one document: to a file under `--output-dir`, else to stdout.
async fn run_single(cli: &Cli, config: &JobConfig) -> Result<()> {
    if let Some(ref output_dir) = cli.output_dir {
        let (out_path, stats) = convert_to_file(&cli.input, output_dir, config)
            .await
            .with_context(|| format!("Conversion failed: {}", cli.input.display()))?;
        if !cli.quiet {
            print_summary(&stats, Some(&out_path));
        }
        if cli.json {
            print_json_stats(&stats)?;
        }
        return Ok(());
    }

    let output = convert(&cli.input, config)
        .await
        .with_context(|| format!("Conversion failed: {}", cli.input.display()))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(output.markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !output.markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet && !show_progress_for(cli) {
        print_summary(&output.stats, None);
    }
    if cli.json {
        print_json_stats(&output.stats)?;
    }
    Ok(())
}

/// Convert every `*.pdf` in the input directory, in name order. A failed
/// document is reported and skipped; the run continues with the next one
/// and exits non-zero at the end.
async fn run_batch(cli: &Cli, config: &JobConfig, output_dir: &Path) -> Result<()> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(&cli.input)
        .with_context(|| format!("Failed to read directory {}", cli.input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();

    if pdfs.is_empty() {
        anyhow::bail!("No PDF files found in {}", cli.input.display());
    }
    if !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {} documents", pdfs.len()))
        );
    }

    let mut failed = 0usize;
    for pdf in &pdfs {
        match convert_to_file(pdf, output_dir, config).await {
            Ok((out_path, stats)) => {
                if !cli.quiet {
                    print_summary(&stats, Some(&out_path));
                }
                if cli.json {
                    print_json_stats(&stats)?;
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {e}", red("✗"), pdf.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed}/{} documents failed", pdfs.len());
    }
    Ok(())
}

fn show_progress_for(cli: &Cli) -> bool {
    !cli.quiet && !cli.no_progress
}

fn print_summary(stats: &JobStats, out_path: Option<&Path>) {
    let target = out_path
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {}/{} pages  {}ms{}",
        green("✔"),
        stats.pages_in_range,
        stats.total_pages,
        stats.total_duration_ms,
        target,
    );
    if stats.checkpointed_pages > 0 {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} pages restored from checkpoints",
                stats.checkpointed_pages
            ))
        );
    }
}

fn print_json_stats(stats: &JobStats) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to serialise stats")?;
    eprintln!("{json}");
    Ok(())
}

/// Map CLI args to `JobConfig`.
async fn build_config(cli: &Cli, show_progress: bool) -> Result<JobConfig> {
    let (start, end) = parse_pages(&cli.pages)?;

    let mut builder = JobConfig::builder()
        .pages(start, end)
        .model(&cli.model)
        .api_key_env(&cli.api_key_env)
        .concurrency(cli.concurrency)
        .chunk_size(cli.chunk_size)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_rendered_pixels(cli.max_pixels);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_root(dir);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }
    if show_progress {
        builder = builder.progress(CliProgress::new_dynamic());
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` into an inclusive 1-indexed range.
fn parse_pages(s: &str) -> Result<(u32, Option<u32>)> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok((1, None));
    }

    // Range: "3-15" or open-ended "3-".
    if let Some((start, end)) = s.split_once('-') {
        let start: u32 = start.trim().parse().context("Invalid start page in range")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {start})");
        }
        let end = end.trim();
        if end.is_empty() {
            return Ok((start, None));
        }
        let end: u32 = end.parse().context("Invalid end page in range")?;
        if start > end {
            anyhow::bail!("Invalid page range '{start}-{end}': start must be <= end");
        }
        return Ok((start, Some(end)));
    }

    // Single page: "5".
    let page: u32 = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {page})");
    }
    Ok((page, Some(page)))
}
