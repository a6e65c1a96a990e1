//! CLI binary for mdpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig` / `ConversionInput`, runs a batch over a converter
//! pool and writes the results next to the inputs (or under `--output`).

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use mdpress::{
    convert_batch, write_output, BatchItem, BatchProgressCallback, Context, ConversionInput,
    Converter, ConverterConfig, PoolConfig, ProgressCallback,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// document. Documents finish out of order, so start times are keyed by
/// batch index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Starting browser pool…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} document(s)…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, name: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, index: usize, _total: usize, name: &str, pdf_len: usize) {
        let secs = self.elapsed_secs(index);
        let size = if pdf_len == 0 {
            "html".to_string()
        } else {
            format!("{:>7} KiB", pdf_len.div_ceil(1024))
        };
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            green("✓"),
            name,
            dim(&size),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, _total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} document(s) converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one file (writes report.pdf next to report.md)
  mdpress report.md

  # Choose the output file
  mdpress report.md -o out/final.pdf

  # Many files into one directory, four browsers in parallel
  mdpress docs/*.md -o build/ -w 4

  # Cover page, TOC, watermark etc. from a JSON metadata file
  mdpress report.md --config report.json

  # HTML only (no browser needed)
  mdpress --html-only report.md

  # Your own stylesheet on top of the built-in one
  mdpress --style technical --css brand.css report.md

METADATA FILE (--config):
  A JSON object with any of the request blocks; "markdown" is ignored.
  {
    "page":        { "size": "a4", "orientation": "portrait", "margin": 0.75 },
    "footer":      { "position": "center", "show_page_number": true, "text": "ACME" },
    "watermark":   { "text": "DRAFT", "opacity": 0.08 },
    "cover":       { "title": "Quarterly Report", "author": "Ops team" },
    "toc":         { "min_depth": 2, "max_depth": 3 },
    "signature":   { "name": "J. Doe", "email": "jdoe@example.com" },
    "page_breaks": { "before_h1": true, "orphans": 3, "widows": 3 }
  }

BUILT-IN STYLES:
  default, technical, minimal

ENVIRONMENT VARIABLES:
  MDPRESS_CHROME_PATH   Path to a Chromium/Chrome executable
  RUST_LOG              Override the log filter (e.g. mdpress=debug)
"#;

/// Convert Markdown files to styled PDF (or HTML) with headless Chromium.
#[derive(Parser, Debug)]
#[command(
    name = "mdpress",
    version,
    about = "Convert Markdown files to styled PDF documents",
    long_about = "Convert Markdown documents to print-ready PDF through headless Chromium. \
Adds optional cover pages, tables of contents, signature blocks, watermarks, footers \
and page-break rules on top of a built-in or custom stylesheet.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown files to convert.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (single input) or directory (several inputs).
    #[arg(short, long, env = "MDPRESS_OUTPUT")]
    output: Option<PathBuf>,

    /// JSON file with page/footer/watermark/cover/toc/signature/page_breaks blocks.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra stylesheet applied after everything else.
    #[arg(long)]
    css: Option<PathBuf>,

    /// Built-in style name or path to a CSS file.
    #[arg(long, env = "MDPRESS_STYLE", default_value = "default")]
    style: String,

    /// Skip the base style layer.
    #[arg(long)]
    no_style: bool,

    /// Write HTML instead of PDF; never launches a browser.
    #[arg(long)]
    html_only: bool,

    /// Pool size (browser instances); 0 derives it from the CPU count.
    #[arg(short, long, env = "MDPRESS_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Per-document render timeout in seconds.
    #[arg(long, env = "MDPRESS_TIMEOUT", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Chromium/Chrome executable.
    #[arg(long, env = "MDPRESS_CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Extra argument passed to the browser (repeatable).
    #[arg(long = "chrome-arg", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Print a JSON summary of every document instead of log lines.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MDPRESS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDPRESS_QUIET")]
    quiet: bool,
}

/// One line of `--json` output.
#[derive(Debug, Serialize)]
struct DocumentReport {
    input: PathBuf,
    output: Option<PathBuf>,
    ok: bool,
    bytes: usize,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    // Surface an unknown style before any document is queued; browsers
    // launch lazily so this costs nothing.
    Converter::new(&config).context("Invalid configuration")?;

    let template = load_template(&cli).await?;
    let items = build_items(&cli, &template).await?;
    let outputs: Vec<PathBuf> = cli
        .inputs
        .iter()
        .map(|input| output_path(input, cli.output.as_deref(), cli.inputs.len(), cli.html_only))
        .collect();

    // ── Run batch ────────────────────────────────────────────────────────
    let pool = Converter::pool(config, PoolConfig::new(cli.workers));
    let (ctx, cancel) = Context::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let mut reports = Vec::with_capacity(items.len());
    let mut failures = 0usize;
    let mut outcomes = convert_batch(&pool, &ctx, items, progress);

    while let Some(outcome) = outcomes.next().await {
        let input = cli.inputs[outcome.index].clone();
        let target = &outputs[outcome.index];

        let written = match outcome.result {
            Ok(result) => {
                let bytes = if cli.html_only {
                    result.html.into_bytes()
                } else {
                    result.pdf
                };
                write_output(target, &bytes)
                    .await
                    .map(|()| bytes.len())
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match &written {
            Ok(len) if !cli.quiet && !show_progress && !cli.json => {
                eprintln!(
                    "{} {}  →  {}  {}",
                    green("✓"),
                    outcome.name,
                    bold(&target.display().to_string()),
                    dim(&format!("{len} bytes")),
                );
            }
            Err(e) if !cli.json => {
                eprintln!("{} {}: {}", red("✗"), outcome.name, e);
            }
            _ => {}
        }
        if written.is_err() {
            failures += 1;
        }

        reports.push(DocumentReport {
            input,
            output: written.as_ref().ok().map(|_| target.clone()),
            ok: written.is_ok(),
            bytes: *written.as_ref().unwrap_or(&0),
            error: written.err(),
        });
    }
    drop(outcomes);

    pool.close().await.context("Failed to shut down browser pool")?;

    if cli.json {
        reports.sort_by(|a, b| a.input.cmp(&b.input));
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise report")?
        );
    }

    if failures > 0 {
        bail!("{failures} of {} document(s) failed", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .style(cli.style.clone())
        .no_style(cli.no_style)
        .render_timeout_secs(cli.timeout)
        .chrome_args(cli.chrome_args.iter().cloned());

    if let Some(ref path) = cli.chrome {
        builder = builder.chrome_path(path);
    }

    builder.build().context("Invalid configuration")
}

/// The request fields shared by every input: `--config` blocks, `--css`
/// and `--html-only`.
async fn load_template(cli: &Cli) -> Result<ConversionInput> {
    let mut template = match cli.config {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
            serde_json::from_str::<ConversionInput>(&raw)
                .with_context(|| format!("Invalid metadata JSON in {}", path.display()))?
        }
        None => ConversionInput::default(),
    };

    if let Some(ref path) = cli.css {
        let css = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read stylesheet {}", path.display()))?;
        template.css = Some(css);
    }
    template.html_only = cli.html_only;
    Ok(template)
}

async fn build_items(cli: &Cli, template: &ConversionInput) -> Result<Vec<BatchItem>> {
    let mut items = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let markdown = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let source_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let input = ConversionInput {
            markdown,
            source_dir: Some(source_dir),
            ..template.clone()
        };
        items.push(BatchItem::new(path.display().to_string(), input));
    }
    Ok(items)
}

/// Where the converted document for `input` goes.
///
/// With one input `--output` names the file; with several it names a
/// directory. Without `--output` the file lands next to its input.
fn output_path(input: &Path, output: Option<&Path>, total: usize, html_only: bool) -> PathBuf {
    let ext = if html_only { "html" } else { "pdf" };
    let file_name = input.with_extension(ext);
    let file_name = file_name.file_name().unwrap_or_default();

    match output {
        Some(out) if total == 1 && !out.is_dir() => out.to_path_buf(),
        Some(dir) => dir.join(file_name),
        None => input.with_extension(ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_next_to_input() {
        let p = output_path(Path::new("docs/report.md"), None, 1, false);
        assert_eq!(p, PathBuf::from("docs/report.pdf"));
        let p = output_path(Path::new("docs/report.md"), None, 1, true);
        assert_eq!(p, PathBuf::from("docs/report.html"));
    }

    #[test]
    fn single_input_output_is_a_file() {
        let p = output_path(Path::new("report.md"), Some(Path::new("out/final.pdf")), 1, false);
        assert_eq!(p, PathBuf::from("out/final.pdf"));
    }

    #[test]
    fn many_inputs_output_is_a_directory() {
        let p = output_path(Path::new("a/one.md"), Some(Path::new("build")), 2, false);
        assert_eq!(p, PathBuf::from("build/one.pdf"));
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "mdpress",
            "a.md",
            "b.md",
            "-o",
            "out",
            "-w",
            "3",
            "--html-only",
            "--chrome-arg",
            "--disable-gpu",
        ]);
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.workers, 3);
        assert!(cli.html_only);
        assert_eq!(cli.chrome_args, vec!["--disable-gpu".to_string()]);
        assert_eq!(cli.style, "default");
    }
}
