//! CLI binary for openai-pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig` / `OpenAiConfig` / `ProcessOptions` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use openai_pdf::telemetry::{self, TelemetryConfig};
use openai_pdf::{
    process_document, CallContext, Client, ClientConfig, NoopProgressCallback, OpenAiConfig,
    PdfTextExtractor, ProcessOptions, ProcessOutput, ProcessProgressCallback, Stage,
};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

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

const PREVIEW_CHARS: usize = 200;

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the running stage, with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar,
            started: Mutex::new(None),
        }
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Extracting text",
        Stage::Upload => "Uploading file",
        Stage::Summarize => "Requesting summary",
    }
}

impl ProcessProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        self.bar.println(format!(
            "  {} {:<20} {}  {}",
            green("✓"),
            stage_label(stage),
            dim(detail),
            self.stage_elapsed(),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // Keep the line tidy; the full error is reported at the end.
        let msg = match error.char_indices().nth(80) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {:<20} {}  {}",
            red("✗"),
            stage_label(stage),
            red(&msg),
            self.stage_elapsed(),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract, upload and summarise
  openai-pdf document.pdf

  # Upload only, JSON output
  openai-pdf --no-summary --json document.pdf > upload.json

  # Gentle on a shared API key: 1 request/s, no bursts
  openai-pdf --rate-limit 1 --burst 1 document.pdf

  # Give up after two minutes overall
  openai-pdf --timeout 120 document.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (required)
  OPENAI_BASE_URL         API root, e.g. a compatible gateway
  OPENAI_PDF_MODEL        Chat model for the summary
  OPENAI_PDF_PURPOSE      Upload purpose tag
  OPENAI_PDF_RATE_LIMIT   Requests per second
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides --verbose/--quiet

RETRIES:
  429, 5xx and network errors are retried with exponential backoff
  (uploads for up to 60 s, completions for up to 30 s). Other 4xx errors
  such as a bad API key fail immediately. Ctrl-C cancels at once.
"#;

/// Extract text from a PDF, upload it to OpenAI and summarise it.
#[derive(Parser, Debug)]
#[command(
    name = "openai-pdf",
    version,
    about = "Extract text from a PDF, upload it to OpenAI and summarise it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    file: PathBuf,

    /// OpenAI API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API root URL.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = openai_pdf::transport::openai::DEFAULT_BASE_URL)]
    base_url: String,

    /// Chat model used for the summary.
    #[arg(long, env = "OPENAI_PDF_MODEL", default_value = openai_pdf::transport::openai::DEFAULT_MODEL)]
    model: String,

    /// Upload purpose tag.
    #[arg(long, env = "OPENAI_PDF_PURPOSE", default_value = "assistants")]
    purpose: String,

    /// Sustained request rate (requests/second).
    #[arg(long, env = "OPENAI_PDF_RATE_LIMIT", default_value_t = 10.0)]
    rate_limit: f64,

    /// Requests allowed back-to-back after an idle period.
    #[arg(long, env = "OPENAI_PDF_BURST", default_value_t = 20)]
    burst: u32,

    /// Maximum characters of extracted text sent for the summary.
    #[arg(long, env = "OPENAI_PDF_SUMMARY_CHARS", default_value_t = 2000)]
    summary_chars: usize,

    /// Upload only; skip the summary request.
    #[arg(long, env = "OPENAI_PDF_NO_SUMMARY")]
    no_summary: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OPENAI_PDF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Output structured JSON (ProcessOutput) instead of text.
    #[arg(long, env = "OPENAI_PDF_JSON")]
    json: bool,

    /// Overall deadline for the run, in seconds.
    #[arg(long, env = "OPENAI_PDF_TIMEOUT")]
    timeout: Option<u64>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "OPENAI_PDF_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "OPENAI_PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OPENAI_PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OPENAI_PDF_QUIET")]
    quiet: bool,

    /// Export spans as OpenTelemetry JSON on stdout.
    #[cfg(feature = "otel")]
    #[arg(long)]
    otel_stdout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters, so library INFO logs
    // are hidden while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    #[cfg(feature = "otel")]
    let otel_stdout = cli.otel_stdout;
    #[cfg(not(feature = "otel"))]
    let otel_stdout = false;

    let _telemetry = telemetry::init(&TelemetryConfig {
        default_filter: default_filter.to_string(),
        otel_stdout,
    })?;

    // ── Cancellation ─────────────────────────────────────────────────────
    let root = CallContext::new();
    let ctx = match cli.timeout {
        Some(secs) => root.with_timeout(Duration::from_secs(secs)),
        None => root.child(),
    };
    let on_signal = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // ── Build client ─────────────────────────────────────────────────────
    let openai = OpenAiConfig::new(&cli.api_key)
        .base_url(&cli.base_url)
        .model(&cli.model)
        .request_timeout(Duration::from_secs(cli.request_timeout));
    let config = ClientConfig::builder()
        .rate_limit(cli.rate_limit, cli.burst)
        .build()
        .context("Invalid configuration")?;
    let client = Client::openai(openai, config).context("Failed to create OpenAI client")?;

    let mut extractor = PdfTextExtractor::new();
    if let Some(ref password) = cli.password {
        extractor = extractor.password(password);
    }

    let options = ProcessOptions {
        purpose: cli.purpose.clone(),
        summarize: !cli.no_summary,
        summary_chars: cli.summary_chars,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress: &dyn ProcessProgressCallback = match &spinner {
        Some(cb) => cb,
        None => &NoopProgressCallback,
    };

    let result = process_document(&client, &extractor, &cli.file, &options, &ctx, progress).await;
    if let Some(cb) = &spinner {
        cb.finish();
    }
    let output = result
        .with_context(|| format!("Failed to process '{}'", cli.file.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_report(&output);
    }

    Ok(())
}

fn print_report(output: &ProcessOutput) {
    println!("{}", bold("Preview"));
    println!("{}", output.preview(PREVIEW_CHARS));
    println!();

    println!("{}", bold("Upload"));
    println!("  id:       {}", output.upload.id);
    println!("  filename: {}", output.upload.filename);
    println!("  status:   {}", output.upload.status);
    println!();

    match (&output.summary, &output.summary_error) {
        (Some(summary), _) => {
            println!("{}", bold("Summary"));
            println!("{}", summary.content.trim());
            eprintln!(
                "{}",
                dim(&format!(
                    "{} tokens in / {} tokens out, {}ms total",
                    summary.usage.prompt_tokens,
                    summary.usage.completion_tokens,
                    output.total_duration_ms
                ))
            );
        }
        (None, Some(err)) => eprintln!("{} summary unavailable: {}", red("⚠"), err),
        (None, None) => {}
    }
}
