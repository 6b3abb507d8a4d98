//! CLI binary for subtrack.
//!
//! `serve` runs the browser triage UI; `scan` runs the extraction pipeline
//! once over local files and prints what it found.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use subtrack::web::{self, AppState};
use subtrack::{
    scan_paths, ExtractionMode, ProgressCallback, ScanOutput, ScanProgressCallback, ServerConfig,
    TrackerConfig,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per statement.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
    }

    fn on_file_start(&self, index: usize, _total: usize, filename: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, filename: &str, records: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            green("✓"),
            index,
            total,
            filename,
            dim(&format!("{records:>3} found")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, filename: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(Some('\u{2026}')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            red("✗"),
            index,
            total,
            filename,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, total_files: usize, total_records: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} subscriptions in {} file(s)",
                green("✔"),
                bold(&total_records.to_string()),
                total_files
            );
        } else {
            eprintln!(
                "{} {} subscriptions in {} file(s)  ({} file(s) failed)",
                yellow("⚠"),
                bold(&total_records.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Browser UI on http://localhost:8000
  subtrack serve

  # One-off scan, table on stdout
  subtrack scan january.pdf february.csv

  # Structured output mode, JSON to a file
  subtrack scan --structured --json statement.pdf -o subs.json

  # A different OpenRouter model
  subtrack --model anthropic/claude-3.5-haiku scan statement.txt

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY   OpenRouter API key (required for scanning)
  SUBTRACK_MODEL       Override model ID
  RUST_LOG             Override log filter (e.g. subtrack=debug)

SETUP:
  1. Set API key:  export OPENROUTER_API_KEY='your-key'
  2. Start UI:     subtrack serve
"#;

/// Find recurring subscriptions in bank statements.
#[derive(Parser, Debug)]
#[command(
    name = "subtrack",
    version,
    about = "Find recurring subscriptions in bank statements with an LLM",
    long_about = "Find recurring subscriptions in bank statements (PDF, CSV or text) by asking \
an OpenRouter model to list them, then triage each one as keep, cancel or investigate and see \
the yearly savings.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    model: ModelArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SUBTRACK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SUBTRACK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the browser UI.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "SUBTRACK_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(long, env = "SUBTRACK_PORT", default_value_t = 8000)]
        port: u16,

        /// Maximum upload size in MiB.
        #[arg(long, env = "SUBTRACK_MAX_UPLOAD_MB", default_value_t = 25)]
        max_upload_mb: usize,
    },

    /// Scan statements once and print the subscriptions found.
    Scan {
        /// Statement files (PDF, CSV or plain text).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output structured JSON (ScanOutput) instead of a table.
        #[arg(long, env = "SUBTRACK_JSON")]
        json: bool,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable progress bar.
        #[arg(long, env = "SUBTRACK_NO_PROGRESS")]
        no_progress: bool,
    },
}

/// Settings shared by both subcommands.
#[derive(Args, Debug)]
struct ModelArgs {
    /// OpenRouter model ID.
    #[arg(long, global = true, env = "SUBTRACK_MODEL")]
    model: Option<String>,

    /// Ask for schema-constrained JSON instead of free text.
    #[arg(long, global = true, env = "SUBTRACK_STRUCTURED")]
    structured: bool,

    /// Characters of statement text sent to the model.
    #[arg(long, global = true, env = "SUBTRACK_MAX_CHARS")]
    max_chars: Option<usize>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "SUBTRACK_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens per completion.
    #[arg(long, global = true, env = "SUBTRACK_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Retries per file on transient LLM failure.
    #[arg(long, global = true, env = "SUBTRACK_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call timeout in seconds (none by default).
    #[arg(long, global = true, env = "SUBTRACK_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Files scanned in parallel per upload.
    #[arg(long, global = true, env = "SUBTRACK_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// OpenAI-compatible API base URL.
    #[arg(long, global = true, env = "SUBTRACK_BASE_URL")]
    base_url: Option<String>,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, global = true, env = "SUBTRACK_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs during a scan.
    let show_progress = match &cli.command {
        Command::Scan {
            json, no_progress, ..
        } => !cli.quiet && !*no_progress && !*json,
        Command::Serve { .. } => false,
    };
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

    match cli.command {
        Command::Serve {
            ref host,
            port,
            max_upload_mb,
        } => {
            let config = build_config(&cli.model, None).await?;
            if let Err(e) = config.resolve_api_key() {
                warn!("{}", e);
                if !cli.quiet {
                    eprintln!("{} {}", yellow("⚠"), e);
                }
            }
            let server = ServerConfig {
                host: host.clone(),
                port,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            };
            if !cli.quiet {
                eprintln!(
                    "{} {}",
                    green("▶"),
                    bold(&format!("http://localhost:{}", server.port))
                );
            }
            let state = AppState::new(config).context("Failed to build HTTP client")?;
            web::serve(state, &server)
                .await
                .with_context(|| format!("Server on {} failed", server.bind_addr()))?;
        }

        Command::Scan {
            ref files,
            json,
            ref output,
            ..
        } => {
            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn ScanProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli.model, progress_cb).await?;

            let result = scan_paths(&files[..], &config).await.context("Scan failed")?;

            let rendered = if json {
                serde_json::to_string_pretty(&result).context("Failed to serialise output")?
            } else {
                render_table(&result)
            };

            match output {
                Some(path) => {
                    tokio::fs::write(path, format!("{rendered}\n"))
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !cli.quiet {
                        eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
                    }
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    writeln!(handle, "{rendered}").context("Failed to write to stdout")?;
                }
            }

            if !cli.quiet && !json {
                eprintln!(
                    "   {} tokens in  /  {} tokens out  ·  {}ms total",
                    dim(&result.stats.total_input_tokens.to_string()),
                    dim(&result.stats.total_output_tokens.to_string()),
                    result.stats.total_duration_ms,
                );
                for file in result.files.iter().filter(|f| f.truncated) {
                    eprintln!(
                        "   {} {} truncated to {} of {} chars",
                        yellow("⚠"),
                        file.filename,
                        file.input_chars,
                        file.extracted_chars
                    );
                }
            }
        }
    }

    Ok(())
}

/// Plain-text table with totals.
fn render_table(output: &ScanOutput) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:<28} {:>9} {:<10} {:>9} {:>10}",
        "ID", "NAME", "AMOUNT", "FREQUENCY", "MONTHLY", "YEARLY"
    );
    for r in &output.records {
        let _ = writeln!(
            out,
            "{:<4} {:<28} {:>9.2} {:<10} {:>9.2} {:>10.2}",
            r.id,
            truncate(&r.name, 28),
            r.amount,
            r.frequency,
            r.monthly,
            r.yearly
        );
    }
    let totals = subtrack::Totals::from_records(&output.records);
    let _ = write!(
        out,
        "{:<4} {:<28} {:>9} {:<10} {:>9.2} {:>10.2}",
        "", "TOTAL", "", "", totals.total_monthly, totals.total_yearly
    );
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max - 1).chain(Some('\u{2026}')).collect()
    } else {
        s.to_string()
    }
}

/// Map CLI args to `TrackerConfig`.
async fn build_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<TrackerConfig> {
    let mut builder = TrackerConfig::builder()
        .max_retries(args.max_retries)
        .concurrency(args.concurrency)
        .mode(if args.structured {
            ExtractionMode::Structured
        } else {
            ExtractionMode::Unstructured
        });

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(n) = args.max_chars {
        builder = builder.max_input_chars(n);
    }
    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref path) = args.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
