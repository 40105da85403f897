//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BatchConfig`, drives a progress bar, and prints the summary.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_doc2md::{
    run_batch, BatchConfig, BatchObserver, BatchReport, BatchSummary, ItemReport,
    NoHeadingFallback, ProcessingOutcome, Severity, SharedObserver, SplitOptions,
    TracingObserver, TransformRegistry,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one progress bar plus a log line per converted or
/// failed item. Items complete out of order, so lines carry the item path
/// rather than a position.
struct CliObserver {
    bar: ProgressBar,
    /// Also print a line for skipped items.
    verbose: bool,
}

impl CliObserver {
    fn new(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Walking source tree…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar, verbose })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Processing");
        self.bar.set_message("");
        self.bar.reset_eta();
    }
}

impl BatchObserver for CliObserver {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total} files to process"))
        ));
    }

    fn on_item_complete(&self, completed: usize, _total: usize, item: &ItemReport) {
        let path = item.relative_path.display().to_string();
        match &item.outcome {
            ProcessingOutcome::Converted { .. } => {
                self.bar.println(format!("  {} {}", green("✓"), path));
            }
            ProcessingOutcome::Failed { error, .. } => {
                let msg = error.to_string();
                let msg = match msg.lines().next() {
                    Some(first) if first.chars().count() > 80 => {
                        format!("{}\u{2026}", first.chars().take(79).collect::<String>())
                    }
                    Some(first) => first.to_string(),
                    None => msg,
                };
                self.bar
                    .println(format!("  {} {}  {}", red("✗"), path, red(&msg)));
            }
            ProcessingOutcome::Skipped { reason } => {
                if self.verbose {
                    self.bar
                        .println(format!("  {} {}  {}", dim("·"), dim(&path), dim(&reason.to_string())));
                }
            }
        }
        self.bar.set_position(completed as u64);
    }

    fn on_event(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Warning => self.bar.println(format!("  {} {}", yellow("⚠"), message)),
            Severity::Debug if self.verbose => self.bar.println(dim(message)),
            // Errors are already shown by on_item_complete.
            _ => {}
        }
    }

    fn on_batch_complete(&self, _summary: &BatchSummary) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a document tree to Markdown with 8 workers
  doc2md convert data_raw data_md -w 8

  # Reconvert everything, ignoring timestamps
  doc2md convert data_raw data_md --force

  # Preview what would be converted
  doc2md convert data_raw data_md --dry-run

  # Split Markdown files into chapter books on level-2 headings
  doc2md split --src data_md --dst books --level 2

  # Keep files without headings as plain copies
  doc2md split --src data_md --dst books --no-split-action copy

  # Machine-readable report
  doc2md --json convert data_raw data_md > report.json

CONVERTERS:
  Extension                 Tool
  ─────────────────────     ──────────────────────────
  .pdf                      unstructured (unstructured-ingest)
  .epub .doc .docx          pandoc
  .mobi .azw .azw3 .lit     ebook-convert (Calibre)
  .txt                      copied as-is

  A failed file leaves <name>.error.txt next to where its output would be.
  Files whose output is newer than the source are skipped unless --force.

ENVIRONMENT VARIABLES:
  DOC2MD_WORKERS     Default worker count (0 = one per CPU)
  DOC2MD_FORCE       Ignore timestamps
  DOC2MD_VERBOSE     Enable DEBUG-level logs
  RUST_LOG           Full tracing filter override
"#;

/// Batch-convert document trees to Markdown and split Markdown into chapters.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Batch-convert document trees to Markdown and split Markdown into chapters",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs and list skipped files.
    #[arg(short, long, global = true, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2MD_QUIET")]
    quiet: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long, global = true, env = "DOC2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOC2MD_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every supported document under SRC to Markdown under DST.
    Convert {
        /// Source directory.
        src: PathBuf,

        /// Destination directory (created if missing).
        dst: PathBuf,

        #[command(flatten)]
        common: CommonArgs,

        /// Run even if converter programs are missing from PATH.
        #[arg(long)]
        skip_tool_check: bool,
    },

    /// Split every Markdown file under --src into per-chapter files under --dst.
    Split {
        /// Source directory of Markdown files.
        #[arg(long)]
        src: PathBuf,

        /// Destination directory for chapter books.
        #[arg(long)]
        dst: PathBuf,

        /// Heading level that starts a chapter (1–6).
        #[arg(long, env = "DOC2MD_LEVEL", default_value_t = 1,
              value_parser = clap::value_parser!(u8).range(1..=6))]
        level: u8,

        /// What to do with files without headings: skip or copy.
        #[arg(long, env = "DOC2MD_NO_SPLIT_ACTION", default_value = "skip")]
        no_split_action: NoHeadingFallback,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Number of parallel workers (0 = one per CPU).
    #[arg(short, long, env = "DOC2MD_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Reprocess files even when the output is up to date.
    #[arg(short, long, env = "DOC2MD_FORCE")]
    force: bool,

    /// Report what would be done without writing anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; verbose always wins.
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

    if let Command::Convert {
        skip_tool_check: false,
        common,
        ..
    } = &cli.command
    {
        if !common.dry_run {
            check_tools()?;
        }
    }

    let observer: SharedObserver = if show_progress {
        CliObserver::new(cli.verbose)
    } else {
        Arc::new(TracingObserver)
    };

    let config = build_config(&cli.command, observer)?;

    let report = run_batch(&config).await.context("Batch failed to start")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report);
    }

    if report.summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(command: &Command, observer: SharedObserver) -> Result<BatchConfig> {
    let config = match command {
        Command::Convert {
            src, dst, common, ..
        } => BatchConfig::builder(src, dst)
            .workers(common.workers)
            .force(common.force)
            .dry_run(common.dry_run),
        Command::Split {
            src,
            dst,
            level,
            no_split_action,
            common,
        } => BatchConfig::builder(src, dst)
            .split(SplitOptions {
                heading_level: *level,
                no_heading_fallback: *no_split_action,
            })
            .workers(common.workers)
            .force(common.force)
            .dry_run(common.dry_run),
    };
    config
        .observer(observer)
        .build()
        .context("Invalid configuration")
}

/// Refuse to start a conversion when a default converter is not installed.
fn check_tools() -> Result<()> {
    let missing = TransformRegistry::with_default_converters().missing_tools();
    if missing.is_empty() {
        return Ok(());
    }
    for program in &missing {
        eprintln!("{} converter not found on PATH: {}", red("✘"), bold(program));
    }
    bail!(
        "{} converter program(s) missing; install them or pass --skip-tool-check",
        missing.len()
    )
}

fn print_summary(report: &BatchReport) {
    let s = &report.summary;
    let mark = if s.failed == 0 {
        green("✔")
    } else if s.failed == s.total {
        red("✘")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{}  {} succeeded  {} skipped  {} failed  {}",
        mark,
        bold(&s.succeeded.to_string()),
        s.skipped,
        if s.failed == 0 {
            s.failed.to_string()
        } else {
            red(&s.failed.to_string())
        },
        dim(&format!("({} files, {}ms)", s.total, report.duration_ms)),
    );
    for failed in report.failures() {
        if let ProcessingOutcome::Failed {
            error_artifact: Some(artifact),
            ..
        } = &failed.outcome
        {
            eprintln!(
                "   {} {}  {}",
                red("✗"),
                failed.relative_path.display(),
                dim(&format!("see {}", artifact.display()))
            );
        }
    }
}
