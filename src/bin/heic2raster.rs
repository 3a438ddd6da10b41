//! CLI binary for heic2raster.
//!
//! A thin shim over the library crate: maps flags onto `ServiceConfig`,
//! then either serves the HTTP API or runs one operation and prints the
//! result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use heic2raster::{
    convert_stream, serve, ArtifactCatalog, BatchProgressCallback, CommandConverter, Converter,
    ImageConverter, Orchestrator, ProgressCallback, ServiceConfig, TargetFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ─────────────────────────────────────────────────────

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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Batch progress bar ──────────────────────────────────────────────────────

/// Renders one bar for the batch and one log line per file. Files finish
/// out of order, so start times are keyed by source name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER),
        );
        bar.set_prefix("Scanning");
        bar.set_message("Listing inbox…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, source: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(SPINNER),
        );
        self.bar.set_prefix("Converting");
        self.bar.set_message("");
    }

    fn on_file_start(&self, source: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_string(), Instant::now());
        self.bar.set_message(source.to_string());
    }

    fn on_file_complete(&self, source: &str, output: &str, bytes: u64) {
        let secs = self.elapsed_secs(source);
        self.bar.println(format!(
            "  {} {source} → {}  {}  {}",
            green("✓"),
            bold(output),
            dim(&format!("{bytes} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, source: &str, error: &str) {
        let secs = self.elapsed_secs(source);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {source}  {}  {}",
            red("✗"),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} files converted", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if success_count == 0 { red("✘") } else { yellow("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the upload service on port 5000
  heic2raster serve

  # Serve a static upload page as well
  heic2raster serve --addr 127.0.0.1:8080 --public-dir ./public

  # Convert one file into the outbox
  heic2raster convert IMG_0001.HEIC --format png

  # Convert everything in the inbox, one JSON line per file
  heic2raster convert-all --json

  # Decode in-process instead of shelling out (JPEG/PNG-compatible inputs only)
  heic2raster --converter image convert-all

ENVIRONMENT VARIABLES:
  HEIC2RASTER_INBOX         Inbox directory (default: uploads)
  HEIC2RASTER_OUTBOX        Outbox directory (default: converted)
  HEIC2RASTER_CONCURRENCY   Conversions running at once during a batch
  HEIC2RASTER_CONVERTER     command | image
  HEIC2RASTER_HEIF_PROGRAM  External decoder (default: heif-convert)
  RUST_LOG                  Overrides the log filter chosen by -v / -q

SETUP:
  The default converter runs `heif-convert` from libheif. Install it with
  `apt install libheif-examples` or `brew install libheif`.
"#;

/// Convert HEIC/HEIF photos to JPEG or PNG, from the command line or over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "heic2raster",
    version,
    about = "Convert HEIC/HEIF photos to JPEG or PNG",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding uploaded sources.
    #[arg(long, global = true, env = "HEIC2RASTER_INBOX", default_value = "uploads")]
    inbox: PathBuf,

    /// Directory holding converted artifacts.
    #[arg(long, global = true, env = "HEIC2RASTER_OUTBOX", default_value = "converted")]
    outbox: PathBuf,

    /// Conversions running at once during a batch.
    #[arg(short, long, global = true, env = "HEIC2RASTER_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// JPEG quality (1–100).
    #[arg(long, global = true, env = "HEIC2RASTER_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Which converter adapter to use.
    #[arg(long, global = true, env = "HEIC2RASTER_CONVERTER", value_enum, default_value = "command")]
    converter: ConverterArg,

    /// External decoder run by the `command` converter.
    #[arg(long, global = true, env = "HEIC2RASTER_HEIF_PROGRAM", default_value = "heif-convert")]
    heif_program: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "HEIC2RASTER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "HEIC2RASTER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP upload service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "HEIC2RASTER_ADDR", default_value = "0.0.0.0:5000")]
        addr: SocketAddr,

        /// Static UI directory served at `/`.
        #[arg(long, env = "HEIC2RASTER_PUBLIC_DIR")]
        public_dir: Option<PathBuf>,

        /// Largest accepted upload in MiB.
        #[arg(long, env = "HEIC2RASTER_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,
    },

    /// Copy one file into the inbox and convert it.
    Convert {
        /// HEIC/HEIF file to convert.
        file: PathBuf,

        /// Target format.
        #[arg(short, long, value_enum, default_value = "jpeg")]
        format: FormatArg,
    },

    /// Convert every file currently in the inbox.
    ConvertAll {
        /// Target format.
        #[arg(short, long, value_enum, default_value = "jpeg")]
        format: FormatArg,

        /// Print one JSON object per file as it completes.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "HEIC2RASTER_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List converted files.
    List {
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Delete every source and converted file.
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    #[value(alias = "jpg")]
    Jpeg,
    Png,
}

impl From<FormatArg> for TargetFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => TargetFormat::Jpeg,
            FormatArg::Png => TargetFormat::Png,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConverterArg {
    /// Run the external HEIF decoder.
    Command,
    /// Decode in-process with the `image` crate.
    Image,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // A running progress bar carries the feedback; keep INFO logs out of its way.
    let show_progress = matches!(
        cli.command,
        Command::ConvertAll { json: false, no_progress: false, .. }
    ) && !cli.quiet;
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

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Serve {
            addr,
            ref public_dir,
            max_upload_mb,
        } => {
            let mut builder = config_builder(&cli).max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024));
            if let Some(dir) = public_dir {
                builder = builder.public_dir(dir);
            }
            let config = builder.build().context("Invalid configuration")?;
            serve(config, addr).await.context("Server failed")?;
        }

        Command::Convert { ref file, format } => {
            let orchestrator = open(&cli, None).await?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Not a file name: {}", file.display()))?;
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let source = orchestrator.ingest(name, &bytes).await?;
            let submission = orchestrator.submit(source, format.into()).await;
            let artifact = submission.result.context("Conversion failed")?;

            if !cli.quiet {
                eprintln!(
                    "{}  {} → {}  {}",
                    green("✔"),
                    submission.source.name,
                    bold(&artifact.path.display().to_string()),
                    dim(&format!("{} bytes", artifact.size)),
                );
            }
            println!("{}", artifact.locator);
        }

        Command::ConvertAll { format, json, .. } => {
            let orchestrator = Arc::new(open(&cli, progress).await?);
            let format = TargetFormat::from(format);

            if json {
                let mut outcomes = convert_stream(&orchestrator, format)
                    .await
                    .context("Failed to list inbox")?;
                while let Some(outcome) = outcomes.next().await {
                    let line = match outcome.result {
                        Ok(artifact) => serde_json::json!({
                            "source": outcome.source,
                            "status": "converted",
                            "convertedFile": artifact.name,
                            "downloadUrl": artifact.locator,
                        }),
                        Err(failure) => serde_json::json!({
                            "source": outcome.source,
                            "status": "failed",
                            "reason": failure.reason,
                        }),
                    };
                    println!("{line}");
                }
            } else {
                let report = orchestrator
                    .convert_all(format)
                    .await
                    .context("Batch conversion failed")?;
                if !cli.quiet && !show_progress {
                    eprintln!("Converted {}/{} files", report.succeeded, report.total());
                    for failure in &report.failed {
                        eprintln!("  {} {failure}", red("✗"));
                    }
                }
                if !report.is_clean() {
                    std::process::exit(2);
                }
            }
        }

        Command::List { json } => {
            let orchestrator = open(&cli, None).await?;
            let files = ArtifactCatalog::new(orchestrator.storage().clone())
                .list_artifacts()
                .await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "files": files }))
                        .context("Failed to serialise listing")?
                );
            } else if files.is_empty() {
                eprintln!("{}", dim("No converted files"));
            } else {
                for file in files {
                    println!("{:<40} {}", file.name, dim(&file.download_url));
                }
            }
        }

        Command::Clear => {
            let orchestrator = open(&cli, None).await?;
            let report = ArtifactCatalog::new(orchestrator.storage().clone())
                .clear()
                .await
                .context("Clear failed")?;
            if !cli.quiet {
                eprintln!(
                    "{} removed {} sources and {} converted files",
                    green("✔"),
                    report.removed_sources,
                    report.removed_artifacts
                );
            }
        }
    }

    Ok(())
}

/// Map the global flags onto a `ServiceConfig` builder.
fn config_builder(cli: &Cli) -> heic2raster::ServiceConfigBuilder {
    let converter: Arc<dyn Converter> = match cli.converter {
        ConverterArg::Command => Arc::new(
            CommandConverter::new(&cli.heif_program).with_jpeg_quality(cli.jpeg_quality),
        ),
        ConverterArg::Image => Arc::new(ImageConverter::new(cli.jpeg_quality)),
    };

    ServiceConfig::builder()
        .inbox_dir(&cli.inbox)
        .outbox_dir(&cli.outbox)
        .concurrency(cli.concurrency)
        .jpeg_quality(cli.jpeg_quality)
        .converter(converter)
}

/// Build an orchestrator for a one-shot command and prepare its directories.
async fn open(cli: &Cli, progress: Option<ProgressCallback>) -> Result<Orchestrator> {
    let mut builder = config_builder(cli);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;
    let orchestrator = Orchestrator::new(config);
    orchestrator
        .storage()
        .ensure_directories()
        .await
        .context("Failed to prepare storage directories")?;
    Ok(orchestrator)
}
