//! CLI binary for dng2png.
//!
//! A thin shim over the library crate: `serve` runs the upload service,
//! `convert` and `inspect` work on a single local file or URL.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dng2png::pipeline::input::{is_url, resolve_input};
use dng2png::output::preset_label;
use dng2png::{
    inspect, AppState, ConversionConfig, ConversionProgressCallback, ConversionReport, Converter,
    PngCompression, ProgressCallback, ServerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that logs one line per failed preset and per fallback attempt.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Decoding");
        bar.set_message("reading RAW…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_preset_start(&self, index: usize, name: &str) {
        self.bar.set_message(format!("{} ({name})", preset_label(index)));
    }

    fn on_preset_failed(&self, index: usize, name: &str, reason: &str) {
        let msg = if reason.len() > 80 {
            let cut = reason
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|i| *i < 79)
                .last()
                .unwrap_or(0);
            format!("{}\u{2026}", &reason[..cut])
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {} {:<10} {}",
            red("✗"),
            preset_label(index),
            name,
            dim(&msg)
        ));
    }

    fn on_fallback_start(&self) {
        self.bar.println(format!(
            "  {} all presets failed, trying container fallback",
            cyan("⚠")
        ));
        self.bar.set_prefix("Fallback");
        self.bar.set_message("decoding as ordinary image…");
    }

    fn on_conversion_complete(&self, output_bytes: u64) {
        self.bar.finish_and_clear();
        eprintln!("{} PNG written ({} bytes)", green("✔"), bold(&output_bytes.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the upload service on port 8080
  dng2png serve --port 8080

  # Convert a local file (writes photo.png next to it)
  dng2png convert photo.dng

  # Convert from URL to a chosen path, print the report as JSON
  dng2png convert https://example.com/sample.dng -o out.png --json

  # Show RAW metadata only
  dng2png inspect photo.dng

HTTP ROUTES (serve):
  GET  /                          mode selector page
  GET  /api-mode                  upload form
  POST /convert                   multipart field "dngFile" → {message, filename}
  GET  /download/{filename}       PNG attachment, removed shortly afterwards
  POST /inspect                   multipart field "dngFile" → RAW metadata JSON

ENVIRONMENT VARIABLES:
  PORT                          Listening port (default 3000)
  DNG2PNG_UPLOAD_DIR            Scratch directory for uploads and outputs
  DNG2PNG_MAX_UPLOAD_BYTES      Upload size limit in bytes (default 52428800)
  DNG2PNG_DOWNLOAD_GRACE_SECS   Delay before a downloaded PNG is removed
  DNG2PNG_OUTPUT_TTL_SECS       Expiry for PNGs that are never downloaded
  RUST_LOG                      Overrides the log filter
"#;

/// Convert DNG photos to PNG.
#[derive(Parser, Debug)]
#[command(
    name = "dng2png",
    version,
    about = "Convert DNG camera RAW files to PNG",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DNG2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DNG2PNG_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the upload/convert/download web service.
    Serve(ServeArgs),
    /// Convert one RAW file (path or URL) to PNG.
    Convert(ConvertArgs),
    /// Print RAW metadata without converting.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listening port.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Scratch directory for uploads and generated PNGs.
    #[arg(long, env = "DNG2PNG_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "DNG2PNG_MAX_UPLOAD_BYTES", default_value_t = dng2png::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Seconds between a download and removal of the PNG.
    #[arg(long, env = "DNG2PNG_DOWNLOAD_GRACE_SECS", default_value_t = 5)]
    download_grace_secs: u64,

    /// Seconds before a never-downloaded PNG is removed.
    #[arg(long, env = "DNG2PNG_OUTPUT_TTL_SECS", default_value_t = 600)]
    output_ttl_secs: u64,

    #[command(flatten)]
    decode: DecodeArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local RAW file path or HTTP/HTTPS URL.
    input: String,

    /// Write the PNG here instead of next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the ConversionReport as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DNG2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DNG2PNG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[command(flatten)]
    decode: DecodeArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local RAW file path or HTTP/HTTPS URL.
    input: String,

    /// Print metadata as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// PNG compression effort.
    #[arg(long, value_enum, default_value = "moderate")]
    compression: CompressionArg,

    /// Fail instead of re-reading the file as an ordinary image when every preset fails.
    #[arg(long)]
    no_fallback: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CompressionArg {
    Fast,
    Moderate,
    Best,
}

impl From<CompressionArg> for PngCompression {
    fn from(v: CompressionArg) -> Self {
        match v {
            CompressionArg::Fast => PngCompression::Fast,
            CompressionArg::Moderate => PngCompression::Moderate,
            CompressionArg::Best => PngCompression::Best,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs during a CLI conversion.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
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
        Command::Serve(args) => run_serve(args).await,
        Command::Convert(args) => run_convert(args, show_progress, cli.quiet).await,
        Command::Inspect(args) => run_inspect(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let server_config = ServerConfig::builder()
        .upload_dir(args.upload_dir)
        .max_upload_bytes(args.max_upload_bytes)
        .download_grace(Duration::from_secs(args.download_grace_secs))
        .output_ttl(Duration::from_secs(args.output_ttl_secs))
        .port(args.port)
        .build()
        .context("Invalid server configuration")?;

    let converter = Converter::new(build_config(&args.decode, 120, None)?);
    let state = AppState::new(server_config, converter);

    dng2png::serve(state, shutdown_signal())
        .await
        .context("Server error")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn run_convert(args: ConvertArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args.decode, args.download_timeout, progress)?;
    let converter = Converter::new(config);

    let resolved = resolve_input(&args.input, args.download_timeout)
        .await
        .with_context(|| format!("Failed to open {}", args.input))?;
    let output = match args.output {
        Some(p) => p,
        None => default_output(&args.input, resolved.path()),
    };

    let report = converter
        .convert_file(resolved.path(), &output)
        .await
        .context("Conversion failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        print_summary(&report);
    }
    Ok(())
}

async fn run_inspect(args: InspectArgs) -> Result<()> {
    let resolved = resolve_input(&args.input, 120)
        .await
        .with_context(|| format!("Failed to open {}", args.input))?;
    let meta = inspect(resolved.path())
        .await
        .context("Failed to read RAW metadata")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
    } else {
        println!("File:          {}", args.input);
        println!("Camera:        {} {}", meta.clean_make, meta.clean_model);
        println!("Make/Model:    {} / {}", meta.make, meta.model);
        println!("Dimensions:    {}x{}", meta.width, meta.height);
        println!("Components:    {}", meta.components);
        println!("Sample format: {}", meta.sample_format);
        println!("File size:     {} bytes", meta.file_bytes);
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    args: &DecodeArgs,
    download_timeout: u64,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .png_compression(args.compression.into())
        .enable_fallback(!args.no_fallback)
        .download_timeout_secs(download_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid conversion configuration")
}

/// `photo.dng` → `photo.png`; URLs land in the working directory.
fn default_output(input: &str, resolved: &Path) -> PathBuf {
    if is_url(input) {
        let name = resolved.file_name().map(PathBuf::from).unwrap_or_default();
        name.with_extension("png")
    } else {
        Path::new(input).with_extension("png")
    }
}

fn print_summary(report: &ConversionReport) {
    let via = report.source.to_string();
    eprintln!(
        "{}  {}x{}  via {}  {}ms  →  {}",
        if report.is_degraded() { cyan("⚠") } else { green("✔") },
        report.width,
        report.height,
        via,
        report.total_duration_ms,
        bold(&report.output_path.display().to_string()),
    );
    let failed = report.attempts.iter().filter(|a| !a.succeeded()).count();
    if failed > 0 {
        eprintln!("   {} preset(s) failed before success", dim(&failed.to_string()));
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
