//! # dng2png
//!
//! Convert DNG (and other rawloader-supported RAW) photos to PNG, as a
//! library, a CLI, or a small upload/download web service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RAW
//!  │
//!  ├─ 1. Input     local file, URL download, or stored HTTP upload
//!  ├─ 2. Presets   imagepipe decode per preset, first non-empty image wins
//!  ├─ 3. Fallback  re-read as an ordinary image container (TIFF/JPEG/PNG)
//!  ├─ 4. Encode    PNG via the image crate (CPU-bound, spawn_blocking)
//!  └─ 5. Output    atomic write + ConversionReport
//! ```
//!
//! A preset that fails is logged and recorded, never fatal. Only when every
//! preset and the fallback fail does the caller see
//! [`Dng2PngError::ConversionFailed`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dng2png::convert;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = convert("photo.dng", "photo.png").await?;
//!     eprintln!("{}x{} via {:?}", report.width, report.height, report.source);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `dng2png` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! dng2png = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, DecodePreset, PngCompression, ServerConfig,
    ServerConfigBuilder,
};
pub use convert::{convert, convert_sync, inspect, Converter};
pub use error::{Dng2PngError, PresetError, UploadError};
pub use output::{ConversionReport, DecodeSource, PresetAttempt, RawMetadata};
pub use pipeline::decode::{DecodeOutcome, RawDecoder, RawInput};
pub use pipeline::fallback::ContainerDecoder;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use server::{router, serve, AppState};
