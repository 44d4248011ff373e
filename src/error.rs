//! Error types for the dng2png library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Dng2PngError`] (**fatal**): the conversion cannot produce a PNG at
//!   all (unreadable input, every decoder preset and the fallback failed).
//!   Returned as `Err(Dng2PngError)` from [`crate::convert::Converter`].
//!
//! * [`PresetError`] (**non-fatal**): a single decoder preset produced no
//!   usable output. Stored inside [`crate::output::PresetAttempt`] so the
//!   orchestrator can move on to the next preset and callers can see what
//!   was tried.
//!
//! * [`UploadError`]: the HTTP upload was rejected before any conversion
//!   started (missing file, wrong type, too large).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the dng2png library.
#[derive(Debug, Error)]
pub enum Dng2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("RAW file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input file exists but holds no bytes.
    #[error("Input file '{path}' is empty")]
    EmptyInput { path: PathBuf },

    /// The file was read but does not carry a TIFF/DNG header.
    #[error("File is not a DNG/TIFF container: '{path}'\nFirst bytes: {magic:?}")]
    NotARawFile { path: PathBuf, magic: [u8; 4] },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Every decoder preset failed and the fallback container decode failed too.
    #[error("DNG conversion failed: {primary}; fallback: {fallback}")]
    ConversionFailed { primary: String, fallback: String },

    /// rawloader could not read the file's metadata.
    #[error("Failed to read RAW metadata from '{path}': {detail}")]
    MetadataFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PNG file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of a single decoder preset.
///
/// The orchestrator keeps trying the remaining presets; only when every
/// preset and the fallback fail does the conversion become fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PresetError {
    /// The decoder returned without error but produced no pixels.
    #[error("preset '{preset}' produced empty output")]
    Empty { preset: String },

    /// The decoder rejected the input.
    #[error("preset '{preset}' failed: {detail}")]
    Failed { preset: String, detail: String },

    /// Decoding succeeded but PNG encoding of the result failed.
    #[error("preset '{preset}' decoded but PNG encoding failed: {detail}")]
    EncodeFailed { preset: String, detail: String },
}

/// Why an upload was refused before conversion.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The multipart body carried no file in the expected field.
    #[error("DNG file is required.")]
    MissingFile,

    /// Neither the declared MIME type nor the filename extension matched.
    #[error("Only DNG files are allowed!")]
    UnsupportedType { filename: String },

    /// The file part carried no bytes.
    #[error("Uploaded DNG file is empty.")]
    EmptyFile,

    /// The stream crossed the configured size limit.
    #[error("File too large: uploads are limited to {limit} bytes")]
    TooLarge { limit: u64 },

    /// The multipart body could not be parsed.
    #[error("Failed to parse multipart data: {0}")]
    Malformed(String),

    /// Writing the upload into the scratch directory failed.
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}
