//! Configuration types for DNG-to-PNG conversion and the HTTP service.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`] and the
//! service through [`ServerConfig`], each built via its builder. Neither
//! reads process-wide state: the scratch directory, size limit and accepted
//! types are values the caller passes in, so tests can point a server at a
//! throwaway `TempDir`.

use crate::error::Dng2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 50 MiB, the largest accepted upload.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Multipart form field that carries the RAW file.
pub const DEFAULT_FIELD_NAME: &str = "dngFile";

/// Configuration for a single RAW-to-PNG conversion.
///
/// # Example
/// ```rust
/// use dng2png::{ConversionConfig, DecodePreset};
///
/// let config = ConversionConfig::builder()
///     .presets(vec![DecodePreset::new("preview", 1024, 1024)])
///     .enable_fallback(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.presets.len(), 1);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Decoder presets, tried strictly in order. The first preset that
    /// yields a non-empty image wins. Default: [`DecodePreset::defaults`].
    pub presets: Vec<DecodePreset>,

    /// PNG compression level used for every output. Default: [`PngCompression::Moderate`].
    pub png_compression: PngCompression,

    /// Re-read the input as an ordinary image container when every preset
    /// fails. Default: true.
    pub enable_fallback: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional observer for per-preset events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            presets: DecodePreset::defaults(),
            png_compression: PngCompression::default(),
            enable_fallback: true,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("presets", &self.presets)
            .field("png_compression", &self.png_compression)
            .field("enable_fallback", &self.enable_fallback)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn presets(mut self, presets: Vec<DecodePreset>) -> Self {
        self.config.presets = presets;
        self
    }

    pub fn push_preset(mut self, preset: DecodePreset) -> Self {
        self.config.presets.push(preset);
        self
    }

    pub fn png_compression(mut self, level: PngCompression) -> Self {
        self.config.png_compression = level;
        self
    }

    pub fn enable_fallback(mut self, v: bool) -> Self {
        self.config.enable_fallback = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Dng2PngError> {
        if self.config.presets.is_empty() {
            return Err(Dng2PngError::InvalidConfig(
                "at least one decoder preset is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Presets ──────────────────────────────────────────────────────────────

/// One fixed option set handed to the RAW decoder.
///
/// A dimension of `0` leaves that axis uncapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodePreset {
    pub name: String,
    pub max_width: usize,
    pub max_height: usize,
}

impl DecodePreset {
    pub fn new(name: impl Into<String>, max_width: usize, max_height: usize) -> Self {
        Self {
            name: name.into(),
            max_width,
            max_height,
        }
    }

    /// Full resolution first, then progressively smaller renders that need
    /// less memory and skip more of the pipeline.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("full", 0, 0),
            Self::new("reduced", 4096, 4096),
            Self::new("preview", 1024, 1024),
        ]
    }
}

/// PNG compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PngCompression {
    Fast,
    /// zlib's default level (default).
    #[default]
    Moderate,
    Best,
}

// ── Server ───────────────────────────────────────────────────────────────

/// Configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Scratch directory for uploads and generated PNGs. Created if absent.
    /// Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Accepted filename extensions, compared case-insensitively and without
    /// the leading dot. Default: `["dng"]`.
    pub allowed_extensions: Vec<String>,

    /// Accepted declared MIME types. Default: `["image/x-adobe-dng"]`.
    pub allowed_mime_types: Vec<String>,

    /// Multipart field carrying the file. Default: `dngFile`.
    pub field_name: String,

    /// Delay between a download and removal of the served PNG. Default: 5 s.
    pub download_grace: Duration,

    /// Removal delay for outputs that are never downloaded. Default: 10 min.
    pub output_ttl: Duration,

    /// Listening port. Default: 3000.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: vec!["dng".to_string()],
            allowed_mime_types: vec!["image/x-adobe-dng".to_string()],
            field_name: DEFAULT_FIELD_NAME.to_string(),
            download_grace: Duration::from_secs(5),
            output_ttl: Duration::from_secs(600),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when `filename` ends in one of the accepted extensions.
    pub fn accepts_filename(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext.to_ascii_lowercase())))
    }

    /// True when the declared content type is one of the accepted MIME types.
    pub fn accepts_mime(&self, content_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(content_type.trim()))
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: u64) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn allowed_extensions(mut self, exts: Vec<String>) -> Self {
        self.config.allowed_extensions = exts
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn allowed_mime_types(mut self, types: Vec<String>) -> Self {
        self.config.allowed_mime_types = types;
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.config.field_name = name.into();
        self
    }

    pub fn download_grace(mut self, d: Duration) -> Self {
        self.config.download_grace = d;
        self
    }

    pub fn output_ttl(mut self, d: Duration) -> Self {
        self.config.output_ttl = d;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, Dng2PngError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(Dng2PngError::InvalidConfig(
                "max upload size must be > 0".into(),
            ));
        }
        if c.allowed_extensions.is_empty() && c.allowed_mime_types.is_empty() {
            return Err(Dng2PngError::InvalidConfig(
                "at least one accepted extension or MIME type is required".into(),
            ));
        }
        if c.field_name.is_empty() {
            return Err(Dng2PngError::InvalidConfig("field name must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_presets_are_ordered_largest_first() {
        let presets = DecodePreset::defaults();
        let names: Vec<&str> = presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["full", "reduced", "preview"]);
    }

    #[test]
    fn builder_rejects_empty_preset_list() {
        let err = ConversionConfig::builder().presets(vec![]).build().unwrap_err();
        assert!(matches!(err, Dng2PngError::InvalidConfig(_)));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let cfg = ServerConfig::default();
        assert!(cfg.accepts_filename("test.dng"));
        assert!(cfg.accepts_filename("IMG_0001.DNG"));
        assert!(cfg.accepts_filename("holiday.Dng"));
        assert!(!cfg.accepts_filename("photo.jpg"));
        assert!(!cfg.accepts_filename("dng"));
        assert!(!cfg.accepts_filename("notes.dng.txt"));
    }

    #[test]
    fn mime_match() {
        let cfg = ServerConfig::default();
        assert!(cfg.accepts_mime("image/x-adobe-dng"));
        assert!(cfg.accepts_mime("IMAGE/X-ADOBE-DNG"));
        assert!(!cfg.accepts_mime("image/jpeg"));
    }

    #[test]
    fn builder_strips_leading_dots() {
        let cfg = ServerConfig::builder()
            .allowed_extensions(vec![".NEF".into(), "dng".into()])
            .build()
            .unwrap();
        assert!(cfg.accepts_filename("a.nef"));
        assert!(cfg.accepts_filename("b.dng"));
    }

    #[test]
    fn builder_rejects_zero_limit() {
        let err = ServerConfig::builder().max_upload_bytes(0).build().unwrap_err();
        assert!(err.to_string().contains("max upload"));
    }
}
