//! Conversion Orchestrator: RAW file in, PNG file out.
//!
//! ```text
//! Idle ─▶ TryingPreset(0) ─▶ … ─▶ TryingPreset(n-1) ─▶ FallbackAttempt ─▶ FatalFailure
//!             │                        │                    │
//!             └──────── Success ◀──────┴────────────────────┘
//! ```
//!
//! Preset failures are logged and recorded in the [`ConversionReport`],
//! never returned. Only when every preset and the fallback fail does the
//! caller see [`Dng2PngError::ConversionFailed`], whose message carries
//! both the last primary failure and the fallback failure.

use crate::config::ConversionConfig;
use crate::error::{Dng2PngError, PresetError};
use crate::output::{ConversionReport, DecodeSource, PresetAttempt, RawMetadata};
use crate::pipeline::decode::{self, ImagepipeDecoder, RawDecoder, RawInput};
use crate::pipeline::encode;
use crate::pipeline::fallback::{ContainerDecoder, LenientImageDecoder};
use crate::pipeline::input;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Decoders plus configuration; cheap to clone and share across requests.
#[derive(Clone)]
pub struct Converter {
    config: ConversionConfig,
    decoder: Arc<dyn RawDecoder>,
    fallback: Arc<dyn ContainerDecoder>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

/// Result of the blocking decode+encode stage.
struct Encoded {
    png: Vec<u8>,
    width: u32,
    height: u32,
    source: DecodeSource,
    attempts: Vec<PresetAttempt>,
}

impl Converter {
    /// Converter backed by imagepipe with the `image` crate as fallback.
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_decoders(config, Arc::new(ImagepipeDecoder), Arc::new(LenientImageDecoder))
    }

    /// Converter with caller-supplied decoders.
    pub fn with_decoders(
        config: ConversionConfig,
        decoder: Arc<dyn RawDecoder>,
        fallback: Arc<dyn ContainerDecoder>,
    ) -> Self {
        Self {
            config,
            decoder,
            fallback,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert the RAW file at `input_path` into a PNG at `output_path`.
    ///
    /// # Errors
    /// - input unreadable or empty
    /// - every preset and the fallback failed ([`Dng2PngError::ConversionFailed`])
    /// - the PNG could not be written
    ///
    /// On error no file is left at `output_path`.
    pub async fn convert_file(
        &self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<ConversionReport, Dng2PngError> {
        let total_start = Instant::now();
        info!(
            "Starting conversion: {} → {}",
            input_path.display(),
            output_path.display()
        );

        // ── Step 1: Read input ───────────────────────────────────────────────
        let bytes = input::read_input(input_path).await?;
        let input_bytes = bytes.len() as u64;

        // ── Step 2-4: Presets, fallback, PNG encode (CPU-bound) ──────────────
        let decode_start = Instant::now();
        let this = self.clone();
        let path = input_path.to_path_buf();
        let encoded = tokio::task::spawn_blocking(move || this.decode_and_encode(&path, &bytes))
            .await
            .map_err(|e| Dng2PngError::Internal(format!("Decode task panicked: {}", e)))??;
        let decode_duration_ms = decode_start.elapsed().as_millis() as u64;

        // ── Step 5: Write output ─────────────────────────────────────────────
        if let Err(e) = encode::write_atomic(output_path, &encoded.png).await {
            let _ = tokio::fs::remove_file(output_path).await;
            return Err(e);
        }
        let output_bytes = encoded.png.len() as u64;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(output_bytes);
        }

        let report = ConversionReport {
            output_path: output_path.to_path_buf(),
            output_bytes,
            input_bytes,
            width: encoded.width,
            height: encoded.height,
            source: encoded.source,
            attempts: encoded.attempts,
            decode_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Conversion complete: {}x{} via {:?}, {} bytes, {}ms total",
            report.width, report.height, report.source, report.output_bytes, report.total_duration_ms
        );

        Ok(report)
    }

    /// Convert RAW bytes held in memory, returning PNG bytes.
    ///
    /// The decoder opens files by path, so `bytes` is written to a managed
    /// [`tempfile`] which is removed on return.
    pub async fn convert_bytes(&self, bytes: &[u8]) -> Result<(Vec<u8>, ConversionReport), Dng2PngError> {
        let dir = tempfile::TempDir::new()
            .map_err(|e| Dng2PngError::Internal(format!("tempdir: {e}")))?;
        let input_path = dir.path().join("input.dng");
        let output_path = dir.path().join("output.png");

        tokio::fs::write(&input_path, bytes)
            .await
            .map_err(|e| Dng2PngError::Internal(format!("tempfile write: {e}")))?;

        let report = self.convert_file(&input_path, &output_path).await?;
        let png = tokio::fs::read(&output_path)
            .await
            .map_err(|e| Dng2PngError::Internal(format!("read output: {e}")))?;
        Ok((png, report))
    }

    /// Run presets, then the fallback; encode whichever produced pixels.
    fn decode_and_encode(&self, path: &Path, bytes: &[u8]) -> Result<Encoded, Dng2PngError> {
        let progress = self.config.progress_callback.as_deref();
        let raw = RawInput { path, bytes };

        let (winner, mut attempts) =
            decode::run_presets(self.decoder.as_ref(), raw, &self.config.presets, progress);

        let primary_error = match winner {
            Some(success) => {
                let preset = &self.config.presets[success.index];
                match encode::encode_png(&success.image, self.config.png_compression) {
                    Ok(png) => {
                        return Ok(Encoded {
                            png,
                            width: success.image.width(),
                            height: success.image.height(),
                            source: DecodeSource::Preset(success.index),
                            attempts,
                        });
                    }
                    Err(e) => {
                        let err = PresetError::EncodeFailed {
                            preset: preset.name.clone(),
                            detail: e.to_string(),
                        };
                        warn!("{}", err);
                        if let Some(last) = attempts.last_mut() {
                            last.error = Some(err.clone());
                        }
                        err.to_string()
                    }
                }
            }
            None => attempts
                .last()
                .and_then(|a| a.error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no decoder presets configured".to_string()),
        };

        warn!("All {} decoder presets failed; last error: {}", attempts.len(), primary_error);

        if !self.config.enable_fallback {
            return Err(Dng2PngError::ConversionFailed {
                primary: primary_error,
                fallback: "fallback disabled".to_string(),
            });
        }

        // ── Fallback: treat the bytes as an ordinary image container ─────────
        if let Some(cb) = progress {
            cb.on_fallback_start();
        }
        info!("Attempting fallback container decode");

        let fallback_result = self
            .fallback
            .decode(bytes)
            .and_then(|img| {
                encode::encode_png(&img, self.config.png_compression)
                    .map(|png| (png, img.width(), img.height()))
                    .map_err(|e| format!("PNG encoding failed: {e}"))
            });

        match fallback_result {
            Ok((png, width, height)) => {
                info!("Fallback conversion successful ({}x{})", width, height);
                Ok(Encoded {
                    png,
                    width,
                    height,
                    source: DecodeSource::Fallback,
                    attempts,
                })
            }
            Err(fallback_error) => {
                warn!("Fallback failed: {}", fallback_error);
                Err(Dng2PngError::ConversionFailed {
                    primary: primary_error,
                    fallback: fallback_error,
                })
            }
        }
    }
}

/// Convert with the default converter and configuration.
pub async fn convert(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<ConversionReport, Dng2PngError> {
    Converter::default()
        .convert_file(input_path.as_ref(), output_path.as_ref())
        .await
}

/// Synchronous wrapper around [`Converter::convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    converter: &Converter,
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<ConversionReport, Dng2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Dng2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(converter.convert_file(input_path.as_ref(), output_path.as_ref()))
}

/// Read RAW metadata without demosaicing.
pub async fn inspect(path: impl AsRef<Path>) -> Result<RawMetadata, Dng2PngError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let file_bytes = tokio::fs::metadata(&path)
        .await
        .map_err(|_| Dng2PngError::FileNotFound { path: path.clone() })?
        .len();

    tokio::task::spawn_blocking(move || inspect_blocking(&path, file_bytes))
        .await
        .map_err(|e| Dng2PngError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn inspect_blocking(path: &Path, file_bytes: u64) -> Result<RawMetadata, Dng2PngError> {
    let raw = rawloader::decode_file(path).map_err(|e| Dng2PngError::MetadataFailed {
        path: path.to_path_buf(),
        detail: format!("{:?}", e),
    })?;

    let sample_format = match &raw.data {
        rawloader::RawImageData::Integer(_) => "integer",
        rawloader::RawImageData::Float(_) => "float",
    };

    Ok(RawMetadata {
        make: raw.make,
        model: raw.model,
        clean_make: raw.clean_make,
        clean_model: raw.clean_model,
        width: raw.width,
        height: raw.height,
        components: raw.cpp,
        sample_format: sample_format.to_string(),
        file_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodePreset;
    use crate::pipeline::decode::tests::NthPresetDecoder;
    use crate::progress::ConversionProgressCallback;
    use image::DynamicImage;
    use std::sync::Mutex;

    struct FailingFallback(&'static str);

    impl ContainerDecoder for FailingFallback {
        fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
            Err(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_preset_start(&self, index: usize, _name: &str) {
            self.events.lock().unwrap().push(format!("start:{index}"));
        }
        fn on_preset_failed(&self, index: usize, _name: &str, _reason: &str) {
            self.events.lock().unwrap().push(format!("failed:{index}"));
        }
        fn on_fallback_start(&self) {
            self.events.lock().unwrap().push("fallback".into());
        }
        fn on_conversion_complete(&self, _output_bytes: u64) {
            self.events.lock().unwrap().push("done".into());
        }
    }

    fn three_presets() -> ConversionConfig {
        ConversionConfig::builder()
            .presets(vec![
                DecodePreset::new("a", 0, 0),
                DecodePreset::new("b", 0, 0),
                DecodePreset::new("c", 0, 0),
            ])
            .build()
            .unwrap()
    }

    fn write_input(dir: &Path) -> PathBuf {
        let p = dir.join("in.dng");
        std::fs::write(&p, vec![0x49u8; 1024]).unwrap();
        p
    }

    #[tokio::test]
    async fn nth_preset_success_skips_later_presets() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let output = dir.path().join("out.png");

        let decoder = Arc::new(NthPresetDecoder::new(Some(1)));
        let converter = Converter::with_decoders(
            three_presets(),
            decoder.clone(),
            Arc::new(FailingFallback("unused")),
        );

        let report = converter.convert_file(&input, &output).await.unwrap();

        assert_eq!(report.source, DecodeSource::Preset(1));
        assert_eq!(decoder.calls(), vec!["a", "b"]);
        assert_eq!(report.attempts.len(), 2);
        assert!(report.attempts[0].error.is_some());
        assert!(report.attempts[1].succeeded());
        assert!(!report.is_degraded());

        let png = std::fs::read(&output).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        assert_eq!(report.output_bytes, png.len() as u64);
        assert_eq!((report.width, report.height), (4, 3));
    }

    #[tokio::test]
    async fn total_failure_carries_both_messages() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let output = dir.path().join("out.png");

        let decoder = Arc::new(NthPresetDecoder::new(None));
        let converter = Converter::with_decoders(
            three_presets(),
            decoder.clone(),
            Arc::new(FailingFallback("unsupported container")),
        );

        let err = converter.convert_file(&input, &output).await.unwrap_err();
        let msg = err.to_string();

        assert!(matches!(err, Dng2PngError::ConversionFailed { .. }));
        // Last preset ("c", third call) returns Empty in the stub.
        assert!(msg.contains("preset 'c' produced empty output"), "got: {msg}");
        assert!(msg.contains("unsupported container"), "got: {msg}");
        assert_eq!(decoder.calls(), vec!["a", "b", "c"]);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn progress_events_follow_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let output = dir.path().join("out.png");

        let recorder = Arc::new(Recorder::default());
        let config = ConversionConfig::builder()
            .presets(vec![DecodePreset::new("a", 0, 0), DecodePreset::new("b", 0, 0)])
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let converter = Converter::with_decoders(
            config,
            Arc::new(NthPresetDecoder::new(None)),
            Arc::new(FailingFallback("nope")),
        );

        let _ = converter.convert_file(&input, &output).await;

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["start:0", "failed:0", "start:1", "failed:1", "fallback"]
        );
    }

    #[tokio::test]
    async fn disabled_fallback_fails_without_calling_it() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let output = dir.path().join("out.png");

        let config = ConversionConfig::builder()
            .presets(vec![DecodePreset::new("only", 0, 0)])
            .enable_fallback(false)
            .build()
            .unwrap();
        let converter = Converter::with_decoders(
            config,
            Arc::new(NthPresetDecoder::new(None)),
            Arc::new(FailingFallback("must not run")),
        );

        let err = converter.convert_file(&input, &output).await.unwrap_err();
        assert!(err.to_string().contains("fallback disabled"));
        assert!(!err.to_string().contains("must not run"));
    }

    #[tokio::test]
    async fn missing_input_is_fatal_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = Arc::new(NthPresetDecoder::new(Some(0)));
        let converter = Converter::with_decoders(
            three_presets(),
            decoder.clone(),
            Arc::new(FailingFallback("unused")),
        );

        let err = converter
            .convert_file(&dir.path().join("missing.dng"), &dir.path().join("out.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Dng2PngError::FileNotFound { .. }));
        assert!(decoder.calls().is_empty());
    }

    #[tokio::test]
    async fn convert_bytes_returns_png() {
        let converter = Converter::with_decoders(
            three_presets(),
            Arc::new(NthPresetDecoder::new(Some(0))),
            Arc::new(FailingFallback("unused")),
        );

        let (png, report) = converter.convert_bytes(&[1u8; 512]).await.unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        assert_eq!(report.input_bytes, 512);
    }

    #[tokio::test]
    async fn inspect_rejects_non_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.dng");
        std::fs::write(&path, b"not a raw file").unwrap();

        let err = inspect(&path).await.unwrap_err();
        assert!(matches!(err, Dng2PngError::MetadataFailed { .. }));
    }
}
