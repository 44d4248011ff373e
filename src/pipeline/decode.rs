//! RAW decoding: run the configured presets in order until one yields pixels.
//!
//! The decoder itself is an external collaborator behind [`RawDecoder`]; the
//! production implementation hands the file to imagepipe, which drives
//! rawloader's demosaic and colour pipeline. Every invocation reports a
//! [`DecodeOutcome`], so "empty", "error" and "success" are values in one
//! ordered loop rather than nested error handling, and the first success
//! ends the loop.

use crate::config::DecodePreset;
use crate::error::PresetError;
use crate::output::{preset_label, PresetAttempt};
use crate::progress::ConversionProgressCallback;
use image::{DynamicImage, RgbImage};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a single decoder invocation produced.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Pixels were produced.
    Decoded(DynamicImage),
    /// The decoder returned without error but with nothing in the buffer.
    Empty,
    /// The decoder rejected the input.
    Failed(String),
}

impl DecodeOutcome {
    /// Normalise a zero-sized image to [`DecodeOutcome::Empty`].
    pub fn from_image(img: DynamicImage) -> Self {
        if img.width() == 0 || img.height() == 0 || img.as_bytes().is_empty() {
            DecodeOutcome::Empty
        } else {
            DecodeOutcome::Decoded(img)
        }
    }
}

/// The file handed to a decoder: its on-disk path and its full contents.
#[derive(Debug, Clone, Copy)]
pub struct RawInput<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
}

/// An external RAW decoder driven with one preset at a time.
///
/// Called from a blocking worker thread.
pub trait RawDecoder: Send + Sync {
    fn decode(&self, input: RawInput<'_>, preset: &DecodePreset) -> DecodeOutcome;
}

/// imagepipe-backed decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagepipeDecoder;

impl RawDecoder for ImagepipeDecoder {
    fn decode(&self, input: RawInput<'_>, preset: &DecodePreset) -> DecodeOutcome {
        let path = input.path;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            imagepipe::simple_decode_8bit(path, preset.max_width, preset.max_height)
        }));

        let decoded = match result {
            Ok(Ok(img)) => img,
            Ok(Err(e)) => return DecodeOutcome::Failed(e),
            Err(_) => return DecodeOutcome::Failed("decoder panicked".to_string()),
        };

        if decoded.data.is_empty() || decoded.width == 0 || decoded.height == 0 {
            return DecodeOutcome::Empty;
        }

        match RgbImage::from_raw(decoded.width as u32, decoded.height as u32, decoded.data) {
            Some(rgb) => DecodeOutcome::from_image(DynamicImage::ImageRgb8(rgb)),
            None => DecodeOutcome::Failed(format!(
                "decoder returned a buffer that does not match {}x{} RGB",
                decoded.width, decoded.height
            )),
        }
    }
}

/// The winning preset and its image.
#[derive(Debug)]
pub struct PresetSuccess {
    pub index: usize,
    pub image: DynamicImage,
}

/// Try each preset in order, stopping at the first non-empty result.
///
/// Returns the winner (if any) and the attempts made. Presets after the
/// winner are never invoked.
pub fn run_presets(
    decoder: &dyn RawDecoder,
    input: RawInput<'_>,
    presets: &[DecodePreset],
    progress: Option<&dyn ConversionProgressCallback>,
) -> (Option<PresetSuccess>, Vec<PresetAttempt>) {
    let mut attempts = Vec::with_capacity(presets.len());

    for (index, preset) in presets.iter().enumerate() {
        if let Some(cb) = progress {
            cb.on_preset_start(index, &preset.name);
        }
        debug!("Trying decoder {} '{}'", preset_label(index), preset.name);

        let start = Instant::now();
        let outcome = decoder.decode(input, preset);
        let duration_ms = start.elapsed().as_millis() as u64;

        let error = match outcome {
            DecodeOutcome::Decoded(image) => {
                info!(
                    "Decoder {} '{}' decoded {}x{} in {}ms",
                    preset_label(index),
                    preset.name,
                    image.width(),
                    image.height(),
                    duration_ms
                );
                attempts.push(PresetAttempt {
                    index,
                    name: preset.name.clone(),
                    error: None,
                    duration_ms,
                });
                return (Some(PresetSuccess { index, image }), attempts);
            }
            DecodeOutcome::Empty => PresetError::Empty {
                preset: preset.name.clone(),
            },
            DecodeOutcome::Failed(detail) => PresetError::Failed {
                preset: preset.name.clone(),
                detail,
            },
        };

        warn!("Decoder {} failed: {}", preset_label(index), error);
        if let Some(cb) = progress {
            cb.on_preset_failed(index, &preset.name, &error.to_string());
        }
        attempts.push(PresetAttempt {
            index,
            name: preset.name.clone(),
            error: Some(error),
            duration_ms,
        });
    }

    (None, attempts)
}
