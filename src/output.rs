//! Result types returned by the conversion and inspection entry points.

use crate::error::PresetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Human-facing name of the preset at a 0-based `index`. Logs and the CLI
/// count presets from 1; reports keep the 0-based index.
pub fn preset_label(index: usize) -> String {
    format!("preset #{}", index + 1)
}

/// Which stage produced the PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum DecodeSource {
    /// The decoder preset at this 0-based position in the configured list.
    Preset(usize),
    /// The lenient container decode after every preset failed.
    Fallback,
}

impl fmt::Display for DecodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeSource::Preset(index) => f.write_str(&preset_label(*index)),
            DecodeSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// One decoder preset invocation and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetAttempt {
    /// 0-based position in [`crate::config::ConversionConfig::presets`].
    pub index: usize,
    pub name: String,
    /// `None` when this attempt produced the output.
    pub error: Option<PresetError>,
    pub duration_ms: u64,
}

impl PresetAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one finished conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    pub output_bytes: u64,
    pub input_bytes: u64,
    pub width: u32,
    pub height: u32,
    pub source: DecodeSource,
    /// Every preset that was invoked, in order. Presets after the winning
    /// one are never invoked and do not appear.
    pub attempts: Vec<PresetAttempt>,
    pub decode_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionReport {
    /// True when the PNG came from the fallback path (degraded quality).
    pub fn is_degraded(&self) -> bool {
        self.source == DecodeSource::Fallback
    }
}

/// Sensor-level metadata read without demosaicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub make: String,
    pub model: String,
    pub clean_make: String,
    pub clean_model: String,
    pub width: usize,
    pub height: usize,
    /// Components per pixel: 1 for a Bayer mosaic, 3 for linear DNGs.
    pub components: usize,
    /// `"integer"` or `"float"`.
    pub sample_format: String,
    pub file_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_source_serialises_with_index() {
        let json = serde_json::to_string(&DecodeSource::Preset(1)).unwrap();
        assert_eq!(json, r#"{"kind":"preset","index":1}"#);
        let json = serde_json::to_string(&DecodeSource::Fallback).unwrap();
        assert_eq!(json, r#"{"kind":"fallback"}"#);
    }

    #[test]
    fn labels_count_from_one() {
        assert_eq!(preset_label(0), "preset #1");
        assert_eq!(DecodeSource::Preset(2).to_string(), "preset #3");
        assert_eq!(DecodeSource::Fallback.to_string(), "fallback");
    }
}
