//! Orchestrator tests over real files on disk.

use dng2png::{
    ConversionConfig, Converter, DecodeOutcome, DecodePreset, DecodeSource, Dng2PngError,
    RawDecoder, RawInput,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A decoder that runs but never produces pixels.
#[derive(Default)]
struct EmptyDecoder {
    calls: AtomicUsize,
}

impl RawDecoder for EmptyDecoder {
    fn decode(&self, input: RawInput<'_>, _preset: &DecodePreset) -> DecodeOutcome {
        assert!(!input.bytes.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        DecodeOutcome::Empty
    }
}

fn write_tiff(dir: &TempDir, name: &str) -> PathBuf {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(16, 9, |x, y| {
        Rgb([(x * 16) as u8, (y * 28) as u8, 128])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff)
        .unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, buf).unwrap();
    path
}

#[tokio::test]
async fn fallback_reads_tiff_container_when_presets_are_empty() {
    let dir = TempDir::new().unwrap();
    let input = write_tiff(&dir, "linear.dng");
    let output = dir.path().join("linear.png");

    let decoder = Arc::new(EmptyDecoder::default());
    let converter = Converter::with_decoders(
        ConversionConfig::default(),
        decoder.clone(),
        Arc::new(dng2png::pipeline::fallback::LenientImageDecoder),
    );

    let report = converter.convert_file(&input, &output).await.unwrap();

    assert_eq!(report.source, DecodeSource::Fallback);
    assert!(report.is_degraded());
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.attempts.len(), 3);
    assert!(report.attempts.iter().all(|a| !a.succeeded()));

    let png = image::open(&output).unwrap();
    assert_eq!((png.width(), png.height()), (16, 9));
    assert_eq!(report.output_bytes, std::fs::metadata(&output).unwrap().len());
}

#[tokio::test]
async fn garbage_input_fails_with_aggregate_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("garbage.dng");
    std::fs::write(&input, b"this is not an image of any kind").unwrap();
    let output = dir.path().join("garbage.png");

    let config = ConversionConfig::builder()
        .presets(vec![DecodePreset::new("only", 0, 0)])
        .build()
        .unwrap();
    let converter = Converter::with_decoders(
        config,
        Arc::new(EmptyDecoder::default()),
        Arc::new(dng2png::pipeline::fallback::LenientImageDecoder),
    );

    let err = converter.convert_file(&input, &output).await.unwrap_err();
    match &err {
        Dng2PngError::ConversionFailed { primary, fallback } => {
            assert_eq!(primary, "preset 'only' produced empty output");
            assert!(!fallback.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
    assert!(!dir.path().join("garbage.png.tmp").exists());
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("empty.dng");
    std::fs::write(&input, b"").unwrap();

    let converter = Converter::with_decoders(
        ConversionConfig::default(),
        Arc::new(EmptyDecoder::default()),
        Arc::new(dng2png::pipeline::fallback::LenientImageDecoder),
    );

    let err = converter
        .convert_file(&input, &dir.path().join("empty.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, Dng2PngError::EmptyInput { .. }));
}
