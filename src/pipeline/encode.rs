//! PNG encoding and atomic output writes.
//!
//! Every output uses the same fixed encoder settings: adaptive filtering and
//! the configured zlib effort (moderate by default). The file is written to
//! a sibling `.tmp` path and renamed into place, so a reader never sees a
//! half-written PNG and a failed write leaves nothing behind.

use crate::config::PngCompression;
use crate::error::Dng2PngError;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

impl From<PngCompression> for CompressionType {
    fn from(level: PngCompression) -> Self {
        match level {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Moderate => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage, level: PngCompression) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, level.into(), FilterType::Adaptive);
    img.write_with_encoder(encoder)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Write `bytes` to `path` via a temp file + rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Dng2PngError> {
    let write_err = |e| Dng2PngError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("png.tmp");
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img, PngCompression::Moderate).expect("encode should succeed");
        assert!(png.starts_with(PNG_SIGNATURE));

        let back = image::load_from_memory(&png).expect("valid png");
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out.png");

        write_atomic(&out, b"png-bytes").await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"png-bytes");
        assert!(!out.with_extension("png.tmp").exists());
    }
}
