//! Fallback decode: treat the uploaded bytes as an ordinary image container.
//!
//! DNG files are TIFF containers and many embed a full-size or preview
//! image the `image` crate can read without demosaicing. The result is of
//! degraded quality compared to a real RAW render, but it is better than
//! refusing the upload.

use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// A decoder that reads already-rendered image containers.
pub trait ContainerDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, String>;
}

/// `image`-crate decoder with format sniffing and no allocation limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct LenientImageDecoder;

impl ContainerDecoder for LenientImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, String> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())?;
        debug!("Fallback container format: {:?}", reader.format());
        reader.no_limits();

        let img = reader.decode().map_err(|e| e.to_string())?;
        if img.width() == 0 || img.height() == 0 {
            return Err("container decoded to an empty image".to_string());
        }
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    #[test]
    fn decodes_plain_tiff() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([1, 2, 3])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff)
            .unwrap();

        let decoded = LenientImageDecoder.decode(&buf).expect("tiff should decode");
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn rejects_unknown_bytes() {
        let err = LenientImageDecoder
            .decode(b"definitely not an image")
            .unwrap_err();
        assert!(!err.is_empty());
    }
}
