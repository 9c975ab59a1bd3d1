use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use crate::device::Frame;

/// Still-image encoder for captured frames
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>>;

    /// MIME type of the encoded output
    fn mime_type(&self) -> &str;

    /// Suggested file name for the encoded output
    fn file_name(&self) -> &str;
}

/// Baseline JPEG encoder
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// `quality` is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        if frame.is_empty() {
            bail!("Cannot encode a zero-dimension frame");
        }

        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.rgb.len() != expected {
            bail!(
                "Frame buffer is {} bytes, expected {} for {}x{} RGB",
                frame.rgb.len(),
                expected,
                frame.width,
                frame.height
            );
        }

        let mut jpeg = Vec::new();
        let mut encoder = ImageJpegEncoder::new_with_quality(&mut jpeg, self.quality);
        encoder
            .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .context("Failed to encode JPEG")?;

        Ok(jpeg)
    }

    fn mime_type(&self) -> &str {
        "image/jpeg"
    }

    fn file_name(&self) -> &str {
        "capture.jpg"
    }
}
