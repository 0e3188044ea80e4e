//! Frames and the frame sampler.
//!
//! - `Frame`: RGB8 pixel buffer produced by an ingest source. Transient.
//! - `EncodedImage`: downsampled JPEG handed to the classification client.
//! - `FrameSampler`: scales a frame to a fixed width and JPEG-encodes it.
//!
//! The sampler holds configuration only. Every call allocates its own scratch
//! buffers and nothing is kept between calls.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, RgbImage};

/// Width every sampled frame is scaled to.
pub const TARGET_WIDTH: u32 = 320;

/// JPEG quality used for sampled frames.
pub const JPEG_QUALITY: u8 = 60;

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// RGB8 frame captured from a source.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap tightly packed RGB8 pixels. The buffer length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A source that has not reported its dimensions yet.
    pub fn not_ready() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Compressed image ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    /// Pixel size of the encoded image, used for coordinate normalisation.
    pub width: u32,
    pub height: u32,
}

/// Output size for a `width` x `height` source at the default target width.
///
/// Returns `None` for a source that is not ready (zero width or height).
pub fn sampled_dimensions(width: u32, height: u32) -> Option<(u32, u32)> {
    scaled_dimensions(width, height, TARGET_WIDTH)
}

fn scaled_dimensions(width: u32, height: u32, target_width: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || target_width == 0 {
        return None;
    }
    let scaled = (height as f64 * target_width as f64 / width as f64).round();
    // Very wide sources round to zero rows; the height is clamped to one.
    Some((target_width, (scaled as u32).max(1)))
}

#[derive(Clone, Debug)]
pub struct FrameSampler {
    target_width: u32,
    quality: u8,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self {
            target_width: TARGET_WIDTH,
            quality: JPEG_QUALITY,
        }
    }
}

impl FrameSampler {
    pub fn new(target_width: u32, quality: u8) -> Result<Self> {
        if target_width == 0 {
            return Err(anyhow!("sampler target width must be non-zero"));
        }
        if quality == 0 || quality > 100 {
            return Err(anyhow!("jpeg quality must be within 1..=100, got {}", quality));
        }
        Ok(Self {
            target_width,
            quality,
        })
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    /// Downsample and encode a frame.
    ///
    /// A frame that is not ready yields `Ok(None)`; that is not an error.
    pub fn sample(&self, frame: &Frame) -> Result<Option<EncodedImage>> {
        let Some((width, height)) = scaled_dimensions(frame.width, frame.height, self.target_width)
        else {
            log::debug!("sampler skipped: source not ready");
            return Ok(None);
        };

        let source = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let scaled = image::imageops::resize(&source, width, height, FilterType::Triangle);

        let mut bytes = Vec::with_capacity((width * height) as usize / 4);
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(scaled.as_raw(), width, height, ExtendedColorType::Rgb8)
            .context("encode sampled frame as jpeg")?;

        Ok(Some(EncodedImage {
            bytes,
            mime_type: JPEG_MIME_TYPE,
            width,
            height,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![90u8; (width * height * 3) as usize], width, height).unwrap()
    }

    #[test]
    fn output_height_follows_aspect_ratio() {
        for (w, h) in [(640, 480), (1280, 720), (1920, 1080), (333, 777), (1, 1), (4000, 3)] {
            let expected = (h as f64 * 320.0 / w as f64).round() as u32;
            assert_eq!(sampled_dimensions(w, h), Some((320, expected.max(1))));
        }
    }

    #[test]
    fn very_wide_sources_keep_one_row() {
        assert_eq!(sampled_dimensions(4000, 3), Some((320, 1)));
    }

    #[test]
    fn zero_dimensions_are_not_ready() {
        assert_eq!(sampled_dimensions(0, 480), None);
        assert_eq!(sampled_dimensions(640, 0), None);
    }

    #[test]
    fn sample_encodes_jpeg_at_target_width() -> Result<()> {
        let sampler = FrameSampler::default();
        let encoded = sampler.sample(&solid_frame(640, 480))?.expect("ready frame");
        assert_eq!((encoded.width, encoded.height), (320, 240));
        assert_eq!(encoded.mime_type, "image/jpeg");
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&encoded.bytes)?;
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
        Ok(())
    }

    #[test]
    fn sample_of_unready_frame_is_noop() -> Result<()> {
        let sampler = FrameSampler::default();
        assert!(sampler.sample(&Frame::not_ready())?.is_none());
        Ok(())
    }

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 10], 2, 2).is_err());
    }

    #[test]
    fn sampler_rejects_bad_quality() {
        assert!(FrameSampler::new(320, 0).is_err());
        assert!(FrameSampler::new(320, 101).is_err());
        assert!(FrameSampler::new(0, 60).is_err());
    }
}
