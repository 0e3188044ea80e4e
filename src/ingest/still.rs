//! Still image source for one-shot classification.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

pub struct StillImageSource {
    path: PathBuf,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(anyhow::anyhow!("image file {} does not exist", path.display()));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the image into an RGB8 frame.
    pub fn frame(&self) -> Result<Frame> {
        let image = image::open(&self.path)
            .with_context(|| format!("decode image {}", self.path.display()))?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Frame::new(rgb.into_raw(), width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn decodes_png_into_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hand.png");
        RgbImage::from_pixel(64, 48, Rgb([10, 20, 30])).save(&path)?;

        let frame = StillImageSource::open(&path)?.frame()?;
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
        Ok(())
    }

    #[test]
    fn missing_file_is_rejected() {
        assert!(StillImageSource::open("/nonexistent/hand.png").is_err());
    }
}
