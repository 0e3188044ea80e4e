use anyhow::{anyhow, Result};

/// Pixel layouts a camera may deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    /// Packed YUV 4:2:2 (Y0 U Y1 V), the default of most UVC webcams.
    Yuyv,
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = plane_len(width, height, 3)?;
            if pixels.len() < expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            // Drivers may pad the final buffer; keep only the image.
            Ok(pixels[..expected].to_vec())
        }
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
    }
}

fn plane_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width must be even, got {}", width));
    }
    let expected = plane_len(width, height, 2)?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = Vec::with_capacity(plane_len(width, height, 3)?);
    for quad in pixels[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for y in [quad[0], quad[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_neutral_chroma_produces_gray() -> Result<()> {
        let yuyv = vec![128u8; 2 * 2 * 2];
        let rgb = normalize_to_rgb(&yuyv, 2, 2, PixelFormat::Yuyv)?;
        assert_eq!(rgb, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn yuyv_rejects_odd_width() {
        assert!(normalize_to_rgb(&[0u8; 6], 3, 1, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn rgb_pass_through_trims_driver_padding() -> Result<()> {
        let mut pixels = vec![7u8; 9];
        pixels.extend_from_slice(&[0u8; 3]);
        let rgb = normalize_to_rgb(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(rgb, vec![7u8; 9]);
        Ok(())
    }

    #[test]
    fn rgb_rejects_short_buffer() {
        assert!(normalize_to_rgb(&[0u8; 5], 1, 3, PixelFormat::Rgb24).is_err());
    }
}
