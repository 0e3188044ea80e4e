//! Overlay rendering.
//!
//! The preview is shown mirrored while the overlay surface is not, so text
//! reads correctly. The model's box refers to the unmirrored source frame and
//! is flipped horizontally before it is placed on the surface.

use image::{Rgba, RgbaImage};

use crate::classify::{DetectionResult, NormalizedBox};
use crate::state::{AppState, Settings};

/// Vertical offset of the label above the box, in pixels.
pub const LABEL_OFFSET: f64 = 40.0;
const LABEL_PADDING: f64 = 10.0;
const BOX_THICKNESS: u32 = 4;

const BOX_COLOR: Rgba<u8> = Rgba([0, 230, 118, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Flip a box horizontally. `y` is unchanged.
pub fn mirror_box(b: &NormalizedBox) -> NormalizedBox {
    NormalizedBox {
        ymin: b.ymin,
        xmin: 1.0 - b.xmax,
        ymax: b.ymax,
        xmax: 1.0 - b.xmin,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabelLayout {
    pub text: String,
    /// Background rectangle; its width follows the rendered text width.
    pub background: PixelRect,
}

/// Where the box and label go on a surface of a given size.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLayout {
    pub mirrored: NormalizedBox,
    pub rect: PixelRect,
    pub label: Option<LabelLayout>,
}

impl OverlayLayout {
    /// Layout for the current result, or `None` when nothing should be drawn.
    pub fn compute(
        result: Option<&DetectionResult>,
        settings: &Settings,
        surface_width: u32,
        surface_height: u32,
    ) -> Option<Self> {
        if !settings.show_overlay {
            return None;
        }
        let result = result?;
        let bounding_box = result.bounding_box()?;

        let mirrored = mirror_box(bounding_box);
        let (sw, sh) = (surface_width as f64, surface_height as f64);
        let rect = PixelRect {
            x: mirrored.xmin * sw,
            y: mirrored.ymin * sh,
            w: (mirrored.xmax - mirrored.xmin) * sw,
            h: (mirrored.ymax - mirrored.ymin) * sh,
        };
        let label = result.number().map(|number| {
            let text = number.to_string();
            LabelLayout {
                background: PixelRect {
                    x: rect.x,
                    y: rect.y - LABEL_OFFSET,
                    w: font::text_width(&text) as f64 + 2.0 * LABEL_PADDING,
                    h: LABEL_OFFSET,
                },
                text,
            }
        });

        Some(Self {
            mirrored,
            rect,
            label,
        })
    }
}

/// Transparent RGBA surface aligned with the video preview.
pub struct OverlaySurface {
    image: RgbaImage,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, CLEAR),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Resize to match the preview. Contents are cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::from_pixel(width, height, CLEAR);
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = CLEAR;
        }
    }

    /// Clear and redraw from the current state.
    pub fn render(&mut self, state: &AppState, settings: &Settings) -> Option<OverlayLayout> {
        self.clear();
        let layout = OverlayLayout::compute(
            state.current_result.as_ref(),
            settings,
            self.width(),
            self.height(),
        )?;

        stroke_rect(&mut self.image, &layout.rect, BOX_COLOR, BOX_THICKNESS);
        if let Some(label) = &layout.label {
            fill_rect(&mut self.image, &label.background, BOX_COLOR);
            let glyph_top = label.background.y + (label.background.h - font::GLYPH_HEIGHT as f64) / 2.0;
            font::draw_text(
                &mut self.image,
                &label.text,
                (label.background.x + LABEL_PADDING).round() as i64,
                glyph_top.round() as i64,
                TEXT_COLOR,
            );
        }
        Some(layout)
    }
}

fn put_pixel_clipped(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < img.width() as u64 && (y as u64) < img.height() as u64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(img: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>) {
    let x0 = rect.x.round().max(0.0) as i64;
    let y0 = rect.y.round().max(0.0) as i64;
    let x1 = (rect.x + rect.w).round().min(img.width() as f64) as i64;
    let y1 = (rect.y + rect.h).round().min(img.height() as f64) as i64;
    for y in y0..y1 {
        for x in x0..x1 {
            put_pixel_clipped(img, x, y, color);
        }
    }
}

fn stroke_rect(img: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>, thickness: u32) {
    let x0 = rect.x.round() as i64;
    let y0 = rect.y.round() as i64;
    let x1 = (rect.x + rect.w).round() as i64 - 1;
    let y1 = (rect.y + rect.h).round() as i64 - 1;
    if x1 < x0 || y1 < y0 {
        return;
    }
    for t in 0..thickness as i64 {
        let (xx0, yy0, xx1, yy1) = (x0 + t, y0 + t, x1 - t, y1 - t);
        if xx0 > xx1 || yy0 > yy1 {
            break;
        }
        for x in xx0..=xx1 {
            put_pixel_clipped(img, x, yy0, color);
            put_pixel_clipped(img, x, yy1, color);
        }
        for y in yy0..=yy1 {
            put_pixel_clipped(img, xx0, y, color);
            put_pixel_clipped(img, xx1, y, color);
        }
    }
}

/// Bitmap digits for the label. Only `0`-`9` are needed.
mod font {
    use image::{Rgba, RgbaImage};

    const COLUMNS: u32 = 5;
    const ROWS: u32 = 7;
    const SCALE: u32 = 4;
    const SPACING: u32 = 4;

    pub const GLYPH_WIDTH: u32 = COLUMNS * SCALE;
    pub const GLYPH_HEIGHT: u32 = ROWS * SCALE;

    const DIGITS: [[u8; 7]; 10] = [
        [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
    ];

    /// Rendered width of `text` in pixels.
    pub fn text_width(text: &str) -> u32 {
        let glyphs = text.chars().count() as u32;
        if glyphs == 0 {
            return 0;
        }
        glyphs * GLYPH_WIDTH + (glyphs - 1) * SPACING
    }

    pub fn draw_text(img: &mut RgbaImage, text: &str, x: i64, y: i64, color: Rgba<u8>) {
        let mut pen_x = x;
        for ch in text.chars() {
            if let Some(digit) = ch.to_digit(10) {
                draw_glyph(img, &DIGITS[digit as usize], pen_x, y, color);
            }
            pen_x += (GLYPH_WIDTH + SPACING) as i64;
        }
    }

    fn draw_glyph(img: &mut RgbaImage, rows: &[u8; 7], x: i64, y: i64, color: Rgba<u8>) {
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..COLUMNS {
                if bits & (1 << (COLUMNS - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        super::put_pixel_clipped(
                            img,
                            x + (col * SCALE + dx) as i64,
                            y + (row as u32 * SCALE + dy) as i64,
                            color,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn four_fingers() -> DetectionResult {
        let b = NormalizedBox::new(0.1, 0.2, 0.6, 0.7).unwrap();
        DetectionResult::detected(Some(4), Some(b), 0.87, None).unwrap()
    }

    #[test]
    fn mirroring_flips_x_only() {
        let b = NormalizedBox::new(0.25, 0.2, 0.75, 0.5).unwrap();
        let m = mirror_box(&b);
        assert_close(m.xmin, 0.5);
        assert_close(m.xmax, 0.8);
        assert_close(m.ymin, 0.25);
        assert_close(m.ymax, 0.75);
    }

    #[test]
    fn layout_places_mirrored_box_and_label() {
        let result = four_fingers();
        let layout = OverlayLayout::compute(Some(&result), &Settings::default(), 640, 480)
            .expect("layout");

        assert_close(layout.rect.x, 192.0);
        assert_close(layout.rect.y, 48.0);
        assert_close(layout.rect.w, 320.0);
        assert_close(layout.rect.h, 240.0);

        let label = layout.label.expect("label");
        assert_eq!(label.text, "4");
        assert_close(label.background.y, 8.0);
        assert_close(label.background.w, font::GLYPH_WIDTH as f64 + 20.0);
    }

    #[test]
    fn wider_labels_get_wider_backgrounds() {
        let b = NormalizedBox::new(0.5, 0.5, 0.9, 0.9).unwrap();
        let ten = DetectionResult::detected(Some(10), Some(b), 0.9, None).unwrap();
        let one = DetectionResult::detected(Some(1), Some(b), 0.9, None).unwrap();
        let settings = Settings::default();
        let wide = OverlayLayout::compute(Some(&ten), &settings, 100, 100).unwrap();
        let narrow = OverlayLayout::compute(Some(&one), &settings, 100, 100).unwrap();
        assert!(wide.label.unwrap().background.w > narrow.label.unwrap().background.w);
    }

    #[test]
    fn nothing_is_laid_out_without_box_or_when_hidden() {
        let settings = Settings::default();
        let no_box = DetectionResult::detected(Some(2), None, 0.5, None).unwrap();
        assert!(OverlayLayout::compute(Some(&no_box), &settings, 640, 480).is_none());
        assert!(OverlayLayout::compute(None, &settings, 640, 480).is_none());

        let hidden = Settings {
            show_overlay: false,
            ..settings
        };
        assert!(OverlayLayout::compute(Some(&four_fingers()), &hidden, 640, 480).is_none());
    }

    #[test]
    fn render_draws_box_then_clears() {
        let mut state = AppState::new();
        state.record(four_fingers());
        let mut surface = OverlaySurface::new(640, 480);

        assert!(surface.render(&state, &Settings::default()).is_some());
        assert_eq!(*surface.image().get_pixel(192, 200), BOX_COLOR);
        assert_eq!(*surface.image().get_pixel(511, 200), BOX_COLOR);
        assert_eq!(*surface.image().get_pixel(352, 168), CLEAR);
        // label background above the box
        assert_eq!(*surface.image().get_pixel(193, 9), BOX_COLOR);

        state.record(DetectionResult::error());
        assert!(surface.render(&state, &Settings::default()).is_none());
        assert!(surface.image().pixels().all(|p| *p == CLEAR));
    }
}
