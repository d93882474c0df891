use std::path::Path;

use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};

use super::surface::{Rgba, Surface};
use super::{Align, Label};
use crate::audio::fetch::{is_remote, Fetch};

/// Download a font file over HTTP(S).
pub fn load_font_from_url(url: &str, fetcher: &dyn Fetch) -> Result<Vec<u8>> {
    fetcher
        .fetch(url)
        .with_context(|| format!("Failed to download font from {}", url))
}

pub struct TextOverlay {
    font: Font,
}

impl TextOverlay {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font })
    }

    /// Load from a local path, or from an http(s) URL through `fetcher`.
    pub fn load(source: &str, fetcher: &dyn Fetch) -> Result<Self> {
        let data = if is_remote(source) {
            load_font_from_url(source, fetcher)?
        } else {
            std::fs::read(Path::new(source))
                .with_context(|| format!("Failed to read font {}", source))?
        };
        Self::from_bytes(&data)
    }

    /// Composite text onto an RGBA pixel buffer with its top-left at (x, y).
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: i32,
        y: i32,
        px: f32,
        color: Rgba,
    ) {
        let mut cursor_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, px);
            let glyph_y = y + px as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }

                    let px_x = cursor_x + gx as i32;
                    let px_y = glyph_y + gy as i32;
                    if px_x < 0 || px_y < 0 || px_x >= width as i32 || px_y >= height as i32 {
                        continue;
                    }

                    let idx = ((px_y as u32 * width + px_x as u32) * 4) as usize;
                    if idx + 3 >= pixels.len() {
                        continue;
                    }

                    let a = alpha as f32 / 255.0 * (color.a as f32 / 255.0);
                    let inv_a = 1.0 - a;
                    pixels[idx] = (color.r as f32 * a + pixels[idx] as f32 * inv_a) as u8;
                    pixels[idx + 1] = (color.g as f32 * a + pixels[idx + 1] as f32 * inv_a) as u8;
                    pixels[idx + 2] = (color.b as f32 * a + pixels[idx + 2] as f32 * inv_a) as u8;
                    pixels[idx + 3] = 255;
                }
            }

            cursor_x += metrics.advance_width.round() as i32;
        }
    }

    /// Width of rendered text in pixels at size `px`.
    pub fn measure_width(&self, text: &str, px: f32) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, px).advance_width.round())
            .sum();
        width.max(0.0) as u32
    }

    pub fn line_height(&self, px: f32) -> u32 {
        self.font
            .horizontal_line_metrics(px)
            .map_or(px, |m| m.new_line_size)
            .ceil() as u32
    }

    /// Draw a renderer label, converting its logical position to pixels.
    pub fn draw_label(&self, surface: &mut Surface, label: &Label) {
        let scale = surface.scale();
        let px = (label.size * scale).max(1.0);
        let text_w = self.measure_width(&label.text, px) as f32;
        let anchor = label.x * scale;
        let x = match label.align {
            Align::Left => anchor,
            Align::Center => anchor - text_w / 2.0,
            Align::Right => anchor - text_w,
        };
        let (width, height) = (surface.width(), surface.height());
        self.composite(
            surface.as_bytes_mut(),
            width,
            height,
            &label.text,
            x.round() as i32,
            (label.y * scale).round() as i32,
            px,
            label.color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

    /// Inclusive bounds (min_x, max_x, min_y, max_y) of every lit pixel.
    fn ink(surface: &Surface) -> (u32, u32, u32, u32) {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..surface.height() {
            for x in 0..surface.width() {
                if surface.pixel(x, y).is_some_and(|p| p.r > 0) {
                    bounds = Some(match bounds {
                        None => (x, x, y, y),
                        Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
                    });
                }
            }
        }
        bounds.expect("label left no ink")
    }

    /// "MM" anchored at logical (50, 5), 10pt, on a 2x surface.
    fn draw(align: Align) -> (u32, u32, u32, u32) {
        let overlay = TextOverlay::from_bytes(FIXTURE_FONT).unwrap();
        let mut surface = Surface::new(200, 60, 2.0);
        overlay.draw_label(&mut surface, &Label::new("MM", 50.0, 5.0, 10.0, Rgba::WHITE, align));
        ink(&surface)
    }

    #[test]
    fn alignment_is_relative_to_the_anchor() {
        let overlay = TextOverlay::from_bytes(FIXTURE_FONT).unwrap();
        let w = overlay.measure_width("MM", 20.0);
        assert!(w > 0);

        let left = draw(Align::Left);
        let center = draw(Align::Center);
        let right = draw(Align::Right);

        assert!(left.0 >= 100 && left.1 <= 100 + w, "left {:?}, width {}", left, w);
        assert!(right.1 < 100 && right.0 + w >= 100, "right {:?}, width {}", right, w);
        assert_eq!(left.0 - right.0, w);
        assert!((left.0 - center.0).abs_diff(w / 2) <= 1, "center {:?}, width {}", center, w);
    }

    #[test]
    fn label_geometry_is_scaled_to_device_pixels() {
        let (_, _, top, bottom) = draw(Align::Left);
        // 5 logical -> 10 px from the top, baseline 20 px below that
        assert!(top >= 10, "top {}", top);
        assert!(bottom <= 30, "bottom {}", bottom);
        // capital height of a 20 px face, not a 10 px one
        assert!(bottom - top > 10, "glyph height {}", bottom - top);
    }

    #[test]
    fn labels_past_the_edge_are_clipped() {
        let overlay = TextOverlay::from_bytes(FIXTURE_FONT).unwrap();
        let mut surface = Surface::new(40, 20, 1.0);
        overlay.draw_label(&mut surface, &Label::new("MMMM", 30.0, 10.0, 16.0, Rgba::WHITE, Align::Left));
        overlay.draw_label(&mut surface, &Label::new("MMMM", 10.0, -8.0, 16.0, Rgba::WHITE, Align::Right));
        assert_eq!(surface.width(), 40);
    }

    #[test]
    fn fonts_load_from_paths_and_urls() {
        use crate::test_support::CannedFetcher;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.ttf");
        std::fs::write(&path, FIXTURE_FONT).unwrap();
        let fetcher = CannedFetcher::new().route(
            "https://fonts.test/fixture.ttf",
            FIXTURE_FONT.to_vec(),
            Duration::ZERO,
        );

        assert!(TextOverlay::load(path.to_str().unwrap(), &fetcher).is_ok());
        assert!(TextOverlay::load("https://fonts.test/fixture.ttf", &fetcher).is_ok());
        assert!(TextOverlay::load("https://fonts.test/missing.ttf", &fetcher).is_err());
    }
}
