use bytemuck::{Pod, Zeroable};

use super::resize::SurfaceSize;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::hex(0xffffff);
    pub const BLACK: Rgba = Rgba::hex(0x000000);

    /// Opaque colour from `0xRRGGBB`.
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: (rgb >> 16) as u8,
            g: (rgb >> 8) as u8,
            b: rgb as u8,
            a: 255,
        }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// Interpolate a list of `(offset, colour)` stops sorted by offset.
pub fn gradient_at(stops: &[(f32, Rgba)], t: f32) -> Rgba {
    match stops {
        [] => Rgba::default(),
        [(_, only)] => *only,
        _ => {
            let t = t.clamp(0.0, 1.0);
            for pair in stops.windows(2) {
                let (t0, c0) = pair[0];
                let (t1, c1) = pair[1];
                if t <= t1 {
                    let span = (t1 - t0).max(f32::EPSILON);
                    return c0.lerp(c1, (t - t0) / span);
                }
            }
            stops[stops.len() - 1].1
        }
    }
}

/// CPU RGBA canvas. Drawing calls take logical (CSS-like) coordinates which
/// are multiplied by `scale` to reach physical pixels.
pub struct Surface {
    width: u32,
    height: u32,
    scale: f32,
    pixels: Vec<Rgba>,
}

impl Surface {
    pub fn new(width: u32, height: u32, scale: f32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        Self {
            width,
            height,
            scale,
            pixels: vec![Rgba::BLACK; width as usize * height as usize],
        }
    }

    pub fn from_size(size: SurfaceSize) -> Self {
        let (w, h) = size.physical();
        Self::new(w, h, size.device_pixel_ratio)
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        *self = Self::from_size(size);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn logical_width(&self) -> f32 {
        self.width as f32 / self.scale
    }

    pub fn logical_height(&self) -> f32 {
        self.height as f32 / self.scale
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    /// Physical pixel lookup.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn clear(&mut self, color: Rgba) {
        self.pixels.fill(color.with_alpha(255));
    }

    /// Source-over blend of `color` at physical `(x, y)`, weighted by `coverage`.
    fn blend(&mut self, x: i64, y: i64, color: Rgba, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let a = color.a as f32 / 255.0 * coverage.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let idx = (y as usize) * self.width as usize + x as usize;
        let dst = &mut self.pixels[idx];
        let inv = 1.0 - a;
        dst.r = (color.r as f32 * a + dst.r as f32 * inv).round() as u8;
        dst.g = (color.g as f32 * a + dst.g as f32 * inv).round() as u8;
        dst.b = (color.b as f32 * a + dst.b as f32 * inv).round() as u8;
        dst.a = 255;
    }

    /// Physical span of a logical interval; non-empty intervals cover at least
    /// one pixel.
    fn span(&self, start: f32, len: f32) -> (i64, i64) {
        let (lo, hi) = if len < 0.0 { (start + len, start) } else { (start, start + len) };
        let p0 = (lo * self.scale).round() as i64;
        let mut p1 = (hi * self.scale).round() as i64;
        if p1 <= p0 && hi > lo {
            p1 = p0 + 1;
        }
        (p0, p1)
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        let (x0, x1) = self.span(x, w);
        let (y0, y1) = self.span(y, h);
        for py in y0.max(0)..y1.min(self.height as i64) {
            for px in x0.max(0)..x1.min(self.width as i64) {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    /// Vertical gradient; stop offset 0.0 is the bottom edge, 1.0 the top.
    pub fn fill_rect_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, stops: &[(f32, Rgba)]) {
        let (x0, x1) = self.span(x, w);
        let (y0, y1) = self.span(y, h);
        let rows = (y1 - y0).max(1) as f32;
        for py in y0.max(0)..y1.min(self.height as i64) {
            let t = 1.0 - (py - y0) as f32 / rows;
            let color = gradient_at(stops, t);
            for px in x0.max(0)..x1.min(self.width as i64) {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    pub fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgba) {
        let s = self.scale;
        let (ax, ay, bx, by) = (x1 * s, y1 * s, x2 * s, y2 * s);
        let half = (width * s).max(1.0) / 2.0;
        let reach = half + 1.0;

        let min_x = (ax.min(bx) - reach).floor().max(0.0) as i64;
        let max_x = (ax.max(bx) + reach).ceil().min(self.width as f32) as i64;
        let min_y = (ay.min(by) - reach).floor().max(0.0) as i64;
        let max_y = (ay.max(by) + reach).ceil().min(self.height as f32) as i64;

        let (dx, dy) = (bx - ax, by - ay);
        let len_sq = dx * dx + dy * dy;
        for py in min_y..max_y {
            for px in min_x..max_x {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                let t = if len_sq > 0.0 {
                    (((cx - ax) * dx + (cy - ay) * dy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let d = ((cx - ax - t * dx).powi(2) + (cy - ay - t * dy).powi(2)).sqrt();
                self.blend(px, py, color, half + 0.5 - d);
            }
        }
    }

    fn circle_bounds(&self, cx: f32, cy: f32, reach: f32) -> (i64, i64, i64, i64) {
        (
            (cx - reach).floor().max(0.0) as i64,
            (cx + reach).ceil().min(self.width as f32) as i64,
            (cy - reach).floor().max(0.0) as i64,
            (cy + reach).ceil().min(self.height as f32) as i64,
        )
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        let s = self.scale;
        let (cx, cy, r) = (cx * s, cy * s, radius.max(0.0) * s);
        let (x0, x1, y0, y1) = self.circle_bounds(cx, cy, r + 1.0);
        for py in y0..y1 {
            for px in x0..x1 {
                let d = ((px as f32 + 0.5 - cx).powi(2) + (py as f32 + 0.5 - cy).powi(2)).sqrt();
                self.blend(px, py, color, r + 0.5 - d);
            }
        }
    }

    pub fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32, width: f32, color: Rgba) {
        let s = self.scale;
        let (cx, cy, r) = (cx * s, cy * s, radius.max(0.0) * s);
        let half = (width * s).max(1.0) / 2.0;
        let (x0, x1, y0, y1) = self.circle_bounds(cx, cy, r + half + 1.0);
        for py in y0..y1 {
            for px in x0..x1 {
                let d = ((px as f32 + 0.5 - cx).powi(2) + (py as f32 + 0.5 - cy).powi(2)).sqrt();
                self.blend(px, py, color, half + 0.5 - (d - r).abs());
            }
        }
    }

    /// Disc shaded from `inner` at the centre to `outer` at `radius`.
    pub fn fill_radial(&mut self, cx: f32, cy: f32, radius: f32, inner: Rgba, outer: Rgba) {
        let s = self.scale;
        let (cx, cy, r) = (cx * s, cy * s, radius.max(0.0) * s);
        if r <= 0.0 {
            return;
        }
        let (x0, x1, y0, y1) = self.circle_bounds(cx, cy, r);
        for py in y0..y1 {
            for px in x0..x1 {
                let d = ((px as f32 + 0.5 - cx).powi(2) + (py as f32 + 0.5 - cy).powi(2)).sqrt();
                if d <= r {
                    self.blend(px, py, inner.lerp(outer, d / r), 1.0);
                }
            }
        }
    }

    /// Full-width horizontal dashed line at logical `y`.
    pub fn dashed_hline(&mut self, y: f32, dash: f32, width: f32, color: Rgba) {
        let dash = dash.max(0.5);
        let total = self.logical_width();
        let mut x = 0.0;
        while x < total {
            self.fill_rect(x, y - width / 2.0, dash.min(total - x), width, color);
            x += dash * 2.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_alpha() {
        let c = Rgba::hex(0x4f46e5).with_alpha(0x30);
        assert_eq!((c.r, c.g, c.b, c.a), (0x4f, 0x46, 0xe5, 0x30));
    }

    #[test]
    fn bytes_are_tightly_packed_rgba() {
        let mut surface = Surface::new(3, 2, 1.0);
        surface.clear(Rgba::hex(0x102030));
        let bytes = surface.as_bytes();
        assert_eq!(bytes.len(), 3 * 2 * 4);
        assert_eq!(&bytes[..4], &[0x10, 0x20, 0x30, 0xff]);
    }

    #[test]
    fn logical_coordinates_scale_to_physical() {
        let mut surface = Surface::new(20, 20, 2.0);
        assert_eq!(surface.logical_width(), 10.0);
        surface.clear(Rgba::BLACK);
        surface.fill_rect(5.0, 5.0, 5.0, 5.0, Rgba::WHITE);
        assert_eq!(surface.pixel(10, 10), Some(Rgba::WHITE));
        assert_eq!(surface.pixel(19, 19), Some(Rgba::WHITE));
        assert_eq!(surface.pixel(9, 9), Some(Rgba::BLACK));
    }

    #[test]
    fn translucent_fill_blends() {
        let mut surface = Surface::new(1, 1, 1.0);
        surface.clear(Rgba::BLACK);
        surface.fill_rect(0.0, 0.0, 1.0, 1.0, Rgba::WHITE.with_alpha(128));
        let p = surface.pixel(0, 0).unwrap();
        assert!((127..=129).contains(&p.r));
        assert_eq!(p.a, 255);
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let mut surface = Surface::new(8, 8, 1.0);
        surface.fill_rect(-50.0, -50.0, 200.0, 200.0, Rgba::WHITE);
        surface.stroke_line(-10.0, 4.0, 30.0, 4.0, 2.0, Rgba::WHITE);
        surface.fill_circle(100.0, 100.0, 5.0, Rgba::WHITE);
        assert_eq!(surface.pixel(7, 7), Some(Rgba::WHITE));
    }

    #[test]
    fn circle_covers_its_centre_only() {
        let mut surface = Surface::new(21, 21, 1.0);
        surface.fill_circle(10.5, 10.5, 3.0, Rgba::WHITE);
        assert_eq!(surface.pixel(10, 10), Some(Rgba::WHITE));
        assert_eq!(surface.pixel(0, 0), Some(Rgba::BLACK));
    }

    #[test]
    fn gradient_stops_interpolate() {
        let stops = [(0.0, Rgba::BLACK), (1.0, Rgba::WHITE)];
        assert_eq!(gradient_at(&stops, 0.0), Rgba::BLACK);
        assert_eq!(gradient_at(&stops, 1.0), Rgba::WHITE);
        let mid = gradient_at(&stops, 0.5);
        assert!((127..=128).contains(&mid.r));
    }
}
