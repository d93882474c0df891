//! Physical sizing and resize coalescing for hosts whose output area can
//! change while rendering. Window events go through
//! [`VisualizationCoordinator::observe_resize`](crate::visual::coordinator::VisualizationCoordinator::observe_resize);
//! the offline renderer in the binary keeps one size for the whole run.

use std::time::{Duration, Instant};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Container size in logical units plus the display's pixel density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
    pub css_width: f32,
    pub css_height: f32,
    pub device_pixel_ratio: f32,
}

impl SurfaceSize {
    pub fn new(css_width: f32, css_height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            css_width,
            css_height,
            device_pixel_ratio,
        }
    }

    /// Backing-store size in physical pixels, at least 1x1.
    pub fn physical(&self) -> (u32, u32) {
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        let dim = |css: f32| {
            if css.is_finite() {
                ((css * dpr).round() as u32).max(1)
            } else {
                1
            }
        };
        (dim(self.css_width), dim(self.css_height))
    }
}

/// Coalesces bursts of resize notifications: a size is released only once no
/// newer one has arrived for the quiet period.
pub struct ResizeDebouncer {
    quiet: Duration,
    pending: Option<(SurfaceSize, Instant)>,
    applied: Option<SurfaceSize>,
}

impl ResizeDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            applied: None,
        }
    }

    pub fn observe(&mut self, size: SurfaceSize, now: Instant) {
        self.pending = Some((size, now));
    }

    /// Called between frames. Returns the size to apply, if one has settled and
    /// differs from the last applied size.
    pub fn poll(&mut self, now: Instant) -> Option<SurfaceSize> {
        let (size, seen) = self.pending?;
        if now.saturating_duration_since(seen) < self.quiet {
            return None;
        }
        self.pending = None;
        if self.applied == Some(size) {
            return None;
        }
        log::debug!(
            "Surface resized to {}x{} @{}x",
            size.css_width,
            size.css_height,
            size.device_pixel_ratio
        );
        self.applied = Some(size);
        Some(size)
    }
}

impl Default for ResizeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}
