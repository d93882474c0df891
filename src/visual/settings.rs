pub const MIN_SENSITIVITY: f32 = 0.1;
pub const MAX_SENSITIVITY: f32 = 2.0;
pub const MIN_SMOOTHING: f32 = 0.1;
pub const MAX_SMOOTHING: f32 = 1.0;

/// User-facing tuning shared by every renderer. Values are always in range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualizationSettings {
    sensitivity: f32,
    smoothing: f32,
}

fn clamp_or(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

impl VisualizationSettings {
    pub fn new(sensitivity: f32, smoothing: f32) -> Self {
        let mut settings = Self::default();
        settings.set_sensitivity(sensitivity);
        settings.set_smoothing(smoothing);
        settings
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_sensitivity(&mut self, value: f32) {
        self.sensitivity = clamp_or(value, MIN_SENSITIVITY, MAX_SENSITIVITY);
    }

    pub fn set_smoothing(&mut self, value: f32) {
        self.smoothing = clamp_or(value, MIN_SMOOTHING, MAX_SMOOTHING);
    }
}

impl Default for VisualizationSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            smoothing: 0.8,
        }
    }
}
