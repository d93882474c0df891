pub mod bar;
pub mod circular;
pub mod intensity;
pub mod resize;
pub mod spectrum;
pub mod surface;
pub mod text;
pub mod waveform;

use surface::{Rgba, Surface};

use crate::visual::coordinator::FrameInput;
use crate::visual::preset::Preset;
use crate::visual::settings::VisualizationSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Text a renderer wants drawn. Coordinates are logical; `y` is the top edge.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Rgba,
    pub align: Align,
}

impl Label {
    pub fn new(text: impl Into<String>, x: f32, y: f32, size: f32, color: Rgba, align: Align) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size,
            color,
            align,
        }
    }
}

/// Seek request produced by an interactive renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekCommand {
    pub seconds: f64,
}

/// One drawing backend. Renderers only see the frame they are handed and keep
/// nothing but per-frame animation state.
pub trait Renderer {
    /// Paint the whole surface for this frame and return the text to overlay.
    fn draw(
        &mut self,
        surface: &mut Surface,
        frame: &FrameInput,
        settings: &VisualizationSettings,
    ) -> Vec<Label>;

    /// Map a pointer x (logical) on a surface `width` wide to a seek.
    fn seek_at(&self, _x: f32, _width: f32, _duration: f64) -> Option<SeekCommand> {
        None
    }
}

/// Build the backend for `preset`.
pub fn renderer_for(preset: Preset) -> Box<dyn Renderer> {
    let palette = preset.palette();
    match preset {
        Preset::Bar => Box::new(bar::BarRenderer::new(palette)),
        Preset::Circular(style) => {
            Box::new(circular::CircularRenderer::new(style, palette, preset.name()))
        }
        Preset::Spectrum => Box::new(spectrum::SpectrumRenderer::new(palette)),
        Preset::Waveform => Box::new(waveform::WaveformRenderer::new(palette)),
    }
}

/// "m:ss", or "h:mm:ss" past an hour.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    if total >= 3600 {
        format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    } else {
        format!("{}:{:02}", total / 60, total % 60)
    }
}
