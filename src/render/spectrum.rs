use super::intensity::DecayingIntensity;
use super::surface::{Rgba, Surface};
use super::{Align, Label, Renderer};
use crate::visual::coordinator::FrameInput;
use crate::visual::preset::Palette;
use crate::visual::settings::VisualizationSettings;

const BAR_COUNT: usize = 64;
/// Peak markers fall this many logical pixels per frame once released.
const PEAK_FALL: f32 = 2.0;
const LABELLED_BARS: usize = 8;
const GRID_COLOR: Rgba = Rgba::hex(0x333333);
const LABEL_COLOR: Rgba = Rgba::hex(0x666666);

/// Analyzer-style bars with peak-hold markers and a dB grid.
pub struct SpectrumRenderer {
    palette: Palette,
    peaks: Vec<DecayingIntensity>,
}

impl SpectrumRenderer {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            peaks: vec![DecayingIntensity::new(0.0, PEAK_FALL); BAR_COUNT],
        }
    }

    /// Current peak-hold heights in logical pixels.
    pub fn peak_heights(&self) -> Vec<f32> {
        self.peaks.iter().map(DecayingIntensity::value).collect()
    }
}

fn frequency_label(hz: f32) -> String {
    if hz < 1000.0 {
        format!("{}Hz", hz.round() as u32)
    } else {
        format!("{:.1}kHz", hz / 1000.0)
    }
}

impl Renderer for SpectrumRenderer {
    fn draw(
        &mut self,
        surface: &mut Surface,
        frame: &FrameInput,
        settings: &VisualizationSettings,
    ) -> Vec<Label> {
        let (w, h) = (surface.logical_width(), surface.logical_height());
        let sens = settings.sensitivity();
        let pal = self.palette;
        let bar_w = w / BAR_COUNT as f32;

        surface.clear(pal.background);

        if !frame.has_signal() {
            self.peaks.iter_mut().for_each(DecayingIntensity::reset);
            for i in 0..BAR_COUNT {
                let x = i as f32 * bar_w;
                surface.fill_rect(x + 1.0, h - 5.0, bar_w - 2.0, 3.0, pal.primary.with_alpha(0x20));
            }
            return vec![Label::new(
                "No audio signal",
                w / 2.0,
                h / 2.0 - 7.0,
                14.0,
                Rgba::hex(0x9ca3af),
                Align::Center,
            )];
        }

        let levels = frame
            .frequency
            .bucket_levels(0..frame.frequency.len(), BAR_COUNT);
        let hold = 10.0 * settings.smoothing();
        let mut labels = Vec::new();

        for (i, (level, peak)) in levels.into_iter().zip(self.peaks.iter_mut()).enumerate() {
            let bar_h = (level * h * 0.9 * sens).max(0.0);
            let peak_h = peak.follow(bar_h, hold, sens);
            let x = i as f32 * bar_w;

            surface.fill_rect_gradient(
                x + 1.0,
                h - bar_h,
                bar_w - 2.0,
                bar_h,
                &[
                    (0.0, pal.primary),
                    (0.5, pal.primary.with_alpha(0xaa)),
                    (1.0, pal.secondary),
                ],
            );
            surface.fill_rect(x + 1.0, h - peak_h - 2.0, bar_w - 2.0, 2.0, pal.accent);

            if i < LABELLED_BARS && i % 2 == 0 {
                let hz = i as f32 * frame.nyquist / BAR_COUNT as f32;
                labels.push(Label::new(
                    frequency_label(hz),
                    x + bar_w / 2.0,
                    h - 12.0,
                    10.0,
                    LABEL_COLOR,
                    Align::Center,
                ));
            }
        }

        for i in 1..=4 {
            surface.dashed_hline(h / 5.0 * i as f32, 2.0 * sens, sens, GRID_COLOR);
        }

        let span = frame.frequency.max_db - frame.frequency.min_db;
        for i in 0..4 {
            let db = frame.frequency.max_db - span * i as f32 / 5.0;
            labels.push(Label::new(
                format!("{}dB", db.round() as i32),
                w - 4.0,
                h / 5.0 * i as f32 + 2.0,
                10.0,
                LABEL_COLOR,
                Align::Right,
            ));
        }
        labels
    }
}
