use super::intensity::{AnimationPhase, DecayingIntensity};
use super::surface::{Rgba, Surface};
use super::{Align, Label, Renderer};
use crate::visual::coordinator::FrameInput;
use crate::visual::preset::Palette;
use crate::visual::settings::VisualizationSettings;

const BAR_COUNT: usize = 64;

/// Classic bottom-up frequency bars.
pub struct BarRenderer {
    palette: Palette,
    pulse: DecayingIntensity,
    phase: AnimationPhase,
}

impl BarRenderer {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            pulse: DecayingIntensity::beat_pulse(),
            phase: AnimationPhase::default(),
        }
    }
}

impl Renderer for BarRenderer {
    fn draw(
        &mut self,
        surface: &mut Surface,
        frame: &FrameInput,
        settings: &VisualizationSettings,
    ) -> Vec<Label> {
        let (w, h) = (surface.logical_width(), surface.logical_height());
        let sens = settings.sensitivity();
        let playing = frame.is_playing();
        let pal = self.palette;

        surface.clear(pal.background);
        let phase = self.phase.advance(playing, sens);
        let beat_active = playing && frame.beat.confidence > 0.5 * settings.smoothing();
        let pulse = self.pulse.step(beat_active, sens, settings.smoothing());

        let bar_w = w / BAR_COUNT as f32;
        if !frame.has_signal() {
            for i in 0..BAR_COUNT {
                let x = i as f32 * bar_w;
                surface.fill_rect(x + 1.0, h - 10.0, bar_w - 2.0, 5.0, pal.primary.with_alpha(0x30));
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
        let beat_mult = 1.0 + pulse * 0.5;

        for (i, level) in levels.into_iter().enumerate() {
            let wobble = (phase + i as f32 * 0.1).sin() * 0.1;
            let bar_h = ((level * sens + wobble) * (h * 0.8) * beat_mult).max(0.0);
            let x = i as f32 * bar_w;
            let y = h - bar_h;

            let color = if (i as f32) < BAR_COUNT as f32 * 0.2 {
                if pulse > 0.3 {
                    pal.accent
                } else {
                    pal.primary
                }
            } else if (i as f32) < BAR_COUNT as f32 * 0.6 {
                pal.secondary
            } else {
                pal.primary
            };

            surface.fill_rect_gradient(
                x + 1.0,
                y,
                bar_w - 2.0,
                bar_h,
                &[(0.0, color), (1.0, color.with_alpha(0xaa))],
            );
            if pulse > 0.5 {
                surface.fill_rect(x + 1.0, y - 3.0, bar_w - 2.0, 3.0, pal.accent);
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{BeatSnapshot, FrequencySnapshot, PlaybackState};
    use crate::visual::preset::Preset;

    fn frame(db: f32, state: PlaybackState) -> FrameInput {
        FrameInput {
            frequency: FrequencySnapshot {
                bins: vec![db; 1024],
                min_db: -140.0,
                max_db: 0.0,
            },
            beat: BeatSnapshot::default(),
            position: 1.0,
            duration: 10.0,
            state,
            nyquist: 22_050.0,
            envelope: None,
        }
    }

    #[test]
    fn idle_draws_stubs_and_a_notice() {
        let palette = Preset::Bar.palette();
        let mut renderer = BarRenderer::new(palette);
        let mut surface = Surface::new(320, 100, 1.0);
        let labels = renderer.draw(
            &mut surface,
            &frame(-140.0, PlaybackState::Idle),
            &VisualizationSettings::default(),
        );
        assert_eq!(labels.len(), 1);
        assert_eq!(surface.pixel(162, 10), Some(palette.background));
        assert_ne!(surface.pixel(162, 92), Some(palette.background));
    }

    #[test]
    fn loud_signal_fills_upwards() {
        let palette = Preset::Bar.palette();
        let mut renderer = BarRenderer::new(palette);
        let mut surface = Surface::new(320, 100, 1.0);
        let labels = renderer.draw(
            &mut surface,
            &frame(-14.0, PlaybackState::Playing),
            &VisualizationSettings::default(),
        );
        assert!(labels.is_empty());
        // mid-band bar, well above the idle stub
        assert_ne!(surface.pixel(162, 40), Some(palette.background));
        assert_eq!(surface.pixel(162, 2), Some(palette.background));
    }
}
