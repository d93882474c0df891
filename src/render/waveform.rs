use super::intensity::DecayingIntensity;
use super::surface::{Rgba, Surface};
use super::{format_clock, Align, Label, Renderer, SeekCommand};
use crate::visual::coordinator::FrameInput;
use crate::visual::preset::Palette;
use crate::visual::settings::VisualizationSettings;

const TIME_COLOR: Rgba = Rgba::hex(0x9ca3af);
const GLOW_RADIUS: f32 = 20.0;

/// Whole-track overview with a playhead. The only renderer that accepts clicks.
pub struct WaveformRenderer {
    palette: Palette,
    pulse: DecayingIntensity,
}

impl WaveformRenderer {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            pulse: DecayingIntensity::beat_pulse(),
        }
    }
}

/// Linear map of a pointer position over `[0, width]` onto `[0, duration]`.
pub fn seek_for_pointer(x: f32, width: f32, duration: f64) -> Option<SeekCommand> {
    if !(duration > 0.0 && duration.is_finite() && width > 0.0 && x.is_finite()) {
        return None;
    }
    let seconds = (x as f64 / width as f64 * duration).clamp(0.0, duration);
    Some(SeekCommand { seconds })
}

impl Renderer for WaveformRenderer {
    fn draw(
        &mut self,
        surface: &mut Surface,
        frame: &FrameInput,
        settings: &VisualizationSettings,
    ) -> Vec<Label> {
        let (w, h) = (surface.logical_width(), surface.logical_height());
        let sens = settings.sensitivity();
        let pal = self.palette;
        surface.clear(pal.background);

        let playing = frame.is_playing();
        let pulse = self.pulse.step(
            playing && frame.beat.is_onset,
            sens,
            settings.smoothing(),
        );

        let envelope = match frame.envelope.as_deref() {
            Some(env) if !env.is_empty() => env,
            _ => {
                return vec![Label::new(
                    "No audio data",
                    w / 2.0,
                    h / 2.0 - 7.0,
                    14.0,
                    TIME_COLOR,
                    Align::Center,
                )]
            }
        };

        let progress_x = if frame.duration > 0.0 {
            (frame.position / frame.duration).clamp(0.0, 1.0) as f32 * w
        } else {
            0.0
        };
        let bar_w = w / envelope.len() as f32;
        let centre = h / 2.0;

        for (i, &value) in envelope.samples.iter().enumerate() {
            let x = i as f32 * bar_w;
            let bar_h = value.abs() * (h * 0.8) * sens;
            let color = if x <= progress_x { pal.secondary } else { pal.primary };
            surface.fill_rect(x, centre - bar_h / 2.0, (bar_w - 1.0).max(bar_w * 0.5), bar_h, color);
        }

        if progress_x > 0.0 {
            surface.stroke_line(progress_x, 0.0, progress_x, h, 2.0, pal.accent);
        }
        if playing {
            let radius = GLOW_RADIUS * sens * (1.0 + pulse * 0.5);
            surface.fill_radial(
                progress_x,
                centre,
                radius,
                Rgba::WHITE.with_alpha(77),
                Rgba::WHITE.with_alpha(0),
            );
        }

        let mut labels = vec![Label::new("0:00", 8.0, h - 20.0, 12.0, TIME_COLOR, Align::Left)];
        if frame.duration > 0.0 {
            labels.push(Label::new(
                format_clock(frame.duration),
                w - 8.0,
                h - 20.0,
                12.0,
                TIME_COLOR,
                Align::Right,
            ));
        }
        labels
    }

    fn seek_at(&self, x: f32, width: f32, duration: f64) -> Option<SeekCommand> {
        seek_for_pointer(x, width, duration)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::features::{BeatSnapshot, FrequencySnapshot, PlaybackState, WaveformEnvelope};
    use crate::visual::preset::Preset;

    fn frame(envelope: Option<Vec<f32>>, position: f64, duration: f64) -> FrameInput {
        FrameInput {
            frequency: FrequencySnapshot::silent(1024, -140.0, 0.0),
            beat: BeatSnapshot::default(),
            position,
            duration,
            state: PlaybackState::Paused,
            nyquist: 22_050.0,
            envelope: envelope.map(|samples| Arc::new(WaveformEnvelope { samples })),
        }
    }

    #[test]
    fn pointer_maps_linearly_over_duration() {
        let cmd = seek_for_pointer(150.0, 600.0, 180.0).unwrap();
        assert!((cmd.seconds - 45.0).abs() < 1e-9);
        assert_eq!(seek_for_pointer(-10.0, 600.0, 180.0).unwrap().seconds, 0.0);
        assert_eq!(seek_for_pointer(900.0, 600.0, 180.0).unwrap().seconds, 180.0);
        assert_eq!(seek_for_pointer(10.0, 600.0, 0.0), None);
        assert_eq!(seek_for_pointer(10.0, 0.0, 10.0), None);
    }

    #[test]
    fn played_part_uses_progress_colour() {
        let palette = Preset::Waveform.palette();
        let mut r = WaveformRenderer::new(palette);
        let mut surface = Surface::new(100, 50, 1.0);
        let labels = r.draw(
            &mut surface,
            &frame(Some(vec![1.0; 10]), 5.0, 10.0),
            &VisualizationSettings::default(),
        );
        assert_eq!(surface.pixel(12, 25), Some(palette.secondary));
        assert_eq!(surface.pixel(72, 25), Some(palette.primary));
        let texts: Vec<&str> = labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["0:00", "0:10"]);
    }

    #[test]
    fn missing_envelope_shows_notice() {
        let mut r = WaveformRenderer::new(Preset::Waveform.palette());
        let mut surface = Surface::new(100, 50, 1.0);
        let labels = r.draw(&mut surface, &frame(None, 0.0, 0.0), &VisualizationSettings::default());
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "No audio data");
    }
}
