use std::f32::consts::{FRAC_PI_2, TAU};

use super::intensity::{AnimationPhase, DecayingIntensity};
use super::surface::{gradient_at, Rgba, Surface};
use super::{Align, Label, Renderer};
use crate::visual::coordinator::FrameInput;
use crate::visual::preset::{CircularStyle, Palette};
use crate::visual::settings::VisualizationSettings;

const ELEMENT_COUNT: usize = 128;
/// Radius the element sizes were tuned for.
const REFERENCE_RADIUS: f32 = 120.0;
/// Share of the spectrum drawn as bars in the mixed style.
const MIXED_BAR_SHARE: f32 = 0.6;

/// Geometry shared by the per-style passes of one frame.
struct Ring {
    cx: f32,
    cy: f32,
    radius: f32,
    /// Scale from reference-sized elements to this surface
    unit: f32,
    phase: f32,
    pulse: f32,
    sens: f32,
}

impl Ring {
    fn point(&self, angle: f32, distance: f32) -> (f32, f32) {
        (self.cx + angle.cos() * distance, self.cy + angle.sin() * distance)
    }

    fn angle(i: usize, count: usize) -> f32 {
        i as f32 / count as f32 * TAU - FRAC_PI_2
    }
}

/// Radial spectrum in one of four styles around a beat-driven centre.
pub struct CircularRenderer {
    style: CircularStyle,
    palette: Palette,
    name: &'static str,
    pulse: DecayingIntensity,
    phase: AnimationPhase,
}

impl CircularRenderer {
    pub fn new(style: CircularStyle, palette: Palette, name: &'static str) -> Self {
        Self {
            style,
            palette,
            name,
            pulse: DecayingIntensity::beat_pulse(),
            phase: AnimationPhase::default(),
        }
    }

    fn band_color(&self, i: usize, count: usize, pulse: f32) -> Rgba {
        let pos = i as f32 / count as f32;
        if pos < 0.2 {
            if pulse > 0.3 {
                self.palette.accent
            } else {
                self.palette.primary
            }
        } else if pos < 0.6 {
            self.palette.secondary
        } else {
            self.palette.primary
        }
    }

    fn draw_bars(&self, surface: &mut Surface, ring: &Ring, radius: f32, levels: &[f32]) {
        let count = levels.len();
        let inner = radius * 0.4;
        for (i, &level) in levels.iter().enumerate() {
            let angle = Ring::angle(i, count);
            let value = level * ring.sens;
            let wobble = (ring.phase + i as f32 * 0.1).sin() * 0.1;
            let length = (value + wobble) * (radius * 0.4) * (1.0 + ring.pulse * 0.5);

            let (x1, y1) = ring.point(angle, inner);
            let (x2, y2) = ring.point(angle, inner + length);
            let color = self.band_color(i, count, ring.pulse);

            let width = (value + ring.pulse) * 4.0 * ring.sens * ring.unit;
            let width = width.max(ring.unit);
            surface.stroke_line(x1, y1, x2, y2, width * 2.0, color.with_alpha(0x33));
            surface.stroke_line(x1, y1, x2, y2, width, color.with_alpha(0xaa));
            surface.stroke_line(x1, y1, x2, y2, (width * 0.5).max(ring.unit), color);
        }
    }

    fn draw_dots(&self, surface: &mut Surface, ring: &Ring, radius: f32, levels: &[f32]) {
        let count = levels.len();
        for (i, &level) in levels.iter().enumerate() {
            let angle = Ring::angle(i, count);
            let value = level * ring.sens;
            let wobble = (ring.phase + i as f32 * 0.2).sin() * 0.2;
            let size = (value + wobble) * 10.0 * (1.0 + ring.pulse * 0.3) * ring.unit;
            let size = (size * ring.sens).max(ring.unit);

            let (x, y) = ring.point(angle, radius * 0.5 + value * radius * 0.3);
            let color = self.band_color(i, count, ring.pulse);
            surface.fill_circle(x, y, size * 1.5, color.with_alpha(0x33));
            surface.fill_circle(x, y, size, color.with_alpha(0xaa));
            surface.fill_circle(x, y, size * 0.5, color);
        }
    }

    fn draw_outline(&self, surface: &mut Surface, ring: &Ring, levels: &[f32]) {
        let count = levels.len();
        let r = ring.radius;
        let points: Vec<(f32, f32)> = levels
            .iter()
            .enumerate()
            .map(|(i, &level)| {
                let wobble = (ring.phase + i as f32 * 0.15).sin() * 0.15;
                let distance =
                    r * 0.3 + (level * ring.sens + wobble) * r * 0.5 * (1.0 + ring.pulse * 0.2);
                ring.point(Ring::angle(i, count), distance)
            })
            .collect();

        let stops = [
            (0.0, self.palette.primary),
            (0.5, self.palette.secondary),
            (1.0, self.palette.accent),
        ];
        let width = (3.0 + ring.pulse * 5.0) * ring.unit;
        for (k, &(x1, y1)) in points.iter().enumerate() {
            let (x2, y2) = points[(k + 1) % points.len()];
            // diagonal gradient, top-left to bottom-right of the ring's box
            let t = ((x1 + x2) / 2.0 - (ring.cx - r) + (y1 + y2) / 2.0 - (ring.cy - r)) / (4.0 * r);
            let color = gradient_at(&stops, t);
            surface.stroke_line(x1, y1, x2, y2, width + 6.0 * ring.unit, self.palette.primary.with_alpha(0x26));
            surface.stroke_line(x1, y1, x2, y2, width, color);
        }
    }

    fn draw_centre(&self, surface: &mut Surface, ring: &Ring, frame: &FrameInput) -> Vec<Label> {
        let pal = self.palette;
        let pulse_r = (20.0 + ring.pulse * 15.0 * ring.sens) * ring.unit;
        surface.fill_radial(ring.cx, ring.cy, pulse_r, pal.accent.with_alpha(0xaa), pal.accent.with_alpha(0));

        let speed = if frame.is_playing() { 0.01 } else { 0.002 } * ring.sens;
        let rotation = ring.phase * speed;
        for i in 0..6 {
            let angle = i as f32 / 6.0 * TAU + rotation;
            let (x, y) = ring.point(angle, ring.radius * 0.25);
            surface.fill_circle(x, y, 3.0 * ring.unit, pal.secondary.with_alpha(0x60));
        }

        if frame.beat.bpm <= 0.0 {
            return Vec::new();
        }
        let u = ring.unit;
        vec![
            Label::new(
                format!("{}", frame.beat.bpm.round() as u32),
                ring.cx,
                ring.cy - 19.0 * u,
                16.0 * u,
                Rgba::WHITE,
                Align::Center,
            ),
            Label::new("BPM", ring.cx, ring.cy + 2.0 * u, 10.0 * u, Rgba::WHITE, Align::Center),
            Label::new(
                self.name,
                ring.cx,
                ring.cy + 22.0 * u,
                10.0 * u,
                Rgba::hex(0xaaaaaa),
                Align::Center,
            ),
        ]
    }
}

impl Renderer for CircularRenderer {
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

        let (cx, cy) = (w / 2.0, h / 2.0);
        let radius = cx.min(cy) * 0.8;
        let ring = Ring {
            cx,
            cy,
            radius,
            unit: (radius / REFERENCE_RADIUS).max(0.25),
            phase,
            pulse,
            sens,
        };

        if !frame.has_signal() {
            for i in 1..=3 {
                surface.stroke_circle(cx, cy, radius * i as f32 / 4.0, 2.0 * ring.unit, pal.primary.with_alpha(0x30));
            }
            return Vec::new();
        }

        surface.stroke_circle(cx, cy, radius, ring.unit, pal.primary.with_alpha(0x20));
        let inner = radius * 0.4 + phase.sin() * 5.0 * ring.unit;
        surface.stroke_circle(cx, cy, inner, 2.0 * ring.unit, pal.secondary.with_alpha(0x40));

        let spectrum = &frame.frequency;
        let bins = spectrum.len();
        match self.style {
            CircularStyle::Bars => {
                let levels = spectrum.bucket_levels(0..bins, ELEMENT_COUNT);
                self.draw_bars(surface, &ring, radius, &levels);
            }
            CircularStyle::Dots => {
                let levels = spectrum.bucket_levels(0..bins, ELEMENT_COUNT);
                self.draw_dots(surface, &ring, radius, &levels);
            }
            CircularStyle::Lines => {
                let levels = spectrum.bucket_levels(0..bins, ELEMENT_COUNT);
                self.draw_outline(surface, &ring, &levels);
            }
            CircularStyle::Mixed => {
                let split = (bins as f32 * MIXED_BAR_SHARE) as usize;
                let bar_count = (ELEMENT_COUNT as f32 * MIXED_BAR_SHARE) as usize;
                let low = spectrum.bucket_levels(0..split, bar_count);
                let high = spectrum.bucket_levels(split..bins, ELEMENT_COUNT - bar_count);
                self.draw_bars(surface, &ring, radius * 0.9, &low);
                self.draw_dots(surface, &ring, radius * 0.9, &high);
            }
        }

        self.draw_centre(surface, &ring, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{BeatSnapshot, FrequencySnapshot, PlaybackState};
    use crate::visual::preset::Preset;

    fn frame(db: f32, bpm: f32) -> FrameInput {
        FrameInput {
            frequency: FrequencySnapshot {
                bins: vec![db; 1024],
                min_db: -140.0,
                max_db: 0.0,
            },
            beat: BeatSnapshot {
                bpm,
                confidence: 0.9,
                is_onset: false,
            },
            position: 1.0,
            duration: 10.0,
            state: PlaybackState::Playing,
            nyquist: 22_050.0,
            envelope: None,
        }
    }

    fn renderer(style: CircularStyle) -> CircularRenderer {
        let preset = Preset::Circular(style);
        CircularRenderer::new(style, preset.palette(), preset.name())
    }

    #[test]
    fn every_style_draws_something() {
        for style in [CircularStyle::Bars, CircularStyle::Dots, CircularStyle::Lines, CircularStyle::Mixed] {
            let mut r = renderer(style);
            let background = r.palette.background;
            let mut surface = Surface::new(200, 200, 1.0);
            r.draw(&mut surface, &frame(-30.0, 0.0), &VisualizationSettings::default());
            let painted = (0..200u32)
                .flat_map(|y| (0..200u32).map(move |x| (x, y)))
                .filter(|&(x, y)| surface.pixel(x, y) != Some(background))
                .count();
            assert!(painted > 500, "{:?} painted {}", style, painted);
            // corners stay clear
            assert_eq!(surface.pixel(0, 0), Some(background));
        }
    }

    #[test]
    fn tempo_labels_only_when_known() {
        let mut r = renderer(CircularStyle::Bars);
        let mut surface = Surface::new(300, 300, 1.0);
        let settings = VisualizationSettings::default();
        assert!(r.draw(&mut surface, &frame(-30.0, 0.0), &settings).is_empty());

        let labels = r.draw(&mut surface, &frame(-30.0, 119.6), &settings);
        let texts: Vec<&str> = labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["120", "BPM", "Neon Bars"]);
    }

    #[test]
    fn idle_shows_static_rings() {
        let mut r = renderer(CircularStyle::Dots);
        let mut surface = Surface::new(200, 200, 1.0);
        let mut idle = frame(-140.0, 0.0);
        idle.state = PlaybackState::Stopped;
        assert!(r.draw(&mut surface, &idle, &VisualizationSettings::default()).is_empty());
        // ring at radius 80 * 2 / 4 = 40 from the centre
        assert_ne!(surface.pixel(140, 100), Some(r.palette.background));
        assert_eq!(surface.pixel(100, 100), Some(r.palette.background));
    }
}
