use std::sync::Arc;
use std::time::Instant;

use crate::audio::features::{BeatSnapshot, FrequencySnapshot, PlaybackState, WaveformEnvelope};
use crate::engine::AudioEngine;
use crate::render::resize::{ResizeDebouncer, SurfaceSize};
use crate::render::surface::Surface;
use crate::render::text::TextOverlay;
use crate::render::{renderer_for, Label, Renderer, SeekCommand};

use super::preset::Preset;
use super::settings::VisualizationSettings;

const FALLBACK_NYQUIST: f32 = 22_050.0;

/// Everything a renderer may look at for one frame, sampled once per tick.
#[derive(Clone, Debug)]
pub struct FrameInput {
    pub frequency: FrequencySnapshot,
    pub beat: BeatSnapshot,
    /// Playhead in seconds
    pub position: f64,
    pub duration: f64,
    pub state: PlaybackState,
    /// Highest frequency represented by the last bin, Hz
    pub nyquist: f32,
    pub envelope: Option<Arc<WaveformEnvelope>>,
}

impl FrameInput {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Spectrum data is live and not the all-minimum placeholder.
    pub fn has_signal(&self) -> bool {
        self.state.is_live() && !self.frequency.is_empty() && !self.frequency.is_silent()
    }
}

/// Pulls one consistent set of analysis results per tick and hands it to the
/// active renderer.
pub struct VisualizationCoordinator {
    preset: Preset,
    settings: VisualizationSettings,
    renderer: Box<dyn Renderer>,
    overlay: Option<TextOverlay>,
    resize: ResizeDebouncer,
}

impl VisualizationCoordinator {
    pub fn new(preset: Preset, settings: VisualizationSettings) -> Self {
        Self {
            preset,
            settings,
            renderer: renderer_for(preset),
            overlay: None,
            resize: ResizeDebouncer::default(),
        }
    }

    /// Composite renderer labels with `overlay` in [`present`](Self::present).
    pub fn with_text(mut self, overlay: TextOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn settings(&self) -> &VisualizationSettings {
        &self.settings
    }

    pub fn text_overlay(&self) -> Option<&TextOverlay> {
        self.overlay.as_ref()
    }

    pub fn set_preset(&mut self, preset: Preset) {
        if preset == self.preset {
            return;
        }
        log::info!("Preset: {} -> {}", self.preset.name(), preset.name());
        self.preset = preset;
        self.renderer = renderer_for(preset);
    }

    pub fn cycle_preset(&mut self) -> Preset {
        self.set_preset(self.preset.next());
        self.preset
    }

    pub fn previous_preset(&mut self) -> Preset {
        self.set_preset(self.preset.previous());
        self.preset
    }

    pub fn set_sensitivity(&mut self, value: f32) {
        self.settings.set_sensitivity(value);
    }

    pub fn set_smoothing(&mut self, value: f32) {
        self.settings.set_smoothing(value);
    }

    /// Record a container size change. Bursts are coalesced and only the
    /// settled size reaches the surface, through [`apply_resize`](Self::apply_resize).
    pub fn observe_resize(&mut self, size: SurfaceSize, now: Instant) {
        self.resize.observe(size, now);
    }

    /// Call between frames. Reallocates `surface` once a size has settled;
    /// returns whether it did.
    pub fn apply_resize(&mut self, surface: &mut Surface, now: Instant) -> bool {
        match self.resize.poll(now) {
            Some(size) => {
                surface.resize(size);
                true
            }
            None => false,
        }
    }

    /// Advance the engine and sample it exactly once for this frame.
    pub fn tick(&mut self, engine: &mut AudioEngine) -> FrameInput {
        engine.tick();
        let frequency = engine.sample_frequency();
        let beat = engine.detect_beat(&frequency);
        let nyquist = engine
            .metadata()
            .map_or(FALLBACK_NYQUIST, |m| m.sample_rate as f32 / 2.0);

        FrameInput {
            frequency,
            beat,
            position: engine.current_time(),
            duration: engine.duration(),
            state: engine.state().clone(),
            nyquist,
            envelope: engine.envelope().cloned(),
        }
    }

    /// Draw `frame` with the active renderer and composite its labels when a
    /// text overlay is configured. Returns the labels either way.
    pub fn present(&mut self, frame: &FrameInput, surface: &mut Surface) -> Vec<Label> {
        let labels = self.renderer.draw(surface, frame, &self.settings);
        if let Some(overlay) = &self.overlay {
            for label in &labels {
                overlay.draw_label(surface, label);
            }
        }
        labels
    }

    /// Route a click to the active renderer; only the waveform seeks.
    pub fn pointer_seek(&mut self, engine: &mut AudioEngine, x: f32, width: f32) -> Option<SeekCommand> {
        let command = self.renderer.seek_at(x, width, engine.duration())?;
        if let Err(err) = engine.seek(command.seconds) {
            log::warn!("Seek to {:.2}s failed: {}", command.seconds, err);
        }
        Some(command)
    }
}
