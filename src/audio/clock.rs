use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::decode::DecodedAudio;
use super::features::PlaybackState;
use crate::error::PlaybackError;

/// Seconds on a monotonic timeline with an arbitrary origin.
pub trait TimeSource: Send {
    fn now(&self) -> f64;
}

/// Wall-clock time for live hosts.
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Time that only moves when told to. Clones share the same timeline, so the
/// offline renderer keeps one handle and gives another to the clock.
#[derive(Clone, Default)]
pub struct ManualTime {
    bits: Arc<AtomicU64>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        let now = f64::from_bits(self.bits.load(Ordering::Acquire));
        self.bits.store((now + seconds.max(0.0)).to_bits(), Ordering::Release);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Host audio output. The engine only tells it where to start and when to stop.
pub trait OutputDevice: Send {
    fn start(&mut self, audio: &Arc<DecodedAudio>, from_seconds: f64) -> Result<(), PlaybackError>;
    fn halt(&mut self);
    fn set_volume(&mut self, volume: f32);
}

/// Output that plays nothing. Used for offline rendering.
#[derive(Default)]
pub struct NullOutput;

impl OutputDevice for NullOutput {
    fn start(&mut self, _audio: &Arc<DecodedAudio>, _from_seconds: f64) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn halt(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}
}

/// Clamp that maps NaN to the lower bound.
pub(crate) fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Transport state machine and single source of truth for "now".
///
/// Position is latched once per [`PlaybackClock::tick`]; every read between two
/// ticks returns the same value.
pub struct PlaybackClock {
    state: PlaybackState,
    time: Box<dyn TimeSource>,
    device: Box<dyn OutputDevice>,
    duration: f64,
    position: f64,
    /// (time source reading, track position) at the last start/seek while playing
    anchor: Option<(f64, f64)>,
    volume: f32,
}

impl PlaybackClock {
    pub fn new(time: Box<dyn TimeSource>, device: Box<dyn OutputDevice>) -> Self {
        Self {
            state: PlaybackState::Idle,
            time,
            device,
            duration: 0.0,
            position: 0.0,
            anchor: None,
            volume: 1.0,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn current_time(&self) -> f64 {
        self.position
    }

    pub(crate) fn begin_loading(&mut self) {
        self.halt();
        self.duration = 0.0;
        self.position = 0.0;
        self.state = PlaybackState::Loading;
    }

    pub(crate) fn set_ready(&mut self, duration: f64) {
        self.halt();
        self.duration = duration.max(0.0);
        self.position = 0.0;
        self.state = PlaybackState::Ready;
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.halt();
        self.state = PlaybackState::Error(reason.into());
    }

    pub(crate) fn reset_idle(&mut self) {
        self.halt();
        self.duration = 0.0;
        self.position = 0.0;
        self.state = PlaybackState::Idle;
    }

    fn halt(&mut self) {
        if self.anchor.take().is_some() {
            self.device.halt();
        }
    }

    fn start_device(&mut self, audio: &Arc<DecodedAudio>, from: f64) -> Result<(), PlaybackError> {
        if let Err(err) = self.device.start(audio, from) {
            log::warn!("Output device failed to start: {}", err);
            self.anchor = None;
            self.state = PlaybackState::Error(err.to_string());
            return Err(err);
        }
        self.position = from;
        self.anchor = Some((self.time.now(), from));
        Ok(())
    }

    /// Start or resume. Starting at or past the end rewinds to 0.
    pub fn play(&mut self, from: Option<f64>, audio: Option<&Arc<DecodedAudio>>) -> Result<(), PlaybackError> {
        let audio = match audio {
            Some(audio) if self.state.has_track() => audio,
            _ => return Err(PlaybackError::NotReady),
        };

        let mut start = clamp_finite(from.unwrap_or(self.position), 0.0, self.duration);
        if start >= self.duration {
            start = 0.0;
        }

        self.halt();
        self.start_device(audio, start)?;
        self.state = PlaybackState::Playing;
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.tick();
        if self.state == PlaybackState::Playing {
            self.halt();
            self.state = PlaybackState::Paused;
        }
    }

    pub fn stop(&mut self) {
        if !self.state.has_track() {
            return;
        }
        self.halt();
        self.position = 0.0;
        self.state = PlaybackState::Stopped;
    }

    /// Jump to `seconds`, clamped to the track. While playing the device restarts
    /// at the new position.
    pub fn seek(&mut self, seconds: f64, audio: Option<&Arc<DecodedAudio>>) -> Result<(), PlaybackError> {
        let target = clamp_finite(seconds, 0.0, self.duration);
        match (&self.state, audio) {
            (PlaybackState::Playing, Some(audio)) => {
                self.halt();
                self.start_device(audio, target)
            }
            _ => {
                self.position = target;
                Ok(())
            }
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.device.set_volume(self.volume);
    }

    /// Latch the position for this frame. Returns true when the track ran out
    /// during this tick, in which case the clock is now `Stopped` at 0.
    pub fn tick(&mut self) -> bool {
        let Some((started_at, from)) = self.anchor else {
            return false;
        };
        if self.state != PlaybackState::Playing {
            return false;
        }

        let elapsed = (self.time.now() - started_at).max(0.0);
        let position = (from + elapsed).max(self.position);
        if position >= self.duration {
            log::info!("Playback reached end of track ({:.2}s)", self.duration);
            self.halt();
            self.position = 0.0;
            self.state = PlaybackState::Stopped;
            return true;
        }
        self.position = position;
        false
    }
}
