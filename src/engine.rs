//! The audio engine: one explicitly owned instance tying together the source,
//! clock, analyzers and the background load worker.
//!
//! Each load runs on its own thread and reports back over a channel tagged
//! with a generation number. Only the newest generation is ever applied, so a
//! slow first load can never clobber or delay a faster second one.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::analysis::{AnalyzerConfig, FrequencyAnalyzer};
use crate::audio::beat::{BeatConfig, BeatDetector};
use crate::audio::clock::{MonotonicTime, NullOutput, OutputDevice, PlaybackClock, TimeSource};
use crate::audio::decode::DecodedAudio;
use crate::audio::features::{
    AudioMetadata, BeatSnapshot, FrequencySnapshot, PlaybackState, WaveformEnvelope,
};
use crate::audio::fetch::{Fetch, HttpFetcher};
use crate::audio::source::{resolve, AudioInput, AudioSource};
use crate::audio::waveform::{self, DEFAULT_ENVELOPE_POINTS};
use crate::error::{LoadError, PlaybackError};

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    pub beat: BeatConfig,
    pub waveform_points: NonZeroUsize,
    pub fetch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            beat: BeatConfig::default(),
            waveform_points: NonZeroUsize::new(DEFAULT_ENVELOPE_POINTS).unwrap_or(NonZeroUsize::MIN),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Notifications for the host UI, drained with [`AudioEngine::drain_events`].
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    MetadataChanged(AudioMetadata),
    StateChanged(PlaybackState),
    VolumeChanged(f32),
    Seeked(f64),
    LoadFailed { generation: u64, error: LoadError },
}

type LoadOutcome = Result<(DecodedAudio, WaveformEnvelope), LoadError>;

struct LoadResult {
    generation: u64,
    outcome: LoadOutcome,
}

pub struct AudioEngine {
    source: AudioSource,
    clock: PlaybackClock,
    analyzer: FrequencyAnalyzer,
    beat: BeatDetector,
    last_beat: BeatSnapshot,
    envelope: Option<Arc<WaveformEnvelope>>,
    waveform_points: NonZeroUsize,
    generation: u64,
    pending: Option<u64>,
    results_tx: Sender<LoadResult>,
    results_rx: Receiver<LoadResult>,
    events: VecDeque<EngineEvent>,
}

impl AudioEngine {
    /// Engine with HTTP fetching, wall-clock time and no audible output.
    pub fn new(config: EngineConfig) -> Self {
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout));
        Self::with_parts(
            config,
            fetcher,
            Box::new(MonotonicTime::new()),
            Box::new(NullOutput),
        )
    }

    pub fn with_parts(
        config: EngineConfig,
        fetcher: Arc<dyn Fetch>,
        time: Box<dyn TimeSource>,
        device: Box<dyn OutputDevice>,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            source: AudioSource::new(fetcher),
            clock: PlaybackClock::new(time, device),
            analyzer: FrequencyAnalyzer::new(config.analyzer),
            beat: BeatDetector::new(config.beat),
            last_beat: BeatSnapshot::default(),
            envelope: None,
            waveform_points: config.waveform_points,
            generation: 0,
            pending: None,
            results_tx,
            results_rx,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        self.clock.state()
    }

    pub fn metadata(&self) -> Option<&AudioMetadata> {
        self.source.metadata()
    }

    pub fn envelope(&self) -> Option<&Arc<WaveformEnvelope>> {
        self.envelope.as_ref()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn volume(&self) -> f32 {
        self.clock.volume()
    }

    /// Generation of the load currently in flight, if any.
    pub fn pending_load(&self) -> Option<u64> {
        self.pending
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = EngineEvent> + '_ {
        self.events.drain(..)
    }

    /// Run `f` and emit `StateChanged` if the transport state moved.
    fn track_state<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let before = self.clock.state().clone();
        let out = f(self);
        let after = self.clock.state();
        if *after != before {
            log::info!("Playback state: {} -> {}", before, after);
            self.events.push_back(EngineEvent::StateChanged(after.clone()));
        }
        out
    }

    fn reset_analysis(&mut self) {
        self.analyzer.reset();
        self.beat.reset();
        self.last_beat = BeatSnapshot::default();
    }

    /// Supersede any pending load, release the current track, enter `Loading`.
    fn prepare_load(&mut self, input: &AudioInput) -> u64 {
        if let Some(stale) = self.pending.take() {
            log::info!("Load #{} superseded", stale);
            self.events.push_back(EngineEvent::LoadFailed {
                generation: stale,
                error: LoadError::Aborted,
            });
        }
        self.generation += 1;
        self.pending = Some(self.generation);
        self.source.dispose();
        self.envelope = None;
        self.reset_analysis();
        self.track_state(|e| e.clock.begin_loading());
        log::info!("Load #{}: {}", self.generation, input.describe());
        self.generation
    }

    fn decode_job(input: AudioInput, fetcher: &dyn Fetch, points: NonZeroUsize) -> LoadOutcome {
        let decoded = resolve(input, fetcher)?;
        let envelope = waveform::extract(&decoded, points);
        Ok((decoded, envelope))
    }

    /// Start loading in the background; returns the load's generation.
    pub fn begin_load(&mut self, input: AudioInput) -> u64 {
        let generation = self.prepare_load(&input);
        let tx = self.results_tx.clone();
        let fetcher = self.source.fetcher();
        let points = self.waveform_points;

        let spawned = std::thread::Builder::new()
            .name(format!("pulseviz-load-{}", generation))
            .spawn(move || {
                let outcome = Self::decode_job(input, fetcher.as_ref(), points);
                if tx.send(LoadResult { generation, outcome }).is_err() {
                    log::debug!("Engine gone before load #{} finished", generation);
                }
            });
        if let Err(e) = spawned {
            log::warn!("Could not start load #{}: {}", generation, e);
            self.apply(LoadResult {
                generation,
                outcome: Err(LoadError::Aborted),
            });
        }
        generation
    }

    pub fn load_file(&mut self, data: Vec<u8>, name: Option<String>) -> u64 {
        self.begin_load(AudioInput::Bytes { data, name })
    }

    pub fn load_url(&mut self, url: impl Into<String>) -> u64 {
        self.begin_load(AudioInput::Url(url.into()))
    }

    /// Load on the calling thread.
    pub fn load(&mut self, input: AudioInput) -> Result<AudioMetadata, LoadError> {
        let generation = self.prepare_load(&input);
        let outcome = Self::decode_job(input, self.source.fetcher().as_ref(), self.waveform_points);
        self.apply(LoadResult { generation, outcome })
            .unwrap_or(Err(LoadError::Aborted))
    }

    /// Block until the pending load resolves or `timeout` passes.
    pub fn await_load(&mut self, timeout: Duration) -> Option<Result<AudioMetadata, LoadError>> {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results_rx.recv_timeout(remaining) {
                Ok(result) => {
                    if let Some(applied) = self.apply(result) {
                        return Some(applied);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    /// Apply finished loads without blocking.
    pub fn poll_loads(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            self.apply(result);
        }
    }

    fn apply(&mut self, result: LoadResult) -> Option<Result<AudioMetadata, LoadError>> {
        if self.pending != Some(result.generation) {
            log::debug!("Discarding stale load #{}", result.generation);
            return None;
        }
        self.pending = None;

        match result.outcome {
            Ok((decoded, envelope)) => {
                let metadata = self.source.accept(decoded);
                self.envelope = Some(Arc::new(envelope));
                self.track_state(|e| e.clock.set_ready(metadata.duration));
                log::info!(
                    "Loaded {:?}: {:.1}s, {}Hz, {} ch",
                    metadata.title.as_deref().unwrap_or("untitled"),
                    metadata.duration,
                    metadata.sample_rate,
                    metadata.channel_count
                );
                self.events.push_back(EngineEvent::MetadataChanged(metadata.clone()));
                Some(Ok(metadata))
            }
            Err(error) => {
                log::warn!("Load #{} failed: {}", result.generation, error);
                self.track_state(|e| e.clock.fail(error.to_string()));
                self.events.push_back(EngineEvent::LoadFailed {
                    generation: result.generation,
                    error: error.clone(),
                });
                Some(Err(error))
            }
        }
    }

    pub fn cancel_load(&mut self) {
        if let Some(generation) = self.pending.take() {
            log::info!("Load #{} cancelled", generation);
            self.events.push_back(EngineEvent::LoadFailed {
                generation,
                error: LoadError::Aborted,
            });
            self.track_state(|e| e.clock.reset_idle());
        }
    }

    /// Drop the track and any load in flight. The engine stays usable.
    pub fn dispose(&mut self) {
        self.cancel_load();
        self.source.dispose();
        self.envelope = None;
        self.reset_analysis();
        self.track_state(|e| e.clock.reset_idle());
    }

    pub fn play(&mut self, from: Option<f64>) -> Result<(), PlaybackError> {
        if from.is_some() {
            self.reset_analysis();
        }
        self.track_state(|e| e.clock.play(from, e.source.buffer()))
    }

    pub fn pause(&mut self) {
        self.track_state(|e| e.clock.pause());
    }

    pub fn stop(&mut self) {
        self.track_state(|e| e.clock.stop());
        self.reset_analysis();
    }

    /// Out-of-range targets are clamped, never rejected. Without a loaded
    /// track this does nothing.
    pub fn seek(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        if !self.clock.state().has_track() {
            log::debug!("Ignoring seek to {:.2}s: no track loaded", seconds);
            return Ok(());
        }
        let result = self.track_state(|e| e.clock.seek(seconds, e.source.buffer()));
        self.reset_analysis();
        self.events
            .push_back(EngineEvent::Seeked(self.clock.current_time()));
        result
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.clock.set_volume(volume);
        self.events
            .push_back(EngineEvent::VolumeChanged(self.clock.volume()));
    }

    /// Per-frame update: apply finished loads and latch the clock.
    pub fn tick(&mut self) {
        self.poll_loads();
        let ended = self.track_state(|e| e.clock.tick());
        if ended {
            self.reset_analysis();
        }
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Spectrum at the playhead, or the all-minimum placeholder when there is
    /// no live signal.
    pub fn sample_frequency(&mut self) -> FrequencySnapshot {
        if !self.clock.state().is_live() {
            return self.analyzer.placeholder();
        }
        match self.source.buffer() {
            Some(audio) => self.analyzer.sample(audio, self.clock.current_time()),
            None => self.analyzer.placeholder(),
        }
    }

    /// Feed this tick's spectrum to the beat detector. While paused the last
    /// estimate is held; outside playback nothing is reported.
    pub fn detect_beat(&mut self, snapshot: &FrequencySnapshot) -> BeatSnapshot {
        match self.clock.state() {
            PlaybackState::Playing => {
                self.last_beat = self.beat.detect(snapshot, self.clock.current_time());
                self.last_beat
            }
            PlaybackState::Paused => BeatSnapshot {
                is_onset: false,
                ..self.last_beat
            },
            _ => BeatSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::ManualTime;
    use crate::test_support::{kick_wav, silent_wav, sine_wav, CannedFetcher, WavSpec};

    const FRAME: f64 = 1.0 / 60.0;

    fn engine_with(fetcher: CannedFetcher) -> (AudioEngine, ManualTime) {
        let time = ManualTime::new();
        let engine = AudioEngine::with_parts(
            EngineConfig::default(),
            Arc::new(fetcher),
            Box::new(time.clone()),
            Box::new(NullOutput),
        );
        (engine, time)
    }

    fn bytes(data: Vec<u8>) -> AudioInput {
        AudioInput::Bytes {
            data,
            name: Some("track.wav".into()),
        }
    }

    #[test]
    fn placeholder_before_any_load() {
        let (mut engine, _) = engine_with(CannedFetcher::new());
        let snap = engine.sample_frequency();
        assert_eq!(snap.len(), 1024);
        assert!(snap.is_silent());
        assert_eq!(engine.detect_beat(&snap), BeatSnapshot::default());
        assert_eq!(engine.state(), &PlaybackState::Idle);
    }

    #[test]
    fn seek_clamps_on_a_long_track() {
        let (mut engine, _) = engine_with(CannedFetcher::new());
        let meta = engine.load(bytes(silent_wav(2000, 180.0))).unwrap();
        assert!((meta.duration - 180.0).abs() < 1e-6);

        engine.seek(200.0).unwrap();
        assert_eq!(engine.current_time(), 180.0);
        engine.seek(-5.0).unwrap();
        assert_eq!(engine.current_time(), 0.0);
    }

    #[test]
    fn volume_is_clamped_and_reported() {
        let (mut engine, _) = engine_with(CannedFetcher::new());
        engine.set_volume(3.0);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(-1.0);
        assert_eq!(engine.volume(), 0.0);
        let events: Vec<_> = engine.drain_events().collect();
        assert_eq!(
            events,
            vec![EngineEvent::VolumeChanged(1.0), EngineEvent::VolumeChanged(0.0)]
        );
    }

    #[test]
    fn newest_overlapping_load_wins() {
        let slow = sine_wav(WavSpec {
            sample_rate: 8000,
            channels: 1,
            seconds: 2.0,
            frequency: 300.0,
        });
        let fast = sine_wav(WavSpec {
            sample_rate: 8000,
            channels: 1,
            seconds: 1.0,
            frequency: 300.0,
        });
        let slow_delay = Duration::from_millis(1500);
        let fetcher = CannedFetcher::new()
            .route("https://x.test/slow.wav", slow, slow_delay)
            .route("https://x.test/fast.wav", fast, Duration::ZERO);
        let (mut engine, _) = engine_with(fetcher);

        let started = Instant::now();
        let first = engine.load_url("https://x.test/slow.wav");
        let second = engine.load_url("https://x.test/fast.wav");
        assert!(second > first);
        assert_eq!(engine.state(), &PlaybackState::Loading);

        let meta = engine.await_load(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(meta.title.as_deref(), Some("fast"));
        // never queued behind the superseded fetch
        let waited = started.elapsed();
        assert!(waited < slow_delay / 2, "second load resolved after {:?}", waited);

        std::thread::sleep(slow_delay.saturating_sub(started.elapsed()) + Duration::from_millis(500));
        engine.poll_loads();

        let current = engine.metadata().unwrap();
        assert_eq!(current.title.as_deref(), Some("fast"));
        assert!((current.duration - 1.0).abs() < 1e-6);
        assert_eq!(engine.state(), &PlaybackState::Ready);

        let events: Vec<_> = engine.drain_events().collect();
        assert!(events.contains(&EngineEvent::LoadFailed {
            generation: first,
            error: LoadError::Aborted
        }));
        let metadata_events: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::MetadataChanged(m) => Some(m.title.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(metadata_events, vec![Some("fast".to_string())]);
    }

    #[test]
    fn loads_do_not_wait_for_busy_rayon_workers() {
        let fetcher = CannedFetcher::new().route(
            "https://x.test/a.wav",
            silent_wav(8000, 0.5),
            Duration::ZERO,
        );
        let (mut engine, _) = engine_with(fetcher);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();

        // the closure holds the pool's only worker while it waits
        let outcome = pool.install(|| {
            engine.load_url("https://x.test/a.wav");
            engine.await_load(Duration::from_secs(2))
        });
        assert!(matches!(outcome, Some(Ok(_))), "load stuck behind pool work: {:?}", outcome);
    }

    #[test]
    fn seek_without_a_track_is_ignored() {
        let (mut engine, _) = engine_with(CannedFetcher::new());
        assert_eq!(engine.seek(12.0), Ok(()));
        assert_eq!(engine.current_time(), 0.0);
        assert_eq!(engine.state(), &PlaybackState::Idle);
        assert_eq!(engine.drain_events().count(), 0);

        engine.load(bytes(silent_wav(8000, 1.0))).unwrap();
        engine.drain_events().for_each(drop);
        engine.seek(0.5).unwrap();
        assert_eq!(engine.drain_events().collect::<Vec<_>>(), vec![EngineEvent::Seeked(0.5)]);
    }

    #[test]
    fn analysis_is_refused_while_loading() {
        let fetcher = CannedFetcher::new().route(
            "https://x.test/slow.wav",
            silent_wav(8000, 1.0),
            Duration::from_millis(200),
        );
        let (mut engine, _) = engine_with(fetcher);
        engine.load_url("https://x.test/slow.wav");
        assert!(engine.sample_frequency().is_silent());
        assert_eq!(engine.play(None), Err(PlaybackError::NotReady));
        engine.await_load(Duration::from_secs(10)).unwrap().unwrap();
        assert!(engine.play(None).is_ok());
    }

    #[test]
    fn failures_surface_as_error_state() {
        let (mut engine, _) = engine_with(CannedFetcher::new());
        engine.load_url("https://x.test/nowhere.wav");
        let err = engine.await_load(Duration::from_secs(10)).unwrap().err().unwrap();
        assert!(matches!(err, LoadError::Unreachable(_)));
        assert!(matches!(engine.state(), PlaybackState::Error(_)));
        assert_eq!(engine.play(None), Err(PlaybackError::NotReady));

        let err = engine.load(bytes(vec![0u8; 64])).err().unwrap();
        assert!(matches!(err, LoadError::DecodeFailed(_)));

        // retry is up to the caller
        engine.load(bytes(silent_wav(8000, 0.5))).unwrap();
        assert_eq!(engine.state(), &PlaybackState::Ready);
    }

    #[test]
    fn cancel_reports_abort_and_ignores_result() {
        let fetcher = CannedFetcher::new().route(
            "https://x.test/a.wav",
            silent_wav(8000, 1.0),
            Duration::from_millis(100),
        );
        let (mut engine, _) = engine_with(fetcher);
        let generation = engine.load_url("https://x.test/a.wav");
        engine.cancel_load();
        assert_eq!(engine.state(), &PlaybackState::Idle);
        std::thread::sleep(Duration::from_millis(400));
        engine.poll_loads();
        assert!(engine.metadata().is_none());
        assert!(engine.drain_events().any(|e| e
            == EngineEvent::LoadFailed {
                generation,
                error: LoadError::Aborted
            }));
    }

    #[test]
    fn playback_drives_analysis() {
        let (mut engine, time) = engine_with(CannedFetcher::new());
        engine.load(bytes(kick_wav(16000, 12.0, 60.0))).unwrap();
        assert_eq!(engine.envelope().unwrap().len(), DEFAULT_ENVELOPE_POINTS);
        engine.play(None).unwrap();

        let mut last_time = 0.0;
        let mut heard_signal = false;
        let mut beat = BeatSnapshot::default();
        for _ in 0..(11.5 / FRAME) as usize {
            time.advance(FRAME);
            engine.tick();
            let now = engine.current_time();
            assert!(now >= last_time);
            assert_eq!(engine.current_time(), now);
            last_time = now;

            let snap = engine.sample_frequency();
            heard_signal |= !snap.is_silent();
            beat = engine.detect_beat(&snap);
            assert!((0.0..=1.0).contains(&beat.confidence));
        }
        assert!(heard_signal);
        assert!((50.0..=70.0).contains(&beat.bpm), "bpm {}", beat.bpm);

        engine.pause();
        let snap = engine.sample_frequency();
        let held = engine.detect_beat(&snap);
        assert_eq!(held.bpm, beat.bpm);
        assert!(!held.is_onset);

        engine.stop();
        assert_eq!(engine.current_time(), 0.0);
        let snap = engine.sample_frequency();
        assert!(snap.is_silent());
        assert_eq!(engine.detect_beat(&snap), BeatSnapshot::default());
    }

    #[test]
    fn track_end_stops_and_reports() {
        let (mut engine, time) = engine_with(CannedFetcher::new());
        engine.load(bytes(silent_wav(8000, 1.0))).unwrap();
        engine.play(None).unwrap();
        engine.drain_events().for_each(drop);
        time.advance(1.5);
        engine.tick();
        assert_eq!(engine.state(), &PlaybackState::Stopped);
        let events: Vec<_> = engine.drain_events().collect();
        assert_eq!(events, vec![EngineEvent::StateChanged(PlaybackState::Stopped)]);
    }

    #[test]
    fn dispose_returns_to_idle() {
        let (mut engine, _) = engine_with(CannedFetcher::new());
        engine.load(bytes(silent_wav(8000, 1.0))).unwrap();
        engine.play(None).unwrap();
        engine.dispose();
        assert_eq!(engine.state(), &PlaybackState::Idle);
        assert!(engine.metadata().is_none());
        assert!(engine.envelope().is_none());
        assert!(engine.sample_frequency().is_silent());
    }
}
