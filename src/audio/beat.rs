use std::collections::VecDeque;

use serde::Deserialize;

use super::features::{BeatSnapshot, FrequencySnapshot};

/// Longest inter-onset interval still counted as a beat (30 BPM).
const MAX_BEAT_INTERVAL: f64 = 2.0;
/// Coefficient of variation at which confidence reaches zero.
const MAX_INTERVAL_CV: f32 = 0.5;
/// Energies below this are treated as silence and never trigger onsets.
const ENERGY_FLOOR: f32 = 1e-10;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BeatConfig {
    /// Number of lowest bins summed into the onset energy
    pub low_bins: usize,
    /// Rolling average length, in ticks
    pub history_len: usize,
    /// Energy must exceed the rolling average by this factor
    pub threshold: f32,
    /// Refractory period after an onset, seconds
    pub min_onset_gap: f64,
    /// Onsets required before a tempo is reported
    pub min_onsets: usize,
    /// Most recent intervals kept for the estimate
    pub max_intervals: usize,
    /// Seconds without an onset before confidence starts to fall
    pub silence_timeout: f64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            low_bins: 20,
            history_len: 43,
            threshold: 1.4,
            min_onset_gap: 0.3,
            min_onsets: 4,
            max_intervals: 16,
            silence_timeout: 2.0,
        }
    }
}

/// Onset-interval tempo tracker fed one spectrum per tick.
pub struct BeatDetector {
    config: BeatConfig,
    energy: VecDeque<f32>,
    onsets: VecDeque<f64>,
    last_time: Option<f64>,
}

impl BeatDetector {
    pub fn new(config: BeatConfig) -> Self {
        let config = BeatConfig {
            low_bins: config.low_bins.max(1),
            history_len: config.history_len.max(2),
            min_onsets: config.min_onsets.max(2),
            max_intervals: config.max_intervals.max(1),
            ..config
        };
        Self {
            config,
            energy: VecDeque::with_capacity(config.history_len),
            onsets: VecDeque::with_capacity(config.max_intervals + 1),
            last_time: None,
        }
    }

    pub fn config(&self) -> &BeatConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.energy.clear();
        self.onsets.clear();
        self.last_time = None;
    }

    /// Number of onsets currently remembered.
    pub fn onset_count(&self) -> usize {
        self.onsets.len()
    }

    /// Consume the spectrum observed at playback time `time` (seconds).
    pub fn detect(&mut self, snapshot: &FrequencySnapshot, time: f64) -> BeatSnapshot {
        if self.last_time.is_some_and(|last| time < last) {
            log::debug!("Beat detector rewound to {:.2}s, resetting", time);
            self.reset();
        }
        self.last_time = Some(time);

        let energy = low_band_energy(snapshot, self.config.low_bins);
        let is_onset = self.is_onset(energy, time);

        if self.energy.len() == self.config.history_len {
            self.energy.pop_front();
        }
        self.energy.push_back(energy);

        if is_onset {
            self.onsets.push_back(time);
            while self.onsets.len() > self.config.max_intervals + 1 {
                self.onsets.pop_front();
            }
        }

        let (bpm, confidence) = self.estimate(time);
        BeatSnapshot {
            bpm,
            confidence,
            is_onset,
        }
    }

    fn is_onset(&self, energy: f32, time: f64) -> bool {
        if energy <= ENERGY_FLOOR || self.energy.len() < self.config.history_len / 2 {
            return false;
        }
        let average = self.energy.iter().sum::<f32>() / self.energy.len() as f32;
        let refractory = self
            .onsets
            .back()
            .is_some_and(|&last| time - last < self.config.min_onset_gap);
        !refractory && energy > average * self.config.threshold
    }

    fn estimate(&self, time: f64) -> (f32, f32) {
        if self.onsets.len() < self.config.min_onsets {
            return (0.0, 0.0);
        }

        let mut intervals: Vec<f64> = self
            .onsets
            .iter()
            .zip(self.onsets.iter().skip(1))
            .map(|(a, b)| b - a)
            .filter(|&d| d >= self.config.min_onset_gap && d <= MAX_BEAT_INTERVAL)
            .collect();
        if intervals.is_empty() {
            return (0.0, 0.0);
        }

        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];
        let bpm = (60.0 / median) as f32;

        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let variance =
            intervals.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
        let cv = (variance.sqrt() / mean) as f32;
        let consistency = (1.0 - cv / MAX_INTERVAL_CV).clamp(0.0, 1.0);

        let since = self.onsets.back().map_or(0.0, |&last| time - last);
        let timeout = self.config.silence_timeout.max(f64::EPSILON);
        let fade = if since > timeout {
            (1.0 - (since - timeout) / timeout).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };

        (bpm, (consistency * fade).clamp(0.0, 1.0))
    }
}

/// Mean linear power of the lowest `count` bins.
fn low_band_energy(snapshot: &FrequencySnapshot, count: usize) -> f32 {
    let n = count.min(snapshot.bins.len());
    if n == 0 || snapshot.is_silent() {
        return 0.0;
    }
    snapshot.bins[..n]
        .iter()
        .map(|&db| 10f32.powf(db / 10.0))
        .sum::<f32>()
        / n as f32
}
