use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;

use super::decode::DecodedAudio;
use super::features::FrequencySnapshot;

pub const DEFAULT_FFT_SIZE: usize = 2048;
const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Transform window in samples, power of two
    pub fft_size: usize,
    /// Weight of the previous frame in the temporal average (0.0-1.0)
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing_time_constant: 0.8,
            min_decibels: -140.0,
            max_decibels: 0.0,
        }
    }
}

impl AnalyzerConfig {
    /// Round the window to a supported power of two and order the dB range.
    fn sanitized(mut self) -> Self {
        let requested = self.fft_size;
        self.fft_size = requested
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two()
            .min(MAX_FFT_SIZE);
        if self.fft_size != requested {
            log::warn!("fft_size {} not supported, using {}", requested, self.fft_size);
        }
        self.smoothing_time_constant = if self.smoothing_time_constant.is_nan() {
            0.0
        } else {
            self.smoothing_time_constant.clamp(0.0, 1.0)
        };
        if self.min_decibels >= self.max_decibels {
            log::warn!(
                "Invalid dB range {}..{}, using defaults",
                self.min_decibels,
                self.max_decibels
            );
            let defaults = AnalyzerConfig::default();
            self.min_decibels = defaults.min_decibels;
            self.max_decibels = defaults.max_decibels;
        }
        self
    }
}

/// Short-time spectrum of the samples just before the playhead.
///
/// Window size and dB range are fixed at construction; build a new analyzer to
/// change them.
pub struct FrequencyAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl FrequencyAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let config = config.sanitized();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.fft_size);

        Self {
            config,
            fft,
            window: hann_window(config.fft_size),
            smoothed: vec![0.0; config.fft_size / 2],
            buffer: vec![Complex::new(0.0, 0.0); config.fft_size],
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Every bin at the floor of the range.
    pub fn placeholder(&self) -> FrequencySnapshot {
        FrequencySnapshot::silent(
            self.bin_count(),
            self.config.min_decibels,
            self.config.max_decibels,
        )
    }

    /// Forget the temporal average, e.g. after a seek or a new track.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyze the `fft_size` samples ending at `position` seconds.
    pub fn sample(&mut self, audio: &DecodedAudio, position: f64) -> FrequencySnapshot {
        let size = self.config.fft_size;
        let samples: &[f32] = &audio.mono;
        let end = ((position.max(0.0) * audio.sample_rate as f64) as usize).min(samples.len());
        let start = end.saturating_sub(size);
        let offset = size - (end - start);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let value = if i >= offset {
                samples[start + i - offset] * self.window[i]
            } else {
                0.0
            };
            *slot = Complex::new(value, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / size as f32;
        let min_db = self.config.min_decibels;
        let max_db = self.config.max_decibels;

        let bins = self
            .smoothed
            .iter_mut()
            .zip(self.buffer.iter())
            .map(|(avg, c)| {
                *avg = tau * *avg + (1.0 - tau) * c.norm() * scale;
                if *avg > 0.0 {
                    (20.0 * avg.log10()).clamp(min_db, max_db)
                } else {
                    min_db
                }
            })
            .collect();

        FrequencySnapshot {
            bins,
            min_db,
            max_db,
        }
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
