use std::num::NonZeroUsize;

use rayon::prelude::*;

use super::decode::DecodedAudio;
use super::features::WaveformEnvelope;

pub const DEFAULT_ENVELOPE_POINTS: usize = 1000;

/// Whole-track envelope of the mono mixdown.
///
/// Each output point is the absolute peak of its bucket, and the result is
/// scaled so the loudest bucket reads 1.0. Bucket `i` of `n` spans frames
/// `[i * len / n, (i + 1) * len / n)`, widened to one frame when the track has
/// fewer frames than points. Silent input produces all zeros.
pub fn extract(audio: &DecodedAudio, points: NonZeroUsize) -> WaveformEnvelope {
    envelope_of(&audio.mono, points)
}

pub fn envelope_of(samples: &[f32], points: NonZeroUsize) -> WaveformEnvelope {
    let n = points.get();
    let len = samples.len();
    if len == 0 {
        return WaveformEnvelope {
            samples: vec![0.0; n],
        };
    }

    let peaks: Vec<f32> = (0..n)
        .into_par_iter()
        .map(|i| {
            let start = (i * len / n).min(len - 1);
            let end = ((i + 1) * len / n).clamp(start + 1, len);
            samples[start..end]
                .iter()
                .fold(0.0f32, |peak, s| peak.max(s.abs()))
        })
        .collect();

    let loudest = peaks.iter().copied().fold(0.0f32, f32::max);
    let samples = if loudest > 0.0 {
        peaks.into_iter().map(|p| p / loudest).collect()
    } else {
        peaks
    };

    WaveformEnvelope { samples }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 / len as f32) * if i % 2 == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn length_is_exactly_the_requested_count() {
        let samples = ramp(12_345);
        for n in [1, 2, 7, 1000, 12_345, 50_000] {
            assert_eq!(envelope_of(&samples, points(n)).len(), n);
        }
        assert_eq!(envelope_of(&[], points(10)).len(), 10);
    }

    #[test]
    fn deterministic_across_calls() {
        let samples = ramp(99_991);
        let a = envelope_of(&samples, points(1000));
        let b = envelope_of(&samples, points(1000));
        assert_eq!(a, b);
    }

    #[test]
    fn normalized_to_loudest_bucket() {
        let mut samples = vec![0.0f32; 1000];
        samples[10] = -0.25;
        samples[900] = 0.5;
        let env = envelope_of(&samples, points(10));
        assert_eq!(env.samples[0], 0.5);
        assert_eq!(env.samples[9], 1.0);
        assert_eq!(env.samples[5], 0.0);
    }

    #[test]
    fn silence_stays_zero() {
        let env = envelope_of(&vec![0.0; 500], points(20));
        assert!(env.samples.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn more_points_than_frames() {
        let env = envelope_of(&[0.5, -1.0], points(4));
        assert_eq!(env.samples, vec![0.5, 0.5, 1.0, 1.0]);
    }
}
