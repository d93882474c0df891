use std::fmt;
use std::ops::Range;

use serde::Serialize;

/// Static facts about a loaded track.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioMetadata {
    /// Duration in seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// MIME-like container name, e.g. `audio/wav`
    pub container_format: String,
    /// Short codec name reported by the decoder, e.g. `mp3`, `pcm_s16le`
    pub codec: String,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl AudioMetadata {
    /// "Artist - Title", "Title", or nothing.
    pub fn display_title(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
            (None, Some(title)) => Some(title.clone()),
            (Some(artist), None) => Some(artist.clone()),
            (None, None) => None,
        }
    }
}

/// Spectral energy at one instant, one decibel value per frequency bin.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencySnapshot {
    /// Decibel values, each within `min_db..=max_db`
    pub bins: Vec<f32>,
    pub min_db: f32,
    pub max_db: f32,
}

impl FrequencySnapshot {
    /// The all-minimum placeholder handed out when there is no live signal.
    pub fn silent(bin_count: usize, min_db: f32, max_db: f32) -> Self {
        Self {
            bins: vec![min_db; bin_count],
            min_db,
            max_db,
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// True when every bin sits at the floor of the range.
    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&db| db <= self.min_db)
    }

    /// Bin `index` mapped linearly from the dB range onto 0.0-1.0.
    pub fn level(&self, index: usize) -> f32 {
        let span = (self.max_db - self.min_db).max(f32::EPSILON);
        self.bins
            .get(index)
            .map_or(0.0, |&db| ((db - self.min_db) / span).clamp(0.0, 1.0))
    }

    /// Average level of `count` equal groups of bins taken from `bins`.
    ///
    /// Groups hold `len / count` bins (at least one); trailing bins that do not
    /// fill a group are ignored and groups past the end read as 0.0.
    pub fn bucket_levels(&self, bins: Range<usize>, count: usize) -> Vec<f32> {
        let end = bins.end.min(self.bins.len());
        let start = bins.start.min(end);
        if count == 0 {
            return Vec::new();
        }
        let per_bucket = ((end - start) / count).max(1);

        (0..count)
            .map(|i| {
                let lo = start + i * per_bucket;
                let hi = (lo + per_bucket).min(end);
                if lo >= hi {
                    return 0.0;
                }
                (lo..hi).map(|j| self.level(j)).sum::<f32>() / (hi - lo) as f32
            })
            .collect()
    }
}

/// Tempo estimate at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BeatSnapshot {
    /// Beats per minute, 0.0 while unknown
    pub bpm: f32,
    /// 0.0-1.0
    pub confidence: f32,
    /// An onset was detected on this tick
    pub is_onset: bool,
}

/// Whole-track amplitude summary used for scrubbing displays.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WaveformEnvelope {
    /// Normalized peak amplitudes, 0.0-1.0
    pub samples: Vec<f32>,
}

impl WaveformEnvelope {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Transport state owned by the playback clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Stopped,
    Error(String),
}

impl PlaybackState {
    /// Analysis data is only meaningful in these states.
    pub fn is_live(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }

    /// A track is loaded and the transport accepts commands.
    pub fn has_track(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Stopped
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_db_range_onto_unit_interval() {
        let snap = FrequencySnapshot {
            bins: vec![-140.0, -70.0, 0.0, 10.0],
            min_db: -140.0,
            max_db: 0.0,
        };
        assert_eq!(snap.level(0), 0.0);
        assert!((snap.level(1) - 0.5).abs() < 1e-6);
        assert_eq!(snap.level(2), 1.0);
        assert_eq!(snap.level(3), 1.0);
        assert_eq!(snap.level(99), 0.0);
    }

    #[test]
    fn bucket_levels_average_groups() {
        let snap = FrequencySnapshot {
            bins: vec![-140.0, -140.0, 0.0, 0.0, -70.0, -70.0],
            min_db: -140.0,
            max_db: 0.0,
        };
        let levels = snap.bucket_levels(0..snap.len(), 3);
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], 0.0);
        assert_eq!(levels[1], 1.0);
        assert!((levels[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn more_buckets_than_bins_pads_with_zero() {
        let snap = FrequencySnapshot {
            bins: vec![0.0, 0.0],
            min_db: -140.0,
            max_db: 0.0,
        };
        let levels = snap.bucket_levels(0..2, 4);
        assert_eq!(levels, vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn placeholder_is_silent() {
        let snap = FrequencySnapshot::silent(1024, -140.0, 0.0);
        assert_eq!(snap.len(), 1024);
        assert!(snap.is_silent());
    }

    #[test]
    fn display_title_combines_tags() {
        let mut meta = AudioMetadata {
            duration: 1.0,
            sample_rate: 44100,
            channel_count: 2,
            container_format: "audio/wav".into(),
            codec: "pcm_s16le".into(),
            title: Some("Song".into()),
            artist: Some("Band".into()),
        };
        assert_eq!(meta.display_title().as_deref(), Some("Band - Song"));
        meta.artist = None;
        assert_eq!(meta.display_title().as_deref(), Some("Song"));
    }
}
