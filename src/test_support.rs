//! In-memory audio fixtures shared by the unit tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavWriter};

use crate::audio::fetch::Fetch;
use crate::error::LoadError;

#[derive(Clone, Copy)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub seconds: f32,
    pub frequency: f32,
}

fn encode_wav(sample_rate: u32, channels: u16, mono: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in mono {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// A 0.5 amplitude sine tone.
pub fn sine_wav(spec: WavSpec) -> Vec<u8> {
    let frames = (spec.seconds * spec.sample_rate as f32) as usize;
    let mono: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / spec.sample_rate as f32;
            0.5 * (2.0 * std::f32::consts::PI * spec.frequency * t).sin()
        })
        .collect();
    encode_wav(spec.sample_rate, spec.channels, &mono)
}

/// Digital silence.
pub fn silent_wav(sample_rate: u32, seconds: f32) -> Vec<u8> {
    let frames = (seconds * sample_rate as f32) as usize;
    encode_wav(sample_rate, 1, &vec![0.0; frames])
}

/// Short decaying low-frequency bursts at a fixed tempo, silence in between.
pub fn kick_wav(sample_rate: u32, seconds: f32, bpm: f32) -> Vec<u8> {
    encode_wav(sample_rate, 1, &kick_samples(sample_rate, seconds, bpm))
}

pub fn kick_samples(sample_rate: u32, seconds: f32, bpm: f32) -> Vec<f32> {
    let frames = (seconds * sample_rate as f32) as usize;
    let period = (60.0 / bpm * sample_rate as f32) as usize;
    let burst = sample_rate as usize / 12;
    (0..frames)
        .map(|i| {
            let k = i % period;
            if k < burst {
                let t = k as f32 / sample_rate as f32;
                let env = 1.0 - k as f32 / burst as f32;
                0.9 * env * (2.0 * std::f32::consts::PI * 60.0 * t).sin()
            } else {
                0.0
            }
        })
        .collect()
}

/// Serves canned bodies per URL after a per-URL delay.
pub struct CannedFetcher {
    routes: HashMap<String, (Vec<u8>, Duration)>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn route(mut self, url: &str, body: Vec<u8>, delay: Duration) -> Self {
        self.routes.insert(url.to_string(), (body, delay));
        self
    }
}

impl Fetch for CannedFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let (body, delay) = self
            .routes
            .get(url)
            .ok_or_else(|| LoadError::Unreachable(format!("connection refused: {}", url)))?;
        std::thread::sleep(*delay);
        Ok(body.clone())
    }
}
