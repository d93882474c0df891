use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

use crate::error::LoadError;

/// A fully decoded track.
pub struct DecodedAudio {
    /// De-interleaved samples, one buffer per channel
    pub channels: Vec<Arc<[f32]>>,
    /// Average of all channels. Shares storage with `channels[0]` for mono input.
    pub mono: Arc<[f32]>,
    pub sample_rate: u32,
    pub container_format: String,
    pub codec: String,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl DecodedAudio {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.mono.len()
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.mono.len() as f64 / self.sample_rate as f64
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }
}

/// Freeze per-channel buffers and derive the mixdown.
fn mixdown(channels: Vec<Vec<f32>>, frames: usize) -> (Vec<Arc<[f32]>>, Arc<[f32]>) {
    let channels: Vec<Arc<[f32]>> = channels.into_iter().map(Arc::from).collect();
    let mono = match channels.as_slice() {
        [only] => Arc::clone(only),
        _ => {
            let n = channels.len() as f32;
            (0..frames)
                .map(|i| channels.iter().map(|ch| ch[i]).sum::<f32>() / n)
                .collect()
        }
    };
    (channels, mono)
}

#[derive(Default)]
struct TrackTags {
    title: Option<String>,
    artist: Option<String>,
}

impl TrackTags {
    fn absorb(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            let value = tag.value.to_string();
            if value.trim().is_empty() {
                continue;
            }
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => self.title = Some(value),
                Some(StandardTagKey::Artist) | Some(StandardTagKey::AlbumArtist)
                    if self.artist.is_none() =>
                {
                    self.artist = Some(value)
                }
                _ => {}
            }
        }
    }
}

/// Decode an in-memory audio file. `extension` is only a probing hint.
pub fn decode_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, LoadError> {
    let container_format = sniff_container(&data, extension);
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| LoadError::DecodeFailed(format!("unsupported container: {}", e)))?;

    let mut tags = TrackTags::default();
    if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        tags.absorb(revision);
    }

    let mut format = probed.format;
    if let Some(revision) = format.metadata().current() {
        tags.absorb(revision);
    }

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::DecodeFailed("no audio tracks found".into()))?;

    let track_id = track.id;
    let codec = symphonia::default::get_codecs()
        .get_codec(track.codec_params.codec)
        .map_or_else(|| "unknown".to_string(), |d| d.short_name.to_string());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| LoadError::DecodeFailed(format!("no decoder for {}: {}", codec, e)))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(LoadError::DecodeFailed(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(err)) => {
                log::debug!("Skipping corrupt packet: {}", err);
                continue;
            }
            Err(e) => return Err(LoadError::DecodeFailed(e.to_string())),
        };

        let spec = *decoded.spec();
        let channel_count = spec.channels.count().max(1);
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        if channels.len() < channel_count {
            channels.resize_with(channel_count, Vec::new);
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        for frame in sample_buf.samples().chunks(channel_count) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
    }

    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    if frames == 0 || sample_rate == 0 {
        return Err(LoadError::DecodeFailed("stream contains no audio frames".into()));
    }
    for ch in channels.iter_mut() {
        ch.truncate(frames);
    }

    let (channels, mono) = mixdown(channels, frames);

    log::info!(
        "Decoded audio: {} frames x {} ch, {}Hz, {:.1}s ({}, {})",
        frames,
        channels.len(),
        sample_rate,
        frames as f64 / sample_rate as f64,
        container_format,
        codec
    );

    Ok(DecodedAudio {
        channels,
        mono,
        sample_rate,
        container_format,
        codec,
        title: tags.title,
        artist: tags.artist,
    })
}

/// Guess the container from magic bytes, falling back to the extension.
pub fn sniff_container(data: &[u8], extension: Option<&str>) -> String {
    let magic = if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        Some("audio/wav")
    } else if data.starts_with(b"fLaC") {
        Some("audio/flac")
    } else if data.starts_with(b"OggS") {
        Some("audio/ogg")
    } else if data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
        Some("audio/mpeg")
    } else if data.len() >= 8 && &data[4..8] == b"ftyp" {
        Some("audio/mp4")
    } else {
        None
    };

    let by_ext = extension.map(|e| e.to_ascii_lowercase()).and_then(|e| match e.as_str() {
        "wav" | "wave" => Some("audio/wav"),
        "flac" => Some("audio/flac"),
        "ogg" | "oga" => Some("audio/ogg"),
        "mp3" => Some("audio/mpeg"),
        "m4a" | "mp4" | "aac" => Some("audio/mp4"),
        _ => None,
    });

    magic.or(by_ext).unwrap_or("audio/unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sine_wav, WavSpec};

    #[test]
    fn decodes_wav_bytes() {
        let bytes = sine_wav(WavSpec {
            sample_rate: 8000,
            channels: 2,
            seconds: 0.5,
            frequency: 440.0,
        });
        let audio = decode_bytes(bytes, Some("wav")).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frames(), 4000);
        assert!((audio.duration() - 0.5).abs() < 1e-9);
        assert_eq!(audio.container_format, "audio/wav");
        let peak = audio.mono.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.4);
    }

    #[test]
    fn mono_track_is_not_duplicated() {
        let bytes = sine_wav(WavSpec {
            sample_rate: 8000,
            channels: 1,
            seconds: 0.25,
            frequency: 440.0,
        });
        let audio = decode_bytes(bytes, Some("wav")).unwrap();
        assert_eq!(audio.channel_count(), 1);
        assert!(Arc::ptr_eq(&audio.mono, &audio.channels[0]));
    }

    #[test]
    fn stereo_mixdown_averages_channels() {
        let (channels, mono) = mixdown(vec![vec![1.0, 0.5], vec![0.0, -0.5]], 2);
        assert_eq!(channels.len(), 2);
        assert_eq!(&mono[..], &[0.5, 0.0]);
        assert!(!Arc::ptr_eq(&mono, &channels[0]));
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        let err = decode_bytes(vec![7u8; 4096], None).err().unwrap();
        assert!(matches!(err, LoadError::DecodeFailed(_)));
    }

    #[test]
    fn empty_input_is_a_decode_failure() {
        let err = decode_bytes(Vec::new(), Some("mp3")).err().unwrap();
        assert!(matches!(err, LoadError::DecodeFailed(_)));
    }

    #[test]
    fn sniffs_magic_before_extension() {
        assert_eq!(sniff_container(b"fLaC\0\0\0\0", Some("mp3")), "audio/flac");
        assert_eq!(sniff_container(b"OggS....", None), "audio/ogg");
        assert_eq!(sniff_container(b"ID3\x04....", None), "audio/mpeg");
        assert_eq!(sniff_container(b"????", Some("M4A")), "audio/mp4");
        assert_eq!(sniff_container(b"????", None), "audio/unknown");
    }
}
