use std::path::Path;
use std::sync::Arc;

use super::decode::{decode_bytes, DecodedAudio};
use super::features::AudioMetadata;
use super::fetch::{url_file_name, Fetch};
use crate::error::LoadError;

/// What to load: raw file bytes (with an optional file name for hints) or a URL.
#[derive(Clone, Debug)]
pub enum AudioInput {
    Bytes { data: Vec<u8>, name: Option<String> },
    Url(String),
}

impl AudioInput {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read(path).map_err(|e| {
            LoadError::Unreachable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
        Ok(AudioInput::Bytes { data, name })
    }

    pub fn describe(&self) -> String {
        match self {
            AudioInput::Bytes { data, name } => format!(
                "{} ({} bytes)",
                name.as_deref().unwrap_or("<memory>"),
                data.len()
            ),
            AudioInput::Url(url) => url.clone(),
        }
    }
}

/// Split "song.name.mp3" into ("song.name", Some("mp3")).
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Turn an input into decoded audio. Blocking: may hit the network.
pub fn resolve(input: AudioInput, fetcher: &dyn Fetch) -> Result<DecodedAudio, LoadError> {
    let (data, name) = match input {
        AudioInput::Bytes { data, name } => (data, name),
        AudioInput::Url(url) => {
            let data = fetcher.fetch(&url)?;
            (data, url_file_name(&url).map(str::to_string))
        }
    };

    let (stem, ext) = match name.as_deref() {
        Some(n) => {
            let (stem, ext) = split_name(n);
            (Some(stem.to_string()), ext.map(str::to_string))
        }
        None => (None, None),
    };

    let mut decoded = decode_bytes(data, ext.as_deref())?;
    if decoded.title.is_none() {
        decoded.title = stem;
    }
    Ok(decoded)
}

pub fn metadata_of(audio: &DecodedAudio) -> AudioMetadata {
    AudioMetadata {
        duration: audio.duration(),
        sample_rate: audio.sample_rate,
        channel_count: audio.channel_count(),
        container_format: audio.container_format.clone(),
        codec: audio.codec.clone(),
        title: audio.title.clone(),
        artist: audio.artist.clone(),
    }
}

/// Exclusive owner of the decoded sample buffer of the current track.
pub struct AudioSource {
    buffer: Option<Arc<DecodedAudio>>,
    metadata: Option<AudioMetadata>,
    fetcher: Arc<dyn Fetch>,
}

impl AudioSource {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            buffer: None,
            metadata: None,
            fetcher,
        }
    }

    /// Load synchronously. The previous buffer is released before decoding starts.
    pub fn load(&mut self, input: AudioInput) -> Result<AudioMetadata, LoadError> {
        self.dispose();
        let decoded = resolve(input, self.fetcher.as_ref())?;
        Ok(self.accept(decoded))
    }

    /// Take ownership of audio decoded elsewhere (the load worker).
    pub fn accept(&mut self, decoded: DecodedAudio) -> AudioMetadata {
        let metadata = metadata_of(&decoded);
        self.buffer = Some(Arc::new(decoded));
        self.metadata = Some(metadata.clone());
        metadata
    }

    pub fn dispose(&mut self) {
        if self.buffer.take().is_some() {
            log::debug!("Released decoded audio buffer");
        }
        self.metadata = None;
    }

    pub fn buffer(&self) -> Option<&Arc<DecodedAudio>> {
        self.buffer.as_ref()
    }

    pub fn metadata(&self) -> Option<&AudioMetadata> {
        self.metadata.as_ref()
    }

    pub fn fetcher(&self) -> Arc<dyn Fetch> {
        Arc::clone(&self.fetcher)
    }
}
