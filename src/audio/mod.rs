pub mod analysis;
pub mod beat;
pub mod clock;
pub mod decode;
pub mod features;
pub mod fetch;
pub mod source;
pub mod waveform;
