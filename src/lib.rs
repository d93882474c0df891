//! Audio analysis engine and beat-synchronized visualization pipeline.
//!
//! [`engine::AudioEngine`] decodes a track, keeps the playback clock and
//! produces one frequency and beat snapshot per frame;
//! [`visual::coordinator::VisualizationCoordinator`] feeds those snapshots to
//! the active [`render::Renderer`].

pub mod audio;
pub mod config;
pub mod encode;
pub mod engine;
pub mod error;
pub mod render;
pub mod visual;

#[cfg(test)]
mod test_support;
