use thiserror::Error;

/// Why a track could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The bytes were read but are not a supported, intact audio stream.
    #[error("failed to decode audio: {0}")]
    DecodeFailed(String),
    /// The bytes could not be obtained at all (network, HTTP status, file read).
    #[error("audio source unreachable: {0}")]
    Unreachable(String),
    /// A newer load superseded this one, or the engine was disposed.
    #[error("load aborted")]
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("no track is loaded")]
    NotReady,
    #[error("output device failure: {0}")]
    DeviceFailure(String),
}
