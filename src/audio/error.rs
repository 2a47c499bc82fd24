use std::path::PathBuf;

use thiserror::Error;

use crate::audio::state::PlayerState;

/// Synchronous failures of the control surface. None of these change player state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("No active player")]
    NoActivePlayer,

    #[error("Queue is empty")]
    QueueEmpty,

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Queue index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Cannot {op} while {state}")]
    InvalidState { op: &'static str, state: PlayerState },

    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    #[error("Favorite not found: {0}")]
    FavoriteNotFound(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    #[error("Voice channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Audio output device error: {0}")]
    Device(String),
}

/// Failures attached to a completion: the stream could not start or died mid-way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Track has no local file: {0}")]
    MissingLocalPath(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No playback session")]
    NoSession,

    #[error("Stream ended without reporting completion")]
    StreamAbandoned,

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PlaybackError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum FavoritesError {
    #[error("A favorite titled {0:?} already exists")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed favorites file: {0}")]
    Serde(#[from] serde_json::Error),
}
