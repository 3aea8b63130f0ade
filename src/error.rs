// Error types for the playlist engine
//
// Every failure in the engine is recoverable: the TUI reports it and keeps
// running. The variants map onto what the UI does about them:
// - ValidationError: re-prompt the offending field
// - NotFound: report, nothing changed
// - DeviceError: report, session is back in a consistent state
// - PersistenceError: report, in-memory playlist stays authoritative

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::player::queue::TrackId;

/// Rejected user input for a track field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Artist name cannot be empty")]
    EmptyArtist,

    #[error("Artist name may only contain letters and spaces: '{0}'")]
    InvalidArtist(String),

    #[error("File not found or not readable: {0}")]
    FileNotAccessible(PathBuf),

    #[error("Unsupported audio file '{path}' (allowed: {allowed})")]
    UnsupportedFormat { path: PathBuf, allowed: String },
}

impl ValidationError {
    /// Which input field caused the error, so the UI can re-prompt it.
    pub fn field(&self) -> TrackField {
        match self {
            ValidationError::EmptyArtist | ValidationError::InvalidArtist(_) => TrackField::Artist,
            ValidationError::FileNotAccessible(_) | ValidationError::UnsupportedFormat { .. } => {
                TrackField::FilePath
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackField {
    Artist,
    FilePath,
}

/// Error codes reported by an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    NoOutputDevice,
    FileOpen,
    Decode,
    Command,
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceErrorCode::NoOutputDevice => "no-output-device",
            DeviceErrorCode::FileOpen => "file-open",
            DeviceErrorCode::Decode => "decode",
            DeviceErrorCode::Command => "command",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("audio device error ({code}): {message}")]
pub struct DeviceError {
    pub code: DeviceErrorCode,
    pub message: String,
}

impl DeviceError {
    pub fn new(code: DeviceErrorCode, message: impl Into<String>) -> Self {
        DeviceError {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to write playlist file {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read playlist file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the playback session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("No track selected")]
    NoTrackSelected,

    #[error("No active playback")]
    NoActivePlayback,

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Umbrella error returned by engine operations.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid song #{index} in batch: {source}")]
    BatchValidation {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("Song with ID {0} not found")]
    NotFound(TrackId),

    #[error("Not enough songs (need at least 2)")]
    NotEnoughSongs,

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

pub type Result<T> = std::result::Result<T, PlaylistError>;
