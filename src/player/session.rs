// ==========================================
// PLAYBACK SESSION
// ==========================================
// State machine between the playlist and the audio device.
//
//            play()                toggle()
//   Stopped ───────► Playing ◄──────────────► Paused
//      ▲                │                       │
//      └────────────────┴───── stop() ──────────┘
//
// Key Concept: the device handle lives inside the state
// - Stopped carries no handle, Playing/Paused carry exactly one
// - So "handle present iff Playing or Paused" cannot be broken
// - stop() takes the handle out and closes it, even if the stop command
//   itself fails
//
// play() always goes through Stopped first, which releases the previous
// handle before a new one is opened.

use std::fmt;
use std::path::Path;

use tracing::{error, info, warn};

use super::audio::{AudioDevice, FormatHint};
use super::queue::Track;
use crate::error::{DeviceError, PlaybackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackStatus::Playing => "▶ Playing",
            PlaybackStatus::Paused => "⏸ Paused",
            PlaybackStatus::Stopped => "⏹ Stopped",
        };
        f.write_str(label)
    }
}

enum SessionState<H> {
    Stopped,
    Playing(H),
    Paused(H),
}

pub struct PlaybackSession<D: AudioDevice> {
    device: D,
    state: SessionState<D::Handle>,
}

impl<D: AudioDevice> PlaybackSession<D> {
    pub fn new(device: D) -> Self {
        PlaybackSession {
            device,
            state: SessionState::Stopped,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        match self.state {
            SessionState::Stopped => PlaybackStatus::Stopped,
            SessionState::Playing(_) => PlaybackStatus::Playing,
            SessionState::Paused(_) => PlaybackStatus::Paused,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status() == PlaybackStatus::Playing
    }

    // ==========================================
    // PLAY
    // ==========================================
    // 1. Stop whatever is loaded (releases the old handle)
    // 2. No track, or a track without a file → NoTrackSelected
    // 3. Open with the MP3 hint, then once more letting the decoder probe
    // 4. Issue play; if that fails the fresh handle is closed again
    //
    // Any failure leaves the session Stopped and ready for the next try.
    pub fn play(&mut self, track: Option<&Track>) -> Result<(), PlaybackError> {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Stop before play failed, handle released anyway");
        }

        let track = track.ok_or(PlaybackError::NoTrackSelected)?;
        let path = track.playable_path().ok_or(PlaybackError::NoTrackSelected)?;

        let handle = self.open_with_fallback(Path::new(path))?;

        if let Err(e) = self.device.play(&handle) {
            error!(id = track.id, error = %e, "Play command failed");
            self.device.close(handle);
            return Err(e.into());
        }

        info!(id = track.id, title = %track.title, "Playback started");
        self.state = SessionState::Playing(handle);
        Ok(())
    }

    fn open_with_fallback(&mut self, path: &Path) -> Result<D::Handle, DeviceError> {
        match self.device.open(path, FormatHint::Mpeg) {
            Ok(handle) => Ok(handle),
            Err(primary) => {
                warn!(path = %path.display(), error = %primary, "Open failed, retrying with format probe");
                self.device.open(path, FormatHint::Probe).map_err(|fallback| {
                    error!(path = %path.display(), error = %fallback, "Could not open audio file");
                    fallback
                })
            }
        }
    }

    // ==========================================
    // PAUSE / RESUME
    // ==========================================
    // One toggle: Playing → Paused, Paused → Playing.
    // A failed command keeps the current state. Returns the new status.
    pub fn toggle(&mut self) -> Result<PlaybackStatus, PlaybackError> {
        match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Stopped => Err(PlaybackError::NoActivePlayback),
            SessionState::Playing(handle) => match self.device.pause(&handle) {
                Ok(()) => {
                    self.state = SessionState::Paused(handle);
                    Ok(PlaybackStatus::Paused)
                }
                Err(e) => {
                    self.state = SessionState::Playing(handle);
                    Err(e.into())
                }
            },
            SessionState::Paused(handle) => match self.device.resume(&handle) {
                Ok(()) => {
                    self.state = SessionState::Playing(handle);
                    Ok(PlaybackStatus::Playing)
                }
                Err(e) => {
                    self.state = SessionState::Paused(handle);
                    Err(e.into())
                }
            },
        }
    }

    // ==========================================
    // STOP
    // ==========================================
    // Idempotent. The handle is closed and the session is Stopped no matter
    // what the stop command returns; the error is only passed on.
    pub fn stop(&mut self) -> Result<(), DeviceError> {
        let handle = match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Stopped => return Ok(()),
            SessionState::Playing(handle) | SessionState::Paused(handle) => handle,
        };

        let result = self.device.stop(&handle);
        self.device.close(handle);
        info!("Playback stopped");
        result
    }

    pub fn describe_error(&self, err: &DeviceError) -> String {
        format!("{} ({})", self.device.describe_error(err.code), err.message)
    }
}

// The handle must never outlive the session
impl<D: AudioDevice> Drop for PlaybackSession<D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Stop on shutdown failed");
        }
    }
}
