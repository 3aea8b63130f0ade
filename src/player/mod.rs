// Playlist engine: tracks, persistence, playback.

pub mod audio;
pub mod engine;
pub mod queue;
pub mod session;
pub mod storage;
pub mod validation;
