// ==========================================
// AUDIO OUTPUT DEVICE
// ==========================================
// This module is the boundary between the playlist engine and the actual
// speakers. The engine only talks to the AudioDevice trait; RodioDevice is
// the real implementation built on rodio.
//
// Key Concept: handles are owned values
// - open() gives back a Handle for one loaded file
// - play/pause/resume/stop borrow it
// - close() takes it by value, so a closed handle cannot be used again
//
// Every call except close() can fail and returns a DeviceError.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::error::{DeviceError, DeviceErrorCode};

// ==========================================
// FORMAT HINTS
// ==========================================
// Mpeg: decode the file as MP3 directly (the primary attempt)
// Probe: let the decoder sniff the container (the fallback attempt, picks
//        up WAV/FLAC/OGG files or MP3s with odd headers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatHint {
    Mpeg,
    Probe,
}

pub trait AudioDevice {
    type Handle;

    fn open(&mut self, path: &Path, hint: FormatHint) -> Result<Self::Handle, DeviceError>;
    fn play(&mut self, handle: &Self::Handle) -> Result<(), DeviceError>;
    fn pause(&mut self, handle: &Self::Handle) -> Result<(), DeviceError>;
    fn resume(&mut self, handle: &Self::Handle) -> Result<(), DeviceError>;
    fn stop(&mut self, handle: &Self::Handle) -> Result<(), DeviceError>;
    fn close(&mut self, handle: Self::Handle);

    /// Human readable text for an error code.
    fn describe_error(&self, code: DeviceErrorCode) -> String {
        match code {
            DeviceErrorCode::NoOutputDevice => "No audio output device is available".to_string(),
            DeviceErrorCode::FileOpen => "The audio file could not be opened".to_string(),
            DeviceErrorCode::Decode => "The audio file format is not supported or the file is corrupted".to_string(),
            DeviceErrorCode::Command => "The audio device rejected the command".to_string(),
        }
    }
}

// ==========================================
// RODIO DEVICE
// ==========================================
// stream: Option<(OutputStream, OutputStreamHandle)>
//   - Connection to the OS audio system, opened on first use
//   - The OutputStream MUST stay alive while anything plays; dropping it
//     silences every sink
//   - Opened lazily so the app still starts on a machine with no sound card
//     (every open() then fails with NoOutputDevice)
//
// Each handle is its own Sink holding one decoded file.
pub struct RodioDevice {
    stream: Option<(OutputStream, OutputStreamHandle)>,
}

pub struct RodioHandle {
    sink: Sink,
}

impl RodioDevice {
    pub fn new() -> Self {
        RodioDevice { stream: None }
    }

    fn output_handle(&mut self) -> Result<&OutputStreamHandle, DeviceError> {
        if self.stream.is_none() {
            let stream = OutputStream::try_default()
                .map_err(|e| DeviceError::new(DeviceErrorCode::NoOutputDevice, e.to_string()))?;
            self.stream = Some(stream);
        }

        match &self.stream {
            Some((_, handle)) => Ok(handle),
            None => Err(DeviceError::new(DeviceErrorCode::NoOutputDevice, "audio stream unavailable")),
        }
    }

    fn decode(path: &Path, hint: FormatHint) -> Result<Decoder<BufReader<File>>, DeviceError> {
        let file = File::open(path).map_err(|e| {
            DeviceError::new(DeviceErrorCode::FileOpen, format!("{}: {}", path.display(), e))
        })?;
        let reader = BufReader::new(file);

        let decoder = match hint {
            FormatHint::Mpeg => Decoder::new_mp3(reader),
            FormatHint::Probe => Decoder::new(reader),
        };

        decoder.map_err(|e| DeviceError::new(DeviceErrorCode::Decode, e.to_string()))
    }
}

impl Default for RodioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for RodioDevice {
    type Handle = RodioHandle;

    // Loads the file into a paused sink. Nothing is heard until play().
    fn open(&mut self, path: &Path, hint: FormatHint) -> Result<RodioHandle, DeviceError> {
        let decoder = Self::decode(path, hint)?;
        let output = self.output_handle()?;

        let sink = Sink::try_new(output)
            .map_err(|e| DeviceError::new(DeviceErrorCode::NoOutputDevice, e.to_string()))?;
        sink.pause();
        sink.append(decoder);

        debug!(path = %path.display(), ?hint, "Audio file opened");
        Ok(RodioHandle { sink })
    }

    fn play(&mut self, handle: &RodioHandle) -> Result<(), DeviceError> {
        // An empty sink means the decoder produced nothing to play
        if handle.sink.empty() {
            return Err(DeviceError::new(DeviceErrorCode::Command, "nothing loaded to play"));
        }
        handle.sink.play();
        Ok(())
    }

    fn pause(&mut self, handle: &RodioHandle) -> Result<(), DeviceError> {
        handle.sink.pause();
        Ok(())
    }

    fn resume(&mut self, handle: &RodioHandle) -> Result<(), DeviceError> {
        if handle.sink.empty() {
            return Err(DeviceError::new(DeviceErrorCode::Command, "track already finished"));
        }
        handle.sink.play();
        Ok(())
    }

    fn stop(&mut self, handle: &RodioHandle) -> Result<(), DeviceError> {
        handle.sink.stop();
        Ok(())
    }

    fn close(&mut self, handle: RodioHandle) {
        // Dropping the sink detaches it from the output stream
        drop(handle);
        debug!("Audio handle closed");
    }
}
