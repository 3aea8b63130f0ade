// ==========================================
// INPUT VALIDATION
// ==========================================
// Checks applied to user-provided track fields before they reach the
// playlist. The engine never loops on bad input: it returns the error and
// lets the UI ask again.

use std::fs::File;
use std::path::Path;

use crate::error::ValidationError;

/// Artist names are letters and spaces only, with at least one letter.
pub fn validate_artist(artist: &str) -> Result<(), ValidationError> {
    if artist.trim().is_empty() {
        return Err(ValidationError::EmptyArtist);
    }

    if artist.chars().all(|c| c.is_alphabetic() || c == ' ') {
        Ok(())
    } else {
        Err(ValidationError::InvalidArtist(artist.to_string()))
    }
}

// ==========================================
// FILE PATH CHECK
// ==========================================
// An empty path is allowed (track without audio). Otherwise the path must:
// 1. Have one of the allowed extensions (case-insensitive)
// 2. Point at a regular file
// 3. Actually open for reading
//
// The extension list comes from config so users with wav/flac libraries can
// widen it; the default is just "mp3".
pub fn validate_file_path(path: &str, allowed_extensions: &[String]) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Ok(());
    }

    let file_path = Path::new(path);

    let extension_ok = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false);

    if !extension_ok {
        return Err(ValidationError::UnsupportedFormat {
            path: file_path.to_path_buf(),
            allowed: allowed_extensions.join(", "),
        });
    }

    if !file_path.is_file() || File::open(file_path).is_err() {
        return Err(ValidationError::FileNotAccessible(file_path.to_path_buf()));
    }

    Ok(())
}
