// ==========================================
// PLAYLIST FILE FORMAT
// ==========================================
// The playlist is stored as a flat stream of binary records, one per
// track, in playlist order. No header, no footer, no checksum.
//
// Record layout (all integers little-endian):
//
//   [i32 id]
//   [u64 title_len ][title bytes ]
//   [u64 artist_len][artist bytes]
//   [u64 path_len  ][path bytes  ]   (0 = no audio file)
//   [u64 lyrics_len][lyrics bytes]
//
// Strings are UTF-8.
//
// Saving rewrites the whole file every time. Loading reads records until
// the stream ends; a record cut short (crash mid-write, disk full) ends the
// load right there and everything before it is kept.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::queue::{Track, TrackId};
use crate::error::PersistenceError;

/// Tracks read from disk plus whether the tail of the file was unreadable.
#[derive(Debug, Default)]
pub struct LoadedPlaylist {
    pub tracks: Vec<Track>,
    pub truncated: bool,
}

pub struct PlaylistStore {
    path: PathBuf,
}

impl PlaylistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PlaylistStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ==========================================
    // SAVE
    // ==========================================
    // Truncates the file and writes every track. The caller decides what a
    // failure means; the engine only reports it.
    pub fn save(&self, tracks: &[Track]) -> Result<(), PersistenceError> {
        let to_save_error = |source| PersistenceError::Save {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(to_save_error)?;
        }

        let file = File::create(&self.path).map_err(to_save_error)?;
        let mut writer = BufWriter::new(file);
        for track in tracks {
            write_record(&mut writer, track).map_err(to_save_error)?;
        }
        writer.flush().map_err(to_save_error)?;

        debug!(path = %self.path.display(), count = tracks.len(), "Playlist saved");
        Ok(())
    }

    // ==========================================
    // LOAD
    // ==========================================
    // - File missing: empty playlist, not an error
    // - Partial or corrupt record: stop there, keep what came before
    // - Any other I/O failure: error (the engine falls back to empty)
    pub fn load(&self) -> Result<LoadedPlaylist, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No playlist file yet, starting empty");
                return Ok(LoadedPlaylist::default());
            }
            Err(source) => {
                return Err(PersistenceError::Load {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let loaded = read_records(BufReader::new(file)).map_err(|source| PersistenceError::Load {
            path: self.path.clone(),
            source,
        })?;

        if loaded.truncated {
            warn!(
                path = %self.path.display(),
                kept = loaded.tracks.len(),
                "Playlist file ends with an incomplete record, ignoring the rest"
            );
        }
        info!(path = %self.path.display(), count = loaded.tracks.len(), "Playlist loaded");
        Ok(loaded)
    }
}

/// Reads records until end of stream. Partial records truncate the result.
pub fn read_records<R: Read>(mut reader: R) -> io::Result<LoadedPlaylist> {
    let mut loaded = LoadedPlaylist::default();

    loop {
        match read_record(&mut reader) {
            Ok(Some(track)) => loaded.tracks.push(track),
            Ok(None) => break,
            Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::InvalidData) => {
                loaded.truncated = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(loaded)
}

pub fn write_record<W: Write>(writer: &mut W, track: &Track) -> io::Result<()> {
    writer.write_all(&(track.id as i32).to_le_bytes())?;
    write_string(writer, &track.title)?;
    write_string(writer, &track.artist)?;
    write_string(writer, track.file_path.as_deref().unwrap_or(""))?;
    write_string(writer, &track.lyrics)?;
    Ok(())
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    writer.write_all(&(value.len() as u64).to_le_bytes())?;
    writer.write_all(value.as_bytes())
}

// ==========================================
// DECODING ONE RECORD
// ==========================================
// Returns:
// - Ok(Some(track)): a complete record
// - Ok(None): clean end of stream (no bytes at all before the id)
// - Err(UnexpectedEof): the record started but was cut short
// - Err(InvalidData): the id is not a positive integer
fn read_record<R: Read>(reader: &mut R) -> io::Result<Option<Track>> {
    let mut id_bytes = [0u8; 4];
    let filled = read_fully(reader, &mut id_bytes)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < id_bytes.len() {
        return Err(ErrorKind::UnexpectedEof.into());
    }

    let id = i32::from_le_bytes(id_bytes);
    if id <= 0 {
        return Err(io::Error::new(ErrorKind::InvalidData, format!("invalid track id {}", id)));
    }

    let title = read_string(reader)?;
    let artist = read_string(reader)?;
    let file_path = read_string(reader)?;
    let lyrics = read_string(reader)?;

    Ok(Some(Track::new(id as TrackId, title, artist, file_path, lyrics)))
}

// Like read_exact, but reports how many bytes it got before EOF instead of
// failing, so a clean end of stream can be told apart from a partial record.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut len_bytes = [0u8; 8];
    reader.read_exact(&mut len_bytes)?;
    let len = u64::from_le_bytes(len_bytes);

    // take() keeps a corrupt length from allocating more than the file holds
    let mut bytes = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(ErrorKind::UnexpectedEof.into());
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tracks() -> Vec<Track> {
        vec![
            Track::new(1, "Song A".into(), "Artist One".into(), String::new(), String::new()),
            Track::new(
                2,
                "Song B".into(),
                "Artist Two".into(),
                "/music/b.mp3".into(),
                "first line\nsecond line".into(),
            ),
            Track::new(3, "Ünïcødé".into(), "Café Band".into(), String::new(), "♪".into()),
        ]
    }

    fn encode(tracks: &[Track]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for track in tracks {
            write_record(&mut bytes, track).unwrap();
        }
        bytes
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().join("playlist.dat"));

        store.save(&sample_tracks()).unwrap();
        let loaded = store.load().unwrap();

        assert!(!loaded.truncated);
        assert_eq!(loaded.tracks, sample_tracks());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().join("nothing-here.dat"));

        let loaded = store.load().unwrap();
        assert!(loaded.tracks.is_empty());
        assert!(!loaded.truncated);
    }

    #[test]
    fn save_rewrites_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().join("playlist.dat"));

        store.save(&sample_tracks()).unwrap();
        store.save(&sample_tracks()[..1]).unwrap();

        assert_eq!(store.load().unwrap().tracks.len(), 1);
    }

    #[test]
    fn record_layout_is_little_endian() {
        let track = Track::new(1, "ab".into(), "c".into(), String::new(), String::new());
        let bytes = encode(&[track]);

        let mut expected = vec![1, 0, 0, 0];
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(b"c");
        expected.extend_from_slice(&0u64.to_le_bytes());
        expected.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn partial_trailing_record_is_dropped() {
        let tracks = sample_tracks();
        let full = encode(&tracks);
        let first_two = encode(&tracks[..2]).len();

        // Cut at every byte inside the third record
        for cut in first_two + 1..full.len() {
            let loaded = read_records(&full[..cut]).unwrap();
            assert!(loaded.truncated, "cut at {} should be flagged", cut);
            assert_eq!(loaded.tracks, tracks[..2].to_vec());
        }
    }

    #[test]
    fn absurd_length_truncates_without_allocating() {
        let mut bytes = encode(&sample_tracks()[..1]);
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(b"short");

        let loaded = read_records(bytes.as_slice()).unwrap();
        assert!(loaded.truncated);
        assert_eq!(loaded.tracks.len(), 1);
    }

    #[test]
    fn non_positive_id_ends_the_load() {
        let mut bytes = encode(&sample_tracks()[..1]);
        let bad = Track::new(1, "x".into(), "y".into(), String::new(), String::new());
        let mut bad_bytes = encode(&[bad]);
        bad_bytes[..4].copy_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&bad_bytes);

        let loaded = read_records(bytes.as_slice()).unwrap();
        assert!(loaded.truncated);
        assert_eq!(loaded.tracks.len(), 1);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&[0xff, b'a']);
        for _ in 0..3 {
            bytes.extend_from_slice(&0u64.to_le_bytes());
        }

        let loaded = read_records(bytes.as_slice()).unwrap();
        assert_eq!(loaded.tracks[0].title, "\u{fffd}a");
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be
        let store = PlaylistStore::new(dir.path());

        assert!(matches!(
            store.save(&sample_tracks()),
            Err(PersistenceError::Save { .. })
        ));
    }
}
