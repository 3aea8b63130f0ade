// ==========================================
// PLAYLIST ENGINE
// ==========================================
// The one object the UI talks to. It owns:
// - the playlist (tracks + cursor + repeat flag)
// - the playback session (and through it the audio device)
// - the playlist file
//
// Rules it enforces across those pieces:
// - Inputs are validated before anything changes
// - Every playlist mutation is written to disk right away
// - Deleting the current track stops playback first
// - Moving the cursor while Playing starts the new track
//
// Nothing in here is fatal. Save failures are logged and kept as a warning
// for the UI to show; the in-memory playlist stays authoritative.

use thiserror::Error;
use tracing::{error, info, warn};

use super::audio::AudioDevice;
use super::queue::{Direction, Navigation, NewTrack, Playlist, SortKey, Track, TrackId, TrackUpdate};
use super::session::{PlaybackSession, PlaybackStatus};
use super::storage::PlaylistStore;
use super::validation::{validate_artist, validate_file_path};
use crate::error::{PersistenceError, PlaybackError, PlaylistError, Result, ValidationError};

/// Settings the engine takes from the config file.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub allowed_extensions: Vec<String>,
    pub repeat: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            allowed_extensions: vec!["mp3".to_string()],
            repeat: false,
        }
    }
}

/// Non-fatal problems the UI should tell the user about.
#[derive(Debug, Error)]
pub enum EngineWarning {
    #[error("Changes were not saved: {0}")]
    SaveFailed(PersistenceError),

    #[error("Could not read the playlist, starting empty: {0}")]
    LoadFailed(PersistenceError),

    #[error("Playlist file was damaged, recovered {kept} songs")]
    Truncated { kept: usize },
}

pub struct PlaylistEngine<D: AudioDevice> {
    playlist: Playlist,
    session: PlaybackSession<D>,
    store: PlaylistStore,
    allowed_extensions: Vec<String>,
    warning: Option<EngineWarning>,
}

impl<D: AudioDevice> PlaylistEngine<D> {
    // ==========================================
    // STARTUP: open()
    // ==========================================
    // Loads the playlist file. A missing file is an empty playlist, a damaged
    // one keeps whatever records were intact, an unreadable one starts empty.
    // None of these stop the app.
    pub fn open(store: PlaylistStore, device: D, options: EngineOptions) -> Self {
        let mut warning = None;

        let mut playlist = match store.load() {
            Ok(loaded) => {
                if loaded.truncated {
                    warning = Some(EngineWarning::Truncated {
                        kept: loaded.tracks.len(),
                    });
                }
                Playlist::from_tracks(loaded.tracks)
            }
            Err(e) => {
                error!(error = %e, "Failed to load playlist");
                warning = Some(EngineWarning::LoadFailed(e));
                Playlist::new()
            }
        };
        playlist.set_repeat(options.repeat);

        PlaylistEngine {
            playlist,
            session: PlaybackSession::new(device),
            store,
            allowed_extensions: options.allowed_extensions,
            warning,
        }
    }

    // ==========================================
    // ADD
    // ==========================================
    pub fn validate(&self, new_track: &NewTrack) -> std::result::Result<(), ValidationError> {
        validate_artist(&new_track.artist)?;
        validate_file_path(&new_track.file_path, &self.allowed_extensions)
    }

    pub fn add(&mut self, new_track: NewTrack) -> Result<TrackId> {
        self.validate(&new_track)?;

        let id = self.playlist.add(new_track);
        info!(id, "Song added");
        self.persist();
        Ok(id)
    }

    // Adds several songs with a single write at the end. Everything is
    // validated up front, so one bad entry rejects the whole batch.
    // `index` in the error is 1-based, the way the UI numbers the songs.
    pub fn add_batch(&mut self, new_tracks: Vec<NewTrack>) -> Result<Vec<TrackId>> {
        for (index, new_track) in new_tracks.iter().enumerate() {
            self.validate(new_track)
                .map_err(|source| PlaylistError::BatchValidation {
                    index: index + 1,
                    source,
                })?;
        }

        let ids = self.playlist.add_all(new_tracks);
        info!(count = ids.len(), "Songs added");
        self.persist();
        Ok(ids)
    }

    // ==========================================
    // DELETE
    // ==========================================
    // If the song is the current one, playback is stopped before it goes
    // away. Remaining ids are renumbered 1..N.
    pub fn delete(&mut self, id: TrackId) -> Result<Track> {
        if self.playlist.get(id).is_none() {
            return Err(PlaylistError::NotFound(id));
        }

        if self.current_id() == Some(id) {
            if let Err(e) = self.session.stop() {
                warn!(error = %e, "Stop before delete failed, handle released anyway");
            }
        }

        let removed = self.playlist.remove(id).ok_or(PlaylistError::NotFound(id))?;
        info!(id, title = %removed.track.title, was_current = removed.was_current, "Song deleted");
        self.persist();
        Ok(removed.track)
    }

    // ==========================================
    // UPDATE
    // ==========================================
    // Empty fields keep their value. A new artist or path goes through the
    // same checks as add().
    pub fn update(&mut self, id: TrackId, update: TrackUpdate) -> Result<()> {
        if self.playlist.get(id).is_none() {
            return Err(PlaylistError::NotFound(id));
        }

        if let Some(artist) = update.artist() {
            validate_artist(artist)?;
        }
        if let Some(path) = update.file_path() {
            validate_file_path(path, &self.allowed_extensions)?;
        }

        self.playlist.update(id, update);
        info!(id, "Song updated");
        self.persist();
        Ok(())
    }

    // ==========================================
    // LYRICS
    // ==========================================
    pub fn set_lyrics(&mut self, id: TrackId, lyrics: String) -> Result<()> {
        if !self.playlist.set_lyrics(id, lyrics) {
            return Err(PlaylistError::NotFound(id));
        }
        info!(id, "Lyrics updated");
        self.persist();
        Ok(())
    }

    pub fn clear_lyrics(&mut self, id: TrackId) -> Result<()> {
        self.set_lyrics(id, String::new())
    }

    /// The song whose lyrics to show: the given one, or the current one.
    pub fn lyrics(&self, id: Option<TrackId>) -> Result<&Track> {
        match id {
            Some(id) => self.playlist.get(id).ok_or(PlaylistError::NotFound(id)),
            None => self
                .playlist
                .current()
                .ok_or(PlaylistError::Playback(PlaybackError::NoTrackSelected)),
        }
    }

    // ==========================================
    // REORDER / SEARCH
    // ==========================================
    pub fn sort(&mut self, key: SortKey) -> Result<()> {
        self.playlist.sort(key)?;
        info!(?key, "Playlist sorted");
        self.persist();
        Ok(())
    }

    pub fn shuffle(&mut self) -> Result<()> {
        self.playlist.shuffle()?;
        info!("Playlist shuffled");
        self.persist();
        Ok(())
    }

    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Track> + 'a {
        self.playlist.search(query)
    }

    // ==========================================
    // CURSOR
    // ==========================================
    // If a song was playing and the cursor actually moved, the new song is
    // started. Paused or stopped sessions are left alone.
    pub fn navigate(&mut self, direction: Direction) -> Result<Navigation> {
        let was_playing = self.session.is_playing();
        let navigation = self.playlist.navigate(direction);

        if was_playing && navigation.landed_on().is_some() {
            self.session.play(self.playlist.current())?;
        }
        Ok(navigation)
    }

    pub fn next(&mut self) -> Result<Navigation> {
        self.navigate(Direction::Next)
    }

    pub fn previous(&mut self) -> Result<Navigation> {
        self.navigate(Direction::Previous)
    }

    pub fn select(&mut self, id: TrackId) -> Result<()> {
        if self.playlist.select(id) {
            Ok(())
        } else {
            Err(PlaylistError::NotFound(id))
        }
    }

    pub fn toggle_repeat(&mut self) -> bool {
        let repeat = !self.playlist.repeat();
        self.playlist.set_repeat(repeat);
        info!(repeat, "Repeat mode toggled");
        repeat
    }

    // ==========================================
    // PLAYBACK
    // ==========================================
    pub fn play(&mut self) -> Result<()> {
        self.session.play(self.playlist.current())?;
        Ok(())
    }

    pub fn toggle_pause(&mut self) -> Result<PlaybackStatus> {
        Ok(self.session.toggle()?)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.session.stop().map_err(PlaybackError::from)?;
        Ok(())
    }

    // ==========================================
    // INSPECTION
    // ==========================================
    pub fn tracks(&self) -> &[Track] {
        self.playlist.tracks()
    }

    /// Tracks in order plus the cursor position, for display.
    pub fn list(&self) -> (&[Track], Option<usize>) {
        (self.playlist.tracks(), self.playlist.cursor())
    }

    pub fn current(&self) -> Option<&Track> {
        self.playlist.current()
    }

    pub fn current_id(&self) -> Option<TrackId> {
        self.playlist.current().map(|t| t.id)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session.status()
    }

    pub fn repeat(&self) -> bool {
        self.playlist.repeat()
    }

    /// Hands the pending warning to the caller (once).
    pub fn take_warning(&mut self) -> Option<EngineWarning> {
        self.warning.take()
    }

    /// User-facing text for an engine error.
    pub fn describe_error(&self, err: &PlaylistError) -> String {
        match err {
            PlaylistError::Playback(PlaybackError::Device(device_err)) => {
                self.session.describe_error(device_err)
            }
            other => other.to_string(),
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(self.playlist.tracks()) {
            error!(path = %self.store.path().display(), error = %e, "Failed to save playlist");
            self.warning = Some(EngineWarning::SaveFailed(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::audio::fake::FakeDevice;
    use crate::player::audio::FormatHint;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        device: FakeDevice,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                dir: tempfile::tempdir().unwrap(),
                device: FakeDevice::new(),
            }
        }

        fn playlist_path(&self) -> PathBuf {
            self.dir.path().join("playlist.dat")
        }

        fn engine(&self) -> PlaylistEngine<FakeDevice> {
            PlaylistEngine::open(
                PlaylistStore::new(self.playlist_path()),
                self.device.clone(),
                EngineOptions::default(),
            )
        }

        fn audio_file(&self, name: &str) -> String {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"ID3").unwrap();
            path.to_string_lossy().into_owned()
        }
    }

    fn ids(engine: &PlaylistEngine<FakeDevice>) -> Vec<TrackId> {
        engine.tracks().iter().map(|t| t.id).collect()
    }

    #[test]
    fn add_validate_delete_navigate_scenario() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();

        assert_eq!(engine.add(NewTrack::new("Song A", "Artist One", "", "")).unwrap(), 1);

        let rejected = engine.add(NewTrack::new("Song B", "Artist2", "", ""));
        assert!(matches!(
            rejected,
            Err(PlaylistError::Validation(ValidationError::InvalidArtist(_)))
        ));
        assert_eq!(engine.tracks().len(), 1);

        assert_eq!(engine.add(NewTrack::new("Song B", "Artist Two", "", "")).unwrap(), 2);

        engine.delete(1).unwrap();
        assert_eq!(ids(&engine), vec![1]);
        assert_eq!(engine.tracks()[0].title, "Song B");

        // delete cleared nothing here: cursor was never set
        assert!(engine.current().is_none());
        assert_eq!(engine.next().unwrap(), Navigation::Moved(1));
        assert_eq!(engine.current_id(), Some(1));
    }

    #[test]
    fn play_with_no_cursor_reports_no_track_selected() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();

        let err = engine.play().unwrap_err();
        assert!(matches!(err, PlaylistError::Playback(PlaybackError::NoTrackSelected)));
        assert_eq!(engine.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn deleting_current_while_playing_stops_and_clears_cursor() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let path = fixture.audio_file("a.mp3");
        let id = engine.add(NewTrack::new("Song A", "Artist", &path, "")).unwrap();
        engine.add(NewTrack::new("Song B", "Artist", "", "")).unwrap();

        engine.select(id).unwrap();
        engine.play().unwrap();
        assert_eq!(engine.status(), PlaybackStatus::Playing);

        engine.delete(id).unwrap();
        assert_eq!(engine.status(), PlaybackStatus::Stopped);
        assert!(engine.current().is_none());
        assert_eq!(fixture.device.open_handle_count(), 0);
    }

    #[test]
    fn deleting_another_track_keeps_playing() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let path = fixture.audio_file("a.mp3");
        engine.add(NewTrack::new("Song A", "Artist", "", "")).unwrap();
        let id = engine.add(NewTrack::new("Song B", "Artist", &path, "")).unwrap();

        engine.select(id).unwrap();
        engine.play().unwrap();
        engine.delete(1).unwrap();

        assert_eq!(engine.status(), PlaybackStatus::Playing);
        assert_eq!(engine.current().unwrap().title, "Song B");
        assert_eq!(engine.current_id(), Some(1));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        engine.add(NewTrack::new("Song", "Artist", "", "")).unwrap();

        assert!(matches!(engine.delete(5), Err(PlaylistError::NotFound(5))));
        assert!(matches!(
            engine.update(5, TrackUpdate::from_inputs("x", "", "", "")),
            Err(PlaylistError::NotFound(5))
        ));
        assert!(matches!(engine.set_lyrics(5, "la".into()), Err(PlaylistError::NotFound(5))));
        assert!(matches!(engine.lyrics(Some(5)), Err(PlaylistError::NotFound(5))));
        assert!(matches!(engine.select(5), Err(PlaylistError::NotFound(5))));
        assert_eq!(engine.tracks().len(), 1);
    }

    #[test]
    fn update_revalidates_artist_and_path() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let id = engine.add(NewTrack::new("Song", "Artist", "", "")).unwrap();

        assert!(matches!(
            engine.update(id, TrackUpdate::from_inputs("", "B4nd", "", "")),
            Err(PlaylistError::Validation(ValidationError::InvalidArtist(_)))
        ));
        assert!(matches!(
            engine.update(id, TrackUpdate::from_inputs("", "", "/nope/missing.mp3", "")),
            Err(PlaylistError::Validation(ValidationError::FileNotAccessible(_)))
        ));
        assert_eq!(engine.tracks()[0].artist, "Artist");

        let path = fixture.audio_file("song.mp3");
        engine
            .update(id, TrackUpdate::from_inputs("New Title", "", &path, ""))
            .unwrap();
        let track = &engine.tracks()[0];
        assert_eq!(track.title, "New Title");
        assert_eq!(track.artist, "Artist");
        assert_eq!(track.file_path.as_deref(), Some(path.as_str()));
    }

    #[test]
    fn mutations_are_persisted() {
        let fixture = Fixture::new();
        {
            let mut engine = fixture.engine();
            engine.add(NewTrack::new("Zulu", "Artist", "", "words")).unwrap();
            engine.add(NewTrack::new("Alpha", "Artist", "", "")).unwrap();
            engine.sort(SortKey::Title).unwrap();
        }

        let reopened = fixture.engine();
        let titles: Vec<&str> = reopened.tracks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Zulu"]);
        assert_eq!(reopened.tracks()[1].lyrics, "words");
        assert_eq!(reopened.current_id(), Some(1));
    }

    #[test]
    fn save_failure_is_reported_but_not_fatal() {
        let fixture = Fixture::new();
        // The playlist "file" is a directory, so every save fails
        let mut engine = PlaylistEngine::open(
            PlaylistStore::new(fixture.dir.path()),
            fixture.device.clone(),
            EngineOptions::default(),
        );
        assert!(matches!(engine.take_warning(), Some(EngineWarning::LoadFailed(_))));

        let id = engine.add(NewTrack::new("Song", "Artist", "", "")).unwrap();
        assert_eq!(id, 1);
        assert!(matches!(engine.take_warning(), Some(EngineWarning::SaveFailed(_))));
        assert!(engine.take_warning().is_none());
        assert_eq!(engine.tracks().len(), 1);
    }

    #[test]
    fn damaged_file_reports_recovered_count() {
        let fixture = Fixture::new();
        {
            let mut engine = fixture.engine();
            engine.add(NewTrack::new("One", "Artist", "", "")).unwrap();
            engine.add(NewTrack::new("Two", "Artist", "", "")).unwrap();
        }
        let bytes = std::fs::read(fixture.playlist_path()).unwrap();
        std::fs::write(fixture.playlist_path(), &bytes[..bytes.len() - 3]).unwrap();

        let mut engine = fixture.engine();
        assert_eq!(engine.tracks().len(), 1);
        assert!(matches!(engine.take_warning(), Some(EngineWarning::Truncated { kept: 1 })));
        assert_eq!(engine.add(NewTrack::new("Three", "Artist", "", "")).unwrap(), 2);
    }

    #[test]
    fn batch_add_is_all_or_nothing() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();

        let err = engine
            .add_batch(vec![
                NewTrack::new("One", "Artist", "", ""),
                NewTrack::new("Two", "Artist 2", "", ""),
            ])
            .unwrap_err();
        assert!(matches!(err, PlaylistError::BatchValidation { index: 2, .. }));
        assert!(engine.tracks().is_empty());

        let ids = engine
            .add_batch(vec![
                NewTrack::new("One", "Artist", "", ""),
                NewTrack::new("Two", "Artist", "", ""),
            ])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn next_while_playing_starts_the_next_song() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let a = fixture.audio_file("a.mp3");
        let b = fixture.audio_file("b.mp3");
        engine.add(NewTrack::new("A", "Artist", &a, "")).unwrap();
        engine.add(NewTrack::new("B", "Artist", &b, "")).unwrap();

        engine.select(1).unwrap();
        engine.play().unwrap();
        assert_eq!(engine.next().unwrap(), Navigation::Moved(2));
        assert_eq!(engine.status(), PlaybackStatus::Playing);

        let opened: Vec<_> = fixture
            .device
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                crate::player::audio::fake::Call::Open(path, FormatHint::Mpeg) => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(opened, vec![PathBuf::from(&a), PathBuf::from(&b)]);

        // At the end without repeat: stays, keeps playing
        assert_eq!(engine.next().unwrap(), Navigation::EndOfPlaylist);
        assert_eq!(engine.current_id(), Some(2));
        assert_eq!(fixture.device.open_handle_count(), 1);
    }

    #[test]
    fn next_while_paused_only_moves_cursor() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let a = fixture.audio_file("a.mp3");
        engine.add(NewTrack::new("A", "Artist", &a, "")).unwrap();
        engine.add(NewTrack::new("B", "Artist", "", "")).unwrap();

        engine.select(1).unwrap();
        engine.play().unwrap();
        assert_eq!(engine.toggle_pause().unwrap(), PlaybackStatus::Paused);

        engine.next().unwrap();
        assert_eq!(engine.current_id(), Some(2));
        assert_eq!(engine.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn repeat_wraps_navigation() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        engine.add(NewTrack::new("A", "Artist", "", "")).unwrap();
        engine.add(NewTrack::new("B", "Artist", "", "")).unwrap();
        engine.select(2).unwrap();

        assert_eq!(engine.next().unwrap(), Navigation::EndOfPlaylist);
        assert!(engine.toggle_repeat());
        assert_eq!(engine.next().unwrap(), Navigation::Wrapped(1));
        assert_eq!(engine.previous().unwrap(), Navigation::Wrapped(2));
    }

    #[test]
    fn lyrics_of_current_song() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let id = engine.add(NewTrack::new("A", "Artist", "", "")).unwrap();

        assert!(matches!(
            engine.lyrics(None),
            Err(PlaylistError::Playback(PlaybackError::NoTrackSelected))
        ));

        engine.set_lyrics(id, "hello\nworld".into()).unwrap();
        engine.select(id).unwrap();
        assert_eq!(engine.lyrics(None).unwrap().lyrics, "hello\nworld");

        engine.clear_lyrics(id).unwrap();
        assert_eq!(engine.lyrics(Some(id)).unwrap().lyrics, "");
    }

    #[test]
    fn sort_and_shuffle_need_two_songs() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        engine.add(NewTrack::new("A", "Artist", "", "")).unwrap();

        assert!(matches!(engine.sort(SortKey::Artist), Err(PlaylistError::NotEnoughSongs)));
        assert!(matches!(engine.shuffle(), Err(PlaylistError::NotEnoughSongs)));
    }

    #[test]
    fn search_goes_through_the_engine() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        engine.add(NewTrack::new("Yellow", "Band", "", "")).unwrap();
        engine.add(NewTrack::new("Blue", "Band", "", "yellow sky")).unwrap();

        let found: Vec<&str> = engine.search("ellow").map(|t| t.title.as_str()).collect();
        assert_eq!(found, vec!["Yellow", "Blue"]);
    }

    #[test]
    fn list_reports_cursor_position() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        engine.add(NewTrack::new("A", "Artist", "", "")).unwrap();
        engine.add(NewTrack::new("B", "Artist", "", "")).unwrap();

        assert_eq!(engine.list().1, None);
        engine.select(2).unwrap();
        let (tracks, cursor) = engine.list();
        assert_eq!(tracks.len(), 2);
        assert_eq!(cursor, Some(1));
    }

    #[test]
    fn device_errors_are_described() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine();
        let path = fixture.audio_file("a.mp3");
        engine.add(NewTrack::new("A", "Artist", &path, "")).unwrap();
        engine.select(1).unwrap();
        {
            let mut script = fixture.device.script.borrow_mut();
            script.fail_open.insert(FormatHint::Mpeg);
            script.fail_open.insert(FormatHint::Probe);
        }

        let err = engine.play().unwrap_err();
        let text = engine.describe_error(&err);
        assert!(text.contains("not supported"), "got: {}", text);
        assert_eq!(engine.status(), PlaybackStatus::Stopped);
        assert!(Path::new(&path).exists());
    }
}
