// ==========================================
// PLAYLIST MODULE
// ==========================================
// This module owns the playlist: the tracks themselves, their order, and
// the cursor ("current track").
// It handles:
// - Adding tracks at the end
// - Removing tracks by id (with renumbering)
// - Updating track fields
// - Sorting, shuffling, searching
// - Moving the cursor forward/backward (with optional repeat/wrap)
//
// Key Concept: ids are positional
// - After any structural change (add, delete, sort) ids are renumbered so
//   they read 1..N in playlist order
// - An id is therefore only stable while the playlist is not restructured
// - The UI always re-reads ids from the list after a command
//
// Storage is a plain Vec<Track> plus an index cursor. Moving the cursor is
// O(1); removing from the middle is O(n), which is fine for a playlist.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::PlaylistError;

pub type TrackId = u32;

// ==========================================
// TRACK STRUCT
// ==========================================
// One playlist entry.
//
// file_path: Option<String>
//   - None: the entry has no audio attached (metadata/lyrics only)
//   - Some(path): a local audio file, validated when it was set
//
// lyrics: String
//   - Free text, empty when the track has none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub file_path: Option<String>,
    pub lyrics: String,
}

impl Track {
    pub fn new(id: TrackId, title: String, artist: String, file_path: String, lyrics: String) -> Self {
        Track {
            id,
            title,
            artist,
            file_path: if file_path.is_empty() { None } else { Some(file_path) },
            lyrics,
        }
    }

    /// Path to play, if the track has a non-empty one.
    pub fn playable_path(&self) -> Option<&str> {
        self.file_path.as_deref().filter(|p| !p.is_empty())
    }

    fn matches(&self, query: &str) -> bool {
        self.title.contains(query) || self.artist.contains(query) || self.lyrics.contains(query)
    }
}

/// Field values for a track that has not been added yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub file_path: String,
    pub lyrics: String,
}

impl NewTrack {
    pub fn new(title: &str, artist: &str, file_path: &str, lyrics: &str) -> Self {
        NewTrack {
            title: title.to_string(),
            artist: artist.to_string(),
            file_path: file_path.to_string(),
            lyrics: lyrics.to_string(),
        }
    }
}

// ==========================================
// TRACK UPDATE
// ==========================================
// Each field is an optional overwrite. Both None and an empty string mean
// "keep the current value", matching the UI where the user just presses
// Enter to skip a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub file_path: Option<String>,
    pub lyrics: Option<String>,
}

impl TrackUpdate {
    /// Build an update from raw inputs, dropping the empty ones.
    pub fn from_inputs(title: &str, artist: &str, file_path: &str, lyrics: &str) -> Self {
        fn keep_if_set(value: &str) -> Option<String> {
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }

        TrackUpdate {
            title: keep_if_set(title),
            artist: keep_if_set(artist),
            file_path: keep_if_set(file_path),
            lyrics: keep_if_set(lyrics),
        }
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref().filter(|a| !a.is_empty())
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Artist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Result of moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Cursor moved (or was placed) onto this track.
    Moved(TrackId),
    /// Repeat mode wrapped the cursor to the other end.
    Wrapped(TrackId),
    /// Already on the last track, cursor unchanged.
    EndOfPlaylist,
    /// Already on the first track, cursor unchanged.
    BeginningOfPlaylist,
    EmptyPlaylist,
}

impl Navigation {
    /// The track the cursor landed on, if it moved at all.
    pub fn landed_on(&self) -> Option<TrackId> {
        match self {
            Navigation::Moved(id) | Navigation::Wrapped(id) => Some(*id),
            _ => None,
        }
    }
}

/// A track taken out of the playlist by `remove`.
#[derive(Debug)]
pub struct Removed {
    pub track: Track,
    pub was_current: bool,
}

// ==========================================
// PLAYLIST STRUCT
// ==========================================
// tracks: Vec<Track>
//   - Playlist order, front = first song
//
// cursor: Option<usize>
//   - Index of the current track, or None when nothing is selected
//   - Invariant: when Some, always < tracks.len()
//
// next_id: TrackId
//   - Id handed to the next added track
//   - N+1 after renumbering; max(id)+1 right after loading from disk
//
// repeat: bool
//   - When true, navigation wraps around at either end
#[derive(Debug)]
pub struct Playlist {
    tracks: Vec<Track>,
    cursor: Option<usize>,
    next_id: TrackId,
    repeat: bool,
}

impl Playlist {
    pub fn new() -> Self {
        Playlist {
            tracks: Vec::new(),
            cursor: None,
            next_id: 1,
            repeat: false,
        }
    }

    // ==========================================
    // RESTORE: from_tracks()
    // ==========================================
    // Builds a playlist from tracks read off disk.
    //
    // Ids are kept exactly as stored (no renumbering here), next_id continues
    // after the largest one, and the cursor starts on the first track.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let next_id = tracks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let cursor = if tracks.is_empty() { None } else { Some(0) };

        Playlist {
            tracks,
            cursor,
            next_id,
            repeat: false,
        }
    }

    // ==========================================
    // ADDING TRACKS
    // ==========================================
    // Appends at the end and hands out next_id. Inputs are expected to be
    // validated already (the engine does that).
    pub fn add(&mut self, new_track: NewTrack) -> TrackId {
        let id = self.next_id;
        self.tracks.push(Track::new(
            id,
            new_track.title,
            new_track.artist,
            new_track.file_path,
            new_track.lyrics,
        ));
        self.next_id += 1;
        id
    }

    pub fn add_all(&mut self, new_tracks: Vec<NewTrack>) -> Vec<TrackId> {
        new_tracks.into_iter().map(|t| self.add(t)).collect()
    }

    // ==========================================
    // REMOVING TRACKS: remove()
    // ==========================================
    // Removes the track with the given id.
    //
    // Cursor handling:
    // - Removed track was current → cursor becomes None
    // - Removed track was before the cursor → cursor index shifts down by
    //   one so it keeps pointing at the same track
    //
    // Afterwards every id is reassigned 1..N.
    //
    // Returns None if no track has that id (nothing changes).
    pub fn remove(&mut self, id: TrackId) -> Option<Removed> {
        let index = self.position(id)?;
        let track = self.tracks.remove(index);

        let was_current = self.cursor == Some(index);
        self.cursor = match self.cursor {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };

        self.renumber();
        Some(Removed { track, was_current })
    }

    /// Reassigns ids 1..N in playlist order and resets next_id to N+1.
    fn renumber(&mut self) {
        for (index, track) in self.tracks.iter_mut().enumerate() {
            track.id = index as TrackId + 1;
        }
        self.next_id = self.tracks.len() as TrackId + 1;
    }

    // ==========================================
    // UPDATING TRACKS: update()
    // ==========================================
    // Applies every set field of the update. Returns false when the id is
    // unknown. Ids and order are not affected.
    pub fn update(&mut self, id: TrackId, update: TrackUpdate) -> bool {
        let Some(track) = self.get_mut(id) else {
            return false;
        };

        if let Some(title) = update.title.filter(|t| !t.is_empty()) {
            track.title = title;
        }
        if let Some(artist) = update.artist.filter(|a| !a.is_empty()) {
            track.artist = artist;
        }
        if let Some(path) = update.file_path.filter(|p| !p.is_empty()) {
            track.file_path = Some(path);
        }
        if let Some(lyrics) = update.lyrics.filter(|l| !l.is_empty()) {
            track.lyrics = lyrics;
        }
        true
    }

    /// Overwrites the lyrics (an empty string clears them).
    pub fn set_lyrics(&mut self, id: TrackId, lyrics: String) -> bool {
        match self.get_mut(id) {
            Some(track) => {
                track.lyrics = lyrics;
                true
            }
            None => false,
        }
    }

    // ==========================================
    // REORDERING: sort()
    // ==========================================
    // Stable sort by title or artist (plain lexicographic String order).
    //
    // After sorting:
    // - ids are renumbered to match the new order
    // - a non-empty cursor is reset to the first track
    pub fn sort(&mut self, key: SortKey) -> Result<(), PlaylistError> {
        if self.tracks.len() < 2 {
            return Err(PlaylistError::NotEnoughSongs);
        }

        match key {
            SortKey::Title => self.tracks.sort_by(|a, b| a.title.cmp(&b.title)),
            SortKey::Artist => self.tracks.sort_by(|a, b| a.artist.cmp(&b.artist)),
        }

        self.renumber();
        if self.cursor.is_some() {
            self.cursor = Some(0);
        }
        Ok(())
    }

    // ==========================================
    // REORDERING: shuffle()
    // ==========================================
    // Randomly permutes the track contents while the positions keep their
    // ids: the track at position 1 is still id 1 afterwards, it is just a
    // different song. The cursor keeps its index, so "current" now refers to
    // whatever song landed in that slot.
    pub fn shuffle(&mut self) -> Result<(), PlaylistError> {
        self.shuffle_with(&mut rand::thread_rng())
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), PlaylistError> {
        if self.tracks.len() < 2 {
            return Err(PlaylistError::NotEnoughSongs);
        }

        let ids: Vec<TrackId> = self.tracks.iter().map(|t| t.id).collect();
        self.tracks.shuffle(rng);
        for (track, id) in self.tracks.iter_mut().zip(ids) {
            track.id = id;
        }
        Ok(())
    }

    // ==========================================
    // SEARCH: search()
    // ==========================================
    // Lazily yields every track whose title, artist, or lyrics contains the
    // query (case-sensitive), in playlist order. Calling it again starts a
    // fresh scan.
    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Track> + 'a {
        self.tracks.iter().filter(move |track| track.matches(query))
    }

    // ==========================================
    // NAVIGATION: navigate()
    // ==========================================
    // Moves the cursor one step.
    //
    // - No cursor: Next selects the first track, Previous the last
    // - Neighbour exists: move to it
    // - At the end with repeat on: wrap to the other end
    // - At the end with repeat off: stay put and report it
    pub fn navigate(&mut self, direction: Direction) -> Navigation {
        if self.tracks.is_empty() {
            return Navigation::EmptyPlaylist;
        }

        let last = self.tracks.len() - 1;
        let (target, wrapped) = match (self.cursor, direction) {
            (None, Direction::Next) => (0, false),
            (None, Direction::Previous) => (last, false),
            (Some(c), Direction::Next) if c < last => (c + 1, false),
            (Some(c), Direction::Previous) if c > 0 => (c - 1, false),
            (Some(_), Direction::Next) if self.repeat => (0, true),
            (Some(_), Direction::Previous) if self.repeat => (last, true),
            (Some(_), Direction::Next) => return Navigation::EndOfPlaylist,
            (Some(_), Direction::Previous) => return Navigation::BeginningOfPlaylist,
        };

        self.cursor = Some(target);
        let id = self.tracks[target].id;
        if wrapped {
            Navigation::Wrapped(id)
        } else {
            Navigation::Moved(id)
        }
    }

    /// Moves the cursor onto the given track.
    pub fn select(&mut self, id: TrackId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.cursor = Some(index);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    // ==========================================
    // INSPECTION
    // ==========================================
    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|index| self.tracks.get(index))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    fn position(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[cfg(test)]
    pub fn next_id(&self) -> TrackId {
        self.next_id
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }
}
