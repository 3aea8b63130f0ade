// Main TUI application using ratatui
// Handles the terminal interface, user input, and display.
// All text entry (titles, paths, lyrics, search queries) happens here; the
// engine only ever receives finished strings.

use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io;
use std::time::Duration;

use tracing::debug;

use crate::error::{PlaylistError, TrackField};
use crate::player::audio::AudioDevice;
use crate::player::engine::PlaylistEngine;
use crate::player::queue::{Navigation, NewTrack, SortKey, Track, TrackId, TrackUpdate};
use crate::player::session::PlaybackStatus;

const CONTROLS: &str = "[a]Add [A]Add many [d]Delete [u]Update [Enter]Play [Space]Pause [s]Stop [n/p]Next/Prev \
[x]Shuffle [t/T]Sort [/]Search [r]Repeat [l]Lyrics [y]Show lyrics [q]Quit";

// Positions of the fields in the add/update forms
const TITLE_FIELD: usize = 0;
const ARTIST_FIELD: usize = 1;
const PATH_FIELD: usize = 2;
const LYRICS_FIELD: usize = 3;

enum AppMode {
    Normal,
    Prompt(Prompt),
    Lyrics { title: String, lyrics: String },
}

enum PromptKind {
    Add,
    BatchCount,
    Batch { total: usize, pending: Vec<NewTrack> },
    Update(TrackId),
    Lyrics(TrackId),
    Search,
}

struct Field {
    label: &'static str,
    value: String,
}

impl Field {
    fn new(label: &'static str) -> Self {
        Field {
            label,
            value: String::new(),
        }
    }
}

// A small form: fields are filled one after another, Enter on the last one
// submits, Esc cancels.
struct Prompt {
    title: String,
    kind: PromptKind,
    fields: Vec<Field>,
    index: usize,
}

impl Prompt {
    fn new(title: impl Into<String>, kind: PromptKind, labels: &[&'static str]) -> Self {
        Prompt {
            title: title.into(),
            kind,
            fields: labels.iter().copied().map(Field::new).collect(),
            index: 0,
        }
    }

    fn song_form(title: impl Into<String>, kind: PromptKind) -> Self {
        Self::new(
            title,
            kind,
            &["Title", "Artist (letters and spaces)", "File path (optional)", "Lyrics (optional, \\n for new line)"],
        )
    }

    fn update_form(id: TrackId) -> Self {
        Self::new(
            format!("Update song {} (leave empty to keep)", id),
            PromptKind::Update(id),
            &["New title", "New artist", "New file path", "New lyrics"],
        )
    }

    fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    fn new_track(&self) -> NewTrack {
        NewTrack::new(
            self.value(TITLE_FIELD),
            self.value(ARTIST_FIELD),
            self.value(PATH_FIELD),
            &unescape_newlines(self.value(LYRICS_FIELD)),
        )
    }

    // Send the user back to the field that failed validation
    fn reprompt(&mut self, field: TrackField) {
        self.index = match field {
            TrackField::Artist => ARTIST_FIELD,
            TrackField::FilePath => PATH_FIELD,
        };
        if let Some(f) = self.fields.get_mut(self.index) {
            f.value.clear();
        }
    }
}

pub struct PlaylistApp<D: AudioDevice> {
    engine: PlaylistEngine<D>,
    selected: usize,
    search_query: Option<String>,
    search_results: Vec<Track>,
    mode: AppMode,
    should_quit: bool,
    status_message: String,
}

impl<D: AudioDevice> PlaylistApp<D> {
    pub fn new(mut engine: PlaylistEngine<D>) -> Self {
        let status_message = engine
            .take_warning()
            .map(|w| w.to_string())
            .unwrap_or_else(|| format!("Loaded {} songs", engine.tracks().len()));

        PlaylistApp {
            engine,
            selected: 0,
            search_query: None,
            search_results: Vec::new(),
            mode: AppMode::Normal,
            should_quit: false,
            status_message,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore the terminal even if the loop failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
        loop {
            terminal.draw(|f| self.draw_ui(f))?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                    }
                }
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    fn draw_ui(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(5),
            ])
            .split(frame.size());

        // Header
        let title = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            CONTROLS.to_string()
        };
        let header = Paragraph::new(title)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Playlist Player"));
        frame.render_widget(header, chunks[0]);

        // Main area - playlist on the left, form/lyrics/search on the right
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        let (tracks, cursor) = self.engine.list();
        let playlist_items: Vec<ListItem> = tracks
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let marker = if Some(i) == cursor { "▶" } else { " " };
                let audio = if track.playable_path().is_some() { "" } else { " (no file)" };
                let content = format!("{} {:>3}. {} - {}{}", marker, track.id, track.title, track.artist, audio);
                let style = if i == self.selected {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(content).style(style)
            })
            .collect();

        let playlist_title = format!("Playlist ({} songs)", tracks.len());
        let playlist_list = List::new(playlist_items)
            .block(Block::default().borders(Borders::ALL).title(playlist_title));
        frame.render_widget(playlist_list, main_chunks[0]);

        match &self.mode {
            AppMode::Prompt(prompt) => {
                let lines: Vec<String> = prompt
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| {
                        if i == prompt.index {
                            format!("> {}: {}_", field.label, field.value)
                        } else {
                            format!("  {}: {}", field.label, field.value)
                        }
                    })
                    .collect();
                let form = Paragraph::new(lines.join("\n"))
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title(prompt.title.as_str()));
                frame.render_widget(form, main_chunks[1]);
            }
            AppMode::Lyrics { title, lyrics } => {
                let text = if lyrics.is_empty() {
                    "No lyrics for this song.".to_string()
                } else {
                    lyrics.clone()
                };
                let view = Paragraph::new(text)
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title(format!("Lyrics: {} [Esc]Close", title)));
                frame.render_widget(view, main_chunks[1]);
            }
            AppMode::Normal => {
                let results: Vec<ListItem> = self
                    .search_results
                    .iter()
                    .map(|track| ListItem::new(format!("{:>3}. {} - {}", track.id, track.title, track.artist)))
                    .collect();
                let results_list = List::new(results)
                    .block(Block::default().borders(Borders::ALL).title("Search Results"));
                frame.render_widget(results_list, main_chunks[1]);
            }
        }

        // Player info
        let now_playing = match self.engine.current() {
            Some(track) => format!("Current: {} - {}", track.title, track.artist),
            None => "No song selected".to_string(),
        };
        let repeat = if self.engine.repeat() { "On" } else { "Off" };
        let player_info = format!(
            "{}\nState: {} | Repeat: {}",
            now_playing,
            self.engine.status(),
            repeat
        );
        let player_widget = Paragraph::new(player_info)
            .block(Block::default().borders(Borders::ALL).title("Player"));
        frame.render_widget(player_widget, chunks[2]);
    }

    fn handle_input(&mut self, key: KeyCode) {
        match std::mem::replace(&mut self.mode, AppMode::Normal) {
            AppMode::Normal => {
                self.status_message.clear();
                self.handle_normal_key(key);
            }
            AppMode::Prompt(prompt) => self.handle_prompt_key(prompt, key),
            AppMode::Lyrics { title, lyrics } => {
                if !matches!(key, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                    self.mode = AppMode::Lyrics { title, lyrics };
                }
            }
        }

        // Ids and titles shift after sort, delete, update and shuffle
        self.refresh_search();

        // Save failures surface after whatever command caused them
        if let Some(warning) = self.engine.take_warning() {
            self.status_message = warning.to_string();
        }
    }

    fn handle_normal_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
            KeyCode::Enter => self.play_selected(),
            KeyCode::Char(' ') => self.toggle_pause(),
            KeyCode::Char('s') => {
                let result = self.engine.stop();
                self.report(result, "Stopped");
            }
            KeyCode::Char('n') => {
                let result = self.engine.next();
                self.report_navigation(result);
            }
            KeyCode::Char('p') => {
                let result = self.engine.previous();
                self.report_navigation(result);
            }
            KeyCode::Char('a') => {
                self.mode = AppMode::Prompt(Prompt::song_form("Add song", PromptKind::Add));
            }
            KeyCode::Char('A') => {
                self.mode = AppMode::Prompt(Prompt::new(
                    "Add several songs",
                    PromptKind::BatchCount,
                    &["How many songs?"],
                ));
            }
            KeyCode::Char('d') => self.delete_selected(),
            KeyCode::Char('u') => {
                if let Some(id) = self.selected_id() {
                    self.mode = AppMode::Prompt(Prompt::update_form(id));
                }
            }
            KeyCode::Char('l') => self.manage_lyrics(),
            KeyCode::Char('y') => self.show_lyrics(),
            KeyCode::Char('x') => {
                let result = self.engine.shuffle();
                self.report(result, "Playlist shuffled");
            }
            KeyCode::Char('t') => {
                let result = self.engine.sort(SortKey::Title);
                self.report(result, "Sorted by title");
            }
            KeyCode::Char('T') => {
                let result = self.engine.sort(SortKey::Artist);
                self.report(result, "Sorted by artist");
            }
            KeyCode::Char('/') => {
                self.mode = AppMode::Prompt(Prompt::new("Search", PromptKind::Search, &["Title, artist or lyrics"]));
            }
            KeyCode::Char('r') => {
                let repeat = self.engine.toggle_repeat();
                self.status_message = format!("Repeat mode {}", if repeat { "on" } else { "off" });
            }
            KeyCode::Esc => {
                self.search_query = None;
                self.search_results.clear();
            }
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, mut prompt: Prompt, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.status_message = "Cancelled".to_string();
                return;
            }
            KeyCode::Char(c) => {
                if let Some(field) = prompt.fields.get_mut(prompt.index) {
                    field.value.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = prompt.fields.get_mut(prompt.index) {
                    field.value.pop();
                }
            }
            KeyCode::Up | KeyCode::BackTab => prompt.index = prompt.index.saturating_sub(1),
            KeyCode::Enter | KeyCode::Tab | KeyCode::Down if prompt.index + 1 < prompt.fields.len() => {
                prompt.index += 1;
            }
            KeyCode::Enter => {
                self.submit(prompt);
                return;
            }
            _ => {}
        }
        self.mode = AppMode::Prompt(prompt);
    }

    // ==========================================
    // FORM SUBMISSION
    // ==========================================
    // Validation errors keep the form open on the offending field; anything
    // else closes it and shows the outcome in the header.
    fn submit(&mut self, mut prompt: Prompt) {
        match std::mem::replace(&mut prompt.kind, PromptKind::Add) {
            PromptKind::Add => match self.engine.add(prompt.new_track()) {
                Ok(id) => {
                    self.status_message = format!("Added '{}' as song {}", prompt.value(TITLE_FIELD), id);
                    self.selected = self.engine.tracks().len().saturating_sub(1);
                }
                Err(PlaylistError::Validation(e)) => {
                    self.status_message = format!("{} - please try again", e);
                    prompt.kind = PromptKind::Add;
                    prompt.reprompt(e.field());
                    self.mode = AppMode::Prompt(prompt);
                }
                Err(e) => self.status_message = self.engine.describe_error(&e),
            },
            PromptKind::BatchCount => match prompt.value(0).trim().parse::<usize>() {
                Ok(total) if total > 0 => {
                    self.mode = AppMode::Prompt(Prompt::song_form(
                        format!("Song 1 of {}", total),
                        PromptKind::Batch {
                            total,
                            pending: Vec::with_capacity(total),
                        },
                    ));
                }
                _ => {
                    self.status_message = "Please enter a positive number".to_string();
                    prompt.kind = PromptKind::BatchCount;
                    prompt.fields[0].value.clear();
                    self.mode = AppMode::Prompt(prompt);
                }
            },
            PromptKind::Batch { total, mut pending } => {
                let new_track = prompt.new_track();
                if let Err(e) = self.engine.validate(&new_track) {
                    self.status_message = format!("{} - please try again", e);
                    prompt.kind = PromptKind::Batch { total, pending };
                    prompt.reprompt(e.field());
                    self.mode = AppMode::Prompt(prompt);
                    return;
                }

                pending.push(new_track);
                if pending.len() < total {
                    let title = format!("Song {} of {}", pending.len() + 1, total);
                    self.mode = AppMode::Prompt(Prompt::song_form(title, PromptKind::Batch { total, pending }));
                } else {
                    let result = self.engine.add_batch(pending);
                    match result {
                        Ok(ids) => self.status_message = format!("Added {} songs", ids.len()),
                        Err(e) => self.status_message = self.engine.describe_error(&e),
                    }
                }
            }
            PromptKind::Update(id) => {
                let update = TrackUpdate::from_inputs(
                    prompt.value(TITLE_FIELD),
                    prompt.value(ARTIST_FIELD),
                    prompt.value(PATH_FIELD),
                    &unescape_newlines(prompt.value(LYRICS_FIELD)),
                );
                match self.engine.update(id, update) {
                    Ok(()) => self.status_message = format!("Song {} updated", id),
                    Err(PlaylistError::Validation(e)) => {
                        self.status_message = format!("{} - please try again", e);
                        prompt.kind = PromptKind::Update(id);
                        prompt.reprompt(e.field());
                        self.mode = AppMode::Prompt(prompt);
                    }
                    Err(e) => self.status_message = self.engine.describe_error(&e),
                }
            }
            PromptKind::Lyrics(id) => {
                let lyrics = unescape_newlines(prompt.value(0));
                let result = if lyrics.is_empty() {
                    self.engine.clear_lyrics(id)
                } else {
                    self.engine.set_lyrics(id, lyrics)
                };
                self.report(result, "Lyrics saved");
            }
            PromptKind::Search => {
                let query = prompt.value(0).to_string();
                self.search_results = self.engine.search(&query).cloned().collect();
                self.status_message = format!("Found {} songs matching '{}'", self.search_results.len(), query);
                debug!(query = %query, found = self.search_results.len(), "Search finished");
                self.search_query = Some(query);
            }
        }
    }

    // ==========================================
    // COMMANDS
    // ==========================================
    fn play_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            self.status_message = "Playlist is empty!".to_string();
            return;
        };

        let result = self.engine.select(id).and_then(|_| self.engine.play());
        let title = self.engine.current().map(|t| t.title.clone()).unwrap_or_default();
        self.report(result, &format!("Now playing: {}", title));
    }

    fn toggle_pause(&mut self) {
        match self.engine.toggle_pause() {
            Ok(PlaybackStatus::Paused) => self.status_message = "Paused".to_string(),
            Ok(_) => self.status_message = "Resumed".to_string(),
            Err(e) => self.status_message = self.engine.describe_error(&e),
        }
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.engine.delete(id) {
            Ok(track) => {
                self.status_message = format!("Deleted '{}'", track.title);
                self.selected = self.selected.min(self.engine.tracks().len().saturating_sub(1));
            }
            Err(e) => self.status_message = self.engine.describe_error(&e),
        }
    }

    fn manage_lyrics(&mut self) {
        let Some(track) = self.engine.tracks().get(self.selected) else {
            return;
        };
        let mut prompt = Prompt::new(
            format!("Lyrics for '{}' (empty clears, \\n for new line)", track.title),
            PromptKind::Lyrics(track.id),
            &["Lyrics"],
        );
        prompt.fields[0].value = track.lyrics.replace('\n', "\\n");
        self.mode = AppMode::Prompt(prompt);
    }

    // Lyrics of the current song, or of the highlighted one when nothing is
    // current yet
    fn show_lyrics(&mut self) {
        let id = match self.engine.current() {
            Some(_) => None,
            None => self.selected_id(),
        };

        let result = self.engine.lyrics(id);
        match result {
            Ok(track) => {
                self.mode = AppMode::Lyrics {
                    title: track.title.clone(),
                    lyrics: track.lyrics.clone(),
                }
            }
            Err(e) => self.status_message = self.engine.describe_error(&e),
        }
    }

    fn report<T>(&mut self, result: Result<T, PlaylistError>, success: &str) {
        self.status_message = match result {
            Ok(_) => success.to_string(),
            Err(e) => self.engine.describe_error(&e),
        };
    }

    // The cursor may have moved even when replaying the new song failed, so
    // the highlight follows it in every case
    fn report_navigation(&mut self, result: Result<Navigation, PlaylistError>) {
        if let Some(index) = self.engine.list().1 {
            self.selected = index;
        }

        self.status_message = match result {
            Ok(Navigation::Moved(_)) | Ok(Navigation::Wrapped(_)) => {
                match self.engine.current() {
                    Some(track) => format!("Current: {}", track.title),
                    None => String::new(),
                }
            }
            Ok(Navigation::EndOfPlaylist) => "End of playlist".to_string(),
            Ok(Navigation::BeginningOfPlaylist) => "Beginning of playlist".to_string(),
            Ok(Navigation::EmptyPlaylist) => "Playlist is empty!".to_string(),
            Err(e) => self.engine.describe_error(&e),
        };
    }

    fn refresh_search(&mut self) {
        if let Some(query) = &self.search_query {
            self.search_results = self.engine.search(query).cloned().collect();
        }
    }

    fn selected_id(&self) -> Option<TrackId> {
        self.engine.tracks().get(self.selected).map(|t| t.id)
    }

    fn select_next(&mut self) {
        let len = self.engine.tracks().len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    fn select_previous(&mut self) {
        let len = self.engine.tracks().len();
        if len > 0 {
            if self.selected == 0 {
                self.selected = len - 1;
            } else {
                self.selected -= 1;
            }
        }
    }
}

// Lyrics are typed on one line; a literal "\n" becomes a line break
fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}
