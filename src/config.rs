// Application configuration
//
// Stored as JSON in the user's config directory:
//   <config dir>/local-playlist-player/config.json
//
// The file is created with defaults on first run so users can find and edit
// it. PLAYLIST_FILE in the environment overrides the playlist location.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::player::engine::EngineOptions;

const APP_DIR: &str = "local-playlist-player";
const CONFIG_FILE: &str = "config.json";
const PLAYLIST_FILE: &str = "playlist.dat";
const LOG_FILE: &str = "player.log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Binary playlist file, rewritten after every change.
    pub playlist_file: PathBuf,
    pub log_file: PathBuf,
    /// File extensions accepted for a track's audio file.
    pub allowed_extensions: Vec<String>,
    /// Repeat mode at startup.
    pub repeat: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."));

        Config {
            playlist_file: data_dir.join(PLAYLIST_FILE),
            log_file: data_dir.join(LOG_FILE),
            allowed_extensions: vec!["mp3".to_string()],
            repeat: false,
        }
    }
}

impl Config {
    // Get path to the config file
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join(APP_DIR);
        Ok(dir.join(CONFIG_FILE))
    }

    /// Loads the config file (writing defaults if it does not exist yet) and
    /// applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Self::from_json(&data).with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            config
        };

        if let Ok(playlist_file) = std::env::var("PLAYLIST_FILE") {
            if !playlist_file.is_empty() {
                config.playlist_file = PathBuf::from(playlist_file);
            }
        }

        Ok(config)
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            allowed_extensions: self.allowed_extensions.clone(),
            repeat: self.repeat,
        }
    }
}
