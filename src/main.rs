// Main entry point for the terminal playlist player
// Loads config, starts logging, opens the playlist and hands over to the TUI

mod config;
mod error;
mod logging;
mod player;
mod ui;

use tracing::info;

use config::Config;
use player::audio::RodioDevice;
use player::engine::PlaylistEngine;
use player::storage::PlaylistStore;
use ui::app::PlaylistApp;

fn main() -> anyhow::Result<()> {
    // Suppress ALSA error messages that pollute TUI
    // These are non-critical audio buffer warnings from the audio system
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let config = Config::load()?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = match logging::init_logging(&config.log_file) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {:#}", e);
            None
        }
    };

    info!(playlist = %config.playlist_file.display(), "Starting playlist player");

    let engine = PlaylistEngine::open(
        PlaylistStore::new(&config.playlist_file),
        RodioDevice::new(),
        config.engine_options(),
    );

    // Dropping the app drops the engine, which stops any playback
    let mut app = PlaylistApp::new(engine);
    app.run()?;

    info!("Shutting down");
    Ok(())
}
