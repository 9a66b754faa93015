//! # Configuration Module
//!
//! Data directory setup, runtime preferences and persistence of the playlist
//! library.
//!
//! ## Data Storage
//!
//! Mantra keeps its files in the platform-standard data directory:
//! - Linux: `~/.local/share/mantra/`
//! - macOS: `~/Library/Application Support/mantra/`
//! - Windows: `%APPDATA%\mantra\`
//!
//! `recordings.db` holds recorded audio, `playlists.json` the playlist library.
//!
//! ## Preferences
//!
//! An optional `config.json` in the platform config directory
//! (`~/.config/mantra/config.json` on Linux) overrides the defaults:
//!
//! ```json
//! { "looping": true, "shuffle": false, "volume": 0.8 }
//! ```

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::playlist::PlaylistStore;

const APP_DIR: &str = "mantra";
const DB_FILE: &str = "recordings.db";
const PLAYLISTS_FILE: &str = "playlists.json";
const CONFIG_FILE: &str = "config.json";

/// Returns the mantra data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let mantra_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&mantra_dir).with_context(|| {
        format!(
            "Failed to create data directory at {}. Please check file permissions.",
            mantra_dir.display()
        )
    })?;

    Ok(mantra_dir)
}

/// Path of the recording database.
///
/// ```no_run
/// use mantra::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Recordings live in {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Path of the playlist library file.
pub fn get_playlists_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(PLAYLISTS_FILE))
}

/// Path of the optional preferences file. The file need not exist.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory"))?;
    Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the recording database
    pub db_path: PathBuf,
    /// Path to the playlist library
    pub playlists_path: PathBuf,
    /// Start playlists with looping on
    pub looping: bool,
    /// Start playlists shuffled
    pub shuffle: bool,
    /// Foreground volume in `0.0..=1.0`
    pub volume: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: get_db_path().unwrap_or_else(|_| PathBuf::from(DB_FILE)),
            playlists_path: get_playlists_path().unwrap_or_else(|_| PathBuf::from(PLAYLISTS_FILE)),
            looping: false,
            shuffle: false,
            volume: 1.0,
        }
    }
}

impl RuntimeConfig {
    /// Defaults, with any preferences from the user's `config.json` applied.
    pub fn new() -> Result<Self> {
        let path = get_config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Read a config file. Missing keys fall back to defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.volume = if config.volume.is_nan() { 0.0 } else { config.volume.clamp(0.0, 1.0) };
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Configuration keeping both files in `dir`.
    pub fn with_data_dir(dir: &Path) -> Self {
        Self {
            db_path: dir.join(DB_FILE),
            playlists_path: dir.join(PLAYLISTS_FILE),
            looping: false,
            shuffle: false,
            volume: 1.0,
        }
    }
}

/// Load the playlist library. A missing file yields a fresh library with the
/// default playlist.
pub fn load_playlists(path: &Path) -> Result<PlaylistStore> {
    if !path.exists() {
        debug!("No playlist library at {}, starting fresh", path.display());
        return Ok(PlaylistStore::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist library {}", path.display()))?;
    PlaylistStore::from_json(&text)
        .with_context(|| format!("Playlist library {} is corrupt", path.display()))
}

/// Write the playlist library, replacing the previous file.
pub fn save_playlists(path: &Path, store: &PlaylistStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, store.to_json()?)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!("Saved {} playlists to {}", store.len(), path.display());
    Ok(())
}
