//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `mantra` binary. Routing lives in
//! `main.rs`.
//!
//! ## Examples
//!
//! ```bash
//! mantra generate confidence "I am shy around new people"
//! mantra playlist create "Morning"
//! mantra playlist add-track Morning "Calm breath" ~/audio/calm.wav
//! mantra play Morning --shuffle --loop
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// How `generate` post-processes its lines.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum GenerateMode {
    /// Every unique template line
    #[default]
    Template,
    /// At most 15 first-person lines, at least 3 required
    Wizard,
    /// Variants of your own words first, then template lines
    Custom,
}

#[derive(Parser)]
#[command(name = "mantra")]
#[command(about = "Mantra: affirmation generation and playlist playback")]
#[command(version)]
pub struct Args {
    /// Keep recordings and playlists in this directory instead of the platform data dir
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Turn a negative thought into positive affirmations
    ///
    /// Lines are printed one per line in generation order.
    Generate {
        /// Category, e.g. confidence, sleep, anxiety
        category: String,

        /// The thought to reframe
        thought: String,

        #[arg(long, value_enum, default_value_t = GenerateMode::Template)]
        mode: GenerateMode,

        /// Seed the word picker for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List built-in categories and their templates
    Categories {
        /// Also print templates and word pools
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a playback order for a number of tracks
    Order {
        /// Number of tracks
        len: usize,

        #[arg(long)]
        shuffle: bool,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Manage playlists
    ///
    /// Playlists are addressed by id or by exact name.
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },

    /// Manage recorded affirmations
    Recordings {
        #[command(subcommand)]
        action: RecordingsAction,
    },

    /// Play a playlist
    ///
    /// Without `--dry-run` this needs the `rodio-output` feature and an audio device.
    Play {
        /// Playlist id or name; defaults to the first playlist
        playlist: Option<String>,

        #[arg(long)]
        shuffle: bool,

        #[arg(long = "loop")]
        looping: bool,

        /// Foreground volume, 0.0 to 1.0
        #[arg(long)]
        volume: Option<f32>,

        /// Background music file mixed under the affirmations
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        background: Option<PathBuf>,

        /// Walk the playlist without producing sound
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: mantra completion bash > ~/.local/share/bash-completion/completions/mantra
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistAction {
    /// List playlists and their tracks
    List,

    /// Create an empty playlist
    Create { name: String },

    /// Delete a playlist (the last one cannot be deleted)
    Delete { playlist: String },

    Rename { playlist: String, name: String },

    /// Append a track
    AddTrack {
        playlist: String,
        name: String,
        /// File path or `recording:<id>`
        url: String,
    },

    RemoveTrack { playlist: String, index: usize },

    RenameTrack {
        playlist: String,
        index: usize,
        name: String,
    },

    /// Move a track to the end of another playlist
    MoveTrack {
        from: String,
        index: usize,
        to: String,
    },

    /// Export as JSON; all playlists when none is given
    Export {
        playlist: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Import playlists from a JSON export
    Import {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecordingsAction {
    /// List recordings, optionally for one category
    List { category: Option<String> },

    /// Store an audio file as a recording and add it to its category's playlist
    Add {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,

        category: String,

        /// Track name; defaults to the file stem
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a recording by id
    Delete { id: i64 },
}
