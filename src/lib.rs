//! Affirmation generation and playlist playback.
//!
//! Core modules:
//! - [`generator`] - Template affirmation generation, wizard filter, custom mode
//! - [`categories`] - Category definitions and the built-in table
//! - [`order`] - Sequential and Fisher–Yates shuffled playback orders
//! - [`session`] - Single-foreground audio session with leak-free teardown
//! - [`playlist`] - Playlist library with JSON import/export
//! - [`player`] - Ties the three above together for auto-advancing playback
//!
//! ### Supporting Modules
//!
//! - [`output`] - Audio backends (simulated, and `rodio` behind `rodio-output`)
//! - [`store`] - SQLite and in-memory recording storage
//! - [`recorder`] - Capture devices and user notifications
//! - [`visualizer`] - Spectrum and waveform frames from an analyzer
//! - [`config`] - Data directory and preferences
//! - [`cli`] / [`completion`] - Command-line definitions and shell completion
//!
//! ## Quick Start Example
//!
//! ```
//! use mantra::generator::{filter_for_wizard, Generator};
//!
//! let generator = Generator::new()?;
//! let lines = generator.generate("confidence", "I am shy at parties")?;
//! assert!(lines.last().unwrap().contains("outgoing"));
//!
//! let wizard = filter_for_wizard(lines)?;
//! assert!(wizard.len() <= 15);
//! # Ok::<(), mantra::AffirmError>(())
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`Result`] with the typed [`AffirmError`]. The
//! binary and [`config`] use `anyhow` for context-rich messages.
//!
//! ## Logging
//!
//! Everything logs through the `log` facade; the binary installs
//! `env_logger`, so `RUST_LOG=mantra=debug mantra play` shows session events.

pub mod categories;
pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod generator;
pub mod order;
pub mod output;
pub mod player;
pub mod playlist;
pub mod recorder;
pub mod session;
pub mod store;
pub mod visualizer;

pub use error::{AffirmError, Result};
