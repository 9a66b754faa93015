//! # Mantra
//!
//! Command-line front end: generate affirmations, manage playlists and
//! recordings, and play playlists with shuffle and loop.
//!
//! ```bash
//! mantra generate sleep "I can't sleep at night" --mode wizard
//! mantra recordings add ~/rec/evening.wav sleep
//! mantra play sleep --loop
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use mantra::categories::CategoryRegistry;
use mantra::cli::{self, GenerateMode, PlaylistAction, RecordingsAction};
use mantra::completion;
use mantra::config::{self, RuntimeConfig};
use mantra::generator::{filter_for_wizard, Generator};
use mantra::order::compute_order;
use mantra::output::SimulatedOutput;
use mantra::player::{Player, PlayerNotice, PlayerStatus};
use mantra::playlist::{PlaylistId, PlaylistStore, Track};
use mantra::recorder::{CaptureDevice, CaptureStream, LogNotifier, Recorder};
use mantra::session::{AudioSession, Slot};
use mantra::store::{recording_url, RecordingStore, SqliteRecordingStore};

const CAPTURE_CHUNK: usize = 64 * 1024;

/// Options shared by both playback paths.
struct PlayOptions {
    shuffle: bool,
    looping: bool,
    volume: f32,
    background: Option<PathBuf>,
}

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug mantra play` - everything
/// - `RUST_LOG=mantra::session=trace mantra play` - session events only
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    let config = match &args.data_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
            RuntimeConfig::with_data_dir(dir)
        }
        None => RuntimeConfig::new()?,
    };
    debug!("Using configuration {config:?}");

    match args.command {
        cli::Command::Generate { category, thought, mode, seed } => {
            let generator = Generator::new()?;
            let mut rng = seeded(seed);
            let lines = match mode {
                GenerateMode::Template => generator.generate_with_rng(&category, &thought, &mut rng)?,
                GenerateMode::Wizard => {
                    filter_for_wizard(generator.generate_with_rng(&category, &thought, &mut rng)?)?
                }
                GenerateMode::Custom => generator.generate_custom_with_rng(&category, &thought, &mut rng)?,
            };
            for line in lines {
                println!("{line}");
            }
        }
        cli::Command::Categories { verbose } => {
            let registry = CategoryRegistry::builtin()?;
            for category in registry.iter() {
                println!("{}", category.name());
                if verbose {
                    for template in category.templates() {
                        println!("  {template}");
                    }
                    println!("  words: {}", category.positive_words().join(", "));
                }
            }
        }
        cli::Command::Order { len, shuffle, seed } => {
            let order = compute_order(len, shuffle, &mut seeded(seed));
            let line: Vec<String> = order.iter().map(ToString::to_string).collect();
            println!("{}", line.join(" "));
        }
        cli::Command::Playlist { action } => {
            run_playlist_action(&config, action)?;
        }
        cli::Command::Recordings { action } => {
            run_recordings_action(&config, action)?;
        }
        cli::Command::Play { playlist, shuffle, looping, volume, background, dry_run } => {
            let store = config::load_playlists(&config.playlists_path)?;
            let id = match playlist {
                Some(key) => resolve_playlist(&store, &key)?,
                None => store.playlists()[0].id,
            };
            let options = PlayOptions {
                shuffle: shuffle || config.shuffle,
                looping: looping || config.looping,
                volume: volume.unwrap_or(config.volume),
                background,
            };
            info!("Playing playlist {id}");
            if dry_run {
                play_dry_run(&store, id, &options)?;
            } else {
                play_on_device(&config, &store, id, &options)?;
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
    }

    Ok(())
}

fn seeded(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Look a playlist up by numeric id first, then by exact name.
fn resolve_playlist(store: &PlaylistStore, key: &str) -> Result<PlaylistId> {
    if let Ok(raw) = key.parse::<u64>() {
        if let Ok(playlist) = store.get(PlaylistId(raw)) {
            return Ok(playlist.id);
        }
    }
    store
        .find_by_name(key)
        .map(|playlist| playlist.id)
        .ok_or_else(|| anyhow!("No playlist with id or name `{key}'"))
}

fn run_playlist_action(config: &RuntimeConfig, action: PlaylistAction) -> Result<()> {
    let path = &config.playlists_path;
    let mut store = config::load_playlists(path)?;

    match action {
        PlaylistAction::List => {
            for playlist in store.playlists() {
                println!("{} {} ({} tracks)", playlist.id, playlist.name, playlist.len());
                for (index, track) in playlist.tracks.iter().enumerate() {
                    println!("  {index}: {} <{}>", track.name, track.url);
                }
            }
            return Ok(());
        }
        PlaylistAction::Export { playlist, output } => {
            let json = match playlist {
                Some(key) => store.export(resolve_playlist(&store, &key)?)?,
                None => store.export_all()?,
            };
            match output {
                Some(file) => fs::write(&file, json)
                    .with_context(|| format!("Failed to write {}", file.display()))?,
                None => println!("{json}"),
            }
            return Ok(());
        }
        PlaylistAction::Create { name } => {
            let id = store.create(&name);
            println!("Created playlist {id}");
        }
        PlaylistAction::Delete { playlist } => {
            let removed = store.delete(resolve_playlist(&store, &playlist)?)?;
            println!("Deleted `{}' ({} tracks)", removed.name, removed.len());
        }
        PlaylistAction::Rename { playlist, name } => {
            store.rename(resolve_playlist(&store, &playlist)?, &name)?;
        }
        PlaylistAction::AddTrack { playlist, name, url } => {
            let index = store.add_track(resolve_playlist(&store, &playlist)?, Track::new(name, url))?;
            println!("Added track {index}");
        }
        PlaylistAction::RemoveTrack { playlist, index } => {
            let track = store.remove_track(resolve_playlist(&store, &playlist)?, index)?;
            println!("Removed `{}'", track.name);
        }
        PlaylistAction::RenameTrack { playlist, index, name } => {
            store.rename_track(resolve_playlist(&store, &playlist)?, index, &name)?;
        }
        PlaylistAction::MoveTrack { from, index, to } => {
            let from = resolve_playlist(&store, &from)?;
            let to = resolve_playlist(&store, &to)?;
            let new_index = store.move_track(from, index, to)?;
            println!("Moved to position {new_index}");
        }
        PlaylistAction::Import { path: file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let ids = store.import(&json)?;
            println!("Imported {} playlist(s)", ids.len());
        }
    }

    config::save_playlists(path, &store)
}

fn run_recordings_action(config: &RuntimeConfig, action: RecordingsAction) -> Result<()> {
    let mut recordings = SqliteRecordingStore::open(&config.db_path)?;

    match action {
        RecordingsAction::List { category } => {
            let categories = match category {
                Some(category) => vec![category],
                None => recordings.all_categories()?,
            };
            for category in categories {
                println!("{category}");
                for recording in recordings.recordings_by_category(&category)? {
                    println!("  {} {} ({} bytes)", recording.id, recording.name, recording.bytes.len());
                }
            }
        }
        RecordingsAction::Add { path, category, name } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow!("Cannot derive a track name from {}", path.display()))?,
            };
            let mut playlists = config::load_playlists(&config.playlists_path)?;
            let mut device = FileCapture { path };
            let recorded =
                Recorder::record(&mut device, &name, &category, &mut recordings, &mut playlists, &LogNotifier)?;
            config::save_playlists(&config.playlists_path, &playlists)?;
            println!("Saved recording {} to playlist {}", recorded.recording, recorded.playlist);
        }
        RecordingsAction::Delete { id } => {
            recordings.delete_recording(id)?;
            let mut playlists = config::load_playlists(&config.playlists_path)?;
            let removed = remove_tracks_with_url(&mut playlists, &recording_url(id))?;
            if removed > 0 {
                config::save_playlists(&config.playlists_path, &playlists)?;
            }
            println!("Deleted recording {id} ({removed} playlist entries)");
        }
    }
    Ok(())
}

fn remove_tracks_with_url(store: &mut PlaylistStore, url: &str) -> Result<usize> {
    let hits: Vec<(PlaylistId, usize)> = store
        .playlists()
        .iter()
        .flat_map(|p| {
            p.tracks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.url == url)
                .map(move |(i, _)| (p.id, i))
        })
        .collect();
    for (id, index) in hits.iter().rev() {
        store.remove_track(*id, *index)?;
    }
    Ok(hits.len())
}

/// An audio file read back as if it were being captured.
struct FileCapture {
    path: PathBuf,
}

struct FileStream(File);

impl CaptureDevice for FileCapture {
    fn open(&mut self) -> mantra::Result<Box<dyn CaptureStream>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(FileStream(file)))
    }
}

impl CaptureStream for FileStream {
    fn read_chunk(&mut self) -> Option<Vec<u8>> {
        let mut chunk = vec![0; CAPTURE_CHUNK];
        match self.0.read(&mut chunk) {
            Ok(0) | Err(_) => None,
            Ok(n) => {
                chunk.truncate(n);
                Some(chunk)
            }
        }
    }
}

fn print_notice(notice: &PlayerNotice) {
    match notice {
        PlayerNotice::TrackStarted { name, .. } => println!("> {name}"),
        PlayerNotice::Finished { .. } => println!("Finished"),
        PlayerNotice::Failed { reason, .. } => eprintln!("Playback stopped: {reason}"),
    }
}

fn configure(player: &mut Player, store: &PlaylistStore, options: &PlayOptions) -> Result<()> {
    player.set_shuffled(store, options.shuffle)?;
    player.set_looping(options.looping);
    player.session_mut().set_volume(Slot::Foreground, options.volume);
    Ok(())
}

fn start(player: &mut Player, store: &PlaylistStore, id: PlaylistId) -> Result<bool> {
    match player.play_playlist(store, id)? {
        PlayerStatus::Idle => {
            println!("Playlist is empty");
            Ok(false)
        }
        PlayerStatus::Playing { .. } => {
            if let Some(track) = player.session().current_track() {
                println!("> {}", track.name);
            }
            Ok(true)
        }
    }
}

/// Walk the playback order on a silent backend, ending each track at once.
/// With looping on, one pass is printed.
fn play_dry_run(store: &PlaylistStore, id: PlaylistId, options: &PlayOptions) -> Result<()> {
    let output = SimulatedOutput::new();
    let handle = output.handle();
    let mut player = Player::new(AudioSession::new(Box::new(output)));
    configure(&mut player, store, options)?;
    if let Some(background) = &options.background {
        player
            .session_mut()
            .play_background(&background_track(background))?;
    }

    if !start(&mut player, store, id)? {
        return Ok(());
    }
    let len = store.get(id)?.len();
    for _ in 1..len {
        let Some(name) = player.session().current_track().map(|t| t.name.clone()) else {
            break;
        };
        handle.finish(&name);
        for notice in player.handle_events(store) {
            print_notice(&notice);
        }
    }
    if options.looping {
        println!("(looping; dry run stops after one pass)");
    } else if let Some(name) = player.session().current_track().map(|t| t.name.clone()) {
        handle.finish(&name);
        for notice in player.handle_events(store) {
            print_notice(&notice);
        }
    }
    player.session_mut().stop_all();
    Ok(())
}

fn background_track(path: &Path) -> Track {
    Track::new("background", path.to_string_lossy())
}

#[cfg(feature = "rodio-output")]
fn play_on_device(config: &RuntimeConfig, store: &PlaylistStore, id: PlaylistId, options: &PlayOptions) -> Result<()> {
    use mantra::output::{RodioOutput, TrackLoader};
    use mantra::store::load_track_bytes;
    use std::thread;
    use std::time::Duration;

    let recordings = SqliteRecordingStore::open(&config.db_path)?;
    let loader: TrackLoader = Box::new(move |track: &Track| load_track_bytes(&recordings, track));
    let output = RodioOutput::new(loader)?;
    let mut player = Player::new(AudioSession::new(Box::new(output)));
    configure(&mut player, store, options)?;
    if let Some(background) = &options.background {
        player
            .session_mut()
            .play_background(&background_track(background))?;
    }

    if !start(&mut player, store, id)? {
        return Ok(());
    }
    loop {
        thread::sleep(Duration::from_millis(200));
        for notice in player.handle_events(store) {
            print_notice(&notice);
            match notice {
                PlayerNotice::Finished { .. } => return Ok(()),
                PlayerNotice::Failed { reason, .. } => bail!("Playback stopped: {reason}"),
                PlayerNotice::TrackStarted { .. } => {}
            }
        }
    }
}

#[cfg(not(feature = "rodio-output"))]
fn play_on_device(_config: &RuntimeConfig, _store: &PlaylistStore, _id: PlaylistId, _options: &PlayOptions) -> Result<()> {
    bail!("This build has no audio output. Rebuild with `--features rodio-output` or use --dry-run")
}
