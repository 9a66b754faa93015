//! # Recorder
//!
//! Turns a microphone capture into a stored recording and a playlist track.
//! Capture hardware and the desktop notification surface are both traits so
//! they can be swapped for fakes.

use log::{debug, info, warn};

use crate::error::{AffirmError, Result};
use crate::playlist::{PlaylistId, PlaylistStore, Track};
use crate::session::into_unavailable;
use crate::store::{recording_url, RecordingId, RecordingStore};

/// Source of recorded audio. Opening may be refused, e.g. when the user
/// denies microphone permission.
pub trait CaptureDevice {
    fn open(&mut self) -> Result<Box<dyn CaptureStream>>;
}

/// An open capture. Yields encoded chunks until the recording is stopped.
pub trait CaptureStream {
    fn read_chunk(&mut self) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Fire-and-forget user notifications.
pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

/// Sends notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        info!("{}: {}", notice.title, notice.body);
    }
}

/// Where a finished recording ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTrack {
    pub recording: RecordingId,
    pub playlist: PlaylistId,
    pub index: usize,
    pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct Recorder;

impl Recorder {
    /// Capture until the device stops, then store the audio under `category`
    /// and append it to that category's playlist.
    pub fn record(
        device: &mut dyn CaptureDevice,
        name: &str,
        category: &str,
        recordings: &mut dyn RecordingStore,
        playlists: &mut PlaylistStore,
        notifier: &dyn Notifier,
    ) -> Result<RecordedTrack> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AffirmError::InvalidDefinition("recording name is empty".into()));
        }

        let mut stream = match device.open() {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Capture device refused: {err}");
                notifier.notify(&Notice::new("Recording failed", "Microphone is not available"));
                return Err(into_unavailable(err));
            }
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = stream.read_chunk() {
            bytes.extend_from_slice(&chunk);
        }
        debug!("Captured {} bytes for `{name}'", bytes.len());
        if bytes.is_empty() {
            notifier.notify(&Notice::new("Recording failed", "Nothing was recorded"));
            return Err(AffirmError::unavailable("capture produced no audio"));
        }

        let recording = recordings.save_recording(name, &bytes, category)?;
        let (playlist, index) =
            playlists.ingest_recording(category, Track::new(name, recording_url(recording)))?;

        notifier.notify(&Notice::new("Recording saved", format!("`{name}' added to {category}")));
        Ok(RecordedTrack {
            recording,
            playlist,
            index,
            bytes: bytes.len(),
        })
    }
}
