//! Real playback on the default output device through `rodio`.
//!
//! Each [`PlaybackResource::start`] builds a fresh `Sink` with the decoded
//! track appended, skipping to the requested offset. A watcher thread waits
//! for the sink to drain and reports "ended" unless that start was superseded
//! or the resource detached in the meantime.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::error::{AffirmError, Result};
use crate::playlist::Track;
use crate::session::{AudioOutput, EventSink, PlaybackResource};
use crate::visualizer::Analyzer;

/// Fetches the encoded bytes behind a track url.
pub type TrackLoader = Box<dyn FnMut(&Track) -> Result<Vec<u8>>>;

pub struct RodioOutput {
    // Dropping the stream silences every sink created from it.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    loader: TrackLoader,
}

impl RodioOutput {
    /// Open the default output device.
    pub fn new(loader: TrackLoader) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| AffirmError::unavailable(format!("no audio output device: {e}")))?;
        Ok(Self {
            _stream: stream,
            handle,
            loader,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn open(&mut self, track: &Track, events: EventSink) -> Result<Box<dyn PlaybackResource>> {
        let bytes = (self.loader)(track)?;
        // Decode once up front so unsupported data fails at open time.
        Decoder::new(Cursor::new(bytes.clone()))
            .map_err(|e| AffirmError::unavailable(format!("cannot decode `{}': {e}", track.name)))?;
        debug!("Loaded `{}' ({} bytes)", track.name, bytes.len());

        Ok(Box::new(RodioResource {
            name: track.name.clone(),
            bytes: Some(Arc::new(bytes)),
            handle: self.handle.clone(),
            sink: None,
            superseded: Arc::new(AtomicBool::new(false)),
            events: Some(events),
            volume: 1.0,
            base: Duration::ZERO,
            started: None,
        }))
    }
}

struct RodioResource {
    name: String,
    bytes: Option<Arc<Vec<u8>>>,
    handle: OutputStreamHandle,
    sink: Option<Arc<Sink>>,
    superseded: Arc<AtomicBool>,
    events: Option<EventSink>,
    volume: f32,
    base: Duration,
    started: Option<Instant>,
}

impl RodioResource {
    fn halt_sink(&mut self) {
        self.superseded.store(true, Ordering::SeqCst);
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl PlaybackResource for RodioResource {
    fn start(&mut self, offset: Duration) -> Result<()> {
        let bytes = self
            .bytes
            .as_ref()
            .ok_or_else(|| AffirmError::unavailable(format!("`{}' was already released", self.name)))?;
        let source = Decoder::new(Cursor::new(bytes.as_ref().clone()))
            .map_err(|e| AffirmError::unavailable(format!("cannot decode `{}': {e}", self.name)))?;

        self.halt_sink();
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| AffirmError::unavailable(format!("cannot open output: {e}")))?;
        sink.set_volume(self.volume);
        sink.append(source.skip_duration(offset));
        let sink = Arc::new(sink);

        let superseded = Arc::new(AtomicBool::new(false));
        if let Some(events) = self.events.clone() {
            let watched = Arc::clone(&sink);
            let flag = Arc::clone(&superseded);
            thread::spawn(move || {
                watched.sleep_until_end();
                if !flag.load(Ordering::SeqCst) {
                    events.ended();
                }
            });
        }

        self.superseded = superseded;
        self.sink = Some(sink);
        self.base = offset;
        self.started = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        if let Some(started) = self.started.take() {
            self.base += started.elapsed();
        }
    }

    fn rewind(&mut self) {
        self.base = Duration::ZERO;
        self.started = None;
    }

    fn position(&self) -> Duration {
        self.base + self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }

    fn set_volume(&mut self, level: f32) {
        self.volume = level;
        if let Some(sink) = &self.sink {
            sink.set_volume(level);
        }
    }

    fn attach_analyzer(&mut self) -> Result<Box<dyn Analyzer>> {
        Err(AffirmError::unavailable("rodio output has no analyzer tap"))
    }

    fn detach(&mut self) {
        self.superseded.store(true, Ordering::SeqCst);
        self.events = None;
    }

    fn release(&mut self) {
        self.halt_sink();
        if self.bytes.take().is_none() {
            warn!("`{}' released twice", self.name);
        }
    }
}
