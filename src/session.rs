//! # Audio Session
//!
//! Owns the one foreground playback resource and the one background-music
//! resource. The session is built around an injected [`AudioOutput`] rather
//! than a process-wide audio context, so tests can run it against
//! [`crate::output::SimulatedOutput`].
//!
//! ## Lifecycle
//!
//! Starting a track always tears the previous one down first: pause, rewind,
//! detach its callbacks, release its backing handle. Only then is the next
//! resource opened. Each resource gets an [`EventSink`] stamped with a fresh
//! [`SessionId`]; [`AudioSession::poll_events`] discards anything stamped with
//! an id that is no longer active, so a replaced track can never report
//! "ended" against its successor.
//!
//! ## Errors
//!
//! Any open or start failure tears the half-built resource down and comes
//! back as [`AffirmError::ResourceUnavailable`]. A failure reported later
//! through the sink stops the session before the event is handed out.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::error::{AffirmError, Result};
use crate::playlist::Track;
use crate::visualizer::Analyzer;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Foreground,
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
    /// Reached the end of the audio on its own.
    Ended,
    /// Decode or output failure after playback began.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub kind: SessionEventKind,
}

/// Completion/error callback handed to a resource.
///
/// Cloneable and `Send` so backends can report from their own threads.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: Sender<SessionEvent>,
}

impl EventSink {
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    pub fn ended(&self) {
        self.send(SessionEventKind::Ended);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.send(SessionEventKind::Failed(reason.into()));
    }

    fn send(&self, kind: SessionEventKind) {
        // The session outlives every sink it hands out; a closed channel only
        // means the session is being dropped.
        let _ = self.tx.send(SessionEvent {
            session: self.session,
            kind,
        });
    }
}

/// A decoded, playable track owned by the session.
pub trait PlaybackResource {
    /// Begin (or resume) playback at `offset` from the start.
    fn start(&mut self, offset: Duration) -> Result<()>;

    fn pause(&mut self);

    /// Reset the playback position to zero.
    fn rewind(&mut self);

    fn position(&self) -> Duration;

    fn set_volume(&mut self, level: f32);

    /// Frequency/time-domain taps for the visualizer.
    fn attach_analyzer(&mut self) -> Result<Box<dyn Analyzer>>;

    /// Drop the event sink and disconnect from the output graph.
    fn detach(&mut self);

    /// Free whatever backs the audio (buffers, handles, temporary urls).
    fn release(&mut self);
}

/// Factory for playback resources.
pub trait AudioOutput {
    fn open(&mut self, track: &Track, events: EventSink) -> Result<Box<dyn PlaybackResource>>;
}

struct Active {
    id: SessionId,
    track: Track,
    resource: Box<dyn PlaybackResource>,
    analyzer: Option<Box<dyn Analyzer>>,
}

pub struct AudioSession {
    output: Box<dyn AudioOutput>,
    foreground: Option<Active>,
    background: Option<Active>,
    foreground_volume: f32,
    background_volume: f32,
    next_id: SessionId,
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("foreground", &self.foreground.as_ref().map(|a| (a.id, &a.track.name)))
            .field("background", &self.background.as_ref().map(|a| (a.id, &a.track.name)))
            .field("foreground_volume", &self.foreground_volume)
            .field("background_volume", &self.background_volume)
            .finish_non_exhaustive()
    }
}

impl AudioSession {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            output,
            foreground: None,
            background: None,
            foreground_volume: 1.0,
            background_volume: 0.5,
            next_id: 1,
            tx,
            rx,
        }
    }

    /// Play `track` from the beginning, replacing whatever was playing.
    pub fn play(&mut self, track: &Track) -> Result<SessionId> {
        self.play_from(track, Duration::ZERO)
    }

    /// Play `track` starting `offset` into it.
    pub fn play_from(&mut self, track: &Track, offset: Duration) -> Result<SessionId> {
        self.stop();
        let active = self.open_slot(Slot::Foreground, track, offset)?;
        let id = active.id;
        info!("Playing `{}' (session {id})", track.name);
        self.foreground = Some(active);
        Ok(id)
    }

    /// Stop the foreground track. Safe to call when nothing is playing.
    pub fn stop(&mut self) {
        if let Some(active) = self.foreground.take() {
            debug!("Stopping `{}' (session {})", active.track.name, active.id);
            teardown(active);
        }
    }

    /// Start looping background music, replacing any previous one.
    pub fn play_background(&mut self, track: &Track) -> Result<SessionId> {
        self.stop_background();
        let active = self.open_slot(Slot::Background, track, Duration::ZERO)?;
        let id = active.id;
        info!("Background music `{}' (session {id})", track.name);
        self.background = Some(active);
        Ok(id)
    }

    pub fn stop_background(&mut self) {
        if let Some(active) = self.background.take() {
            debug!("Stopping background `{}' (session {})", active.track.name, active.id);
            teardown(active);
        }
    }

    /// Stop both slots.
    pub fn stop_all(&mut self) {
        self.stop();
        self.stop_background();
    }

    /// Set a slot's volume, clamped to `0.0..=1.0`. Returns the applied level.
    pub fn set_volume(&mut self, slot: Slot, level: f32) -> f32 {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        let active = match slot {
            Slot::Foreground => {
                self.foreground_volume = level;
                self.foreground.as_mut()
            }
            Slot::Background => {
                self.background_volume = level;
                self.background.as_mut()
            }
        };
        if let Some(active) = active {
            active.resource.set_volume(level);
        }
        trace!("{slot:?} volume set to {level:.2}");
        level
    }

    #[must_use]
    pub const fn volume(&self, slot: Slot) -> f32 {
        match slot {
            Slot::Foreground => self.foreground_volume,
            Slot::Background => self.background_volume,
        }
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.foreground.is_some()
    }

    #[must_use]
    pub const fn has_background(&self) -> bool {
        self.background.is_some()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.foreground.as_ref().map(|a| a.id)
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.foreground.as_ref().map(|a| &a.track)
    }

    /// Elapsed time of the foreground track.
    pub fn position(&self) -> Option<Duration> {
        self.foreground.as_ref().map(|a| a.resource.position())
    }

    /// Analyzer of the foreground track, if one could be attached.
    pub fn analyzer(&mut self) -> Option<&mut (dyn Analyzer + 'static)> {
        self.foreground.as_mut()?.analyzer.as_deref_mut()
    }

    /// Drain queued events, keeping only those of the live foreground track.
    ///
    /// Background music is restarted when it ends and dropped when it fails.
    /// A foreground failure stops the session before it is returned.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let queued: Vec<SessionEvent> = self.rx.try_iter().collect();
        let mut live = Vec::new();

        for event in queued {
            if self.current_session() == Some(event.session) {
                if let SessionEventKind::Failed(reason) = &event.kind {
                    warn!("Playback failed in session {}: {reason}", event.session);
                    self.stop();
                }
                live.push(event);
            } else if self.background.as_ref().map(|a| a.id) == Some(event.session) {
                self.handle_background_event(&event.kind);
            } else {
                trace!("Discarding stale event {event:?}");
            }
        }
        live
    }

    fn handle_background_event(&mut self, kind: &SessionEventKind) {
        match kind {
            SessionEventKind::Ended => {
                let restarted = self
                    .background
                    .as_mut()
                    .map(|active| active.resource.start(Duration::ZERO));
                if let Some(Err(err)) = restarted {
                    warn!("Could not loop background music: {err}");
                    self.stop_background();
                }
            }
            SessionEventKind::Failed(reason) => {
                warn!("Background music failed: {reason}");
                self.stop_background();
            }
        }
    }

    fn open_slot(&mut self, slot: Slot, track: &Track, offset: Duration) -> Result<Active> {
        let id = self.next_id;
        self.next_id += 1;
        let sink = EventSink {
            session: id,
            tx: self.tx.clone(),
        };

        let mut resource = self.output.open(track, sink).map_err(into_unavailable)?;

        let analyzer = match slot {
            Slot::Foreground => match resource.attach_analyzer() {
                Ok(analyzer) => Some(analyzer),
                Err(err) => {
                    warn!("Visualizer unavailable for `{}': {err}", track.name);
                    None
                }
            },
            Slot::Background => None,
        };

        resource.set_volume(self.volume(slot));

        let mut active = Active {
            id,
            track: track.clone(),
            resource,
            analyzer,
        };
        if let Err(err) = active.resource.start(offset) {
            warn!("Could not start `{}': {err}", track.name);
            teardown(active);
            return Err(into_unavailable(err));
        }
        Ok(active)
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Full release, in the order that keeps callbacks from outliving the resource.
fn teardown(mut active: Active) {
    active.analyzer = None;
    active.resource.pause();
    active.resource.rewind();
    active.resource.detach();
    active.resource.release();
}

pub(crate) fn into_unavailable(err: AffirmError) -> AffirmError {
    match err {
        AffirmError::ResourceUnavailable(_) => err,
        other => AffirmError::ResourceUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Lifecycle, SimulatedOutput};

    fn session() -> (AudioSession, crate::output::SimulatedHandle) {
        let output = SimulatedOutput::new();
        let handle = output.handle();
        (AudioSession::new(Box::new(output)), handle)
    }

    #[test]
    fn test_play_replaces_previous_resource() {
        let (mut session, handle) = session();
        let x = Track::new("x", "x.wav");
        let y = Track::new("y", "y.wav");

        let first = session.play(&x).unwrap();
        let second = session.play(&y).unwrap();

        assert_ne!(first, second);
        assert_eq!(handle.live_resources(), vec!["y".to_string()]);
        assert!(handle.was_released("x"));
        assert_eq!(session.current_track(), Some(&y));
    }

    #[test]
    fn test_stale_callbacks_never_surface() {
        let (mut session, handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();
        let stale = handle.sink_of("x").unwrap();
        session.play(&Track::new("y", "y.wav")).unwrap();

        // x's callbacks were detached, so finishing it does nothing
        assert!(!handle.finish("x"));
        // an event that slipped into the queue before the switch is discarded
        stale.ended();
        stale.failed("late decode error");
        assert!(session.poll_events().is_empty());
        assert!(session.is_playing());

        assert!(handle.finish("y"));
        let events = session.poll_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SessionEventKind::Ended);
    }

    #[test]
    fn test_teardown_order() {
        let (mut session, handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();
        session.stop();

        let calls: Vec<Lifecycle> = handle
            .log()
            .into_iter()
            .filter(|c| c.track() == "x")
            .skip_while(|c| !matches!(c, Lifecycle::Paused(_)))
            .collect();
        assert_eq!(
            calls,
            vec![
                Lifecycle::Paused("x".into()),
                Lifecycle::Rewound("x".into()),
                Lifecycle::Detached("x".into()),
                Lifecycle::Released("x".into()),
            ]
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut session, handle) = session();
        session.stop();
        session.play(&Track::new("x", "x.wav")).unwrap();
        session.stop();
        session.stop();

        assert!(!session.is_playing());
        assert!(handle.live_resources().is_empty());
        assert_eq!(session.position(), None);
    }

    #[test]
    fn test_open_failure_leaves_clean_state() {
        let (mut session, handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();
        handle.fail_open("broken.wav");

        let err = session.play(&Track::new("broken", "broken.wav")).unwrap_err();
        assert!(matches!(err, AffirmError::ResourceUnavailable(_)));
        assert!(!session.is_playing());
        assert!(handle.live_resources().is_empty());
    }

    #[test]
    fn test_start_failure_releases_resource() {
        let (mut session, handle) = session();
        handle.fail_start("corrupt.wav");

        let err = session.play(&Track::new("corrupt", "corrupt.wav")).unwrap_err();
        assert!(matches!(err, AffirmError::ResourceUnavailable(_)));
        assert!(handle.was_released("corrupt"));
        assert!(handle.live_resources().is_empty());
    }

    #[test]
    fn test_runtime_failure_stops_session() {
        let (mut session, handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();
        handle.fail("x", "decoder error");

        let events = session.poll_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0].kind, SessionEventKind::Failed(r) if r == "decoder error"));
        assert!(!session.is_playing());
        assert!(handle.was_released("x"));
    }

    #[test]
    fn test_analyzer_is_best_effort() {
        let (mut session, handle) = session();
        handle.disable_analyzer();

        session.play(&Track::new("x", "x.wav")).unwrap();
        assert!(session.is_playing());
        assert!(session.analyzer().is_none());
    }

    #[test]
    fn test_analyzer_attached_when_available() {
        let (mut session, _handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();
        assert!(session.analyzer().is_some());
    }

    #[test]
    fn test_volume_is_clamped_and_applied() {
        let (mut session, handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();

        assert_eq!(session.set_volume(Slot::Foreground, 1.7), 1.0);
        assert_eq!(session.set_volume(Slot::Foreground, -0.2), 0.0);
        assert_eq!(session.set_volume(Slot::Foreground, 0.4), 0.4);
        assert_eq!(session.set_volume(Slot::Background, f32::NAN), 0.0);

        assert_eq!(handle.volume_of("x"), Some(0.4));
        assert!(session.is_playing());
    }

    #[test]
    fn test_background_volume_reaches_live_resource() {
        let (mut session, handle) = session();
        session.play(&Track::new("x", "x.wav")).unwrap();
        session.play_background(&Track::new("rain", "rain.wav")).unwrap();
        assert_eq!(handle.volume_of("rain"), Some(0.5));

        assert_eq!(session.set_volume(Slot::Background, 0.3), 0.3);
        assert_eq!(handle.volume_of("rain"), Some(0.3));
        assert_eq!(handle.volume_of("x"), Some(1.0));

        assert_eq!(session.set_volume(Slot::Background, 2.0), 1.0);
        assert_eq!(handle.volume_of("rain"), Some(1.0));

        session.set_volume(Slot::Background, 0.2);
        session.play_background(&Track::new("waves", "waves.wav")).unwrap();
        assert_eq!(handle.volume_of("waves"), Some(0.2));
    }

    #[test]
    fn test_background_is_independent_and_loops() {
        let (mut session, handle) = session();
        session.play_background(&Track::new("rain", "rain.wav")).unwrap();
        session.play(&Track::new("x", "x.wav")).unwrap();
        session.play(&Track::new("y", "y.wav")).unwrap();

        assert!(session.has_background());
        assert!(handle.finish("rain"));
        assert!(session.poll_events().is_empty());
        assert!(session.has_background());
        assert_eq!(handle.start_count("rain"), 2);

        session.stop_all();
        assert!(handle.live_resources().is_empty());
    }

    #[test]
    fn test_background_failure_drops_background_only() {
        let (mut session, handle) = session();
        session.play_background(&Track::new("rain", "rain.wav")).unwrap();
        session.play(&Track::new("x", "x.wav")).unwrap();

        handle.fail("rain", "device lost");
        assert!(session.poll_events().is_empty());
        assert!(!session.has_background());
        assert!(session.is_playing());
    }

    #[test]
    fn test_play_from_offset() {
        let (mut session, handle) = session();
        session
            .play_from(&Track::new("x", "x.wav"), Duration::from_secs(12))
            .unwrap();
        assert_eq!(handle.started_at("x"), Some(Duration::from_secs(12)));
        assert_eq!(session.position(), Some(Duration::from_secs(12)));
    }
}
