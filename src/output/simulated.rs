//! Silent backend driven by a virtual clock.
//!
//! Nothing is decoded. Every call a resource receives is appended to a
//! [`Lifecycle`] log, and the paired [`SimulatedHandle`] can end or fail a
//! track, move its clock, or make the next open/start of a url fail. The CLI
//! uses it for `play --dry-run`; the tests use it to check that the session
//! releases what it opens.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use log::trace;

use crate::error::{AffirmError, Result};
use crate::playlist::Track;
use crate::session::{AudioOutput, EventSink, PlaybackResource};
use crate::visualizer::Analyzer;

const ANALYZER_BINS: usize = 32;

/// One call received by a simulated resource, tagged with its track name.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    Opened(String),
    Started(String, Duration),
    Paused(String),
    Rewound(String),
    Volume(String, f32),
    Detached(String),
    Released(String),
}

impl Lifecycle {
    pub fn track(&self) -> &str {
        match self {
            Self::Opened(t)
            | Self::Started(t, _)
            | Self::Paused(t)
            | Self::Rewound(t)
            | Self::Volume(t, _)
            | Self::Detached(t)
            | Self::Released(t) => t,
        }
    }
}

#[derive(Debug)]
struct ResourceState {
    track: String,
    url: String,
    sink: Option<EventSink>,
    position: Duration,
    volume: f32,
    starts: usize,
    released: bool,
}

#[derive(Debug, Default)]
struct SimState {
    log: Vec<Lifecycle>,
    resources: Vec<ResourceState>,
    fail_open: HashSet<String>,
    fail_start: HashSet<String>,
    analyzer_disabled: bool,
}

impl SimState {
    fn latest(&self, track: &str) -> Option<&ResourceState> {
        self.resources.iter().rev().find(|r| r.track == track)
    }

    fn latest_mut(&mut self, track: &str) -> Option<&mut ResourceState> {
        self.resources.iter_mut().rev().find(|r| r.track == track)
    }
}

#[derive(Debug, Default)]
pub struct SimulatedOutput {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller sharing this output's state.
    #[must_use]
    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl AudioOutput for SimulatedOutput {
    fn open(&mut self, track: &Track, events: EventSink) -> Result<Box<dyn PlaybackResource>> {
        let mut state = self.state.borrow_mut();
        if state.fail_open.contains(&track.url) {
            return Err(AffirmError::unavailable(format!("cannot load {}", track.url)));
        }
        state.resources.push(ResourceState {
            track: track.name.clone(),
            url: track.url.clone(),
            sink: Some(events),
            position: Duration::ZERO,
            volume: 1.0,
            starts: 0,
            released: false,
        });
        state.log.push(Lifecycle::Opened(track.name.clone()));
        trace!("Simulated open of `{}'", track.name);

        Ok(Box::new(SimulatedResource {
            state: Rc::clone(&self.state),
            index: state.resources.len() - 1,
        }))
    }
}

struct SimulatedResource {
    state: Rc<RefCell<SimState>>,
    index: usize,
}

impl SimulatedResource {
    fn update(&self, f: impl FnOnce(&mut ResourceState) -> Lifecycle) {
        let mut state = self.state.borrow_mut();
        let call = f(&mut state.resources[self.index]);
        state.log.push(call);
    }
}

impl PlaybackResource for SimulatedResource {
    fn start(&mut self, offset: Duration) -> Result<()> {
        let url = self.state.borrow().resources[self.index].url.clone();
        if self.state.borrow().fail_start.contains(&url) {
            return Err(AffirmError::unavailable(format!("cannot decode {url}")));
        }
        self.update(|r| {
            r.position = offset;
            r.starts += 1;
            Lifecycle::Started(r.track.clone(), offset)
        });
        Ok(())
    }

    fn pause(&mut self) {
        self.update(|r| Lifecycle::Paused(r.track.clone()));
    }

    fn rewind(&mut self) {
        self.update(|r| {
            r.position = Duration::ZERO;
            Lifecycle::Rewound(r.track.clone())
        });
    }

    fn position(&self) -> Duration {
        self.state.borrow().resources[self.index].position
    }

    fn set_volume(&mut self, level: f32) {
        self.update(|r| {
            r.volume = level;
            Lifecycle::Volume(r.track.clone(), level)
        });
    }

    fn attach_analyzer(&mut self) -> Result<Box<dyn Analyzer>> {
        if self.state.borrow().analyzer_disabled {
            return Err(AffirmError::unavailable("analyzer not supported"));
        }
        Ok(Box::new(SimulatedAnalyzer { frame: 0 }))
    }

    fn detach(&mut self) {
        self.update(|r| {
            r.sink = None;
            Lifecycle::Detached(r.track.clone())
        });
    }

    fn release(&mut self) {
        self.update(|r| {
            r.released = true;
            Lifecycle::Released(r.track.clone())
        });
    }
}

/// Test and dry-run controls for a [`SimulatedOutput`].
///
/// Track lookups go by name and hit the most recently opened resource.
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedHandle {
    pub fn log(&self) -> Vec<Lifecycle> {
        self.state.borrow().log.clone()
    }

    /// Names of opened resources not yet released.
    pub fn live_resources(&self) -> Vec<String> {
        self.state
            .borrow()
            .resources
            .iter()
            .filter(|r| !r.released)
            .map(|r| r.track.clone())
            .collect()
    }

    pub fn was_released(&self, track: &str) -> bool {
        self.state.borrow().latest(track).is_some_and(|r| r.released)
    }

    /// Event sink currently attached to `track`, if any.
    pub fn sink_of(&self, track: &str) -> Option<EventSink> {
        self.state.borrow().latest(track)?.sink.clone()
    }

    /// Report natural end. False if the track's callbacks are detached.
    pub fn finish(&self, track: &str) -> bool {
        match self.sink_of(track) {
            Some(sink) => {
                sink.ended();
                true
            }
            None => false,
        }
    }

    /// Report a playback error. False if the track's callbacks are detached.
    pub fn fail(&self, track: &str, reason: &str) -> bool {
        match self.sink_of(track) {
            Some(sink) => {
                sink.failed(reason);
                true
            }
            None => false,
        }
    }

    /// Move a track's clock, as if it had been playing for `position`.
    pub fn set_position(&self, track: &str, position: Duration) {
        if let Some(r) = self.state.borrow_mut().latest_mut(track) {
            r.position = position;
        }
    }

    pub fn fail_open(&self, url: &str) {
        self.state.borrow_mut().fail_open.insert(url.to_string());
    }

    pub fn fail_start(&self, url: &str) {
        self.state.borrow_mut().fail_start.insert(url.to_string());
    }

    pub fn disable_analyzer(&self) {
        self.state.borrow_mut().analyzer_disabled = true;
    }

    pub fn volume_of(&self, track: &str) -> Option<f32> {
        self.state.borrow().latest(track).map(|r| r.volume)
    }

    pub fn start_count(&self, track: &str) -> usize {
        self.state.borrow().latest(track).map_or(0, |r| r.starts)
    }

    /// Offset passed to the latest start of `track`.
    pub fn started_at(&self, track: &str) -> Option<Duration> {
        self.state.borrow().log.iter().rev().find_map(|call| match call {
            Lifecycle::Started(t, offset) if t == track => Some(*offset),
            _ => None,
        })
    }
}

/// Deterministic analyzer: a falling spectrum and a triangle wave that
/// shifts a little each frame.
struct SimulatedAnalyzer {
    frame: usize,
}

impl Analyzer for SimulatedAnalyzer {
    fn bin_count(&self) -> usize {
        ANALYZER_BINS
    }

    fn frequency_data(&mut self, out: &mut [u8]) {
        let len = out.len().max(1);
        for (i, v) in out.iter_mut().enumerate() {
            *v = u8::try_from(255 - (255 * i / len)).unwrap_or(0);
        }
        self.frame += 1;
    }

    fn time_domain_data(&mut self, out: &mut [u8]) {
        for (i, v) in out.iter_mut().enumerate() {
            let phase = (i + self.frame) % 16;
            let level = if phase < 8 { phase * 32 } else { (16 - phase) * 32 };
            *v = u8::try_from(level.min(255)).unwrap_or(u8::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AudioSession;
    use crate::visualizer::Visualizer;

    #[test]
    fn test_simulated_analyzer_feeds_visualizer() {
        let mut analyzer = SimulatedAnalyzer { frame: 0 };
        let mut visualizer = Visualizer::new(8);

        let frame = visualizer.frame(&mut analyzer);
        assert_eq!(frame.bars.len(), 8);
        assert!(frame.bars[0] > frame.bars[7]);
        assert!(frame.waveform.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_lifecycle_log_records_every_call() {
        let output = SimulatedOutput::new();
        let handle = output.handle();
        let mut session = AudioSession::new(Box::new(output));

        session.play(&Track::new("x", "x.wav")).unwrap();
        handle.set_position("x", Duration::from_secs(3));
        assert_eq!(session.position(), Some(Duration::from_secs(3)));
        session.stop();

        let log = handle.log();
        assert_eq!(log.first(), Some(&Lifecycle::Opened("x".into())));
        assert_eq!(log.last(), Some(&Lifecycle::Released("x".into())));
        assert!(log.iter().all(|call| call.track() == "x"));
    }
}
