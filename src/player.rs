//! # Player
//!
//! Glue between the [`PlaylistStore`], a [`PlaybackOrder`] and the
//! [`AudioSession`]. The player never holds on to the store; every call that
//! needs tracks borrows it, so playlist edits stay plain method calls on the
//! store.
//!
//! ```
//! use mantra::output::SimulatedOutput;
//! use mantra::player::{Player, PlayerNotice};
//! use mantra::playlist::{PlaylistStore, Track};
//! use mantra::session::AudioSession;
//!
//! let output = SimulatedOutput::new();
//! let handle = output.handle();
//! let mut player = Player::new(AudioSession::new(Box::new(output)));
//!
//! let mut store = PlaylistStore::new();
//! let id = store.playlists()[0].id;
//! store.add_track(id, Track::new("calm", "calm.wav"))?;
//! store.add_track(id, Track::new("strong", "strong.wav"))?;
//!
//! player.play_playlist(&store, id)?;
//! handle.finish("calm");
//! let notices = player.handle_events(&store);
//! assert!(matches!(&notices[0], PlayerNotice::TrackStarted { name, .. } if name == "strong"));
//! # Ok::<(), mantra::AffirmError>(())
//! ```

use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{AffirmError, Result};
use crate::order::PlaybackOrder;
use crate::playlist::{PlaylistId, PlaylistStore};
use crate::session::{AudioSession, SessionEventKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Playing {
        playlist: PlaylistId,
        /// Index into the playlist's tracks.
        track: usize,
        /// Index into the playback order.
        position: usize,
    },
}

/// What happened while handling session events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerNotice {
    TrackStarted {
        playlist: PlaylistId,
        track: usize,
        name: String,
    },
    /// Reached the end of the order with looping off.
    Finished { playlist: PlaylistId },
    /// Playback stopped because a track could not be played.
    Failed { playlist: PlaylistId, reason: String },
}

#[derive(Debug)]
pub struct Player {
    session: AudioSession,
    playlist: Option<PlaylistId>,
    order: Option<PlaybackOrder>,
    shuffled: bool,
    looping: bool,
    rng: StdRng,
}

impl Player {
    pub fn new(session: AudioSession) -> Self {
        Self::with_rng(session, StdRng::from_entropy())
    }

    /// Player with a fixed random source, for reproducible shuffles.
    pub fn with_rng(session: AudioSession, rng: StdRng) -> Self {
        Self {
            session,
            playlist: None,
            order: None,
            shuffled: false,
            looping: false,
            rng,
        }
    }

    pub fn session(&self) -> &AudioSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AudioSession {
        &mut self.session
    }

    #[must_use]
    pub const fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn order(&self) -> Option<&PlaybackOrder> {
        self.order.as_ref()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if let Some(order) = self.order.as_mut() {
            order.set_looping(looping);
        }
    }

    /// Set shuffle. While a track plays this goes through
    /// [`Player::toggle_shuffle`], so playback continues in the new order.
    pub fn set_shuffled(&mut self, store: &PlaylistStore, shuffled: bool) -> Result<()> {
        if self.shuffled == shuffled {
            return Ok(());
        }
        if self.session.is_playing() && self.order.is_some() {
            self.toggle_shuffle(store)?;
        } else {
            self.shuffled = shuffled;
            self.order = None;
        }
        Ok(())
    }

    pub fn status(&self) -> PlayerStatus {
        match (&self.order, self.playlist, self.session.is_playing()) {
            (Some(order), Some(playlist), true) => match order.current_track() {
                Some(track) => PlayerStatus::Playing {
                    playlist,
                    track,
                    position: order.position(),
                },
                None => PlayerStatus::Idle,
            },
            _ => PlayerStatus::Idle,
        }
    }

    /// Play a playlist from the top of its order.
    ///
    /// An empty playlist is a no-op: whatever was playing keeps playing and
    /// the unchanged status is returned.
    pub fn play_playlist(&mut self, store: &PlaylistStore, id: PlaylistId) -> Result<PlayerStatus> {
        if !self.prepare_order(store, id)? {
            return Ok(self.status());
        }
        if let Some(order) = self.order.as_mut() {
            order.restart();
        }
        self.start_current(store, Duration::ZERO)
    }

    /// Play a specific track of a playlist, continuing in order from there.
    pub fn play_track(&mut self, store: &PlaylistStore, id: PlaylistId, track: usize) -> Result<PlayerStatus> {
        if !self.prepare_order(store, id)? {
            return Err(AffirmError::TrackNotFound { playlist: id, index: track });
        }
        let found = self.order.as_mut().and_then(|order| order.seek_track(track));
        if found.is_none() {
            return Err(AffirmError::TrackNotFound { playlist: id, index: track });
        }
        self.start_current(store, Duration::ZERO)
    }

    /// Manual skip forward.
    pub fn next(&mut self, store: &PlaylistStore) -> Result<PlayerStatus> {
        match self.order.as_mut().and_then(PlaybackOrder::next) {
            Some(_) => self.start_current(store, Duration::ZERO),
            None => Ok(PlayerStatus::Idle),
        }
    }

    /// Manual skip back.
    pub fn previous(&mut self, store: &PlaylistStore) -> Result<PlayerStatus> {
        match self.order.as_mut().and_then(PlaybackOrder::previous) {
            Some(_) => self.start_current(store, Duration::ZERO),
            None => Ok(PlayerStatus::Idle),
        }
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Flip shuffle. If a track is playing it keeps playing from the same
    /// offset, now at its position in the new order.
    pub fn toggle_shuffle(&mut self, store: &PlaylistStore) -> Result<bool> {
        self.shuffled = !self.shuffled;
        let Some(order) = self.order.as_mut() else {
            return Ok(self.shuffled);
        };

        let was_playing = self.session.is_playing();
        let elapsed = self.session.position().unwrap_or_default();
        if order.is_shuffled() != self.shuffled {
            order.toggle_shuffle(&mut self.rng);
        }

        if was_playing {
            debug!("Resuming at {elapsed:?} after shuffle change");
            self.start_current(store, elapsed)?;
        }
        Ok(self.shuffled)
    }

    /// Drain session events: advance on natural end, stop on failure.
    pub fn handle_events(&mut self, store: &PlaylistStore) -> Vec<PlayerNotice> {
        let mut notices = Vec::new();
        let Some(playlist) = self.playlist else {
            self.session.poll_events();
            return notices;
        };

        for event in self.session.poll_events() {
            match event.kind {
                SessionEventKind::Ended => {
                    if self.session.current_session() != Some(event.session) {
                        // a second end for a track we already moved past
                        continue;
                    }
                    let next = self.order.as_mut().and_then(PlaybackOrder::advance);
                    match next {
                        Some(track) => match self.start_current(store, Duration::ZERO) {
                            Ok(_) => notices.push(PlayerNotice::TrackStarted {
                                playlist,
                                track,
                                name: self.session.current_track().map(|t| t.name.clone()).unwrap_or_default(),
                            }),
                            Err(err) => notices.push(PlayerNotice::Failed {
                                playlist,
                                reason: err.to_string(),
                            }),
                        },
                        None => {
                            info!("Playlist {playlist} finished");
                            self.session.stop();
                            notices.push(PlayerNotice::Finished { playlist });
                        }
                    }
                }
                SessionEventKind::Failed(reason) => {
                    // the session has already released the track
                    notices.push(PlayerNotice::Failed { playlist, reason });
                }
            }
        }
        notices
    }

    /// Make sure an order exists for `id` with the playlist's current size.
    /// Returns false for an empty playlist.
    fn prepare_order(&mut self, store: &PlaylistStore, id: PlaylistId) -> Result<bool> {
        let len = store.get(id)?.len();
        if len == 0 {
            debug!("Playlist {id} is empty, nothing to play");
            return Ok(false);
        }

        let reusable = self.playlist == Some(id)
            && self
                .order
                .as_ref()
                .is_some_and(|o| o.len() == len && o.is_shuffled() == self.shuffled);
        if !reusable {
            self.order = Some(PlaybackOrder::new(len, self.shuffled, self.looping, &mut self.rng));
            self.playlist = Some(id);
        }
        Ok(true)
    }

    fn start_current(&mut self, store: &PlaylistStore, offset: Duration) -> Result<PlayerStatus> {
        let (Some(playlist), Some(order)) = (self.playlist, self.order.as_ref()) else {
            return Ok(PlayerStatus::Idle);
        };
        let Some(index) = order.current_track() else {
            return Ok(PlayerStatus::Idle);
        };
        let position = order.position();

        let track = match store.get(playlist).and_then(|p| {
            p.tracks
                .get(index)
                .cloned()
                .ok_or(AffirmError::TrackNotFound { playlist, index })
        }) {
            Ok(track) => track,
            Err(err) => {
                warn!("Cannot continue playlist {playlist}: {err}");
                self.session.stop();
                return Err(err);
            }
        };

        self.session.play_from(&track, offset)?;
        Ok(PlayerStatus::Playing {
            playlist,
            track: index,
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{SimulatedHandle, SimulatedOutput};
    use crate::playlist::Track;

    fn player() -> (Player, SimulatedHandle) {
        let output = SimulatedOutput::new();
        let handle = output.handle();
        let session = AudioSession::new(Box::new(output));
        (Player::with_rng(session, StdRng::seed_from_u64(17)), handle)
    }

    fn store(tracks: usize) -> (PlaylistStore, PlaylistId) {
        let mut store = PlaylistStore::new();
        let id = store.playlists()[0].id;
        for i in 0..tracks {
            store.add_track(id, Track::new(format!("t{i}"), format!("t{i}.wav"))).unwrap();
        }
        (store, id)
    }

    #[test]
    fn test_empty_playlist_is_noop() {
        let (mut player, handle) = player();
        let (store, id) = store(0);

        assert_eq!(player.play_playlist(&store, id).unwrap(), PlayerStatus::Idle);
        assert!(handle.log().is_empty());
    }

    #[test]
    fn test_empty_playlist_leaves_current_playback_alone() {
        let (mut player, handle) = player();
        let (mut store, full) = store(2);
        let empty = store.create("Empty");

        player.play_playlist(&store, full).unwrap();
        let before = player.status();
        let status = player.play_playlist(&store, empty).unwrap();

        assert_eq!(status, before);
        assert_eq!(player.status(), before);
        assert_eq!(handle.live_resources(), vec!["t0".to_string()]);
        assert!(!handle.was_released("t0"));

        handle.finish("t0");
        let notices = player.handle_events(&store);
        assert!(matches!(&notices[0], PlayerNotice::TrackStarted { track: 1, .. }));
    }

    #[test]
    fn test_set_shuffled_while_playing_keeps_advancing() {
        let (mut player, handle) = player();
        let (store, id) = store(8);

        player.play_playlist(&store, id).unwrap();
        player.set_shuffled(&store, true).unwrap();

        let order = player.order().unwrap();
        assert!(order.is_shuffled());
        assert_eq!(player.session().current_track().unwrap().name, "t0");
        let expected = order.indices().get(order.position() + 1).copied();

        handle.finish("t0");
        let notices = player.handle_events(&store);
        match expected {
            Some(next) => {
                assert!(matches!(&notices[0], PlayerNotice::TrackStarted { track, .. } if *track == next));
            }
            None => assert_eq!(notices, vec![PlayerNotice::Finished { playlist: id }]),
        }
    }

    #[test]
    fn test_set_shuffled_while_stopped_rebuilds_later() {
        let (mut player, _handle) = player();
        let (store, id) = store(3);

        player.set_shuffled(&store, true).unwrap();
        assert!(player.order().is_none());
        player.play_playlist(&store, id).unwrap();
        assert!(player.order().unwrap().is_shuffled());
    }

    #[test]
    fn test_sequential_playback_stops_at_end() {
        let (mut player, handle) = player();
        let (store, id) = store(3);

        let status = player.play_playlist(&store, id).unwrap();
        assert_eq!(status, PlayerStatus::Playing { playlist: id, track: 0, position: 0 });

        handle.finish("t0");
        handle.finish("t0");
        let notices = player.handle_events(&store);
        assert_eq!(notices.len(), 1, "the duplicate end of t0 must be ignored");

        handle.finish("t1");
        player.handle_events(&store);
        handle.finish("t2");
        let notices = player.handle_events(&store);

        assert_eq!(notices, vec![PlayerNotice::Finished { playlist: id }]);
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert!(handle.live_resources().is_empty());
    }

    #[test]
    fn test_looping_wraps_to_start() {
        let (mut player, handle) = player();
        let (store, id) = store(2);
        player.set_looping(true);

        player.play_playlist(&store, id).unwrap();
        handle.finish("t0");
        player.handle_events(&store);
        handle.finish("t1");
        let notices = player.handle_events(&store);

        assert!(matches!(&notices[0], PlayerNotice::TrackStarted { track: 0, .. }));
        assert_eq!(handle.live_resources(), vec!["t0".to_string()]);
    }

    #[test]
    fn test_failure_stops_and_reports() {
        let (mut player, handle) = player();
        let (store, id) = store(3);

        player.play_playlist(&store, id).unwrap();
        handle.fail("t0", "corrupt header");
        let notices = player.handle_events(&store);

        assert_eq!(
            notices,
            vec![PlayerNotice::Failed { playlist: id, reason: "corrupt header".into() }]
        );
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert!(handle.live_resources().is_empty());
    }

    #[test]
    fn test_unplayable_next_track_is_reported() {
        let (mut player, handle) = player();
        let (store, id) = store(2);
        handle.fail_open("t1.wav");

        player.play_playlist(&store, id).unwrap();
        handle.finish("t0");
        let notices = player.handle_events(&store);

        assert!(matches!(&notices[0], PlayerNotice::Failed { .. }));
        assert!(!player.session().is_playing());
        assert!(handle.live_resources().is_empty());
    }

    #[test]
    fn test_toggle_shuffle_resumes_same_track_and_offset() {
        let (mut player, handle) = player();
        let (store, id) = store(8);

        player.play_track(&store, id, 5).unwrap();
        handle.set_position("t5", Duration::from_secs(42));

        assert!(player.toggle_shuffle(&store).unwrap());
        match player.status() {
            PlayerStatus::Playing { track, position, .. } => {
                assert_eq!(track, 5);
                assert_eq!(player.order().unwrap().indices()[position], 5);
            }
            PlayerStatus::Idle => panic!("player should still be playing"),
        }
        assert_eq!(handle.started_at("t5"), Some(Duration::from_secs(42)));
        assert_eq!(handle.live_resources(), vec!["t5".to_string()]);

        assert!(!player.toggle_shuffle(&store).unwrap());
        assert_eq!(player.order().unwrap().indices(), (0..8).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_toggle_shuffle_while_stopped_does_not_play() {
        let (mut player, handle) = player();
        let (store, id) = store(3);

        player.play_playlist(&store, id).unwrap();
        player.stop();
        player.toggle_shuffle(&store).unwrap();

        assert_eq!(player.status(), PlayerStatus::Idle);
        assert_eq!(handle.start_count("t0"), 1);
    }

    #[test]
    fn test_order_rebuilt_when_playlist_grows() {
        let (mut player, _handle) = player();
        let (mut store, id) = store(2);

        player.play_playlist(&store, id).unwrap();
        store.add_track(id, Track::new("t2", "t2.wav")).unwrap();
        player.play_playlist(&store, id).unwrap();

        assert_eq!(player.order().unwrap().len(), 3);
    }

    #[test]
    fn test_manual_skips() {
        let (mut player, _handle) = player();
        let (store, id) = store(3);

        player.play_playlist(&store, id).unwrap();
        assert!(matches!(player.previous(&store).unwrap(), PlayerStatus::Playing { track: 2, .. }));
        assert!(matches!(player.next(&store).unwrap(), PlayerStatus::Playing { track: 0, .. }));
    }

    #[test]
    fn test_removed_track_stops_playback() {
        let (mut player, handle) = player();
        let (mut store, id) = store(2);

        player.play_playlist(&store, id).unwrap();
        store.remove_track(id, 1).unwrap();
        handle.finish("t0");
        let notices = player.handle_events(&store);

        assert!(matches!(&notices[0], PlayerNotice::Failed { .. }));
        assert_eq!(player.status(), PlayerStatus::Idle);
    }

    #[test]
    fn test_play_track_out_of_range() {
        let (mut player, _handle) = player();
        let (store, id) = store(2);

        let err = player.play_track(&store, id, 9).unwrap_err();
        assert!(matches!(err, AffirmError::TrackNotFound { index: 9, .. }));
    }
}
