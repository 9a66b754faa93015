//! # Playback Order
//!
//! Decides which track of a playlist plays next. The order is a permutation of
//! track indices: the identity when sequential, a Fisher–Yates shuffle when
//! shuffled. It is ephemeral and rebuilt whenever shuffle is toggled or the
//! playlist size changed by the time playback starts.

use log::{debug, trace};
use rand::Rng;

/// Shuffle `items` in place.
///
/// Walks `i` from the last index down to 1 and swaps with a uniform `j` in
/// `0..=i`, so each of the `n!` permutations is equally likely.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Identity permutation of `0..len`, shuffled when `shuffled` is set.
#[must_use]
pub fn compute_order<R: Rng + ?Sized>(len: usize, shuffled: bool, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    if shuffled {
        fisher_yates(&mut order, rng);
    }
    trace!("Computed playback order {order:?} (shuffled: {shuffled})");
    order
}

/// Position within a playlist's playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackOrder {
    order: Vec<usize>,
    position: usize,
    shuffled: bool,
    looping: bool,
}

impl PlaybackOrder {
    pub fn new<R: Rng + ?Sized>(len: usize, shuffled: bool, looping: bool, rng: &mut R) -> Self {
        Self {
            order: compute_order(len, shuffled, rng),
            position: 0,
            shuffled,
            looping,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn indices(&self) -> &[usize] {
        &self.order
    }

    /// Track index at the current position, `None` for an empty playlist.
    #[must_use]
    pub fn current_track(&self) -> Option<usize> {
        self.order.get(self.position).copied()
    }

    /// Jump to the position holding `track`.
    pub fn seek_track(&mut self, track: usize) -> Option<usize> {
        let position = self.order.iter().position(|&t| t == track)?;
        self.position = position;
        Some(position)
    }

    /// Step after a track ended on its own.
    ///
    /// Returns the next track index, or `None` when the end of the order was
    /// reached with looping off. The position is left untouched in that case.
    pub fn advance(&mut self) -> Option<usize> {
        if self.order.is_empty() {
            return None;
        }
        let next = (self.position + 1) % self.order.len();
        if next == 0 && !self.looping {
            debug!("Reached end of playback order, loop is off");
            return None;
        }
        self.position = next;
        self.current_track()
    }

    /// Manual skip forward; always wraps.
    pub fn next(&mut self) -> Option<usize> {
        if self.order.is_empty() {
            return None;
        }
        self.position = (self.position + 1) % self.order.len();
        self.current_track()
    }

    /// Manual skip back; always wraps.
    pub fn previous(&mut self) -> Option<usize> {
        if self.order.is_empty() {
            return None;
        }
        self.position = (self.position + self.order.len() - 1) % self.order.len();
        self.current_track()
    }

    /// Flip shuffle and rebuild the order, keeping the current track current.
    ///
    /// Returns the new position of the track that was playing.
    pub fn toggle_shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let playing = self.current_track();
        self.shuffled = !self.shuffled;
        self.order = compute_order(self.order.len(), self.shuffled, rng);
        self.position = 0;
        if let Some(track) = playing {
            self.seek_track(track);
        }
        debug!("Shuffle {} at position {}", if self.shuffled { "on" } else { "off" }, self.position);
        self.position
    }

    /// Back to the first position without reshuffling.
    pub fn restart(&mut self) {
        self.position = 0;
    }

    /// Rebuild for a playlist whose size changed, restarting from the top.
    pub fn reset<R: Rng + ?Sized>(&mut self, len: usize, rng: &mut R) {
        self.order = compute_order(len, self.shuffled, rng);
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_sequential_order_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(compute_order(5, false, &mut rng), vec![0, 1, 2, 3, 4]);
        assert!(compute_order(0, true, &mut rng).is_empty());
    }

    #[test]
    fn test_shuffled_order_is_permutation() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut order = compute_order(50, true, &mut rng);
        order.sort_unstable();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_fisher_yates_is_uniform() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 10_000;
        let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();

        for _ in 0..trials {
            *counts.entry(compute_order(4, true, &mut rng)).or_default() += 1;
        }

        assert_eq!(counts.len(), 24, "every permutation of 4 should appear");
        let expected = trials as f64 / 24.0;
        for (perm, count) in &counts {
            let deviation = (*count as f64 - expected).abs();
            // ~5 standard deviations for a binomial(10000, 1/24)
            assert!(deviation < 100.0, "{perm:?} seen {count} times, expected ~{expected:.0}");
        }
    }

    #[test]
    fn test_advance_stops_without_loop() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut order = PlaybackOrder::new(3, false, false, &mut rng);

        assert_eq!(order.current_track(), Some(0));
        assert_eq!(order.advance(), Some(1));
        assert_eq!(order.advance(), Some(2));
        assert_eq!(order.advance(), None);
        assert_eq!(order.position(), 2);
    }

    #[test]
    fn test_advance_wraps_with_loop() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut order = PlaybackOrder::new(2, false, true, &mut rng);

        assert_eq!(order.advance(), Some(1));
        assert_eq!(order.advance(), Some(0));
        assert_eq!(order.advance(), Some(1));
    }

    #[test]
    fn test_single_track_loop() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut order = PlaybackOrder::new(1, false, true, &mut rng);
        assert_eq!(order.advance(), Some(0));

        order.set_looping(false);
        assert_eq!(order.advance(), None);
    }

    #[test]
    fn test_empty_order_is_inert() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut order = PlaybackOrder::new(0, true, true, &mut rng);

        assert!(order.is_empty());
        assert_eq!(order.current_track(), None);
        assert_eq!(order.advance(), None);
        assert_eq!(order.next(), None);
        assert_eq!(order.previous(), None);
    }

    #[test]
    fn test_manual_skips_wrap() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut order = PlaybackOrder::new(3, false, false, &mut rng);

        assert_eq!(order.previous(), Some(2));
        assert_eq!(order.next(), Some(0));
    }

    #[test]
    fn test_toggle_shuffle_keeps_current_track() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut order = PlaybackOrder::new(10, false, false, &mut rng);
        order.advance();
        order.advance();
        assert_eq!(order.current_track(), Some(2));

        let position = order.toggle_shuffle(&mut rng);
        assert!(order.is_shuffled());
        assert_eq!(order.indices()[position], 2);
        assert_eq!(order.current_track(), Some(2));

        let position = order.toggle_shuffle(&mut rng);
        assert!(!order.is_shuffled());
        assert_eq!(position, 2);
        assert_eq!(order.indices(), (0..10).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_reset_for_new_length() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut order = PlaybackOrder::new(2, false, false, &mut rng);
        order.advance();

        order.reset(4, &mut rng);
        assert_eq!(order.len(), 4);
        assert_eq!(order.position(), 0);
    }
}
