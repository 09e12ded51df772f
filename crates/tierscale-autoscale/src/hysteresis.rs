//! Hysteresis buffer: delays downscaling without slowing upscaling.
//!
//! Push every desired-count request; when applying a scale, ask
//! [`HysteresisBuffer::scale_to`] what to actually apply. Per tier, a
//! request at or above the current count is applied as-is. A request below
//! the current count is raised to the highest value that tier had anywhere
//! in the window, so a brief dip in backlog does not shrink capacity.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use tierscale_core::config::DEFAULT_WINDOW;
use tierscale_core::{Tier, TierCounts};

/// Bounded, oldest-first history of desired-count requests.
#[derive(Debug, Clone)]
pub struct HysteresisBuffer {
    requests: VecDeque<TierCounts>,
    capacity: NonZeroUsize,
}

impl HysteresisBuffer {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            requests: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Record the most recent request, evicting the oldest when full.
    pub fn push(&mut self, request: TierCounts) {
        if self.requests.len() == self.capacity.get() {
            self.requests.pop_front();
        }
        self.requests.push_back(request);
    }

    /// Counts to actually scale to, given the `current` applied counts.
    ///
    /// Returns `None` if nothing has been pushed yet.
    pub fn scale_to(&self, current: &TierCounts) -> Option<TierCounts> {
        let latest = *self.requests.back()?;
        let mut out = latest;
        for tier in Tier::ALL {
            if latest.get(tier) < current.get(tier) {
                out.set(tier, self.window_max(tier));
            }
        }
        Some(out)
    }

    /// Highest count requested for `tier` across the window.
    fn window_max(&self, tier: Tier) -> u32 {
        self.requests
            .iter()
            .map(|req| req.get(tier))
            .max()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Remembered requests, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TierCounts> {
        self.requests.iter()
    }
}

impl Default for HysteresisBuffer {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_WINDOW).unwrap_or(NonZeroUsize::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> HysteresisBuffer {
        HysteresisBuffer::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn fast(n: u32) -> TierCounts {
        TierCounts::new(0, n, 0)
    }

    #[test]
    fn default_capacity_is_eight() {
        assert_eq!(HysteresisBuffer::default().capacity(), 8);
    }

    #[test]
    fn empty_buffer_has_no_answer() {
        let buf = buffer(3);
        assert!(buf.is_empty());
        assert_eq!(buf.scale_to(&TierCounts::ZERO), None);
    }

    #[test]
    fn keeps_last_n_in_push_order() {
        let mut buf = buffer(3);
        for n in 1..=7 {
            buf.push(fast(n));
            assert!(buf.len() <= 3);
        }
        let kept: Vec<u32> = buf.iter().map(|c| c.fast).collect();
        assert_eq!(kept, [5, 6, 7]);
    }

    #[test]
    fn upscale_is_immediate() {
        let mut buf = buffer(4);
        buf.push(fast(50));
        buf.push(fast(10));
        buf.push(fast(12));
        // 12 >= current 10: applied as-is despite the older 50.
        assert_eq!(buf.scale_to(&fast(10)), Some(fast(12)));
        // Equal to current is not a downscale either.
        assert_eq!(buf.scale_to(&fast(12)), Some(fast(12)));
    }

    #[test]
    fn downscale_uses_window_max() {
        let mut buf = buffer(4);
        buf.push(fast(30));
        buf.push(fast(45));
        buf.push(fast(20));
        buf.push(fast(5));
        assert_eq!(buf.scale_to(&fast(40)), Some(fast(45)));
    }

    #[test]
    fn oldest_entry_counts_toward_the_max() {
        let mut buf = buffer(3);
        buf.push(fast(60));
        buf.push(fast(2));
        buf.push(fast(1));
        assert_eq!(buf.scale_to(&fast(10)), Some(fast(60)));

        // Once 60 is evicted the dip finally goes through.
        buf.push(fast(1));
        assert_eq!(buf.scale_to(&fast(10)), Some(fast(2)));
    }

    #[test]
    fn tiers_are_smoothed_independently() {
        let mut buf = buffer(4);
        buf.push(TierCounts::new(2, 40, 1));
        buf.push(TierCounts::new(1, 10, 30));

        let current = TierCounts::new(2, 20, 5);
        // base: down 2 -> 1, damped to 2. fast: down, damped to 40.
        // spot: up 5 -> 30, immediate.
        assert_eq!(buf.scale_to(&current), Some(TierCounts::new(2, 40, 30)));
    }

    #[test]
    fn damped_value_is_bounded_by_window() {
        let mut buf = buffer(5);
        let pushed = [7, 3, 9, 4, 2, 8, 1];
        for n in pushed {
            buf.push(fast(n));
        }
        let out = buf.scale_to(&fast(100)).unwrap().fast;
        let window_max = pushed[pushed.len() - 5..].iter().copied().max().unwrap();
        assert!(out >= 1);
        assert_eq!(out, window_max);
    }
}
