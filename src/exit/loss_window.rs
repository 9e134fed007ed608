//! Debounce for stop-loss signals.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Time-pruned sequence of stop-loss breaches.
///
/// A breach is appended and the window pruned before it is counted. A tick
/// without a breach clears the window, so breaches must be contiguous in
/// evaluation order, not merely within `window` of each other.
#[derive(Debug, Clone)]
pub struct LossConfirmationWindow {
    events: VecDeque<DateTime<Utc>>,
    window: Duration,
    confirm_count: usize,
}

impl LossConfirmationWindow {
    pub fn new(window_secs: i64, confirm_count: usize) -> Self {
        Self {
            events: VecDeque::new(),
            window: Duration::seconds(window_secs),
            confirm_count,
        }
    }

    /// Record this tick's outcome and return the live breach count.
    pub fn observe(&mut self, breached: bool, now: DateTime<Utc>) -> usize {
        if !breached {
            self.events.clear();
            return 0;
        }

        // Keep the sequence time-ordered even if a snapshot arrives late.
        if self.events.back().map_or(true, |last| *last <= now) {
            self.events.push_back(now);
        }
        self.prune(now);
        self.events.len()
    }

    /// Whether `count` breaches are enough to confirm.
    pub fn is_reached(&self, count: usize) -> bool {
        count >= self.confirm_count
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.events.front() {
            if now - *oldest > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_breaches_reach_count() {
        let mut w = LossConfirmationWindow::new(3600, 3);
        let t0 = Utc::now();
        assert_eq!(w.observe(true, t0), 1);
        assert_eq!(w.observe(true, t0 + Duration::seconds(30)), 2);
        let n = w.observe(true, t0 + Duration::seconds(60));
        assert_eq!(n, 3);
        assert!(w.is_reached(n));
    }

    #[test]
    fn test_single_clean_tick_resets_progress() {
        let mut w = LossConfirmationWindow::new(3600, 3);
        let t0 = Utc::now();
        w.observe(true, t0);
        w.observe(true, t0 + Duration::seconds(30));
        assert_eq!(w.observe(false, t0 + Duration::seconds(60)), 0);
        assert_eq!(w.len(), 0);

        // Three breaches inside the hour, but not contiguous: no confirmation yet
        let n = w.observe(true, t0 + Duration::seconds(90));
        assert_eq!(n, 1);
        assert!(!w.is_reached(n));
    }

    #[test]
    fn test_old_breaches_are_pruned() {
        let mut w = LossConfirmationWindow::new(3600, 2);
        let t0 = Utc::now();
        w.observe(true, t0);
        let n = w.observe(true, t0 + Duration::seconds(3601));
        assert_eq!(n, 1);
        assert!(!w.is_reached(n));

        // Exactly at the window edge the older breach still counts
        let mut w = LossConfirmationWindow::new(3600, 2);
        w.observe(true, t0);
        assert_eq!(w.observe(true, t0 + Duration::seconds(3600)), 2);
    }

    #[test]
    fn test_reset_after_confirmation() {
        let mut w = LossConfirmationWindow::new(3600, 1);
        let n = w.observe(true, Utc::now());
        assert!(w.is_reached(n));
        w.reset();
        assert_eq!(w.len(), 0);
    }
}
