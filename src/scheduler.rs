//! Frame-level redraw coalescing.
//!
//! Many nodes can finish executing within the same frame. Instead of each one
//! asking for a repaint, display updates arm a single deadline owned by the
//! editor root; the deadline fires once per debounce window.

use crate::constants::REDRAW_DEBOUNCE;

/// Coalesces redraw requests that arrive within one debounce window.
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    window: f64,
    deadline: Option<f64>,
    fired: u64,
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new(REDRAW_DEBOUNCE)
    }
}

impl RedrawScheduler {
    /// Creates a scheduler with the given window in seconds.
    pub fn new(window: f64) -> Self {
        Self {
            window,
            deadline: None,
            fired: 0,
        }
    }

    /// Requests a redraw at time `now` (seconds). Requests made while a deadline is
    /// already armed are absorbed into it.
    pub fn request(&mut self, now: f64) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// Whether a redraw is armed but has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Seconds until the armed deadline, if any.
    pub fn time_until_due(&self, now: f64) -> Option<f64> {
        self.deadline.map(|d| (d - now).max(0.0))
    }

    /// Returns `true` exactly once when the armed deadline has passed.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.fired += 1;
                true
            }
            _ => false,
        }
    }

    /// Total number of coalesced redraws fired so far.
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Drops any pending request.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_requests_in_one_window_fire_once() {
        let mut scheduler = RedrawScheduler::default();
        let mut fired = 0;
        for i in 0..50 {
            let now = 10.0 + i as f64 * 0.0002;
            scheduler.request(now);
            if scheduler.poll(now) {
                fired += 1;
            }
        }
        // After the window elapses, exactly one redraw fires.
        for step in 0..10 {
            if scheduler.poll(10.02 + step as f64 * 0.001) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(scheduler.fired_count(), 1);
    }

    #[test]
    fn requests_after_firing_arm_a_new_window() {
        let mut scheduler = RedrawScheduler::new(0.016);
        scheduler.request(0.0);
        assert!(scheduler.poll(0.02));
        assert!(!scheduler.is_pending());
        scheduler.request(0.03);
        assert!(!scheduler.poll(0.04));
        assert!(scheduler.poll(0.05));
        assert_eq!(scheduler.fired_count(), 2);
    }

    #[test]
    fn cancel_drops_pending_request() {
        let mut scheduler = RedrawScheduler::default();
        scheduler.request(1.0);
        scheduler.cancel();
        assert!(!scheduler.poll(2.0));
        assert_eq!(scheduler.time_until_due(2.0), None);
    }
}
