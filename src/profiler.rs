//! Lightweight frame-time instrumentation.

use crate::constants::{PERF_WINDOW, SLOW_FRAME_BUDGET};
use std::collections::{HashMap, VecDeque};

/// Rolling frame-time statistics plus named section timings.
#[derive(Debug, Clone, Default)]
pub struct PerfMonitor {
    frame_times: VecDeque<f32>,
    sections: HashMap<&'static str, f32>,
    slow_frames: u64,
}

impl PerfMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame duration in seconds.
    pub fn record_frame(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.frame_times.push_back(dt);
        if self.frame_times.len() > PERF_WINDOW {
            self.frame_times.pop_front();
        }
        if dt > SLOW_FRAME_BUDGET {
            self.slow_frames += 1;
            log::debug!("Slow frame: {:.1} ms", dt * 1000.0);
        }
    }

    /// Records the latest duration of a named section in seconds.
    pub fn record_section(&mut self, name: &'static str, seconds: f32) {
        self.sections.insert(name, seconds);
    }

    /// Latest duration of a named section.
    pub fn section(&self, name: &str) -> Option<f32> {
        self.sections.get(name).copied()
    }

    /// Mean frame time over the window.
    pub fn average_frame_time(&self) -> Option<f32> {
        if self.frame_times.is_empty() {
            None
        } else {
            Some(self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32)
        }
    }

    /// Frames per second derived from the mean frame time.
    pub fn fps(&self) -> Option<f32> {
        self.average_frame_time().map(|t| 1.0 / t)
    }

    /// Number of frames that exceeded the budget.
    pub fn slow_frames(&self) -> u64 {
        self.slow_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_bounded_and_averaged() {
        let mut perf = PerfMonitor::new();
        for _ in 0..(PERF_WINDOW + 50) {
            perf.record_frame(0.01);
        }
        assert!((perf.average_frame_time().unwrap() - 0.01).abs() < 1e-6);
        assert!((perf.fps().unwrap() - 100.0).abs() < 0.01);
    }

    #[test]
    fn slow_frames_are_counted_and_bad_samples_ignored() {
        let mut perf = PerfMonitor::new();
        perf.record_frame(0.2);
        perf.record_frame(f32::NAN);
        perf.record_frame(-1.0);
        assert_eq!(perf.slow_frames(), 1);
        perf.record_section("nodes", 0.004);
        assert_eq!(perf.section("nodes"), Some(0.004));
    }
}
