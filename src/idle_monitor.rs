//! Timestamp-based liveness checker.
//!
//! Every data-link arbiter in this crate (the advertisement arbiter, the
//! probe status watchdog, the instant-read filter) needs the same primitive:
//! "touch me when data arrives, ask me later whether I've gone quiet". This
//! is that primitive, kept deliberately tiny so it can be embedded by value
//! wherever a timeout decision is needed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks the time of the last `touch()` and answers `is_idle()` queries
/// against a caller-supplied timeout.
///
/// Initial state is idle (as if touched at the beginning of time), so a
/// monitor that has never been touched reports idle for any timeout.
///
/// `touch()` and `is_idle()` are each a single atomic operation, so a
/// monitor can be touched from one task while polled from another without
/// external locking.
#[derive(Debug)]
pub struct IdleMonitor {
    epoch: Instant,
    last_touch_millis: AtomicU64,
}

impl IdleMonitor {
    /// The monitor is considered idle "since forever" until first touched.
    const NEVER: u64 = 0;

    /// Create a new monitor in the idle state.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_touch_millis: AtomicU64::new(Self::NEVER),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        let millis = self.epoch.elapsed().as_millis() as u64;
        // Never store NEVER from a real touch; saturate instead of wrapping to 0.
        self.last_touch_millis
            .store(millis.max(1), Ordering::Release);
    }

    /// Returns true iff no `touch()` has been observed within `timeout`.
    ///
    /// A monitor that has never been touched is always idle.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        let last = self.last_touch_millis.load(Ordering::Acquire);
        if last == Self::NEVER {
            return true;
        }
        let elapsed = self.epoch.elapsed().as_millis() as u64 - last;
        elapsed >= timeout.as_millis() as u64
    }

    /// Milliseconds since the last touch, or `None` if never touched.
    pub fn idle_for(&self) -> Option<Duration> {
        let last = self.last_touch_millis.load(Ordering::Acquire);
        if last == Self::NEVER {
            return None;
        }
        let elapsed_millis = self.epoch.elapsed().as_millis() as u64 - last;
        Some(Duration::from_millis(elapsed_millis))
    }
}

impl Default for IdleMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for IdleMonitor {
    fn clone(&self) -> Self {
        Self {
            epoch: self.epoch,
            last_touch_millis: AtomicU64::new(self.last_touch_millis.load(Ordering::Acquire)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn new_monitor_is_idle() {
        let monitor = IdleMonitor::new();
        assert!(monitor.is_idle(Duration::from_millis(0)));
        assert!(monitor.is_idle(Duration::from_secs(3600)));
        assert_eq!(monitor.idle_for(), None);
    }

    #[test]
    fn touch_resets_idle() {
        let monitor = IdleMonitor::new();
        monitor.touch();
        assert!(!monitor.is_idle(Duration::from_secs(60)));
        assert!(monitor.idle_for().unwrap() < Duration::from_millis(50));
    }

    #[test]
    fn is_idle_after_timeout_elapses() {
        let monitor = IdleMonitor::new();
        monitor.touch();
        sleep(Duration::from_millis(30));
        assert!(monitor.is_idle(Duration::from_millis(10)));
        assert!(!monitor.is_idle(Duration::from_secs(60)));
    }

    #[test]
    fn repeated_touch_keeps_it_alive() {
        let monitor = IdleMonitor::new();
        for _ in 0..3 {
            monitor.touch();
            sleep(Duration::from_millis(10));
            assert!(!monitor.is_idle(Duration::from_millis(100)));
        }
    }
}
