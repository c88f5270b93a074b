//! Byte and wall-clock accounting for a session.

use crate::domain::entities::TransferSummary;
use std::time::{Duration, Instant};

/// Bytes written between `start()` and `stop()`.
#[derive(Debug, Default)]
pub struct ThroughputCounter {
    bytes: u64,
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl ThroughputCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.stopped = None;
    }

    pub fn stop(&mut self) {
        if self.started.is_some() && self.stopped.is_none() {
            self.stopped = Some(Instant::now());
        }
    }

    pub fn add_bytes(&mut self, n: u64) {
        self.bytes += n;
    }

    /// Elapsed time runs up to `stop()`, or to now while still running.
    pub fn summary(&self) -> TransferSummary {
        let elapsed = match (self.started, self.stopped) {
            (Some(s), Some(e)) => e.duration_since(s),
            (Some(s), None) => s.elapsed(),
            _ => Duration::ZERO,
        };
        TransferSummary {
            bytes: self.bytes,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_accumulate() {
        let mut c = ThroughputCounter::new();
        c.start();
        c.add_bytes(10);
        c.add_bytes(32);
        c.stop();
        assert_eq!(c.summary().bytes, 42);
    }

    #[test]
    fn test_elapsed_frozen_after_stop() {
        let mut c = ThroughputCounter::new();
        assert_eq!(c.summary().elapsed, Duration::ZERO);

        c.start();
        std::thread::sleep(Duration::from_millis(5));
        c.stop();
        let first = c.summary().elapsed;
        assert!(first >= Duration::from_millis(5));

        std::thread::sleep(Duration::from_millis(5));
        c.stop();
        assert_eq!(c.summary().elapsed, first);
    }
}
