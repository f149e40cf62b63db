use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use shared::domain::Timestamp;

/// Wall-clock milliseconds that never repeat or go backwards within one process.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        let wall = Utc::now().timestamp_millis();
        let previous = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(wall.max(prev + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        Timestamp(wall.max(previous + 1))
    }

    /// The most recent timestamp handed out, if any.
    pub fn last_issued(&self) -> Option<Timestamp> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            millis => Some(Timestamp(millis)),
        }
    }
}
