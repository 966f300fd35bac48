use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

// Port for the game clock, in milliseconds since the game epoch.
pub trait Clock: Send {
    fn now_ms(&self) -> i64;

    /// Moves the epoch `ms` milliseconds into the past.
    fn rewind(&mut self, ms: i64);
}

#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
    rewound_ms: i64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            rewound_ms: 0,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64 + self.rewound_ms
    }

    fn rewind(&mut self, ms: i64) {
        self.rewound_ms += ms;
    }
}

/// Hand-driven clock for deterministic replays and tests.
///
/// Clones share the same time, so a test can keep one while the game owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
    rewound: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        let clock = Self::default();
        clock.set(start_ms);
        clock
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst) + self.rewound.load(Ordering::SeqCst)
    }

    fn rewind(&mut self, ms: i64) {
        self.rewound.fetch_add(ms, Ordering::SeqCst);
    }
}
