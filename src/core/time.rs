//! Injectable time sources
//!
//! Policy code never reads the system clock itself. Callers hand it a
//! `now` obtained from a [`TimeSource`], which in production is the
//! real clock and in tests a settable [`MockClock`].

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current (adjusted) time as unix seconds
pub trait TimeSource: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A shared clock that only moves when told to
///
/// Clones observe the same time, so a test can keep one handle and give
/// another to the node.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    time: Arc<AtomicI64>,
}

impl MockClock {
    pub fn new(time: i64) -> Self {
        Self {
            time: Arc::new(AtomicI64::new(time)),
        }
    }

    pub fn set(&self, time: i64) {
        self.time.store(time, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.time.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl TimeSource for MockClock {
    fn now(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }
}
