//! Injected clock capability.
//!
//! The engine and the hold supervisor only read time through this trait, so
//! expiry and heartbeat tests can drive a [`MockClock`] instead of sleeping
//! in real time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};

/// Source of "now" and of single-shot timers.
pub trait Clock: Send + Sync {
    /// Current instant, always in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Single-shot timer: the returned channel delivers one message once
    /// `after` has elapsed.
    fn after(&self, after: Duration) -> Receiver<Instant>;
}

/// Wall clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, after: Duration) -> Receiver<Instant> {
        crossbeam_channel::after(after)
    }
}

/// Deterministic clock for tests.
///
/// Time only moves when [`MockClock::advance`] is called; advancing fires
/// every timer whose deadline has been reached. Clones share the same
/// underlying time.
#[derive(Clone)]
pub struct MockClock {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    now: DateTime<Utc>,
    timers: Vec<(DateTime<Utc>, Sender<Instant>)>,
}

impl MockClock {
    /// A mock clock starting at 2000-01-01T00:00:00Z.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .single()
            .expect("valid mock epoch");
        Self::starting_at(start)
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                now: start,
                timers: Vec::new(),
            })),
        }
    }

    /// Moves time forward and fires every timer whose deadline has passed.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now = state.now + chrono::Duration::from_std(by).expect("advance duration out of range");
        let now = state.now;
        state.timers.retain(|(deadline, tx)| {
            if *deadline <= now {
                let _ = tx.try_send(Instant::now());
                false
            } else {
                true
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn after(&self, after: Duration) -> Receiver<Instant> {
        let (tx, rx) = bounded(1);
        let mut state = self.lock();
        let deadline = state.now + chrono::Duration::from_std(after).expect("timer duration out of range");
        state.timers.push((deadline, tx));
        rx
    }
}
