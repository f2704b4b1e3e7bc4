//! Time provider abstraction for testable time-dependent logic

#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Duration;

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Abstraction over clocks used by scan sessions
pub trait TimeProvider: Send + Sync {
    /// Monotonic time used for elapsed-time estimates
    fn now(&self) -> Instant;

    /// Wall-clock time used for session timestamps and identifiers
    fn system_time(&self) -> DateTime<Utc>;
}

/// Production time provider
///
/// Monotonic readings come from the tokio clock so that paused test runtimes
/// advance elapsed time together with their timers.
#[derive(Default, Clone, Debug)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn system_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock time provider for deterministic testing
#[derive(Clone)]
#[cfg(test)]
pub struct MockTimeProvider {
    current_instant: Arc<Mutex<Instant>>,
    current_system_time: Arc<Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl MockTimeProvider {
    /// Create a mock clock pinned to the given wall-clock time
    pub fn at(system_time: DateTime<Utc>) -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
            current_system_time: Arc::new(Mutex::new(system_time)),
        }
    }

    /// Advance both monotonic and wall-clock time by the given duration
    pub fn advance_time(&self, duration: Duration) {
        {
            let mut instant = self.current_instant.lock().unwrap();
            *instant += duration;
        }
        {
            let mut system_time = self.current_system_time.lock().unwrap();
            *system_time += chrono::Duration::from_std(duration).unwrap();
        }
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *self.current_instant.lock().unwrap()
    }

    fn system_time(&self) -> DateTime<Utc> {
        *self.current_system_time.lock().unwrap()
    }
}
