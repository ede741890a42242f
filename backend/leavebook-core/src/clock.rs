// src/clock.rs
use chrono::{DateTime, Utc};
#[cfg(test)]
use chrono::{Duration, NaiveDateTime};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Source of "now" for id assignment and session expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct TestClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl TestClock {
    /// Accepts `"%Y-%m-%d %H:%M:%S"` in UTC.
    pub fn new(datetime_str: &str) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(parse_utc(datetime_str))),
        }
    }

    pub fn set_time(&self, datetime_str: &str) {
        *self.lock() = parse_utc(datetime_str);
    }

    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock only means a test panicked mid-update; the value is still usable.
        self.current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

#[cfg(test)]
fn parse_utc(datetime_str: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|e| panic!("Invalid TestClock datetime '{}': {}", datetime_str, e))
        .and_utc()
}
