//! Per-resource notification throttle.
//!
//! Independent of the batcher: the batcher bounds volume and latency, the
//! throttle bounds frequency per (observer, resource) pair. Callers use
//! either, both, or neither.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{ValidationError, WatchResult};

type WindowMap = HashMap<(String, String), Instant>;

/// Minimum-spacing gate keyed by (observer, resource).
#[derive(Debug)]
pub struct NotificationThrottle {
    min_interval: Duration,
    last_allowed: Mutex<WindowMap>,
    throttled: AtomicU64,
}

impl NotificationThrottle {
    /// Creates a throttle enforcing the given minimum spacing.
    pub fn new(min_interval: Duration) -> WatchResult<Self> {
        if min_interval.is_zero() {
            return Err(ValidationError::NonPositiveInterval {
                field: "min_interval",
            }
            .into());
        }
        Ok(Self {
            min_interval,
            last_allowed: Mutex::new(HashMap::new()),
            throttled: AtomicU64::new(0),
        })
    }

    /// Whether a send is currently allowed for this (observer, resource).
    ///
    /// The first call for a fresh pair is always allowed. A throttled call
    /// does not reset the window; only allowed calls record a new timestamp.
    pub fn should_send(&self, observer: &str, resource: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.lock_windows();
        match windows.get_mut(&(observer.to_string(), resource.to_string())) {
            Some(last) if now.duration_since(*last) < self.min_interval => {
                self.throttled.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(last) => {
                *last = now;
                true
            }
            None => {
                windows.insert((observer.to_string(), resource.to_string()), now);
                true
            }
        }
    }

    /// Forgets every recorded window for an observer.
    ///
    /// The next `should_send` for any resource on that observer is allowed
    /// regardless of elapsed time. Intended for reconnects.
    pub fn reset(&self, observer: &str) {
        self.lock_windows().retain(|(obs, _), _| obs != observer);
    }

    /// Number of sends suppressed so far.
    #[must_use]
    pub fn throttled_count(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    fn lock_windows(&self) -> MutexGuard<'_, WindowMap> {
        self.last_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
