//! Notifier seam between change detection and delivery.
//!
//! The change detector talks to a narrow `Notifier` interface instead of the
//! batcher's full surface. "No delivery configured yet" is a first-class
//! state: a counting no-op implementation is installed until the host wires
//! in a real dispatcher.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::batcher::{PendingUpdate, UpdateBatcher};
use crate::value::Value;

/// Write entry point for outbound notifications.
pub trait Notifier: Send + Sync {
    /// Queues a notification payload for one observer and resource.
    ///
    /// Must be fast and non-blocking; invoked from the instrumented
    /// application's own threads.
    fn queue_notification(&self, observer: &str, resource: &str, payload: BTreeMap<String, Value>);
}

/// Notifier installed until delivery is wired up. Counts what it discards.
#[derive(Debug, Default)]
pub struct NoopNotifier {
    dropped: AtomicU64,
}

impl NoopNotifier {
    /// Notifications discarded because no real notifier was installed.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Notifier for NoopNotifier {
    fn queue_notification(&self, _observer: &str, _resource: &str, _payload: BTreeMap<String, Value>) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Adapts queued notifications into batcher updates.
pub struct UpdateDispatcher {
    batcher: Arc<UpdateBatcher>,
}

impl UpdateDispatcher {
    /// Creates a dispatcher feeding the given batcher.
    #[must_use]
    pub fn new(batcher: Arc<UpdateBatcher>) -> Self {
        Self { batcher }
    }
}

impl Notifier for UpdateDispatcher {
    fn queue_notification(&self, observer: &str, resource: &str, payload: BTreeMap<String, Value>) {
        self.batcher
            .add_update(PendingUpdate::new(observer, resource, payload));
    }
}
