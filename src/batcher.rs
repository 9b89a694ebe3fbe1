//! Update batcher: per-observer buffering with timer- and size-triggered
//! flushing.
//!
//! One background thread drives interval flushes. Flushing always detaches an
//! observer's pending updates under the lock and invokes the handler with the
//! lock released, so a blocking handler cannot stall producers and an update
//! is delivered exactly once.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WatchError, WatchResult};
use crate::value::Value;

/// A notification queued for one observer, not yet delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// The observer this update is addressed to.
    pub observer: String,
    /// Resource category the update belongs to.
    pub resource: String,
    /// Structured notification payload.
    pub payload: BTreeMap<String, Value>,
    /// When the update entered the batcher.
    pub queued_at: DateTime<Utc>,
}

impl PendingUpdate {
    /// Creates an update stamped with the current time.
    #[must_use]
    pub fn new(
        observer: impl Into<String>,
        resource: impl Into<String>,
        payload: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            observer: observer.into(),
            resource: resource.into(),
            payload,
            queued_at: Utc::now(),
        }
    }
}

/// Callback invoked with an observer's drained updates, in insertion order.
pub type FlushHandler = Arc<dyn Fn(&str, Vec<PendingUpdate>) + Send + Sync>;

type PendingMap = HashMap<String, Vec<PendingUpdate>>;

#[derive(Default)]
struct BatcherShared {
    pending: Mutex<PendingMap>,
    handler: Mutex<Option<FlushHandler>>,
    dropped_updates: AtomicU64,
}

impl BatcherShared {
    fn lock_pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_handler(&self) -> Option<FlushHandler> {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hands a detached batch to the handler. No batcher lock is held here.
    fn deliver(&self, observer: &str, batch: Vec<PendingUpdate>) {
        match self.current_handler() {
            Some(handler) => handler(observer, batch),
            None => {
                // No consumer wired up: drop, by design.
                self.dropped_updates
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
            }
        }
    }

    fn flush_all(&self) {
        let drained: Vec<(String, Vec<PendingUpdate>)> =
            std::mem::take(&mut *self.lock_pending()).into_iter().collect();
        for (observer, batch) in drained {
            self.deliver(&observer, batch);
        }
    }
}

/// Batches outbound updates per observer.
///
/// Flushes happen on a fixed interval for all observers, and synchronously
/// for a single observer whose pending batch reaches the size limit.
pub struct UpdateBatcher {
    max_batch_size: usize,
    shared: Arc<BatcherShared>,
    shutdown_tx: Sender<()>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for UpdateBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateBatcher")
            .field("max_batch_size", &self.max_batch_size)
            .finish_non_exhaustive()
    }
}

impl UpdateBatcher {
    /// Starts a batcher and its background flush worker.
    ///
    /// `flush_interval` and `max_batch_size` are validated independently;
    /// either being zero is a construction error.
    pub fn new(flush_interval: Duration, max_batch_size: usize) -> WatchResult<Self> {
        if flush_interval.is_zero() {
            return Err(ValidationError::NonPositiveInterval {
                field: "flush_interval",
            }
            .into());
        }
        if max_batch_size == 0 {
            return Err(ValidationError::ZeroBatchSize.into());
        }

        let shared = Arc::new(BatcherShared::default());
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let worker_shared = Arc::clone(&shared);
        let join = thread::Builder::new()
            .name("statewatch-flush".to_string())
            .spawn(move || flush_loop(&worker_shared, flush_interval, &shutdown_rx))
            .map_err(|e| WatchError::internal(format!("failed to spawn flush worker: {e}")))?;

        Ok(Self {
            max_batch_size,
            shared,
            shutdown_tx,
            join: Mutex::new(Some(join)),
        })
    }

    /// Installs the delivery callback.
    ///
    /// Must be installed before traffic is expected; swapping it while
    /// updates are in flight routes each batch to whichever handler is
    /// current at delivery time.
    pub fn set_flush_handler(
        &self,
        handler: impl Fn(&str, Vec<PendingUpdate>) + Send + Sync + 'static,
    ) {
        *self
            .shared
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Appends an update to its observer's pending batch.
    ///
    /// Reaching the size limit triggers a synchronous flush for that observer
    /// only, within this call.
    pub fn add_update(&self, update: PendingUpdate) {
        let observer = update.observer.clone();
        let full_batch = {
            let mut pending = self.shared.lock_pending();
            let list = pending.entry(observer.clone()).or_default();
            list.push(update);
            if list.len() >= self.max_batch_size {
                pending.remove(&observer)
            } else {
                None
            }
        };

        if let Some(batch) = full_batch {
            self.shared.deliver(&observer, batch);
        }
    }

    /// Number of pending (unflushed) updates for an observer.
    #[must_use]
    pub fn pending_count(&self, observer: &str) -> usize {
        self.shared.lock_pending().get(observer).map_or(0, Vec::len)
    }

    /// Updates drained while no flush handler was installed.
    #[must_use]
    pub fn dropped_updates(&self) -> u64 {
        self.shared.dropped_updates.load(Ordering::Relaxed)
    }

    /// Stops the background worker and performs one final flush.
    ///
    /// Safe to call more than once and concurrently with in-flight
    /// `add_update` calls; updates added after the final drain may be lost
    /// (best-effort shutdown, not a strict barrier).
    pub fn stop(&self) {
        let _ = self.shutdown_tx.try_send(());
        let handle = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
            tracing::debug!("batcher flush worker stopped");
        }
        self.shared.flush_all();
    }
}

impl Drop for UpdateBatcher {
    fn drop(&mut self) {
        // Dropping the shutdown sender disconnects the channel; the worker
        // exits on its next tick. No join: callers wanting a final drain use
        // `stop`.
        let _ = self.shutdown_tx.try_send(());
    }
}

fn flush_loop(shared: &BatcherShared, interval: Duration, shutdown_rx: &Receiver<()>) {
    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => shared.flush_all(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
