//! # statewatch - Change notifications for reactive-application introspection
//!
//! statewatch is the notification core of a debugging/introspection server:
//! remote observers (AI agents or tools) register interest in categories of
//! application state, state mutations are detected as they happen inside the
//! live application, and batched, rate-limited notifications are handed to a
//! transport-supplied delivery callback. The pipeline never blocks the
//! application it observes.
//!
//! ## Core Components
//!
//! - **[`SubscriptionRegistry`]**: per-observer subscription bookkeeping
//! - **[`ChangeDetector`]**: bridges instrumentation hooks to subscription matches
//! - **[`UpdateBatcher`]**: per-observer buffering with timer- and size-triggered flushes
//! - **[`NotificationThrottle`]**: minimum spacing per (observer, resource) pair
//! - **[`UpdateDispatcher`]**: the narrow write entry point between detection and batching
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use statewatch::{
//!     AppHandle, ChangeDetector, SubscriptionRegistry, UpdateBatcher, UpdateDispatcher,
//! };
//!
//! let registry = Arc::new(SubscriptionRegistry::with_defaults());
//! let batcher = Arc::new(UpdateBatcher::new(Duration::from_millis(250), 50)?);
//! batcher.set_flush_handler(|observer, updates| {
//!     // hand the batch to the live protocol session
//! });
//!
//! let detector = Arc::new(ChangeDetector::new(Arc::clone(&registry)));
//! detector.set_notifier(Arc::new(UpdateDispatcher::new(Arc::clone(&batcher))));
//! Arc::clone(&detector).initialize(Some(&app_handle))?;
//!
//! registry.subscribe("agent-1", "state/refs", None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batcher;
pub mod detector;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod subscription;
pub mod throttle;
pub mod value;

// Re-export primary types at crate root for convenience
pub use batcher::{FlushHandler, PendingUpdate, UpdateBatcher};
pub use detector::{AppHandle, ChangeCategory, ChangeDetector, ChangeListener, Collector};
pub use error::{InitError, SubscriptionError, ValidationError, WatchError, WatchResult};
pub use notifier::{NoopNotifier, Notifier, UpdateDispatcher};
pub use registry::{RegistryConfig, SubscriptionRegistry};
pub use subscription::{filter_matches, filters_equal, FilterMap, Subscription, SubscriptionId};
pub use throttle::NotificationThrottle;
pub use value::Value;
