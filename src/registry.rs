//! Subscription registry: per-observer subscription bookkeeping.
//!
//! A single `RwLock` guards the whole mapping. Observers with zero
//! subscriptions have no entry, so the key set exactly reflects "observers
//! with at least one active subscription".

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{SubscriptionError, ValidationError, WatchResult};
use crate::subscription::{filters_equal, FilterMap, Subscription, SubscriptionId};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of active subscriptions per observer.
    pub max_subscriptions_per_observer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_subscriptions_per_observer: 100,
        }
    }
}

type SubscriptionMap = HashMap<String, Vec<Subscription>>;

/// Thread-safe subscription registry.
///
/// Safe under arbitrary concurrent invocation; all operations are short
/// critical sections and never call out into other components.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    cfg: RegistryConfig,
    subs: RwLock<SubscriptionMap>,
}

impl SubscriptionRegistry {
    /// Creates a registry with the given configuration.
    pub fn new(cfg: RegistryConfig) -> WatchResult<Self> {
        if cfg.max_subscriptions_per_observer == 0 {
            return Err(ValidationError::ZeroSubscriptionLimit.into());
        }
        Ok(Self {
            cfg,
            subs: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a registry with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            cfg: RegistryConfig::default(),
            subs: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new subscription and returns its id.
    ///
    /// Rejects empty observer/target ids, duplicate (target, filter) pairs
    /// for the same observer, and observers already at the configured limit.
    pub fn subscribe(
        &self,
        observer: &str,
        target: &str,
        filter: Option<FilterMap>,
    ) -> WatchResult<SubscriptionId> {
        if observer.trim().is_empty() {
            return Err(ValidationError::EmptyObserver.into());
        }
        if target.trim().is_empty() {
            return Err(ValidationError::EmptyTarget.into());
        }

        let mut map = self.write_map();
        if let Some(list) = map.get(observer) {
            let duplicate = list
                .iter()
                .any(|s| s.target == target && filters_equal(s.filter.as_ref(), filter.as_ref()));
            if duplicate {
                return Err(SubscriptionError::Duplicate {
                    observer: observer.to_string(),
                    target: target.to_string(),
                }
                .into());
            }
            if list.len() >= self.cfg.max_subscriptions_per_observer {
                return Err(SubscriptionError::LimitExceeded {
                    observer: observer.to_string(),
                    limit: self.cfg.max_subscriptions_per_observer,
                }
                .into());
            }
        }

        let sub = Subscription::new(observer, target, filter);
        let id = sub.id;
        map.entry(observer.to_string()).or_default().push(sub);
        Ok(id)
    }

    /// Removes one subscription.
    ///
    /// Removal may reorder the observer's remaining subscriptions. When the
    /// last subscription goes, the observer's entry goes with it.
    pub fn unsubscribe(&self, observer: &str, id: SubscriptionId) -> WatchResult<()> {
        let mut map = self.write_map();
        let Some(list) = map.get_mut(observer) else {
            return Err(SubscriptionError::NoSubscriptions {
                observer: observer.to_string(),
            }
            .into());
        };
        let Some(pos) = list.iter().position(|s| s.id == id) else {
            return Err(SubscriptionError::NotFound {
                observer: observer.to_string(),
                id,
            }
            .into());
        };

        list.swap_remove(pos);
        if list.is_empty() {
            map.remove(observer);
        }
        Ok(())
    }

    /// Removes every subscription for an observer in one step.
    ///
    /// Intended for disconnect cleanup.
    pub fn unsubscribe_all(&self, observer: &str) -> WatchResult<()> {
        let mut map = self.write_map();
        if map.remove(observer).is_none() {
            return Err(SubscriptionError::NoSubscriptions {
                observer: observer.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Returns a defensive copy of an observer's subscriptions.
    ///
    /// Empty (never "missing") for unknown observers; callers may mutate the
    /// result freely.
    #[must_use]
    pub fn subscriptions(&self, observer: &str) -> Vec<Subscription> {
        self.read_map().get(observer).cloned().unwrap_or_default()
    }

    /// Returns a defensive copy of every active subscription.
    ///
    /// Used by the change detector to match incoming changes.
    #[must_use]
    pub fn all_subscriptions(&self) -> Vec<Subscription> {
        self.read_map().values().flatten().cloned().collect()
    }

    /// Number of active subscriptions for an observer; zero when unknown.
    #[must_use]
    pub fn subscription_count(&self, observer: &str) -> usize {
        self.read_map().get(observer).map_or(0, Vec::len)
    }

    /// Number of observers with at least one active subscription.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.read_map().len()
    }

    /// Total number of active subscriptions across all observers.
    #[must_use]
    pub fn total_subscription_count(&self) -> usize {
        self.read_map().values().map(Vec::len).sum()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, SubscriptionMap> {
        self.subs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, SubscriptionMap> {
        self.subs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
