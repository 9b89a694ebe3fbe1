//! Change detector: bridges application change events to subscription
//! matching.
//!
//! The instrumented application invokes the six `ChangeListener` hooks on its
//! own threads, concurrently and reentrantly. Each hook does a lock-bounded
//! registry read, in-memory matching, and an enqueue through the notifier;
//! never any I/O.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{InitError, ValidationError, WatchResult};
use crate::notifier::{NoopNotifier, Notifier};
use crate::registry::SubscriptionRegistry;
use crate::subscription::Subscription;
use crate::value::Value;

/// The six change categories reported by the instrumentation hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCategory {
    /// A reactive value was mutated.
    RefChanged,
    /// A computed value was recalculated.
    ComputedRecalculated,
    /// A watcher callback fired.
    WatcherFired,
    /// A component entered the tree.
    ComponentMounted,
    /// A component left the tree.
    ComponentUnmounted,
    /// A component emitted an event.
    EventEmitted,
}

impl ChangeCategory {
    /// Hierarchical resource path subscriptions match against, by prefix.
    #[must_use]
    pub const fn resource_path(self) -> &'static str {
        match self {
            Self::RefChanged => "state/refs",
            Self::ComputedRecalculated => "state/computed",
            Self::WatcherFired => "state/watchers",
            Self::ComponentMounted => "components/mounted",
            Self::ComponentUnmounted => "components/unmounted",
            Self::EventEmitted => "events/emitted",
        }
    }
}

/// Listener interface for the application's introspection hooks.
///
/// All methods may be invoked concurrently on the application's own threads
/// and must not block.
pub trait ChangeListener: Send + Sync {
    /// A reactive value changed from `old_value` to `new_value`.
    fn ref_changed(&self, ref_id: &str, old_value: Value, new_value: Value);

    /// A computed value was recalculated. There is no known previous value.
    fn computed_recalculated(&self, computed_id: &str, new_value: Value, duration: Duration);

    /// A watcher fired with the given value. No known previous value.
    fn watcher_fired(&self, watcher_id: &str, value: Value);

    /// A component was mounted.
    fn component_mounted(&self, component_id: &str, name: &str);

    /// A component was unmounted.
    fn component_unmounted(&self, component_id: &str, name: &str);

    /// A component emitted an event carrying `data`.
    fn event_emitted(&self, event_name: &str, component_id: &str, data: Value);
}

/// Hook-registration point exposed by an introspection-enabled application.
pub trait Collector: Send + Sync {
    /// Registers a listener for all six change categories.
    fn add_listener(&self, listener: Arc<dyn ChangeListener>);
}

/// Handle to the instrumented application.
///
/// The collector is absent when the application was built without
/// introspection enabled; initialization reports that as a recoverable
/// error, never a panic.
pub struct AppHandle {
    collector: Option<Arc<dyn Collector>>,
}

impl AppHandle {
    /// Handle to an application with introspection enabled.
    #[must_use]
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self {
            collector: Some(collector),
        }
    }

    /// Handle to an application built without introspection.
    #[must_use]
    pub const fn without_introspection() -> Self {
        Self { collector: None }
    }

    /// The hook-registration point, when available.
    #[must_use]
    pub fn collector(&self) -> Option<&Arc<dyn Collector>> {
        self.collector.as_ref()
    }
}

/// Matches application changes against active subscriptions and forwards
/// hits to the notifier.
pub struct ChangeDetector {
    registry: Arc<SubscriptionRegistry>,
    noop: Arc<NoopNotifier>,
    notifier: RwLock<Arc<dyn Notifier>>,
    // Test seam: when set, detection matches against this fixed set instead
    // of the registry.
    override_subs: RwLock<Option<Vec<Subscription>>>,
}

impl ChangeDetector {
    /// Creates a detector reading subscriptions from the given registry.
    ///
    /// A counting no-op notifier is installed until [`set_notifier`] wires
    /// in delivery.
    ///
    /// [`set_notifier`]: ChangeDetector::set_notifier
    #[must_use]
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        let noop = Arc::new(NoopNotifier::default());
        let notifier: Arc<dyn Notifier> = Arc::clone(&noop) as Arc<dyn Notifier>;
        Self {
            registry,
            noop,
            notifier: RwLock::new(notifier),
            override_subs: RwLock::new(None),
        }
    }

    /// Hooks this detector into the instrumented application.
    ///
    /// Consumes an `Arc` clone of the detector: the caller keeps their own
    /// handle and passes one in for the collector to hold. Fails with a
    /// validation error when no handle is supplied, and with
    /// `CollectorUnavailable` when the application was built without
    /// introspection. On success the detector is registered as a listener
    /// for all six change categories.
    pub fn initialize(self: Arc<Self>, app: Option<&AppHandle>) -> WatchResult<()> {
        let Some(app) = app else {
            return Err(ValidationError::MissingAppHandle.into());
        };
        let Some(collector) = app.collector() else {
            return Err(InitError::CollectorUnavailable.into());
        };

        collector.add_listener(self as Arc<dyn ChangeListener>);
        tracing::debug!("change detector registered with introspection collector");
        Ok(())
    }

    /// Installs the notifier receiving matched changes.
    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        *self
            .notifier
            .write()
            .unwrap_or_else(PoisonError::into_inner) = notifier;
    }

    /// Replaces registry lookups with a fixed subscription set.
    ///
    /// Test seam: lets detection be driven without a live registry. The
    /// production path always reads the registry.
    pub fn override_subscriptions(&self, subs: Vec<Subscription>) {
        *self
            .override_subs
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(subs);
    }

    /// Notifications discarded while no real notifier was installed.
    #[must_use]
    pub fn dropped_notifications(&self) -> u64 {
        self.noop.dropped_count()
    }

    fn active_subscriptions(&self) -> Vec<Subscription> {
        if let Some(subs) = self
            .override_subs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return subs.clone();
        }
        self.registry.all_subscriptions()
    }

    fn current_notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(
            &self
                .notifier
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Core match-and-forward path shared by all six hooks.
    ///
    /// The summary carries the keys filters narrow on; the payload is the
    /// fuller body delivered to observers. The notification's resource is
    /// the subscription's target, not the concrete category path.
    fn dispatch(
        &self,
        category: ChangeCategory,
        summary: &BTreeMap<String, Value>,
        payload: &BTreeMap<String, Value>,
    ) {
        let path = category.resource_path();
        let notifier = self.current_notifier();
        for sub in self.active_subscriptions() {
            if !sub.covers(path) {
                continue;
            }
            if !sub.filter_accepts(summary) {
                continue;
            }
            notifier.queue_notification(&sub.observer, &sub.target, payload.clone());
        }
    }
}

fn entries(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

impl ChangeListener for ChangeDetector {
    fn ref_changed(&self, ref_id: &str, old_value: Value, new_value: Value) {
        let summary = entries(&[("ref_id", Value::from(ref_id))]);
        let payload = entries(&[
            ("ref_id", Value::from(ref_id)),
            ("old_value", old_value),
            ("new_value", new_value),
        ]);
        self.dispatch(ChangeCategory::RefChanged, &summary, &payload);
    }

    fn computed_recalculated(&self, computed_id: &str, new_value: Value, duration: Duration) {
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let summary = entries(&[("ref_id", Value::from(computed_id))]);
        let payload = entries(&[
            ("ref_id", Value::from(computed_id)),
            ("new_value", new_value),
            ("duration_ms", Value::Int(duration_ms)),
        ]);
        self.dispatch(ChangeCategory::ComputedRecalculated, &summary, &payload);
    }

    fn watcher_fired(&self, watcher_id: &str, value: Value) {
        let summary = entries(&[("ref_id", Value::from(watcher_id))]);
        let payload = entries(&[("ref_id", Value::from(watcher_id)), ("value", value)]);
        self.dispatch(ChangeCategory::WatcherFired, &summary, &payload);
    }

    fn component_mounted(&self, component_id: &str, name: &str) {
        let body = entries(&[
            ("component_id", Value::from(component_id)),
            ("component_name", Value::from(name)),
        ]);
        self.dispatch(ChangeCategory::ComponentMounted, &body, &body);
    }

    fn component_unmounted(&self, component_id: &str, name: &str) {
        let body = entries(&[
            ("component_id", Value::from(component_id)),
            ("component_name", Value::from(name)),
        ]);
        self.dispatch(ChangeCategory::ComponentUnmounted, &body, &body);
    }

    fn event_emitted(&self, event_name: &str, component_id: &str, data: Value) {
        let summary = entries(&[
            ("event_name", Value::from(event_name)),
            ("component_id", Value::from(component_id)),
        ]);
        let payload = entries(&[
            ("event_name", Value::from(event_name)),
            ("component_id", Value::from(component_id)),
            ("data", data),
        ]);
        self.dispatch(ChangeCategory::EventEmitted, &summary, &payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::subscription::FilterMap;

    /// Notifier that records everything it is handed.
    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<(String, String, BTreeMap<String, Value>)>>,
    }

    impl RecordingNotifier {
        fn seen(&self) -> Vec<(String, String, BTreeMap<String, Value>)> {
            self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn queue_notification(
            &self,
            observer: &str,
            resource: &str,
            payload: BTreeMap<String, Value>,
        ) {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((observer.to_string(), resource.to_string(), payload));
        }
    }

    fn filter_of(key: &str, value: Value) -> FilterMap {
        [(key.to_string(), value)].into_iter().collect()
    }

    fn detector_with_registry() -> (Arc<ChangeDetector>, Arc<SubscriptionRegistry>, Arc<RecordingNotifier>) {
        let registry = Arc::new(SubscriptionRegistry::with_defaults());
        let detector = Arc::new(ChangeDetector::new(Arc::clone(&registry)));
        let notifier = Arc::new(RecordingNotifier::default());
        detector.set_notifier(Arc::clone(&notifier) as Arc<dyn Notifier>);
        (detector, registry, notifier)
    }

    #[test]
    fn initialize_requires_a_handle() {
        let (detector, _, _) = detector_with_registry();
        let err = detector.initialize(None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn initialize_reports_missing_collector() {
        let (detector, _, _) = detector_with_registry();
        let app = AppHandle::without_introspection();
        let err = detector.initialize(Some(&app)).unwrap_err();
        assert!(err.is_init());
    }

    #[test]
    fn ref_change_matches_filtered_subscription() {
        let (detector, registry, notifier) = detector_with_registry();
        registry
            .subscribe("o", "state/refs", Some(filter_of("ref_id", Value::from("x"))))
            .unwrap();

        detector.ref_changed("x", Value::Int(1), Value::Int(2));
        detector.ref_changed("y", Value::Int(1), Value::Int(2));

        let seen = notifier.seen();
        assert_eq!(seen.len(), 1);
        let (observer, resource, payload) = &seen[0];
        assert_eq!(observer, "o");
        assert_eq!(resource, "state/refs");
        assert_eq!(payload.get("ref_id"), Some(&Value::from("x")));
        assert_eq!(payload.get("old_value"), Some(&Value::Int(1)));
        assert_eq!(payload.get("new_value"), Some(&Value::Int(2)));
    }

    #[test]
    fn unfiltered_subscription_matches_every_ref() {
        let (detector, registry, notifier) = detector_with_registry();
        registry.subscribe("o", "state/refs", None).unwrap();

        detector.ref_changed("x", Value::Null, Value::Int(1));
        detector.ref_changed("y", Value::Null, Value::Int(2));
        assert_eq!(notifier.seen().len(), 2);
    }

    #[test]
    fn prefix_subscription_covers_component_lifecycle() {
        let (detector, registry, notifier) = detector_with_registry();
        registry.subscribe("o", "components", None).unwrap();

        detector.component_mounted("c1", "Counter");
        detector.component_unmounted("c1", "Counter");
        detector.ref_changed("x", Value::Null, Value::Int(1));

        let seen = notifier.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, resource, _)| resource == "components"));
    }

    #[test]
    fn state_prefix_covers_refs_computed_and_watchers() {
        let (detector, registry, notifier) = detector_with_registry();
        registry.subscribe("o", "state", None).unwrap();

        detector.ref_changed("x", Value::Null, Value::Int(1));
        detector.computed_recalculated("total", Value::Int(3), Duration::from_millis(2));
        detector.watcher_fired("w", Value::Bool(true));
        detector.component_mounted("c1", "Counter");

        assert_eq!(notifier.seen().len(), 3);
    }

    #[test]
    fn event_filter_narrows_by_name() {
        let (detector, registry, notifier) = detector_with_registry();
        registry
            .subscribe("o", "events", Some(filter_of("event_name", Value::from("submit"))))
            .unwrap();

        detector.event_emitted("submit", "form-1", Value::Null);
        detector.event_emitted("input", "form-1", Value::Null);

        let seen = notifier.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].2.get("event_name"), Some(&Value::from("submit")));
    }

    #[test]
    fn computed_payload_carries_duration() {
        let (detector, registry, notifier) = detector_with_registry();
        registry.subscribe("o", "state/computed", None).unwrap();

        detector.computed_recalculated("total", Value::Int(7), Duration::from_millis(12));
        let seen = notifier.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].2.get("duration_ms"), Some(&Value::Int(12)));
    }

    #[test]
    fn without_notifier_detection_drops_silently() {
        let registry = Arc::new(SubscriptionRegistry::with_defaults());
        let detector = ChangeDetector::new(Arc::clone(&registry));
        registry.subscribe("o", "state/refs", None).unwrap();

        detector.ref_changed("x", Value::Null, Value::Int(1));
        assert_eq!(detector.dropped_notifications(), 1);
    }

    #[test]
    fn override_bypasses_registry() {
        let (detector, registry, notifier) = detector_with_registry();
        registry.subscribe("registry-observer", "state/refs", None).unwrap();

        detector.override_subscriptions(vec![Subscription::new(
            "seeded-observer",
            "state/refs",
            None,
        )]);
        detector.ref_changed("x", Value::Null, Value::Int(1));

        let seen = notifier.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "seeded-observer");
    }

    #[test]
    fn hooks_are_safe_under_concurrent_invocation() {
        let (detector, registry, notifier) = detector_with_registry();
        registry.subscribe("o", "state", None).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let detector = Arc::clone(&detector);
                scope.spawn(move || {
                    for i in 0..50 {
                        let id = format!("ref-{t}-{i}");
                        detector.ref_changed(&id, Value::Null, Value::Int(i));
                        detector.watcher_fired(&id, Value::Int(i));
                    }
                });
            }
        });

        assert_eq!(notifier.seen().len(), 400);
    }
}
