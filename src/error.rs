//! Error types for statewatch.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific error conditions and provides clear error messages.

use thiserror::Error;

use crate::subscription::SubscriptionId;

/// Validation errors that occur during input or construction-time validation.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Observer id cannot be empty")]
    EmptyObserver,

    #[error("Subscription target cannot be empty")]
    EmptyTarget,

    #[error("{field} must be greater than zero")]
    NonPositiveInterval { field: &'static str },

    #[error("Maximum batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("Maximum subscriptions per observer must be greater than zero")]
    ZeroSubscriptionLimit,

    #[error("Application handle is required")]
    MissingAppHandle,
}

/// State errors from subscription bookkeeping.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Observer '{observer}' has no active subscriptions")]
    NoSubscriptions { observer: String },

    #[error("Subscription {id} not found for observer '{observer}'")]
    NotFound {
        observer: String,
        id: SubscriptionId,
    },

    #[error("Observer '{observer}' already has a subscription for '{target}' with an equal filter")]
    Duplicate { observer: String, target: String },

    #[error("Observer '{observer}' reached the subscription limit of {limit}")]
    LimitExceeded { observer: String, limit: usize },
}

/// Initialization errors from hooking into the instrumented application.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("Introspection collector is not available; the application was built without introspection")]
    CollectorUnavailable,
}

/// Top-level error type for statewatch.
///
/// This enum encompasses all possible errors the notification pipeline can
/// return. Silent drops (no delivery handler installed, throttled sends) are
/// not errors and are only observable through the drop counters.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    #[error("Internal error: {message}")]
    Internal {
        /// Description of the unexpected condition.
        message: String,
    },
}

impl WatchError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a subscription state error.
    #[must_use]
    pub const fn is_subscription(&self) -> bool {
        matches!(self, Self::Subscription(_))
    }

    /// Returns true if this is an initialization error.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self, Self::Init(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for statewatch operations.
pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_message_names_field() {
        let err = ValidationError::NonPositiveInterval {
            field: "flush_interval",
        };
        let msg = format!("{err}");
        assert!(msg.contains("flush_interval"));
        assert!(msg.contains("greater than zero"));
    }

    #[test]
    fn limit_error_names_limit() {
        let err = SubscriptionError::LimitExceeded {
            observer: "client-1".to_string(),
            limit: 100,
        };
        let msg = format!("{err}");
        assert!(msg.contains("client-1"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn watch_error_from_validation() {
        let err: WatchError = ValidationError::EmptyObserver.into();
        assert!(err.is_validation());
        assert!(!err.is_subscription());
    }

    #[test]
    fn watch_error_from_subscription() {
        let err: WatchError = SubscriptionError::NoSubscriptions {
            observer: "o".to_string(),
        }
        .into();
        assert!(err.is_subscription());
    }

    #[test]
    fn watch_error_from_init() {
        let err: WatchError = InitError::CollectorUnavailable.into();
        assert!(err.is_init());
        let msg = format!("{err}");
        assert!(msg.contains("collector"));
    }

    #[test]
    fn watch_error_internal() {
        let err = WatchError::internal("unexpected state");
        assert!(err.is_internal());
        let msg = format!("{err}");
        assert!(msg.contains("unexpected state"));
    }
}
