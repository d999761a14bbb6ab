//! Error types for the Skiff operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Retryability drives the controller's error policy: retryable errors are
//! requeued with backoff, non-retryable errors wait for a spec change.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Skiff operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for a SkiffApp spec
    #[error("validation error for {app}: {message}")]
    Validation {
        /// Name of the app with invalid configuration
        app: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.resources.requests.cpu")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "ownership")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without app context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            app: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with app context
    pub fn validation_for(app: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            app: app.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with app context and field path
    pub fn validation_for_field(
        app: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            app: app.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and serialization errors are not retryable (require a spec
    /// fix). Kubernetes errors depend on the status code: optimistic-concurrency
    /// conflicts (409) are retryable, other 4xx errors are not, everything else
    /// (transport failures, timeouts, 5xx) is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) if ae.code == 409 => true,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) => false,
                _ => true,
            },
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Check if this error is a Kubernetes NotFound (404)
    ///
    /// Used by the reconciler to treat a record deleted mid-invocation as a
    /// successful no-op rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// Get the app name if this error is associated with a specific app
    pub fn app(&self) -> Option<&str> {
        match self {
            Error::Validation { app, .. } => Some(app),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> Error {
        Error::Kube {
            source: kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "test".to_string(),
                reason: "test".to_string(),
                code,
            }),
        }
    }

    /// Story: spec validation catches misconfigurations before any write
    ///
    /// When a user creates a SkiffApp with an invalid spec, the validation
    /// layer catches it with a clear message and the controller does not retry.
    #[test]
    fn story_validation_prevents_invalid_app() {
        let err = Error::validation("image must not be empty");
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("image must not be empty"));
        assert!(!err.is_retryable());

        let err = Error::validation_for("web", "port must be non-zero");
        assert!(err.to_string().contains("web"));
        assert_eq!(err.app(), Some("web"));

        let err = Error::validation_for_field("web", "spec.resources.requests.cpu", "bad quantity");
        match &err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("spec.resources.requests.cpu"));
            }
            _ => panic!("Expected Validation variant"),
        }
    }

    /// Story: optimistic-concurrency conflicts are retried, user errors are not
    ///
    /// A 409 means our read was stale; the next invocation re-reads and
    /// re-converges. Other 4xx codes mean the request itself is wrong.
    #[test]
    fn story_conflict_is_retryable_other_4xx_are_not() {
        assert!(api_error(409).is_retryable());
        assert!(!api_error(400).is_retryable());
        assert!(!api_error(404).is_retryable());
        assert!(!api_error(422).is_retryable());
        assert!(api_error(500).is_retryable());
        assert!(api_error(503).is_retryable());
    }

    /// Story: a record deleted mid-reconcile is detected via NotFound
    #[test]
    fn story_not_found_detection() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(409).is_not_found());
        assert!(!Error::validation("nope").is_not_found());
        assert!(!Error::internal("nope").is_not_found());
    }

    /// Story: errors have is_retryable() for controller retry logic
    #[test]
    fn story_error_retryability() {
        assert!(!Error::validation("bad config").is_retryable());
        assert!(!Error::serialization("parse error").is_retryable());
        assert!(Error::internal("unexpected state").is_retryable());
    }

    #[test]
    fn test_internal_error_with_context() {
        let err = Error::internal_with_context("reconciler", "unexpected state");
        assert!(err.is_retryable());
        assert_eq!(err.context(), Some("reconciler"));
        assert!(err.to_string().contains("[reconciler]"));
        assert!(err.to_string().contains("unexpected state"));
    }

    #[test]
    fn test_internal_error_default_context() {
        let err = Error::internal("unexpected state");
        assert_eq!(err.context(), Some(super::UNKNOWN_CONTEXT));
        assert!(err.to_string().contains("[unknown]"));
    }

    #[test]
    fn test_serialization_for_kind() {
        let err = Error::serialization_for_kind("Deployment", "missing field");
        match &err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("Deployment")),
            _ => panic!("Expected Serialization variant"),
        }
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_error_construction_ergonomics() {
        let dynamic_msg = format!("app {} not found", "web");
        let err = Error::validation(dynamic_msg);
        assert!(err.to_string().contains("web"));

        let err = Error::internal("static message");
        assert!(err.to_string().contains("static message"));
    }
}
