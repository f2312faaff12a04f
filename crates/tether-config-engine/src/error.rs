//! Error types for the configuration engine crate.
//!
//! All engine operations surface errors through [`ConfigEngineError`], which
//! is the single error type for this crate. Most public facade operations
//! report failures as data (a failed [`crate::session::StepResult`], `false`,
//! or `None`); the error type covers the caller-error cases that are allowed
//! to raise, plus the internal collaborator-fault path that the step executor
//! converts back into failed step results.

/// Unified error type for the Tether configuration engine.
#[derive(Debug, thiserror::Error)]
pub enum ConfigEngineError {
    /// The requested adapter type has no registered configuration workflow.
    /// Starting a session for it is a caller programming error.
    #[error("adapter type not registered: {adapter_type}")]
    AdapterNotRegistered {
        /// The adapter type that was not found.
        adapter_type: String,
    },

    /// A collaborator operation (discover, OAuth, validate, apply) failed.
    #[error("adapter operation failed: {reason}")]
    Adapter {
        /// Explanation from the collaborator.
        reason: String,
    },

    /// The external configuration backend rejected a read or write.
    #[error("config backend error: {reason}")]
    Backend {
        /// Details about the backend failure.
        reason: String,
    },

    /// The system CSPRNG failed while generating PKCE material.
    #[error("crypto failure: {reason}")]
    Crypto {
        /// What went wrong.
        reason: String,
    },

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ConfigEngineError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_adapter_not_registered() {
        let err = ConfigEngineError::AdapterNotRegistered {
            adapter_type: "slack".to_string(),
        };
        assert_eq!(err.to_string(), "adapter type not registered: slack");
    }

    #[test]
    fn error_display_adapter_failure() {
        let err = ConfigEngineError::Adapter {
            reason: "device bus unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "adapter operation failed: device bus unavailable"
        );
    }

    #[test]
    fn error_display_backend() {
        let err = ConfigEngineError::Backend {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "config backend error: connection refused");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigEngineError>();
    }
}
