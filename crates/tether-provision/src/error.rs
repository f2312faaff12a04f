//! Error types for the provisioning crate.

/// Unified error type for the Tether provisioning flow.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The portal rejected a request or returned an unusable response.
    #[error("portal request failed: {reason}")]
    Portal {
        /// Details from the portal, raw text preserved.
        reason: String,
    },

    /// An operation was invoked out of order (e.g. polling before a device
    /// code was issued).
    #[error("invalid flow state: {reason}")]
    InvalidState {
        /// What the flow was missing.
        reason: String,
    },

    /// An HTTP request to the portal failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error while persisting the signing key.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The provisioned signing key was not valid base64.
    #[error("signing key decode failed: {reason}")]
    KeyDecode {
        /// The decoder's explanation.
        reason: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ProvisionError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_portal() {
        let err = ProvisionError::Portal {
            reason: "HTTP 503: maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "portal request failed: HTTP 503: maintenance");
    }

    #[test]
    fn error_display_invalid_state() {
        let err = ProvisionError::InvalidState {
            reason: "no device code issued".to_string(),
        };
        assert_eq!(err.to_string(), "invalid flow state: no device code issued");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProvisionError>();
    }
}
