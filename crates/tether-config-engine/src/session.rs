//! Configuration session model.
//!
//! A [`ConfigSession`] is one in-progress, resumable configuration attempt
//! for one adapter type and user. It survives across HTTP requests: the
//! caller drives it forward step by step, and OAuth steps suspend it while
//! an out-of-band browser redirect completes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// How long a session may sit idle before it is considered expired.
pub const SESSION_IDLE_TIMEOUT_SECS: i64 = 30 * 60;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The lifecycle state of a configuration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session is live and accepting step input.
    Active,
    /// An OAuth authorization URL has been issued; the session is waiting
    /// for the out-of-band callback to deliver the code.
    AwaitingOauth,
    /// The collected configuration was validated and applied. Terminal.
    Completed,
    /// Validation or application failed. Terminal.
    Failed,
    /// The session sat idle past the timeout. Terminal; stamped lazily on
    /// read rather than by a background sweep.
    Expired,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::AwaitingOauth => write!(f, "awaiting_oauth"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// One in-progress configuration attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSession {
    /// Unique identifier (UUID v7), immutable.
    pub session_id: String,
    /// Which registered workflow governs this session, immutable.
    pub adapter_type: String,
    /// Identity of the initiating principal, immutable.
    pub user_id: String,
    /// Zero-based pointer into the workflow's step list. Advances
    /// monotonically; a step that needs a retry simply does not advance it.
    pub current_step_index: usize,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Accumulated answers, keyed by step id (or workflow-defined key).
    /// This is the artifact that is ultimately validated and applied.
    pub collected_config: Map<String, Value>,
    /// Raw per-step payloads (e.g. discovered items), kept apart from
    /// `collected_config` so transient output never reaches the adapter.
    pub step_results: Map<String, Value>,
    /// PKCE verifier minted when an OAuth URL is issued; read back when the
    /// callback arrives.
    pub pkce_verifier: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful step execution; the sole input to
    /// expiry calculation.
    pub updated_at: DateTime<Utc>,
}

impl ConfigSession {
    /// Create a fresh session at step zero.
    pub fn new(adapter_type: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::now_v7().to_string(),
            adapter_type: adapter_type.into(),
            user_id: user_id.into(),
            current_step_index: 0,
            status: SessionStatus::Active,
            collected_config: Map::new(),
            step_results: Map::new(),
            pkce_verifier: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the session's idle time exceeds the fixed timeout at `now`.
    pub fn idle_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.updated_at)
            > Duration::seconds(SESSION_IDLE_TIMEOUT_SECS)
    }

    /// Refresh the idle clock.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// The outcome of one `execute_step` call. Transient — never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The step that ran (empty when the session itself was the problem).
    pub step_id: String,
    /// Whether the step executed without failure.
    pub success: bool,
    /// Free-form payload for the caller (options, discovered items, the
    /// authorization URL, the final summary).
    pub data: Value,
    /// Where the session now points; `None` means "stay on this step".
    pub next_step_index: Option<usize>,
    /// Failure explanation when `success` is false.
    pub error: Option<String>,
    /// True only for the URL-issuance half of an OAuth step.
    pub awaiting_callback: bool,
}

impl StepResult {
    /// A successful result, optionally advancing the session.
    pub fn success(
        step_id: impl Into<String>,
        data: Value,
        next_step_index: Option<usize>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            data,
            next_step_index,
            error: None,
            awaiting_callback: false,
        }
    }

    /// A failed result carrying an explanation. Never advances.
    pub fn failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            data: Value::Null,
            next_step_index: None,
            error: Some(error.into()),
            awaiting_callback: false,
        }
    }

    /// A successful result that suspends the session until an out-of-band
    /// callback arrives.
    pub fn awaiting(step_id: impl Into<String>, data: Value) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            data,
            next_step_index: None,
            error: None,
            awaiting_callback: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_active_at_step_zero() {
        let session = ConfigSession::new("slack", "user-1");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.current_step_index, 0);
        assert!(session.collected_config.is_empty());
        assert!(session.step_results.is_empty());
        assert!(session.pkce_verifier.is_none());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn session_ids_are_unique() {
        let a = ConfigSession::new("slack", "user-1");
        let b = ConfigSession::new("slack", "user-1");
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn idle_expiry_boundary() {
        let session = ConfigSession::new("slack", "user-1");
        let just_under = session.updated_at + Duration::seconds(SESSION_IDLE_TIMEOUT_SECS);
        let just_over = just_under + Duration::seconds(1);
        assert!(!session.idle_expired(just_under));
        assert!(session.idle_expired(just_over));
    }

    #[test]
    fn touch_refreshes_updated_at_only() {
        let mut session = ConfigSession::new("slack", "user-1");
        let created = session.created_at;
        session.touch();
        assert_eq!(session.created_at, created);
        assert!(session.updated_at >= created);
    }

    #[test]
    fn status_display() {
        assert_eq!(SessionStatus::AwaitingOauth.to_string(), "awaiting_oauth");
        assert_eq!(SessionStatus::Expired.to_string(), "expired");
    }

    #[test]
    fn step_result_constructors() {
        let ok = StepResult::success("s1", serde_json::json!({"x": 1}), Some(2));
        assert!(ok.success);
        assert_eq!(ok.next_step_index, Some(2));
        assert!(!ok.awaiting_callback);

        let err = StepResult::failure("s1", "boom");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));
        assert!(err.next_step_index.is_none());

        let waiting = StepResult::awaiting("s1", serde_json::json!({"oauth_url": "u"}));
        assert!(waiting.success);
        assert!(waiting.awaiting_callback);
        assert!(waiting.next_step_index.is_none());
    }
}
