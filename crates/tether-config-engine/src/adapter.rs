//! Collaborator boundaries — the traits the engine consumes.
//!
//! [`ConfigurableAdapter`] is implemented once per adapter type, outside this
//! crate, and is the only way the engine reaches the domain services behind
//! an adapter (device buses, OAuth clients, option catalogs). The engine
//! treats it as opaque beyond these six operations.
//!
//! [`ConfigBackend`] is the external key/value store persisted adapter
//! configurations live in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::Result;

// ---------------------------------------------------------------------------
// OAuth parameter structs
// ---------------------------------------------------------------------------

/// Inputs for issuing an authorization URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthUrlParams {
    /// The provider base URL the adapter should authorize against.
    pub base_url: String,
    /// Opaque state round-tripped through the redirect; the engine always
    /// passes the session id here.
    pub state: String,
    /// S256 PKCE challenge derived from the session's verifier.
    pub code_challenge: Option<String>,
    /// Base URL the provider should redirect back to, when the adapter
    /// distinguishes it from `redirect_uri`.
    pub callback_base_url: Option<String>,
    /// Exact redirect URI registered with the provider.
    pub redirect_uri: Option<String>,
    /// Client platform hint (e.g. "web", "desktop").
    pub platform: Option<String>,
}

/// Inputs for completing the code exchange after the redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCallbackParams {
    /// The authorization code delivered by the redirect.
    pub code: String,
    /// The state echoed back by the provider (empty if it sent none).
    pub state: String,
    /// The provider base URL collected before the URL was issued.
    pub base_url: String,
    /// The PKCE verifier stored when the URL was issued, for providers
    /// whose token exchange verifies it.
    pub code_verifier: Option<String>,
    pub callback_base_url: Option<String>,
    pub redirect_uri: Option<String>,
    pub platform: Option<String>,
}

/// Outcome of validating a collected configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValidation {
    /// Whether the configuration may be applied.
    pub valid: bool,
    /// Explanation when `valid` is false.
    pub error: Option<String>,
}

impl ConfigValidation {
    /// A passing validation.
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// A failing validation with an explanation.
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Core traits
// ---------------------------------------------------------------------------

/// The per-adapter-type collaborator contract.
///
/// Implementations live outside this crate, one per adapter type. Every
/// method is invoked synchronously from one step execution or completion
/// call; the engine never retains partial results across calls except
/// through the session itself.
#[async_trait]
pub trait ConfigurableAdapter: Send + Sync {
    /// Probe for available items using the named discovery method.
    async fn discover(&self, discovery_type: &str) -> Result<Vec<Value>>;

    /// Build the authorization URL the user's browser should visit.
    async fn get_oauth_url(&self, params: OAuthUrlParams) -> Result<String>;

    /// Exchange the redirect's authorization code for a token payload.
    async fn handle_oauth_callback(&self, params: OAuthCallbackParams) -> Result<Value>;

    /// List the options the user may choose from for a select step.
    /// `context` is everything collected so far.
    async fn get_config_options(
        &self,
        step_id: &str,
        context: &Map<String, Value>,
    ) -> Result<Vec<Value>>;

    /// Decide whether the collected configuration may be applied.
    async fn validate_config(&self, config: &Map<String, Value>) -> Result<ConfigValidation>;

    /// Apply the validated configuration to the adapter. A `false` return
    /// fails the session; whatever side effects already happened stay.
    async fn apply_config(&self, config: &Map<String, Value>) -> Result<bool>;
}

/// External key/value store for persisted adapter configurations.
///
/// Removal is expressed as a tombstone write (`Value::Null`) rather than a
/// dedicated delete operation.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    /// All live entries whose key starts with `prefix`.
    async fn list_configs(&self, prefix: &str) -> Result<HashMap<String, Value>>;

    /// Write one entry; `Value::Null` clears it.
    async fn set_config(&self, key: &str, value: Value) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// A process-local [`ConfigBackend`] backed by a concurrent map.
///
/// Used by tests and by embedders that have no durable backend wired up yet.
#[derive(Default)]
pub struct MemoryConfigBackend {
    entries: dashmap::DashMap<String, Value>,
}

impl MemoryConfigBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigBackend for MemoryConfigBackend {
    async fn list_configs(&self, prefix: &str) -> Result<HashMap<String, Value>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn set_config(&self, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_string(), value);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
