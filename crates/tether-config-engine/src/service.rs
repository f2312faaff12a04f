//! High-level adapter configuration service.
//!
//! The [`AdapterConfigService`] is the only entry point external callers
//! (the HTTP layer) use. It owns the workflow registrations, delegates
//! session lifecycle to the store and step execution to the executor, and
//! finishes sessions by validating and applying the collected configuration
//! through the registered collaborator.
//!
//! It also loads and removes configurations persisted in an external
//! key/value backend under the `adapter_config:` prefix.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::adapter::{ConfigBackend, ConfigurableAdapter};
use crate::error::{ConfigEngineError, Result};
use crate::executor::StepExecutor;
use crate::session::{ConfigSession, SessionStatus, StepResult};
use crate::store::SessionStore;
use crate::workflow::WorkflowDefinition;

/// Key prefix persisted adapter configurations are stored under, as
/// `adapter_config:{adapter_type}:{instance_id}`.
pub const CONFIG_KEY_PREFIX: &str = "adapter_config";

/// One registered adapter type: its workflow plus its collaborator.
pub(crate) struct AdapterRegistration {
    pub(crate) workflow: WorkflowDefinition,
    pub(crate) adapter: Arc<dyn ConfigurableAdapter>,
}

/// Facade over the session store, step executor, and registrations.
pub struct AdapterConfigService {
    store: Arc<SessionStore>,
    registrations: Arc<DashMap<String, AdapterRegistration>>,
    executor: StepExecutor,
}

impl Default for AdapterConfigService {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterConfigService {
    /// Create a service with its own empty session store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(SessionStore::new()))
    }

    /// Create a service sharing an existing session store, for embedders
    /// that sweep or inspect sessions outside the facade.
    pub fn with_store(store: Arc<SessionStore>) -> Self {
        let registrations = Arc::new(DashMap::new());
        let executor = StepExecutor::new(Arc::clone(&store), Arc::clone(&registrations));
        Self {
            store,
            registrations,
            executor,
        }
    }

    /// Register (or replace) the configuration workflow for an adapter type.
    /// Idempotent; the last registration wins.
    pub fn register_adapter_config(
        &self,
        adapter_type: impl Into<String>,
        workflow: WorkflowDefinition,
        adapter: Arc<dyn ConfigurableAdapter>,
    ) {
        let adapter_type = adapter_type.into();
        info!(
            adapter_type = %adapter_type,
            steps = workflow.len(),
            "adapter configuration workflow registered"
        );
        self.registrations
            .insert(adapter_type, AdapterRegistration { workflow, adapter });
    }

    /// All adapter types with a registered workflow.
    pub fn get_configurable_adapters(&self) -> Vec<String> {
        self.registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Start a configuration session for a registered adapter type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigEngineError::AdapterNotRegistered`] when no workflow
    /// has been registered for `adapter_type` — a caller programming error,
    /// not a runtime condition to tolerate silently.
    pub fn start_session(&self, adapter_type: &str, user_id: &str) -> Result<ConfigSession> {
        if !self.registrations.contains_key(adapter_type) {
            return Err(ConfigEngineError::AdapterNotRegistered {
                adapter_type: adapter_type.to_string(),
            });
        }
        Ok(self.store.create(adapter_type, user_id))
    }

    /// A snapshot of the session, if it exists. Reading an over-idle
    /// session stamps it expired first.
    pub async fn get_session(&self, session_id: &str) -> Option<ConfigSession> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await.clone();
        Some(session)
    }

    /// Run the session's current step. Failures are data on the returned
    /// [`StepResult`]; this never raises.
    pub async fn execute_step(
        &self,
        session_id: &str,
        raw_input: Map<String, Value>,
    ) -> StepResult {
        self.executor.execute_step(session_id, raw_input).await
    }

    /// Validate and apply the session's collected configuration.
    ///
    /// Returns `false` (without raising) when the session or its
    /// registration is missing, validation rejects the configuration, or
    /// the apply call fails; the session is left `Failed` in the latter two
    /// cases. Returns `true` and marks the session `Completed` on success.
    /// Validation and application are each a single call — there is no
    /// partial-apply rollback.
    pub async fn complete_session(&self, session_id: &str) -> bool {
        let Some(handle) = self.store.get(session_id).await else {
            warn!(session_id, "completion requested for unknown session");
            return false;
        };
        let mut session = handle.lock().await;

        if session.status == SessionStatus::Expired {
            debug!(session_id = %session.session_id, "completion requested for expired session");
            return false;
        }

        let Some(adapter) = self
            .registrations
            .get(&session.adapter_type)
            .map(|registration| Arc::clone(&registration.adapter))
        else {
            warn!(
                session_id = %session.session_id,
                adapter_type = %session.adapter_type,
                "no registration for session's adapter type"
            );
            return false;
        };

        let validation = match adapter.validate_config(&session.collected_config).await {
            Ok(validation) => validation,
            Err(err) => {
                warn!(session_id = %session.session_id, error = %err, "validation call failed");
                session.status = SessionStatus::Failed;
                return false;
            }
        };

        if !validation.valid {
            info!(
                session_id = %session.session_id,
                error = validation.error.as_deref().unwrap_or("invalid configuration"),
                "configuration rejected by validation"
            );
            session.status = SessionStatus::Failed;
            return false;
        }

        match adapter.apply_config(&session.collected_config).await {
            Ok(true) => {
                session.status = SessionStatus::Completed;
                info!(session_id = %session.session_id, "configuration applied");
                true
            }
            Ok(false) => {
                session.status = SessionStatus::Failed;
                false
            }
            Err(err) => {
                warn!(session_id = %session.session_id, error = %err, "apply call failed");
                session.status = SessionStatus::Failed;
                false
            }
        }
    }

    /// Sweep sessions idle past the timeout out of the store. Must be
    /// invoked periodically by the embedder; nothing here runs a timer.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        self.store.cleanup_expired().await
    }

    /// Load every persisted adapter configuration, grouped by adapter type
    /// and then instance id.
    ///
    /// Keys that don't parse as `adapter_config:{adapter_type}:{instance_id}`
    /// are skipped. Non-object values are wrapped as `{"value": raw}` so the
    /// return shape is uniform. A backend failure yields an empty map — a
    /// platform missing its persisted configs still boots.
    pub async fn load_persisted_configs(
        &self,
        backend: &dyn ConfigBackend,
    ) -> HashMap<String, HashMap<String, Value>> {
        let entries = match backend.list_configs(CONFIG_KEY_PREFIX).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "failed to list persisted adapter configs");
                return HashMap::new();
            }
        };

        let mut grouped: HashMap<String, HashMap<String, Value>> = HashMap::new();
        for (key, value) in entries {
            let segments: Vec<&str> = key.split(':').collect();
            let &[prefix, adapter_type, instance_id] = segments.as_slice() else {
                continue;
            };
            if prefix != CONFIG_KEY_PREFIX {
                continue;
            }

            let value = if value.is_object() {
                value
            } else {
                json!({ "value": value })
            };

            grouped
                .entry(adapter_type.to_string())
                .or_default()
                .insert(instance_id.to_string(), value);
        }

        debug!(adapter_types = grouped.len(), "persisted adapter configs loaded");
        grouped
    }

    /// Clear every persisted configuration for one adapter type.
    ///
    /// Returns `true` if at least one entry was cleared; individual write
    /// failures are logged and skipped. Returns `false` when nothing was
    /// stored under the type or the listing itself failed.
    pub async fn remove_persisted_config(
        &self,
        adapter_type: &str,
        backend: &dyn ConfigBackend,
    ) -> bool {
        let prefix = format!("{CONFIG_KEY_PREFIX}:{adapter_type}:");
        let entries = match backend.list_configs(&prefix).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(adapter_type, error = %err, "failed to list configs for removal");
                return false;
            }
        };

        let mut removed = 0usize;
        for key in entries.keys() {
            match backend.set_config(key, Value::Null).await {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to clear persisted config");
                }
            }
        }

        info!(adapter_type, removed, "persisted adapter configs cleared");
        removed > 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        ConfigValidation, MemoryConfigBackend, OAuthCallbackParams, OAuthUrlParams,
    };
    use crate::workflow::{ConfigStep, StepKind};
    use async_trait::async_trait;

    /// Collaborator whose validate/apply behavior is set per test.
    struct TestAdapter {
        validation: ConfigValidation,
        apply_ok: bool,
    }

    impl TestAdapter {
        fn accepting() -> Self {
            Self {
                validation: ConfigValidation::ok(),
                apply_ok: true,
            }
        }

        fn rejecting(reason: &str) -> Self {
            Self {
                validation: ConfigValidation::invalid(reason),
                apply_ok: true,
            }
        }
    }

    #[async_trait]
    impl ConfigurableAdapter for TestAdapter {
        async fn discover(&self, _discovery_type: &str) -> Result<Vec<Value>> {
            Ok(vec![])
        }

        async fn get_oauth_url(&self, params: OAuthUrlParams) -> Result<String> {
            Ok(params.base_url)
        }

        async fn handle_oauth_callback(&self, _params: OAuthCallbackParams) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn get_config_options(
            &self,
            _step_id: &str,
            _context: &Map<String, Value>,
        ) -> Result<Vec<Value>> {
            Ok(vec![])
        }

        async fn validate_config(&self, _config: &Map<String, Value>) -> Result<ConfigValidation> {
            Ok(self.validation.clone())
        }

        async fn apply_config(&self, _config: &Map<String, Value>) -> Result<bool> {
            Ok(self.apply_ok)
        }
    }

    /// Backend whose every operation fails.
    struct BrokenBackend;

    #[async_trait]
    impl ConfigBackend for BrokenBackend {
        async fn list_configs(&self, _prefix: &str) -> Result<HashMap<String, Value>> {
            Err(ConfigEngineError::Backend {
                reason: "store offline".to_string(),
            })
        }

        async fn set_config(&self, _key: &str, _value: Value) -> Result<()> {
            Err(ConfigEngineError::Backend {
                reason: "store offline".to_string(),
            })
        }
    }

    fn confirm_workflow() -> WorkflowDefinition {
        WorkflowDefinition::new(vec![ConfigStep::new("confirm", "Confirm", StepKind::Confirm)])
    }

    #[tokio::test]
    async fn registration_is_idempotent_and_listable() {
        let service = AdapterConfigService::new();
        service.register_adapter_config(
            "slack",
            confirm_workflow(),
            Arc::new(TestAdapter::accepting()),
        );
        service.register_adapter_config(
            "slack",
            confirm_workflow(),
            Arc::new(TestAdapter::accepting()),
        );

        assert_eq!(service.get_configurable_adapters(), vec!["slack"]);
    }

    #[tokio::test]
    async fn start_session_rejects_unregistered_type() {
        let service = AdapterConfigService::new();
        let result = service.start_session("nonexistent", "user-1");
        assert!(matches!(
            result,
            Err(ConfigEngineError::AdapterNotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn complete_session_happy_path() {
        let service = AdapterConfigService::new();
        service.register_adapter_config(
            "slack",
            confirm_workflow(),
            Arc::new(TestAdapter::accepting()),
        );

        let session = service.start_session("slack", "user-1").unwrap();
        service
            .execute_step(&session.session_id, Map::new())
            .await;

        assert!(service.complete_session(&session.session_id).await);
        let snapshot = service.get_session(&session.session_id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn complete_session_validation_failure_marks_failed() {
        let service = AdapterConfigService::new();
        service.register_adapter_config(
            "slack",
            confirm_workflow(),
            Arc::new(TestAdapter::rejecting("bad")),
        );

        let session = service.start_session("slack", "user-1").unwrap();
        assert!(!service.complete_session(&session.session_id).await);

        let snapshot = service.get_session(&session.session_id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn complete_session_apply_failure_marks_failed() {
        let service = AdapterConfigService::new();
        service.register_adapter_config(
            "slack",
            confirm_workflow(),
            Arc::new(TestAdapter {
                validation: ConfigValidation::ok(),
                apply_ok: false,
            }),
        );

        let session = service.start_session("slack", "user-1").unwrap();
        assert!(!service.complete_session(&session.session_id).await);

        let snapshot = service.get_session(&session.session_id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn complete_unknown_session_is_false() {
        let service = AdapterConfigService::new();
        assert!(!service.complete_session("no-such-session").await);
    }

    #[tokio::test]
    async fn load_persisted_configs_groups_and_wraps() {
        let service = AdapterConfigService::new();
        let backend = MemoryConfigBackend::new();
        backend
            .set_config("adapter_config:slack:team-a", json!({"token": "t"}))
            .await
            .unwrap();
        backend
            .set_config("adapter_config:slack:team-b", json!("bare-string"))
            .await
            .unwrap();
        backend
            .set_config("adapter_config:discord:guild-1", json!({"webhook": "w"}))
            .await
            .unwrap();
        // Wrong segment count: skipped.
        backend
            .set_config("adapter_config:orphan", json!({"x": 1}))
            .await
            .unwrap();

        let configs = service.load_persisted_configs(&backend).await;
        assert_eq!(configs.len(), 2);
        assert_eq!(configs["slack"].len(), 2);
        assert_eq!(configs["slack"]["team-a"], json!({"token": "t"}));
        // Non-object values keep the two-level shape.
        assert_eq!(configs["slack"]["team-b"], json!({"value": "bare-string"}));
        assert_eq!(configs["discord"]["guild-1"], json!({"webhook": "w"}));
    }

    #[tokio::test]
    async fn load_persisted_configs_fails_open() {
        let service = AdapterConfigService::new();
        let configs = service.load_persisted_configs(&BrokenBackend).await;
        assert!(configs.is_empty());
    }

    #[tokio::test]
    async fn remove_persisted_config_clears_type() {
        let service = AdapterConfigService::new();
        let backend = MemoryConfigBackend::new();
        backend
            .set_config("adapter_config:slack:team-a", json!({"token": "t"}))
            .await
            .unwrap();
        backend
            .set_config("adapter_config:discord:guild-1", json!({"webhook": "w"}))
            .await
            .unwrap();

        assert!(service.remove_persisted_config("slack", &backend).await);

        let remaining = service.load_persisted_configs(&backend).await;
        assert!(!remaining.contains_key("slack"));
        assert!(remaining.contains_key("discord"));
    }

    #[tokio::test]
    async fn remove_persisted_config_empty_and_broken_are_false() {
        let service = AdapterConfigService::new();
        let backend = MemoryConfigBackend::new();
        assert!(!service.remove_persisted_config("slack", &backend).await);
        assert!(!service.remove_persisted_config("slack", &BrokenBackend).await);
    }
}
