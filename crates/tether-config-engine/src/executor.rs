//! Step executor — dispatches session input to the per-type step handlers.
//!
//! Single entry point: [`StepExecutor::execute_step`]. Preconditions are
//! checked in order (session exists, not expired, step pointer in range),
//! each short-circuiting into a failed [`StepResult`]. The per-session mutex
//! is held for the whole call, so concurrent executions against one session
//! serialize. Collaborator faults are converted into failed results at this
//! boundary; nothing propagates to the caller.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::adapter::{ConfigurableAdapter, OAuthCallbackParams, OAuthUrlParams};
use crate::error::Result;
use crate::pkce;
use crate::service::AdapterRegistration;
use crate::session::{ConfigSession, SessionStatus, StepResult};
use crate::store::SessionStore;
use crate::workflow::{ConfigStep, StepKind};

/// Executes configuration steps against stored sessions.
pub(crate) struct StepExecutor {
    store: Arc<SessionStore>,
    registrations: Arc<DashMap<String, AdapterRegistration>>,
}

impl StepExecutor {
    pub(crate) fn new(
        store: Arc<SessionStore>,
        registrations: Arc<DashMap<String, AdapterRegistration>>,
    ) -> Self {
        Self {
            store,
            registrations,
        }
    }

    /// Run the session's current step against `raw_input`.
    pub(crate) async fn execute_step(
        &self,
        session_id: &str,
        raw_input: Map<String, Value>,
    ) -> StepResult {
        let Some(handle) = self.store.get(session_id).await else {
            return StepResult::failure("", "Session not found");
        };
        let mut session = handle.lock().await;

        if session.status == SessionStatus::Expired {
            return StepResult::failure("", "Session expired");
        }

        let (step, adapter) = {
            let Some(registration) = self.registrations.get(&session.adapter_type) else {
                return StepResult::failure(
                    "",
                    format!("adapter type not registered: {}", session.adapter_type),
                );
            };
            match registration.workflow.step_at(session.current_step_index) {
                Some(step) => (step.clone(), Arc::clone(&registration.adapter)),
                None => return StepResult::failure("", "No more steps"),
            }
        };

        debug!(
            session_id = %session.session_id,
            step_id = %step.step_id,
            step_index = session.current_step_index,
            "executing configuration step"
        );

        let outcome = match &step.kind {
            StepKind::Discovery { discovery_type } => {
                run_discovery(&step, discovery_type, &mut session, adapter.as_ref()).await
            }
            StepKind::Oauth => run_oauth(&step, &mut session, &raw_input, adapter.as_ref()).await,
            StepKind::Select => {
                run_select(&step, &mut session, &raw_input, adapter.as_ref()).await
            }
            StepKind::Input => run_input(&step, &mut session, &raw_input),
            StepKind::Confirm => run_confirm(&step, &mut session),
        };

        match outcome {
            Ok(result) => {
                session.touch();
                result
            }
            Err(err) => {
                warn!(
                    session_id = %session.session_id,
                    step_id = %step.step_id,
                    error = %err,
                    "configuration step failed"
                );
                StepResult::failure(&step.step_id, err.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-type handlers
// ---------------------------------------------------------------------------

/// Probe the adapter; advance only when something was found. An empty result
/// keeps the session on this step so the caller can retry after the user
/// plugs in a device or brings a service online.
async fn run_discovery(
    step: &ConfigStep,
    discovery_type: &str,
    session: &mut ConfigSession,
    adapter: &dyn ConfigurableAdapter,
) -> Result<StepResult> {
    let items = adapter.discover(discovery_type).await?;
    session
        .step_results
        .insert(step.step_id.clone(), Value::Array(items.clone()));

    if items.is_empty() {
        return Ok(StepResult::success(
            &step.step_id,
            json!({ "items": [] }),
            None,
        ));
    }

    session.current_step_index += 1;
    Ok(StepResult::success(
        &step.step_id,
        json!({ "items": items }),
        Some(session.current_step_index),
    ))
}

/// Two-phase OAuth, keyed on whether the input carries a `code`.
async fn run_oauth(
    step: &ConfigStep,
    session: &mut ConfigSession,
    raw_input: &Map<String, Value>,
    adapter: &dyn ConfigurableAdapter,
) -> Result<StepResult> {
    match raw_input.get("code") {
        None => issue_oauth_url(step, session, raw_input, adapter).await,
        Some(value) => {
            let code = value.as_str().unwrap_or_default().to_owned();
            complete_oauth_callback(step, session, raw_input, adapter, code).await
        }
    }
}

/// Phase A: persist the connection parameters, mint PKCE material, and hand
/// the caller an authorization URL. The step pointer does not move — only
/// the callback phase advances it.
async fn issue_oauth_url(
    step: &ConfigStep,
    session: &mut ConfigSession,
    raw_input: &Map<String, Value>,
    adapter: &dyn ConfigurableAdapter,
) -> Result<StepResult> {
    // Keep the connection parameters so they survive to the callback phase
    // and to the final apply.
    for key in ["base_url", "callback_base_url", "redirect_uri", "platform"] {
        if let Some(value) = raw_input.get(key) {
            session
                .collected_config
                .insert(key.to_string(), value.clone());
        }
    }

    let Some(base_url) = collected_str(session, "base_url") else {
        return Ok(StepResult::failure(
            &step.step_id,
            "base_url must be collected before the OAuth step",
        ));
    };

    let verifier = pkce::generate_verifier()?;
    let code_challenge = pkce::challenge(&verifier);
    session.pkce_verifier = Some(verifier);

    let url = adapter
        .get_oauth_url(OAuthUrlParams {
            base_url,
            state: session.session_id.clone(),
            code_challenge: Some(code_challenge.clone()),
            callback_base_url: collected_str(session, "callback_base_url"),
            redirect_uri: collected_str(session, "redirect_uri"),
            platform: collected_str(session, "platform"),
        })
        .await?;

    session.status = SessionStatus::AwaitingOauth;
    debug!(session_id = %session.session_id, "authorization URL issued, awaiting callback");

    Ok(StepResult::awaiting(
        &step.step_id,
        json!({ "oauth_url": url, "code_challenge": code_challenge }),
    ))
}

/// Phase B: exchange the redirect's code through the adapter, stash the
/// token payload, and resume the workflow.
async fn complete_oauth_callback(
    step: &ConfigStep,
    session: &mut ConfigSession,
    raw_input: &Map<String, Value>,
    adapter: &dyn ConfigurableAdapter,
    code: String,
) -> Result<StepResult> {
    let state = raw_input
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let tokens = adapter
        .handle_oauth_callback(OAuthCallbackParams {
            code,
            state,
            base_url: collected_str(session, "base_url").unwrap_or_default(),
            code_verifier: session.pkce_verifier.clone(),
            callback_base_url: collected_str(session, "callback_base_url"),
            redirect_uri: collected_str(session, "redirect_uri"),
            platform: collected_str(session, "platform"),
        })
        .await?;

    session
        .collected_config
        .insert("oauth_tokens".to_string(), tokens);
    session.status = SessionStatus::Active;
    session.current_step_index += 1;

    Ok(StepResult::success(
        &step.step_id,
        json!({ "oauth_complete": true }),
        Some(session.current_step_index),
    ))
}

/// Record a choice when one was supplied, otherwise list the options. The
/// two round trips share one step so clients don't need a separate
/// "fetch options" operation.
async fn run_select(
    step: &ConfigStep,
    session: &mut ConfigSession,
    raw_input: &Map<String, Value>,
    adapter: &dyn ConfigurableAdapter,
) -> Result<StepResult> {
    // `selection` is the canonical key; `selected` is accepted for older
    // clients and loses when both are present.
    let choice = raw_input
        .get("selection")
        .or_else(|| raw_input.get("selected"));

    if let Some(value) = choice {
        session
            .collected_config
            .insert(step.step_id.clone(), value.clone());
        session.current_step_index += 1;
        return Ok(StepResult::success(
            &step.step_id,
            json!({ "selected": value }),
            Some(session.current_step_index),
        ));
    }

    let options = adapter
        .get_config_options(&step.step_id, &session.collected_config)
        .await?;
    Ok(StepResult::success(
        &step.step_id,
        json!({ "options": options }),
        None,
    ))
}

/// Merge free-form input into the collected configuration; empty input
/// signals the caller that the step is still waiting.
fn run_input(
    step: &ConfigStep,
    session: &mut ConfigSession,
    raw_input: &Map<String, Value>,
) -> Result<StepResult> {
    if raw_input.is_empty() {
        return Ok(StepResult::success(
            &step.step_id,
            json!({ "awaiting_input": true }),
            None,
        ));
    }

    for (key, value) in raw_input {
        session
            .collected_config
            .insert(key.clone(), value.clone());
    }
    session.current_step_index += 1;
    Ok(StepResult::success(
        &step.step_id,
        json!({ "received": raw_input.len() }),
        Some(session.current_step_index),
    ))
}

/// Echo the accumulated configuration for a final look before commit.
fn run_confirm(step: &ConfigStep, session: &mut ConfigSession) -> Result<StepResult> {
    session.current_step_index += 1;
    Ok(StepResult::success(
        &step.step_id,
        json!({ "config_summary": Value::Object(session.collected_config.clone()) }),
        Some(session.current_step_index),
    ))
}

fn collected_str(session: &ConfigSession, key: &str) -> Option<String> {
    session
        .collected_config
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
