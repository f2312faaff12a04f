//! Interactive adapter configuration engine for Tether.
//!
//! This crate manages multi-step, resumable configuration sessions for the
//! platform's pluggable adapters. A session survives across HTTP requests:
//! the caller starts it, feeds it step input (user choices, free-form
//! fields, OAuth redirect codes), and finally completes it, at which point
//! the collected configuration is validated and applied through the
//! adapter's collaborator.
//!
//! Five step types cover the workflows adapters need:
//!
//! - **discovery** — probe for devices/servers; re-entrant while nothing is
//!   found yet
//! - **oauth** — authorization-code exchange with PKCE (RFC 7636), suspended
//!   across the out-of-band browser redirect
//! - **select** — offer options, record the choice
//! - **input** — collect free-form key/value fields
//! - **confirm** — show the accumulated configuration before commit
//!
//! # Architecture
//!
//! ```text
//! AdapterConfigService
//! ├── SessionStore          (concurrent map, lazy expiry + sweep)
//! ├── StepExecutor          (per-type handlers, fault boundary)
//! ├── ConfigurableAdapter   (per-adapter-type collaborator, external)
//! └── ConfigBackend         (persisted configs, external)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_config_engine::{
//!     AdapterConfigService, ConfigStep, StepKind, WorkflowDefinition,
//! };
//! # use tether_config_engine::ConfigurableAdapter;
//!
//! # async fn example(my_adapter: Arc<dyn ConfigurableAdapter>) -> tether_config_engine::error::Result<()> {
//! let service = AdapterConfigService::new();
//! service.register_adapter_config(
//!     "slack",
//!     WorkflowDefinition::new(vec![
//!         ConfigStep::new("pick_workspace", "Pick a workspace", StepKind::Select),
//!         ConfigStep::new("authorize", "Authorize", StepKind::Oauth),
//!         ConfigStep::new("confirm", "Confirm", StepKind::Confirm),
//!     ]),
//!     my_adapter,
//! );
//!
//! let session = service.start_session("slack", "user-1")?;
//! let result = service
//!     .execute_step(&session.session_id, serde_json::Map::new())
//!     .await;
//! println!("options: {}", result.data);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod error;
mod executor;
pub mod pkce;
pub mod service;
pub mod session;
pub mod store;
pub mod workflow;

// Re-export key types at the crate root for convenience.
pub use adapter::{
    ConfigBackend, ConfigValidation, ConfigurableAdapter, MemoryConfigBackend,
    OAuthCallbackParams, OAuthUrlParams,
};
pub use error::ConfigEngineError;
pub use service::{AdapterConfigService, CONFIG_KEY_PREFIX};
pub use session::{ConfigSession, SessionStatus, StepResult, SESSION_IDLE_TIMEOUT_SECS};
pub use store::SessionStore;
pub use workflow::{ConfigStep, StepKind, WorkflowDefinition};
