//! The device-authorization pairing flow.
//!
//! One [`ProvisioningFlow`] walks an agent through connecting to a remote
//! node: pick a region (or enter a portal manually), request a device code,
//! have the user approve it in a browser while the caller polls, then
//! validate and apply the provisioned identity. Polling is caller-driven —
//! every operation here is one request/response; nothing loops or sleeps
//! internally.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::digest;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::device::{
    DeviceAuthStart, DeviceAuthorizeRequest, DeviceTokenRequest, PollErrorResponse, PollOutcome,
    ProvisionedIdentity, RawDeviceAuthorizeResponse,
};
use crate::error::{ProvisionError, Result};
use crate::region::{RegionDescriptor, builtin_regions};

/// Where the provisioned signing key lands unless the embedder overrides it.
const DEFAULT_KEY_PATH: &str = "data/node_signing.key";

/// Hex characters kept from the agent identifier hash.
const AGENT_HASH_LEN: usize = 16;

/// Outcome of validating the flow before apply.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Whether the flow may be applied.
    pub valid: bool,
    /// Explanation when `valid` is false.
    pub error: Option<String>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// State machine for pairing one agent with a node portal.
pub struct ProvisioningFlow {
    http: reqwest::Client,
    agent_id: String,
    key_path: PathBuf,
    portal_url: Option<String>,
    device_code: Option<String>,
    user_code: Option<String>,
    result: Option<ProvisionedIdentity>,
    applied_config: Option<Value>,
}

impl ProvisioningFlow {
    /// Create a flow for the given agent identifier.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent("Tether/0.1.0")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            agent_id: agent_id.into(),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            portal_url: None,
            device_code: None,
            user_code: None,
            result: None,
            applied_config: None,
        }
    }

    /// Override where the signing key is persisted.
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = path.into();
        self
    }

    /// The hosted regions an agent can pair into. Empty means the caller
    /// must collect portal details manually.
    pub fn discover_regions(&self) -> Vec<RegionDescriptor> {
        builtin_regions()
    }

    /// Request a device/user code pair from the portal.
    ///
    /// The request carries only a truncated hash of the agent identifier
    /// and a "has signing key" flag — never the identifier or key material.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Network`] on transport failure and
    /// [`ProvisionError::Portal`] when the portal refuses or returns an
    /// unusable response.
    pub async fn start_device_authorization(&mut self, portal_url: &str) -> Result<DeviceAuthStart> {
        let portal_url = portal_url.trim_end_matches('/').to_string();
        let url = format!("{portal_url}/api/device/authorize");

        let request = DeviceAuthorizeRequest {
            agent_hash: truncated_agent_hash(&self.agent_id),
            has_signing_key: self.key_path.exists(),
        };

        debug!(portal_url = %portal_url, "requesting device authorization");

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Portal {
                reason: format!("device authorization failed: HTTP {status}: {body}"),
            });
        }

        let raw: RawDeviceAuthorizeResponse = response.json().await?;
        let verification_url = raw
            .verification_uri
            .or(raw.verification_url)
            .ok_or_else(|| ProvisionError::Portal {
                reason: "device authorization response missing verification URL".to_string(),
            })?;

        self.portal_url = Some(portal_url);
        self.device_code = Some(raw.device_code);
        self.user_code = Some(raw.user_code.clone());

        info!(user_code = %raw.user_code, "device authorization started");

        Ok(DeviceAuthStart {
            user_code: raw.user_code,
            verification_url,
            interval_secs: raw.interval,
            expires_in_secs: raw.expires_in,
        })
    }

    /// Poll the portal's token endpoint once.
    ///
    /// Pending states (including `slow_down`) ask the caller to try again
    /// later; everything the portal or transport refuses comes back as
    /// [`PollOutcome::Failed`] with the raw error text. On completion the
    /// provisioned identity is stored on the flow for validate/apply.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidState`] when called before a device
    /// code was issued.
    pub async fn poll_device_authorization(&mut self) -> Result<PollOutcome> {
        let (portal_url, device_code) = match (&self.portal_url, &self.device_code) {
            (Some(portal), Some(code)) => (portal.clone(), code.clone()),
            _ => {
                return Err(ProvisionError::InvalidState {
                    reason: "no device code issued; call start_device_authorization first"
                        .to_string(),
                });
            }
        };

        let url = format!("{portal_url}/api/device/token");
        let response = match self
            .http
            .post(&url)
            .json(&DeviceTokenRequest { device_code })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return Ok(PollOutcome::Failed {
                    error: err.to_string(),
                });
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            let Ok(parsed) = serde_json::from_str::<Value>(&body) else {
                return Ok(PollOutcome::Failed {
                    error: format!("unparseable token response: {body}"),
                });
            };
            return Ok(match parsed.get("status").and_then(Value::as_str) {
                Some("complete") => match serde_json::from_value::<ProvisionedIdentity>(parsed) {
                    Ok(identity) => {
                        info!("device authorization complete");
                        self.result = Some(identity.clone());
                        PollOutcome::Complete(identity)
                    }
                    Err(err) => PollOutcome::Failed {
                        error: format!("unparseable provisioning result: {err}"),
                    },
                },
                Some("pending") => PollOutcome::Pending { slow_down: false },
                other => PollOutcome::Failed {
                    error: format!("unexpected token status: {other:?}"),
                },
            });
        }

        if status == reqwest::StatusCode::BAD_REQUEST {
            if let Ok(poll_error) = serde_json::from_str::<PollErrorResponse>(&body) {
                return Ok(match poll_error.error.as_str() {
                    "authorization_pending" => {
                        debug!("authorization pending, caller should retry");
                        PollOutcome::Pending { slow_down: false }
                    }
                    "slow_down" => {
                        debug!("slow_down received, caller should stretch its interval");
                        PollOutcome::Pending { slow_down: true }
                    }
                    _ => PollOutcome::Failed {
                        error: poll_error.error,
                    },
                });
            }
        }

        Ok(PollOutcome::Failed {
            error: format!("HTTP {status}: {body}"),
        })
    }

    /// Check the flow is ready to apply.
    ///
    /// Requires a completed authorization, a provisioned signing key, and a
    /// node URL. Also probes `{node_url}/health` as a courtesy; the node
    /// being unreachable right now is logged but does not fail validation.
    pub async fn validate(&self) -> ValidationOutcome {
        let Some(result) = &self.result else {
            return ValidationOutcome::invalid("no provisioning result to validate");
        };
        if result.signing_key.is_none() {
            return ValidationOutcome::invalid("portal did not provision a signing key");
        }
        let Some(node_url) = &result.node_url else {
            return ValidationOutcome::invalid("portal did not return a node URL");
        };

        let health_url = format!("{}/health", node_url.trim_end_matches('/'));
        match self.http.get(&health_url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(node_url = %node_url, "node health probe ok");
            }
            Ok(response) => {
                warn!(
                    node_url = %node_url,
                    status = %response.status(),
                    "node health probe returned non-success"
                );
            }
            Err(err) => {
                warn!(node_url = %node_url, error = %err, "node health probe failed");
            }
        }

        ValidationOutcome::ok()
    }

    /// Persist the provisioned identity.
    ///
    /// When a signing key was provisioned it is base64-decoded and written
    /// to the key path with owner-only permissions; a failure there fails
    /// the whole apply. The full result is stored as the flow's applied
    /// configuration either way.
    pub fn apply(&mut self) -> bool {
        let Some(result) = self.result.clone() else {
            warn!("apply requested with no provisioning result");
            return false;
        };

        if let Some(key_b64) = &result.signing_key {
            if let Err(err) = self.persist_signing_key(key_b64) {
                warn!(error = %err, "failed to persist signing key");
                return false;
            }
        }

        self.applied_config = Some(serde_json::to_value(&result).unwrap_or(Value::Null));
        info!("provisioned identity applied");
        true
    }

    /// The identity returned by a completed authorization, if any.
    pub fn result(&self) -> Option<&ProvisionedIdentity> {
        self.result.as_ref()
    }

    /// The configuration stored by a successful apply, if any.
    pub fn applied_config(&self) -> Option<&Value> {
        self.applied_config.as_ref()
    }

    /// The user code issued for this flow, if authorization has started.
    pub fn user_code(&self) -> Option<&str> {
        self.user_code.as_deref()
    }

    /// Where this flow persists the signing key.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn persist_signing_key(&self, key_b64: &str) -> Result<()> {
        let bytes = STANDARD
            .decode(key_b64)
            .map_err(|err| ProvisionError::KeyDecode {
                reason: err.to_string(),
            })?;

        if let Some(parent) = self.key_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.key_path, &bytes)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.key_path, perms)?;
        }

        info!(path = %self.key_path.display(), "signing key persisted");
        Ok(())
    }
}

/// Truncated SHA-256 of the agent identifier, hex encoded. Enough to
/// correlate requests on the portal side without revealing the identifier.
fn truncated_agent_hash(agent_id: &str) -> String {
    let hash = digest::digest(&digest::SHA256, agent_id.as_bytes());
    hash.as_ref()
        .iter()
        .take(AGENT_HASH_LEN / 2)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
