//! Wire types for the portal's device-authorization endpoints (RFC 8628).
//!
//! The portal exposes two endpoints: `/api/device/authorize` issues a
//! device/user code pair, and `/api/device/token` is polled until the user
//! approves the pairing in their browser.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// The privacy-preserving agent descriptor sent when requesting a device
/// code. Carries a truncated hash of the agent identifier and whether a
/// signing key already exists locally — never the raw identifier or any key
/// material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorizeRequest {
    /// Truncated SHA-256 of the agent identifier (hex).
    pub agent_hash: String,
    /// Whether a signing key is already present on this host.
    pub has_signing_key: bool,
}

/// Poll body for the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTokenRequest {
    /// The device verification code issued at authorization time.
    pub device_code: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Raw device authorization response from the portal.
///
/// Some portals use `verification_url` instead of `verification_uri`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDeviceAuthorizeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: Option<String>,
    pub verification_url: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// What the caller needs to display after device authorization starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthStart {
    /// The short code the user enters in their browser.
    pub user_code: String,
    /// Where the user enters it.
    pub verification_url: String,
    /// Minimum seconds between polls.
    pub interval_secs: u64,
    /// Lifetime of the codes in seconds.
    pub expires_in_secs: u64,
}

/// The identity the portal provisions once the user approves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedIdentity {
    /// Agent template selected during approval.
    #[serde(default)]
    pub template: Value,
    /// Adapter types the operator approved for this agent.
    #[serde(default)]
    pub approved_adapters: Vec<String>,
    /// Base64-encoded signing key, when one was provisioned.
    pub signing_key: Option<String>,
    /// Identifier of the provisioned key.
    pub key_id: Option<String>,
    /// Organization the agent was enrolled into.
    pub org_id: Option<String>,
    /// Stewardship tier assigned by the operator.
    pub stewardship_tier: Option<i64>,
    /// The node the agent should connect to.
    pub node_url: Option<String>,
}

/// Error body from the token endpoint while authorization is pending.
#[derive(Debug, Deserialize)]
pub(crate) struct PollErrorResponse {
    pub error: String,
    #[allow(dead_code)]
    pub error_description: Option<String>,
}

/// Outcome of one poll against the token endpoint.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The user approved; the provisioned identity is ready.
    Complete(ProvisionedIdentity),
    /// Not approved yet; poll again after the interval. `slow_down` asks
    /// the caller to stretch its interval first.
    Pending {
        /// The portal asked for a longer interval.
        slow_down: bool,
    },
    /// The portal refused; the raw error text is preserved.
    Failed {
        /// What the portal (or the transport) said.
        error: String,
    },
}

/// The interval to use for the next poll, growing by 5 seconds on
/// `slow_down` per RFC 8628 section 3.5.
pub fn next_poll_interval(current_secs: u64, slow_down: bool) -> u64 {
    if slow_down {
        current_secs + 5
    } else {
        current_secs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
