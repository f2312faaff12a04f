//! Device-authorization pairing for Tether agents.
//!
//! This crate connects an already-provisioned agent identity to a remote
//! node via the OAuth 2.0 Device Authorization Grant (RFC 8628): the agent
//! requests a device code from a regional portal, the user approves it in a
//! browser, and the caller polls until the portal hands back a provisioned
//! identity (template, approved adapters, signing key, node URL). The flow
//! then validates the result and persists the signing key locally.
//!
//! Unlike a classic device grant client, polling here is caller-driven:
//! every operation is a single request/response so the flow can live behind
//! an HTTP API without background tasks.
//!
//! # Flow Overview
//!
//! 1. Pick a region from [`region::builtin_regions`] (or enter a portal
//!    manually).
//! 2. [`ProvisioningFlow::start_device_authorization`] — display the user
//!    code and verification URL.
//! 3. [`ProvisioningFlow::poll_device_authorization`] — repeat until
//!    [`PollOutcome::Complete`], stretching the interval on `slow_down`.
//! 4. [`ProvisioningFlow::validate`] then [`ProvisioningFlow::apply`].

pub mod device;
pub mod error;
pub mod flow;
pub mod region;

// Re-export key types at the crate root for convenience.
pub use device::{
    DeviceAuthStart, DeviceAuthorizeRequest, PollOutcome, ProvisionedIdentity, next_poll_interval,
};
pub use error::ProvisionError;
pub use flow::{ProvisioningFlow, ValidationOutcome};
pub use region::{RegionDescriptor, builtin_regions};
