//! Region catalog for the hosted node portals.
//!
//! Pairing starts by picking a region (or entering portal details manually,
//! in which case the caller skips the catalog entirely).

use serde::{Deserialize, Serialize};

/// One hosted region an agent can pair into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Stable region identifier (e.g. "us-east").
    pub id: String,
    /// Human-readable label for pickers.
    pub label: String,
    /// Portal base URL for device authorization.
    pub portal_url: String,
    /// Node base URL agents connect to after pairing.
    pub node_url: String,
}

impl RegionDescriptor {
    fn new(id: &str, label: &str, portal_url: &str, node_url: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            portal_url: portal_url.to_string(),
            node_url: node_url.to_string(),
        }
    }
}

/// The built-in hosted regions. An empty return means manual entry only.
pub fn builtin_regions() -> Vec<RegionDescriptor> {
    vec![
        RegionDescriptor::new(
            "us-east",
            "United States (East)",
            "https://portal.us-east.tethergrid.net",
            "https://node.us-east.tethergrid.net",
        ),
        RegionDescriptor::new(
            "eu-central",
            "Europe (Central)",
            "https://portal.eu-central.tethergrid.net",
            "https://node.eu-central.tethergrid.net",
        ),
        RegionDescriptor::new(
            "ap-southeast",
            "Asia Pacific (Southeast)",
            "https://portal.ap-southeast.tethergrid.net",
            "https://node.ap-southeast.tethergrid.net",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
