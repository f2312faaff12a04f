//! Workflow definitions — the ordered step list a configuration session
//! walks through.
//!
//! Each adapter type registers one [`WorkflowDefinition`]: a sequence of
//! [`ConfigStep`]s, each of a concrete [`StepKind`]. The executor matches
//! exhaustively over the kind, so every step type is guaranteed a handler.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The behavior of a single configuration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum StepKind {
    /// Probe the adapter for available items (devices, channels, servers).
    /// Re-entrant: an empty result leaves the session on the same step so
    /// the caller can retry once something is plugged in or comes online.
    Discovery {
        /// Which of the adapter's discovery methods to invoke.
        discovery_type: String,
    },
    /// Two-phase OAuth authorization-code exchange with PKCE. Phase one
    /// issues the authorization URL; phase two consumes the redirect code.
    Oauth,
    /// Pick one item from a list the adapter offers.
    Select,
    /// Collect free-form key/value input from the user.
    Input,
    /// Show the accumulated configuration for a final look before commit.
    Confirm,
}

/// A single step within a configuration workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigStep {
    /// Stable identifier; also the key collected values are stored under
    /// for select steps.
    pub step_id: String,
    /// Human-readable title (display only).
    pub title: String,
    /// Optional longer description (display only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What this step does.
    #[serde(flatten)]
    pub kind: StepKind,
}

impl ConfigStep {
    /// Create a new step with the given id, title, and kind.
    pub fn new(step_id: impl Into<String>, title: impl Into<String>, kind: StepKind) -> Self {
        Self {
            step_id: step_id.into(),
            title: title.into(),
            description: None,
            kind,
        }
    }

    /// Set the description for this step.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The ordered list of steps an adapter type's configuration session must
/// walk through. Registered once per adapter type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Steps in execution order.
    pub steps: Vec<ConfigStep>,
}

impl WorkflowDefinition {
    /// Create a workflow from an ordered step list.
    pub fn new(steps: Vec<ConfigStep>) -> Self {
        Self { steps }
    }

    /// Number of steps in this workflow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether this workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step at `index`, or `None` once the session has run past the end.
    pub fn step_at(&self, index: usize) -> Option<&ConfigStep> {
        self.steps.get(index)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kind_serialization_uses_step_type_tag() {
        let step = ConfigStep::new(
            "find_device",
            "Find your device",
            StepKind::Discovery {
                discovery_type: "usb".to_string(),
            },
        );
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step_type"], "discovery");
        assert_eq!(json["discovery_type"], "usb");
        assert_eq!(json["step_id"], "find_device");
    }

    #[test]
    fn unit_kinds_serialize_with_tag_only() {
        let step = ConfigStep::new("authorize", "Authorize", StepKind::Oauth);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step_type"], "oauth");
    }

    #[test]
    fn step_deserialization_roundtrip() {
        let json = r#"{
            "step_id": "pick_channel",
            "title": "Pick a channel",
            "description": "Choose where messages go",
            "step_type": "select"
        }"#;
        let step: ConfigStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.step_id, "pick_channel");
        assert_eq!(step.kind, StepKind::Select);
        assert_eq!(step.description.as_deref(), Some("Choose where messages go"));
    }

    #[test]
    fn step_at_past_end_is_none() {
        let workflow = WorkflowDefinition::new(vec![ConfigStep::new(
            "confirm",
            "Confirm",
            StepKind::Confirm,
        )]);
        assert_eq!(workflow.len(), 1);
        assert!(workflow.step_at(0).is_some());
        assert!(workflow.step_at(1).is_none());
    }
}
