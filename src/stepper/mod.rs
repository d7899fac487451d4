//! Ticket lifecycle stepper.
//!
//! Turns a ticket snapshot into the ordered list of lifecycle steps drawn by the
//! dashboards' horizontal progress stepper. The derivation is a pure function of
//! the snapshot; see [`resolve_steps`].

mod resolver;

pub use resolver::{resolve_steps, resolve_steps_with};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::config::StepperConfig;

/// Visual state of one step
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum StepStatus {
    Completed,
    Active,
    Pending,
    Rejected,
}

impl StepStatus {
    /// Single-character marker for text rendering
    pub fn glyph(&self) -> &'static str {
        match self {
            StepStatus::Completed => "✓",
            StepStatus::Active => "▶",
            StepStatus::Pending => "○",
            StepStatus::Rejected => "✗",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Active => write!(f, "active"),
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// One lifecycle stage on the stepper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Step {
    /// Stable identifier (e.g., "approval-l2", "assigned-2")
    pub id: String,
    pub label: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, label: impl Into<String>, status: StepStatus) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status,
            timestamp: None,
            description: None,
        }
    }

    pub fn at(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn describe_opt(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Tone of the connector line drawn between two adjacent steps
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Connector {
    /// Both ends done
    Completed,
    /// Done step leading into the active one
    Progress,
    /// Either end rejected
    Rejected,
    Pending,
}

/// Connector tone for a pair of adjacent step statuses
pub fn connector_between(from: StepStatus, to: StepStatus) -> Connector {
    match (from, to) {
        (StepStatus::Rejected, _) | (_, StepStatus::Rejected) => Connector::Rejected,
        (StepStatus::Completed, StepStatus::Completed) => Connector::Completed,
        (StepStatus::Completed, StepStatus::Active) => Connector::Progress,
        _ => Connector::Pending,
    }
}

/// Render-ready view model: steps plus the connectors between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Stepper {
    pub steps: Vec<Step>,
    /// `connectors[i]` joins `steps[i]` and `steps[i + 1]`
    pub connectors: Vec<Connector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub active_index: Option<usize>,
}

impl Stepper {
    pub fn from_steps(steps: Vec<Step>) -> Self {
        let connectors = steps
            .windows(2)
            .map(|pair| connector_between(pair[0].status, pair[1].status))
            .collect();
        let active_index = steps.iter().position(|s| s.status == StepStatus::Active);

        Self {
            steps,
            connectors,
            active_index,
        }
    }

    /// The step currently being worked on, if any
    pub fn active(&self) -> Option<&Step> {
        self.active_index.and_then(|i| self.steps.get(i))
    }

    /// One line per step for terminal output
    pub fn render_lines(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| {
                let mut line = format!("{} {:<22}", step.status.glyph(), step.label);
                if let Some(ref description) = step.description {
                    line.push_str(&format!(" {description}"));
                }
                if let Some(timestamp) = step.timestamp {
                    line.push_str(&format!(" ({})", timestamp.format("%Y-%m-%d %H:%M")));
                }
                line
            })
            .collect()
    }
}

/// Placeholders used when a ticket doesn't carry the name we need
#[derive(Debug, Clone, PartialEq)]
pub struct StepperOptions {
    /// Department assumed for legacy tickets without `processing` or `assignment`
    pub legacy_queue: String,
    /// Shown when nobody is named on an assignment
    pub specialist_placeholder: String,
    /// Shown when an approval level has no named approver
    pub approver_placeholder: String,
}

impl Default for StepperOptions {
    fn default() -> Self {
        Self::from(&StepperConfig::default())
    }
}

impl From<&StepperConfig> for StepperOptions {
    fn from(config: &StepperConfig) -> Self {
        Self {
            legacy_queue: config.legacy_queue.clone(),
            specialist_placeholder: config.specialist_placeholder.clone(),
            approver_placeholder: config.approver_placeholder.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_tones() {
        use StepStatus::*;
        assert_eq!(connector_between(Completed, Completed), Connector::Completed);
        assert_eq!(connector_between(Completed, Active), Connector::Progress);
        assert_eq!(connector_between(Completed, Rejected), Connector::Rejected);
        assert_eq!(connector_between(Rejected, Pending), Connector::Rejected);
        assert_eq!(connector_between(Active, Pending), Connector::Pending);
        assert_eq!(connector_between(Completed, Pending), Connector::Pending);
    }

    #[test]
    fn test_stepper_connectors_and_active_index() {
        let stepper = Stepper::from_steps(vec![
            Step::new("submitted", "Submitted", StepStatus::Completed),
            Step::new("routed", "Routed", StepStatus::Completed),
            Step::new("assigned", "Assigned", StepStatus::Active),
        ]);
        assert_eq!(
            stepper.connectors,
            vec![Connector::Completed, Connector::Progress]
        );
        assert_eq!(stepper.active_index, Some(2));
        assert_eq!(stepper.active().unwrap().id, "assigned");
    }

    #[test]
    fn test_single_step_has_no_connectors() {
        let stepper =
            Stepper::from_steps(vec![Step::new("submitted", "Submitted", StepStatus::Completed)]);
        assert!(stepper.connectors.is_empty());
        assert!(stepper.active().is_none());
    }

    #[test]
    fn test_step_serializes_lowercase_status_and_skips_empty_fields() {
        let step = Step::new("routed", "Routed", StepStatus::Active).describe("Routed to IT");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["description"], "Routed to IT");
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_render_lines_include_glyph_and_description() {
        let stepper = Stepper::from_steps(vec![
            Step::new("submitted", "Submitted", StepStatus::Completed),
            Step::new("rejected", "Rejected", StepStatus::Rejected).describe("Rejected by Dana"),
        ]);
        let lines = stepper.render_lines();
        assert!(lines[0].starts_with("✓ Submitted"));
        assert!(lines[1].starts_with("✗ Rejected"));
        assert!(lines[1].contains("Rejected by Dana"));
    }

    #[test]
    fn test_default_options() {
        let options = StepperOptions::default();
        assert_eq!(options.legacy_queue, "IT/Hardware");
        assert_eq!(options.specialist_placeholder, "IT Specialist");
        assert_eq!(options.approver_placeholder, "Manager");
    }
}
