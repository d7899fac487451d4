//! Ticket snapshot as delivered by the helpdesk ticket API.
//!
//! Every field is optional: the API returns partially populated records for
//! legacy tickets, and the stepper has to cope with all of them.

pub mod history;
pub mod status;

pub use history::{Decision, HistoryEntry, Lifecycle, ProgressState, Transition, TransitionRecord};
pub use status::{ApprovalLevel, TicketStatus};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use utoipa::ToSchema;

/// A single helpdesk request record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-facing ticket number (e.g., "HD-2024-0042")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Raw status string; see [`TicketStatus::parse`]
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<Approval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<Processing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Append-only transition log, oldest first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Department the ticket was routed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routed_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_level_category: Option<String>,
    /// Requester's line manager, the implicit level 1 approver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Multi-level approval state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub bypassed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level1: Option<LevelApproval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level2: Option<LevelApproval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level3: Option<LevelApproval>,
}

fn default_required() -> bool {
    true
}

impl Default for Approval {
    fn default() -> Self {
        Self {
            required: default_required(),
            bypassed: false,
            current_level: None,
            level1: None,
            level2: None,
            level3: None,
        }
    }
}

impl Approval {
    /// Live sub-object for a level
    pub fn level(&self, level: ApprovalLevel) -> Option<&LevelApproval> {
        match level {
            ApprovalLevel::L1 => self.level1.as_ref(),
            ApprovalLevel::L2 => self.level2.as_ref(),
            ApprovalLevel::L3 => self.level3.as_ref(),
        }
    }

    /// Populated levels in sign-off order
    pub fn levels(&self) -> impl Iterator<Item = (ApprovalLevel, &LevelApproval)> {
        ApprovalLevel::ALL
            .into_iter()
            .filter_map(|level| self.level(level).map(|l| (level, l)))
    }

    /// Approval was skipped for this ticket
    pub fn is_waived(&self) -> bool {
        !self.required || self.bypassed
    }

    /// Every populated level has signed off
    pub fn all_levels_approved(&self) -> bool {
        self.levels()
            .all(|(_, l)| l.status == LevelStatus::Approved)
    }
}

/// Decision state of one approval level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub enum LevelStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelApproval {
    #[serde(default)]
    pub status: LevelStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// Someone is actually named on the assignment
    pub fn has_assignee(&self) -> bool {
        self.assigned_to_id.as_deref().is_some_and(|s| !s.is_empty())
            || self.assigned_to_name.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Processing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist_queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Load a ticket snapshot from a JSON or YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read ticket file")?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            serde_yaml::from_str(&content).context("Failed to parse ticket YAML")
        } else {
            serde_json::from_str(&content).context("Failed to parse ticket JSON")
        }
    }

    /// Canonical status
    pub fn status(&self) -> TicketStatus {
        TicketStatus::parse(&self.status)
    }

    /// Typed history records, oldest first
    pub fn transitions(&self) -> Vec<TransitionRecord> {
        self.history.iter().map(TransitionRecord::from_entry).collect()
    }

    /// Fold of the history log
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::fold(&self.transitions())
    }

    /// Requester display name
    pub fn requester(&self) -> Option<&str> {
        self.requester_name
            .as_deref()
            .or(self.user_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Identifier for messages: ticket number, then id
    pub fn display_id(&self) -> &str {
        self.ticket_number
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("unknown")
    }

    /// Department the ticket was (or will be) routed to
    pub fn routed_department(&self) -> Option<&str> {
        self.routed_to
            .as_deref()
            .or_else(|| {
                self.processing
                    .as_ref()
                    .and_then(|p| p.processing_queue.as_deref())
            })
            .or(self.high_level_category.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Pre-routing tickets that never got `processing` or `assignment`
    pub fn is_legacy(&self) -> bool {
        self.processing.is_none() && self.assignment.is_none()
    }
}

/// Partial records send `null` for text fields they don't have
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
