//! Remote ticket API.
//!
//! The helpdesk backend owns ticket state; this crate only reads snapshots and
//! forwards user actions. [`HelpdeskService`] is the seam: the HTTP client is
//! the production implementation, [`InMemoryHelpdeskService`] backs local runs
//! and tests.

mod error;
mod http;
mod memory;

pub use error::ServiceError;
pub use http::HttpHelpdeskService;
pub use memory::InMemoryHelpdeskService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ticket::Ticket;

/// A user action on a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TicketAction {
    Approve,
    Reject,
    Assign {
        #[serde(rename = "assigneeId")]
        assignee_id: String,
    },
    StartProgress,
    Complete,
    Confirm,
    Close,
    Reopen,
}

impl TicketAction {
    /// Path segment of the action endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            TicketAction::Approve => "approve",
            TicketAction::Reject => "reject",
            TicketAction::Assign { .. } => "assign",
            TicketAction::StartProgress => "progress",
            TicketAction::Complete => "complete",
            TicketAction::Confirm => "confirm",
            TicketAction::Close => "close",
            TicketAction::Reopen => "reopen",
        }
    }

    /// Verb used in success messages ("Ticket HD-1 approved")
    pub fn past_tense(&self) -> &'static str {
        match self {
            TicketAction::Approve => "approved",
            TicketAction::Reject => "rejected",
            TicketAction::Assign { .. } => "assigned",
            TicketAction::StartProgress => "started",
            TicketAction::Complete => "completed",
            TicketAction::Confirm => "confirmed",
            TicketAction::Close => "closed",
            TicketAction::Reopen => "reopened",
        }
    }

    /// Verb used in failure messages ("Failed to approve ticket")
    pub fn imperative(&self) -> &'static str {
        match self {
            TicketAction::StartProgress => "start work on",
            other => other.endpoint(),
        }
    }

    pub fn assignee_id(&self) -> Option<&str> {
        match self {
            TicketAction::Assign { assignee_id } => Some(assignee_id),
            _ => None,
        }
    }

    /// Build an action from its endpoint name; `assign` needs an assignee
    pub fn parse(name: &str, assignee_id: Option<&str>) -> Result<Self, String> {
        match name.trim().to_lowercase().as_str() {
            "approve" => Ok(TicketAction::Approve),
            "reject" => Ok(TicketAction::Reject),
            "assign" => assignee_id
                .filter(|id| !id.is_empty())
                .map(|id| TicketAction::Assign {
                    assignee_id: id.to_string(),
                })
                .ok_or_else(|| "assign requires an assignee".to_string()),
            "progress" | "start" | "start-progress" => Ok(TicketAction::StartProgress),
            "complete" => Ok(TicketAction::Complete),
            "confirm" => Ok(TicketAction::Confirm),
            "close" => Ok(TicketAction::Close),
            "reopen" => Ok(TicketAction::Reopen),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

impl FromStr for TicketAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketAction::parse(s, None)
    }
}

/// Action plus the acting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: TicketAction,
    pub actor_id: String,
    pub notes: Option<String>,
}

impl ActionRequest {
    pub fn new(action: TicketAction, actor_id: impl Into<String>) -> Self {
        Self {
            action,
            actor_id: actor_id.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// JSON body sent to the action endpoint
    pub fn body(&self) -> ActionBody {
        ActionBody {
            actor_id: self.actor_id.clone(),
            notes: self.notes.clone(),
            assignee_id: self.action.assignee_id().map(str::to_string),
        }
    }
}

/// Wire body of an action call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBody {
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

/// Query for ticket lists; unset fields don't filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
}

impl TicketFilter {
    /// Query string pairs for the set fields
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("status", self.status.as_deref()),
            ("assignedTo", self.assigned_to.as_deref()),
            ("requester", self.requester.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// Client of the helpdesk ticket API
#[async_trait]
pub trait HelpdeskService: Send + Sync {
    /// Backend name (for logging)
    fn name(&self) -> &str;

    /// Fetch one ticket snapshot
    async fn get_ticket(&self, id: &str) -> Result<Ticket, ServiceError>;

    /// List tickets matching a filter
    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, ServiceError>;

    /// Perform an action and return the updated ticket
    async fn perform(&self, id: &str, request: &ActionRequest) -> Result<Ticket, ServiceError>;
}
