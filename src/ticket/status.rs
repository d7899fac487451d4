//! Canonical ticket status and approval level parsing.
//!
//! The ticket API has shipped two spellings for the same approval stage
//! (`Pending Approval L1` and `Pending Level-1 Approval`). Every status string
//! entering the crate goes through [`TicketStatus::parse`] so the rest of the
//! code only ever matches on the enum.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Matches `L1`, `Level-1`, `Level 1`, `level1` as a whole word
static LEVEL_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bl(?:evel)?[-_ ]?([123])\b").expect("level marker regex is valid")
});

/// Sequential managerial sign-off stage
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, TS,
)]
#[ts(export)]
pub enum ApprovalLevel {
    L1,
    L2,
    L3,
}

impl ApprovalLevel {
    /// All levels in sign-off order
    pub const ALL: [ApprovalLevel; 3] = [ApprovalLevel::L1, ApprovalLevel::L2, ApprovalLevel::L3];

    pub fn number(self) -> u8 {
        match self {
            ApprovalLevel::L1 => 1,
            ApprovalLevel::L2 => 2,
            ApprovalLevel::L3 => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(ApprovalLevel::L1),
            2 => Some(ApprovalLevel::L2),
            3 => Some(ApprovalLevel::L3),
            _ => None,
        }
    }

    /// Find the first level marker in free text (`L2`, `Level-2`, ...)
    pub fn find_in(text: &str) -> Option<Self> {
        LEVEL_MARKER
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .and_then(Self::from_number)
    }
}

impl fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level-{}", self.number())
    }
}

/// Lifecycle status of a ticket, normalised from the API's status string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    Submitted,
    /// Waiting on a manager; the level is absent when the string carried none
    PendingApproval(Option<ApprovalLevel>),
    Approved,
    Rejected,
    Cancelled,
    Routed,
    InQueue,
    Assigned,
    InProgress,
    /// `Paused` and `On Hold`
    OnHold,
    WorkCompleted,
    /// `Completed - Awaiting IT Closure`
    AwaitingClosure,
    Confirmed,
    Closed,
    AutoClosed,
    Reopened,
    /// Anything the backend sends that we don't know yet
    Other(String),
}

impl TicketStatus {
    /// Parse a raw status string. Never fails: unknown values land in `Other`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = trimmed
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if normalized.contains("pending approval") || normalized.contains("pending level") {
            return TicketStatus::PendingApproval(ApprovalLevel::find_in(&normalized));
        }

        match normalized.as_str() {
            "submitted" | "new" | "open" => TicketStatus::Submitted,
            "approved" => TicketStatus::Approved,
            "rejected" => TicketStatus::Rejected,
            "cancelled" | "canceled" => TicketStatus::Cancelled,
            "routed" => TicketStatus::Routed,
            "in queue" | "queued" => TicketStatus::InQueue,
            "assigned" => TicketStatus::Assigned,
            "in progress" | "in-progress" => TicketStatus::InProgress,
            "paused" | "on hold" | "on-hold" => TicketStatus::OnHold,
            "work completed" | "completed" | "resolved" => TicketStatus::WorkCompleted,
            "completed - awaiting it closure" | "awaiting it closure" | "awaiting closure" => {
                TicketStatus::AwaitingClosure
            }
            "confirmed" => TicketStatus::Confirmed,
            "closed" => TicketStatus::Closed,
            "auto-closed" | "auto closed" | "autoclosed" => TicketStatus::AutoClosed,
            "reopened" | "re-opened" => TicketStatus::Reopened,
            s if s.contains("rejected") => TicketStatus::Rejected,
            s if s.contains("cancelled") || s.contains("canceled") => TicketStatus::Cancelled,
            _ => TicketStatus::Other(trimmed.to_string()),
        }
    }

    /// Approval level encoded in the status, if any
    pub fn approval_level(&self) -> Option<ApprovalLevel> {
        match self {
            TicketStatus::PendingApproval(level) => *level,
            _ => None,
        }
    }

    /// Still waiting on a manager
    pub fn is_pending_approval(&self) -> bool {
        matches!(self, TicketStatus::PendingApproval(_))
    }

    /// Pending a level, or approved but not yet routed
    pub fn is_in_approval_process(&self) -> bool {
        matches!(
            self,
            TicketStatus::PendingApproval(_) | TicketStatus::Approved
        )
    }

    /// Negative terminal outcome; the stepper stops here
    pub fn is_terminal_negative(&self) -> bool {
        matches!(self, TicketStatus::Rejected | TicketStatus::Cancelled)
    }

    /// Waiting in a queue for a specialist
    pub fn is_awaiting_routing(&self) -> bool {
        matches!(
            self,
            TicketStatus::Approved | TicketStatus::Routed | TicketStatus::InQueue
        )
    }

    /// Rank along the forward lifecycle, `None` for states off the main line
    fn stage(&self) -> Option<u8> {
        match self {
            TicketStatus::Submitted => Some(0),
            TicketStatus::PendingApproval(_) => Some(1),
            TicketStatus::Approved => Some(2),
            TicketStatus::Routed | TicketStatus::InQueue => Some(3),
            TicketStatus::Assigned => Some(4),
            TicketStatus::InProgress | TicketStatus::OnHold => Some(5),
            TicketStatus::WorkCompleted => Some(6),
            TicketStatus::AwaitingClosure => Some(7),
            TicketStatus::Confirmed => Some(8),
            TicketStatus::Closed | TicketStatus::AutoClosed => Some(9),
            TicketStatus::Reopened => Some(10),
            TicketStatus::Rejected | TicketStatus::Cancelled | TicketStatus::Other(_) => None,
        }
    }

    /// At `Assigned` or any later stage (a reopened ticket was assigned before)
    pub fn reached_assignment(&self) -> bool {
        self.stage().is_some_and(|s| s >= 4)
    }

    /// At `In Progress` or any later stage
    pub fn reached_progress(&self) -> bool {
        self.stage().is_some_and(|s| s >= 5)
    }

    /// Work finished: completion, confirmation or closure
    pub fn reached_completion(&self) -> bool {
        self.stage().is_some_and(|s| (6..=9).contains(&s))
    }

    /// Closed for good (manually or automatically)
    pub fn is_closed(&self) -> bool {
        matches!(self, TicketStatus::Closed | TicketStatus::AutoClosed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Submitted => write!(f, "Submitted"),
            TicketStatus::PendingApproval(Some(level)) => write!(f, "Pending {level} Approval"),
            TicketStatus::PendingApproval(None) => write!(f, "Pending Approval"),
            TicketStatus::Approved => write!(f, "Approved"),
            TicketStatus::Rejected => write!(f, "Rejected"),
            TicketStatus::Cancelled => write!(f, "Cancelled"),
            TicketStatus::Routed => write!(f, "Routed"),
            TicketStatus::InQueue => write!(f, "In Queue"),
            TicketStatus::Assigned => write!(f, "Assigned"),
            TicketStatus::InProgress => write!(f, "In Progress"),
            TicketStatus::OnHold => write!(f, "On Hold"),
            TicketStatus::WorkCompleted => write!(f, "Work Completed"),
            TicketStatus::AwaitingClosure => write!(f, "Completed - Awaiting IT Closure"),
            TicketStatus::Confirmed => write!(f, "Confirmed"),
            TicketStatus::Closed => write!(f, "Closed"),
            TicketStatus::AutoClosed => write!(f, "Auto-Closed"),
            TicketStatus::Reopened => write!(f, "Reopened"),
            TicketStatus::Other(raw) => write!(f, "{raw}"),
        }
    }
}

impl From<&str> for TicketStatus {
    fn from(raw: &str) -> Self {
        TicketStatus::parse(raw)
    }
}
