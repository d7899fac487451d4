//! Typed view over the ticket history log.
//!
//! The API records every transition as a free-text `action`. Entries are
//! classified exactly once, here, into [`Transition`] values; the rest of the
//! crate folds over those instead of matching strings.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::status::{ApprovalLevel, TicketStatus};

/// Captures the target of "Assigned to X" / "Routed to X"
static TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bto\s+(.+?)[\s.]*$").expect("target regex is valid"));

/// Raw history entry as stored by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "crate::ticket::null_as_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Status the ticket moved into, when the backend recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
}

impl HistoryEntry {
    /// Convenience constructor used by fixtures and tests
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.performed_by = Some(actor.into());
        self
    }

    pub fn with_new_status(mut self, status: impl Into<String>) -> Self {
        self.new_status = Some(status.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    InProgress,
    OnHold,
}

/// Kind of transition recorded in the history log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Created,
    ApprovalDecision {
        level: ApprovalLevel,
        decision: Decision,
    },
    /// Rejection not tied to an approval level
    Rejected,
    Cancelled,
    Routed {
        to: Option<String>,
    },
    Assigned {
        to: Option<String>,
    },
    ProgressChanged {
        state: ProgressState,
    },
    Completed,
    Confirmed,
    Closed {
        auto: bool,
    },
    Reopened,
    /// Comments, attachments and anything else that doesn't move the ticket
    Note,
}

impl Transition {
    /// Classify a free-text action. Checks run in a fixed precedence order so
    /// that e.g. "Reassigned after reopen" counts as a reopen.
    pub fn classify(action: &str) -> Self {
        let text = action.to_lowercase();
        let has = |needle: &str| text.contains(needle);

        if has("reopen") || has("re-open") {
            Transition::Reopened
        } else if has("cancel") {
            Transition::Cancelled
        } else if has("reject") {
            match ApprovalLevel::find_in(&text) {
                Some(level) => Transition::ApprovalDecision {
                    level,
                    decision: Decision::Rejected,
                },
                None => Transition::Rejected,
            }
        } else if has("approved") {
            match ApprovalLevel::find_in(&text) {
                Some(level) => Transition::ApprovalDecision {
                    level,
                    decision: Decision::Approved,
                },
                None => Transition::Note,
            }
        } else if has("auto-closed") || has("auto closed") || has("autoclosed") {
            Transition::Closed { auto: true }
        } else if has("closed") {
            Transition::Closed { auto: false }
        } else if has("confirm") {
            Transition::Confirmed
        } else if has("completed") || has("resolved") {
            Transition::Completed
        } else if has("paused") || has("on hold") {
            Transition::ProgressChanged {
                state: ProgressState::OnHold,
            }
        } else if has("in progress") || has("working") || has("work started") || has("resumed")
        {
            Transition::ProgressChanged {
                state: ProgressState::InProgress,
            }
        } else if has("assigned") {
            Transition::Assigned {
                to: target_of(action),
            }
        } else if has("routed") || has("queue") {
            Transition::Routed {
                to: target_of(action),
            }
        } else if has("created") || has("submitted") {
            Transition::Created
        } else {
            Transition::Note
        }
    }

    /// Map a recorded `newStatus`. Returns `None` when the status alone can't
    /// tell what happened (approval decisions need the action text for the level).
    fn from_status(status: &TicketStatus, action: &str) -> Option<Self> {
        match status {
            TicketStatus::Submitted => Some(Transition::Created),
            TicketStatus::PendingApproval(_) | TicketStatus::Approved => None,
            TicketStatus::Rejected => match Transition::classify(action) {
                decision @ Transition::ApprovalDecision { .. } => Some(decision),
                _ => Some(Transition::Rejected),
            },
            TicketStatus::Cancelled => Some(Transition::Cancelled),
            TicketStatus::Routed | TicketStatus::InQueue => Some(Transition::Routed {
                to: target_of(action),
            }),
            TicketStatus::Assigned => Some(Transition::Assigned {
                to: target_of(action),
            }),
            TicketStatus::InProgress => Some(Transition::ProgressChanged {
                state: ProgressState::InProgress,
            }),
            TicketStatus::OnHold => Some(Transition::ProgressChanged {
                state: ProgressState::OnHold,
            }),
            TicketStatus::WorkCompleted | TicketStatus::AwaitingClosure => {
                Some(Transition::Completed)
            }
            TicketStatus::Confirmed => Some(Transition::Confirmed),
            TicketStatus::Closed => Some(Transition::Closed { auto: false }),
            TicketStatus::AutoClosed => Some(Transition::Closed { auto: true }),
            TicketStatus::Reopened => Some(Transition::Reopened),
            TicketStatus::Other(_) => None,
        }
    }
}

fn target_of(action: &str) -> Option<String> {
    TARGET
        .captures(action)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A classified history entry
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub kind: Transition,
    pub at: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    pub details: Option<String>,
}

impl TransitionRecord {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        let kind = entry
            .new_status
            .as_deref()
            .map(TicketStatus::parse)
            .and_then(|status| Transition::from_status(&status, &entry.action))
            .unwrap_or_else(|| Transition::classify(&entry.action));

        Self {
            kind,
            at: entry.timestamp,
            actor: entry.performed_by.clone().filter(|s| !s.is_empty()),
            details: entry.details.clone(),
        }
    }

    fn stamp(&self, target: Option<&String>) -> Stamp {
        Stamp {
            at: self.at,
            actor: self.actor.clone(),
            target: target.cloned(),
        }
    }
}

/// When and by whom something happened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stamp {
    pub at: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    /// Assignee or department, for assignments and routings
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRecord {
    pub decision: Decision,
    pub stamp: Stamp,
}

/// One assignment → progress → closure pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleRecord {
    /// Most recent assignment in the cycle
    pub assigned: Option<Stamp>,
    /// When work first started
    pub in_progress: Option<Stamp>,
    pub completed: Option<Stamp>,
    pub closed: Option<Stamp>,
    pub auto_closed: bool,
}

impl CycleRecord {
    fn apply(&mut self, record: &TransitionRecord) {
        match &record.kind {
            Transition::Assigned { to } => {
                self.assigned = Some(record.stamp(to.as_ref()));
            }
            Transition::ProgressChanged { .. } => {
                if self.in_progress.is_none() {
                    self.in_progress = Some(record.stamp(None));
                }
            }
            Transition::Completed | Transition::Confirmed => {
                self.completed = Some(record.stamp(None));
            }
            Transition::Closed { auto } => {
                self.closed = Some(record.stamp(None));
                self.auto_closed = *auto;
            }
            _ => {}
        }
    }

    /// Work in this cycle finished, with or without formal closure
    pub fn finished(&self) -> bool {
        self.completed.is_some() || self.closed.is_some()
    }

    /// Assignee name recorded for the cycle
    pub fn assignee(&self) -> Option<&str> {
        self.assigned.as_ref().and_then(|s| s.target.as_deref())
    }
}

/// Everything the history log says about a ticket's past
#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle {
    approvals: [Option<ApprovalRecord>; 3],
    pub routed: Option<Stamp>,
    pub rejected: Option<Stamp>,
    pub cancelled: Option<Stamp>,
    /// Every reopen, oldest first
    pub reopens: Vec<Stamp>,
    /// Work cycles split at each reopen: `cycles[i]` follows `reopens[i - 1]`.
    /// Always one longer than `reopens`.
    cycles: Vec<CycleRecord>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            approvals: Default::default(),
            routed: None,
            rejected: None,
            cancelled: None,
            reopens: Vec::new(),
            cycles: vec![CycleRecord::default()],
        }
    }
}

impl Lifecycle {
    /// Fold the transition log, oldest first
    pub fn fold(records: &[TransitionRecord]) -> Self {
        records.iter().fold(Self::default(), |mut life, record| {
            life.apply(record);
            life
        })
    }

    fn apply(&mut self, record: &TransitionRecord) {
        match &record.kind {
            Transition::ApprovalDecision { level, decision } => {
                // Last decision per level wins
                self.approvals[usize::from(level.number() - 1)] = Some(ApprovalRecord {
                    decision: *decision,
                    stamp: record.stamp(None),
                });
            }
            Transition::Rejected => self.rejected = Some(record.stamp(None)),
            Transition::Cancelled => self.cancelled = Some(record.stamp(None)),
            Transition::Routed { to } => self.routed = Some(record.stamp(to.as_ref())),
            Transition::Reopened => {
                self.reopens.push(record.stamp(None));
                self.cycles.push(CycleRecord::default());
            }
            Transition::Created | Transition::Note => {}
            _ => {
                if let Some(cycle) = self.cycles.last_mut() {
                    cycle.apply(record);
                }
            }
        }
    }

    /// Reconstructed decision for a level
    pub fn approval(&self, level: ApprovalLevel) -> Option<&ApprovalRecord> {
        self.approvals[usize::from(level.number() - 1)].as_ref()
    }

    /// Highest level the log shows as approved
    pub fn highest_approved_level(&self) -> Option<ApprovalLevel> {
        ApprovalLevel::ALL
            .into_iter()
            .filter(|level| {
                self.approval(*level)
                    .is_some_and(|r| r.decision == Decision::Approved)
            })
            .last()
    }

    pub fn was_reopened(&self) -> bool {
        !self.reopens.is_empty()
    }

    pub fn reopen_count(&self) -> usize {
        self.reopens.len()
    }

    /// Work cycle by index; 0 is the work before any reopen
    pub fn cycle(&self, index: usize) -> Option<&CycleRecord> {
        self.cycles.get(index)
    }

    /// Cycle after the most recent reopen (the first cycle when never reopened)
    pub fn current_cycle(&self) -> Option<&CycleRecord> {
        self.cycles.last()
    }

    /// Who rejected the ticket: an explicit rejection, else a rejecting approver
    pub fn rejection(&self) -> Option<&Stamp> {
        self.rejected.as_ref().or_else(|| {
            ApprovalLevel::ALL
                .into_iter()
                .rev()
                .filter_map(|level| self.approval(level))
                .find(|r| r.decision == Decision::Rejected)
                .map(|r| &r.stamp)
        })
    }

    /// Any assignment seen anywhere in the log
    pub fn ever_assigned(&self) -> bool {
        self.cycles.iter().any(|c| c.assigned.is_some())
    }
}
