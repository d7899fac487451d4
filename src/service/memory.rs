//! In-memory ticket backend.
//!
//! Stands in for the real API in tests and `helpdesk serve --fixtures`. It
//! applies each action the way the backend reports it (new status, history
//! entry) without validating whether the transition is allowed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ActionRequest, HelpdeskService, ServiceError, TicketAction, TicketFilter};
use crate::ticket::{
    ApprovalLevel, Assignment, HistoryEntry, LevelApproval, LevelStatus, Ticket, TicketStatus,
};

const SERVICE_NAME: &str = "in-memory";

#[derive(Debug, Default)]
pub struct InMemoryHelpdeskService {
    tickets: RwLock<BTreeMap<String, Ticket>>,
}

impl InMemoryHelpdeskService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with tickets, keyed by id (falling back to ticket number)
    pub fn with_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Self {
        let service = Self::new();
        for ticket in tickets {
            service.insert(ticket);
        }
        service
    }

    /// Load every `.json`/`.yaml`/`.yml` ticket in a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let service = Self::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read fixtures directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            let is_ticket = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"));
            if !is_ticket {
                continue;
            }
            let ticket = Ticket::from_file(&path)
                .with_context(|| format!("Failed to load fixture {}", path.display()))?;
            service.insert(ticket);
        }

        Ok(service)
    }

    pub fn insert(&self, ticket: Ticket) {
        let key = ticket
            .id
            .clone()
            .or_else(|| ticket.ticket_number.clone())
            .unwrap_or_else(|| ticket.display_id().to_string());
        self.write().insert(key, ticket);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every write leaves the map consistent, so a poisoned lock is still usable
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Ticket>> {
        self.tickets.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Ticket>> {
        self.tickets.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::Rejected {
        status: 404,
        message: Some(format!("Ticket {id} not found")),
    }
}

fn matches(ticket: &Ticket, filter: &TicketFilter) -> bool {
    let status_ok = filter
        .status
        .as_deref()
        .map_or(true, |s| TicketStatus::parse(s) == ticket.status());
    let assignee_ok = filter.assigned_to.as_deref().map_or(true, |who| {
        ticket.assignment.as_ref().is_some_and(|a| {
            a.assigned_to_id.as_deref() == Some(who) || a.assigned_to_name.as_deref() == Some(who)
        })
    });
    let requester_ok = filter
        .requester
        .as_deref()
        .map_or(true, |who| ticket.requester() == Some(who));
    status_ok && assignee_ok && requester_ok
}

/// Record an approval decision on the level the ticket is waiting on.
/// Returns the status the ticket moves to and the decided level.
fn decide_current_level(
    ticket: &mut Ticket,
    actor: &str,
    decision: LevelStatus,
) -> (String, Option<ApprovalLevel>) {
    let now = Utc::now();
    let level = ticket.status().approval_level().or_else(|| {
        ticket
            .approval
            .as_ref()
            .and_then(|a| a.current_level)
            .and_then(ApprovalLevel::from_number)
    });

    let Some(level) = level else {
        let status = match decision {
            LevelStatus::Rejected => TicketStatus::Rejected,
            _ => TicketStatus::Approved,
        };
        return (status.to_string(), None);
    };

    let approval = ticket.approval.get_or_insert_with(Default::default);
    let slot = match level.number() {
        1 => &mut approval.level1,
        2 => &mut approval.level2,
        _ => &mut approval.level3,
    };
    *slot = Some(LevelApproval {
        status: decision,
        approver_name: Some(actor.to_string()),
        action_timestamp: Some(now),
    });

    if decision == LevelStatus::Rejected {
        return (TicketStatus::Rejected.to_string(), Some(level));
    }

    // Move on to the next populated level still pending, if any
    let next = approval
        .levels()
        .find(|(l, state)| *l > level && state.status == LevelStatus::Pending)
        .map(|(l, _)| l);
    let status = match next {
        Some(next) => {
            approval.current_level = Some(next.number());
            TicketStatus::PendingApproval(Some(next))
        }
        None => {
            approval.current_level = None;
            TicketStatus::Approved
        }
    };
    (status.to_string(), Some(level))
}

fn apply(ticket: &mut Ticket, request: &ActionRequest) {
    let now = Utc::now();
    let actor = request.actor_id.as_str();

    let mut decided = None;
    let new_status = match &request.action {
        TicketAction::Approve | TicketAction::Reject => {
            let decision = if request.action == TicketAction::Approve {
                LevelStatus::Approved
            } else {
                LevelStatus::Rejected
            };
            let (status, level) = decide_current_level(ticket, actor, decision);
            decided = level;
            status
        }
        TicketAction::Assign { assignee_id } => {
            ticket.assignment = Some(Assignment {
                assigned_to_id: Some(assignee_id.clone()),
                assigned_to_name: Some(assignee_id.clone()),
                assigned_at: Some(now),
            });
            TicketStatus::Assigned.to_string()
        }
        TicketAction::StartProgress => TicketStatus::InProgress.to_string(),
        TicketAction::Complete => TicketStatus::WorkCompleted.to_string(),
        TicketAction::Confirm => TicketStatus::Confirmed.to_string(),
        TicketAction::Close => {
            ticket.closed_at = Some(now);
            TicketStatus::Closed.to_string()
        }
        TicketAction::Reopen => {
            ticket.closed_at = None;
            TicketStatus::Reopened.to_string()
        }
    };

    let action_text = match (&request.action, decided) {
        (TicketAction::Approve, Some(level)) => format!("Approved {level}"),
        (TicketAction::Reject, Some(level)) => format!("Rejected at {level}"),
        (TicketAction::Assign { assignee_id }, _) => format!("Assigned to {assignee_id}"),
        (other, _) => format!("Ticket {}", other.past_tense()),
    };
    let mut entry = HistoryEntry::new(action_text)
        .at(now)
        .by(actor)
        .with_new_status(new_status.clone());
    entry.details = request.notes.clone();

    ticket.history.push(entry);
    ticket.status = new_status;
    ticket.updated_at = Some(now);
}

#[async_trait]
impl HelpdeskService for InMemoryHelpdeskService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn get_ticket(&self, id: &str) -> Result<Ticket, ServiceError> {
        self.read().get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, ServiceError> {
        Ok(self
            .read()
            .values()
            .filter(|t| matches(t, filter))
            .cloned()
            .collect())
    }

    async fn perform(&self, id: &str, request: &ActionRequest) -> Result<Ticket, ServiceError> {
        let mut tickets = self.write();
        let ticket = tickets.get_mut(id).ok_or_else(|| not_found(id))?;
        apply(ticket, request);
        Ok(ticket.clone())
    }
}
