//! User actions on tickets.
//!
//! One outstanding call per ticket: a second submit while the first is in
//! flight fails fast instead of reaching the API. Outcomes are reported to the
//! [`Notifier`]; nothing is retried and no local state is changed on failure.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use crate::notifications::{Notification, Notifier};
use crate::service::{ActionRequest, HelpdeskService, ServiceError};
use crate::ticket::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Another action on the same ticket has not finished yet
    #[error("an action on ticket {0} is already in progress")]
    InFlight(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Marks a ticket busy until dropped
struct InFlightGuard {
    ticket_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, ticket_id: &str) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(ticket_id.to_string()) {
            return None;
        }
        Some(Self {
            ticket_id: ticket_id.to_string(),
            in_flight: Arc::clone(in_flight),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.ticket_id);
    }
}

/// Runs ticket actions against a [`HelpdeskService`]
pub struct TicketActions<S, N> {
    service: S,
    notifier: N,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<S: HelpdeskService, N: Notifier> TicketActions<S, N> {
    pub fn new(service: S, notifier: N) -> Self {
        Self {
            service,
            notifier,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Whether a call for this ticket is outstanding
    pub fn is_in_flight(&self, ticket_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(ticket_id)
    }

    /// Perform an action and return the updated ticket
    pub async fn perform(
        &self,
        ticket_id: &str,
        request: &ActionRequest,
    ) -> Result<Ticket, ActionError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, ticket_id) else {
            warn!(ticket = ticket_id, action = %request.action, "Duplicate submit ignored");
            return Err(ActionError::InFlight(ticket_id.to_string()));
        };

        match self.service.perform(ticket_id, request).await {
            Ok(ticket) => {
                info!(
                    ticket = ticket_id,
                    action = %request.action,
                    actor = %request.actor_id,
                    status = %ticket.status,
                    "Ticket action succeeded"
                );
                self.notifier.notify(Notification::success(format!(
                    "Ticket {} {}",
                    ticket.ticket_number.as_deref().unwrap_or(ticket_id),
                    request.action.past_tense()
                )));
                Ok(ticket)
            }
            Err(err) => {
                warn!(
                    ticket = ticket_id,
                    action = %request.action,
                    service = self.service.name(),
                    error = %err,
                    "Ticket action failed"
                );
                let message = err.server_message().map(str::to_string).unwrap_or_else(|| {
                    format!("Failed to {} ticket", request.action.imperative())
                });
                self.notifier.notify(Notification::error(message));
                Err(err.into())
            }
        }
    }
}
