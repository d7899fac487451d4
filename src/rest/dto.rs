//! Data Transfer Objects for the REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::stepper::{resolve_steps_with, Connector, Step, Stepper, StepperOptions};
use crate::ticket::Ticket;

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Ticket backend in use, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Resolved stepper for one ticket
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepperResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// Canonical status spelling
    pub status: String,
    pub steps: Vec<Step>,
    /// `connectors[i]` joins `steps[i]` and `steps[i + 1]`
    pub connectors: Vec<Connector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_index: Option<usize>,
}

impl StepperResponse {
    pub fn resolve(ticket: &Ticket, options: &StepperOptions) -> Self {
        let stepper = Stepper::from_steps(resolve_steps_with(ticket, options));
        Self {
            ticket_id: ticket
                .ticket_number
                .clone()
                .or_else(|| ticket.id.clone()),
            status: ticket.status().to_string(),
            steps: stepper.steps,
            connectors: stepper.connectors,
            active_index: stepper.active_index,
        }
    }
}
