//! Stepper endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::rest::dto::StepperResponse;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::ticket::Ticket;

/// Resolve the stepper for a posted ticket snapshot
#[utoipa::path(
    post,
    path = "/api/v1/stepper",
    tag = "Stepper",
    request_body = Ticket,
    responses(
        (status = 200, description = "Resolved stepper", body = StepperResponse),
        (status = 400, description = "Malformed ticket", body = ErrorResponse)
    )
)]
pub async fn resolve(
    State(state): State<ApiState>,
    body: Result<Json<Ticket>, JsonRejection>,
) -> Result<Json<StepperResponse>, ApiError> {
    let Json(ticket) = body?;
    Ok(Json(StepperResponse::resolve(&ticket, &state.stepper)))
}

/// Fetch a ticket from the ticket API and resolve its stepper
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}/stepper",
    tag = "Stepper",
    params(
        ("id" = String, Path, description = "Ticket id")
    ),
    responses(
        (status = 200, description = "Resolved stepper", body = StepperResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
        (status = 502, description = "Ticket API failed", body = ErrorResponse),
        (status = 503, description = "No ticket API configured", body = ErrorResponse)
    )
)]
pub async fn for_ticket(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StepperResponse>, ApiError> {
    let service = state.service.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("No ticket API configured".to_string())
    })?;

    let ticket = service.get_ticket(&id).await?;
    Ok(Json(StepperResponse::resolve(&ticket, &state.stepper)))
}
