//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{HealthResponse, StepperResponse};
use crate::rest::error::ErrorResponse;
use crate::stepper::{Connector, Step, StepStatus};
use crate::ticket::Ticket;

/// OpenAPI documentation for the helpdesk REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Helpdesk Stepper API",
        description = "Resolves helpdesk ticket snapshots into lifecycle steppers.",
        license(name = "MIT")
    ),
    paths(
        crate::rest::routes::health::health,
        crate::rest::routes::stepper::resolve,
        crate::rest::routes::stepper::for_ticket,
    ),
    components(
        schemas(
            HealthResponse,
            StepperResponse,
            ErrorResponse,
            Step,
            StepStatus,
            Connector,
            Ticket,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Stepper", description = "Ticket lifecycle stepper resolution"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
