//! API state management for the REST server.

use std::sync::Arc;

use crate::config::Config;
use crate::service::HelpdeskService;
use crate::stepper::StepperOptions;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    /// Ticket API client; `None` when no backend is configured
    pub service: Option<Arc<dyn HelpdeskService>>,
    /// Placeholders for the stepper
    pub stepper: Arc<StepperOptions>,
    pub config: Arc<Config>,
}

impl ApiState {
    pub fn new(config: Config, service: Option<Arc<dyn HelpdeskService>>) -> Self {
        Self {
            service,
            stepper: Arc::new(StepperOptions::from(&config.stepper)),
            config: Arc::new(config),
        }
    }

    /// Name of the configured backend, for health output
    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref().map(|s| s.name())
    }
}
