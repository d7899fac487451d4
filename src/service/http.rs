//! HTTP client for the helpdesk ticket API

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ActionRequest, HelpdeskService, ServiceError, TicketFilter};
use crate::config::ServiceConfig;
use crate::ticket::Ticket;

const SERVICE_NAME: &str = "helpdesk-api";

/// Ticket list responses come bare or wrapped, depending on the backend version
#[derive(Deserialize)]
#[serde(untagged)]
enum TicketList {
    Bare(Vec<Ticket>),
    Wrapped { tickets: Vec<Ticket> },
    Data { data: Vec<Ticket> },
}

impl TicketList {
    fn into_tickets(self) -> Vec<Ticket> {
        match self {
            TicketList::Bare(tickets)
            | TicketList::Wrapped { tickets }
            | TicketList::Data { data: tickets } => tickets,
        }
    }
}

/// Single-ticket responses may also be wrapped in `{ticket: ..}` or `{data: ..}`
#[derive(Deserialize)]
#[serde(untagged)]
enum TicketBody {
    Wrapped { ticket: Ticket },
    Data { data: Ticket },
    Bare(Ticket),
}

impl TicketBody {
    fn into_ticket(self) -> Ticket {
        match self {
            TicketBody::Wrapped { ticket } | TicketBody::Data { data: ticket } => ticket,
            TicketBody::Bare(ticket) => ticket,
        }
    }
}

/// reqwest-backed [`HelpdeskService`]
pub struct HttpHelpdeskService {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpHelpdeskService {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServiceError::NotConfigured("empty base URL".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    /// Build from configuration; the bearer token comes from the configured env var
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ServiceError::NotConfigured(
                    "set service.base_url or HELPDESK__SERVICE__BASE_URL".to_string(),
                )
            })?;

        let token = env::var(&config.token_env).ok();
        if token.is_none() {
            debug!(env = %config.token_env, "No API token in environment, sending unauthenticated requests");
        }

        Self::new(base_url, token, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let builder = self
            .client
            .request(method, &url)
            .header("Accept", "application/json");
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ServiceError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ServiceError::rejected(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err, "Ticket API request failed");
            return Err(err);
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

fn encode_segment(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => {
                let mut buf = [0u8; 4];
                other
                    .encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}

#[async_trait]
impl HelpdeskService for HttpHelpdeskService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn get_ticket(&self, id: &str) -> Result<Ticket, ServiceError> {
        let path = format!("/tickets/{}", encode_segment(id));
        let body: TicketBody = self.send(self.request(Method::GET, &path)).await?;
        Ok(body.into_ticket())
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, ServiceError> {
        let builder = self
            .request(Method::GET, "/tickets")
            .query(&filter.query_pairs());
        let list: TicketList = self.send(builder).await?;
        Ok(list.into_tickets())
    }

    async fn perform(&self, id: &str, request: &ActionRequest) -> Result<Ticket, ServiceError> {
        let path = format!(
            "/tickets/{}/{}",
            encode_segment(id),
            request.action.endpoint()
        );
        let builder = self.request(Method::POST, &path).json(&request.body());
        let body: TicketBody = self.send(builder).await?;
        Ok(body.into_ticket())
    }
}
