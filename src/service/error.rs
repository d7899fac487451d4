//! Ticket API error types

use serde_json::Value;
use thiserror::Error;

/// Errors from the remote ticket API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The API answered with a non-success status
    #[error("ticket API returned {status}{}", suffix(.message))]
    Rejected {
        status: u16,
        message: Option<String>,
    },

    /// Request never got an answer
    #[error("ticket API unreachable: {0}")]
    Network(String),

    /// Response body was not the expected shape
    #[error("unexpected ticket API response: {0}")]
    Decode(String),

    /// No base URL configured
    #[error("ticket API not configured: {0}")]
    NotConfigured(String),
}

impl ServiceError {
    /// Build a rejection from a status code and raw response body
    pub fn rejected(status: u16, body: &str) -> Self {
        ServiceError::Rejected {
            status,
            message: extract_message(body),
        }
    }

    /// Message supplied by the server, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ServiceError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of a rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

fn suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ..}`, the nested `{"response": {"data": {"message": ..}}}`
/// shape and `{"error": ..}`. Non-JSON bodies are ignored.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["/message", "/response/data/message", "/data/message", "/error"]
        .into_iter()
        .filter_map(|pointer| value.pointer(pointer))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}
