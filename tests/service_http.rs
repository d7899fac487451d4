//! HTTP ticket API client against a local mock backend.
//!
//! Each test binds a throwaway axum server on 127.0.0.1:0 that mimics the
//! ticket API's response shapes, including its nested error payloads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use helpdesk::actions::{ActionError, TicketActions};
use helpdesk::notifications::{MemoryNotifier, NotificationLevel};
use helpdesk::service::{
    ActionRequest, HelpdeskService, HttpHelpdeskService, ServiceError, TicketAction, TicketFilter,
};

// ─── Mock backend ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    authorization: Option<String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct Backend {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Backend {
    fn record(&self, path: String, headers: &HeaderMap, body: Option<Value>) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(Recorded {
            path,
            authorization,
            body,
        });
    }

    fn last(&self) -> Recorded {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

async fn get_ticket(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.record(format!("/tickets/{id}"), &headers, None);
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"response": {"data": {"message": "Ticket missing not found"}}})),
        )
            .into_response();
    }
    Json(json!({
        "ticket": {
            "id": id,
            "ticketNumber": "HD-2024-0042",
            "status": "Pending Level-1 Approval",
            "approval": {"level1": {"status": "Pending", "approverName": "Dana"}}
        }
    }))
    .into_response()
}

async fn list_tickets(
    State(backend): State<Backend>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    backend.record("/tickets".to_string(), &headers, None);
    let status = query.get("status").cloned().unwrap_or_else(|| "Closed".to_string());
    Json(json!({
        "data": [
            {"id": "t-1", "status": status},
            {"id": "t-2", "status": status}
        ]
    }))
}

async fn act(
    State(backend): State<Backend>,
    Path((id, action)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record(format!("/tickets/{id}/{action}"), &headers, Some(body));
    match action.as_str() {
        "approve" => Json(json!({
            "id": id,
            "ticketNumber": "HD-2024-0042",
            "status": "Approved",
            "approval": {"level1": {"status": "Approved", "approverName": "Dana"}}
        }))
        .into_response(),
        "assign" => (
            StatusCode::CONFLICT,
            Json(json!({"message": "Ticket already assigned"})),
        )
            .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/tickets", get(list_tickets))
        .route("/tickets/:id", get(get_ticket))
        .route("/tickets/:id/:action", post(act))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/"), backend)
}

fn client(base_url: &str, token: Option<&str>) -> HttpHelpdeskService {
    HttpHelpdeskService::new(base_url, token.map(str::to_string), Duration::from_secs(5))
        .expect("client should build")
}

// ─── Reads ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_ticket_unwraps_and_authenticates() {
    let (url, backend) = spawn_backend().await;
    let service = client(&url, Some("secret-token"));

    let ticket = service.get_ticket("t-42").await.unwrap();
    assert_eq!(ticket.id.as_deref(), Some("t-42"));
    assert_eq!(ticket.display_id(), "HD-2024-0042");

    let recorded = backend.last();
    assert_eq!(recorded.path, "/tickets/t-42");
    assert_eq!(recorded.authorization.as_deref(), Some("Bearer secret-token"));
}

#[tokio::test]
async fn test_get_missing_ticket_surfaces_nested_message() {
    let (url, _backend) = spawn_backend().await;
    let service = client(&url, None);

    let err = service.get_ticket("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.server_message(), Some("Ticket missing not found"));
}

#[tokio::test]
async fn test_list_tickets_passes_filter() {
    let (url, backend) = spawn_backend().await;
    let service = client(&url, None);

    let filter = TicketFilter {
        status: Some("In Progress".to_string()),
        ..TicketFilter::default()
    };
    let tickets = service.list_tickets(&filter).await.unwrap();
    assert_eq!(tickets.len(), 2);
    assert!(tickets.iter().all(|t| t.status == "In Progress"));
    assert!(backend.last().authorization.is_none());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let service = client(&format!("http://{addr}"), None);
    let err = service.get_ticket("t-1").await.unwrap_err();
    assert!(matches!(err, ServiceError::Network(_)));
}

// ─── Actions ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_approve_posts_actor_and_notes() {
    let (url, backend) = spawn_backend().await;
    let notifier = MemoryNotifier::new();
    let actions = TicketActions::new(client(&url, None), notifier.clone());

    let request = ActionRequest::new(TicketAction::Approve, "u-dana").with_notes("Looks fine");
    let ticket = actions.perform("t-42", &request).await.unwrap();
    assert_eq!(ticket.status, "Approved");

    let recorded = backend.last();
    assert_eq!(recorded.path, "/tickets/t-42/approve");
    assert_eq!(
        recorded.body,
        Some(json!({"actorId": "u-dana", "notes": "Looks fine"}))
    );

    let note = notifier.last().unwrap();
    assert_eq!(note.level, NotificationLevel::Success);
    assert_eq!(note.message, "Ticket HD-2024-0042 approved");
    assert!(!actions.is_in_flight("t-42"));
}

#[tokio::test]
async fn test_rejected_assignment_notifies_server_message() {
    let (url, backend) = spawn_backend().await;
    let notifier = MemoryNotifier::new();
    let actions = TicketActions::new(client(&url, None), notifier.clone());

    let request = ActionRequest::new(
        TicketAction::Assign {
            assignee_id: "u-sam".to_string(),
        },
        "u-lead",
    );
    let err = actions.perform("t-42", &request).await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::Service(ServiceError::Rejected { status: 409, .. })
    ));
    assert_eq!(
        backend.last().body,
        Some(json!({"actorId": "u-lead", "assigneeId": "u-sam"}))
    );

    let note = notifier.last().unwrap();
    assert_eq!(note.level, NotificationLevel::Error);
    assert_eq!(note.message, "Ticket already assigned");
    assert!(!actions.is_in_flight("t-42"));
}

#[tokio::test]
async fn test_plain_text_failure_uses_fallback_message() {
    let (url, _backend) = spawn_backend().await;
    let notifier = MemoryNotifier::new();
    let actions = TicketActions::new(client(&url, None), notifier.clone());

    let request = ActionRequest::new(TicketAction::Close, "u-sam");
    let err = actions.perform("t-42", &request).await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::Service(ServiceError::Rejected {
            status: 500,
            message: None
        })
    ));
    assert_eq!(notifier.last().unwrap().message, "Failed to close ticket");
}
