//! End-to-end stepper scenarios.
//!
//! Tickets are built from the JSON the ticket API returns, or driven through
//! their lifecycle with the in-memory service, and the resolved stepper is
//! checked as a dashboard would see it.

use serde_json::json;

use helpdesk::service::{
    ActionRequest, HelpdeskService, InMemoryHelpdeskService, TicketAction,
};
use helpdesk::stepper::{resolve_steps, Step, StepStatus, Stepper};
use helpdesk::ticket::Ticket;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn ticket(value: serde_json::Value) -> Ticket {
    serde_json::from_value(value).expect("ticket JSON should deserialize")
}

fn labels(steps: &[Step]) -> Vec<&str> {
    steps.iter().map(|s| s.label.as_str()).collect()
}

fn statuses(steps: &[Step]) -> Vec<StepStatus> {
    steps.iter().map(|s| s.status).collect()
}

fn find<'a>(steps: &'a [Step], id: &str) -> &'a Step {
    steps
        .iter()
        .find(|s| s.id == id)
        .unwrap_or_else(|| panic!("no step with id {id} in {:?}", labels(steps)))
}

/// No step that was completed in `before` is missing or regressed in `after`
fn assert_monotonic(before: &[Step], after: &[Step]) {
    assert!(
        after.len() >= before.len(),
        "stepper shrank from {:?} to {:?}",
        labels(before),
        labels(after)
    );
    for step in before.iter().filter(|s| s.status == StepStatus::Completed) {
        let later = after
            .iter()
            .find(|s| s.id == step.id)
            .unwrap_or_else(|| panic!("completed step {} disappeared", step.id));
        assert_eq!(
            later.status,
            StepStatus::Completed,
            "step {} regressed",
            step.id
        );
    }
}

// ─── Fresh and negative tickets ───────────────────────────────────────────────

#[test]
fn test_fresh_ticket_only_shows_submitted() {
    let steps = resolve_steps(&ticket(json!({
        "id": "t-100",
        "status": "Submitted",
        "requesterName": "Alex",
        "createdAt": "2024-05-06T08:00:00Z"
    })));

    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].label, "Submitted");
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert_eq!(steps[0].description.as_deref(), Some("Submitted by Alex"));
    assert!(steps[0].timestamp.is_some());
}

#[test]
fn test_rejected_ticket_stops_at_rejection() {
    let steps = resolve_steps(&ticket(json!({
        "id": "t-101",
        "status": "Rejected",
        "approval": {
            "level1": {"status": "Approved", "approverName": "Dana"},
            "level2": {"status": "Rejected", "approverName": "Lee"},
            "level3": {"status": "Pending", "approverName": "Kim"}
        },
        "processing": {"processingQueue": "IT Support"},
        "assignment": {"assignedToName": "Sam"}
    })));

    assert_eq!(
        labels(&steps),
        vec!["Submitted", "Level 1 Approval", "Level 2 Approval", "Rejected"]
    );
    let last = steps.last().unwrap();
    assert_eq!(last.status, StepStatus::Rejected);
    assert_eq!(last.description.as_deref(), Some("Rejected by Lee"));
    assert!(steps.iter().all(|s| s.id != "routed" && s.id != "assigned"));
}

#[test]
fn test_decorated_rejection_status_truncates_too() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Rejected at Level-1",
        "history": [
            {"action": "Rejected at Level-1", "performedBy": "Dana"}
        ]
    })));

    assert_eq!(steps.last().unwrap().status, StepStatus::Rejected);
    assert_eq!(
        steps.last().unwrap().description.as_deref(),
        Some("Rejected by Dana")
    );
}

#[test]
fn test_cancelled_ticket_truncates() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Cancelled",
        "routedTo": "Facilities",
        "history": [
            {"action": "Ticket created", "performedBy": "Alex"},
            {"action": "Routed to Facilities", "newStatus": "Routed"},
            {"action": "Ticket cancelled", "performedBy": "Alex", "timestamp": "2024-05-06T10:00:00Z"}
        ]
    })));

    assert_eq!(labels(&steps), vec!["Submitted", "Cancelled"]);
    assert_eq!(steps[1].status, StepStatus::Rejected);
    assert_eq!(steps[1].description.as_deref(), Some("Cancelled by Alex"));
}

// ─── Approval scenarios ───────────────────────────────────────────────────────

#[test]
fn test_bypassed_approval_goes_straight_to_routing() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Routed",
        "routedTo": "IT",
        "approval": {"required": false}
    })));

    assert_eq!(labels(&steps), vec!["Submitted", "Routed"]);
    assert_eq!(steps[1].status, StepStatus::Active);
    assert_eq!(steps[1].description.as_deref(), Some("Routed to IT"));
}

#[test]
fn test_two_level_approval_in_progress() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Pending Level-2 Approval",
        "approval": {
            "level1": {"status": "Approved", "approverName": "Dana"},
            "level2": {"status": "Pending", "approverName": "Lee"}
        }
    })));

    assert_eq!(
        labels(&steps),
        vec!["Submitted", "Level 1 Approval", "Level 2 Approval"]
    );
    assert_eq!(
        statuses(&steps),
        vec![StepStatus::Completed, StepStatus::Completed, StepStatus::Active]
    );
    assert_eq!(steps[2].description.as_deref(), Some("Awaiting Lee"));
}

#[test]
fn test_missing_lower_level_is_not_shown_on_closed_ticket() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Closed",
        "routedTo": "IT",
        "approval": {
            "required": true,
            "level2": {"status": "Approved", "approverName": "Eli"}
        },
        "assignment": {"assignedToName": "Sam"},
        "history": [
            {"action": "Assigned to Sam"},
            {"action": "In Progress"},
            {"action": "Ticket closed", "performedBy": "Sam"}
        ]
    })));

    assert_eq!(
        labels(&steps),
        vec![
            "Submitted",
            "Level 2 Approval",
            "Routed",
            "Assigned",
            "In Progress",
            "Closed"
        ]
    );
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(
        find(&steps, "approval-l2").description.as_deref(),
        Some("Approved by Eli")
    );
    assert_eq!(find(&steps, "routed").description.as_deref(), Some("Routed to IT"));
}

#[test]
fn test_legacy_spelling_resolves_like_canonical() {
    let legacy = resolve_steps(&ticket(json!({"status": "Pending Approval L2"})));
    let canonical = resolve_steps(&ticket(json!({"status": "Pending Level-2 Approval"})));
    assert_eq!(legacy, canonical);
}

// ─── Work cycles ──────────────────────────────────────────────────────────────

#[test]
fn test_full_cycle_is_all_completed() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Closed",
        "approval": {
            "level1": {"status": "Approved", "approverName": "Dana"}
        },
        "processing": {"processingQueue": "IT Support"},
        "assignment": {"assignedToName": "Sam", "assignedToId": "u-7"},
        "resolution": {"notes": "Replaced the dock", "resolvedBy": "Sam"},
        "closedAt": "2024-05-07T16:00:00Z"
    })));

    assert_eq!(
        labels(&steps),
        vec![
            "Submitted",
            "Level 1 Approval",
            "Routed",
            "Assigned",
            "In Progress",
            "Closed"
        ]
    );
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(find(&steps, "routed").description.as_deref(), Some("Routed to IT Support"));
    assert_eq!(find(&steps, "closed").description.as_deref(), Some("Closed by Sam"));
    assert!(find(&steps, "closed").timestamp.is_some());

    let stepper = Stepper::from_steps(steps);
    assert!(stepper.active_index.is_none());
}

#[test]
fn test_reopened_ticket_before_reassignment() {
    let steps = resolve_steps(&ticket(json!({
        "status": "Reopened",
        "processing": {"processingQueue": "IT Support"},
        "assignment": {"assignedToName": "Sam"},
        "history": [
            {"action": "Ticket created", "performedBy": "Alex"},
            {"action": "Assigned to Sam", "newStatus": "Assigned", "timestamp": "2024-05-06T09:00:00Z"},
            {"action": "Work started", "newStatus": "In Progress", "timestamp": "2024-05-06T10:00:00Z"},
            {"action": "Ticket closed", "newStatus": "Closed", "performedBy": "Sam", "timestamp": "2024-05-06T12:00:00Z"},
            {"action": "Ticket reopened", "newStatus": "Reopened", "performedBy": "Alex", "timestamp": "2024-05-07T08:00:00Z"}
        ]
    })));

    assert_eq!(
        labels(&steps),
        vec![
            "Submitted",
            "Routed",
            "Assigned",
            "In Progress",
            "Closed",
            "Reopened"
        ]
    );
    for id in ["routed", "assigned", "in-progress", "closed"] {
        assert_eq!(find(&steps, id).status, StepStatus::Completed, "{id}");
    }
    assert_eq!(find(&steps, "assigned").description.as_deref(), Some("Was: Sam"));
    assert_eq!(find(&steps, "closed").description.as_deref(), Some("Closed by Sam"));

    let reopened = find(&steps, "reopened");
    assert_eq!(reopened.status, StepStatus::Active);
    assert_eq!(reopened.description.as_deref(), Some("Reopened by Alex"));
    assert!(steps.iter().all(|s| !s.id.ends_with("-2")));
}

// ─── Properties ───────────────────────────────────────────────────────────────

#[test]
fn test_resolution_is_idempotent() {
    let t = ticket(json!({
        "status": "In Progress",
        "approval": {"level1": {"status": "Approved", "approverName": "Dana"}},
        "routedTo": "IT",
        "assignment": {"assignedToName": "Sam"},
        "history": [
            {"action": "Approved Level-1", "performedBy": "Dana"},
            {"action": "Assigned to Sam", "newStatus": "Assigned"}
        ]
    }));

    assert_eq!(resolve_steps(&t), resolve_steps(&t));
}

#[tokio::test]
async fn test_forward_lifecycle_is_monotonic() {
    let service = InMemoryHelpdeskService::with_tickets(vec![ticket(json!({
        "id": "t-200",
        "status": "Pending Level-1 Approval",
        "requesterName": "Alex",
        "approval": {
            "currentLevel": 1,
            "level1": {"status": "Pending", "approverName": "Dana"},
            "level2": {"status": "Pending", "approverName": "Lee"}
        },
        "processing": {"processingQueue": "IT Support"}
    }))]);

    let plan = [
        ("dana", TicketAction::Approve),
        ("lee", TicketAction::Approve),
        (
            "dispatch",
            TicketAction::Assign {
                assignee_id: "sam".to_string(),
            },
        ),
        ("sam", TicketAction::StartProgress),
        ("sam", TicketAction::Complete),
        ("alex", TicketAction::Confirm),
        ("sam", TicketAction::Close),
        ("alex", TicketAction::Reopen),
        (
            "dispatch",
            TicketAction::Assign {
                assignee_id: "kim".to_string(),
            },
        ),
        ("kim", TicketAction::StartProgress),
        ("kim", TicketAction::Complete),
        ("kim", TicketAction::Close),
        ("alex", TicketAction::Reopen),
        (
            "dispatch",
            TicketAction::Assign {
                assignee_id: "lou".to_string(),
            },
        ),
        ("lou", TicketAction::StartProgress),
        ("lou", TicketAction::Close),
    ];

    let mut previous = resolve_steps(&service.get_ticket("t-200").await.unwrap());
    assert_eq!(previous.len(), 3);

    for (actor, action) in plan {
        let request = ActionRequest::new(action, actor);
        let updated = service.perform("t-200", &request).await.unwrap();
        let steps = resolve_steps(&updated);
        assert_monotonic(&previous, &steps);
        previous = steps;
    }

    assert_eq!(
        labels(&previous),
        vec![
            "Submitted",
            "Level 1 Approval",
            "Level 2 Approval",
            "Routed",
            "Assigned",
            "In Progress",
            "Closed",
            "Reopened",
            "Assigned¹",
            "In Progress¹",
            "Closed¹",
            "Reopened¹",
            "Assigned²",
            "In Progress²",
            "Closed²"
        ]
    );
    assert!(previous.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(find(&previous, "assigned").description.as_deref(), Some("Was: sam"));
    assert_eq!(find(&previous, "assigned-2").description.as_deref(), Some("Was: kim"));
    assert_eq!(find(&previous, "reopened-2").description.as_deref(), Some("Reopened by alex"));
    assert_eq!(
        find(&previous, "assigned-3").description.as_deref(),
        Some("Assigned to lou")
    );
}

#[tokio::test]
async fn test_rejection_through_service_truncates() {
    let service = InMemoryHelpdeskService::with_tickets(vec![ticket(json!({
        "id": "t-201",
        "status": "Pending Level-1 Approval",
        "approval": {
            "level1": {"status": "Pending", "approverName": "Dana"},
            "level2": {"status": "Pending", "approverName": "Lee"}
        }
    }))]);

    service
        .perform("t-201", &ActionRequest::new(TicketAction::Approve, "dana"))
        .await
        .unwrap();
    let rejected = service
        .perform(
            "t-201",
            &ActionRequest::new(TicketAction::Reject, "lee").with_notes("Not budgeted"),
        )
        .await
        .unwrap();

    let steps = resolve_steps(&rejected);
    assert_eq!(
        labels(&steps),
        vec!["Submitted", "Level 1 Approval", "Level 2 Approval", "Rejected"]
    );
    assert_eq!(steps[2].status, StepStatus::Rejected);
    assert_eq!(steps[3].description.as_deref(), Some("Rejected by lee"));
}
