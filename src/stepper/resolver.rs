//! Step derivation.
//!
//! Live fields (`status`, `approval`, `assignment`) decide the current stage.
//! The history fold only backfills stages the live fields no longer expose.

use crate::ticket::history::{ApprovalRecord, CycleRecord, Decision, Lifecycle};
use crate::ticket::{ApprovalLevel, LevelApproval, LevelStatus, Ticket, TicketStatus};

use super::{Step, StepStatus, StepperOptions};

/// Resolve the stepper for a ticket with default placeholders
pub fn resolve_steps(ticket: &Ticket) -> Vec<Step> {
    resolve_steps_with(ticket, &StepperOptions::default())
}

/// Resolve the stepper for a ticket.
///
/// Pure and total: partially populated tickets yield a shorter list, never a panic.
pub fn resolve_steps_with(ticket: &Ticket, options: &StepperOptions) -> Vec<Step> {
    let ctx = Context::new(ticket, options);
    let mut steps = vec![ctx.submitted_step()];

    if ctx.status == TicketStatus::Submitted {
        return steps;
    }

    ctx.push_approval_steps(&mut steps);

    if ctx.status.is_terminal_negative() {
        steps.push(ctx.terminal_step());
        return steps;
    }

    if let Some(step) = ctx.routing_step() {
        steps.push(step);
    }

    if ctx.was_reopened() {
        // A Reopened status with no logged reopen still counts as one
        let reopens = ctx.life.reopen_count().max(1);
        for index in 0..reopens {
            let latest = index + 1 == reopens;
            ctx.push_past_cycle(&mut steps, index, latest);
            steps.push(ctx.reopened_step(index, latest));
        }
        if ctx.status != TicketStatus::Reopened {
            ctx.push_live_cycle(&mut steps, reopens);
        }
    } else {
        ctx.push_live_cycle(&mut steps, 0);
    }

    tracing::trace!(
        ticket = ticket.display_id(),
        status = %ctx.status,
        steps = steps.len(),
        "resolved stepper"
    );

    steps
}

/// Step id for the given work cycle: `closed`, `closed-2`, `closed-3`, ...
fn cycle_id(base: &str, cycle: usize) -> String {
    if cycle == 0 {
        base.to_string()
    } else {
        format!("{base}-{}", cycle + 1)
    }
}

/// Step label for the given work cycle: `Closed`, `Closed¹`, `Closed²`, ...
fn cycle_label(base: &str, cycle: usize) -> String {
    if cycle == 0 {
        return base.to_string();
    }
    let marker: String = cycle
        .to_string()
        .chars()
        .map(|digit| match digit {
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            _ => '⁹',
        })
        .collect();
    format!("{base}{marker}")
}

struct Context<'a> {
    ticket: &'a Ticket,
    options: &'a StepperOptions,
    status: TicketStatus,
    life: Lifecycle,
}

impl<'a> Context<'a> {
    fn new(ticket: &'a Ticket, options: &'a StepperOptions) -> Self {
        Self {
            ticket,
            options,
            status: ticket.status(),
            life: ticket.lifecycle(),
        }
    }

    fn submitted_step(&self) -> Step {
        Step::new("submitted", "Submitted", StepStatus::Completed)
            .at(self.ticket.created_at)
            .describe_opt(self.ticket.requester().map(|name| format!("Submitted by {name}")))
    }

    // ─── Approvals ──────────────────────────────────────────────────────────

    /// Level the ticket is waiting on: from the status string, else the approval object
    fn current_level(&self) -> Option<ApprovalLevel> {
        self.status.approval_level().or_else(|| {
            if !self.status.is_pending_approval() {
                return None;
            }
            self.ticket
                .approval
                .as_ref()
                .and_then(|a| a.current_level)
                .and_then(ApprovalLevel::from_number)
        })
    }

    fn approvals_waived(&self) -> bool {
        self.ticket.approval.as_ref().is_some_and(|a| a.is_waived())
    }

    fn all_approvals_completed(&self) -> bool {
        if self.status.is_in_approval_process() {
            return false;
        }
        self.ticket
            .approval
            .as_ref()
            .map_or(true, |a| a.is_waived() || a.all_levels_approved())
    }

    /// A level belongs on the stepper when the approval object carries it, the
    /// status has reached it, or the history shows a decision at it
    fn level_in_scope(&self, level: ApprovalLevel) -> bool {
        self.live_level(level).is_some()
            || self.current_level().is_some_and(|current| current >= level)
            || self.life.approval(level).is_some()
    }

    fn live_level(&self, level: ApprovalLevel) -> Option<&LevelApproval> {
        self.ticket.approval.as_ref().and_then(|a| a.level(level))
    }

    fn push_approval_steps(&self, steps: &mut Vec<Step>) {
        let waived = self.approvals_waived();

        for level in ApprovalLevel::ALL.into_iter().filter(|l| self.level_in_scope(*l)) {
            let live = self.live_level(level);
            let past = self.life.approval(level);

            let decided = live.is_some_and(|l| l.status != LevelStatus::Pending) || past.is_some();
            if waived && !decided {
                continue;
            }

            let step = self.approval_step(level, live, past);
            if step.status == StepStatus::Pending && self.status.is_terminal_negative() {
                continue;
            }

            let rejected = step.status == StepStatus::Rejected;
            steps.push(step);
            if rejected {
                break;
            }
        }
    }

    fn approval_status(
        &self,
        level: ApprovalLevel,
        live: Option<&LevelApproval>,
        past: Option<&ApprovalRecord>,
    ) -> StepStatus {
        let past_decision = past.map(|p| p.decision);
        match live.map(|l| l.status) {
            Some(LevelStatus::Approved) => return StepStatus::Completed,
            Some(LevelStatus::Rejected) => return StepStatus::Rejected,
            _ => {}
        }

        if past_decision == Some(Decision::Approved) {
            StepStatus::Completed
        } else if past_decision == Some(Decision::Rejected) && live.is_none() {
            StepStatus::Rejected
        } else if !self.status.is_in_approval_process()
            && self
                .life
                .highest_approved_level()
                .is_some_and(|highest| level <= highest)
        {
            StepStatus::Completed
        } else if self.status.is_in_approval_process() && self.current_level() == Some(level) {
            StepStatus::Active
        } else {
            StepStatus::Pending
        }
    }

    fn approval_step(
        &self,
        level: ApprovalLevel,
        live: Option<&LevelApproval>,
        past: Option<&ApprovalRecord>,
    ) -> Step {
        let status = self.approval_status(level, live, past);
        let approver = live
            .and_then(|l| l.approver_name.as_deref())
            .or_else(|| past.and_then(|p| p.stamp.actor.as_deref()))
            .or_else(|| {
                (level == ApprovalLevel::L1)
                    .then_some(self.ticket.manager_name.as_deref())
                    .flatten()
            })
            .filter(|name| !name.is_empty())
            .unwrap_or(self.options.approver_placeholder.as_str());

        let description = match status {
            StepStatus::Completed => format!("Approved by {approver}"),
            StepStatus::Rejected => format!("Rejected by {approver}"),
            StepStatus::Active | StepStatus::Pending => format!("Awaiting {approver}"),
        };
        let timestamp = match status {
            StepStatus::Completed | StepStatus::Rejected => live
                .and_then(|l| l.action_timestamp)
                .or_else(|| past.and_then(|p| p.stamp.at)),
            StepStatus::Active | StepStatus::Pending => None,
        };

        Step::new(
            format!("approval-l{}", level.number()),
            format!("Level {} Approval", level.number()),
            status,
        )
        .at(timestamp)
        .describe(description)
    }

    // ─── Terminal outcomes ──────────────────────────────────────────────────

    fn terminal_step(&self) -> Step {
        let (id, label, stamp) = if self.status == TicketStatus::Cancelled {
            ("cancelled", "Cancelled", self.life.cancelled.as_ref())
        } else {
            ("rejected", "Rejected", self.life.rejection())
        };

        let actor = stamp.and_then(|s| s.actor.clone()).or_else(|| {
            // A live level carrying the rejection names the approver
            self.ticket.approval.as_ref().and_then(|a| {
                a.levels()
                    .find(|(_, l)| l.status == LevelStatus::Rejected)
                    .and_then(|(_, l)| l.approver_name.clone())
            })
        });
        let timestamp = stamp.and_then(|s| s.at).or(self.ticket.updated_at);

        Step::new(id, label, StepStatus::Rejected)
            .at(timestamp)
            .describe_opt(actor.map(|name| format!("{label} by {name}")))
    }

    // ─── Routing ────────────────────────────────────────────────────────────

    fn reached_assignment(&self) -> bool {
        self.status.reached_assignment() || self.life.ever_assigned()
    }

    fn routing_step(&self) -> Option<Step> {
        if self.status.is_pending_approval() {
            return None;
        }
        let visible = self.all_approvals_completed()
            || self.status.is_awaiting_routing()
            || self.reached_assignment()
            || self.life.routed.is_some();
        if !visible {
            return None;
        }

        let status = if self.status.is_awaiting_routing() {
            StepStatus::Active
        } else if self.reached_assignment() {
            StepStatus::Completed
        } else {
            StepStatus::Pending
        };

        let department = self
            .ticket
            .routed_department()
            .map(str::to_string)
            .or_else(|| self.life.routed.as_ref().and_then(|r| r.target.clone()))
            .or_else(|| {
                self.ticket
                    .is_legacy()
                    .then(|| self.options.legacy_queue.clone())
            });
        let timestamp = self
            .ticket
            .processing
            .as_ref()
            .and_then(|p| p.routed_at)
            .or_else(|| self.life.routed.as_ref().and_then(|r| r.at));

        Some(
            Step::new("routed", "Routed", status)
                .at(timestamp)
                .describe_opt(department.map(|d| format!("Routed to {d}"))),
        )
    }

    // ─── Work cycles ────────────────────────────────────────────────────────

    fn was_reopened(&self) -> bool {
        self.status == TicketStatus::Reopened || self.life.was_reopened()
    }

    fn live_assignee(&self) -> Option<&str> {
        self.ticket
            .assignment
            .as_ref()
            .and_then(|a| a.assigned_to_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Steps for the cycle the live fields describe
    fn push_live_cycle(&self, steps: &mut Vec<Step>, cycle: usize) {
        let empty = CycleRecord::default();
        let record = self.life.cycle(cycle).unwrap_or(&empty);
        let status = &self.status;
        // Before any reassignment, a live assignment left over from the first
        // cycle says nothing about the post-reopen cycle.
        let live_assignment = self
            .ticket
            .assignment
            .as_ref()
            .filter(|a| a.has_assignee())
            .filter(|_| cycle == 0 || status.reached_assignment());

        let assigned =
            live_assignment.is_some() || status.reached_assignment() || record.assigned.is_some();
        if !assigned {
            return;
        }

        let assignee = live_assignment
            .and_then(|a| a.assigned_to_name.as_deref())
            .filter(|name| !name.is_empty())
            .or_else(|| record.assignee())
            .unwrap_or(self.options.specialist_placeholder.as_str());

        let assigned_status = if *status == TicketStatus::Assigned {
            StepStatus::Active
        } else {
            StepStatus::Completed
        };
        let assigned_at = live_assignment
            .and_then(|a| a.assigned_at)
            .or_else(|| record.assigned.as_ref().and_then(|s| s.at));
        steps.push(
            Step::new(
                cycle_id("assigned", cycle),
                cycle_label("Assigned", cycle),
                assigned_status,
            )
                .at(assigned_at)
                .describe(format!("Assigned to {assignee}")),
        );

        let in_progress =
            status.reached_progress() || record.in_progress.is_some() || record.finished();
        if !in_progress {
            return;
        }

        let (progress_status, progress_description) = match status {
            TicketStatus::InProgress => (StepStatus::Active, format!("{assignee} is working on it")),
            TicketStatus::OnHold => (StepStatus::Active, "On hold".to_string()),
            _ => (StepStatus::Completed, format!("Handled by {assignee}")),
        };
        let started_at = record.in_progress.as_ref().and_then(|s| s.at).or(
            if progress_status == StepStatus::Active {
                self.ticket.updated_at
            } else {
                None
            },
        );
        steps.push(
            Step::new(
                cycle_id("in-progress", cycle),
                cycle_label("In Progress", cycle),
                progress_status,
            )
            .at(started_at)
            .describe(progress_description),
        );

        if status.reached_completion() || record.finished() {
            steps.push(self.closing_step(record, cycle));
        }
    }

    fn closing_step(&self, record: &CycleRecord, cycle: usize) -> Step {
        let status = &self.status;
        let step_status = match status {
            TicketStatus::WorkCompleted | TicketStatus::AwaitingClosure | TicketStatus::Confirmed => {
                StepStatus::Active
            }
            _ => StepStatus::Completed,
        };
        let auto = *status == TicketStatus::AutoClosed
            || (step_status == StepStatus::Completed && !status.is_closed() && record.auto_closed);
        let label = if auto { "Auto-Closed" } else { "Closed" };

        let closed_by = record
            .closed
            .as_ref()
            .and_then(|s| s.actor.as_deref())
            .or_else(|| {
                self.ticket
                    .resolution
                    .as_ref()
                    .and_then(|r| r.resolved_by.as_deref())
            });
        let description = match status {
            TicketStatus::WorkCompleted => Some("Work completed, awaiting confirmation".to_string()),
            TicketStatus::AwaitingClosure => Some("Awaiting IT closure".to_string()),
            TicketStatus::Confirmed => Some("Confirmed by requester, awaiting closure".to_string()),
            _ if auto => Some("Closed automatically".to_string()),
            _ => closed_by.map(|name| format!("Closed by {name}")),
        };

        let timestamp = if step_status == StepStatus::Completed {
            self.ticket
                .closed_at
                .or_else(|| record.closed.as_ref().and_then(|s| s.at))
                .or_else(|| record.completed.as_ref().and_then(|s| s.at))
                .or_else(|| self.ticket.resolution.as_ref().and_then(|r| r.resolved_at))
        } else {
            record.completed.as_ref().and_then(|s| s.at)
        };

        Step::new(cycle_id("closed", cycle), cycle_label(label, cycle), step_status)
            .at(timestamp)
            .describe_opt(description)
    }

    /// A cycle that ended in a reopen. A ticket is only reopened after it was
    /// closed, so the whole cycle is shown as done even when the log is sparse.
    /// `latest` marks the cycle closed by the most recent reopen.
    fn push_past_cycle(&self, steps: &mut Vec<Step>, cycle: usize, latest: bool) {
        let empty = CycleRecord::default();
        let record = self.life.cycle(cycle).unwrap_or(&empty);
        // While still reopened, the live assignment belongs to the cycle just closed
        let live = latest && self.status == TicketStatus::Reopened;
        let assignee = record
            .assignee()
            .or_else(|| live.then(|| self.live_assignee()).flatten())
            .unwrap_or(self.options.specialist_placeholder.as_str());
        let was = format!("Was: {assignee}");

        let assigned_at = record.assigned.as_ref().and_then(|s| s.at).or_else(|| {
            self.ticket
                .assignment
                .as_ref()
                .filter(|_| live)
                .and_then(|a| a.assigned_at)
        });
        steps.push(
            Step::new(
                cycle_id("assigned", cycle),
                cycle_label("Assigned", cycle),
                StepStatus::Completed,
            )
            .at(assigned_at)
            .describe(was.clone()),
        );
        steps.push(
            Step::new(
                cycle_id("in-progress", cycle),
                cycle_label("In Progress", cycle),
                StepStatus::Completed,
            )
            .at(record.in_progress.as_ref().and_then(|s| s.at))
            .describe(was),
        );

        let label = if record.auto_closed {
            "Auto-Closed"
        } else {
            "Closed"
        };
        let closed_at = record
            .closed
            .as_ref()
            .and_then(|s| s.at)
            .or_else(|| record.completed.as_ref().and_then(|s| s.at));
        steps.push(
            Step::new(
                cycle_id("closed", cycle),
                cycle_label(label, cycle),
                StepStatus::Completed,
            )
            .at(closed_at)
            .describe_opt(
                record
                    .closed
                    .as_ref()
                    .and_then(|s| s.actor.as_deref())
                    .map(|name| format!("Closed by {name}")),
            ),
        );
    }

    /// The reopen that ended cycle `index`; only the latest can be active
    fn reopened_step(&self, index: usize, latest: bool) -> Step {
        let active = latest && self.status == TicketStatus::Reopened;
        let stamp = self.life.reopens.get(index);
        let timestamp = stamp
            .and_then(|s| s.at)
            .or(if active { self.ticket.updated_at } else { None });
        let description = stamp
            .and_then(|s| s.actor.as_deref())
            .map(|name| format!("Reopened by {name}"));

        Step::new(
            cycle_id("reopened", index),
            cycle_label("Reopened", index),
            if active {
                StepStatus::Active
            } else {
                StepStatus::Completed
            },
        )
        .at(timestamp)
        .describe_opt(description)
    }
}
