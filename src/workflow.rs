use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ApprovalLevel, InvoiceStatus};

/// The forward path an invoice takes when nothing goes wrong. `Rejected`
/// sits outside this order; it is reachable only through [`WorkflowEvent::Reject`].
pub const ADVANCE_ORDER: [InvoiceStatus; 5] = [
    InvoiceStatus::Submitted,
    InvoiceStatus::Approval1,
    InvoiceStatus::Approval2,
    InvoiceStatus::PendingPayment,
    InvoiceStatus::Paid,
];

/// Something that happens to an invoice. Every state change in the system
/// goes through [`apply`] with one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A contractor submits (or resubmits) the timecard for a period.
    Submit,
    /// An approver signs off at their level.
    Approve {
        level: ApprovalLevel,
        approver: String,
    },
    /// An approver sends the timecard back with a reason.
    Reject { approver: String, reason: String },
    /// An administrator pushes the invoice one step along [`ADVANCE_ORDER`].
    Advance { actor: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("No invoice exists for this pay period")]
    NoInvoice,
    #[error("Invoice is already {} and can no longer be edited", .0.display_name())]
    SubmissionLocked(InvoiceStatus),
    #[error("Invoice is not awaiting first approval")]
    NotAwaitingFirstApproval,
    #[error("Invoice is not awaiting second approval")]
    NotAwaitingSecondApproval,
    #[error("Invoice cannot be rejected at this stage")]
    NotRejectable,
    #[error("A rejection reason is required")]
    ReasonRequired,
    #[error("Cannot advance status: invoice is already paid")]
    AdvanceAtTerminal,
    #[error("Cannot advance status from {}", .0.display_name())]
    AdvanceOutsideOrder(InvoiceStatus),
}

/// Who did what, when. Written into the matching `*_by` / `*_at` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub by: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub by: String,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// The outcome of a legal event: the new status plus whichever provenance
/// stamps the event earned. Fields left `None` keep their stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub to: InvoiceStatus,
    pub approval_1: Option<Stamp>,
    pub approval_2: Option<Stamp>,
    pub paid_at: Option<DateTime<Utc>>,
    pub rejection: Option<Rejection>,
}

fn transition(to: InvoiceStatus) -> Transition {
    Transition {
        to,
        approval_1: None,
        approval_2: None,
        paid_at: None,
        rejection: None,
    }
}

/// Decide what `event` does to an invoice currently in `current` status.
/// `None` means no invoice row exists for the period yet. Pure: the caller
/// loads the row and writes the result back.
pub fn apply(
    current: Option<InvoiceStatus>,
    event: &WorkflowEvent,
    now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
    match event {
        WorkflowEvent::Submit => submit(current),
        WorkflowEvent::Approve { level, approver } => approve(current, *level, approver, now),
        WorkflowEvent::Reject { approver, reason } => reject(current, approver, reason, now),
        WorkflowEvent::Advance { actor } => advance(current, actor, now),
    }
}

/// A first submission fills an empty period. Resubmission is allowed while
/// the invoice is still waiting on first approval, and again after a
/// rejection; once an approver has signed off the row is locked.
fn submit(current: Option<InvoiceStatus>) -> Result<Transition, WorkflowError> {
    match current {
        None | Some(InvoiceStatus::Submitted) | Some(InvoiceStatus::Rejected) => {
            Ok(transition(InvoiceStatus::Submitted))
        }
        Some(locked) => Err(WorkflowError::SubmissionLocked(locked)),
    }
}

fn approve(
    current: Option<InvoiceStatus>,
    level: ApprovalLevel,
    approver: &str,
    now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
    let stamp = Stamp {
        by: approver.to_string(),
        at: now,
    };
    match level {
        ApprovalLevel::First => {
            if current != Some(InvoiceStatus::Submitted) {
                return Err(WorkflowError::NotAwaitingFirstApproval);
            }
            let mut t = transition(InvoiceStatus::Approval1);
            t.approval_1 = Some(stamp);
            Ok(t)
        }
        ApprovalLevel::Second => {
            if current != Some(InvoiceStatus::Approval1) {
                return Err(WorkflowError::NotAwaitingSecondApproval);
            }
            let mut t = transition(InvoiceStatus::Approval2);
            t.approval_2 = Some(stamp);
            Ok(t)
        }
    }
}

fn reject(
    current: Option<InvoiceStatus>,
    approver: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(WorkflowError::ReasonRequired);
    }
    match current {
        Some(InvoiceStatus::Submitted) | Some(InvoiceStatus::Approval1) => {
            let mut t = transition(InvoiceStatus::Rejected);
            t.rejection = Some(Rejection {
                by: approver.to_string(),
                at: now,
                reason: reason.to_string(),
            });
            Ok(t)
        }
        _ => Err(WorkflowError::NotRejectable),
    }
}

/// Unguarded forward step for administrators. Earns the same provenance
/// stamps the guarded path would, attributed to `actor`.
fn advance(
    current: Option<InvoiceStatus>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
    let status = current.ok_or(WorkflowError::NoInvoice)?;
    let position = ADVANCE_ORDER
        .iter()
        .position(|s| *s == status)
        .ok_or(WorkflowError::AdvanceOutsideOrder(status))?;
    let next = ADVANCE_ORDER
        .get(position + 1)
        .copied()
        .ok_or(WorkflowError::AdvanceAtTerminal)?;

    let mut t = transition(next);
    match next {
        InvoiceStatus::Approval1 => {
            t.approval_1 = Some(Stamp {
                by: actor.to_string(),
                at: now,
            });
        }
        InvoiceStatus::Approval2 => {
            t.approval_2 = Some(Stamp {
                by: actor.to_string(),
                at: now,
            });
        }
        InvoiceStatus::Paid => t.paid_at = Some(now),
        _ => {}
    }
    Ok(t)
}
