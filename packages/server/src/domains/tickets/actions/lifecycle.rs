//! Status transitions: cancel, assign, finalize.
//!
//! Each action is a single conditional write against the store, so concurrent
//! requests on one ticket either apply in commit order or get rejected.

use tracing::{info, warn};

use super::TicketOutcome;
use crate::common::TicketId;
use crate::domains::tickets::errors::TicketError;
use crate::domains::tickets::models::{TicketTransition, TransitionResult};
use crate::kernel::ServerDeps;

pub async fn cancel_ticket(id: TicketId, deps: &ServerDeps) -> TicketOutcome {
    run_transition(id, TicketTransition::cancel(), "cancel", "Ticket cancelled", deps).await
}

/// Sets the assignee and moves the ticket to `EN_ROUTE`. Reassigning an
/// `EN_ROUTE` ticket is allowed.
pub async fn assign_ticket(id: TicketId, assignee: &str, deps: &ServerDeps) -> TicketOutcome {
    let assignee = assignee.trim();
    if assignee.is_empty() {
        let err = TicketError::Validation("Missing required field: assignee".into());
        warn!(ticket_id = %id, error = %err, "Rejected assignment");
        return err.into();
    }

    run_transition(
        id,
        TicketTransition::assign(assignee),
        "assign",
        "Assignee set successfully",
        deps,
    )
    .await
}

pub async fn finalize_ticket(id: TicketId, deps: &ServerDeps) -> TicketOutcome {
    run_transition(id, TicketTransition::finalize(), "finalize", "Ticket finalized", deps).await
}

async fn run_transition(
    id: TicketId,
    transition: TicketTransition,
    action: &'static str,
    success: &str,
    deps: &ServerDeps,
) -> TicketOutcome {
    match apply(id, &transition, action, success, deps).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(ticket_id = %id, action, error = %e, "Ticket transition failed");
            e.into()
        }
    }
}

async fn apply(
    id: TicketId,
    transition: &TicketTransition,
    action: &'static str,
    success: &str,
    deps: &ServerDeps,
) -> Result<TicketOutcome, TicketError> {
    match deps.store.transition(id, transition).await? {
        TransitionResult::Applied(ticket) => {
            info!(
                ticket_id = %ticket.id,
                ticket_number = ticket.ticket_number,
                status = %ticket.status,
                assignee = %ticket.assignee,
                action,
                "Ticket updated"
            );
            Ok(TicketOutcome::success(success))
        }
        // Repeating the request that produced a terminal state changes nothing.
        TransitionResult::Rejected(current)
            if current.status == transition.to && current.status.is_terminal() =>
        {
            info!(ticket_id = %id, status = %current.status, action, "Ticket already in requested state");
            Ok(TicketOutcome::success(success))
        }
        TransitionResult::Rejected(current) => Err(TicketError::InvalidTransition {
            action,
            current: current.status,
        }),
    }
}
