use tracing::{debug, error};

use crate::domains::tickets::errors::TicketError;
use crate::domains::tickets::models::Ticket;
use crate::kernel::ServerDeps;

/// Every ticket, newest first.
pub async fn list_tickets(deps: &ServerDeps) -> Result<Vec<Ticket>, TicketError> {
    match deps.store.list_all_by_recency().await {
        Ok(tickets) => {
            debug!(count = tickets.len(), "Listed tickets");
            Ok(tickets)
        }
        Err(e) => {
            error!(error = %e, "Failed to list tickets");
            Err(TicketError::Persistence(e.to_string()))
        }
    }
}
