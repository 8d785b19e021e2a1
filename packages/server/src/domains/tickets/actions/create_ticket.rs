//! Create ticket action

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::TicketOutcome;
use crate::domains::tickets::errors::{StoreError, TicketError};
use crate::domains::tickets::models::{Ticket, TicketDraft};
use crate::domains::tickets::store::TicketStore;
use crate::kernel::ServerDeps;

/// How often a number collision is retried before giving up.
///
/// Stores allocate numbers under their own write lock, so a collision only
/// happens when something outside this service wrote a ticket concurrently.
pub const MAX_CREATE_ATTEMPTS: usize = 5;

/// Client-supplied fields of a new ticket.
///
/// Fields are optional at the type level so a missing field becomes a
/// validation outcome rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketInput {
    pub detail: Option<String>,
    pub host_name: Option<String>,
    pub incident_type: Option<String>,
    pub source_ip: Option<String>,
    pub image_url: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, TicketError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TicketError::Validation(format!(
            "Missing required field: {}",
            field
        ))),
    }
}

impl CreateTicketInput {
    /// Checks fields in declaration order and reports the first missing one.
    pub fn validate(self) -> Result<TicketDraft, TicketError> {
        Ok(TicketDraft {
            detail: required(self.detail, "detail")?,
            host_name: required(self.host_name, "hostName")?,
            incident_type: required(self.incident_type, "incidentType")?,
            source_ip: required(self.source_ip, "sourceIp")?,
            image_url: required(self.image_url, "imageUrl")?,
        })
    }
}

/// Create a ticket with the next free number.
///
/// The store allocates the number and inserts in one locked step. A
/// `DuplicateKey` means an outside writer took the number anyway; the insert
/// is retried with a freshly computed number.
pub async fn create_ticket(input: CreateTicketInput, deps: &ServerDeps) -> TicketOutcome {
    let draft = match input.validate() {
        Ok(draft) => draft,
        Err(e) => {
            warn!(error = %e, "Rejected ticket creation");
            return e.into();
        }
    };

    match insert_with_retry(&draft, deps.store.as_ref()).await {
        Ok(ticket) => {
            info!(
                ticket_id = %ticket.id,
                ticket_number = ticket.ticket_number,
                host_name = %ticket.host_name,
                "Ticket created"
            );
            TicketOutcome::created(ticket.ticket_number)
        }
        Err(e) => {
            error!(error = %e, "Failed to create ticket");
            e.into()
        }
    }
}

async fn insert_with_retry(
    draft: &TicketDraft,
    store: &dyn TicketStore,
) -> Result<Ticket, TicketError> {
    let mut last_collision = 0;
    for attempt in 1..=MAX_CREATE_ATTEMPTS {
        match store.insert_next(draft.clone()).await {
            Ok(ticket) => return Ok(ticket),
            Err(StoreError::DuplicateKey(taken)) => {
                debug!(ticket_number = taken, attempt, "Ticket number taken, retrying");
                last_collision = taken;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(TicketError::DuplicateKey(last_collision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::TestDependencies;

    fn complete_input() -> CreateTicketInput {
        CreateTicketInput {
            detail: Some("Monitor flickers".into()),
            host_name: Some("PC-03".into()),
            incident_type: Some("hardware".into()),
            source_ip: Some("10.0.0.3".into()),
            image_url: Some("http://files.local/monitor.png".into()),
        }
    }

    #[test]
    fn first_missing_field_is_reported() {
        let input = CreateTicketInput {
            incident_type: None,
            source_ip: Some("   ".into()),
            ..complete_input()
        };
        let err = input.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: incidentType");
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let input = CreateTicketInput {
            image_url: Some("".into()),
            ..complete_input()
        };
        assert!(matches!(input.validate(), Err(TicketError::Validation(_))));
    }

    #[tokio::test]
    async fn created_ticket_gets_next_number() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        let first = create_ticket(complete_input(), &deps).await;
        let second = create_ticket(complete_input(), &deps).await;

        assert_eq!(first, TicketOutcome::created(1));
        assert_eq!(second.ticket_number, Some(2));
    }

    #[tokio::test]
    async fn invalid_input_creates_nothing() {
        let test_deps = TestDependencies::new();
        let outcome = create_ticket(CreateTicketInput::default(), &test_deps.server_deps()).await;

        assert_eq!(outcome.status, 400);
        assert_eq!(outcome.message, "Missing required field: detail");
        assert!(test_deps.store.list_all_by_recency().await.unwrap().is_empty());
    }
}
