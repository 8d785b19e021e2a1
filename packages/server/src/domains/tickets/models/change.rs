//! Mutation log entries.
//!
//! Every ticket insert or update appends one `TicketChange` in the same
//! atomic step as the write itself. The change feed bridge republishes these
//! entries verbatim, so this struct *is* the wire shape of a `ticketChange`
//! event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ticket::{Ticket, TicketStatus};
use crate::common::TicketId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_change_operation", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Insert,
    Update,
}

/// Fields touched by an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedFields {
    pub status: TicketStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assignee: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketChange {
    /// Position in the mutation log. Strictly increasing.
    pub seq: i64,
    pub operation_type: ChangeOperation,
    pub ticket_id: TicketId,
    pub full_document: Ticket,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_fields: Option<UpdatedFields>,
    pub occurred_at: DateTime<Utc>,
}

impl TicketChange {
    pub fn inserted(seq: i64, ticket: Ticket) -> Self {
        Self {
            seq,
            operation_type: ChangeOperation::Insert,
            ticket_id: ticket.id,
            occurred_at: ticket.created_at,
            full_document: ticket,
            updated_fields: None,
        }
    }

    /// Builds an update entry by diffing the assignee against the prior record.
    pub fn updated(seq: i64, before: &Ticket, after: Ticket) -> Self {
        let assignee = (before.assignee != after.assignee).then(|| after.assignee.clone());
        Self {
            seq,
            operation_type: ChangeOperation::Update,
            ticket_id: after.id,
            occurred_at: after.updated_at,
            updated_fields: Some(UpdatedFields {
                status: after.status,
                assignee,
                updated_at: after.updated_at,
            }),
            full_document: after,
        }
    }
}
