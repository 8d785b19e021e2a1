use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::TicketId;

/// Assignee sentinel for a ticket nobody has picked up yet.
pub const UNASSIGNED: &str = "ON_HOLD";

/// Support ticket as persisted by the store.
///
/// Everything except `status`, `assignee` and `updated_at` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub ticket_number: i64,
    pub detail: String,
    pub host_name: String,
    pub incident_type: String,
    pub source_ip: String,
    pub image_url: String,
    pub status: TicketStatus,
    pub assignee: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ticket status. `Finalized` and `Cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Pending,
    EnRoute,
    Finalized,
    Cancelled,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Finalized | TicketStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::EnRoute => "EN_ROUTE",
            TicketStatus::Finalized => "FINALIZED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "PENDING" => Ok(TicketStatus::Pending),
            "EN_ROUTE" => Ok(TicketStatus::EnRoute),
            "FINALIZED" => Ok(TicketStatus::Finalized),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid ticket status: {}", s)),
        }
    }
}

/// Validated fields of a new ticket, waiting for a number from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub detail: String,
    pub host_name: String,
    pub incident_type: String,
    pub source_ip: String,
    pub image_url: String,
}

impl TicketDraft {
    pub fn numbered(self, ticket_number: i64) -> NewTicket {
        NewTicket {
            ticket_number,
            detail: self.detail,
            host_name: self.host_name,
            incident_type: self.incident_type,
            source_ip: self.source_ip,
            image_url: self.image_url,
        }
    }
}

/// A ticket about to be inserted: validated fields plus its allocated number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub ticket_number: i64,
    pub detail: String,
    pub host_name: String,
    pub incident_type: String,
    pub source_ip: String,
    pub image_url: String,
}

impl NewTicket {
    /// Builds the full record with creation defaults (`PENDING`, unassigned).
    pub fn into_ticket(self, id: TicketId, now: DateTime<Utc>) -> Ticket {
        Ticket {
            id,
            ticket_number: self.ticket_number,
            detail: self.detail,
            host_name: self.host_name,
            incident_type: self.incident_type,
            source_ip: self.source_ip,
            image_url: self.image_url,
            status: TicketStatus::Pending,
            assignee: UNASSIGNED.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Atomic status change requested by a lifecycle operation.
///
/// Applied only when the ticket's current status is one of `allowed_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketTransition {
    pub to: TicketStatus,
    pub allowed_from: Vec<TicketStatus>,
    pub assignee: Option<String>,
}

impl TicketTransition {
    pub fn cancel() -> Self {
        Self {
            to: TicketStatus::Cancelled,
            allowed_from: vec![TicketStatus::Pending, TicketStatus::EnRoute],
            assignee: None,
        }
    }

    pub fn assign(assignee: impl Into<String>) -> Self {
        Self {
            to: TicketStatus::EnRoute,
            allowed_from: vec![TicketStatus::Pending, TicketStatus::EnRoute],
            assignee: Some(assignee.into()),
        }
    }

    pub fn finalize() -> Self {
        Self {
            to: TicketStatus::Finalized,
            allowed_from: vec![TicketStatus::EnRoute],
            assignee: None,
        }
    }

    pub fn permits(&self, current: TicketStatus) -> bool {
        self.allowed_from.contains(&current)
    }

    /// Applies the transition to an in-memory copy of the ticket.
    pub fn apply_to(&self, ticket: &mut Ticket, now: DateTime<Utc>) {
        ticket.status = self.to;
        if let Some(assignee) = &self.assignee {
            ticket.assignee = assignee.clone();
        }
        ticket.updated_at = now;
    }
}

/// Result of a conditional transition against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Applied(Ticket),
    /// The ticket exists but was in a status the transition does not accept.
    Rejected(Ticket),
}
