use serde::{Deserialize, Serialize};

use crate::domains::tickets::errors::TicketError;

/// Structured result of a lifecycle operation.
///
/// Every operation resolves to one of these; errors never escape the action
/// layer. `status` doubles as the HTTP status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketOutcome {
    pub ok: bool,
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<i64>,
}

impl TicketOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            status: 200,
            message: message.into(),
            ticket_number: None,
        }
    }

    pub fn created(ticket_number: i64) -> Self {
        Self {
            ticket_number: Some(ticket_number),
            ..Self::success("Ticket created successfully")
        }
    }
}

impl From<TicketError> for TicketOutcome {
    fn from(err: TicketError) -> Self {
        Self {
            ok: false,
            status: err.status_code().as_u16(),
            message: err.to_string(),
            ticket_number: None,
        }
    }
}
