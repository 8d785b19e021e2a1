use axum::http::StatusCode;
use thiserror::Error;

use super::models::TicketStatus;

/// Errors raised by ticket store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Ticket number {0} already exists")]
    DuplicateKey(i64),

    #[error("Ticket not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Change stream closed")]
    StreamClosed,

    #[error("Change stream lagged behind by {0} entries")]
    Lagged(u64),
}

/// Errors surfaced by lifecycle operations, each mapped to an HTTP status.
///
/// Outcomes use 200, 400, 404 and 500, plus 409 Conflict for a transition
/// the ticket's current status does not allow.
#[derive(Error, Debug)]
pub enum TicketError {
    #[error("{0}")]
    Validation(String),

    #[error("Ticket not found")]
    NotFound,

    #[error("Cannot {action} a ticket that is {current}")]
    InvalidTransition {
        action: &'static str,
        current: TicketStatus,
    },

    #[error("Ticket number {0} already exists")]
    DuplicateKey(i64),

    #[error("{0}")]
    Persistence(String),
}

impl TicketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TicketError::Validation(_) => StatusCode::BAD_REQUEST,
            TicketError::NotFound => StatusCode::NOT_FOUND,
            TicketError::InvalidTransition { .. } => StatusCode::CONFLICT,
            TicketError::DuplicateKey(_) | TicketError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for TicketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(number) => TicketError::DuplicateKey(number),
            StoreError::NotFound => TicketError::NotFound,
            other => TicketError::Persistence(other.to_string()),
        }
    }
}
