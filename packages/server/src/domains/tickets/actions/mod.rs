//! Ticket domain actions - business logic functions
//!
//! Actions are async functions called directly from HTTP handlers. They talk
//! to the store only; change notifications come from the change feed bridge.

mod create_ticket;
mod lifecycle;
mod list_tickets;
mod outcome;

pub use create_ticket::{create_ticket, CreateTicketInput, MAX_CREATE_ATTEMPTS};
pub use lifecycle::{assign_ticket, cancel_ticket, finalize_ticket};
pub use list_tickets::list_tickets;
pub use outcome::TicketOutcome;
