//! Typed ids for domain entities.

pub use super::id::Id;

/// Marker type for support tickets.
pub struct Ticket;

/// Typed id for support tickets.
pub type TicketId = Id<Ticket>;
