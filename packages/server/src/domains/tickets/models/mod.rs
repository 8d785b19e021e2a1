pub mod change;
pub mod ticket;

pub use change::{ChangeOperation, TicketChange, UpdatedFields};
pub use ticket::{
    NewTicket, Ticket, TicketDraft, TicketStatus, TicketTransition, TransitionResult, UNASSIGNED,
};
