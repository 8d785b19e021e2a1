pub mod actions;
pub mod change_feed;
pub mod errors;
pub mod models;
pub mod store;

pub use change_feed::{ChangeFeedBridge, TICKET_CHANGES_TOPIC, TICKET_CHANGE_EVENT};
pub use errors::{StoreError, TicketError};
pub use models::{Ticket, TicketChange, TicketStatus};
pub use store::{InMemoryTicketStore, PostgresTicketStore, TicketStore};
