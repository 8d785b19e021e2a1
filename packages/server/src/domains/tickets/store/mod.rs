//! Ticket persistence.
//!
//! `TicketStore` is the seam between lifecycle logic and storage. Each
//! mutating call appends to an ordered mutation log in the same atomic step
//! as the write, and `watch` exposes that log as a stream for the change feed
//! bridge. Lifecycle actions never publish notifications themselves.

mod memory;
mod postgres;

pub use memory::InMemoryTicketStore;
pub use postgres::PostgresTicketStore;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::errors::StoreError;
use super::models::{
    NewTicket, Ticket, TicketChange, TicketDraft, TicketTransition, TransitionResult,
};
use crate::common::TicketId;

/// Stream of mutation log entries appended after the stream was opened.
pub type ChangeStream = BoxStream<'static, Result<TicketChange, StoreError>>;

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// `max(ticket_number) + 1`, or `1` for an empty store.
    ///
    /// Recomputed from persisted state on every call so externally seeded
    /// tickets are respected.
    async fn next_ticket_number(&self) -> Result<i64, StoreError>;

    /// Persist a new ticket. Fails with `DuplicateKey` if the number is taken.
    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Allocate `max(ticket_number) + 1` and insert under the same write
    /// lock, so concurrent calls never draw the same number.
    ///
    /// `DuplicateKey` is only possible if a writer outside this store
    /// inserted the number in between.
    async fn insert_next(&self, draft: TicketDraft) -> Result<Ticket, StoreError>;

    async fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, StoreError>;

    /// Persist the mutable fields (`status`, `assignee`) of an existing ticket.
    ///
    /// Last write wins. Lifecycle operations use [`TicketStore::transition`]
    /// instead; this exists for administrative corrections.
    async fn save(&self, ticket: &Ticket) -> Result<Ticket, StoreError>;

    /// Atomic compare-and-set on the ticket's current status.
    ///
    /// Returns `NotFound` if no such ticket exists.
    async fn transition(
        &self,
        id: TicketId,
        transition: &TicketTransition,
    ) -> Result<TransitionResult, StoreError>;

    /// All tickets, newest first.
    async fn list_all_by_recency(&self) -> Result<Vec<Ticket>, StoreError>;

    /// Subscribe to changes appended from now on.
    async fn watch(&self) -> Result<ChangeStream, StoreError>;

    /// Highest `seq` in the mutation log, `0` when empty.
    async fn latest_seq(&self) -> Result<i64, StoreError>;

    /// Log entries with `seq` greater than `after`, oldest first.
    async fn changes_since(&self, after: i64) -> Result<Vec<TicketChange>, StoreError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
