//! In-process ticket store.
//!
//! Backs tests and database-less local runs. A single write lock covers the
//! ticket table, the mutation log and the broadcast of each new log entry, so
//! log order, broadcast order and `seq` always agree.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;

use super::{ChangeStream, TicketStore};
use crate::common::TicketId;
use crate::domains::tickets::errors::StoreError;
use crate::domains::tickets::models::{
    NewTicket, Ticket, TicketChange, TicketDraft, TicketTransition, TransitionResult,
};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct MemoryState {
    tickets: Vec<Ticket>,
    log: Vec<TicketChange>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Wall-clock time, nudged forward so no two writes share a timestamp.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn next_number(&self) -> i64 {
        self.tickets
            .iter()
            .map(|t| t.ticket_number)
            .max()
            .map_or(1, |max| max + 1)
    }

    fn latest_seq(&self) -> i64 {
        self.log.last().map_or(0, |c| c.seq)
    }

    fn next_seq(&self) -> i64 {
        self.log.last().map_or(1, |c| c.seq + 1)
    }

    fn position(&self, id: TicketId) -> Option<usize> {
        self.tickets.iter().position(|t| t.id == id)
    }
}

pub struct InMemoryTicketStore {
    state: RwLock<MemoryState>,
    changes: broadcast::Sender<TicketChange>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(MemoryState::default()),
            changes,
        }
    }

    /// Store pre-populated with existing tickets, as if migrated from elsewhere.
    ///
    /// Seeded tickets bypass the mutation log.
    pub fn with_tickets(tickets: Vec<Ticket>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let state = MemoryState {
            last_stamp: tickets.iter().map(|t| t.updated_at).max(),
            tickets,
            log: Vec::new(),
        };
        Self {
            state: RwLock::new(state),
            changes,
        }
    }

    fn insert_locked(
        &self,
        state: &mut MemoryState,
        ticket: NewTicket,
    ) -> Result<Ticket, StoreError> {
        if state
            .tickets
            .iter()
            .any(|t| t.ticket_number == ticket.ticket_number)
        {
            return Err(StoreError::DuplicateKey(ticket.ticket_number));
        }

        let now = state.stamp();
        let ticket = ticket.into_ticket(TicketId::new(), now);
        state.tickets.push(ticket.clone());

        let seq = state.next_seq();
        self.record(state, TicketChange::inserted(seq, ticket.clone()));
        Ok(ticket)
    }

    fn record(&self, state: &mut MemoryState, change: TicketChange) {
        state.log.push(change.clone());
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(change);
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn next_ticket_number(&self) -> Result<i64, StoreError> {
        Ok(self.state.read().await.next_number())
    }

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut state = self.state.write().await;
        self.insert_locked(&mut state, ticket)
    }

    async fn insert_next(&self, draft: TicketDraft) -> Result<Ticket, StoreError> {
        let mut state = self.state.write().await;
        let number = state.next_number();
        self.insert_locked(&mut state, draft.numbered(number))
    }

    async fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let state = self.state.read().await;
        Ok(state.position(id).map(|i| state.tickets[i].clone()))
    }

    async fn save(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        let mut state = self.state.write().await;
        let index = state.position(ticket.id).ok_or(StoreError::NotFound)?;

        let now = state.stamp();
        let before = state.tickets[index].clone();
        let after = {
            let stored = &mut state.tickets[index];
            stored.status = ticket.status;
            stored.assignee = ticket.assignee.clone();
            stored.updated_at = now;
            stored.clone()
        };

        let seq = state.next_seq();
        self.record(&mut state, TicketChange::updated(seq, &before, after.clone()));
        Ok(after)
    }

    async fn transition(
        &self,
        id: TicketId,
        transition: &TicketTransition,
    ) -> Result<TransitionResult, StoreError> {
        let mut state = self.state.write().await;
        let index = state.position(id).ok_or(StoreError::NotFound)?;

        let before = state.tickets[index].clone();
        if !transition.permits(before.status) {
            return Ok(TransitionResult::Rejected(before));
        }

        let now = state.stamp();
        let after = {
            let stored = &mut state.tickets[index];
            transition.apply_to(stored, now);
            stored.clone()
        };

        let seq = state.next_seq();
        self.record(&mut state, TicketChange::updated(seq, &before, after.clone()));
        Ok(TransitionResult::Applied(after))
    }

    async fn list_all_by_recency(&self) -> Result<Vec<Ticket>, StoreError> {
        let state = self.state.read().await;
        let mut tickets = state.tickets.clone();
        tickets.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.ticket_number.cmp(&a.ticket_number))
        });
        Ok(tickets)
    }

    async fn watch(&self) -> Result<ChangeStream, StoreError> {
        let stream = BroadcastStream::new(self.changes.subscribe()).map(|item| {
            item.map_err(|err| match err {
                tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n) => {
                    StoreError::Lagged(n)
                }
            })
        });
        Ok(stream.boxed())
    }

    async fn latest_seq(&self) -> Result<i64, StoreError> {
        Ok(self.state.read().await.latest_seq())
    }

    async fn changes_since(&self, after: i64) -> Result<Vec<TicketChange>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .log
            .iter()
            .filter(|c| c.seq > after)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
