//! Postgres-backed ticket store.
//!
//! Every write runs in one transaction that
//! 1. takes a transaction-scoped advisory lock (log order == commit order,
//!    and `insert_next` reads the number maximum under it),
//! 2. writes the ticket row,
//! 3. appends to `ticket_changes`,
//! 4. queues `pg_notify('ticket_changes', seq)`, delivered on commit.
//!
//! `watch` listens on that channel and reads the log table, so a burst of
//! notifications collapses into one range read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::{ChangeStream, TicketStore};
use crate::common::TicketId;
use crate::domains::tickets::errors::StoreError;
use crate::domains::tickets::models::{
    ChangeOperation, NewTicket, Ticket, TicketChange, TicketDraft, TicketTransition,
    TransitionResult, UpdatedFields,
};

/// LISTEN/NOTIFY channel carrying new log sequence numbers.
pub const CHANGE_CHANNEL: &str = "ticket_changes";

/// Advisory lock key serializing ticket writes ("TICKETS" in ASCII).
const WRITE_LOCK_KEY: i64 = 0x5449_434b_4554_53;

/// Listener, pool and last forwarded `seq` carried between watch batches.
type WatchState = (PgListener, PgPool, i64);

#[derive(sqlx::FromRow)]
struct ChangeRow {
    seq: i64,
    operation_type: ChangeOperation,
    ticket_id: TicketId,
    full_document: Json<Ticket>,
    updated_fields: Option<Json<UpdatedFields>>,
    occurred_at: DateTime<Utc>,
}

impl From<ChangeRow> for TicketChange {
    fn from(row: ChangeRow) -> Self {
        TicketChange {
            seq: row.seq,
            operation_type: row.operation_type,
            ticket_id: row.ticket_id,
            full_document: row.full_document.0,
            updated_fields: row.updated_fields.map(|f| f.0),
            occurred_at: row.occurred_at,
        }
    }
}

#[derive(Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_writes(conn: &mut PgConnection) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(WRITE_LOCK_KEY)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn next_number(conn: &mut PgConnection) -> Result<i64, StoreError> {
        let next: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(ticket_number), 0) + 1 FROM tickets")
                .fetch_one(conn)
                .await?;
        Ok(next)
    }

    /// Insert the row and its log entry. Caller holds the write lock.
    async fn insert_locked(
        conn: &mut PgConnection,
        ticket: &NewTicket,
    ) -> Result<Ticket, StoreError> {
        let number = ticket.ticket_number;
        let inserted = sqlx::query_as::<_, Ticket>(
            r#"
            WITH now AS (SELECT clock_timestamp() AS ts)
            INSERT INTO tickets
                (id, ticket_number, detail, host_name, incident_type, source_ip, image_url,
                 created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, now.ts, now.ts FROM now
            RETURNING *
            "#,
        )
        .bind(TicketId::new())
        .bind(number)
        .bind(&ticket.detail)
        .bind(&ticket.host_name)
        .bind(&ticket.incident_type)
        .bind(&ticket.source_ip)
        .bind(&ticket.image_url)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_insert_error(e, number))?;

        Self::append_change(conn, TicketChange::inserted(0, inserted.clone())).await?;
        Ok(inserted)
    }

    async fn find_for_update(
        conn: &mut PgConnection,
        id: TicketId,
    ) -> Result<Option<Ticket>, StoreError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(ticket)
    }

    async fn update_mutable_fields(
        conn: &mut PgConnection,
        ticket: &Ticket,
    ) -> Result<Ticket, StoreError> {
        let updated = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = $2, assignee = $3, updated_at = clock_timestamp()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.status)
        .bind(&ticket.assignee)
        .fetch_one(conn)
        .await?;
        Ok(updated)
    }

    /// Append a log entry and queue its notification. Fills in `seq`.
    async fn append_change(
        conn: &mut PgConnection,
        mut change: TicketChange,
    ) -> Result<TicketChange, StoreError> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ticket_changes
                (operation_type, ticket_id, full_document, updated_fields, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING seq
            "#,
        )
        .bind(change.operation_type)
        .bind(change.ticket_id)
        .bind(Json(&change.full_document))
        .bind(change.updated_fields.as_ref().map(Json))
        .bind(change.occurred_at)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGE_CHANNEL)
            .bind(seq.to_string())
            .execute(&mut *conn)
            .await?;

        change.seq = seq;
        Ok(change)
    }

    async fn fetch_changes_since(pool: &PgPool, after: i64) -> Result<Vec<TicketChange>, StoreError> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT seq, operation_type, ticket_id, full_document, updated_fields, occurred_at
            FROM ticket_changes
            WHERE seq > $1
            ORDER BY seq
            "#,
        )
        .bind(after)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(TicketChange::from).collect())
    }

    /// Wait for a notification and read every log entry after `last`.
    ///
    /// Notifications that turn up nothing new (already read in an earlier
    /// batch) are skipped.
    async fn next_batch(
        mut listener: PgListener,
        pool: PgPool,
        last: i64,
    ) -> Result<Option<(Vec<TicketChange>, WatchState)>, StoreError> {
        loop {
            // `None` means the connection dropped; the caller re-subscribes.
            if listener.try_recv().await?.is_none() {
                return Err(StoreError::StreamClosed);
            }
            let changes = Self::fetch_changes_since(&pool, last).await?;
            if let Some(newest) = changes.last().map(|c| c.seq) {
                return Ok(Some((changes, (listener, pool, newest))));
            }
        }
    }
}

fn map_insert_error(err: sqlx::Error, ticket_number: i64) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateKey(ticket_number)
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn next_ticket_number(&self) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::next_number(&mut conn).await
    }

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_writes(&mut tx).await?;
        let inserted = Self::insert_locked(&mut tx, &ticket).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_next(&self, draft: TicketDraft) -> Result<Ticket, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_writes(&mut tx).await?;
        let number = Self::next_number(&mut tx).await?;
        let inserted = Self::insert_locked(&mut tx, &draft.numbered(number)).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn save(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_writes(&mut tx).await?;

        let before = Self::find_for_update(&mut tx, ticket.id)
            .await?
            .ok_or(StoreError::NotFound)?;
        let after = Self::update_mutable_fields(&mut tx, ticket).await?;

        Self::append_change(&mut tx, TicketChange::updated(0, &before, after.clone())).await?;
        tx.commit().await?;
        Ok(after)
    }

    async fn transition(
        &self,
        id: TicketId,
        transition: &TicketTransition,
    ) -> Result<TransitionResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_writes(&mut tx).await?;

        let before = Self::find_for_update(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound)?;
        if !transition.permits(before.status) {
            tx.rollback().await?;
            return Ok(TransitionResult::Rejected(before));
        }

        let mut next = before.clone();
        transition.apply_to(&mut next, Utc::now());
        let after = Self::update_mutable_fields(&mut tx, &next).await?;

        Self::append_change(&mut tx, TicketChange::updated(0, &before, after.clone())).await?;
        tx.commit().await?;
        Ok(TransitionResult::Applied(after))
    }

    async fn list_all_by_recency(&self) -> Result<Vec<Ticket>, StoreError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets ORDER BY created_at DESC, ticket_number DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn watch(&self) -> Result<ChangeStream, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        // Read the high-water mark only after LISTEN so nothing falls in between.
        let start = self.latest_seq().await?;
        let pool = self.pool.clone();

        let stream = futures::stream::try_unfold((listener, pool, start), |(listener, pool, last)| {
            Self::next_batch(listener, pool, last)
        })
        .map_ok(|batch| futures::stream::iter(batch.into_iter().map(Ok::<_, StoreError>)))
        .try_flatten();

        Ok(stream.boxed())
    }

    async fn latest_seq(&self) -> Result<i64, StoreError> {
        let seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM ticket_changes")
            .fetch_one(&self.pool)
            .await?;
        Ok(seq)
    }

    async fn changes_since(&self, after: i64) -> Result<Vec<TicketChange>, StoreError> {
        Self::fetch_changes_since(&self.pool, after).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
