//! Postgres-backed event store.
//!
//! A batch is written inside one SQL transaction. Every stream in the batch
//! is locked with `pg_advisory_xact_lock` (in a stable order, so two batches
//! touching the same streams cannot deadlock), its version checked, and its
//! events inserted. The `(aggregate_type, aggregate_id, sequence_number)`
//! unique constraint backs the version check.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | EventStoreError |
//! |------------|-----------------|-----------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check violation) | `23514` | `InvalidAppend` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / Io / other | n/a | `Backend` |

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockledger_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, StreamId, validate_batch};

/// Schema applied by [`PostgresEventStore::migrate`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_events.sql");

/// Postgres-backed append-only event store.
///
/// The [`EventStore`] trait is synchronous; the blocking adapter requires a
/// multi-threaded tokio runtime (it uses `block_in_place`).
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the events table if it does not exist.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(stream = %stream), err)]
    pub async fn load_stream_async(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_type, aggregate_id, sequence_number, global_position,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(&stream.aggregate_type)
        .bind(stream.aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows.iter().map(stored_event_from_row).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn load_all_async(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_type, aggregate_id, sequence_number, global_position,
                   event_type, event_version, occurred_at, payload
            FROM events
            ORDER BY global_position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        rows.iter().map(stored_event_from_row).collect()
    }

    #[instrument(skip(self, batch), fields(streams = batch.len()), err)]
    pub async fn append_batch_async(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&batch)?;
        batch.sort_by(|a, b| a.stream.cmp(&b.stream));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for append in &batch {
            lock_stream(&mut tx, &append.stream).await?;
            let current = stream_version(&mut tx, &append.stream).await?;
            if !append.expected_version.matches(current) {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.stream, append.expected_version
                )));
            }
        }

        let mut committed = Vec::new();
        for append in batch {
            let mut next = stream_version(&mut tx, &append.stream).await? + 1;
            for event in append.events {
                let row = sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id, aggregate_type, aggregate_id, sequence_number,
                        event_type, event_version, occurred_at, payload
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING global_position
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.aggregate_type)
                .bind(event.aggregate_id.as_uuid())
                .bind(next as i64)
                .bind(&event.event_type)
                .bind(event.event_version as i32)
                .bind(event.occurred_at)
                .bind(&event.payload)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        EventStoreError::Concurrency(format!(
                            "stream {}: sequence_number {next} already exists",
                            append.stream
                        ))
                    } else {
                        map_sqlx_error("insert_event", e)
                    }
                })?;

                let global_position: i64 = row
                    .try_get("global_position")
                    .map_err(|e| map_sqlx_error("insert_event", e))?;

                committed.push(StoredEvent {
                    event_id: event.event_id,
                    aggregate_id: event.aggregate_id,
                    aggregate_type: event.aggregate_type,
                    sequence_number: next,
                    global_position: global_position as u64,
                    event_type: event.event_type,
                    event_version: event.event_version,
                    occurred_at: event.occurred_at,
                    payload: event.payload,
                });
                next += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        committed.sort_by_key(|e| e.global_position);
        Ok(committed)
    }

    /// Run a store future from synchronous code.
    fn blocking<F, T>(&self, fut: F) -> Result<T, EventStoreError>
    where
        F: std::future::Future<Output = Result<T, EventStoreError>>,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            EventStoreError::Backend("PostgresEventStore must be used inside a tokio runtime".to_string())
        })?;
        tokio::task::block_in_place(|| handle.block_on(fut))
    }
}

impl EventStore for PostgresEventStore {
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.blocking(self.append_batch_async(batch))
    }

    fn load_stream(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.blocking(self.load_stream_async(stream))
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.blocking(self.load_all_async())
    }
}

async fn lock_stream(tx: &mut Transaction<'_, Postgres>, stream: &StreamId) -> Result<(), EventStoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(stream.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stream", e))?;
    Ok(())
}

async fn stream_version(tx: &mut Transaction<'_, Postgres>, stream: &StreamId) -> Result<u64, EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(sequence_number), 0) AS current_version
        FROM events
        WHERE aggregate_type = $1 AND aggregate_id = $2
        "#,
    )
    .bind(&stream.aggregate_type)
    .bind(stream.aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("stream_version", e))?;

    let current: i64 = row
        .try_get("current_version")
        .map_err(|e| map_sqlx_error("stream_version", e))?;
    Ok(current as u64)
}

fn stored_event_from_row(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let decode = |e: sqlx::Error| EventStoreError::Backend(format!("failed to decode event row: {e}"));

    let aggregate_id: uuid::Uuid = row.try_get("aggregate_id").map_err(decode)?;
    let sequence_number: i64 = row.try_get("sequence_number").map_err(decode)?;
    let global_position: i64 = row.try_get("global_position").map_err(decode)?;
    let event_version: i32 = row.try_get("event_version").map_err(decode)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(decode)?;

    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(decode)?,
        aggregate_id: AggregateId::from_uuid(aggregate_id),
        aggregate_type: row.try_get("aggregate_type").map_err(decode)?,
        sequence_number: sequence_number as u64,
        global_position: global_position as u64,
        event_type: row.try_get("event_type").map_err(decode)?,
        event_version: event_version as u32,
        occurred_at,
        payload: row.try_get("payload").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => EventStoreError::Backend(format!("connection pool closed in {operation}")),
        other => EventStoreError::Backend(format!("{operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
