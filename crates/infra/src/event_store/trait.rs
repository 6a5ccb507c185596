use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockledger_core::{AggregateId, AggregateRoot, ExpectedVersion};

/// Stream key: `(aggregate_type, aggregate_id)`.
///
/// A vendor and its ledger share one UUID but live in different streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
}

impl StreamId {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
        }
    }

    /// Stream of aggregate `A` with the given id.
    pub fn of<A: AggregateRoot>(aggregate_id: impl Into<AggregateId>) -> Self {
        Self::new(A::AGGREGATE_TYPE, aggregate_id.into())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Lifecycle: a domain event is decided by `Aggregate::handle`, wrapped here
/// with its stream metadata, persisted as a [`StoredEvent`] and finally handed
/// to projections and the bus as an `EventEnvelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Serialize a typed domain event for `stream`, capturing the metadata
    /// needed to deserialize it later.
    pub fn from_typed<E>(stream: &StreamId, event_id: Uuid, event: &E) -> Result<Self, EventStoreError>
    where
        E: stockledger_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            aggregate_id: stream.aggregate_id,
            aggregate_type: stream.aggregate_type.clone(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A persisted event.
///
/// - `sequence_number` is per stream, starts at 1 and has no gaps.
/// - `global_position` is store-wide and strictly increasing in commit order;
///   rebuilds replay in this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub sequence_number: u64,
    pub global_position: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    pub fn stream(&self) -> StreamId {
        StreamId::new(self.aggregate_type.clone(), self.aggregate_id)
    }

    /// Convert into an envelope for projections and bus subscribers.
    pub fn to_envelope(&self) -> stockledger_events::EventEnvelope<JsonValue> {
        stockledger_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.global_position,
            self.event_type.clone(),
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Events for one stream inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub stream: StreamId,
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

/// Event store operation error.
///
/// Infrastructure failures (storage, concurrency) as opposed to domain errors.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A stream moved past the version the writer decided against.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("event store lock poisoned")]
    Poisoned,
}

/// Append-only event store.
///
/// Implementations must:
/// - check every stream's expected version before writing anything
/// - persist a whole batch or nothing (no partial multi-stream commits)
/// - assign gap-free per-stream sequence numbers and increasing global positions
/// - serialize concurrent writers to the same stream
pub trait EventStore: Send + Sync {
    /// Atomically append to one or more streams.
    ///
    /// Returns the committed events in global order.
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load one stream in sequence order (empty if it does not exist).
    fn load_stream(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event in global order (projection rebuilds).
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append to a single stream.
    fn append(
        &self,
        stream: &StreamId,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_batch(vec![StreamAppend {
            stream: stream.clone(),
            expected_version,
            events,
        }])
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_batch(batch)
    }

    fn load_stream(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(stream)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }
}

/// Shape checks shared by every backend: each event belongs to its stream
/// and no stream appears twice in one batch.
pub(crate) fn validate_batch(batch: &[StreamAppend]) -> Result<(), EventStoreError> {
    for (i, append) in batch.iter().enumerate() {
        if batch[..i].iter().any(|other| other.stream == append.stream) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears more than once in a batch",
                append.stream
            )));
        }
        for (idx, e) in append.events.iter().enumerate() {
            if e.aggregate_id != append.stream.aggregate_id
                || e.aggregate_type != append.stream.aggregate_type
            {
                return Err(EventStoreError::InvalidAppend(format!(
                    "event {idx} does not belong to stream {}",
                    append.stream
                )));
            }
        }
    }
    Ok(())
}
