//! Command execution pipeline (application-level orchestration).
//!
//! ## Command Execution Flow
//!
//! ```text
//! transaction(max_retries, work)
//!   ↓
//! 1. work(uow): load aggregates (rehydrate from their streams)
//!   ↓
//! 2. work(uow): execute commands (pure decisions, events staged per stream)
//!   ↓
//! 3. commit: append every staged stream in one atomic batch,
//!    each with the version it was loaded at
//!   ↓
//! 4. on a concurrency conflict: discard the unit of work, go to 1
//! ```
//!
//! A recorder that touches a purchase, several stock items and a vendor
//! ledger therefore either persists all of its events or none of them.
//! Nothing here performs IO beyond the injected [`EventStore`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use stockledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use stockledger_events::Event;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, StreamId, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic business failure from an aggregate.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A stream changed between load and commit.
    #[error("optimistic concurrency conflict: {0}")]
    Concurrency(String),

    /// History could not be deserialized into the aggregate's event type.
    #[error("failed to deserialize history of {stream}: {message}")]
    Deserialize { stream: String, message: String },

    /// The backend returned a malformed stream.
    #[error("corrupt stream {stream}: {message}")]
    CorruptStream { stream: String, message: String },

    /// Persisting or loading failed.
    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_))
    }
}

#[derive(Debug)]
struct PendingStream {
    stream: StreamId,
    /// Stream version when first loaded in this unit of work.
    expected: u64,
    events: Vec<UncommittedEvent>,
}

/// Staged multi-aggregate write.
///
/// Aggregates are loaded through the unit of work so it remembers the version
/// each decision was based on. Loading a stream twice replays the events
/// already staged for it, so later steps see earlier ones.
#[derive(Debug)]
pub struct UnitOfWork<'a, S: ?Sized> {
    store: &'a S,
    streams: Vec<PendingStream>,
}

impl<'a, S> UnitOfWork<'a, S>
where
    S: EventStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            streams: Vec::new(),
        }
    }

    /// Rehydrate `aggregate` (an empty instance carrying its id).
    pub fn load<A>(&mut self, mut aggregate: A) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        let stream = StreamId::of::<A>(*aggregate.id());
        let history = self.store.load_stream(&stream)?;
        validate_loaded_stream(&stream, &history)?;
        let version = stream_version(&history);
        apply_history(&mut aggregate, &stream, history.iter().map(|e| &e.payload))?;

        match self.streams.iter().position(|p| p.stream == stream) {
            Some(idx) => {
                let pending = &self.streams[idx];
                if pending.expected != version {
                    return Err(DispatchError::Concurrency(format!(
                        "stream {stream} moved from {} to {version} during the unit of work",
                        pending.expected
                    )));
                }
                apply_history(&mut aggregate, &stream, pending.events.iter().map(|e| &e.payload))?;
            }
            None => self.streams.push(PendingStream {
                stream,
                expected: version,
                events: Vec::new(),
            }),
        }

        Ok(aggregate)
    }

    /// Decide and stage events for `aggregate`, applying them in memory.
    ///
    /// An aggregate that was never loaded is treated as a new stream
    /// (expected version = its current version, normally 0).
    pub fn execute<A>(&mut self, aggregate: &mut A, command: A::Command) -> Result<Vec<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Id: Copy + Into<AggregateId>,
        A::Event: Event + Serialize,
    {
        let stream = StreamId::of::<A>(*aggregate.id());
        let idx = match self.streams.iter().position(|p| p.stream == stream) {
            Some(idx) => idx,
            None => {
                self.streams.push(PendingStream {
                    stream: stream.clone(),
                    expected: aggregate.version(),
                    events: Vec::new(),
                });
                self.streams.len() - 1
            }
        };

        let events = stockledger_events::execute(aggregate, &command)?;
        for event in &events {
            let uncommitted = UncommittedEvent::from_typed(&stream, Uuid::now_v7(), event)?;
            self.streams[idx].events.push(uncommitted);
        }

        Ok(events)
    }

    /// Number of staged events across all streams.
    pub fn staged(&self) -> usize {
        self.streams.iter().map(|p| p.events.len()).sum()
    }

    /// Append every staged stream atomically.
    pub fn commit(self) -> Result<Vec<StoredEvent>, DispatchError> {
        let batch: Vec<StreamAppend> = self
            .streams
            .into_iter()
            .filter(|p| !p.events.is_empty())
            .map(|p| StreamAppend {
                stream: p.stream,
                expected_version: ExpectedVersion::Exact(p.expected),
                events: p.events,
            })
            .collect();

        if batch.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.store.append_batch(batch)?)
    }
}

/// Reusable command execution engine for event-sourced aggregates.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    pub fn unit_of_work(&self) -> UnitOfWork<'_, S> {
        UnitOfWork::new(&self.store)
    }

    /// Rehydrate an aggregate for reading.
    pub fn load<A>(&self, aggregate: A) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        self.unit_of_work().load(aggregate)
    }

    /// Load, handle and persist a single command against one aggregate.
    pub fn dispatch<A>(&self, aggregate: A, command: A::Command) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Clone,
        A::Id: Copy + Into<AggregateId>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let (_, committed) = self.transaction(0, |uow| {
            let mut aggregate = uow.load(aggregate.clone())?;
            uow.execute(&mut aggregate, command.clone())?;
            Ok(())
        })?;
        Ok(committed)
    }

    /// Run `work` in a fresh unit of work and commit it, retrying up to
    /// `max_retries` times when a stream moved underneath it.
    ///
    /// Domain errors are returned immediately and nothing is persisted.
    pub fn transaction<T, F>(&self, max_retries: u32, mut work: F) -> Result<(T, Vec<StoredEvent>), DispatchError>
    where
        F: FnMut(&mut UnitOfWork<'_, S>) -> Result<T, DispatchError>,
    {
        let mut attempt = 0u32;
        loop {
            let mut uow = self.unit_of_work();
            let result = work(&mut uow).and_then(|value| {
                let staged = uow.staged();
                uow.commit().map(|committed| (value, committed, staged))
            });

            match result {
                Ok((value, committed, staged)) => {
                    debug!(attempt, staged, "unit of work committed");
                    return Ok((value, committed));
                }
                Err(err) if err.is_concurrency() && attempt < max_retries => {
                    attempt += 1;
                    warn!(attempt, max_retries, error = %err, "retrying unit of work after conflict");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(stream: &StreamId, history: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in history.iter().enumerate() {
        if e.aggregate_id != stream.aggregate_id || e.aggregate_type != stream.aggregate_type {
            return Err(DispatchError::CorruptStream {
                stream: stream.to_string(),
                message: format!("foreign event at index {idx}"),
            });
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::CorruptStream {
                stream: stream.to_string(),
                message: format!("sequence gap (last={last}, found={})", e.sequence_number),
            });
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<'p, A>(
    aggregate: &mut A,
    stream: &StreamId,
    payloads: impl Iterator<Item = &'p JsonValue>,
) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for payload in payloads {
        let event: A::Event = serde_json::from_value(payload.clone()).map_err(|e| DispatchError::Deserialize {
            stream: stream.to_string(),
            message: e.to_string(),
        })?;
        aggregate.apply(&event);
    }
    Ok(())
}
