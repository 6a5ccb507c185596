use std::collections::HashMap;
use std::sync::RwLock;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, StreamId, validate_batch};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamId, Vec<StoredEvent>>,
    last_position: u64,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. One write lock covers a whole batch, which makes
/// multi-stream appends atomic and serializes writers.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&batch)?;

        let mut inner = self.inner.write().map_err(|_| EventStoreError::Poisoned)?;

        // Check every stream before touching any of them.
        for append in &batch {
            let current = inner
                .streams
                .get(&append.stream)
                .map(|s| Self::current_version(s))
                .unwrap_or(0);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.stream, append.expected_version
                )));
            }
        }

        let mut position = inner.last_position;
        let mut committed = Vec::new();
        for append in batch {
            let stream = inner.streams.entry(append.stream).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                position += 1;
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    global_position: position,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }
        inner.last_position = position;

        Ok(committed)
    }

    fn load_stream(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(inner.streams.get(stream).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| EventStoreError::Poisoned)?;
        let mut all: Vec<StoredEvent> = inner.streams.values().flatten().cloned().collect();
        all.sort_by_key(|e| e.global_position);
        Ok(all)
    }
}
