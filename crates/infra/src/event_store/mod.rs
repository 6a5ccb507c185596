//! Append-only event store boundary.
//!
//! Streams are keyed by `(aggregate_type, aggregate_id)`. Writers append one
//! or more streams atomically; readers load a stream or the whole log.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, StreamId, UncommittedEvent};
