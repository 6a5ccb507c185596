//! Read model storage abstractions.
//!
//! Read models are rebuilt from the event log on startup, so an in-memory
//! keyed store is enough for every projection.

pub mod store;

pub use store::{InMemoryReadStore, ReadStore};
