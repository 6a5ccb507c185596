//! Projection contract (read model builders).
//!
//! Read models are **disposable**: events are the source of truth and any
//! projection can be rebuilt by replaying the store in `global_position` order.
//! Projections must be idempotent; [`StreamCursors`] gives them the per-stream
//! "skip what I've already seen" check.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockledger_core::AggregateId;

use crate::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: String,
        message: String,
    },

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event does not belong to stream: {0}")]
    StreamMismatch(String),

    #[error("read model lock poisoned")]
    Poisoned,
}

/// A read model fed from committed events.
pub trait Projection: Send + Sync {
    /// Stable projection name (used in logs).
    fn name(&self) -> &'static str;

    /// Apply one committed event. Envelopes from streams this projection does
    /// not care about are ignored; redelivered envelopes are no-ops.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state (before a full rebuild).
    fn reset(&self);
}

/// Outcome of a cursor check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorCheck {
    /// Next expected event: apply it.
    Apply,
    /// Already applied: skip.
    Duplicate,
}

/// Per-stream last-applied sequence numbers.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(String, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `envelope` should be applied.
    ///
    /// A gap (seq > last + 1) is an error: the projection would silently miss
    /// a fact otherwise.
    pub fn check<E>(&self, envelope: &EventEnvelope<E>) -> Result<CursorCheck, ProjectionError> {
        let seq = envelope.sequence_number();
        let last = self.last(envelope.aggregate_type(), envelope.aggregate_id())?;

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(CursorCheck::Duplicate);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(CursorCheck::Apply)
    }

    /// Record that `envelope` has been applied.
    pub fn advance<E>(&self, envelope: &EventEnvelope<E>) -> Result<(), ProjectionError> {
        let mut map = self.inner.write().map_err(|_| ProjectionError::Poisoned)?;
        map.insert(
            (envelope.aggregate_type().to_string(), envelope.aggregate_id()),
            envelope.sequence_number(),
        );
        Ok(())
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }

    fn last(&self, aggregate_type: &str, aggregate_id: AggregateId) -> Result<u64, ProjectionError> {
        let map = self.inner.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(map
            .get(&(aggregate_type.to_string(), aggregate_id))
            .copied()
            .unwrap_or(0))
    }
}

/// Deserialize an envelope payload into a typed event.
pub fn decode<E: serde::de::DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type: envelope.aggregate_type().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn envelope(id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), id, "test.stream", seq, seq, "test.event", Utc::now(), JsonValue::Null)
    }

    #[test]
    fn cursor_skips_redelivered_events() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert_eq!(cursors.check(&envelope(id, 1)).unwrap(), CursorCheck::Apply);
        cursors.advance(&envelope(id, 1)).unwrap();
        assert_eq!(cursors.check(&envelope(id, 1)).unwrap(), CursorCheck::Duplicate);
        assert_eq!(cursors.check(&envelope(id, 2)).unwrap(), CursorCheck::Apply);
    }

    #[test]
    fn cursor_rejects_gaps() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();
        cursors.advance(&envelope(id, 1)).unwrap();

        let err = cursors.check(&envelope(id, 3)).unwrap_err();
        assert_eq!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 });
    }
}
