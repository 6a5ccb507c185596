//! Projection replay: rebuild every read model from the event log.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use stockledger_events::{Projection, ProjectionError};

use crate::event_store::{EventStore, EventStoreError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("projection {projection} failed at position {position}: {source}")]
    Projection {
        projection: &'static str,
        position: u64,
        source: ProjectionError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub events: u64,
    pub projections: usize,
}

/// Reset `projections` and replay the whole store into them in global order.
pub fn rebuild<S>(store: &S, projections: &[&dyn Projection]) -> Result<ReplayReport, ReplayError>
where
    S: EventStore + ?Sized,
{
    for projection in projections {
        projection.reset();
    }

    let events = store.load_all()?;
    for stored in &events {
        let envelope = stored.to_envelope();
        for projection in projections {
            projection
                .apply_envelope(&envelope)
                .map_err(|source| ReplayError::Projection {
                    projection: projection.name(),
                    position: stored.global_position,
                    source,
                })?;
        }
    }

    let report = ReplayReport {
        events: events.len() as u64,
        projections: projections.len(),
    };
    info!(events = report.events, projections = report.projections, "read models rebuilt");
    Ok(report)
}
