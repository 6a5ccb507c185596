//! Application services: the recorders, the inventory workflow and
//! reconciliation, plus read-side queries.
//!
//! Every write goes through one [`UnitOfWork`](crate::command_dispatcher::UnitOfWork)
//! so a purchase (header, stock, ledger) or an approval persists all of its
//! events or none. Committed events are then fed to the read models
//! synchronously and published on the in-process bus.

pub mod catalog;
pub mod error;
pub mod inventory;
pub mod payments;
pub mod purchases;
pub mod queries;
pub mod reconciliation;

mod stock_book;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};
use uuid::Uuid;

use stockledger_core::AggregateId;
use stockledger_events::{EventBus, EventEnvelope, InMemoryEventBus, ProjectionError, Subscription};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, UnitOfWork};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{ReadModels, ReplayReport};

pub use catalog::{RegisterVariantRequest, RegisterVendorRequest};
pub use error::ServiceError;
pub use inventory::{CreateTransactionRequest, TransactionReceipt};
pub use payments::{PaymentReceipt, RecordPaymentRequest};
pub use purchases::{CancellationReceipt, CreatePurchaseRequest, PurchaseItemRequest, PurchaseReceipt};
pub use reconciliation::{
    ImportReport, LegacyLedgerRow, ReconciliationReport, VendorViolation, VerificationReport,
};

pub(crate) type Store = Arc<dyn EventStore>;
pub(crate) type Uow<'a> = UnitOfWork<'a, Store>;

/// Tunables of the write side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Unit-of-work retries after an optimistic concurrency conflict.
    pub max_retries: u32,
    /// Attempts at drawing an unused payment number.
    pub payment_no_max_attempts: u32,
    /// Minimum trimmed length of rejection, void, damage and adjustment reasons.
    pub min_reason_length: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            payment_no_max_attempts: 8,
            min_reason_length: 3,
        }
    }
}

/// Stock ledger facade used by the HTTP layer and the tests.
pub struct StockLedger {
    dispatcher: CommandDispatcher<Store>,
    read_models: Arc<ReadModels>,
    bus: InMemoryEventBus<EventEnvelope<JsonValue>>,
    config: WorkflowConfig,
    /// Serializes feeding committed events to the read models.
    feed: Mutex<()>,
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger").field("config", &self.config).finish_non_exhaustive()
    }
}

impl StockLedger {
    pub fn new(store: Store, config: WorkflowConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            read_models: Arc::new(ReadModels::new()),
            bus: InMemoryEventBus::new(),
            config,
            feed: Mutex::new(()),
        }
    }

    /// Volatile instance over an in-memory event store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEventStore::new()), WorkflowConfig::default())
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn store(&self) -> &Store {
        self.dispatcher.store()
    }

    /// Receive every committed event from now on.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }

    /// Drop and rebuild every read model from the event log.
    #[instrument(skip(self), err)]
    pub fn rebuild_read_models(&self) -> Result<ReplayReport, ServiceError> {
        let _feed = self.feed.lock().map_err(|_| ProjectionError::Poisoned)?;
        self.read_models
            .rebuild(self.store().as_ref())
            .map_err(|e| ServiceError::Replay(e.to_string()))
    }

    /// Run `work` in a retried unit of work, then feed what it committed to
    /// the read models and the bus.
    pub(crate) fn write<T, F>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnMut(&mut Uow<'_>) -> Result<T, DispatchError>,
    {
        let (value, committed) = self.dispatcher.transaction(self.config.max_retries, work)?;
        self.publish(&committed)?;
        Ok(value)
    }

    fn publish(&self, committed: &[StoredEvent]) -> Result<(), ServiceError> {
        if committed.is_empty() {
            return Ok(());
        }
        let _feed = self.feed.lock().map_err(|_| ProjectionError::Poisoned)?;

        for stored in committed {
            let envelope = stored.to_envelope();
            match self.read_models.apply(&envelope) {
                Ok(()) => {}
                // Another writer committed earlier events of this stream but
                // has not fed them yet: catch the stream up from the store.
                Err(ProjectionError::NonMonotonicSequence { .. }) => self.catch_up(stored)?,
                Err(e) => return Err(e.into()),
            }
            self.bus
                .publish(envelope)
                .map_err(|e| ServiceError::Publish(e.to_string()))?;
        }
        debug!(events = committed.len(), "read models updated");
        Ok(())
    }

    fn catch_up(&self, stored: &StoredEvent) -> Result<(), ServiceError> {
        let history = self.store().load_stream(&stored.stream()).map_err(DispatchError::from)?;
        for earlier in history.iter().filter(|e| e.sequence_number <= stored.sequence_number) {
            self.read_models.apply(&earlier.to_envelope())?;
        }
        Ok(())
    }
}

/// Idempotency key or a fresh identifier.
pub(crate) fn id_or_new(key: Option<Uuid>) -> AggregateId {
    key.map(AggregateId::from_uuid).unwrap_or_default()
}

pub(crate) fn uuid_of(id: impl Into<AggregateId>) -> Uuid {
    *id.into().as_uuid()
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Trimmed, non-empty text.
pub(crate) fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
