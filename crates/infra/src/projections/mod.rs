//! Projection implementations (read model builders).
//!
//! Projections consume committed events and build query-optimized read
//! models. All of them are:
//! - **Rebuildable**: reconstructed from the event log by [`replay::rebuild`]
//! - **Idempotent**: per-stream cursors skip redelivered events

pub mod inventory_transactions;
pub mod ledger_entries;
pub mod payments;
pub mod purchases;
pub mod replay;
pub mod stock_levels;
pub mod vendor_accounts;

use serde_json::Value as JsonValue;

use stockledger_events::{EventEnvelope, Projection, ProjectionError};

use crate::event_store::EventStore;

pub use inventory_transactions::{InventoryTransactionsProjection, TransactionView};
pub use ledger_entries::{LedgerEntriesProjection, LedgerPage};
pub use payments::PaymentsProjection;
pub use purchases::{PurchaseView, PurchasesProjection};
pub use replay::{ReplayError, ReplayReport, rebuild};
pub use stock_levels::{StockLevelsProjection, VariantStock};
pub use vendor_accounts::{VendorAccount, VendorAccountsProjection};

/// Every read model the service maintains.
#[derive(Debug, Default)]
pub struct ReadModels {
    pub vendor_accounts: VendorAccountsProjection,
    pub ledger_entries: LedgerEntriesProjection,
    pub stock_levels: StockLevelsProjection,
    pub purchases: PurchasesProjection,
    pub payments: PaymentsProjection,
    pub transactions: InventoryTransactionsProjection,
}

impl ReadModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> [&dyn Projection; 6] {
        [
            &self.vendor_accounts,
            &self.ledger_entries,
            &self.stock_levels,
            &self.purchases,
            &self.payments,
            &self.transactions,
        ]
    }

    /// Feed one committed event to every projection.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        for projection in self.all() {
            projection.apply_envelope(envelope)?;
        }
        Ok(())
    }

    pub fn rebuild<S: EventStore + ?Sized>(&self, store: &S) -> Result<ReplayReport, ReplayError> {
        rebuild(store, &self.all())
    }
}
