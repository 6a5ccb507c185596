//! Inventory transactions projection (including the pending approval queue).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockledger_core::{AggregateRoot, UserId};
use stockledger_events::{CursorCheck, EventEnvelope, Projection, ProjectionError, StreamCursors, decode};
use stockledger_inventory::{
    InventoryTransaction, InventoryTransactionId, TransactionEvent, TransactionItem, TransactionStatus,
    TransactionType,
};
use stockledger_vendors::VendorId;

use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub id: InventoryTransactionId,
    pub transaction_type: TransactionType,
    pub invoice_no: String,
    pub vendor_id: Option<VendorId>,
    pub reason: Option<String>,
    pub status: TransactionStatus,
    pub reference_transaction_id: Option<Uuid>,
    pub items: Vec<TransactionItem>,
    pub performed_by: UserId,
    pub approved_by: Option<UserId>,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct InventoryTransactionsProjection<S = InMemoryReadStore<InventoryTransactionId, TransactionView>>
where
    S: ReadStore<InventoryTransactionId, TransactionView>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for InventoryTransactionsProjection {
    fn default() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> InventoryTransactionsProjection<S>
where
    S: ReadStore<InventoryTransactionId, TransactionView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &InventoryTransactionId) -> Option<TransactionView> {
        self.store.get(id)
    }

    /// Transactions in `status`, oldest first (the checker's queue for `pending`).
    pub fn with_status(&self, status: TransactionStatus) -> Vec<TransactionView> {
        let mut views: Vec<TransactionView> =
            self.store.list().into_iter().filter(|t| t.status == status).collect();
        views.sort_by_key(|t| t.created_at);
        views
    }

    fn modify(&self, id: InventoryTransactionId, f: impl FnOnce(&mut TransactionView)) {
        if let Some(mut view) = self.store.get(&id) {
            f(&mut view);
            self.store.upsert(id, view);
        }
    }
}

impl<S> Projection for InventoryTransactionsProjection<S>
where
    S: ReadStore<InventoryTransactionId, TransactionView>,
{
    fn name(&self) -> &'static str {
        "inventory.transactions"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != InventoryTransaction::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Duplicate {
            return Ok(());
        }

        match decode::<TransactionEvent>(envelope)? {
            TransactionEvent::TransactionCreated(e) => {
                self.store.upsert(
                    e.transaction_id,
                    TransactionView {
                        id: e.transaction_id,
                        transaction_type: e.transaction_type,
                        invoice_no: e.invoice_no,
                        vendor_id: e.vendor_id,
                        reason: e.reason,
                        status: TransactionStatus::Pending,
                        reference_transaction_id: e.reference_transaction_id,
                        items: e.items,
                        performed_by: e.performed_by,
                        approved_by: None,
                        approval_date: None,
                        rejection_reason: None,
                        void_reason: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            TransactionEvent::TransactionApproved(e) => self.modify(e.transaction_id, |view| {
                view.status = TransactionStatus::Approved;
                view.approved_by = Some(e.approved_by);
                view.approval_date = Some(e.occurred_at);
                for (item, snap) in view.items.iter_mut().zip(&e.stock) {
                    item.stock_before = Some(snap.stock_before);
                    item.stock_after = Some(snap.stock_after);
                }
            }),
            TransactionEvent::TransactionRejected(e) => self.modify(e.transaction_id, |view| {
                view.status = TransactionStatus::Rejected;
                view.approved_by = Some(e.rejected_by);
                view.approval_date = Some(e.occurred_at);
                view.rejection_reason = Some(e.reason.clone());
            }),
            TransactionEvent::TransactionVoided(e) => self.modify(e.transaction_id, |view| {
                view.status = TransactionStatus::Voided;
                view.void_reason = Some(e.reason.clone());
            }),
        }

        self.cursors.advance(envelope)
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
