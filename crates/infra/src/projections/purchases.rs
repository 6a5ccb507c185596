//! Purchases projection: purchase headers with their items.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{AggregateRoot, Money, UserId};
use stockledger_events::{CursorCheck, EventEnvelope, Projection, ProjectionError, StreamCursors, decode};
use stockledger_purchasing::{Purchase, PurchaseEvent, PurchaseId, PurchaseLine, PurchaseStatus};
use stockledger_vendors::VendorId;

use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseView {
    pub id: PurchaseId,
    pub vendor_id: VendorId,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    pub items: Vec<PurchaseLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug)]
pub struct PurchasesProjection<S = InMemoryReadStore<PurchaseId, PurchaseView>>
where
    S: ReadStore<PurchaseId, PurchaseView>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for PurchasesProjection {
    fn default() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> PurchasesProjection<S>
where
    S: ReadStore<PurchaseId, PurchaseView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, purchase_id: &PurchaseId) -> Option<PurchaseView> {
        self.store.get(purchase_id)
    }

    /// A vendor's purchases, newest invoice first.
    pub fn for_vendor(&self, vendor_id: VendorId) -> Vec<PurchaseView> {
        let mut purchases: Vec<PurchaseView> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.vendor_id == vendor_id)
            .collect();
        purchases.sort_by(|a, b| (b.invoice_date, b.created_at).cmp(&(a.invoice_date, a.created_at)));
        purchases
    }
}

impl<S> Projection for PurchasesProjection<S>
where
    S: ReadStore<PurchaseId, PurchaseView>,
{
    fn name(&self) -> &'static str {
        "purchasing.purchases"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Purchase::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Duplicate {
            return Ok(());
        }

        match decode::<PurchaseEvent>(envelope)? {
            PurchaseEvent::PurchaseRecorded(e) => {
                self.store.upsert(
                    e.purchase_id,
                    PurchaseView {
                        id: e.purchase_id,
                        vendor_id: e.vendor_id,
                        invoice_no: e.invoice_no,
                        invoice_date: e.invoice_date,
                        subtotal: e.subtotal,
                        discount_amount: e.discount_amount,
                        tax_amount: e.tax_amount,
                        total_amount: e.total_amount,
                        status: e.status,
                        notes: e.notes,
                        items: e.lines,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        cancel_reason: None,
                    },
                );
            }
            PurchaseEvent::PurchaseCancelled(e) => {
                if let Some(mut view) = self.store.get(&e.purchase_id) {
                    view.status = PurchaseStatus::Cancelled;
                    view.cancel_reason = Some(e.reason);
                    self.store.upsert(e.purchase_id, view);
                }
            }
            PurchaseEvent::ReturnRecorded(e) => {
                if let Some(mut view) = self.store.get(&e.purchase_id) {
                    for a in &e.allocations {
                        if let Some(line) = view.items.get_mut(a.line_index) {
                            line.returned_quantity += a.quantity;
                        }
                    }
                    self.store.upsert(e.purchase_id, view);
                }
            }
            PurchaseEvent::ReturnReversed(e) => {
                if let Some(mut view) = self.store.get(&e.purchase_id) {
                    for a in &e.allocations {
                        if let Some(line) = view.items.get_mut(a.line_index) {
                            line.returned_quantity -= a.quantity;
                        }
                    }
                    self.store.upsert(e.purchase_id, view);
                }
            }
        }

        self.cursors.advance(envelope)
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
