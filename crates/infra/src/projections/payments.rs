//! Payments projection, plus the index of issued payment numbers.

use std::collections::HashSet;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use stockledger_core::AggregateRoot;
use stockledger_events::{CursorCheck, EventEnvelope, Projection, ProjectionError, StreamCursors, decode};
use stockledger_purchasing::{Payment, PaymentEvent, PaymentId, PaymentRecorded};
use stockledger_vendors::VendorId;

use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug)]
pub struct PaymentsProjection<S = InMemoryReadStore<PaymentId, PaymentRecorded>>
where
    S: ReadStore<PaymentId, PaymentRecorded>,
{
    store: S,
    numbers: RwLock<HashSet<String>>,
    cursors: StreamCursors,
}

impl Default for PaymentsProjection {
    fn default() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> PaymentsProjection<S>
where
    S: ReadStore<PaymentId, PaymentRecorded>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            numbers: RwLock::new(HashSet::new()),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, payment_id: &PaymentId) -> Option<PaymentRecorded> {
        self.store.get(payment_id)
    }

    pub fn is_number_taken(&self, payment_no: &str) -> Result<bool, ProjectionError> {
        let numbers = self.numbers.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(numbers.contains(payment_no))
    }

    /// A vendor's payments, newest first.
    pub fn for_vendor(&self, vendor_id: VendorId) -> Vec<PaymentRecorded> {
        let mut payments: Vec<PaymentRecorded> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.vendor_id == vendor_id)
            .collect();
        payments.sort_by(|a, b| (b.payment_date, b.occurred_at).cmp(&(a.payment_date, a.occurred_at)));
        payments
    }
}

impl<S> Projection for PaymentsProjection<S>
where
    S: ReadStore<PaymentId, PaymentRecorded>,
{
    fn name(&self) -> &'static str {
        "purchasing.payments"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Payment::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Duplicate {
            return Ok(());
        }

        match decode::<PaymentEvent>(envelope)? {
            PaymentEvent::PaymentRecorded(e) => {
                self.numbers
                    .write()
                    .map_err(|_| ProjectionError::Poisoned)?
                    .insert(e.payment_no.clone());
                self.store.upsert(e.payment_id, e);
            }
        }

        self.cursors.advance(envelope)
    }

    fn reset(&self) {
        self.store.clear();
        if let Ok(mut numbers) = self.numbers.write() {
            numbers.clear();
        }
        self.cursors.clear();
    }
}
