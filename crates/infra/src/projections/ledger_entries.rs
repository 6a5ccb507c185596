//! Ledger entries projection: every vendor's entries with their running
//! balances, for the vendor transactions view.

use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::AggregateRoot;
use stockledger_events::{CursorCheck, EventEnvelope, Projection, ProjectionError, StreamCursors, decode};
use stockledger_ledger::chronology::sort_key;
use stockledger_ledger::{LedgerEntry, LedgerEvent, VendorLedger};
use stockledger_vendors::VendorId;

use crate::read_model::{InMemoryReadStore, ReadStore};

/// One page of a vendor's ledger, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerPage {
    pub vendor_id: VendorId,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug)]
pub struct LedgerEntriesProjection<S = InMemoryReadStore<VendorId, Vec<LedgerEntry>>>
where
    S: ReadStore<VendorId, Vec<LedgerEntry>>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for LedgerEntriesProjection {
    fn default() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> LedgerEntriesProjection<S>
where
    S: ReadStore<VendorId, Vec<LedgerEntry>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Entries in chronological `(transaction_date, created_at)` order.
    pub fn entries(&self, vendor_id: &VendorId) -> Vec<LedgerEntry> {
        let mut entries = self.store.get(vendor_id).unwrap_or_default();
        entries.sort_by_key(sort_key);
        entries
    }

    pub fn page(&self, vendor_id: VendorId, limit: usize, offset: usize) -> LedgerPage {
        let mut entries = self.entries(&vendor_id);
        entries.reverse();
        let total = entries.len();
        let entries = entries.into_iter().skip(offset).take(limit).collect();
        LedgerPage {
            vendor_id,
            total,
            limit,
            offset,
            entries,
        }
    }

    fn modify(&self, vendor_id: VendorId, mut f: impl FnMut(&mut Vec<LedgerEntry>)) {
        self.store.update(vendor_id, &mut |current: Option<Vec<LedgerEntry>>| {
            let mut entries = current.unwrap_or_default();
            f(&mut entries);
            entries
        });
    }
}

impl<S> Projection for LedgerEntriesProjection<S>
where
    S: ReadStore<VendorId, Vec<LedgerEntry>>,
{
    fn name(&self) -> &'static str {
        "ledger.entries"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != VendorLedger::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Duplicate {
            return Ok(());
        }

        match decode::<LedgerEvent>(envelope)? {
            LedgerEvent::EntryPosted(e) => {
                self.modify(e.entry.vendor_id, |entries| entries.push(e.entry.clone()));
            }
            LedgerEvent::HistoricalEntriesImported(e) => {
                self.modify(e.vendor_id, |entries| entries.extend(e.entries.iter().cloned()));
            }
            LedgerEvent::DuplicatesRemoved(e) => {
                self.modify(e.vendor_id, |entries| {
                    entries.retain(|entry| !e.removed.iter().any(|r| r.id == entry.id));
                });
            }
            LedgerEvent::RunningBalancesRecomputed(e) => {
                self.modify(e.vendor_id, |entries| {
                    for correction in &e.corrections {
                        if let Some(entry) = entries.iter_mut().find(|x| x.id == correction.entry_id) {
                            entry.running_balance = correction.corrected;
                        }
                    }
                });
            }
        }

        self.cursors.advance(envelope)
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
