//! Vendor accounts projection (the balance projector).
//!
//! Owns the denormalized financial snapshot of every vendor: balance, totals,
//! counts and last activity dates. Identity fields come from the vendor
//! stream; every figure comes from the vendor's ledger stream. Recorders
//! never write here.
//!
//! Invariant once settled: `balance == total_purchases - total_payments - total_returns`.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{AggregateRoot, Money};
use stockledger_events::{CursorCheck, EventEnvelope, Projection, ProjectionError, StreamCursors, decode};
use stockledger_ledger::{EntryType, LedgerEntry, LedgerEntryId, LedgerEvent, VendorLedger};
use stockledger_vendors::{Vendor, VendorEvent, VendorId};

use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorAccount {
    pub vendor_id: VendorId,
    /// `None` for vendors only known from imported ledger rows.
    pub name: Option<String>,
    pub active: bool,
    pub balance: Money,
    pub total_purchases: Money,
    pub total_payments: Money,
    pub total_returns: Money,
    pub purchase_count: i64,
    pub payment_count: i64,
    pub return_count: i64,
    pub last_purchase_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
}

impl VendorAccount {
    pub fn new(vendor_id: VendorId) -> Self {
        Self {
            vendor_id,
            name: None,
            active: true,
            balance: Money::ZERO,
            total_purchases: Money::ZERO,
            total_payments: Money::ZERO,
            total_returns: Money::ZERO,
            purchase_count: 0,
            payment_count: 0,
            return_count: 0,
            last_purchase_date: None,
            last_payment_date: None,
        }
    }

    /// Fold one ledger entry into the rollup. Reversals move the figures but
    /// never count as activity.
    pub fn project(&mut self, entry: &LedgerEntry) {
        self.add(entry, 1);
        if !entry.is_reversal() {
            self.touch(entry);
        }
    }

    fn touch(&mut self, entry: &LedgerEntry) {
        match entry.entry_type {
            EntryType::Purchase => {
                self.last_purchase_date = self.last_purchase_date.max(Some(entry.transaction_date));
            }
            EntryType::Payment => {
                self.last_payment_date = self.last_payment_date.max(Some(entry.transaction_date));
            }
            EntryType::PurchaseReturn => {}
        }
    }

    /// Undo the figures of an entry that left the ledger (deduplication).
    /// Last activity dates are left alone; `reconcile` recomputes them.
    pub fn unproject(&mut self, entry: &LedgerEntry) {
        self.add(entry, -1);
    }

    fn add(&mut self, entry: &LedgerEntry, sign: i64) {
        let signed = Money::from(sign);
        let count = if entry.is_reversal() { -sign } else { sign };

        self.balance += signed * entry.net();
        match entry.entry_type {
            EntryType::Purchase => {
                self.total_purchases += signed * (entry.debit - entry.credit);
                self.purchase_count += count;
            }
            EntryType::Payment => {
                self.total_payments += signed * (entry.credit - entry.debit);
                self.payment_count += count;
            }
            EntryType::PurchaseReturn => {
                self.total_returns += signed * (entry.credit - entry.debit);
                self.return_count += count;
            }
        }
    }

    /// Rebuild every figure from the given entries (identity is kept).
    /// Last activity dates only consider entries that still stand: neither
    /// reversals nor reversed.
    pub fn replay(&mut self, entries: &[LedgerEntry]) {
        let reversed: HashSet<LedgerEntryId> = entries.iter().filter_map(|e| e.reversal_of).collect();
        let mut fresh = VendorAccount::new(self.vendor_id);
        fresh.name = self.name.take();
        fresh.active = self.active;
        for entry in entries {
            fresh.add(entry, 1);
            if !entry.is_reversal() && !reversed.contains(&entry.id) {
                fresh.touch(entry);
            }
        }
        *self = fresh;
    }

    pub fn rollup_consistent(&self) -> bool {
        self.balance == self.total_purchases - self.total_payments - self.total_returns
    }
}

#[derive(Debug)]
pub struct VendorAccountsProjection<S = InMemoryReadStore<VendorId, VendorAccount>>
where
    S: ReadStore<VendorId, VendorAccount>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for VendorAccountsProjection {
    fn default() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> VendorAccountsProjection<S>
where
    S: ReadStore<VendorId, VendorAccount>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, vendor_id: &VendorId) -> Option<VendorAccount> {
        self.store.get(vendor_id)
    }

    pub fn list(&self) -> Vec<VendorAccount> {
        let mut all = self.store.list();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.vendor_id.cmp(&b.vendor_id)));
        all
    }

    /// Apply one ledger entry's effect to its vendor (single locked update path).
    pub fn project(&self, entry: &LedgerEntry) -> Option<VendorAccount> {
        self.modify(entry.vendor_id, |account| account.project(entry))
    }

    /// Reset the vendor's figures from a full replay of `entries`. Idempotent.
    pub fn reconcile(&self, vendor_id: VendorId, entries: &[LedgerEntry]) -> Option<VendorAccount> {
        self.modify(vendor_id, |account| account.replay(entries))
    }

    fn modify(&self, vendor_id: VendorId, mut f: impl FnMut(&mut VendorAccount)) -> Option<VendorAccount> {
        self.store.update(vendor_id, &mut |current: Option<VendorAccount>| {
            let mut account = current.unwrap_or_else(|| VendorAccount::new(vendor_id));
            f(&mut account);
            account
        })
    }

    fn apply_vendor_event(&self, event: VendorEvent) {
        match event {
            VendorEvent::VendorRegistered(e) => {
                self.modify(e.vendor_id, |account| {
                    account.name = Some(e.name.clone());
                    account.active = true;
                });
            }
            VendorEvent::VendorDeactivated(e) => {
                self.modify(e.vendor_id, |account| account.active = false);
            }
        }
    }

    fn apply_ledger_event(&self, event: LedgerEvent) {
        match event {
            LedgerEvent::EntryPosted(e) => {
                self.project(&e.entry);
            }
            LedgerEvent::HistoricalEntriesImported(e) => {
                self.modify(e.vendor_id, |account| {
                    for entry in &e.entries {
                        account.project(entry);
                    }
                });
            }
            LedgerEvent::DuplicatesRemoved(e) => {
                self.modify(e.vendor_id, |account| {
                    for entry in &e.removed {
                        account.unproject(entry);
                    }
                });
            }
            // Rewritten running balances do not change any total.
            LedgerEvent::RunningBalancesRecomputed(_) => {}
        }
    }
}

impl<S> Projection for VendorAccountsProjection<S>
where
    S: ReadStore<VendorId, VendorAccount>,
{
    fn name(&self) -> &'static str {
        "vendors.accounts"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_type = envelope.aggregate_type();
        if aggregate_type != Vendor::AGGREGATE_TYPE && aggregate_type != VendorLedger::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Duplicate {
            return Ok(());
        }

        if aggregate_type == Vendor::AGGREGATE_TYPE {
            self.apply_vendor_event(decode(envelope)?);
        } else {
            self.apply_ledger_event(decode(envelope)?);
        }

        self.cursors.advance(envelope)
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
