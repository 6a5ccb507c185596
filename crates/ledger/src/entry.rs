use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{Money, UserId, aggregate_id};
use stockledger_vendors::VendorId;

aggregate_id!(
    /// Ledger entry identifier.
    LedgerEntryId
);

/// Which side of the ledger an amount sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Purchase,
    Payment,
    PurchaseReturn,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Purchase => "purchase",
            EntryType::Payment => "payment",
            EntryType::PurchaseReturn => "purchase_return",
        }
    }

    /// Purchases increase what we owe (debit); payments and returns reduce it.
    pub fn normal_side(&self) -> Side {
        match self {
            EntryType::Purchase => Side::Debit,
            EntryType::Payment | EntryType::PurchaseReturn => Side::Credit,
        }
    }
}

impl core::fmt::Display for EntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable row of a vendor's ledger.
///
/// Positive balances mean the business owes the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub vendor_id: VendorId,
    pub entry_type: EntryType,
    /// Originating record: purchase, payment or inventory transaction id.
    pub reference_id: Uuid,
    pub reference_no: Option<String>,
    pub debit: Money,
    pub credit: Money,
    pub running_balance: Money,
    pub description: Option<String>,
    pub performed_by: Option<UserId>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Set on reversal entries: the entry being reversed.
    pub reversal_of: Option<LedgerEntryId>,
}

impl LedgerEntry {
    /// Signed effect on the vendor balance.
    pub fn net(&self) -> Money {
        self.debit - self.credit
    }

    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }

    /// `(reference_id, entry_type, reversal?)`: at most one entry per key.
    pub fn dedupe_key(&self) -> (Uuid, EntryType, bool) {
        (self.reference_id, self.entry_type, self.is_reversal())
    }

    /// The side the amount sits on, or `None` if the entry is malformed
    /// (both sides zero or both non-zero).
    pub fn side(&self) -> Option<Side> {
        let zero = Money::ZERO;
        if self.debit > zero && self.credit == zero {
            Some(Side::Debit)
        } else if self.credit > zero && self.debit == zero {
            Some(Side::Credit)
        } else {
            None
        }
    }

    /// Side this entry is expected on given its type and reversal flag.
    pub fn expected_side(&self) -> Side {
        match (self.entry_type.normal_side(), self.is_reversal()) {
            (side, false) => side,
            (Side::Debit, true) => Side::Credit,
            (Side::Credit, true) => Side::Debit,
        }
    }
}
