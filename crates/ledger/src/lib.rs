//! Vendor ledger domain module (append-only, event-sourced).
//!
//! One `VendorLedger` stream per vendor holds every financial event between
//! the business and that vendor. Each entry carries a running balance; the
//! pure helpers in [`chronology`] define what a consistent chain looks like.

pub mod chronology;
pub mod entry;
pub mod vendor_ledger;

pub use chronology::{BalanceCorrection, ChainViolation};
pub use entry::{EntryType, LedgerEntry, LedgerEntryId, Side};
pub use vendor_ledger::{
    DuplicatesRemoved, EntryPosted, HistoricalEntriesImported, ImportHistoricalEntries,
    LedgerCommand, LedgerEvent, PostEntry, RecomputeRunningBalances, RemoveDuplicates,
    ReverseEntry, RunningBalancesRecomputed, VendorLedger,
};
