//! Pure helpers over a vendor's ledger entries.
//!
//! Chronological order is `(transaction_date, created_at)`, ties broken by
//! insertion position (stable sort). Everything here is deterministic and
//! side-effect free so the aggregate, the reconciliation service and the
//! read-only verifier agree on what "consistent" means.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::Money;

use crate::entry::{EntryType, LedgerEntry, LedgerEntryId};

/// A running balance that needs rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCorrection {
    pub entry_id: LedgerEntryId,
    pub previous: Money,
    pub corrected: Money,
}

/// A broken ledger invariant, as reported by [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ChainViolation {
    RunningBalanceMismatch {
        entry_id: LedgerEntryId,
        expected: Money,
        actual: Money,
    },
    DuplicateReference {
        reference_id: Uuid,
        entry_type: EntryType,
        count: usize,
    },
    WrongSide {
        entry_id: LedgerEntryId,
    },
}

pub fn sort_key(entry: &LedgerEntry) -> (NaiveDate, DateTime<Utc>) {
    (entry.transaction_date, entry.created_at)
}

/// Indices of `entries` in chronological order.
pub fn chronological_order(entries: &[LedgerEntry]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| sort_key(&entries[i]));
    order
}

/// Replay the chain from zero and list every entry whose stored running
/// balance differs from the replayed one. Empty means the chain is consistent.
pub fn recompute(entries: &[LedgerEntry]) -> Vec<BalanceCorrection> {
    let mut running = Money::ZERO;
    let mut corrections = Vec::new();
    for i in chronological_order(entries) {
        let entry = &entries[i];
        running += entry.net();
        if entry.running_balance != running {
            corrections.push(BalanceCorrection {
                entry_id: entry.id,
                previous: entry.running_balance,
                corrected: running,
            });
        }
    }
    corrections
}

/// Ids of duplicate entries to remove.
///
/// Entries sharing `(reference_id, entry_type, reversal?)` are duplicates; the
/// earliest by `created_at` (then by position) is kept.
pub fn duplicates(entries: &[LedgerEntry]) -> Vec<LedgerEntryId> {
    let mut keeper: HashMap<(Uuid, EntryType, bool), usize> = HashMap::new();
    let mut removed = Vec::new();

    let mut by_creation: Vec<usize> = (0..entries.len()).collect();
    by_creation.sort_by_key(|&i| entries[i].created_at);

    for i in by_creation {
        let key = entries[i].dedupe_key();
        if keeper.contains_key(&key) {
            removed.push(entries[i].id);
        } else {
            keeper.insert(key, i);
        }
    }
    removed
}

/// Read-only check of the ledger invariants: single entry per reference,
/// correct debit/credit side, consistent running balance chain.
pub fn verify(entries: &[LedgerEntry]) -> Vec<ChainViolation> {
    let mut violations = Vec::new();

    let mut counts: HashMap<(Uuid, EntryType, bool), usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.dedupe_key()).or_default() += 1;
    }
    let mut dupes: Vec<_> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    dupes.sort_by_key(|((reference_id, entry_type, _), _)| (*reference_id, *entry_type));
    for ((reference_id, entry_type, _), count) in dupes {
        violations.push(ChainViolation::DuplicateReference {
            reference_id,
            entry_type,
            count,
        });
    }

    for entry in entries {
        if entry.side() != Some(entry.expected_side()) {
            violations.push(ChainViolation::WrongSide { entry_id: entry.id });
        }
    }

    for c in recompute(entries) {
        violations.push(ChainViolation::RunningBalanceMismatch {
            entry_id: c.entry_id,
            expected: c.corrected,
            actual: c.previous,
        });
    }

    violations
}
