//! Ledger reconciliation, legacy backfill and read-only verification.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use stockledger_auth::{Permission, Principal, authorize};
use stockledger_core::{DomainError, Money, UserId};
use stockledger_events::ProjectionError;
use stockledger_ledger::chronology;
use stockledger_ledger::{
    ChainViolation, EntryType, ImportHistoricalEntries, LedgerCommand, LedgerEntry, LedgerEntryId, LedgerEvent,
    RecomputeRunningBalances, RemoveDuplicates, VendorLedger,
};
use stockledger_vendors::{Vendor, VendorId};

use super::{ServiceError, StockLedger, now};
use crate::projections::VendorAccount;

/// One row of a legacy ledger export.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyLedgerRow {
    pub id: LedgerEntryId,
    pub entry_type: EntryType,
    pub reference_id: Uuid,
    #[serde(default)]
    pub reference_no: Option<String>,
    #[serde(default)]
    pub debit: Money,
    #[serde(default)]
    pub credit: Money,
    /// Trusted as-is; reconciliation rewrites it if the chain disagrees.
    #[serde(default)]
    pub running_balance: Money,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub performed_by: Option<UserId>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl LegacyLedgerRow {
    fn into_entry(self, vendor_id: VendorId) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            vendor_id,
            entry_type: self.entry_type,
            reference_id: self.reference_id,
            reference_no: self.reference_no,
            debit: self.debit,
            credit: self.credit,
            running_balance: self.running_balance,
            description: self.description,
            performed_by: self.performed_by,
            transaction_date: self.transaction_date,
            created_at: self.created_at,
            reversal_of: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub vendor_id: VendorId,
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub vendor_id: VendorId,
    pub duplicates_removed: usize,
    pub balances_corrected: usize,
    pub account: VendorAccount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum VendorViolation {
    LedgerChain { violation: ChainViolation },
    ProjectedBalanceMismatch { projected: Money, ledger: Money },
    RollupMismatch {
        balance: Money,
        total_purchases: Money,
        total_payments: Money,
        total_returns: Money,
    },
    MissingAccount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub vendor_id: VendorId,
    pub consistent: bool,
    pub entries: usize,
    pub violations: Vec<VendorViolation>,
}

impl StockLedger {
    /// Remove duplicate entries, recompute running balances and reset the
    /// vendor's rollup from the result. Running it twice changes nothing.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn reconcile_vendor(&self, vendor_id: VendorId, actor: &Principal) -> Result<ReconciliationReport, ServiceError> {
        authorize(actor, &Permission::LEDGER_RECONCILE)?;

        let (duplicates_removed, balances_corrected) = self.write(|uow| {
            let vendor = uow.load(Vendor::empty(vendor_id))?;
            let mut ledger = uow.load(VendorLedger::empty(vendor_id))?;
            if !vendor.exists() && ledger.entries().is_empty() {
                return Err(DomainError::not_found(format!("vendor {vendor_id}")).into());
            }

            let at = now();
            let removed = uow
                .execute(&mut ledger, LedgerCommand::RemoveDuplicates(RemoveDuplicates { vendor_id, occurred_at: at }))?
                .iter()
                .map(|e| match e {
                    LedgerEvent::DuplicatesRemoved(d) => d.removed.len(),
                    _ => 0,
                })
                .sum::<usize>();
            let corrected = uow
                .execute(
                    &mut ledger,
                    LedgerCommand::RecomputeRunningBalances(RecomputeRunningBalances { vendor_id, occurred_at: at }),
                )?
                .iter()
                .map(|e| match e {
                    LedgerEvent::RunningBalancesRecomputed(r) => r.corrections.len(),
                    _ => 0,
                })
                .sum::<usize>();
            Ok((removed, corrected))
        })?;

        let account = self.reset_account(vendor_id)?;
        info!(
            %vendor_id,
            duplicates_removed,
            balances_corrected,
            balance = %account.balance,
            "vendor ledger reconciled"
        );
        Ok(ReconciliationReport {
            vendor_id,
            duplicates_removed,
            balances_corrected,
            account,
        })
    }

    /// Backfill legacy ledger rows. Rows whose id is already on the ledger are
    /// skipped, so re-running an import is harmless.
    #[instrument(skip(self, rows, actor), fields(actor = %actor.user_id, rows = rows.len()), err)]
    pub fn import_legacy_ledger(
        &self,
        vendor_id: VendorId,
        rows: Vec<LegacyLedgerRow>,
        actor: &Principal,
    ) -> Result<ImportReport, ServiceError> {
        authorize(actor, &Permission::LEDGER_RECONCILE)?;
        let total = rows.len();
        let entries: Vec<LedgerEntry> = rows.into_iter().map(|r| r.into_entry(vendor_id)).collect();

        let imported = self.write(|uow| {
            let mut ledger = uow.load(VendorLedger::empty(vendor_id))?;
            let events = uow.execute(
                &mut ledger,
                LedgerCommand::ImportHistoricalEntries(ImportHistoricalEntries {
                    vendor_id,
                    entries: entries.clone(),
                    occurred_at: now(),
                }),
            )?;
            Ok(events
                .iter()
                .map(|e| match e {
                    LedgerEvent::HistoricalEntriesImported(i) => i.entries.len(),
                    _ => 0,
                })
                .sum::<usize>())
        })?;

        info!(%vendor_id, imported, skipped = total - imported, "legacy ledger imported");
        Ok(ImportReport {
            vendor_id,
            imported,
            skipped: total - imported,
        })
    }

    /// Check the ledger chain and the projected rollup without changing anything.
    #[instrument(skip(self))]
    pub fn verify_vendor(&self, vendor_id: VendorId) -> Result<VerificationReport, ServiceError> {
        let ledger = self.dispatcher.load(VendorLedger::empty(vendor_id))?;
        let account = self.read_models.vendor_accounts.get(&vendor_id);
        if account.is_none() && ledger.entries().is_empty() {
            return Err(DomainError::not_found(format!("vendor {vendor_id}")).into());
        }

        let mut violations: Vec<VendorViolation> = chronology::verify(ledger.entries())
            .into_iter()
            .map(|violation| VendorViolation::LedgerChain { violation })
            .collect();

        let ledger_total = ledger.balance();
        match account {
            Some(account) => {
                if account.balance != ledger_total {
                    violations.push(VendorViolation::ProjectedBalanceMismatch {
                        projected: account.balance,
                        ledger: ledger_total,
                    });
                }
                if !account.rollup_consistent() {
                    violations.push(VendorViolation::RollupMismatch {
                        balance: account.balance,
                        total_purchases: account.total_purchases,
                        total_payments: account.total_payments,
                        total_returns: account.total_returns,
                    });
                }
            }
            None => violations.push(VendorViolation::MissingAccount),
        }

        if !violations.is_empty() {
            warn!(%vendor_id, violations = violations.len(), "vendor ledger is inconsistent");
        }
        Ok(VerificationReport {
            vendor_id,
            consistent: violations.is_empty(),
            entries: ledger.entries().len(),
            violations,
        })
    }

    /// Recompute the vendor's rollup from the projected ledger entries.
    fn reset_account(&self, vendor_id: VendorId) -> Result<VendorAccount, ServiceError> {
        let _feed = self.feed.lock().map_err(|_| ProjectionError::Poisoned)?;
        let entries = self.read_models.ledger_entries.entries(&vendor_id);
        self.read_models
            .vendor_accounts
            .reconcile(vendor_id, &entries)
            .ok_or_else(|| DomainError::not_found(format!("vendor {vendor_id}")).into())
    }
}
