use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{Aggregate, AggregateRoot, DomainError, Money, UserId};
use stockledger_core::money::normalize;
use stockledger_events::Event;
use stockledger_vendors::VendorId;

use crate::chronology::{self, BalanceCorrection};
use crate::entry::{EntryType, LedgerEntry, LedgerEntryId, Side};

/// Aggregate root: VendorLedger (one stream per vendor).
///
/// This is the serialization point for a vendor: every write that touches the
/// vendor's money goes through this stream, so optimistic versioning on it
/// gives single-writer-per-vendor semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorLedger {
    id: VendorId,
    /// Insertion order.
    entries: Vec<LedgerEntry>,
    balance: Money,
    version: u64,
}

impl VendorLedger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: VendorId) -> Self {
        Self {
            id,
            entries: Vec::new(),
            balance: Money::ZERO,
            version: 0,
        }
    }

    /// Current balance (Σ debit − Σ credit). Positive means we owe the vendor.
    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// The non-reversal entry posted for `(reference_id, entry_type)`, if any.
    pub fn find(&self, reference_id: Uuid, entry_type: EntryType) -> Option<&LedgerEntry> {
        self.entries
            .iter()
            .find(|e| e.reference_id == reference_id && e.entry_type == entry_type && !e.is_reversal())
    }

    pub fn is_reversed(&self, entry_id: LedgerEntryId) -> bool {
        self.entries.iter().any(|e| e.reversal_of == Some(entry_id))
    }

    fn contains(&self, entry_id: LedgerEntryId) -> bool {
        self.entries.iter().any(|e| e.id == entry_id)
    }
}

impl AggregateRoot for VendorLedger {
    type Id = VendorId;
    const AGGREGATE_TYPE: &'static str = "ledger.vendor";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PostEntry (the single append path for new ledger rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    pub entry_id: LedgerEntryId,
    pub vendor_id: VendorId,
    pub entry_type: EntryType,
    pub reference_id: Uuid,
    pub reference_no: Option<String>,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
    pub performed_by: Option<UserId>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Command: ReverseEntry (mirror an existing entry on the opposite side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseEntry {
    pub entry_id: LedgerEntryId,
    pub vendor_id: VendorId,
    pub reference_id: Uuid,
    pub entry_type: EntryType,
    pub description: Option<String>,
    pub performed_by: Option<UserId>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Command: ImportHistoricalEntries (legacy backfill, rows kept as they were).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportHistoricalEntries {
    pub vendor_id: VendorId,
    pub entries: Vec<LedgerEntry>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveDuplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDuplicates {
    pub vendor_id: VendorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecomputeRunningBalances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeRunningBalances {
    pub vendor_id: VendorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    PostEntry(PostEntry),
    ReverseEntry(ReverseEntry),
    ImportHistoricalEntries(ImportHistoricalEntries),
    RemoveDuplicates(RemoveDuplicates),
    RecomputeRunningBalances(RecomputeRunningBalances),
}

/// Event: EntryPosted (new entry or reversal; see `entry.reversal_of`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalEntriesImported {
    pub vendor_id: VendorId,
    pub entries: Vec<LedgerEntry>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DuplicatesRemoved. Carries the removed rows so read models can
/// subtract their effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatesRemoved {
    pub vendor_id: VendorId,
    pub removed: Vec<LedgerEntry>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalancesRecomputed {
    pub vendor_id: VendorId,
    pub corrections: Vec<BalanceCorrection>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    EntryPosted(EntryPosted),
    HistoricalEntriesImported(HistoricalEntriesImported),
    DuplicatesRemoved(DuplicatesRemoved),
    RunningBalancesRecomputed(RunningBalancesRecomputed),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::EntryPosted(_) => "ledger.entry.posted",
            LedgerEvent::HistoricalEntriesImported(_) => "ledger.entries.imported",
            LedgerEvent::DuplicatesRemoved(_) => "ledger.duplicates.removed",
            LedgerEvent::RunningBalancesRecomputed(_) => "ledger.running_balances.recomputed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::EntryPosted(e) => e.entry.created_at,
            LedgerEvent::HistoricalEntriesImported(e) => e.occurred_at,
            LedgerEvent::DuplicatesRemoved(e) => e.occurred_at,
            LedgerEvent::RunningBalancesRecomputed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for VendorLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::EntryPosted(e) => {
                self.balance += e.entry.net();
                self.entries.push(e.entry.clone());
            }
            LedgerEvent::HistoricalEntriesImported(e) => {
                for entry in &e.entries {
                    self.balance += entry.net();
                    self.entries.push(entry.clone());
                }
            }
            LedgerEvent::DuplicatesRemoved(e) => {
                let removed: HashSet<LedgerEntryId> = e.removed.iter().map(|r| r.id).collect();
                for entry in self.entries.iter().filter(|x| removed.contains(&x.id)) {
                    self.balance -= entry.net();
                }
                self.entries.retain(|x| !removed.contains(&x.id));
            }
            LedgerEvent::RunningBalancesRecomputed(e) => {
                for c in &e.corrections {
                    if let Some(entry) = self.entries.iter_mut().find(|x| x.id == c.entry_id) {
                        entry.running_balance = c.corrected;
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::PostEntry(cmd) => self.handle_post(cmd),
            LedgerCommand::ReverseEntry(cmd) => self.handle_reverse(cmd),
            LedgerCommand::ImportHistoricalEntries(cmd) => self.handle_import(cmd),
            LedgerCommand::RemoveDuplicates(cmd) => self.handle_remove_duplicates(cmd),
            LedgerCommand::RecomputeRunningBalances(cmd) => self.handle_recompute(cmd),
        }
    }
}

impl VendorLedger {
    fn ensure_vendor(&self, vendor_id: VendorId) -> Result<(), DomainError> {
        if self.id != vendor_id {
            return Err(DomainError::invariant("vendor_id mismatch"));
        }
        Ok(())
    }

    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_vendor(cmd.vendor_id)?;

        let mut entry = LedgerEntry {
            id: cmd.entry_id,
            vendor_id: cmd.vendor_id,
            entry_type: cmd.entry_type,
            reference_id: cmd.reference_id,
            reference_no: cmd.reference_no.clone(),
            debit: normalize(cmd.debit),
            credit: normalize(cmd.credit),
            running_balance: Money::ZERO,
            description: cmd.description.clone(),
            performed_by: cmd.performed_by,
            transaction_date: cmd.transaction_date,
            created_at: cmd.created_at,
            reversal_of: None,
        };

        match entry.side() {
            None => {
                return Err(DomainError::validation(
                    "exactly one of debit or credit must be a positive amount",
                ));
            }
            Some(side) if side != entry.entry_type.normal_side() => {
                let expected = match entry.entry_type.normal_side() {
                    Side::Debit => "debit",
                    Side::Credit => "credit",
                };
                return Err(DomainError::validation(format!(
                    "{} entries must be posted as a {expected}",
                    entry.entry_type
                )));
            }
            Some(_) => {}
        }

        if self.find(cmd.reference_id, cmd.entry_type).is_some() {
            return Err(DomainError::conflict(format!(
                "duplicate ledger entry for {} {}",
                cmd.entry_type, cmd.reference_id
            )));
        }
        if self.contains(cmd.entry_id) {
            return Err(DomainError::conflict(format!(
                "ledger entry {} already exists",
                cmd.entry_id
            )));
        }

        entry.running_balance = self.balance + entry.net();
        Ok(self.append(entry))
    }

    fn handle_reverse(&self, cmd: &ReverseEntry) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_vendor(cmd.vendor_id)?;

        let original = self.find(cmd.reference_id, cmd.entry_type).ok_or_else(|| {
            DomainError::not_found(format!(
                "no {} ledger entry for {}",
                cmd.entry_type, cmd.reference_id
            ))
        })?;
        if self.is_reversed(original.id) {
            return Err(DomainError::conflict(format!(
                "ledger entry {} is already reversed",
                original.id
            )));
        }

        let debit = original.credit;
        let credit = original.debit;
        let entry = LedgerEntry {
            id: cmd.entry_id,
            vendor_id: cmd.vendor_id,
            entry_type: original.entry_type,
            reference_id: original.reference_id,
            reference_no: original.reference_no.clone(),
            debit,
            credit,
            running_balance: self.balance + debit - credit,
            description: cmd.description.clone(),
            performed_by: cmd.performed_by,
            transaction_date: cmd.transaction_date,
            created_at: cmd.created_at,
            reversal_of: Some(original.id),
        };
        Ok(self.append(entry))
    }

    /// Events for appending `entry`. An entry dated before the ledger's
    /// latest one lands mid-chain: its own running balance is taken from the
    /// chronological replay, and every later entry gets a correction.
    fn append(&self, mut entry: LedgerEntry) -> Vec<LedgerEvent> {
        let key = chronology::sort_key(&entry);
        if !self.entries.iter().any(|e| chronology::sort_key(e) > key) {
            return vec![LedgerEvent::EntryPosted(EntryPosted { entry })];
        }

        let mut chain = self.entries.clone();
        chain.push(entry.clone());
        let later: HashSet<LedgerEntryId> = self
            .entries
            .iter()
            .filter(|e| chronology::sort_key(e) > key)
            .map(|e| e.id)
            .collect();

        let mut corrections = Vec::new();
        for c in chronology::recompute(&chain) {
            if c.entry_id == entry.id {
                entry.running_balance = c.corrected;
            } else if later.contains(&c.entry_id) {
                corrections.push(c);
            }
        }

        let occurred_at = entry.created_at;
        let vendor_id = entry.vendor_id;
        let mut events = vec![LedgerEvent::EntryPosted(EntryPosted { entry })];
        if !corrections.is_empty() {
            events.push(LedgerEvent::RunningBalancesRecomputed(RunningBalancesRecomputed {
                vendor_id,
                corrections,
                occurred_at,
            }));
        }
        events
    }

    fn handle_import(&self, cmd: &ImportHistoricalEntries) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_vendor(cmd.vendor_id)?;

        let mut seen: HashSet<LedgerEntryId> = self.entries.iter().map(|e| e.id).collect();
        let mut fresh = Vec::new();
        for entry in &cmd.entries {
            if entry.vendor_id != cmd.vendor_id {
                return Err(DomainError::validation(format!(
                    "legacy entry {} belongs to vendor {}",
                    entry.id, entry.vendor_id
                )));
            }
            if entry.debit < Money::ZERO || entry.credit < Money::ZERO {
                return Err(DomainError::validation(format!(
                    "legacy entry {} has a negative amount",
                    entry.id
                )));
            }
            // Re-running a backfill must not double the ledger.
            if seen.insert(entry.id) {
                fresh.push(entry.clone());
            }
        }

        if fresh.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![LedgerEvent::HistoricalEntriesImported(
            HistoricalEntriesImported {
                vendor_id: cmd.vendor_id,
                entries: fresh,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_remove_duplicates(
        &self,
        cmd: &RemoveDuplicates,
    ) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_vendor(cmd.vendor_id)?;

        let ids: HashSet<LedgerEntryId> = chronology::duplicates(&self.entries).into_iter().collect();
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let removed = self
            .entries
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect();
        Ok(vec![LedgerEvent::DuplicatesRemoved(DuplicatesRemoved {
            vendor_id: cmd.vendor_id,
            removed,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_recompute(
        &self,
        cmd: &RecomputeRunningBalances,
    ) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_vendor(cmd.vendor_id)?;

        let corrections = chronology::recompute(&self.entries);
        if corrections.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![LedgerEvent::RunningBalancesRecomputed(
            RunningBalancesRecomputed {
                vendor_id: cmd.vendor_id,
                corrections,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn post(
        vendor_id: VendorId,
        entry_type: EntryType,
        reference_id: Uuid,
        debit: Money,
        credit: Money,
        date: NaiveDate,
    ) -> LedgerCommand {
        LedgerCommand::PostEntry(PostEntry {
            entry_id: LedgerEntryId::generate(),
            vendor_id,
            entry_type,
            reference_id,
            reference_no: None,
            debit,
            credit,
            description: None,
            performed_by: None,
            transaction_date: date,
            created_at: Utc::now(),
        })
    }

    fn run(ledger: &mut VendorLedger, cmd: LedgerCommand) -> Result<Vec<LedgerEvent>, DomainError> {
        let events = ledger.handle(&cmd)?;
        for e in &events {
            ledger.apply(e);
        }
        Ok(events)
    }

    #[test]
    fn purchase_then_payment_tracks_running_balance() {
        let v = VendorId::generate();
        let mut ledger = VendorLedger::empty(v);

        run(&mut ledger, post(v, EntryType::Purchase, Uuid::now_v7(), dec!(1000), dec!(0), day(1))).unwrap();
        run(&mut ledger, post(v, EntryType::Payment, Uuid::now_v7(), dec!(0), dec!(400), day(2))).unwrap();

        assert_eq!(ledger.balance(), dec!(600));
        assert_eq!(ledger.entries()[0].running_balance, dec!(1000));
        assert_eq!(ledger.entries()[1].running_balance, dec!(600));
        assert_eq!(ledger.version(), 2);
    }

    #[test]
    fn backdated_entry_rewrites_the_later_running_balances() {
        let v = VendorId::generate();
        let mut ledger = VendorLedger::empty(v);
        run(&mut ledger, post(v, EntryType::Purchase, Uuid::now_v7(), dec!(1000), dec!(0), day(10))).unwrap();
        run(&mut ledger, post(v, EntryType::Payment, Uuid::now_v7(), dec!(0), dec!(300), day(12))).unwrap();

        let events = run(&mut ledger, post(v, EntryType::Payment, Uuid::now_v7(), dec!(0), dec!(200), day(1)))
            .unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            LedgerEvent::RunningBalancesRecomputed(e) => assert_eq!(e.corrections.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(ledger.entries()[2].running_balance, dec!(-200));
        assert_eq!(ledger.entries()[0].running_balance, dec!(800));
        assert_eq!(ledger.entries()[1].running_balance, dec!(500));
        assert_eq!(ledger.balance(), dec!(500));
        assert!(chronology::verify(ledger.entries()).is_empty());
    }

    #[test]
    fn same_day_entry_is_appended_without_corrections() {
        let v = VendorId::generate();
        let mut ledger = VendorLedger::empty(v);
        run(&mut ledger, post(v, EntryType::Purchase, Uuid::now_v7(), dec!(100), dec!(0), day(5))).unwrap();

        let events = run(&mut ledger, post(v, EntryType::Payment, Uuid::now_v7(), dec!(0), dec!(40), day(5)))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(ledger.entries()[1].running_balance, dec!(60));
    }

    #[test]
    fn overpayment_produces_an_advance_balance() {
        let v = VendorId::generate();
        let mut ledger = VendorLedger::empty(v);
        run(&mut ledger, post(v, EntryType::Purchase, Uuid::now_v7(), dec!(600), dec!(0), day(1))).unwrap();
        run(&mut ledger, post(v, EntryType::Payment, Uuid::now_v7(), dec!(0), dec!(1000), day(1))).unwrap();
        assert_eq!(ledger.balance(), dec!(-400));
    }

    #[test]
    fn second_entry_for_the_same_reference_is_a_conflict() {
        let v = VendorId::generate();
        let purchase = Uuid::now_v7();
        let mut ledger = VendorLedger::empty(v);
        run(&mut ledger, post(v, EntryType::Purchase, purchase, dec!(10), dec!(0), day(1))).unwrap();

        let err = run(&mut ledger, post(v, EntryType::Purchase, purchase, dec!(10), dec!(0), day(1)))
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.message().contains("duplicate ledger entry"));
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn side_convention_is_enforced() {
        let v = VendorId::generate();
        let ledger = VendorLedger::empty(v);

        let err = ledger
            .handle(&post(v, EntryType::Payment, Uuid::now_v7(), dec!(50), dec!(0), day(1)))
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = ledger
            .handle(&post(v, EntryType::Purchase, Uuid::now_v7(), dec!(0), dec!(0), day(1)))
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = ledger
            .handle(&post(v, EntryType::Purchase, Uuid::now_v7(), dec!(5), dec!(5), day(1)))
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn reversal_mirrors_the_original_once() {
        let v = VendorId::generate();
        let purchase = Uuid::now_v7();
        let mut ledger = VendorLedger::empty(v);
        run(&mut ledger, post(v, EntryType::Purchase, purchase, dec!(250), dec!(0), day(1))).unwrap();

        let reverse = LedgerCommand::ReverseEntry(ReverseEntry {
            entry_id: LedgerEntryId::generate(),
            vendor_id: v,
            reference_id: purchase,
            entry_type: EntryType::Purchase,
            description: Some("purchase cancelled".into()),
            performed_by: None,
            transaction_date: day(2),
            created_at: Utc::now(),
        });
        run(&mut ledger, reverse.clone()).unwrap();

        let reversal = &ledger.entries()[1];
        assert_eq!(reversal.credit, dec!(250));
        assert_eq!(reversal.debit, dec!(0));
        assert_eq!(reversal.reversal_of, Some(ledger.entries()[0].id));
        assert_eq!(ledger.balance(), dec!(0));

        let err = ledger.handle(&reverse).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn reversing_an_unknown_reference_is_not_found() {
        let v = VendorId::generate();
        let ledger = VendorLedger::empty(v);
        let err = ledger
            .handle(&LedgerCommand::ReverseEntry(ReverseEntry {
                entry_id: LedgerEntryId::generate(),
                vendor_id: v,
                reference_id: Uuid::now_v7(),
                entry_type: EntryType::Payment,
                description: None,
                performed_by: None,
                transaction_date: day(1),
                created_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    fn legacy_row(v: VendorId, reference_id: Uuid, amount: Money, running: Money, offset: i64) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::generate(),
            vendor_id: v,
            entry_type: EntryType::Purchase,
            reference_id,
            reference_no: Some("PUR-OLD".into()),
            debit: amount,
            credit: Money::ZERO,
            running_balance: running,
            description: None,
            performed_by: None,
            transaction_date: day(1),
            created_at: Utc::now() + Duration::seconds(offset),
            reversal_of: None,
        }
    }

    #[test]
    fn import_keeps_duplicates_and_is_idempotent_by_entry_id() {
        let v = VendorId::generate();
        let purchase = Uuid::now_v7();
        let rows = vec![
            legacy_row(v, purchase, dec!(1000), dec!(1000), 0),
            legacy_row(v, purchase, dec!(1000), dec!(2000), 1),
        ];
        let cmd = LedgerCommand::ImportHistoricalEntries(ImportHistoricalEntries {
            vendor_id: v,
            entries: rows,
            occurred_at: Utc::now(),
        });

        let mut ledger = VendorLedger::empty(v);
        run(&mut ledger, cmd.clone()).unwrap();
        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(ledger.balance(), dec!(2000));

        assert!(run(&mut ledger, cmd).unwrap().is_empty());
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn remove_duplicates_then_recompute_repairs_the_chain() {
        let v = VendorId::generate();
        let purchase = Uuid::now_v7();
        let rows = vec![
            legacy_row(v, purchase, dec!(1000), dec!(1000), 0),
            legacy_row(v, purchase, dec!(1000), dec!(2000), 1),
        ];
        let mut ledger = VendorLedger::empty(v);
        run(
            &mut ledger,
            LedgerCommand::ImportHistoricalEntries(ImportHistoricalEntries {
                vendor_id: v,
                entries: rows.clone(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(&mut ledger, post(v, EntryType::Payment, Uuid::now_v7(), dec!(0), dec!(400), day(2))).unwrap();
        assert_eq!(ledger.entries()[2].running_balance, dec!(1600));

        let dedupe = LedgerCommand::RemoveDuplicates(RemoveDuplicates {
            vendor_id: v,
            occurred_at: Utc::now(),
        });
        let events = run(&mut ledger, dedupe.clone()).unwrap();
        match &events[0] {
            LedgerEvent::DuplicatesRemoved(e) => assert_eq!(e.removed[0].id, rows[1].id),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(ledger.balance(), dec!(600));

        let recompute = LedgerCommand::RecomputeRunningBalances(RecomputeRunningBalances {
            vendor_id: v,
            occurred_at: Utc::now(),
        });
        run(&mut ledger, recompute.clone()).unwrap();
        assert_eq!(ledger.entries()[1].running_balance, dec!(600));
        assert!(chronology::verify(ledger.entries()).is_empty());

        // Second pass is a no-op.
        assert!(run(&mut ledger, dedupe).unwrap().is_empty());
        assert!(run(&mut ledger, recompute).unwrap().is_empty());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let v = VendorId::generate();
        let ledger = VendorLedger::empty(v);
        let cmd = post(v, EntryType::Purchase, Uuid::now_v7(), dec!(1), dec!(0), day(1));
        let a = ledger.handle(&cmd).unwrap();
        let b = ledger.handle(&cmd).unwrap();
        assert_eq!(a, b);
        assert_eq!(ledger.version(), 0);
        assert!(ledger.entries().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of purchases and payments posted in date
        /// order, the running-balance chain replays cleanly and the final
        /// balance equals Σ debit − Σ credit.
        #[test]
        fn posted_chain_is_consistent(
            ops in prop::collection::vec((any::<bool>(), 1i64..1_000_000i64), 1..40)
        ) {
            let v = VendorId::generate();
            let mut ledger = VendorLedger::empty(v);
            let mut expected = Money::ZERO;

            for (i, (is_purchase, cents)) in ops.into_iter().enumerate() {
                let amount = Money::new(cents, 2);
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64);
                let cmd = if is_purchase {
                    expected += amount;
                    post(v, EntryType::Purchase, Uuid::now_v7(), amount, Money::ZERO, date)
                } else {
                    expected -= amount;
                    post(v, EntryType::Payment, Uuid::now_v7(), Money::ZERO, amount, date)
                };
                run(&mut ledger, cmd).unwrap();
            }

            prop_assert_eq!(ledger.balance(), expected);
            prop_assert!(chronology::verify(ledger.entries()).is_empty());
            let last = ledger.entries().last().unwrap();
            prop_assert_eq!(last.running_balance, expected);
        }

        /// Property: posting in any date order still leaves a chain that
        /// replays cleanly.
        #[test]
        fn out_of_order_posting_keeps_the_chain_consistent(
            ops in prop::collection::vec((any::<bool>(), 1i64..100_000i64, 0i64..60), 1..30)
        ) {
            let v = VendorId::generate();
            let mut ledger = VendorLedger::empty(v);

            for (is_purchase, cents, offset) in ops {
                let amount = Money::new(cents, 2);
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset);
                let cmd = if is_purchase {
                    post(v, EntryType::Purchase, Uuid::now_v7(), amount, Money::ZERO, date)
                } else {
                    post(v, EntryType::Payment, Uuid::now_v7(), Money::ZERO, amount, date)
                };
                run(&mut ledger, cmd).unwrap();
            }

            prop_assert!(chronology::verify(ledger.entries()).is_empty());
        }

        /// Property: recomputation is idempotent whatever the stored balances.
        #[test]
        fn recompute_is_idempotent(
            rows in prop::collection::vec((1i64..100_000i64, -50_000i64..50_000i64, 1u32..28), 1..20)
        ) {
            let v = VendorId::generate();
            let entries: Vec<LedgerEntry> = rows
                .into_iter()
                .enumerate()
                .map(|(i, (cents, garbage, d))| {
                    let mut e = legacy_row(v, Uuid::now_v7(), Money::new(cents, 2), Money::new(garbage, 2), i as i64);
                    e.transaction_date = day(d);
                    e
                })
                .collect();

            let mut ledger = VendorLedger::empty(v);
            run(&mut ledger, LedgerCommand::ImportHistoricalEntries(ImportHistoricalEntries {
                vendor_id: v,
                entries,
                occurred_at: Utc::now(),
            })).unwrap();

            let recompute = LedgerCommand::RecomputeRunningBalances(RecomputeRunningBalances {
                vendor_id: v,
                occurred_at: Utc::now(),
            });
            run(&mut ledger, recompute.clone()).unwrap();
            prop_assert!(chronology::recompute(ledger.entries()).is_empty());
            prop_assert!(run(&mut ledger, recompute).unwrap().is_empty());
        }
    }
}
