//! Inventory transaction approval workflow (maker-checker).
//!
//! A transaction records an intended stock movement. It only touches stock
//! once approved; who may approve is decided by the caller, the aggregate
//! only enforces the state machine in [`TransactionStatus::next`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::money::ensure_non_negative;
use stockledger_core::{Aggregate, AggregateRoot, DomainError, Money, UserId, aggregate_id};
use stockledger_events::Event;
use stockledger_vendors::VendorId;

use crate::stock::{StockPool, VariantId};

aggregate_id!(InventoryTransactionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    PurchaseReturn,
    Damage,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::PurchaseReturn => "purchase_return",
            TransactionType::Damage => "damage",
            TransactionType::Adjustment => "adjustment",
        }
    }

    pub fn requires_vendor(&self) -> bool {
        matches!(self, TransactionType::Purchase | TransactionType::PurchaseReturn)
    }

    pub fn requires_reason(&self) -> bool {
        !matches!(self, TransactionType::Purchase)
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Voided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionAction {
    Approve,
    Reject,
    Void,
}

impl TransactionStatus {
    /// The transition table. Anything not listed here is rejected.
    pub fn next(self, action: TransactionAction) -> Option<TransactionStatus> {
        use TransactionAction::*;
        use TransactionStatus::*;
        match (self, action) {
            (Pending, Approve) => Some(Approved),
            (Pending, Reject) => Some(Rejected),
            (Approved, Void) => Some(Voided),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Voided => "voided",
        }
    }
}

/// Line as submitted by the maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItemInput {
    pub variant_id: VariantId,
    /// Signed for adjustments, strictly positive otherwise.
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    /// Only meaningful for returns; everything else moves fresh stock.
    #[serde(default)]
    pub source: StockPool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub variant_id: VariantId,
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    pub source: StockPool,
    /// Captured at approval time.
    pub stock_before: Option<i64>,
    pub stock_after: Option<i64>,
}

/// Stock level of one item's pool around the approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStockSnapshot {
    pub stock_before: i64,
    pub stock_after: i64,
}

/// Aggregate root: InventoryTransaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryTransaction {
    id: InventoryTransactionId,
    transaction_type: TransactionType,
    invoice_no: String,
    vendor_id: Option<VendorId>,
    reason: Option<String>,
    status: TransactionStatus,
    reference_transaction_id: Option<Uuid>,
    items: Vec<TransactionItem>,
    performed_by: Option<UserId>,
    approved_by: Option<UserId>,
    approval_date: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    void_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl InventoryTransaction {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InventoryTransactionId) -> Self {
        Self {
            id,
            transaction_type: TransactionType::Adjustment,
            invoice_no: String::new(),
            vendor_id: None,
            reason: None,
            status: TransactionStatus::Pending,
            reference_transaction_id: None,
            items: Vec::new(),
            performed_by: None,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            void_reason: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn ensure_exists(&self) -> Result<(), DomainError> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("inventory transaction {}", self.id)))
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn invoice_no(&self) -> &str {
        &self.invoice_no
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn reference_transaction_id(&self) -> Option<Uuid> {
        self.reference_transaction_id
    }

    pub fn items(&self) -> &[TransactionItem] {
        &self.items
    }

    pub fn performed_by(&self) -> Option<UserId> {
        self.performed_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn approval_date(&self) -> Option<DateTime<Utc>> {
        self.approval_date
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// A return without a referenced purchase, credited at the item's own cost.
    pub fn is_debit_note(&self) -> bool {
        self.transaction_type == TransactionType::PurchaseReturn
            && self.reference_transaction_id.is_none()
    }

    /// Requested quantity per variant (items may repeat a variant).
    pub fn quantities_by_variant(&self) -> Vec<(VariantId, i64)> {
        let mut totals: Vec<(VariantId, i64)> = Vec::new();
        for item in &self.items {
            match totals.iter_mut().find(|(v, _)| *v == item.variant_id) {
                Some((_, q)) => *q += item.quantity,
                None => totals.push((item.variant_id, item.quantity)),
            }
        }
        totals
    }
}

impl AggregateRoot for InventoryTransaction {
    type Id = InventoryTransactionId;
    const AGGREGATE_TYPE: &'static str = "inventory.transaction";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub transaction_id: InventoryTransactionId,
    pub transaction_type: TransactionType,
    pub invoice_no: String,
    pub vendor_id: Option<VendorId>,
    pub reason: Option<String>,
    pub reference_transaction_id: Option<Uuid>,
    pub items: Vec<TransactionItemInput>,
    pub performed_by: UserId,
    pub min_reason_length: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveTransaction. `stock` lines up with the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveTransaction {
    pub transaction_id: InventoryTransactionId,
    pub approved_by: UserId,
    pub stock: Vec<ItemStockSnapshot>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectTransaction {
    pub transaction_id: InventoryTransactionId,
    pub rejected_by: UserId,
    pub reason: String,
    pub min_reason_length: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidTransaction {
    pub transaction_id: InventoryTransactionId,
    pub voided_by: UserId,
    pub reason: String,
    pub min_reason_length: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    CreateTransaction(CreateTransaction),
    ApproveTransaction(ApproveTransaction),
    RejectTransaction(RejectTransaction),
    VoidTransaction(VoidTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreated {
    pub transaction_id: InventoryTransactionId,
    pub transaction_type: TransactionType,
    pub invoice_no: String,
    pub vendor_id: Option<VendorId>,
    pub reason: Option<String>,
    pub reference_transaction_id: Option<Uuid>,
    pub items: Vec<TransactionItem>,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionApproved {
    pub transaction_id: InventoryTransactionId,
    pub approved_by: UserId,
    pub stock: Vec<ItemStockSnapshot>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRejected {
    pub transaction_id: InventoryTransactionId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionVoided {
    pub transaction_id: InventoryTransactionId,
    pub voided_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    TransactionCreated(TransactionCreated),
    TransactionApproved(TransactionApproved),
    TransactionRejected(TransactionRejected),
    TransactionVoided(TransactionVoided),
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionCreated(_) => "inventory.transaction.created",
            TransactionEvent::TransactionApproved(_) => "inventory.transaction.approved",
            TransactionEvent::TransactionRejected(_) => "inventory.transaction.rejected",
            TransactionEvent::TransactionVoided(_) => "inventory.transaction.voided",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::TransactionCreated(e) => e.occurred_at,
            TransactionEvent::TransactionApproved(e) => e.occurred_at,
            TransactionEvent::TransactionRejected(e) => e.occurred_at,
            TransactionEvent::TransactionVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryTransaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::TransactionCreated(e) => {
                self.id = e.transaction_id;
                self.transaction_type = e.transaction_type;
                self.invoice_no = e.invoice_no.clone();
                self.vendor_id = e.vendor_id;
                self.reason = e.reason.clone();
                self.reference_transaction_id = e.reference_transaction_id;
                self.items = e.items.clone();
                self.performed_by = Some(e.performed_by);
                self.status = TransactionStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            TransactionEvent::TransactionApproved(e) => {
                self.status = TransactionStatus::Approved;
                self.approved_by = Some(e.approved_by);
                self.approval_date = Some(e.occurred_at);
                for (item, snap) in self.items.iter_mut().zip(&e.stock) {
                    item.stock_before = Some(snap.stock_before);
                    item.stock_after = Some(snap.stock_after);
                }
            }
            TransactionEvent::TransactionRejected(e) => {
                self.status = TransactionStatus::Rejected;
                self.approved_by = Some(e.rejected_by);
                self.approval_date = Some(e.occurred_at);
                self.rejection_reason = Some(e.reason.clone());
            }
            TransactionEvent::TransactionVoided(e) => {
                self.status = TransactionStatus::Voided;
                self.void_reason = Some(e.reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::CreateTransaction(cmd) => self.handle_create(cmd),
            TransactionCommand::ApproveTransaction(cmd) => self.handle_approve(cmd),
            TransactionCommand::RejectTransaction(cmd) => self.handle_reject(cmd),
            TransactionCommand::VoidTransaction(cmd) => self.handle_void(cmd),
        }
    }
}

fn ensure_reason(
    reason: Option<&str>,
    min_len: usize,
    what: &str,
) -> Result<String, DomainError> {
    let trimmed = reason.map(str::trim).unwrap_or_default();
    if trimmed.chars().count() < min_len.max(1) {
        return Err(DomainError::validation(format!(
            "{what} requires a reason of at least {} characters",
            min_len.max(1)
        )));
    }
    Ok(trimmed.to_string())
}

impl InventoryTransaction {
    fn transition(&self, action: TransactionAction) -> Result<TransactionStatus, DomainError> {
        self.ensure_exists()?;
        self.status.next(action).ok_or_else(|| {
            DomainError::validation(format!(
                "cannot {} a transaction in status {}",
                match action {
                    TransactionAction::Approve => "approve",
                    TransactionAction::Reject => "reject",
                    TransactionAction::Void => "void",
                },
                self.status.as_str()
            ))
        })
    }

    fn handle_create(&self, cmd: &CreateTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("inventory transaction already exists"));
        }
        let kind = cmd.transaction_type;

        if cmd.items.is_empty() {
            return Err(DomainError::validation("at least one item is required"));
        }
        if cmd.invoice_no.trim().is_empty() {
            return Err(DomainError::validation("invoice_no cannot be empty"));
        }
        if kind.requires_vendor() && cmd.vendor_id.is_none() {
            return Err(DomainError::validation(format!("{kind} transactions require a vendor")));
        }
        let reason = if kind.requires_reason() {
            Some(ensure_reason(cmd.reason.as_deref(), cmd.min_reason_length, kind.as_str())?)
        } else {
            cmd.reason.as_ref().map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
        };
        if cmd.reference_transaction_id.is_some() && kind != TransactionType::PurchaseReturn {
            return Err(DomainError::validation(
                "only purchase returns may reference a purchase",
            ));
        }
        let debit_note =
            kind == TransactionType::PurchaseReturn && cmd.reference_transaction_id.is_none();

        let mut items = Vec::with_capacity(cmd.items.len());
        for input in &cmd.items {
            match kind {
                TransactionType::Adjustment if input.quantity == 0 => {
                    return Err(DomainError::validation(format!(
                        "adjustment quantity for variant {} cannot be zero",
                        input.variant_id
                    )));
                }
                TransactionType::Adjustment => {}
                _ if input.quantity <= 0 => {
                    return Err(DomainError::validation(format!(
                        "quantity for variant {} must be greater than zero",
                        input.variant_id
                    )));
                }
                _ => {}
            }

            let needs_cost = kind == TransactionType::Purchase || debit_note;
            match input.unit_cost {
                Some(cost) => ensure_non_negative("unit_cost", cost)?,
                None if needs_cost => {
                    return Err(DomainError::validation(format!(
                        "unit_cost is required for variant {}",
                        input.variant_id
                    )));
                }
                None => {}
            }

            let source = if kind == TransactionType::PurchaseReturn {
                input.source
            } else {
                StockPool::Fresh
            };

            items.push(TransactionItem {
                variant_id: input.variant_id,
                quantity: input.quantity,
                unit_cost: input.unit_cost,
                source,
                stock_before: None,
                stock_after: None,
            });
        }

        Ok(vec![TransactionEvent::TransactionCreated(TransactionCreated {
            transaction_id: cmd.transaction_id,
            transaction_type: kind,
            invoice_no: cmd.invoice_no.trim().to_string(),
            vendor_id: cmd.vendor_id,
            reason,
            reference_transaction_id: cmd.reference_transaction_id,
            items,
            performed_by: cmd.performed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        self.transition(TransactionAction::Approve)?;
        if cmd.stock.len() != self.items.len() {
            return Err(DomainError::invariant(format!(
                "expected {} stock snapshots, got {}",
                self.items.len(),
                cmd.stock.len()
            )));
        }

        Ok(vec![TransactionEvent::TransactionApproved(TransactionApproved {
            transaction_id: cmd.transaction_id,
            approved_by: cmd.approved_by,
            stock: cmd.stock.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        self.transition(TransactionAction::Reject)?;
        let reason = ensure_reason(Some(cmd.reason.as_str()), cmd.min_reason_length, "rejection")?;

        Ok(vec![TransactionEvent::TransactionRejected(TransactionRejected {
            transaction_id: cmd.transaction_id,
            rejected_by: cmd.rejected_by,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        self.transition(TransactionAction::Void)?;
        let reason = ensure_reason(Some(cmd.reason.as_str()), cmd.min_reason_length, "void")?;

        Ok(vec![TransactionEvent::TransactionVoided(TransactionVoided {
            transaction_id: cmd.transaction_id,
            voided_by: cmd.voided_by,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}
