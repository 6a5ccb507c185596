//! Inventory transaction workflow (maker-checker).
//!
//! ```text
//!            create ──(purchase, or privileged maker)──► approved
//!              │                                           │
//!              ▼                                           ▼
//!           pending ──approve──► approved ──void──►     voided
//!              │
//!              └──reject──► rejected
//! ```
//!
//! Stock, purchase and ledger effects happen only on approval, in the same
//! unit of work as the status change. Voiding an approved transaction undoes
//! them the same way.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use stockledger_auth::{Permission, Principal, authorize};
use stockledger_core::money::{line_total, normalize};
use stockledger_core::{AggregateId, AggregateRoot, DomainError, Money, UserId};
use stockledger_inventory::{
    AdjustStock, ApproveTransaction, CreateTransaction, InventoryTransaction, InventoryTransactionId,
    ItemStockSnapshot, ReceiveStock, RejectTransaction, StockCommand, StockPool, TransactionCommand,
    TransactionItem, TransactionItemInput, TransactionStatus, TransactionType, TransferStock, VoidTransaction,
    WithdrawStock,
};
use stockledger_ledger::{EntryType, LedgerCommand, LedgerEntryId, PostEntry, ReverseEntry, VendorLedger};
use stockledger_purchasing::{
    Purchase, PurchaseCommand, PurchaseEvent, PurchaseId, PurchaseStatus, RecordReturn, ReturnRequest, ReverseReturn,
    format_purchase_invoice_no,
};
use stockledger_vendors::{Vendor, VendorId};

use super::purchases::{PurchaseDraft, PurchaseItemRequest, cancel_purchase_in, record_purchase_in};
use super::stock_book::StockBook;
use super::{ServiceError, StockLedger, Uow, clean, id_or_new, now, uuid_of};
use crate::command_dispatcher::DispatchError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub invoice_no: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Purchase being returned against (returns only).
    #[serde(default)]
    pub reference_transaction_id: Option<Uuid>,
    pub items: Vec<TransactionItemInput>,
    #[serde(default)]
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub transaction_id: InventoryTransactionId,
    pub transaction_type: TransactionType,
    pub invoice_no: String,
    pub status: TransactionStatus,
    pub requires_approval: bool,
    pub items: Vec<TransactionItem>,
    pub replayed: bool,
}

impl TransactionReceipt {
    fn of(transaction: &InventoryTransaction, replayed: bool) -> Result<Self, DispatchError> {
        let transaction_id = transaction_id_of(transaction)?;
        Ok(Self {
            transaction_id,
            transaction_type: transaction.transaction_type(),
            invoice_no: transaction.invoice_no().to_string(),
            status: transaction.status(),
            requires_approval: transaction.status() == TransactionStatus::Pending,
            items: transaction.items().to_vec(),
            replayed,
        })
    }
}

fn transaction_id_of(transaction: &InventoryTransaction) -> Result<InventoryTransactionId, DispatchError> {
    transaction.ensure_exists()?;
    Ok(*transaction.id())
}

fn purchase_id(reference: Uuid) -> PurchaseId {
    PurchaseId::new(AggregateId::from_uuid(reference))
}

/// Generated invoice number for non-purchase transactions: `TXN-YYYYMMDD-XXXXXXXX`.
fn format_transaction_invoice_no(date: NaiveDate, id: InventoryTransactionId) -> String {
    let hex = uuid_of(id).simple().to_string();
    format!("TXN-{}-{}", date.format("%Y%m%d"), hex[..8].to_uppercase())
}

/// The purchase a return references must be completed and belong to the
/// returning vendor.
fn ensure_returnable(purchase: &Purchase, vendor_id: Option<VendorId>) -> Result<(), DomainError> {
    purchase.ensure_exists()?;
    let id = purchase.id();
    if purchase.status() != PurchaseStatus::Completed {
        return Err(DomainError::validation(format!("purchase {id} is not completed")));
    }
    if purchase.vendor_id() != vendor_id {
        return Err(DomainError::validation(format!("purchase {id} belongs to a different vendor")));
    }
    Ok(())
}

fn return_requests(transaction: &InventoryTransaction) -> Vec<ReturnRequest> {
    transaction
        .quantities_by_variant()
        .into_iter()
        .map(|(variant_id, quantity)| ReturnRequest { variant_id, quantity })
        .collect()
}

fn return_description(transaction: &InventoryTransaction) -> String {
    let label = if transaction.is_debit_note() { "Debit note" } else { "Purchase return" };
    match transaction.reason() {
        Some(reason) => format!("{label} {}: {reason}", transaction.invoice_no()),
        None => format!("{label} {}", transaction.invoice_no()),
    }
}

fn required_vendor(transaction: &InventoryTransaction) -> Result<VendorId, DispatchError> {
    transaction.vendor_id().ok_or_else(|| {
        DomainError::invariant(format!(
            "{} transaction {} has no vendor",
            transaction.transaction_type(),
            transaction.invoice_no()
        ))
        .into()
    })
}

/// Apply the stock, purchase and ledger effects of `transaction` and mark it
/// approved.
fn apply_approval(
    uow: &mut Uow<'_>,
    transaction: &mut InventoryTransaction,
    approver: UserId,
    at: DateTime<Utc>,
) -> Result<(), DispatchError> {
    let transaction_id = transaction_id_of(transaction)?;
    let reference_id = uuid_of(transaction_id);
    let mut book = StockBook::new();

    let stock: Vec<ItemStockSnapshot> = match transaction.transaction_type() {
        TransactionType::Purchase => {
            let mut lines = Vec::with_capacity(transaction.items().len());
            for item in transaction.items() {
                let cost_price = item.unit_cost.ok_or_else(|| {
                    DomainError::validation(format!("unit_cost is required for variant {}", item.variant_id))
                })?;
                lines.push(PurchaseItemRequest {
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                    cost_price,
                });
            }
            let draft = PurchaseDraft {
                purchase_id: PurchaseId::new(transaction_id.0),
                vendor_id: required_vendor(transaction)?,
                invoice_no: Some(transaction.invoice_no().to_string()),
                invoice_date: Some(at.date_naive()),
                lines,
                discount_amount: Money::ZERO,
                tax_amount: Money::ZERO,
                notes: transaction.reason().map(str::to_string),
                created_by: transaction.performed_by().unwrap_or(approver),
            };
            record_purchase_in(uow, &mut book, draft, at)?.stock
        }
        TransactionType::PurchaseReturn => {
            let vendor_id = required_vendor(transaction)?;
            let vendor = uow.load(Vendor::empty(vendor_id))?;
            vendor.ensure_can_transact()?;

            let credit = match transaction.reference_transaction_id() {
                Some(reference) => {
                    let mut purchase = uow.load(Purchase::empty(purchase_id(reference)))?;
                    ensure_returnable(&purchase, Some(vendor_id))?;
                    let events = uow.execute(
                        &mut purchase,
                        PurchaseCommand::RecordReturn(RecordReturn {
                            purchase_id: purchase_id(reference),
                            return_id: reference_id,
                            items: return_requests(transaction),
                            occurred_at: at,
                        }),
                    )?;
                    events
                        .iter()
                        .map(|e| match e {
                            PurchaseEvent::ReturnRecorded(r) => r.credit_amount,
                            _ => Money::ZERO,
                        })
                        .sum::<Money>()
                }
                None => normalize(
                    transaction
                        .items()
                        .iter()
                        .map(|i| line_total(i.quantity, i.unit_cost.unwrap_or_default()))
                        .sum(),
                ),
            };

            let mut stock = Vec::with_capacity(transaction.items().len());
            for item in transaction.items() {
                stock.push(book.apply(
                    uow,
                    item.variant_id,
                    StockCommand::WithdrawStock(WithdrawStock {
                        variant_id: item.variant_id,
                        pool: item.source,
                        quantity: item.quantity,
                        reference_id,
                        occurred_at: at,
                    }),
                )?);
            }

            if credit > Money::ZERO {
                let mut ledger = uow.load(VendorLedger::empty(vendor_id))?;
                uow.execute(
                    &mut ledger,
                    LedgerCommand::PostEntry(PostEntry {
                        entry_id: LedgerEntryId::generate(),
                        vendor_id,
                        entry_type: EntryType::PurchaseReturn,
                        reference_id,
                        reference_no: Some(transaction.invoice_no().to_string()),
                        debit: Money::ZERO,
                        credit,
                        description: Some(return_description(transaction)),
                        performed_by: Some(approver),
                        transaction_date: at.date_naive(),
                        created_at: at,
                    }),
                )?;
            }
            stock
        }
        TransactionType::Damage => {
            let mut stock = Vec::with_capacity(transaction.items().len());
            for item in transaction.items() {
                stock.push(book.apply(
                    uow,
                    item.variant_id,
                    StockCommand::TransferStock(TransferStock {
                        variant_id: item.variant_id,
                        from: StockPool::Fresh,
                        to: StockPool::Damaged,
                        quantity: item.quantity,
                        reference_id,
                        occurred_at: at,
                    }),
                )?);
            }
            stock
        }
        TransactionType::Adjustment => {
            let mut stock = Vec::with_capacity(transaction.items().len());
            for item in transaction.items() {
                stock.push(book.apply(
                    uow,
                    item.variant_id,
                    StockCommand::AdjustStock(AdjustStock {
                        variant_id: item.variant_id,
                        delta: item.quantity,
                        reference_id,
                        occurred_at: at,
                    }),
                )?);
            }
            stock
        }
    };

    uow.execute(
        transaction,
        TransactionCommand::ApproveTransaction(ApproveTransaction {
            transaction_id,
            approved_by: approver,
            stock,
            occurred_at: at,
        }),
    )?;
    Ok(())
}

/// Undo the effects of an approved transaction that was just voided.
fn reverse_effects(
    uow: &mut Uow<'_>,
    transaction: &InventoryTransaction,
    reason: &str,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<(), DispatchError> {
    let transaction_id = transaction_id_of(transaction)?;
    let reference_id = uuid_of(transaction_id);
    let mut book = StockBook::new();

    match transaction.transaction_type() {
        TransactionType::Purchase => {
            cancel_purchase_in(uow, &mut book, PurchaseId::new(transaction_id.0), reason, actor, at)?;
        }
        TransactionType::PurchaseReturn => {
            for item in transaction.items() {
                book.apply(
                    uow,
                    item.variant_id,
                    StockCommand::ReceiveStock(ReceiveStock {
                        variant_id: item.variant_id,
                        pool: item.source,
                        quantity: item.quantity,
                        unit_cost: None,
                        reference_id,
                        occurred_at: at,
                    }),
                )?;
            }
            if let Some(reference) = transaction.reference_transaction_id() {
                let mut purchase = uow.load(Purchase::empty(purchase_id(reference)))?;
                uow.execute(
                    &mut purchase,
                    PurchaseCommand::ReverseReturn(ReverseReturn {
                        purchase_id: purchase_id(reference),
                        return_id: reference_id,
                        occurred_at: at,
                    }),
                )?;
            }
            let vendor_id = required_vendor(transaction)?;
            let mut ledger = uow.load(VendorLedger::empty(vendor_id))?;
            if ledger.find(reference_id, EntryType::PurchaseReturn).is_some() {
                uow.execute(
                    &mut ledger,
                    LedgerCommand::ReverseEntry(ReverseEntry {
                        entry_id: LedgerEntryId::generate(),
                        vendor_id,
                        reference_id,
                        entry_type: EntryType::PurchaseReturn,
                        description: Some(format!("Voided return {}: {reason}", transaction.invoice_no())),
                        performed_by: Some(actor),
                        transaction_date: at.date_naive(),
                        created_at: at,
                    }),
                )?;
            }
        }
        TransactionType::Damage => {
            for item in transaction.items() {
                book.apply(
                    uow,
                    item.variant_id,
                    StockCommand::TransferStock(TransferStock {
                        variant_id: item.variant_id,
                        from: StockPool::Damaged,
                        to: StockPool::Fresh,
                        quantity: item.quantity,
                        reference_id,
                        occurred_at: at,
                    }),
                )?;
            }
        }
        TransactionType::Adjustment => {
            for item in transaction.items() {
                book.apply(
                    uow,
                    item.variant_id,
                    StockCommand::AdjustStock(AdjustStock {
                        variant_id: item.variant_id,
                        delta: -item.quantity,
                        reference_id,
                        occurred_at: at,
                    }),
                )?;
            }
        }
    }
    Ok(())
}

impl StockLedger {
    /// Create a transaction. Purchases and transactions created by a
    /// privileged actor are approved on the spot; everything else waits in
    /// the pending queue.
    #[instrument(
        skip(self, request, actor),
        fields(actor = %actor.user_id, transaction_type = %request.transaction_type),
        err
    )]
    pub fn create_transaction(
        &self,
        request: CreateTransactionRequest,
        actor: &Principal,
    ) -> Result<TransactionReceipt, ServiceError> {
        authorize(actor, &Permission::TRANSACTIONS_CREATE)?;
        let transaction_id = InventoryTransactionId::new(id_or_new(request.idempotency_key));
        let auto_approve = request.transaction_type == TransactionType::Purchase || actor.is_privileged();
        let min_reason_length = self.config.min_reason_length;

        let receipt = self.write(|uow| {
            let mut transaction = uow.load(InventoryTransaction::empty(transaction_id))?;
            if transaction.exists() {
                if transaction.transaction_type() != request.transaction_type {
                    return Err(DomainError::conflict(format!(
                        "idempotency key {transaction_id} already identifies another transaction"
                    ))
                    .into());
                }
                return TransactionReceipt::of(&transaction, true);
            }

            if let Some(vendor_id) = request.vendor_id {
                uow.load(Vendor::empty(vendor_id))?.ensure_can_transact()?;
            }
            let mut book = StockBook::new();
            for item in &request.items {
                book.get(uow, item.variant_id)?;
            }
            let at = now();
            let invoice_no = clean(request.invoice_no.clone()).unwrap_or_else(|| match request.transaction_type {
                TransactionType::Purchase => {
                    format_purchase_invoice_no(at.date_naive(), PurchaseId::new(transaction_id.0))
                }
                _ => format_transaction_invoice_no(at.date_naive(), transaction_id),
            });

            uow.execute(
                &mut transaction,
                TransactionCommand::CreateTransaction(CreateTransaction {
                    transaction_id,
                    transaction_type: request.transaction_type,
                    invoice_no,
                    vendor_id: request.vendor_id,
                    reason: request.reason.clone(),
                    reference_transaction_id: request.reference_transaction_id,
                    items: request.items.clone(),
                    performed_by: actor.user_id,
                    min_reason_length,
                    occurred_at: at,
                }),
            )?;

            // Over-returns are refused up front, not just at approval.
            if let (TransactionType::PurchaseReturn, Some(reference)) =
                (transaction.transaction_type(), transaction.reference_transaction_id())
            {
                let purchase = uow.load(Purchase::empty(purchase_id(reference)))?;
                ensure_returnable(&purchase, transaction.vendor_id())?;
                purchase.allocate_return(&return_requests(&transaction))?;
            }

            if auto_approve {
                apply_approval(uow, &mut transaction, actor.user_id, at)?;
            }
            TransactionReceipt::of(&transaction, false)
        })?;

        info!(
            transaction_id = %receipt.transaction_id,
            status = %receipt.status.as_str(),
            replayed = receipt.replayed,
            "inventory transaction created"
        );
        Ok(receipt)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn approve_transaction(
        &self,
        transaction_id: InventoryTransactionId,
        actor: &Principal,
    ) -> Result<TransactionReceipt, ServiceError> {
        authorize(actor, &Permission::TRANSACTIONS_APPROVE)?;

        let receipt = self.write(|uow| {
            let mut transaction = uow.load(InventoryTransaction::empty(transaction_id))?;
            transaction.ensure_exists()?;
            if transaction.status() != TransactionStatus::Pending {
                return Err(DomainError::validation(format!(
                    "cannot approve a transaction in status {}",
                    transaction.status().as_str()
                ))
                .into());
            }
            apply_approval(uow, &mut transaction, actor.user_id, now())?;
            TransactionReceipt::of(&transaction, false)
        })?;

        info!(%transaction_id, "inventory transaction approved");
        Ok(receipt)
    }

    #[instrument(skip(self, reason, actor), fields(actor = %actor.user_id), err)]
    pub fn reject_transaction(
        &self,
        transaction_id: InventoryTransactionId,
        reason: &str,
        actor: &Principal,
    ) -> Result<TransactionReceipt, ServiceError> {
        authorize(actor, &Permission::TRANSACTIONS_APPROVE)?;
        let min_reason_length = self.config.min_reason_length;

        let receipt = self.write(|uow| {
            let mut transaction = uow.load(InventoryTransaction::empty(transaction_id))?;
            uow.execute(
                &mut transaction,
                TransactionCommand::RejectTransaction(RejectTransaction {
                    transaction_id,
                    rejected_by: actor.user_id,
                    reason: reason.to_string(),
                    min_reason_length,
                    occurred_at: now(),
                }),
            )?;
            TransactionReceipt::of(&transaction, false)
        })?;

        info!(%transaction_id, "inventory transaction rejected");
        Ok(receipt)
    }

    /// Void an approved transaction and reverse its effects.
    #[instrument(skip(self, reason, actor), fields(actor = %actor.user_id), err)]
    pub fn void_transaction(
        &self,
        transaction_id: InventoryTransactionId,
        reason: &str,
        actor: &Principal,
    ) -> Result<TransactionReceipt, ServiceError> {
        authorize(actor, &Permission::TRANSACTIONS_APPROVE)?;
        let min_reason_length = self.config.min_reason_length;

        let receipt = self.write(|uow| {
            let mut transaction = uow.load(InventoryTransaction::empty(transaction_id))?;
            let at = now();
            uow.execute(
                &mut transaction,
                TransactionCommand::VoidTransaction(VoidTransaction {
                    transaction_id,
                    voided_by: actor.user_id,
                    reason: reason.to_string(),
                    min_reason_length,
                    occurred_at: at,
                }),
            )?;
            reverse_effects(uow, &transaction, reason.trim(), actor.user_id, at)?;
            TransactionReceipt::of(&transaction, false)
        })?;

        info!(%transaction_id, "inventory transaction voided");
        Ok(receipt)
    }
}
