//! Purchase recorder.
//!
//! One purchase is one unit of work over the purchase stream, the stock item
//! of every line and the vendor's ledger: the header, the stock increases and
//! the debit entry are persisted together or not at all.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use stockledger_auth::{Permission, Principal, authorize};
use stockledger_core::{AggregateRoot, DomainError, Money, UserId};
use stockledger_inventory::{
    InventoryTransaction, InventoryTransactionId, ItemStockSnapshot, ReceiveStock, StockCommand, StockPool, VariantId,
    WithdrawStock,
};
use stockledger_ledger::{EntryType, LedgerCommand, LedgerEntryId, PostEntry, ReverseEntry, VendorLedger};
use stockledger_purchasing::{
    CancelPurchase, Purchase, PurchaseCommand, PurchaseId, PurchaseLineInput, PurchaseStatus, RecordPurchase,
    format_purchase_invoice_no,
};
use stockledger_vendors::{Vendor, VendorId};

use super::stock_book::StockBook;
use super::{ServiceError, StockLedger, Uow, clean, id_or_new, now, uuid_of};
use crate::command_dispatcher::DispatchError;

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseItemRequest {
    pub variant_id: VariantId,
    pub quantity: i64,
    pub cost_price: Money,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseRequest {
    pub vendor_id: VendorId,
    pub items: Vec<PurchaseItemRequest>,
    #[serde(default)]
    pub invoice_no: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
    /// Becomes the purchase id, so a retried request is recorded once.
    #[serde(default)]
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub purchase_id: PurchaseId,
    pub invoice_no: String,
    pub total_amount: Money,
    pub items_count: usize,
    /// True when the idempotency key matched an already recorded purchase.
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationReceipt {
    pub purchase_id: PurchaseId,
    pub status: PurchaseStatus,
    pub reversed_amount: Money,
}

/// A purchase ready to be recorded inside a unit of work.
#[derive(Debug, Clone)]
pub(crate) struct PurchaseDraft {
    pub purchase_id: PurchaseId,
    pub vendor_id: VendorId,
    pub invoice_no: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub lines: Vec<PurchaseItemRequest>,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub notes: Option<String>,
    pub created_by: UserId,
}

#[derive(Debug)]
pub(crate) struct RecordedPurchase {
    pub purchase: Purchase,
    /// Fresh-pool levels per line, in line order.
    pub stock: Vec<ItemStockSnapshot>,
}

impl PurchaseReceipt {
    fn of(purchase: &Purchase, replayed: bool) -> Self {
        Self {
            purchase_id: *purchase.id(),
            invoice_no: purchase.invoice_no().to_string(),
            total_amount: purchase.total_amount(),
            items_count: purchase.lines().len(),
            replayed,
        }
    }
}

/// Record header, stock receipts and the ledger debit of one purchase.
pub(crate) fn record_purchase_in(
    uow: &mut Uow<'_>,
    book: &mut StockBook,
    draft: PurchaseDraft,
    at: DateTime<Utc>,
) -> Result<RecordedPurchase, DispatchError> {
    let vendor = uow.load(Vendor::empty(draft.vendor_id))?;
    vendor.ensure_can_transact()?;
    if draft.lines.is_empty() {
        return Err(DomainError::validation("at least one item is required").into());
    }

    let mut lines = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        let item = book.get(uow, line.variant_id)?;
        lines.push(PurchaseLineInput {
            variant_id: line.variant_id,
            product_name: item.product_name().to_string(),
            variant_name: item.variant_name().to_string(),
            sku: item.sku().to_string(),
            quantity: line.quantity,
            cost_price: line.cost_price,
        });
    }

    let today = at.date_naive();
    let invoice_date = draft.invoice_date.unwrap_or(today);
    let invoice_no = clean(draft.invoice_no.clone())
        .unwrap_or_else(|| format_purchase_invoice_no(today, draft.purchase_id));
    let reference_id = uuid_of(draft.purchase_id);

    let mut purchase = uow.load(Purchase::empty(draft.purchase_id))?;
    uow.execute(
        &mut purchase,
        PurchaseCommand::RecordPurchase(RecordPurchase {
            purchase_id: draft.purchase_id,
            vendor_id: draft.vendor_id,
            invoice_no: invoice_no.clone(),
            invoice_date,
            lines,
            discount_amount: draft.discount_amount,
            tax_amount: draft.tax_amount,
            notes: clean(draft.notes.clone()),
            created_by: draft.created_by,
            occurred_at: at,
        }),
    )?;

    let mut stock = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        stock.push(book.apply(
            uow,
            line.variant_id,
            StockCommand::ReceiveStock(ReceiveStock {
                variant_id: line.variant_id,
                pool: StockPool::Fresh,
                quantity: line.quantity,
                unit_cost: Some(line.cost_price),
                reference_id,
                occurred_at: at,
            }),
        )?);
    }

    let mut ledger = uow.load(VendorLedger::empty(draft.vendor_id))?;
    uow.execute(
        &mut ledger,
        LedgerCommand::PostEntry(PostEntry {
            entry_id: LedgerEntryId::generate(),
            vendor_id: draft.vendor_id,
            entry_type: EntryType::Purchase,
            reference_id,
            reference_no: Some(invoice_no.clone()),
            debit: purchase.total_amount(),
            credit: Money::ZERO,
            description: Some(format!("Purchase {invoice_no}")),
            performed_by: Some(draft.created_by),
            transaction_date: invoice_date,
            created_at: at,
        }),
    )?;

    Ok(RecordedPurchase { purchase, stock })
}

/// Cancel a purchase: status, stock back out of the fresh pool, and a
/// reversing ledger entry. Returns the reversed amount.
pub(crate) fn cancel_purchase_in(
    uow: &mut Uow<'_>,
    book: &mut StockBook,
    purchase_id: PurchaseId,
    reason: &str,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<Money, DispatchError> {
    let mut purchase = uow.load(Purchase::empty(purchase_id))?;
    purchase.ensure_exists()?;
    uow.execute(
        &mut purchase,
        PurchaseCommand::CancelPurchase(CancelPurchase {
            purchase_id,
            reason: reason.to_string(),
            cancelled_by: actor,
            occurred_at: at,
        }),
    )?;

    let reference_id = uuid_of(purchase_id);
    for line in purchase.lines() {
        let quantity = line.quantity - line.returned_quantity;
        if quantity == 0 {
            continue;
        }
        book.apply(
            uow,
            line.variant_id,
            StockCommand::WithdrawStock(WithdrawStock {
                variant_id: line.variant_id,
                pool: StockPool::Fresh,
                quantity,
                reference_id,
                occurred_at: at,
            }),
        )?;
    }

    let vendor_id = purchase
        .vendor_id()
        .ok_or_else(|| DomainError::invariant(format!("purchase {purchase_id} has no vendor")))?;
    let mut ledger = uow.load(VendorLedger::empty(vendor_id))?;
    let Some(original) = ledger.find(reference_id, EntryType::Purchase) else {
        return Ok(Money::ZERO);
    };
    let reversed = original.debit;
    uow.execute(
        &mut ledger,
        LedgerCommand::ReverseEntry(ReverseEntry {
            entry_id: LedgerEntryId::generate(),
            vendor_id,
            reference_id,
            entry_type: EntryType::Purchase,
            description: Some(format!("Cancelled purchase {}: {}", purchase.invoice_no(), reason.trim())),
            performed_by: Some(actor),
            transaction_date: at.date_naive(),
            created_at: at,
        }),
    )?;

    Ok(reversed)
}

impl StockLedger {
    #[instrument(
        skip(self, request, actor),
        fields(actor = %actor.user_id, vendor_id = %request.vendor_id, items = request.items.len()),
        err
    )]
    pub fn create_purchase(&self, request: CreatePurchaseRequest, actor: &Principal) -> Result<PurchaseReceipt, ServiceError> {
        authorize(actor, &Permission::PURCHASES_CREATE)?;
        let purchase_id = PurchaseId::new(id_or_new(request.idempotency_key));

        let receipt = self.write(|uow| {
            let existing = uow.load(Purchase::empty(purchase_id))?;
            if existing.exists() {
                if existing.vendor_id() != Some(request.vendor_id) {
                    return Err(DomainError::conflict(format!(
                        "idempotency key {purchase_id} already identifies another purchase"
                    ))
                    .into());
                }
                return Ok(PurchaseReceipt::of(&existing, true));
            }

            let draft = PurchaseDraft {
                purchase_id,
                vendor_id: request.vendor_id,
                invoice_no: request.invoice_no.clone(),
                invoice_date: request.invoice_date,
                lines: request.items.clone(),
                discount_amount: request.discount_amount,
                tax_amount: request.tax_amount,
                notes: request.notes.clone(),
                created_by: actor.user_id,
            };
            let recorded = record_purchase_in(uow, &mut StockBook::new(), draft, now())?;
            Ok(PurchaseReceipt::of(&recorded.purchase, false))
        })?;

        info!(
            purchase_id = %receipt.purchase_id,
            total = %receipt.total_amount,
            replayed = receipt.replayed,
            "purchase recorded"
        );
        Ok(receipt)
    }

    /// Cancel a directly recorded purchase. Purchases created through the
    /// inventory workflow are undone by voiding their transaction.
    #[instrument(skip(self, reason, actor), fields(actor = %actor.user_id), err)]
    pub fn cancel_purchase(
        &self,
        purchase_id: PurchaseId,
        reason: &str,
        actor: &Principal,
    ) -> Result<CancellationReceipt, ServiceError> {
        authorize(actor, &Permission::PURCHASES_CANCEL)?;

        let reversed_amount = self.write(|uow| {
            let transaction = uow.load(InventoryTransaction::empty(InventoryTransactionId::new(purchase_id.0)))?;
            if transaction.exists() {
                return Err(DomainError::validation(format!(
                    "purchase {purchase_id} belongs to inventory transaction {}; void the transaction instead",
                    transaction.invoice_no()
                ))
                .into());
            }
            cancel_purchase_in(uow, &mut StockBook::new(), purchase_id, reason, actor.user_id, now())
        })?;

        info!(%purchase_id, reversed = %reversed_amount, "purchase cancelled");
        Ok(CancellationReceipt {
            purchase_id,
            status: PurchaseStatus::Cancelled,
            reversed_amount,
        })
    }
}
