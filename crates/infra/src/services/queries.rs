//! Read-side queries, served from the projections.

use stockledger_core::DomainError;
use stockledger_inventory::{InventoryTransactionId, TransactionStatus, VariantId};
use stockledger_purchasing::{PaymentId, PaymentRecorded, PurchaseId};
use stockledger_vendors::VendorId;

use super::{ServiceError, StockLedger};
use crate::projections::{LedgerPage, PurchaseView, TransactionView, VariantStock, VendorAccount};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

fn found<T>(value: Option<T>, what: impl FnOnce() -> String) -> Result<T, ServiceError> {
    value.ok_or_else(|| DomainError::not_found(what()).into())
}

impl StockLedger {
    pub fn vendors(&self) -> Vec<VendorAccount> {
        self.read_models.vendor_accounts.list()
    }

    pub fn vendor_summary(&self, vendor_id: VendorId) -> Result<VendorAccount, ServiceError> {
        found(self.read_models.vendor_accounts.get(&vendor_id), || format!("vendor {vendor_id}"))
    }

    /// The vendor's ledger, newest first. `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn vendor_transactions(
        &self,
        vendor_id: VendorId,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<LedgerPage, ServiceError> {
        self.vendor_summary(vendor_id)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self
            .read_models
            .ledger_entries
            .page(vendor_id, limit, offset.unwrap_or(0)))
    }

    pub fn vendor_purchases(&self, vendor_id: VendorId) -> Vec<PurchaseView> {
        self.read_models.purchases.for_vendor(vendor_id)
    }

    pub fn vendor_payments(&self, vendor_id: VendorId) -> Vec<PaymentRecorded> {
        self.read_models.payments.for_vendor(vendor_id)
    }

    pub fn purchase(&self, purchase_id: PurchaseId) -> Result<PurchaseView, ServiceError> {
        found(self.read_models.purchases.get(&purchase_id), || format!("purchase {purchase_id}"))
    }

    pub fn payment(&self, payment_id: PaymentId) -> Result<PaymentRecorded, ServiceError> {
        found(self.read_models.payments.get(&payment_id), || format!("payment {payment_id}"))
    }

    pub fn transaction(&self, transaction_id: InventoryTransactionId) -> Result<TransactionView, ServiceError> {
        found(self.read_models.transactions.get(&transaction_id), || {
            format!("inventory transaction {transaction_id}")
        })
    }

    /// The checker's queue, oldest first.
    pub fn pending_transactions(&self) -> Vec<TransactionView> {
        self.read_models.transactions.with_status(TransactionStatus::Pending)
    }

    pub fn variant(&self, variant_id: VariantId) -> Result<VariantStock, ServiceError> {
        found(self.read_models.stock_levels.get(&variant_id), || format!("variant {variant_id}"))
    }

    pub fn variants(&self) -> Vec<VariantStock> {
        self.read_models.stock_levels.list()
    }
}
