//! Payment recorder.

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use stockledger_auth::{Permission, Principal, authorize};
use stockledger_core::{DomainError, Money};
use stockledger_ledger::{EntryType, LedgerCommand, LedgerEntryId, PostEntry, VendorLedger};
use stockledger_purchasing::{
    Payment, PaymentCommand, PaymentId, PaymentMethod, RecordPayment, format_payment_no,
};
use stockledger_vendors::{Vendor, VendorId};

use super::{ServiceError, StockLedger, clean, id_or_new, now, uuid_of};

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentRequest {
    pub vendor_id: VendorId,
    pub amount: Money,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Bank or cheque reference, free text.
    #[serde(default)]
    pub transaction_ref: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub payment_no: String,
    pub amount: Money,
    pub balance_before: Money,
    pub new_balance: Money,
    pub replayed: bool,
}

impl StockLedger {
    #[instrument(
        skip(self, request, actor),
        fields(actor = %actor.user_id, vendor_id = %request.vendor_id, amount = %request.amount),
        err
    )]
    pub fn record_payment(&self, request: RecordPaymentRequest, actor: &Principal) -> Result<PaymentReceipt, ServiceError> {
        authorize(actor, &Permission::PAYMENTS_RECORD)?;
        let payment_id = PaymentId::new(id_or_new(request.idempotency_key));
        let payment_date = request.payment_date.unwrap_or_else(|| now().date_naive());
        let payment_no = self.draw_payment_no(payment_date)?;

        let receipt = self.write(|uow| {
            let existing = uow.load(Payment::empty(payment_id))?;
            if let Some(recorded) = existing.record() {
                if recorded.vendor_id != request.vendor_id {
                    return Err(DomainError::conflict(format!(
                        "idempotency key {payment_id} already identifies another payment"
                    ))
                    .into());
                }
                return Ok(PaymentReceipt {
                    payment_id,
                    payment_no: recorded.payment_no.clone(),
                    amount: recorded.amount,
                    balance_before: recorded.balance_before,
                    new_balance: recorded.balance_after,
                    replayed: true,
                });
            }

            let vendor = uow.load(Vendor::empty(request.vendor_id))?;
            vendor.ensure_can_transact()?;
            let mut ledger = uow.load(VendorLedger::empty(request.vendor_id))?;
            let balance_before = ledger.balance();
            let at = now();

            let mut payment = existing;
            uow.execute(
                &mut payment,
                PaymentCommand::RecordPayment(RecordPayment {
                    payment_id,
                    vendor_id: request.vendor_id,
                    payment_no: payment_no.clone(),
                    amount: request.amount,
                    payment_method: request.payment_method,
                    payment_date,
                    reference_number: clean(request.transaction_ref.clone()),
                    bank_name: clean(request.bank_name.clone()),
                    remarks: clean(request.remarks.clone()),
                    receipt_url: clean(request.receipt_url.clone()),
                    balance_before,
                    created_by: actor.user_id,
                    occurred_at: at,
                }),
            )?;
            let amount = payment.record().map(|r| r.amount).unwrap_or(request.amount);

            uow.execute(
                &mut ledger,
                LedgerCommand::PostEntry(PostEntry {
                    entry_id: LedgerEntryId::generate(),
                    vendor_id: request.vendor_id,
                    entry_type: EntryType::Payment,
                    reference_id: uuid_of(payment_id),
                    reference_no: Some(payment_no.clone()),
                    debit: Money::ZERO,
                    credit: amount,
                    description: Some(format!("Payment {payment_no} ({})", request.payment_method.as_str())),
                    performed_by: Some(actor.user_id),
                    transaction_date: payment_date,
                    created_at: at,
                }),
            )?;

            Ok(PaymentReceipt {
                payment_id,
                payment_no: payment_no.clone(),
                amount,
                balance_before,
                new_balance: ledger.balance(),
                replayed: false,
            })
        })?;

        info!(
            payment_id = %receipt.payment_id,
            payment_no = %receipt.payment_no,
            new_balance = %receipt.new_balance,
            replayed = receipt.replayed,
            "payment recorded"
        );
        Ok(receipt)
    }

    /// `PAY-YYYYMMDD-####` with a random suffix not yet issued.
    fn draw_payment_no(&self, date: NaiveDate) -> Result<String, ServiceError> {
        let mut rng = rand::thread_rng();
        for attempt in 1..=self.config.payment_no_max_attempts {
            let candidate = format_payment_no(date, rng.gen_range(0..10_000));
            if !self.read_models.payments.is_number_taken(&candidate)? {
                return Ok(candidate);
            }
            debug!(attempt, candidate, "payment number already issued");
        }
        Err(DomainError::conflict(format!(
            "could not draw an unused payment number for {date} after {} attempts",
            self.config.payment_no_max_attempts
        ))
        .into())
    }
}
