use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::money::{ensure_non_negative, line_total, normalize};
use stockledger_core::{Aggregate, AggregateRoot, DomainError, Money, UserId, aggregate_id};
use stockledger_events::Event;
use stockledger_inventory::VariantId;
use stockledger_vendors::VendorId;

aggregate_id!(
    /// Purchase identifier. Inventory purchase transactions reuse their own id.
    PurchaseId
);

/// Generated invoice number: `PUR-YYYYMMDD-<first 8 hex digits of the id>`.
pub fn format_purchase_invoice_no(date: NaiveDate, id: PurchaseId) -> String {
    let hex = id.0.as_uuid().simple().to_string();
    format!("PUR-{}-{}", date.format("%Y%m%d"), hex[..8].to_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Draft,
    Completed,
    Cancelled,
}

/// Line as submitted, with the catalog snapshot resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub quantity: i64,
    pub cost_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub quantity: i64,
    pub cost_price: Money,
    pub line_total: Money,
    pub returned_quantity: i64,
}

impl PurchaseLine {
    pub fn returnable(&self) -> i64 {
        self.quantity - self.returned_quantity
    }
}

/// Quantity of one line sent back to the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnAllocation {
    pub line_index: usize,
    pub variant_id: VariantId,
    pub quantity: i64,
    pub unit_cost: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub variant_id: VariantId,
    pub quantity: i64,
}

/// Aggregate root: Purchase (header + items).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    id: PurchaseId,
    vendor_id: Option<VendorId>,
    invoice_no: String,
    invoice_date: Option<NaiveDate>,
    lines: Vec<PurchaseLine>,
    subtotal: Money,
    discount_amount: Money,
    tax_amount: Money,
    total_amount: Money,
    status: PurchaseStatus,
    notes: Option<String>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    returns: Vec<(Uuid, Vec<ReturnAllocation>)>,
    version: u64,
    created: bool,
}

impl Purchase {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseId) -> Self {
        Self {
            id,
            vendor_id: None,
            invoice_no: String::new(),
            invoice_date: None,
            lines: Vec::new(),
            subtotal: Money::ZERO,
            discount_amount: Money::ZERO,
            tax_amount: Money::ZERO,
            total_amount: Money::ZERO,
            status: PurchaseStatus::Draft,
            notes: None,
            created_by: None,
            created_at: None,
            cancel_reason: None,
            returns: Vec::new(),
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
            Err(DomainError::not_found(format!("purchase {}", self.id)))
        }
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn invoice_no(&self) -> &str {
        &self.invoice_no
    }

    pub fn invoice_date(&self) -> Option<NaiveDate> {
        self.invoice_date
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn has_returns(&self) -> bool {
        self.lines.iter().any(|l| l.returned_quantity > 0)
    }

    pub fn allocations_for(&self, return_id: Uuid) -> Option<&[ReturnAllocation]> {
        self.returns
            .iter()
            .find(|(id, _)| *id == return_id)
            .map(|(_, a)| a.as_slice())
    }

    /// Original quantity minus everything already returned, across lines.
    pub fn remaining_returnable(&self, variant_id: VariantId) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.variant_id == variant_id)
            .map(PurchaseLine::returnable)
            .sum()
    }

    /// Split a return over the purchase lines, oldest line first.
    pub fn allocate_return(
        &self,
        requests: &[ReturnRequest],
    ) -> Result<Vec<ReturnAllocation>, DomainError> {
        let mut left: Vec<i64> = self.lines.iter().map(PurchaseLine::returnable).collect();
        let mut allocations = Vec::new();

        for req in requests {
            if req.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "return quantity for variant {} must be greater than zero",
                    req.variant_id
                )));
            }
            let available: i64 = self
                .lines
                .iter()
                .zip(&left)
                .filter(|(l, _)| l.variant_id == req.variant_id)
                .map(|(_, n)| *n)
                .sum();
            if !self.lines.iter().any(|l| l.variant_id == req.variant_id) {
                return Err(DomainError::validation(format!(
                    "variant {} is not part of purchase {}",
                    req.variant_id, self.id
                )));
            }
            if req.quantity > available {
                return Err(DomainError::invariant(format!(
                    "return exceeds remaining quantity for variant {}: {} left",
                    req.variant_id, available
                )));
            }

            let mut needed = req.quantity;
            for (i, line) in self.lines.iter().enumerate() {
                if needed == 0 {
                    break;
                }
                if line.variant_id != req.variant_id || left[i] == 0 {
                    continue;
                }
                let take = needed.min(left[i]);
                left[i] -= take;
                needed -= take;
                allocations.push(ReturnAllocation {
                    line_index: i,
                    variant_id: line.variant_id,
                    quantity: take,
                    unit_cost: line.cost_price,
                });
            }
        }
        Ok(allocations)
    }

    pub fn return_credit(allocations: &[ReturnAllocation]) -> Money {
        normalize(
            allocations
                .iter()
                .map(|a| line_total(a.quantity, a.unit_cost))
                .sum(),
        )
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;
    const AGGREGATE_TYPE: &'static str = "purchasing.purchase";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPurchase (header + items, completed in one step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub purchase_id: PurchaseId,
    pub vendor_id: VendorId,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub lines: Vec<PurchaseLineInput>,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchase {
    pub purchase_id: PurchaseId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordReturn. `return_id` is the returning inventory transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturn {
    pub purchase_id: PurchaseId,
    pub return_id: Uuid,
    pub items: Vec<ReturnRequest>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseReturn (the returning transaction was voided).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseReturn {
    pub purchase_id: PurchaseId,
    pub return_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCommand {
    RecordPurchase(RecordPurchase),
    CancelPurchase(CancelPurchase),
    RecordReturn(RecordReturn),
    ReverseReturn(ReverseReturn),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecorded {
    pub purchase_id: PurchaseId,
    pub vendor_id: VendorId,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub lines: Vec<PurchaseLine>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCancelled {
    pub purchase_id: PurchaseId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecorded {
    pub purchase_id: PurchaseId,
    pub return_id: Uuid,
    pub allocations: Vec<ReturnAllocation>,
    pub credit_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReversed {
    pub purchase_id: PurchaseId,
    pub return_id: Uuid,
    pub allocations: Vec<ReturnAllocation>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    PurchaseRecorded(PurchaseRecorded),
    PurchaseCancelled(PurchaseCancelled),
    ReturnRecorded(ReturnRecorded),
    ReturnReversed(ReturnReversed),
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseRecorded(_) => "purchasing.purchase.recorded",
            PurchaseEvent::PurchaseCancelled(_) => "purchasing.purchase.cancelled",
            PurchaseEvent::ReturnRecorded(_) => "purchasing.purchase.return_recorded",
            PurchaseEvent::ReturnReversed(_) => "purchasing.purchase.return_reversed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::PurchaseRecorded(e) => e.occurred_at,
            PurchaseEvent::PurchaseCancelled(e) => e.occurred_at,
            PurchaseEvent::ReturnRecorded(e) => e.occurred_at,
            PurchaseEvent::ReturnReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Purchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::PurchaseRecorded(e) => {
                self.id = e.purchase_id;
                self.vendor_id = Some(e.vendor_id);
                self.invoice_no = e.invoice_no.clone();
                self.invoice_date = Some(e.invoice_date);
                self.lines = e.lines.clone();
                self.subtotal = e.subtotal;
                self.discount_amount = e.discount_amount;
                self.tax_amount = e.tax_amount;
                self.total_amount = e.total_amount;
                self.status = e.status;
                self.notes = e.notes.clone();
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseEvent::PurchaseCancelled(e) => {
                self.status = PurchaseStatus::Cancelled;
                self.cancel_reason = Some(e.reason.clone());
            }
            PurchaseEvent::ReturnRecorded(e) => {
                for a in &e.allocations {
                    if let Some(line) = self.lines.get_mut(a.line_index) {
                        line.returned_quantity += a.quantity;
                    }
                }
                self.returns.push((e.return_id, e.allocations.clone()));
            }
            PurchaseEvent::ReturnReversed(e) => {
                for a in &e.allocations {
                    if let Some(line) = self.lines.get_mut(a.line_index) {
                        line.returned_quantity -= a.quantity;
                    }
                }
                self.returns.retain(|(id, _)| *id != e.return_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseCommand::RecordPurchase(cmd) => self.handle_record(cmd),
            PurchaseCommand::CancelPurchase(cmd) => self.handle_cancel(cmd),
            PurchaseCommand::RecordReturn(cmd) => self.handle_return(cmd),
            PurchaseCommand::ReverseReturn(cmd) => self.handle_reverse_return(cmd),
        }
    }
}

impl Purchase {
    fn ensure_completed(&self) -> Result<(), DomainError> {
        self.ensure_exists()?;
        if self.status != PurchaseStatus::Completed {
            return Err(DomainError::validation(format!(
                "purchase {} is not completed",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordPurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("at least one item is required"));
        }
        if cmd.invoice_no.trim().is_empty() {
            return Err(DomainError::validation("invoice_no cannot be empty"));
        }
        ensure_non_negative("discount_amount", cmd.discount_amount)?;
        ensure_non_negative("tax_amount", cmd.tax_amount)?;

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for input in &cmd.lines {
            if input.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for variant {} must be greater than zero",
                    input.variant_id
                )));
            }
            ensure_non_negative("cost_price", input.cost_price)?;
            let cost_price = normalize(input.cost_price);
            lines.push(PurchaseLine {
                variant_id: input.variant_id,
                product_name: input.product_name.clone(),
                variant_name: input.variant_name.clone(),
                sku: input.sku.clone(),
                quantity: input.quantity,
                cost_price,
                line_total: line_total(input.quantity, cost_price),
                returned_quantity: 0,
            });
        }

        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
        let discount_amount = normalize(cmd.discount_amount);
        let tax_amount = normalize(cmd.tax_amount);
        let total_amount = subtotal - discount_amount + tax_amount;
        if total_amount < Money::ZERO {
            return Err(DomainError::validation(format!(
                "discount {discount_amount} exceeds subtotal plus tax"
            )));
        }
        // Every purchase posts exactly one debit; a zero debit is not an entry.
        if total_amount == Money::ZERO {
            return Err(DomainError::validation("purchase total must be greater than zero"));
        }

        Ok(vec![PurchaseEvent::PurchaseRecorded(PurchaseRecorded {
            purchase_id: cmd.purchase_id,
            vendor_id: cmd.vendor_id,
            invoice_no: cmd.invoice_no.trim().to_string(),
            invoice_date: cmd.invoice_date,
            lines,
            subtotal,
            discount_amount,
            tax_amount,
            total_amount,
            status: PurchaseStatus::Completed,
            notes: cmd.notes.clone(),
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_completed()?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation requires a reason"));
        }
        if self.has_returns() {
            return Err(DomainError::validation(format!(
                "purchase {} has recorded returns; void them before cancelling",
                self.id
            )));
        }

        Ok(vec![PurchaseEvent::PurchaseCancelled(PurchaseCancelled {
            purchase_id: cmd.purchase_id,
            reason: cmd.reason.trim().to_string(),
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return(&self, cmd: &RecordReturn) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_completed()?;
        if cmd.items.is_empty() {
            return Err(DomainError::validation("at least one item is required"));
        }
        if self.allocations_for(cmd.return_id).is_some() {
            return Err(DomainError::conflict(format!(
                "return {} is already recorded",
                cmd.return_id
            )));
        }

        let allocations = self.allocate_return(&cmd.items)?;
        let credit_amount = Self::return_credit(&allocations);
        Ok(vec![PurchaseEvent::ReturnRecorded(ReturnRecorded {
            purchase_id: cmd.purchase_id,
            return_id: cmd.return_id,
            allocations,
            credit_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse_return(
        &self,
        cmd: &ReverseReturn,
    ) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_exists()?;
        let allocations = self.allocations_for(cmd.return_id).ok_or_else(|| {
            DomainError::not_found(format!(
                "return {} on purchase {}",
                cmd.return_id, self.id
            ))
        })?;

        Ok(vec![PurchaseEvent::ReturnReversed(ReturnReversed {
            purchase_id: cmd.purchase_id,
            return_id: cmd.return_id,
            allocations: allocations.to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(variant_id: VariantId, quantity: i64, cost_price: Money) -> PurchaseLineInput {
        PurchaseLineInput {
            variant_id,
            product_name: "Olive Oil".into(),
            variant_name: "1L".into(),
            sku: "OIL-1L".into(),
            quantity,
            cost_price,
        }
    }

    fn record(lines: Vec<PurchaseLineInput>, discount: Money, tax: Money) -> RecordPurchase {
        RecordPurchase {
            purchase_id: PurchaseId::generate(),
            vendor_id: VendorId::generate(),
            invoice_no: "INV-77".into(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            lines,
            discount_amount: discount,
            tax_amount: tax,
            notes: None,
            created_by: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    fn recorded(cmd: RecordPurchase) -> Purchase {
        let mut purchase = Purchase::empty(cmd.purchase_id);
        let events = purchase
            .handle(&PurchaseCommand::RecordPurchase(cmd))
            .unwrap();
        purchase.apply(&events[0]);
        purchase
    }

    #[test]
    fn total_is_subtotal_minus_discount_plus_tax() {
        let v = VariantId::generate();
        let purchase = recorded(record(vec![line(v, 10, dec!(50))], dec!(20), dec!(15)));
        assert_eq!(purchase.subtotal(), dec!(500));
        assert_eq!(purchase.total_amount(), dec!(495));
        assert_eq!(purchase.status(), PurchaseStatus::Completed);
        assert_eq!(purchase.lines()[0].line_total, dec!(500));
    }

    #[test]
    fn invalid_purchases_are_rejected() {
        let v = VariantId::generate();
        for cmd in [
            record(vec![], dec!(0), dec!(0)),
            record(vec![line(v, 0, dec!(1))], dec!(0), dec!(0)),
            record(vec![line(v, 1, dec!(-1))], dec!(0), dec!(0)),
            record(vec![line(v, 1, dec!(10))], dec!(11), dec!(0)),
            record(vec![line(v, 1, dec!(10))], dec!(-1), dec!(0)),
            record(vec![line(v, 4, dec!(0))], dec!(0), dec!(0)),
            record(vec![line(v, 1, dec!(10))], dec!(10), dec!(0)),
        ] {
            let err = Purchase::empty(cmd.purchase_id)
                .handle(&PurchaseCommand::RecordPurchase(cmd))
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
        }
    }

    #[test]
    fn returns_allocate_across_lines_and_are_bounded() {
        let v = VariantId::generate();
        let mut purchase = recorded(record(
            vec![line(v, 3, dec!(10)), line(v, 2, dec!(12))],
            dec!(0),
            dec!(0),
        ));
        let purchase_id = *purchase.id();

        let events = purchase
            .handle(&PurchaseCommand::RecordReturn(RecordReturn {
                purchase_id,
                return_id: Uuid::now_v7(),
                items: vec![ReturnRequest {
                    variant_id: v,
                    quantity: 4,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            PurchaseEvent::ReturnRecorded(e) => {
                assert_eq!(e.allocations.len(), 2);
                assert_eq!(e.credit_amount, dec!(42));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        purchase.apply(&events[0]);
        assert_eq!(purchase.remaining_returnable(v), 1);

        let err = purchase
            .handle(&PurchaseCommand::RecordReturn(RecordReturn {
                purchase_id,
                return_id: Uuid::now_v7(),
                items: vec![ReturnRequest {
                    variant_id: v,
                    quantity: 2,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err.kind(), "integrity_error");
        assert!(err.message().contains("1 left"));
    }

    #[test]
    fn reversing_a_return_restores_returnable_quantity() {
        let v = VariantId::generate();
        let mut purchase = recorded(record(vec![line(v, 5, dec!(10))], dec!(0), dec!(0)));
        let purchase_id = *purchase.id();
        let return_id = Uuid::now_v7();

        let events = purchase
            .handle(&PurchaseCommand::RecordReturn(RecordReturn {
                purchase_id,
                return_id,
                items: vec![ReturnRequest {
                    variant_id: v,
                    quantity: 5,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        purchase.apply(&events[0]);
        assert_eq!(purchase.remaining_returnable(v), 0);

        let events = purchase
            .handle(&PurchaseCommand::ReverseReturn(ReverseReturn {
                purchase_id,
                return_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        purchase.apply(&events[0]);
        assert_eq!(purchase.remaining_returnable(v), 5);
        assert!(!purchase.has_returns());
    }

    #[test]
    fn cancel_requires_completed_purchase_without_returns() {
        let v = VariantId::generate();
        let mut purchase = recorded(record(vec![line(v, 5, dec!(10))], dec!(0), dec!(0)));
        let purchase_id = *purchase.id();

        let events = purchase
            .handle(&PurchaseCommand::CancelPurchase(CancelPurchase {
                purchase_id,
                reason: "wrong vendor".into(),
                cancelled_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        purchase.apply(&events[0]);
        assert_eq!(purchase.status(), PurchaseStatus::Cancelled);

        let err = purchase
            .handle(&PurchaseCommand::RecordReturn(RecordReturn {
                purchase_id,
                return_id: Uuid::now_v7(),
                items: vec![ReturnRequest {
                    variant_id: v,
                    quantity: 1,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(err.message().contains("not completed"));
    }

    #[test]
    fn generated_invoice_number_has_date_and_short_id() {
        let id = PurchaseId::generate();
        let no = format_purchase_invoice_no(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), id);
        assert!(no.starts_with("PUR-20240229-"));
        assert_eq!(no.len(), "PUR-20240229-".len() + 8);
    }

    proptest! {
        /// Property: any accepted purchase satisfies
        /// `total = subtotal - discount + tax` with `subtotal = Σ line_total`.
        #[test]
        fn totals_follow_the_invoice_formula(
            lines in prop::collection::vec((1i64..500, 0i64..100_000), 1..8),
            discount_cents in 0i64..50_000,
            tax_cents in 0i64..50_000,
        ) {
            let v = VariantId::generate();
            let inputs: Vec<PurchaseLineInput> = lines
                .iter()
                .map(|(quantity, cents)| line(v, *quantity, Money::new(*cents, 2)))
                .collect();
            let subtotal: Money = lines
                .iter()
                .map(|(quantity, cents)| Money::from(*quantity) * Money::new(*cents, 2))
                .sum();
            let discount = Money::new(discount_cents, 2);
            let tax = Money::new(tax_cents, 2);

            let cmd = record(inputs, discount, tax);
            let result = Purchase::empty(cmd.purchase_id).handle(&PurchaseCommand::RecordPurchase(cmd));

            match result {
                Ok(events) => {
                    let PurchaseEvent::PurchaseRecorded(e) = &events[0] else {
                        panic!("unexpected event: {:?}", events[0]);
                    };
                    prop_assert_eq!(e.subtotal, subtotal);
                    prop_assert_eq!(e.total_amount, subtotal - discount + tax);
                    prop_assert!(e.total_amount > Money::ZERO);
                }
                Err(err) => {
                    prop_assert_eq!(err.kind(), "validation_error");
                    prop_assert!(subtotal - discount + tax <= Money::ZERO);
                }
            }
        }
    }
}
