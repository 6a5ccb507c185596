use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::money::{ensure_positive, normalize};
use stockledger_core::{Aggregate, AggregateRoot, DomainError, Money, UserId, aggregate_id};
use stockledger_events::Event;
use stockledger_vendors::VendorId;

aggregate_id!(PaymentId);

/// `PAY-YYYYMMDD-####`.
pub fn format_payment_no(date: NaiveDate, suffix: u16) -> String {
    format!("PAY-{}-{:04}", date.format("%Y%m%d"), suffix % 10_000)
}

pub fn is_payment_no(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some("PAY"), Some(date), Some(seq), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && date.len() == 8
        && seq.len() == 4
        && seq.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Cheque,
    MobileBanking,
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::MobileBanking => "mobile_banking",
            PaymentMethod::Card => "card",
            PaymentMethod::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
}

/// Aggregate root: Payment (to a vendor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    id: PaymentId,
    recorded: Option<PaymentRecorded>,
    version: u64,
}

impl Payment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PaymentId) -> Self {
        Self {
            id,
            recorded: None,
            version: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.recorded.is_some()
    }

    /// The full payment record once recorded.
    pub fn record(&self) -> Option<&PaymentRecorded> {
        self.recorded.as_ref()
    }
}

impl AggregateRoot for Payment {
    type Id = PaymentId;
    const AGGREGATE_TYPE: &'static str = "purchasing.payment";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPayment.
///
/// `balance_before` is read from the vendor ledger in the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub payment_id: PaymentId,
    pub vendor_id: VendorId,
    pub payment_no: String,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub bank_name: Option<String>,
    pub remarks: Option<String>,
    pub receipt_url: Option<String>,
    pub balance_before: Money,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    RecordPayment(RecordPayment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub payment_id: PaymentId,
    pub vendor_id: VendorId,
    pub payment_no: String,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub bank_name: Option<String>,
    pub remarks: Option<String>,
    pub receipt_url: Option<String>,
    pub balance_before: Money,
    pub balance_after: Money,
    pub status: PaymentStatus,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    PaymentRecorded(PaymentRecorded),
}

impl Event for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRecorded(_) => "purchasing.payment.recorded",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::PaymentRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Payment {
    type Command = PaymentCommand;
    type Event = PaymentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentEvent::PaymentRecorded(e) => {
                self.id = e.payment_id;
                self.recorded = Some(e.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentCommand::RecordPayment(cmd) => self.handle_record(cmd),
        }
    }
}

impl Payment {
    fn handle_record(&self, cmd: &RecordPayment) -> Result<Vec<PaymentEvent>, DomainError> {
        if self.exists() {
            return Err(DomainError::conflict("payment already exists"));
        }
        ensure_positive("amount", cmd.amount)?;
        let amount = normalize(cmd.amount);
        if amount <= Money::ZERO {
            return Err(DomainError::validation("amount rounds to zero"));
        }
        if !is_payment_no(&cmd.payment_no) {
            return Err(DomainError::validation(format!(
                "malformed payment number {}",
                cmd.payment_no
            )));
        }

        // Overpayment is allowed: the balance simply goes negative (advance).
        Ok(vec![PaymentEvent::PaymentRecorded(PaymentRecorded {
            payment_id: cmd.payment_id,
            vendor_id: cmd.vendor_id,
            payment_no: cmd.payment_no.clone(),
            amount,
            payment_method: cmd.payment_method,
            payment_date: cmd.payment_date,
            reference_number: cmd.reference_number.clone(),
            bank_name: cmd.bank_name.clone(),
            remarks: cmd.remarks.clone(),
            receipt_url: cmd.receipt_url.clone(),
            balance_before: cmd.balance_before,
            balance_after: cmd.balance_before - amount,
            status: PaymentStatus::Completed,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn method_names_match_the_wire_format() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::Cheque,
            PaymentMethod::MobileBanking,
            PaymentMethod::Card,
            PaymentMethod::Other,
        ] {
            let wire = serde_json::to_value(method).unwrap();
            assert_eq!(wire.as_str(), Some(method.as_str()));
        }
        assert_eq!(PaymentMethod::BankTransfer.as_str(), "bank_transfer");
    }

    fn cmd(amount: Money, balance_before: Money) -> RecordPayment {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        RecordPayment {
            payment_id: PaymentId::generate(),
            vendor_id: VendorId::generate(),
            payment_no: format_payment_no(date, 42),
            amount,
            payment_method: PaymentMethod::BankTransfer,
            payment_date: date,
            reference_number: Some("TRX-1".into()),
            bank_name: None,
            remarks: None,
            receipt_url: None,
            balance_before,
            created_by: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn payment_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(format_payment_no(date, 42), "PAY-20240603-0042");
        assert!(is_payment_no("PAY-20240603-0042"));
        assert!(!is_payment_no("PAY-20241303-0042"));
        assert!(!is_payment_no("PAY-20240603-42"));
        assert!(!is_payment_no("PUR-20240603-0042"));
    }

    #[test]
    fn overpayment_yields_negative_balance_after() {
        let c = cmd(dec!(1000), dec!(600));
        let events = Payment::empty(c.payment_id)
            .handle(&PaymentCommand::RecordPayment(c))
            .unwrap();
        let PaymentEvent::PaymentRecorded(e) = &events[0];
        assert_eq!(e.balance_after, dec!(-400));
        assert_eq!(e.status, PaymentStatus::Completed);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        for amount in [dec!(0), dec!(-5), dec!(0.001)] {
            let c = cmd(amount, dec!(0));
            let err = Payment::empty(c.payment_id)
                .handle(&PaymentCommand::RecordPayment(c))
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
        }
    }

    #[test]
    fn method_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::MobileBanking).unwrap();
        assert_eq!(json, "\"mobile_banking\"");
    }
}
