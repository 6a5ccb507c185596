//! Purchasing domain module (event-sourced).
//!
//! Purchases (header + items) and vendor payments. Ledger and stock effects
//! are orchestrated by the recorder services; these aggregates only guard
//! their own invariants.

pub mod payment;
pub mod purchase;

pub use payment::{
    Payment, PaymentCommand, PaymentEvent, PaymentId, PaymentMethod, PaymentRecorded,
    PaymentStatus, RecordPayment, format_payment_no, is_payment_no,
};
pub use purchase::{
    CancelPurchase, Purchase, PurchaseCancelled, PurchaseCommand, PurchaseEvent, PurchaseId,
    PurchaseLine, PurchaseLineInput, PurchaseRecorded, PurchaseStatus, RecordPurchase,
    RecordReturn, ReturnAllocation, ReturnRecorded, ReturnRequest, ReturnReversed,
    ReverseReturn, format_purchase_invoice_no,
};
