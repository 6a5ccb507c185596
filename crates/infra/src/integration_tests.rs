//! Integration tests for the full pipeline.
//!
//! Tests: service call → unit of work → EventStore → read models / bus
//!
//! Verifies:
//! - Recorders update stock, ledger and vendor balance together
//! - The maker-checker workflow only moves stock on approval
//! - Failed or conflicting writes leave no trace
//! - Reconciliation and read model rebuilds are idempotent

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use stockledger_auth::Principal;
    use stockledger_core::{Money, UserId};
    use stockledger_inventory::{
        InventoryTransactionId, StockPool, TransactionItemInput, TransactionStatus, TransactionType, VariantId,
    };
    use stockledger_ledger::{EntryType, LedgerEntryId};
    use stockledger_purchasing::{PaymentMethod, PurchaseId, PurchaseStatus, is_payment_no};
    use stockledger_vendors::VendorId;

    use crate::event_store::InMemoryEventStore;
    use crate::services::{
        CreatePurchaseRequest, CreateTransactionRequest, LegacyLedgerRow, PurchaseItemRequest, RecordPaymentRequest,
        RegisterVariantRequest, RegisterVendorRequest, ServiceError, StockLedger, WorkflowConfig,
    };

    struct Fixture {
        ledger: StockLedger,
        admin: Principal,
        staff: Principal,
        vendor: VendorId,
        shirt: VariantId,
        cap: VariantId,
    }

    fn setup() -> Fixture {
        setup_with(StockLedger::in_memory())
    }

    fn setup_with(ledger: StockLedger) -> Fixture {
        let admin = Principal::admin(UserId::new());
        let staff = Principal::staff(UserId::new());

        let vendor = ledger
            .register_vendor(
                RegisterVendorRequest {
                    name: "Acme Textiles".to_string(),
                    contact: None,
                    vendor_id: None,
                },
                &admin,
            )
            .unwrap()
            .vendor_id;
        let shirt = register_variant(&ledger, &admin, "SHIRT-M", dec!(10), 0);
        let cap = register_variant(&ledger, &admin, "CAP-OS", dec!(25), 5);

        Fixture {
            ledger,
            admin,
            staff,
            vendor,
            shirt,
            cap,
        }
    }

    fn register_variant(ledger: &StockLedger, admin: &Principal, sku: &str, cost: Money, opening: i64) -> VariantId {
        ledger
            .register_variant(
                RegisterVariantRequest {
                    product_name: "Apparel".to_string(),
                    variant_name: sku.to_string(),
                    sku: sku.to_string(),
                    cost_price: cost,
                    opening_stock: opening,
                    variant_id: None,
                },
                admin,
            )
            .unwrap()
            .variant_id
    }

    fn purchase(f: &Fixture, items: Vec<(VariantId, i64, Money)>) -> CreatePurchaseRequest {
        CreatePurchaseRequest {
            vendor_id: f.vendor,
            items: items
                .into_iter()
                .map(|(variant_id, quantity, cost_price)| PurchaseItemRequest {
                    variant_id,
                    quantity,
                    cost_price,
                })
                .collect(),
            invoice_no: None,
            invoice_date: None,
            discount_amount: Money::ZERO,
            tax_amount: Money::ZERO,
            notes: None,
            idempotency_key: None,
        }
    }

    fn payment(f: &Fixture, amount: Money) -> RecordPaymentRequest {
        RecordPaymentRequest {
            vendor_id: f.vendor,
            amount,
            payment_method: PaymentMethod::BankTransfer,
            payment_date: None,
            transaction_ref: Some("TRX-1".to_string()),
            bank_name: None,
            remarks: None,
            receipt_url: None,
            idempotency_key: None,
        }
    }

    fn item(variant_id: VariantId, quantity: i64) -> TransactionItemInput {
        TransactionItemInput {
            variant_id,
            quantity,
            unit_cost: None,
            source: StockPool::Fresh,
        }
    }

    fn transaction(kind: TransactionType, items: Vec<TransactionItemInput>) -> CreateTransactionRequest {
        CreateTransactionRequest {
            transaction_type: kind,
            invoice_no: None,
            vendor_id: None,
            reason: None,
            reference_transaction_id: None,
            items,
            idempotency_key: None,
        }
    }

    fn kind_of(err: ServiceError) -> &'static str {
        err.kind()
    }

    /// Shirts 10 × 10 + caps 2 × 25 = 150 owed.
    fn stocked(f: &Fixture) -> PurchaseId {
        f.ledger
            .create_purchase(purchase(f, vec![(f.shirt, 10, dec!(10)), (f.cap, 2, dec!(25))]), &f.staff)
            .unwrap()
            .purchase_id
    }

    #[test]
    fn purchase_moves_stock_and_debits_the_vendor() {
        let f = setup();
        let receipt = f
            .ledger
            .create_purchase(purchase(&f, vec![(f.shirt, 10, dec!(10)), (f.cap, 2, dec!(25))]), &f.staff)
            .unwrap();

        assert_eq!(receipt.total_amount, dec!(150));
        assert_eq!(receipt.items_count, 2);
        assert!(receipt.invoice_no.starts_with("PUR-"));
        assert!(!receipt.replayed);

        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 10);
        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 7);

        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        assert_eq!(account.balance, dec!(150));
        assert_eq!(account.total_purchases, dec!(150));
        assert_eq!(account.purchase_count, 1);

        let page = f.ledger.vendor_transactions(f.vendor, None, None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].debit, dec!(150));
        assert_eq!(page.entries[0].running_balance, dec!(150));
        assert_eq!(page.entries[0].entry_type, EntryType::Purchase);

        let view = f.ledger.purchase(receipt.purchase_id).unwrap();
        assert_eq!(view.status, PurchaseStatus::Completed);
        assert_eq!(view.items[0].sku, "SHIRT-M");

        assert!(f.ledger.verify_vendor(f.vendor).unwrap().consistent);
    }

    #[test]
    fn failed_purchase_leaves_no_trace() {
        let f = setup();
        let unknown = VariantId::generate();

        let err = f
            .ledger
            .create_purchase(purchase(&f, vec![(f.shirt, 10, dec!(10)), (unknown, 1, dec!(5))]), &f.staff)
            .unwrap_err();

        assert_eq!(kind_of(err), "not_found");
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 0);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, Money::ZERO);
    }

    #[test]
    fn zero_total_purchase_is_rejected() {
        let f = setup();

        let err = f
            .ledger
            .create_purchase(purchase(&f, vec![(f.shirt, 5, Money::ZERO)]), &f.staff)
            .unwrap_err();

        assert_eq!(kind_of(err), "validation_error");
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 0);
        assert!(f.ledger.vendor_purchases(f.vendor).is_empty());
        assert_eq!(f.ledger.vendor_transactions(f.vendor, None, None).unwrap().total, 0);
    }

    #[test]
    fn payment_credits_the_ledger_and_reports_balances() {
        let f = setup();
        stocked(&f);

        let receipt = f.ledger.record_payment(payment(&f, dec!(50)), &f.staff).unwrap();

        assert!(is_payment_no(&receipt.payment_no));
        assert_eq!(receipt.balance_before, dec!(150));
        assert_eq!(receipt.new_balance, dec!(100));

        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        assert_eq!(account.balance, dec!(100));
        assert_eq!(account.total_payments, dec!(50));
        assert_eq!(account.payment_count, 1);
        assert!(account.rollup_consistent());

        let recorded = f.ledger.payment(receipt.payment_id).unwrap();
        assert_eq!(recorded.reference_number.as_deref(), Some("TRX-1"));
        assert_eq!(recorded.balance_after, dec!(100));

        let page = f.ledger.vendor_transactions(f.vendor, None, None).unwrap();
        assert_eq!(
            page.entries[0].description.as_deref(),
            Some(format!("Payment {} (bank_transfer)", receipt.payment_no).as_str())
        );
    }

    #[test]
    fn overpayment_leaves_an_advance() {
        let f = setup();
        stocked(&f);

        let receipt = f.ledger.record_payment(payment(&f, dec!(200)), &f.staff).unwrap();

        assert_eq!(receipt.new_balance, dec!(-50));
        assert!(f.ledger.verify_vendor(f.vendor).unwrap().consistent);
    }

    #[test]
    fn payment_to_an_inactive_vendor_is_rejected() {
        let f = setup();
        f.ledger.deactivate_vendor(f.vendor, Some("closed".to_string()), &f.admin).unwrap();

        let err = f.ledger.record_payment(payment(&f, dec!(10)), &f.staff).unwrap_err();
        assert_eq!(kind_of(err), "validation_error");
    }

    #[test]
    fn referenced_return_waits_for_approval_then_credits_purchase_cost() {
        let f = setup();
        let purchase_id = stocked(&f);

        let mut request = transaction(TransactionType::PurchaseReturn, vec![item(f.shirt, 3)]);
        request.vendor_id = Some(f.vendor);
        request.reference_transaction_id = Some(*purchase_id.0.as_uuid());
        let created = f.ledger.create_transaction(request, &f.staff).unwrap();

        assert_eq!(created.status, TransactionStatus::Pending);
        assert!(created.requires_approval);
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 10);
        assert_eq!(f.ledger.pending_transactions().len(), 1);

        let approved = f.ledger.approve_transaction(created.transaction_id, &f.admin).unwrap();

        assert_eq!(approved.status, TransactionStatus::Approved);
        assert_eq!(approved.items[0].stock_before, Some(10));
        assert_eq!(approved.items[0].stock_after, Some(7));
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 7);

        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        assert_eq!(account.balance, dec!(120));
        assert_eq!(account.total_returns, dec!(30));
        assert_eq!(f.ledger.purchase(purchase_id).unwrap().items[0].returned_quantity, 3);
        assert!(f.ledger.pending_transactions().is_empty());
        assert!(f.ledger.verify_vendor(f.vendor).unwrap().consistent);
    }

    #[test]
    fn return_beyond_the_purchased_quantity_is_refused_at_creation() {
        let f = setup();
        let purchase_id = stocked(&f);

        let mut request = transaction(TransactionType::PurchaseReturn, vec![item(f.cap, 3)]);
        request.vendor_id = Some(f.vendor);
        request.reference_transaction_id = Some(*purchase_id.0.as_uuid());

        let err = f.ledger.create_transaction(request, &f.staff).unwrap_err();
        assert_eq!(kind_of(err), "integrity_error");
        assert!(f.ledger.pending_transactions().is_empty());
    }

    #[test]
    fn debit_note_credits_the_stated_cost() {
        let f = setup();
        stocked(&f);

        let mut request = transaction(
            TransactionType::PurchaseReturn,
            vec![TransactionItemInput {
                variant_id: f.cap,
                quantity: 2,
                unit_cost: Some(dec!(12)),
                source: StockPool::Fresh,
            }],
        );
        request.vendor_id = Some(f.vendor);
        let created = f.ledger.create_transaction(request, &f.admin).unwrap();

        assert_eq!(created.status, TransactionStatus::Approved);
        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 5);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(126));

        let page = f.ledger.vendor_transactions(f.vendor, None, None).unwrap();
        let description = page.entries[0].description.as_deref().unwrap();
        assert!(description.starts_with("Debit note TXN-"), "{description}");
    }

    #[test]
    fn damage_by_staff_moves_stock_only_on_approval() {
        let f = setup();
        stocked(&f);

        let mut request = transaction(TransactionType::Damage, vec![item(f.shirt, 3)]);
        request.reason = Some("water damage".to_string());
        let created = f.ledger.create_transaction(request, &f.staff).unwrap();

        assert_eq!(created.status, TransactionStatus::Pending);
        assert!(created.invoice_no.starts_with("TXN-"));
        assert_eq!(f.ledger.variant(f.shirt).unwrap().damaged_stock, 0);

        f.ledger.approve_transaction(created.transaction_id, &f.admin).unwrap();

        let stock = f.ledger.variant(f.shirt).unwrap();
        assert_eq!(stock.current_stock, 7);
        assert_eq!(stock.damaged_stock, 3);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(150));
    }

    #[test]
    fn approval_with_insufficient_stock_changes_nothing() {
        let f = setup();
        stocked(&f);

        let mut request = transaction(TransactionType::Damage, vec![item(f.cap, 1), item(f.shirt, 11)]);
        request.reason = Some("crushed pallet".to_string());
        let created = f.ledger.create_transaction(request, &f.staff).unwrap();

        let err = f.ledger.approve_transaction(created.transaction_id, &f.admin).unwrap_err();

        assert_eq!(kind_of(err), "integrity_error");
        assert_eq!(f.ledger.transaction(created.transaction_id).unwrap().status, TransactionStatus::Pending);
        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 7);
        assert_eq!(f.ledger.variant(f.cap).unwrap().damaged_stock, 0);
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 10);
    }

    #[test]
    fn staff_cannot_approve_or_void() {
        let f = setup();
        stocked(&f);

        let mut request = transaction(TransactionType::Adjustment, vec![item(f.shirt, -2)]);
        request.reason = Some("stock count".to_string());
        let created = f.ledger.create_transaction(request, &f.staff).unwrap();

        let err = f.ledger.approve_transaction(created.transaction_id, &f.staff).unwrap_err();
        assert_eq!(kind_of(err), "unauthorized");
        let err = f
            .ledger
            .void_transaction(created.transaction_id, "mistake", &f.staff)
            .unwrap_err();
        assert_eq!(kind_of(err), "unauthorized");
    }

    #[test]
    fn rejection_needs_a_reason_and_is_final() {
        let f = setup();
        stocked(&f);

        let mut request = transaction(TransactionType::Adjustment, vec![item(f.shirt, 4)]);
        request.reason = Some("found in backroom".to_string());
        let created = f.ledger.create_transaction(request, &f.staff).unwrap();

        let err = f.ledger.reject_transaction(created.transaction_id, " no", &f.admin).unwrap_err();
        assert_eq!(kind_of(err), "validation_error");

        let rejected = f
            .ledger
            .reject_transaction(created.transaction_id, "duplicate count", &f.admin)
            .unwrap();
        assert_eq!(rejected.status, TransactionStatus::Rejected);

        let err = f.ledger.approve_transaction(created.transaction_id, &f.admin).unwrap_err();
        assert_eq!(kind_of(err), "validation_error");
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 10);
    }

    #[test]
    fn damage_and_adjustment_require_a_reason() {
        let f = setup();

        let err = f
            .ledger
            .create_transaction(transaction(TransactionType::Damage, vec![item(f.cap, 1)]), &f.staff)
            .unwrap_err();
        assert_eq!(kind_of(err), "validation_error");
    }

    #[test]
    fn voiding_an_adjustment_restores_stock() {
        let f = setup();

        let mut request = transaction(TransactionType::Adjustment, vec![item(f.cap, -2)]);
        request.reason = Some("cycle count".to_string());
        let created = f.ledger.create_transaction(request, &f.admin).unwrap();
        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 3);

        let voided = f
            .ledger
            .void_transaction(created.transaction_id, "counted twice", &f.admin)
            .unwrap();

        assert_eq!(voided.status, TransactionStatus::Voided);
        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 5);
    }

    #[test]
    fn voiding_a_purchase_transaction_unwinds_purchase_stock_and_ledger() {
        let f = setup();

        let mut request = transaction(
            TransactionType::Purchase,
            vec![TransactionItemInput {
                variant_id: f.shirt,
                quantity: 6,
                unit_cost: Some(dec!(10)),
                source: StockPool::Fresh,
            }],
        );
        request.vendor_id = Some(f.vendor);
        // Purchases skip the approval queue even when a maker enters them.
        let created = f.ledger.create_transaction(request, &f.staff).unwrap();
        assert_eq!(created.status, TransactionStatus::Approved);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(60));

        let purchase_id = PurchaseId::new(created.transaction_id.0);
        let err = f.ledger.cancel_purchase(purchase_id, "wrong vendor", &f.admin).unwrap_err();
        assert_eq!(kind_of(err), "validation_error");

        f.ledger
            .void_transaction(created.transaction_id, "entered twice", &f.admin)
            .unwrap();

        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 0);
        assert_eq!(f.ledger.purchase(purchase_id).unwrap().status, PurchaseStatus::Cancelled);
        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        assert_eq!(account.balance, Money::ZERO);
        assert_eq!(account.purchase_count, 0);
        assert_eq!(f.ledger.vendor_transactions(f.vendor, None, None).unwrap().total, 2);
        assert!(f.ledger.verify_vendor(f.vendor).unwrap().consistent);
    }

    #[test]
    fn voiding_a_return_puts_stock_back_and_reverses_the_credit() {
        let f = setup();
        let purchase_id = stocked(&f);

        let mut request = transaction(TransactionType::PurchaseReturn, vec![item(f.cap, 1)]);
        request.vendor_id = Some(f.vendor);
        request.reference_transaction_id = Some(*purchase_id.0.as_uuid());
        let created = f.ledger.create_transaction(request, &f.admin).unwrap();
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(125));

        f.ledger
            .void_transaction(created.transaction_id, "vendor refused", &f.admin)
            .unwrap();

        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 7);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(150));
        assert_eq!(f.ledger.purchase(purchase_id).unwrap().items[1].returned_quantity, 0);
    }

    #[test]
    fn cancelling_a_purchase_reverses_stock_and_ledger() {
        let f = setup();
        let purchase_id = stocked(&f);

        let err = f.ledger.cancel_purchase(purchase_id, "wrong invoice", &f.staff).unwrap_err();
        assert_eq!(kind_of(err), "unauthorized");

        let receipt = f.ledger.cancel_purchase(purchase_id, "wrong invoice", &f.admin).unwrap();

        assert_eq!(receipt.reversed_amount, dec!(150));
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 0);
        assert_eq!(f.ledger.variant(f.cap).unwrap().current_stock, 5);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, Money::ZERO);

        let err = f.ledger.cancel_purchase(purchase_id, "again", &f.admin).unwrap_err();
        assert_eq!(kind_of(err), "validation_error");
    }

    #[test]
    fn retried_requests_are_recorded_once() {
        let f = setup();
        let key = Uuid::now_v7();

        let mut request = purchase(&f, vec![(f.shirt, 4, dec!(10))]);
        request.idempotency_key = Some(key);
        let first = f.ledger.create_purchase(request.clone(), &f.staff).unwrap();
        let second = f.ledger.create_purchase(request, &f.staff).unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.purchase_id, second.purchase_id);
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 4);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(40));

        let mut pay = payment(&f, dec!(15));
        pay.idempotency_key = Some(Uuid::now_v7());
        let first = f.ledger.record_payment(pay.clone(), &f.staff).unwrap();
        let second = f.ledger.record_payment(pay, &f.staff).unwrap();

        assert!(second.replayed);
        assert_eq!(first.payment_no, second.payment_no);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(25));
    }

    #[test]
    fn reconciliation_removes_duplicates_and_is_idempotent() {
        let f = setup();
        let purchase_ref = Uuid::now_v7();
        let at = Utc.with_ymd_and_hms(2023, 12, 1, 9, 0, 0).unwrap();
        let day = |d: u32| NaiveDate::from_ymd_opt(2023, 12, d).unwrap();
        let row = |entry_type, reference_id, debit, credit, running_balance, date| LegacyLedgerRow {
            id: LedgerEntryId::generate(),
            entry_type,
            reference_id,
            reference_no: None,
            debit,
            credit,
            running_balance,
            description: None,
            performed_by: None,
            transaction_date: date,
            created_at: at,
        };
        let rows = vec![
            row(EntryType::Purchase, purchase_ref, dec!(100), Money::ZERO, dec!(100), day(1)),
            row(EntryType::Purchase, purchase_ref, dec!(100), Money::ZERO, dec!(200), day(1)),
            row(EntryType::Payment, Uuid::now_v7(), Money::ZERO, dec!(40), dec!(999), day(3)),
        ];

        let imported = f.ledger.import_legacy_ledger(f.vendor, rows.clone(), &f.admin).unwrap();
        assert_eq!((imported.imported, imported.skipped), (3, 0));
        let again = f.ledger.import_legacy_ledger(f.vendor, rows, &f.admin).unwrap();
        assert_eq!((again.imported, again.skipped), (0, 3));
        assert!(!f.ledger.verify_vendor(f.vendor).unwrap().consistent);

        let first = f.ledger.reconcile_vendor(f.vendor, &f.admin).unwrap();
        assert_eq!(first.duplicates_removed, 1);
        assert!(first.balances_corrected >= 1);
        assert_eq!(first.account.balance, dec!(60));

        let second = f.ledger.reconcile_vendor(f.vendor, &f.admin).unwrap();
        assert_eq!((second.duplicates_removed, second.balances_corrected), (0, 0));
        assert_eq!(second.account, first.account);
        assert!(f.ledger.verify_vendor(f.vendor).unwrap().consistent);

        let err = f.ledger.reconcile_vendor(f.vendor, &f.staff).unwrap_err();
        assert_eq!(kind_of(err), "unauthorized");
    }

    #[test]
    fn concurrent_payments_never_lose_an_update() {
        let config = WorkflowConfig {
            max_retries: 10,
            ..WorkflowConfig::default()
        };
        let f = setup_with(StockLedger::new(Arc::new(InMemoryEventStore::new()), config));
        stocked(&f);
        let f = Arc::new(f);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = Arc::clone(&f);
                thread::spawn(move || f.ledger.record_payment(payment(&f, dec!(10)), &f.staff))
            })
            .collect();

        let mut succeeded = 0i64;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert_eq!(err.kind(), "conflict"),
            }
        }

        assert!(succeeded > 0);
        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        assert_eq!(account.balance, dec!(150) - Money::from(succeeded * 10));
        assert_eq!(account.payment_count, succeeded);
        assert!(f.ledger.verify_vendor(f.vendor).unwrap().consistent);
    }

    #[test]
    fn rebuilt_read_models_match_the_live_ones() {
        let f = setup();
        let purchase_id = stocked(&f);
        f.ledger.record_payment(payment(&f, dec!(30)), &f.staff).unwrap();
        let mut request = transaction(TransactionType::Damage, vec![item(f.shirt, 2)]);
        request.reason = Some("torn seams".to_string());
        f.ledger.create_transaction(request, &f.admin).unwrap();

        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        let shirt = f.ledger.variant(f.shirt).unwrap();
        let view = f.ledger.purchase(purchase_id).unwrap();

        let report = f.ledger.rebuild_read_models().unwrap();

        assert!(report.events > 0);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap(), account);
        assert_eq!(f.ledger.variant(f.shirt).unwrap(), shirt);
        assert_eq!(f.ledger.purchase(purchase_id).unwrap(), view);
    }

    #[test]
    fn committed_events_are_published_on_the_bus() {
        let f = setup();
        let subscription = f.ledger.subscribe();

        stocked(&f);

        let mut types = Vec::new();
        while let Ok(envelope) = subscription.try_recv() {
            types.push(envelope.event_type().to_string());
        }
        assert_eq!(types.len(), 4);
        assert!(types.iter().any(|t| t == "purchasing.purchase.recorded"));
        assert!(types.iter().any(|t| t == "ledger.entry.posted"));
    }

    #[test]
    fn competing_returns_cannot_overdraw_a_purchase_line() {
        let f = setup();
        let purchase_id = stocked(&f);

        let referenced_return = |quantity| {
            let mut request = transaction(TransactionType::PurchaseReturn, vec![item(f.shirt, quantity)]);
            request.vendor_id = Some(f.vendor);
            request.reference_transaction_id = Some(*purchase_id.0.as_uuid());
            request
        };
        let first = f.ledger.create_transaction(referenced_return(6), &f.staff).unwrap();
        let second = f.ledger.create_transaction(referenced_return(6), &f.staff).unwrap();

        f.ledger.approve_transaction(first.transaction_id, &f.admin).unwrap();
        let err = f.ledger.approve_transaction(second.transaction_id, &f.admin).unwrap_err();

        assert_eq!(err.kind(), "integrity_error");
        assert!(err.to_string().contains("4 left"), "{err}");
        assert_eq!(f.ledger.transaction(second.transaction_id).unwrap().status, TransactionStatus::Pending);
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 4);
        assert_eq!(f.ledger.purchase(purchase_id).unwrap().items[0].returned_quantity, 6);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(90));
    }

    #[test]
    fn admin_referenced_return_is_applied_immediately() {
        let f = setup();
        let purchase_id = stocked(&f);

        let mut request = transaction(TransactionType::PurchaseReturn, vec![item(f.shirt, 3)]);
        request.vendor_id = Some(f.vendor);
        request.reference_transaction_id = Some(*purchase_id.0.as_uuid());
        let created = f.ledger.create_transaction(request, &f.admin).unwrap();

        assert_eq!(created.status, TransactionStatus::Approved);
        assert!(!created.requires_approval);
        assert_eq!(created.items[0].stock_after, Some(7));
        assert_eq!(f.ledger.variant(f.shirt).unwrap().current_stock, 7);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(120));
        assert!(f.ledger.pending_transactions().is_empty());

        let page = f.ledger.vendor_transactions(f.vendor, None, None).unwrap();
        assert_eq!(page.entries[0].description.as_deref(), Some(format!("Purchase return {}", created.invoice_no).as_str()));
    }

    #[test]
    fn return_from_the_damaged_pool_is_limited_to_damaged_stock() {
        let f = setup();
        stocked(&f);

        let mut damage = transaction(TransactionType::Damage, vec![item(f.cap, 1)]);
        damage.reason = Some("torn brim".to_string());
        f.ledger.create_transaction(damage, &f.admin).unwrap();

        let mut request = transaction(
            TransactionType::PurchaseReturn,
            vec![TransactionItemInput {
                variant_id: f.cap,
                quantity: 2,
                unit_cost: Some(dec!(25)),
                source: StockPool::Damaged,
            }],
        );
        request.vendor_id = Some(f.vendor);
        let err = f.ledger.create_transaction(request, &f.admin).unwrap_err();

        assert_eq!(kind_of(err), "integrity_error");
        let cap = f.ledger.variant(f.cap).unwrap();
        assert_eq!(cap.damaged_stock, 1);
        assert_eq!(cap.current_stock, 6);
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(150));
    }

    #[test]
    fn cancelled_purchase_does_not_count_as_purchase_activity() {
        let f = setup();
        let mut request = purchase(&f, vec![(f.shirt, 2, dec!(10))]);
        request.invoice_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        let purchase_id = f.ledger.create_purchase(request, &f.staff).unwrap().purchase_id;

        f.ledger.cancel_purchase(purchase_id, "entered twice", &f.admin).unwrap();

        let account = f.ledger.vendor_summary(f.vendor).unwrap();
        assert_eq!(account.purchase_count, 0);
        assert_eq!(account.last_purchase_date, NaiveDate::from_ymd_opt(2020, 1, 1));

        let report = f.ledger.reconcile_vendor(f.vendor, &f.admin).unwrap();
        assert_eq!(report.account.purchase_count, 0);
        assert_eq!(report.account.last_purchase_date, None);
    }

    #[test]
    fn backdated_payment_keeps_the_chain_consistent() {
        let f = setup();
        stocked(&f);

        let mut request = payment(&f, dec!(40));
        request.payment_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        f.ledger.record_payment(request, &f.staff).unwrap();

        let report = f.ledger.verify_vendor(f.vendor).unwrap();
        assert!(report.consistent, "{:?}", report.violations);

        let page = f.ledger.vendor_transactions(f.vendor, None, None).unwrap();
        let purchase_entry = page.entries.iter().find(|e| e.entry_type == EntryType::Purchase).unwrap();
        assert_eq!(purchase_entry.running_balance, dec!(110));
        assert_eq!(f.ledger.vendor_summary(f.vendor).unwrap().balance, dec!(110));

        let reconciled = f.ledger.reconcile_vendor(f.vendor, &f.admin).unwrap();
        assert_eq!(reconciled.balances_corrected, 0);
    }

    #[test]
    fn unknown_transaction_is_not_found() {
        let f = setup();
        let err = f
            .ledger
            .approve_transaction(InventoryTransactionId::generate(), &f.admin)
            .unwrap_err();
        assert_eq!(kind_of(err), "not_found");
    }
}
