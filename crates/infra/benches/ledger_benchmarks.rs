use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use stockledger_auth::Principal;
use stockledger_core::{Money, UserId};
use stockledger_infra::StockLedger;
use stockledger_infra::services::{
    CreatePurchaseRequest, PurchaseItemRequest, RegisterVariantRequest, RegisterVendorRequest,
};
use stockledger_inventory::VariantId;
use stockledger_vendors::VendorId;

fn seeded() -> (StockLedger, Principal, VendorId, VariantId) {
    let ledger = StockLedger::in_memory();
    let admin = Principal::admin(UserId::new());
    let vendor = ledger
        .register_vendor(
            RegisterVendorRequest {
                name: "Bench Vendor".to_string(),
                contact: None,
                vendor_id: None,
            },
            &admin,
        )
        .unwrap()
        .vendor_id;
    let variant = ledger
        .register_variant(
            RegisterVariantRequest {
                product_name: "Widget".to_string(),
                variant_name: "Default".to_string(),
                sku: "WID-1".to_string(),
                cost_price: dec!(4.50),
                opening_stock: 0,
                variant_id: None,
            },
            &admin,
        )
        .unwrap()
        .variant_id;
    (ledger, admin, vendor, variant)
}

fn purchase(vendor_id: VendorId, variant_id: VariantId) -> CreatePurchaseRequest {
    CreatePurchaseRequest {
        vendor_id,
        items: vec![PurchaseItemRequest {
            variant_id,
            quantity: 3,
            cost_price: dec!(4.50),
        }],
        invoice_no: None,
        invoice_date: None,
        discount_amount: Money::ZERO,
        tax_amount: Money::ZERO,
        notes: None,
        idempotency_key: None,
    }
}

fn bench_record_purchase(c: &mut Criterion) {
    let (ledger, admin, vendor, variant) = seeded();
    c.bench_function("record_purchase", |b| {
        b.iter(|| black_box(ledger.create_purchase(purchase(vendor, variant), &admin).unwrap()))
    });
}

/// Full read model rebuild over a vendor with `n` purchases on its ledger.
fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild_read_models");
    for n in [100u64, 1_000] {
        let (ledger, admin, vendor, variant) = seeded();
        for _ in 0..n {
            ledger.create_purchase(purchase(vendor, variant), &admin).unwrap();
        }
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(ledger.rebuild_read_models().unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_record_purchase, bench_rebuild);
criterion_main!(benches);
