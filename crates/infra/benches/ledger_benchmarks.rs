use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use stockledger_core::{AggregateId, TenantId, UserId};
use stockledger_infra::event_store::InMemoryEventStore;
use stockledger_infra::ledger::{NewMovement, NewProduct, NewSale, SaleLineDraft};
use stockledger_infra::{RequestContext, StockLedger};
use stockledger_inventory::ProductId;
use stockledger_movements::{MovementLineInput, SupplierId};

type Ledger = StockLedger<Arc<InMemoryEventStore>>;

fn setup() -> (Ledger, RequestContext) {
    let ledger = StockLedger::new(Arc::new(InMemoryEventStore::new()), 3);
    let ctx = RequestContext::new(TenantId::new(), UserId::new());
    (ledger, ctx)
}

fn register(ledger: &Ledger, ctx: RequestContext, name: String, stock: i64) -> ProductId {
    ledger
        .register_product(
            ctx,
            NewProduct {
                name,
                warehouse_id: None,
                price: dec!(12.50),
                discount: Decimal::ZERO,
                initial_stock: stock,
            },
        )
        .unwrap()
        .id_typed()
}

fn draft(product_id: ProductId, quantity: i64) -> SaleLineDraft {
    SaleLineDraft {
        product_id,
        quantity,
        unit_price: None,
        discount: None,
    }
}

/// Latency of the hot path: one line added to a pending sale.
fn bench_sale_line_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("sale_line_latency");

    group.bench_function("create_sale_line_item", |b| {
        let (ledger, ctx) = setup();
        let product = register(&ledger, ctx, "Bench".to_string(), i64::MAX / 2);

        b.iter(|| {
            let sale = ledger.create_sale(ctx, NewSale::default()).unwrap();
            ledger
                .create_sale_line_item(ctx, sale.id_typed(), black_box(draft(product, 1)))
                .unwrap();
        });
    });

    group.bench_function("create_and_cancel_sale", |b| {
        let (ledger, ctx) = setup();
        let product = register(&ledger, ctx, "Bench".to_string(), 10);

        b.iter(|| {
            let sale = ledger
                .create_sale(
                    ctx,
                    NewSale {
                        lines: vec![draft(product, 10)],
                        ..NewSale::default()
                    },
                )
                .unwrap();
            ledger.cancel_sale(ctx, black_box(sale.id_typed())).unwrap();
        });
    });

    group.finish();
}

/// Accepting a movement touches every product on it in one commit.
fn bench_movement_accept(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_accept");

    for line_count in [1usize, 10, 50].iter() {
        group.throughput(Throughput::Elements(*line_count as u64));
        group.bench_with_input(
            BenchmarkId::new("accept_incoming", line_count),
            line_count,
            |b, &count| {
                let (ledger, ctx) = setup();
                let products: Vec<ProductId> = (0..count)
                    .map(|i| register(&ledger, ctx, format!("Product {i}"), 0))
                    .collect();
                let lines: Vec<MovementLineInput> = products
                    .iter()
                    .map(|p| MovementLineInput {
                        line_no: None,
                        product_id: *p,
                        quantity: 5,
                        unit_value: dec!(1.00),
                        color: None,
                    })
                    .collect();

                b.iter(|| {
                    let movement = ledger
                        .create_movement(
                            ctx,
                            NewMovement {
                                supplier_id: Some(SupplierId::new(AggregateId::new())),
                                lines: lines.clone(),
                                ..NewMovement::default()
                            },
                        )
                        .unwrap();
                    ledger.accept_movement(ctx, movement.id_typed()).unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Every operation rehydrates from the stream, so long product histories
/// cost on every load.
fn bench_product_rehydration(c: &mut Criterion) {
    let mut group = c.benchmark_group("product_rehydration");

    for history in [10usize, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("load_product", history),
            history,
            |b, &count| {
                let (ledger, ctx) = setup();
                let product = register(&ledger, ctx, "Busy".to_string(), count as i64);
                for _ in 0..count {
                    ledger
                        .create_sale(
                            ctx,
                            NewSale {
                                lines: vec![draft(product, 1)],
                                ..NewSale::default()
                            },
                        )
                        .unwrap();
                }

                b.iter(|| {
                    let loaded = ledger.product(ctx, black_box(product)).unwrap();
                    assert_eq!(loaded.stock(), 0);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sale_line_latency,
    bench_movement_accept,
    bench_product_rehydration
);
criterion_main!(benches);
