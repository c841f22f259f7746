//! Integration tests for the full ledger pipeline.
//!
//! Tests: operation → unit of work → aggregates → EventStore commit → reload
//!
//! Verifies:
//! - Stock moves exactly once per state transition
//! - Totals match their lines after every mutation
//! - Failed operations leave every product untouched
//! - Tenant isolation and concurrent writers

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use stockledger_core::money::MAX_AMOUNT;
    use stockledger_core::{DomainError, TenantId, UserId};
    use stockledger_inventory::{ProductId, WarehouseId};
    use stockledger_movements::{MovementId, MovementLineInput, MovementStatus, SupplierId};
    use stockledger_sales::{PaymentMethod, PaymentStatus, SaleId, SaleStatus};

    use crate::event_store::{EventFilter, InMemoryEventStore, Pagination};
    use crate::ledger::{
        LedgerError, MovementRevision, NewMovement, NewPayment, NewProduct, NewSale,
        RequestContext, SaleLineDraft, SaleLinePatch, StockLedger,
    };

    type Ledger = StockLedger<Arc<InMemoryEventStore>>;

    fn setup() -> Ledger {
        StockLedger::new(Arc::new(InMemoryEventStore::new()), 3)
    }

    fn ctx() -> RequestContext {
        RequestContext::new(TenantId::new(), UserId::new())
    }

    fn product(ledger: &Ledger, ctx: RequestContext, name: &str, stock: i64) -> ProductId {
        ledger
            .register_product(
                ctx,
                NewProduct {
                    name: name.to_string(),
                    warehouse_id: None,
                    price: dec!(10.00),
                    discount: Decimal::ZERO,
                    initial_stock: stock,
                },
            )
            .unwrap()
            .id_typed()
    }

    fn stock(ledger: &Ledger, ctx: RequestContext, product_id: ProductId) -> i64 {
        ledger.product(ctx, product_id).unwrap().stock()
    }

    fn draft(product_id: ProductId, quantity: i64) -> SaleLineDraft {
        SaleLineDraft {
            product_id,
            quantity,
            unit_price: None,
            discount: None,
        }
    }

    fn movement_line(product_id: ProductId, quantity: i64) -> MovementLineInput {
        MovementLineInput {
            line_no: None,
            product_id,
            quantity,
            unit_value: dec!(2.00),
            color: None,
        }
    }

    fn movement(
        ledger: &Ledger,
        ctx: RequestContext,
        incoming: bool,
        lines: Vec<MovementLineInput>,
    ) -> MovementId {
        ledger
            .create_movement(
                ctx,
                NewMovement {
                    supplier_id: incoming.then(|| SupplierId::new(stockledger_core::AggregateId::new())),
                    transport_cost: dec!(5.00),
                    lines,
                    ..NewMovement::default()
                },
            )
            .unwrap()
            .id_typed()
    }

    fn sale(ledger: &Ledger, ctx: RequestContext, lines: Vec<SaleLineDraft>) -> SaleId {
        ledger
            .create_sale(
                ctx,
                NewSale {
                    user_id: Some(ctx.actor),
                    lines,
                    ..NewSale::default()
                },
            )
            .unwrap()
            .id_typed()
    }

    fn is_insufficient(err: &LedgerError) -> bool {
        matches!(err, LedgerError::Domain(DomainError::InsufficientStock { .. }))
    }

    #[test]
    fn accepting_incoming_movement_adds_stock_exactly_once() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Tela", 4);
        let m = movement(&ledger, ctx, true, vec![movement_line(p, 10)]);

        assert_eq!(stock(&ledger, ctx, p), 4, "pending movements do not touch stock");

        let accepted = ledger.accept_movement(ctx, m).unwrap();
        assert_eq!(accepted.status(), MovementStatus::Accepted);
        assert_eq!(stock(&ledger, ctx, p), 14);

        let err = ledger.accept_movement(ctx, m).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InvalidStateTransition { .. })
        ));
        assert_eq!(stock(&ledger, ctx, p), 14);
    }

    #[test]
    fn deleting_accepted_movement_reverses_exactly_what_it_applied() {
        let ledger = setup();
        let ctx = ctx();
        let a = product(&ledger, ctx, "Boton", 0);
        let b = product(&ledger, ctx, "Hilo", 3);

        let incoming = movement(&ledger, ctx, true, vec![movement_line(a, 6), movement_line(b, 2)]);
        ledger.accept_movement(ctx, incoming).unwrap();
        assert_eq!((stock(&ledger, ctx, a), stock(&ledger, ctx, b)), (6, 5));

        ledger.delete_movement(ctx, incoming).unwrap();
        assert_eq!((stock(&ledger, ctx, a), stock(&ledger, ctx, b)), (0, 3));

        let outgoing = movement(&ledger, ctx, false, vec![movement_line(b, 3)]);
        ledger.accept_movement(ctx, outgoing).unwrap();
        assert_eq!(stock(&ledger, ctx, b), 0);
        ledger.delete_movement(ctx, outgoing).unwrap();
        assert_eq!(stock(&ledger, ctx, b), 3);

        assert!(matches!(
            ledger.movement(ctx, outgoing),
            Err(LedgerError::Domain(DomainError::NotFound))
        ));
    }

    #[test]
    fn deleting_incoming_movement_whose_stock_was_sold_is_refused() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Cierre", 0);
        let m = movement(&ledger, ctx, true, vec![movement_line(p, 5)]);
        ledger.accept_movement(ctx, m).unwrap();
        sale(&ledger, ctx, vec![draft(p, 4)]);

        let err = ledger.delete_movement(ctx, m).unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(stock(&ledger, ctx, p), 1);
        assert_eq!(ledger.movement(ctx, m).unwrap().status(), MovementStatus::Accepted);
    }

    #[test]
    fn rejected_and_pending_movements_delete_without_stock_changes() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Aguja", 2);

        let rejected = movement(&ledger, ctx, true, vec![movement_line(p, 9)]);
        ledger.reject_movement(ctx, rejected).unwrap();
        assert!(ledger.accept_movement(ctx, rejected).is_err());
        ledger.delete_movement(ctx, rejected).unwrap();

        let pending = movement(&ledger, ctx, false, vec![movement_line(p, 9)]);
        ledger.delete_movement(ctx, pending).unwrap();

        assert_eq!(stock(&ledger, ctx, p), 2);
        assert!(ledger.movements(ctx).unwrap().is_empty());
    }

    #[test]
    fn failed_outgoing_movement_leaves_every_product_unchanged() {
        let ledger = setup();
        let ctx = ctx();
        let plenty = product(&ledger, ctx, "Plenty", 50);
        let scarce = product(&ledger, ctx, "Scarce", 1);
        let m = movement(
            &ledger,
            ctx,
            false,
            vec![movement_line(plenty, 10), movement_line(scarce, 2)],
        );

        let err = ledger.accept_movement(ctx, m).unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(stock(&ledger, ctx, plenty), 50);
        assert_eq!(stock(&ledger, ctx, scarce), 1);
        assert_eq!(ledger.movement(ctx, m).unwrap().status(), MovementStatus::Pending);
    }

    #[test]
    fn cancelling_a_sale_restores_all_line_quantities() {
        let ledger = setup();
        let ctx = ctx();
        let a = product(&ledger, ctx, "Camisa", 10);
        let b = product(&ledger, ctx, "Pantalon", 5);
        let s = sale(&ledger, ctx, vec![draft(a, 3), draft(b, 5)]);
        assert_eq!((stock(&ledger, ctx, a), stock(&ledger, ctx, b)), (7, 0));

        let cancelled = ledger.cancel_sale(ctx, s).unwrap();
        assert_eq!(cancelled.status(), SaleStatus::Cancelled);
        assert_eq!((stock(&ledger, ctx, a), stock(&ledger, ctx, b)), (10, 5));

        let journal_len = ledger.store().journal_len();
        ledger.cancel_sale(ctx, s).unwrap();
        assert_eq!(ledger.store().journal_len(), journal_len);
        assert_eq!((stock(&ledger, ctx, a), stock(&ledger, ctx, b)), (10, 5));

        ledger.delete_sale(ctx, s).unwrap();
        assert_eq!((stock(&ledger, ctx, a), stock(&ledger, ctx, b)), (10, 5));
    }

    #[test]
    fn completed_sale_can_still_be_cancelled() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Falda", 4);
        let s = sale(&ledger, ctx, vec![draft(p, 4)]);

        ledger.complete_sale(ctx, s).unwrap();
        let err = ledger
            .create_sale_line_item(ctx, s, draft(product(&ledger, ctx, "Otro", 1), 1))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InvariantViolation(_))
        ));

        ledger.cancel_sale(ctx, s).unwrap();
        assert_eq!(stock(&ledger, ctx, p), 4);
    }

    #[test]
    fn line_item_mutations_move_stock_by_their_delta() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Media", 10);
        let s = sale(&ledger, ctx, vec![]);

        let with_line = ledger.create_sale_line_item(ctx, s, draft(p, 4)).unwrap();
        let line_no = with_line.lines()[0].line_no;
        assert_eq!(stock(&ledger, ctx, p), 6);
        assert_eq!(with_line.total(), dec!(40.00));

        let patch = |quantity| SaleLinePatch {
            quantity: Some(quantity),
            ..SaleLinePatch::default()
        };
        ledger.update_sale_line_item(ctx, s, line_no, patch(7)).unwrap();
        assert_eq!(stock(&ledger, ctx, p), 3);

        let err = ledger.update_sale_line_item(ctx, s, line_no, patch(11)).unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(stock(&ledger, ctx, p), 3);

        let updated = ledger.update_sale_line_item(ctx, s, line_no, patch(2)).unwrap();
        assert_eq!(stock(&ledger, ctx, p), 8);
        assert_eq!(updated.total(), dec!(20.00));

        let emptied = ledger.delete_sale_line_item(ctx, s, line_no).unwrap();
        assert_eq!(stock(&ledger, ctx, p), 10);
        assert_eq!(emptied.total(), Decimal::ZERO);
    }

    #[test]
    fn sale_total_tracks_its_lines() {
        let ledger = setup();
        let ctx = ctx();
        let a = product(&ledger, ctx, "A", 100);
        let b = product(&ledger, ctx, "B", 100);
        let s = sale(&ledger, ctx, vec![]);

        ledger
            .create_sale_line_item(
                ctx,
                s,
                SaleLineDraft {
                    product_id: a,
                    quantity: 3,
                    unit_price: Some(dec!(19.99)),
                    discount: Some(stockledger_core::Discount::new(dec!(0.15)).unwrap()),
                },
            )
            .unwrap();
        let current = ledger.create_sale_line_item(ctx, s, draft(b, 2)).unwrap();

        let expected: Decimal = current.lines().iter().map(|l| l.subtotal()).sum();
        assert_eq!(current.total(), expected.round_dp(2));
        assert_eq!(current.total(), dec!(70.97));

        let reloaded = ledger.sale(ctx, s).unwrap();
        assert_eq!(reloaded.total(), current.total());
    }

    #[test]
    fn sale_with_an_unfillable_line_is_not_created() {
        let ledger = setup();
        let ctx = ctx();
        let a = product(&ledger, ctx, "Gorra", 5);
        let b = product(&ledger, ctx, "Bufanda", 1);

        let err = ledger
            .create_sale(
                ctx,
                NewSale {
                    lines: vec![draft(a, 2), draft(b, 2)],
                    ..NewSale::default()
                },
            )
            .unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(stock(&ledger, ctx, a), 5);
        assert_eq!(stock(&ledger, ctx, b), 1);
        assert!(ledger.sales(ctx).unwrap().is_empty());
    }

    fn is_validation(err: &LedgerError) -> bool {
        matches!(err, LedgerError::Domain(DomainError::Validation(_)))
    }

    #[test]
    fn oversized_sale_amounts_are_refused_without_side_effects() {
        let ledger = setup();
        let ctx = ctx();

        let err = ledger
            .register_product(
                ctx,
                NewProduct {
                    name: "Lingote".to_string(),
                    warehouse_id: None,
                    price: Decimal::MAX,
                    discount: Decimal::ZERO,
                    initial_stock: 10,
                },
            )
            .unwrap_err();
        assert!(is_validation(&err));

        let p = product(&ledger, ctx, "Lingote", 10);
        let err = ledger
            .create_sale(
                ctx,
                NewSale {
                    lines: vec![SaleLineDraft {
                        unit_price: Some(Decimal::MAX),
                        ..draft(p, 2)
                    }],
                    ..NewSale::default()
                },
            )
            .unwrap_err();
        assert!(is_validation(&err));
        assert_eq!(stock(&ledger, ctx, p), 10);

        // Every price is in range, but the lines together overflow.
        let lines = (0..100)
            .map(|i| {
                let id = ledger
                    .register_product(
                        ctx,
                        NewProduct {
                            name: format!("Bulk {i}"),
                            warehouse_id: None,
                            price: MAX_AMOUNT,
                            discount: Decimal::ZERO,
                            initial_stock: i64::MAX,
                        },
                    )
                    .unwrap()
                    .id_typed();
                draft(id, i64::MAX)
            })
            .collect::<Vec<_>>();
        let err = ledger
            .create_sale(
                ctx,
                NewSale {
                    lines: lines.clone(),
                    ..NewSale::default()
                },
            )
            .unwrap_err();
        assert!(is_validation(&err));
        assert!(lines.iter().all(|l| stock(&ledger, ctx, l.product_id) == i64::MAX));
        assert!(ledger.sales(ctx).unwrap().is_empty());
    }

    #[test]
    fn oversized_movement_amounts_are_refused() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Lingote", 0);

        let err = ledger
            .create_movement(
                ctx,
                NewMovement {
                    supplier_id: Some(SupplierId::new(stockledger_core::AggregateId::new())),
                    lines: vec![MovementLineInput {
                        unit_value: Decimal::MAX,
                        ..movement_line(p, 1000)
                    }],
                    ..NewMovement::default()
                },
            )
            .unwrap_err();
        assert!(is_validation(&err));

        let m = movement(&ledger, ctx, true, vec![movement_line(p, 1000)]);
        let err = ledger
            .revise_movement(
                ctx,
                m,
                MovementRevision {
                    transport_cost: Some(Decimal::MAX),
                    ..MovementRevision::default()
                },
            )
            .unwrap_err();
        assert!(is_validation(&err));
        assert_eq!(ledger.movements(ctx).unwrap().len(), 1);
        assert_eq!(ledger.movement(ctx, m).unwrap().total(), dec!(2005.00));
    }

    #[test]
    fn replacing_lines_is_guarded_against_restored_stock() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Chaqueta", 3);
        let s = sale(&ledger, ctx, vec![draft(p, 3)]);
        assert_eq!(stock(&ledger, ctx, p), 0);

        let replaced = ledger.replace_sale_lines(ctx, s, vec![draft(p, 3)]).unwrap();
        assert_eq!(stock(&ledger, ctx, p), 0);
        assert_eq!(replaced.lines()[0].line_no, 2);

        let err = ledger.replace_sale_lines(ctx, s, vec![draft(p, 4)]).unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(stock(&ledger, ctx, p), 0);
    }

    #[test]
    fn payment_is_recorded_once() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Vestido", 2);
        let s = sale(&ledger, ctx, vec![draft(p, 1)]);
        let payment = NewPayment {
            amount: dec!(10.00),
            method: PaymentMethod::Qr,
            reference: Some("qr-123".to_string()),
            status: PaymentStatus::Completed,
        };

        let paid = ledger.record_payment(ctx, s, payment.clone()).unwrap();
        assert_eq!(paid.payment().map(|p| p.method), Some(PaymentMethod::Qr));
        assert!(matches!(
            ledger.record_payment(ctx, s, payment),
            Err(LedgerError::Domain(DomainError::Conflict(_)))
        ));
    }

    #[test]
    fn movement_revisions_follow_status() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Lana", 0);
        let m = movement(&ledger, ctx, true, vec![movement_line(p, 2)]);

        let revised = ledger
            .revise_movement(
                ctx,
                m,
                MovementRevision {
                    lines: Some(vec![movement_line(p, 8)]),
                    ..MovementRevision::default()
                },
            )
            .unwrap();
        assert_eq!(revised.total(), dec!(21.00));

        ledger.accept_movement(ctx, m).unwrap();
        assert_eq!(stock(&ledger, ctx, p), 8);

        let header_only = ledger
            .revise_movement(
                ctx,
                m,
                MovementRevision {
                    notes: Some("late".to_string()),
                    transport_cost: Some(dec!(0)),
                    ..MovementRevision::default()
                },
            )
            .unwrap();
        assert_eq!(header_only.total(), dec!(16.00));

        let err = ledger
            .revise_movement(
                ctx,
                m,
                MovementRevision {
                    supplier_id: Some(None),
                    ..MovementRevision::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn products_are_unique_per_name_warehouse_and_tenant() {
        let ledger = setup();
        let ctx = ctx();
        product(&ledger, ctx, "Polo", 1);

        let err = ledger
            .register_product(
                ctx,
                NewProduct {
                    name: "Polo".to_string(),
                    warehouse_id: None,
                    price: dec!(1),
                    discount: Decimal::ZERO,
                    initial_stock: 0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::UniqueViolation(_)));

        ledger
            .register_product(
                ctx,
                NewProduct {
                    name: "Polo".to_string(),
                    warehouse_id: Some(WarehouseId::new(stockledger_core::AggregateId::new())),
                    price: dec!(1),
                    discount: Decimal::ZERO,
                    initial_stock: 0,
                },
            )
            .unwrap();
        product(&ledger, RequestContext::new(TenantId::new(), ctx.actor), "Polo", 1);
        assert_eq!(ledger.products(ctx).unwrap().len(), 2);
    }

    #[test]
    fn tenants_cannot_touch_each_others_records() {
        let ledger = setup();
        let alice = ctx();
        let bob = ctx();
        let p = product(&ledger, alice, "Zapato", 5);
        let s = sale(&ledger, alice, vec![draft(p, 1)]);
        let m = movement(&ledger, alice, true, vec![movement_line(p, 1)]);

        let denied = |result: Result<_, LedgerError>| {
            matches!(result, Err(LedgerError::Domain(DomainError::PermissionDenied(_))))
        };
        assert!(denied(ledger.sale(bob, s).map(|_| ())));
        assert!(denied(ledger.cancel_sale(bob, s).map(|_| ())));
        assert!(denied(ledger.accept_movement(bob, m).map(|_| ())));
        assert!(denied(ledger.product(bob, p).map(|_| ())));

        let bobs_sale = sale(&ledger, bob, vec![]);
        assert!(denied(
            ledger.create_sale_line_item(bob, bobs_sale, draft(p, 1)).map(|_| ())
        ));

        assert_eq!(stock(&ledger, alice, p), 4);
        assert!(ledger.sales(bob).unwrap().iter().all(|s| s.id_typed() == bobs_sale));
    }

    #[test]
    fn concurrent_accepts_apply_stock_once() {
        let ledger = Arc::new(setup());
        let ctx = ctx();
        let p = product(&ledger, ctx, "Seda", 0);
        let m = movement(&ledger, ctx, true, vec![movement_line(p, 7)]);

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.accept_movement(ctx, m).is_ok()
                })
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(stock(&ledger, ctx, p), 7);
    }

    #[test]
    fn concurrent_sales_never_oversell() {
        let ledger = Arc::new(StockLedger::new(Arc::new(InMemoryEventStore::new()), 64));
        let ctx = ctx();
        let p = product(&ledger, ctx, "Lino", 5);

        let threads = 12;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.create_sale(
                        ctx,
                        NewSale {
                            lines: vec![draft(p, 1)],
                            ..NewSale::default()
                        },
                    )
                })
            })
            .collect();

        let mut sold = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => sold += 1,
                Err(err) => assert!(is_insufficient(&err), "unexpected error: {err:?}"),
            }
        }

        assert_eq!(sold, 5);
        assert_eq!(stock(&ledger, ctx, p), 0);
    }

    #[test]
    fn activity_lists_the_tenants_journal_newest_first() {
        let ledger = setup();
        let ctx = ctx();
        let p = product(&ledger, ctx, "Cinta", 5);
        let s = sale(&ledger, ctx, vec![draft(p, 2)]);
        product(&ledger, RequestContext::new(TenantId::new(), UserId::new()), "Cinta", 1);

        let page = ledger
            .activity(ctx, &EventFilter::default(), Pagination::default())
            .unwrap();
        // registered, sale created, line added, stock adjusted
        assert_eq!(page.total, 4);
        assert!(page.events.iter().all(|e| e.tenant_id() == ctx.tenant_id));
        assert!(page.events.iter().all(|e| e.actor() == ctx.actor));
        assert!(page.events.windows(2).all(|w| w[0].position() > w[1].position()));

        let sale_only = ledger
            .activity(
                ctx,
                &EventFilter {
                    aggregate_id: Some(s.0),
                    ..EventFilter::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(sale_only.total, 2);
        assert_eq!(sale_only.events[0].event_type(), "sales.sale.line_added");
    }
}
