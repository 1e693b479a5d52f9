use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use realty_core::{AggregateId, ExpectedVersion, PartnerId, TenantId, UserId};
use realty_estate::property::ExpectedPriceRevised;
use realty_estate::{
    CreateProperty, OfferId, Property, PropertyCommand, PropertyDetails, PropertyEvent,
    PropertyId, ReceiveOffer, ReviseExpectedPrice,
};
use realty_infra::command_dispatcher::CommandDispatcher;
use realty_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use realty_infra::projections::PROPERTY_AGGREGATE;
use realty_invoicing::{InvoiceLine, Tax, TaxSet, dispatch_negative_lines};
use realty_products::ProductId;

fn create_property(
    dispatcher: &CommandDispatcher<InMemoryEventStore>,
    tenant_id: TenantId,
) -> PropertyId {
    let property_id = PropertyId::new(AggregateId::new());
    let cmd = PropertyCommand::CreateProperty(CreateProperty {
        tenant_id,
        property_id,
        details: PropertyDetails::new(black_box("Bench house"), 100_000),
        salesperson_id: None,
        actor: UserId::new(),
        occurred_at: Utc::now(),
    });
    dispatcher
        .dispatch(tenant_id, property_id.0, PROPERTY_AGGREGATE, &cmd, |id| {
            Property::empty(PropertyId::new(id))
        })
        .unwrap();
    property_id
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");

    group.bench_function("create_property_fresh", |b| {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let tenant_id = TenantId::new();
        b.iter(|| create_property(&dispatcher, tenant_id));
    });

    // Each iteration replays a growing offer history.
    group.bench_function("receive_offer_with_history", |b| {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let tenant_id = TenantId::new();
        let property_id = create_property(&dispatcher, tenant_id);

        b.iter(|| {
            let cmd = PropertyCommand::ReceiveOffer(ReceiveOffer {
                tenant_id,
                property_id,
                offer_id: OfferId::new(AggregateId::new()),
                partner_id: PartnerId::new(),
                price: black_box(95_000),
                validity_days: None,
                occurred_at: Utc::now(),
            });
            dispatcher
                .dispatch(tenant_id, property_id.0, PROPERTY_AGGREGATE, &cmd, |id| {
                    Property::empty(PropertyId::new(id))
                })
                .unwrap();
        });
    });

    group.bench_function("revise_price_no_op", |b| {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let tenant_id = TenantId::new();
        let property_id = create_property(&dispatcher, tenant_id);
        let cmd = PropertyCommand::ReviseExpectedPrice(ReviseExpectedPrice {
            tenant_id,
            property_id,
            expected_price: 100_000,
            occurred_at: Utc::now(),
        });

        b.iter(|| {
            dispatcher
                .dispatch(tenant_id, property_id.0, PROPERTY_AGGREGATE, black_box(&cmd), |id| {
                    Property::empty(PropertyId::new(id))
                })
                .unwrap()
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1usize, 10, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            &batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let property_id = PropertyId::new(AggregateId::new());

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = PropertyEvent::ExpectedPriceRevised(ExpectedPriceRevised {
                                tenant_id,
                                property_id,
                                expected_price: 100_000 + i as u64,
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                tenant_id,
                                property_id.0,
                                PROPERTY_AGGREGATE,
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(store.append(events, ExpectedVersion::Any).unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Invoice with `positives` positive lines and one negative line per four
/// positives, across two tax sets.
fn invoice_lines(positives: usize) -> Vec<InvoiceLine> {
    let products: Vec<ProductId> = (0..8).map(|_| ProductId::new(AggregateId::new())).collect();
    let vat: TaxSet = [Tax::new("IVA16", 1600)].into_iter().collect();

    let mut lines = Vec::with_capacity(positives + positives / 4);
    for i in 0..positives {
        let taxes = if i % 2 == 0 { vat.clone() } else { TaxSet::empty() };
        lines.push(InvoiceLine {
            line_no: lines.len() as u32 + 1,
            product_id: Some(products[i % products.len()]),
            label: format!("item {i}"),
            quantity: (i % 7 + 1) as i64,
            unit_price: 1_000 + (i as u64 * 37) % 900,
            discount_bp: ((i % 3) * 500) as u32,
            taxes: taxes.clone(),
        });
        if i % 4 == 3 {
            lines.push(InvoiceLine {
                line_no: lines.len() as u32 + 1,
                product_id: Some(products[(i + 1) % products.len()]),
                label: format!("refund {i}"),
                quantity: -2,
                unit_price: 900,
                discount_bp: 0,
                taxes,
            });
        }
    }
    lines
}

fn bench_negative_line_redistribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("negative_line_redistribution");

    for positives in [8usize, 64, 512] {
        let lines = invoice_lines(positives);
        group.throughput(Throughput::Elements(lines.len() as u64));
        group.bench_with_input(BenchmarkId::new("dispatch", positives), &lines, |b, lines| {
            b.iter(|| black_box(dispatch_negative_lines(black_box(lines))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_negative_line_redistribution
);
criterion_main!(benches);
