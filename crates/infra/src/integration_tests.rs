//! Full pipeline tests: Command → EventStore → Projection → ReadModel.

use std::sync::Arc;

use chrono::Utc;

use realty_core::{AggregateId, ExpectedVersion, PartnerId, TenantId, UserId};
use realty_estate::{
    ConfirmOffer, CreateProperty, DeclineOffer, MarkSold, OfferId, OfferStatus, Property,
    PropertyCommand, PropertyDetails, PropertyId, PropertyState, ReceiveOffer,
};
use realty_invoicing::{
    DocumentState, Invoice, InvoiceCommand, InvoiceId, InvoiceLine, IssueInvoice,
    RecordDocumentState, RoundingMethod, TaxSet, build_invoice_document,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{
    INVOICE_AGGREGATE, InvoiceReadModel, InvoicesProjection, PROPERTY_AGGREGATE,
    PropertiesProjection, PropertyReadModel,
};
use crate::read_model::InMemoryTenantStore;

type Properties = PropertiesProjection<Arc<InMemoryTenantStore<PropertyId, PropertyReadModel>>>;

struct Harness {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>>,
    properties: Properties,
    invoices: InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new())),
            properties: PropertiesProjection::new(Arc::new(InMemoryTenantStore::new())),
            invoices: InvoicesProjection::new(Arc::new(InMemoryTenantStore::new())),
        }
    }

    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let env = stored.to_envelope();
            self.properties.apply_envelope(&env).unwrap();
            self.invoices.apply_envelope(&env).unwrap();
        }
    }

    fn property(
        &self,
        tenant_id: TenantId,
        property_id: PropertyId,
        command: PropertyCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatcher.dispatch(
            tenant_id,
            property_id.0,
            PROPERTY_AGGREGATE,
            &command,
            |id| Property::empty(PropertyId::new(id)),
        )?;
        self.project(&committed);
        Ok(committed)
    }

    fn invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        command: InvoiceCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatcher.dispatch(
            tenant_id,
            invoice_id.0,
            INVOICE_AGGREGATE,
            &command,
            |id| Invoice::empty(InvoiceId::new(id)),
        )?;
        self.project(&committed);
        Ok(committed)
    }
}

fn create_property(h: &Harness, tenant_id: TenantId, expected_price: u64) -> PropertyId {
    let property_id = PropertyId::new(AggregateId::new());
    h.property(
        tenant_id,
        property_id,
        PropertyCommand::CreateProperty(CreateProperty {
            tenant_id,
            property_id,
            details: PropertyDetails::new("Harbour view", expected_price),
            salesperson_id: None,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();
    property_id
}

fn receive_offer(h: &Harness, tenant_id: TenantId, property_id: PropertyId, price: u64) -> OfferId {
    let offer_id = OfferId::new(AggregateId::new());
    h.property(
        tenant_id,
        property_id,
        PropertyCommand::ReceiveOffer(ReceiveOffer {
            tenant_id,
            property_id,
            offer_id,
            partner_id: PartnerId::new(),
            price,
            validity_days: None,
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();
    offer_id
}

#[test]
fn offer_flow_updates_the_listing() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let property_id = create_property(&h, tenant_id, 100_000);

    let low = receive_offer(&h, tenant_id, property_id, 85_000);
    let high = receive_offer(&h, tenant_id, property_id, 95_000);

    h.property(
        tenant_id,
        property_id,
        PropertyCommand::DeclineOffer(DeclineOffer {
            tenant_id,
            property_id,
            offer_id: low,
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();
    h.property(
        tenant_id,
        property_id,
        PropertyCommand::ConfirmOffer(ConfirmOffer {
            tenant_id,
            property_id,
            offer_id: high,
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();
    h.property(
        tenant_id,
        property_id,
        PropertyCommand::MarkSold(MarkSold {
            tenant_id,
            property_id,
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();

    let rm = h.properties.get(tenant_id, &property_id).unwrap();
    assert_eq!(rm.state, PropertyState::Sold);
    assert_eq!(rm.selling_price, 95_000);
    assert_eq!(rm.best_price, 95_000);
    assert_eq!(rm.offer_count, 2);
    assert_eq!(rm.offers[1].status, OfferStatus::Refused);
}

#[test]
fn rejected_command_leaves_stream_and_listing_untouched() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let property_id = create_property(&h, tenant_id, 100_000);
    let offer_id = receive_offer(&h, tenant_id, property_id, 50_000);

    let err = h
        .property(
            tenant_id,
            property_id,
            PropertyCommand::ConfirmOffer(ConfirmOffer {
                tenant_id,
                property_id,
                offer_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();

    assert_eq!(err.code(), "price_constraint_violation");
    let stream = h.dispatcher.store().load_stream(tenant_id, property_id.0).unwrap();
    assert_eq!(stream.len(), 2);
    let rm = h.properties.get(tenant_id, &property_id).unwrap();
    assert_eq!(rm.state, PropertyState::OfferReceived);
    assert_eq!(rm.selling_price, 0);
}

#[test]
fn rebuild_from_the_store_matches_incremental_projection() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let first = create_property(&h, tenant_id, 100_000);
    let second = create_property(&h, tenant_id, 250_000);
    receive_offer(&h, tenant_id, first, 99_000);
    receive_offer(&h, tenant_id, second, 240_000);

    let before = h.properties.list(tenant_id, true);

    let events = h.dispatcher.store().load_tenant(tenant_id).unwrap();
    h.properties
        .rebuild_from_scratch(events.iter().map(StoredEvent::to_envelope))
        .unwrap();

    assert_eq!(h.properties.list(tenant_id, true), before);
}

#[test]
fn tenants_never_see_each_other() {
    let h = Harness::new();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let property_id = create_property(&h, tenant_a, 100_000);

    assert!(h.properties.get(tenant_b, &property_id).is_none());
    assert!(h.properties.list(tenant_b, true).is_empty());

    // tenant B cannot act on tenant A's property, even with the right id
    let err = h
        .property(
            tenant_b,
            property_id,
            PropertyCommand::MarkSold(MarkSold {
                tenant_id: tenant_b,
                property_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound));
}

#[test]
fn concurrent_writer_is_detected() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let property_id = create_property(&h, tenant_id, 100_000);

    // A second writer still expecting the empty stream.
    let stale = h.dispatcher.store().load_stream(tenant_id, property_id.0).unwrap();
    let replay: Vec<_> = stale
        .iter()
        .map(|e| crate::event_store::UncommittedEvent {
            event_id: uuid::Uuid::now_v7(),
            tenant_id: e.tenant_id,
            aggregate_id: e.aggregate_id,
            aggregate_type: e.aggregate_type.clone(),
            event_type: e.event_type.clone(),
            event_version: e.event_version,
            occurred_at: e.occurred_at,
            payload: e.payload.clone(),
        })
        .collect();

    let err: DispatchError = h
        .dispatcher
        .store()
        .append(replay, ExpectedVersion::Exact(0))
        .unwrap_err()
        .into();
    assert!(matches!(err, DispatchError::Concurrency(_)));
}

#[test]
fn tax_document_state_is_recorded_once() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let invoice_id = InvoiceId::new(AggregateId::new());

    h.invoice(
        tenant_id,
        invoice_id,
        InvoiceCommand::IssueInvoice(IssueInvoice {
            tenant_id,
            invoice_id,
            partner_id: PartnerId::new(),
            reference: "INV/2024/0001".to_string(),
            lines: vec![
                InvoiceLine {
                    line_no: 1,
                    product_id: None,
                    label: "service".to_string(),
                    quantity: 2,
                    unit_price: 1_000,
                    discount_bp: 0,
                    taxes: TaxSet::empty(),
                },
                InvoiceLine {
                    line_no: 2,
                    product_id: None,
                    label: "refund".to_string(),
                    quantity: -1,
                    unit_price: 500,
                    discount_bp: 0,
                    taxes: TaxSet::empty(),
                },
            ],
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();

    let invoice: Invoice = h
        .dispatcher
        .load_aggregate(tenant_id, invoice_id.0, |id| Invoice::empty(InvoiceId::new(id)))
        .unwrap();
    let document = build_invoice_document(&invoice, RoundingMethod::PerLine).unwrap();
    assert_eq!(document.state, DocumentState::InvoiceSent);
    assert_eq!(document.total, 1_500);

    let record = InvoiceCommand::RecordDocumentState(RecordDocumentState {
        tenant_id,
        invoice_id,
        state: document.state,
        global_document_id: None,
        occurred_at: Utc::now(),
    });
    h.invoice(tenant_id, invoice_id, record.clone()).unwrap();

    let rm = h.invoices.get(tenant_id, &invoice_id).unwrap();
    assert_eq!(rm.document_state, Some(DocumentState::InvoiceSent));

    let err = h.invoice(tenant_id, invoice_id, record).unwrap_err();
    assert!(matches!(err, DispatchError::Conflict(_)));
}
