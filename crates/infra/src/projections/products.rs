use serde::Serialize;
use serde_json::Value as JsonValue;

use realty_core::TenantId;
use realty_events::EventEnvelope;
use realty_products::{
    DeviceType, PricingMetadata, ProductEvent, ProductId, ProductKind, ProductStatus,
};

use crate::projections::cursor::{
    ProjectionError, StreamCursors, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

pub const PRODUCT_AGGREGATE: &str = "products.product";

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub device_type: Option<DeviceType>,
    pub status: ProductStatus,
    pub pricing: PricingMetadata,
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        let mut items = self.store.list(tenant_id);
        items.sort_by(|a, b| a.sku.cmp(&b.sku));
        items
    }

    /// SKU lookup, used to keep SKUs unique per tenant.
    pub fn find_by_sku(&self, tenant_id: TenantId, sku: &str) -> Option<ProductReadModel> {
        self.store.find(tenant_id, &|p| p.sku == sku)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let (event_tenant, product_id) = ev.stream();
        ensure_same_stream(envelope, event_tenant, product_id.0)?;

        let rm = match ev {
            ProductEvent::ProductCreated(e) => Some(ProductReadModel {
                product_id: e.product_id,
                sku: e.sku,
                name: e.name,
                kind: e.kind,
                device_type: e.device_type,
                status: ProductStatus::Draft,
                pricing: e.pricing,
            }),
            other => self.store.get(tenant_id, &product_id).map(|mut rm| {
                match other {
                    ProductEvent::ProductCreated(_) => {}
                    ProductEvent::ProductKindChanged(e) => rm.kind = e.kind,
                    ProductEvent::DeviceTypeChanged(e) => rm.device_type = e.device_type,
                    ProductEvent::ProductActivated(_) => rm.status = ProductStatus::Active,
                    ProductEvent::ProductArchived(_) => rm.status = ProductStatus::Archived,
                }
                rm
            }),
        };

        let Some(rm) = rm else {
            return Err(ProjectionError::NonMonotonicSequence { last: 0, found: seq });
        };
        self.store.upsert(tenant_id, product_id, rm);
        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let (tenants, envs) = replay_order(envelopes);
        for t in tenants {
            self.store.clear_tenant(t);
            self.cursors.clear_tenant(t);
        }
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
