use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

use realty_core::{PartnerId, TenantId, UserId};
use realty_estate::pricing;
use realty_estate::{
    GardenOrientation, Offer, OfferId, OfferStatus, PropertyEvent, PropertyId, PropertyState,
    PropertyTypeId, TagId,
};
use realty_events::EventEnvelope;

use crate::projections::cursor::{
    ProjectionError, StreamCursors, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

pub const PROPERTY_AGGREGATE: &str = "estate.property";

/// Listing view of a property, with its derived figures cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyReadModel {
    pub property_id: PropertyId,
    pub name: String,
    pub postcode: Option<String>,
    pub expected_price: u64,
    pub selling_price: u64,
    pub state: PropertyState,
    pub buyer_id: Option<PartnerId>,
    pub salesperson_id: UserId,
    pub active: bool,
    pub bedrooms: u32,
    pub living_area: u32,
    pub garden: bool,
    pub garden_area: u32,
    pub garden_orientation: Option<GardenOrientation>,
    pub date_available: Option<NaiveDate>,
    pub property_type_id: Option<PropertyTypeId>,
    pub tag_ids: Vec<TagId>,
    pub total_area: u32,
    pub best_price: u64,
    pub offer_count: usize,
    /// Highest price first.
    pub offers: Vec<Offer>,
}

impl PropertyReadModel {
    fn refresh_offers(&mut self) {
        self.offers.sort_by(|a, b| b.price.cmp(&a.price));
        self.best_price = pricing::best_price(&self.offers);
        self.offer_count = self.offers.len();
    }

    fn refresh_area(&mut self) {
        self.total_area = pricing::total_area(self.living_area, self.garden_area);
    }

    fn offer_mut(&mut self, offer_id: OfferId) -> Option<&mut Offer> {
        self.offers.iter_mut().find(|o| o.id == offer_id)
    }
}

#[derive(Debug)]
pub struct PropertiesProjection<S>
where
    S: TenantStore<PropertyId, PropertyReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PropertiesProjection<S>
where
    S: TenantStore<PropertyId, PropertyReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, property_id: &PropertyId) -> Option<PropertyReadModel> {
        self.store.get(tenant_id, property_id)
    }

    /// Active properties only unless `include_archived` is set.
    pub fn list(&self, tenant_id: TenantId, include_archived: bool) -> Vec<PropertyReadModel> {
        let mut items: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| include_archived || p.active)
            .collect();
        items.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.property_id.0.as_uuid().cmp(b.property_id.0.as_uuid()))
        });
        items
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PROPERTY_AGGREGATE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: PropertyEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let (event_tenant, property_id) = ev.stream();
        ensure_same_stream(envelope, event_tenant, property_id.0)?;

        if let PropertyEvent::PropertyCreated(e) = &ev {
            let d = &e.details;
            let mut rm = PropertyReadModel {
                property_id,
                name: d.name.clone(),
                postcode: d.postcode.clone(),
                expected_price: d.expected_price,
                selling_price: 0,
                state: PropertyState::New,
                buyer_id: None,
                salesperson_id: e.salesperson_id,
                active: true,
                bedrooms: d.bedrooms,
                living_area: d.living_area,
                garden: d.garden,
                garden_area: d.garden_area,
                garden_orientation: d.garden_orientation,
                date_available: d.date_available,
                property_type_id: d.property_type_id,
                tag_ids: d.tag_ids.clone(),
                total_area: 0,
                best_price: 0,
                offer_count: 0,
                offers: Vec::new(),
            };
            rm.refresh_area();
            self.store.upsert(tenant_id, property_id, rm);
            self.cursors.advance(tenant_id, aggregate_id, seq);
            return Ok(());
        }

        let Some(mut rm) = self.store.get(tenant_id, &property_id) else {
            return Err(ProjectionError::NonMonotonicSequence { last: 0, found: seq });
        };

        match ev {
            PropertyEvent::PropertyCreated(_) => {}
            PropertyEvent::ExpectedPriceRevised(e) => rm.expected_price = e.expected_price,
            PropertyEvent::GardenChanged(e) => {
                rm.garden = e.garden;
                rm.garden_area = e.garden_area;
                rm.garden_orientation = e.garden_orientation;
                rm.refresh_area();
            }
            PropertyEvent::ClassificationChanged(e) => {
                rm.property_type_id = e.property_type_id;
                rm.tag_ids = e.tag_ids;
            }
            PropertyEvent::OfferReceived(e) => {
                rm.offers.push(e.offer);
                rm.state = rm.state.after_offer_received();
                rm.refresh_offers();
            }
            PropertyEvent::OfferValidityChanged(e) => {
                if let Some(offer) = rm.offer_mut(e.offer_id) {
                    offer.validity_days = e.validity_days;
                }
            }
            PropertyEvent::OfferAccepted(e) => {
                if let Some(offer) = rm.offer_mut(e.offer_id) {
                    offer.status = OfferStatus::Accepted;
                }
                rm.state = PropertyState::OfferAccepted;
                rm.buyer_id = Some(e.partner_id);
                rm.selling_price = e.price;
            }
            PropertyEvent::OfferRefused(e) => {
                if let Some(offer) = rm.offer_mut(e.offer_id) {
                    offer.status = OfferStatus::Refused;
                }
            }
            PropertyEvent::PropertySold(_) => rm.state = PropertyState::Sold,
            PropertyEvent::PropertyCanceled(_) => rm.state = PropertyState::Canceled,
            PropertyEvent::PropertyArchived(_) => rm.active = false,
            PropertyEvent::PropertyRestored(_) => rm.active = true,
        }

        self.store.upsert(tenant_id, property_id, rm);
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
