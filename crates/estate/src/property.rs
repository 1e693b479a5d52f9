use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use realty_core::entity::find_by_id;
use realty_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, PartnerId, TenantId, UserId,
};
use realty_events::Event;

use crate::catalog::{PropertyTypeId, TagId};
use crate::error::{EstateError, EstateResult};
use crate::offer::{self, DEFAULT_VALIDITY_DAYS, Offer, OfferId, OfferStatus};
use crate::pricing;
use crate::state::PropertyState;

pub const DEFAULT_BEDROOMS: u32 = 2;
/// Garden area set when a garden is switched on.
pub const DEFAULT_GARDEN_AREA: u32 = 10;
const AVAILABILITY_DELAY_MONTHS: u32 = 3;

/// Property identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub AggregateId);

impl PropertyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GardenOrientation {
    North,
    South,
    East,
    West,
}

/// Descriptive listing data of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub name: String,
    pub description: Option<String>,
    pub postcode: Option<String>,
    /// Price in smallest currency unit.
    pub expected_price: u64,
    pub bedrooms: u32,
    pub living_area: u32,
    pub facades: u32,
    pub garage: bool,
    pub garden: bool,
    pub garden_area: u32,
    pub garden_orientation: Option<GardenOrientation>,
    /// Defaults to three months after creation when omitted.
    pub date_available: Option<NaiveDate>,
    pub property_type_id: Option<PropertyTypeId>,
    pub tag_ids: Vec<TagId>,
}

impl PropertyDetails {
    /// Listing with every optional field at its default.
    pub fn new(name: impl Into<String>, expected_price: u64) -> Self {
        Self {
            name: name.into(),
            description: None,
            postcode: None,
            expected_price,
            bedrooms: DEFAULT_BEDROOMS,
            living_area: 0,
            facades: 0,
            garage: false,
            garden: false,
            garden_area: 0,
            garden_orientation: None,
            date_available: None,
            property_type_id: None,
            tag_ids: Vec::new(),
        }
    }
}

/// Aggregate root: Property (owns its offers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    id: PropertyId,
    tenant_id: Option<TenantId>,
    details: PropertyDetails,
    selling_price: u64,
    state: PropertyState,
    buyer_id: Option<PartnerId>,
    salesperson_id: Option<UserId>,
    offers: Vec<Offer>,
    active: bool,
    version: u64,
    created: bool,
}

impl Property {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PropertyId) -> Self {
        Self {
            id,
            tenant_id: None,
            details: PropertyDetails::new(String::new(), 0),
            selling_price: 0,
            state: PropertyState::New,
            buyer_id: None,
            salesperson_id: None,
            offers: Vec::new(),
            active: true,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PropertyId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn details(&self) -> &PropertyDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn expected_price(&self) -> u64 {
        self.details.expected_price
    }

    /// `0` until an offer is accepted.
    pub fn selling_price(&self) -> u64 {
        self.selling_price
    }

    pub fn state(&self) -> PropertyState {
        self.state
    }

    pub fn buyer_id(&self) -> Option<PartnerId> {
        self.buyer_id
    }

    pub fn salesperson_id(&self) -> Option<UserId> {
        self.salesperson_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Offers in the order they were received.
    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    /// Offers by price, highest first.
    pub fn offers_by_price(&self) -> Vec<&Offer> {
        let mut offers: Vec<&Offer> = self.offers.iter().collect();
        offers.sort_by(|a, b| b.price.cmp(&a.price));
        offers
    }

    pub fn offer(&self, offer_id: OfferId) -> Option<&Offer> {
        find_by_id(&self.offers, &offer_id)
    }

    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }

    pub fn best_price(&self) -> u64 {
        pricing::best_price(&self.offers)
    }

    pub fn total_area(&self) -> u32 {
        pricing::total_area(self.details.living_area, self.details.garden_area)
    }

    /// Commit-time invariants of a property state.
    pub fn validate(&self) -> EstateResult<()> {
        if self.details.expected_price == 0 {
            return Err(DomainError::validation("expected price must be strictly positive").into());
        }
        pricing::check_selling_price(self.details.expected_price, self.selling_price)
    }
}

impl AggregateRoot for Property {
    type Id = PropertyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProperty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProperty {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub details: PropertyDetails,
    /// Defaults to `actor` when omitted.
    pub salesperson_id: Option<UserId>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseExpectedPrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseExpectedPrice {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub expected_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetGarden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetGarden {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub garden: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetClassification (type + tags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetClassification {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub property_type_id: Option<PropertyTypeId>,
    pub tag_ids: Vec<TagId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveOffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveOffer {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub partner_id: PartnerId,
    pub price: u64,
    /// Defaults to [`DEFAULT_VALIDITY_DAYS`].
    pub validity_days: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetOfferValidity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOfferValidity {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub validity_days: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetOfferDeadline (inverse of SetOfferValidity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOfferDeadline {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub date_deadline: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOffer {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeclineOffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineOffer {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSold {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCanceled {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProperty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProperty {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestoreProperty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreProperty {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyCommand {
    CreateProperty(CreateProperty),
    ReviseExpectedPrice(ReviseExpectedPrice),
    SetGarden(SetGarden),
    SetClassification(SetClassification),
    ReceiveOffer(ReceiveOffer),
    SetOfferValidity(SetOfferValidity),
    SetOfferDeadline(SetOfferDeadline),
    ConfirmOffer(ConfirmOffer),
    DeclineOffer(DeclineOffer),
    MarkSold(MarkSold),
    MarkCanceled(MarkCanceled),
    ArchiveProperty(ArchiveProperty),
    RestoreProperty(RestoreProperty),
}

/// Event: PropertyCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyCreated {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    /// `date_available` is always resolved here.
    pub details: PropertyDetails,
    pub salesperson_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpectedPriceRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedPriceRevised {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub expected_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GardenChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenChanged {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub garden: bool,
    pub garden_area: u32,
    pub garden_orientation: Option<GardenOrientation>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClassificationChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationChanged {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub property_type_id: Option<PropertyTypeId>,
    pub tag_ids: Vec<TagId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OfferReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReceived {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer: Offer,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OfferValidityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferValidityChanged {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub validity_days: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OfferAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAccepted {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub partner_id: PartnerId,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OfferRefused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRefused {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub offer_id: OfferId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PropertySold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySold {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub buyer_id: Option<PartnerId>,
    pub selling_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PropertyCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyCanceled {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PropertyArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyArchived {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PropertyRestored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRestored {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyEvent {
    PropertyCreated(PropertyCreated),
    ExpectedPriceRevised(ExpectedPriceRevised),
    GardenChanged(GardenChanged),
    ClassificationChanged(ClassificationChanged),
    OfferReceived(OfferReceived),
    OfferValidityChanged(OfferValidityChanged),
    OfferAccepted(OfferAccepted),
    OfferRefused(OfferRefused),
    PropertySold(PropertySold),
    PropertyCanceled(PropertyCanceled),
    PropertyArchived(PropertyArchived),
    PropertyRestored(PropertyRestored),
}

impl PropertyEvent {
    /// Stream coordinates carried by every event.
    pub fn stream(&self) -> (TenantId, PropertyId) {
        match self {
            PropertyEvent::PropertyCreated(e) => (e.tenant_id, e.property_id),
            PropertyEvent::ExpectedPriceRevised(e) => (e.tenant_id, e.property_id),
            PropertyEvent::GardenChanged(e) => (e.tenant_id, e.property_id),
            PropertyEvent::ClassificationChanged(e) => (e.tenant_id, e.property_id),
            PropertyEvent::OfferReceived(e) => (e.tenant_id, e.property_id),
            PropertyEvent::OfferValidityChanged(e) => (e.tenant_id, e.property_id),
            PropertyEvent::OfferAccepted(e) => (e.tenant_id, e.property_id),
            PropertyEvent::OfferRefused(e) => (e.tenant_id, e.property_id),
            PropertyEvent::PropertySold(e) => (e.tenant_id, e.property_id),
            PropertyEvent::PropertyCanceled(e) => (e.tenant_id, e.property_id),
            PropertyEvent::PropertyArchived(e) => (e.tenant_id, e.property_id),
            PropertyEvent::PropertyRestored(e) => (e.tenant_id, e.property_id),
        }
    }
}

impl Event for PropertyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PropertyEvent::PropertyCreated(_) => "estate.property.created",
            PropertyEvent::ExpectedPriceRevised(_) => "estate.property.expected_price_revised",
            PropertyEvent::GardenChanged(_) => "estate.property.garden_changed",
            PropertyEvent::ClassificationChanged(_) => "estate.property.classification_changed",
            PropertyEvent::OfferReceived(_) => "estate.property.offer_received",
            PropertyEvent::OfferValidityChanged(_) => "estate.property.offer_validity_changed",
            PropertyEvent::OfferAccepted(_) => "estate.property.offer_accepted",
            PropertyEvent::OfferRefused(_) => "estate.property.offer_refused",
            PropertyEvent::PropertySold(_) => "estate.property.sold",
            PropertyEvent::PropertyCanceled(_) => "estate.property.canceled",
            PropertyEvent::PropertyArchived(_) => "estate.property.archived",
            PropertyEvent::PropertyRestored(_) => "estate.property.restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PropertyEvent::PropertyCreated(e) => e.occurred_at,
            PropertyEvent::ExpectedPriceRevised(e) => e.occurred_at,
            PropertyEvent::GardenChanged(e) => e.occurred_at,
            PropertyEvent::ClassificationChanged(e) => e.occurred_at,
            PropertyEvent::OfferReceived(e) => e.occurred_at,
            PropertyEvent::OfferValidityChanged(e) => e.occurred_at,
            PropertyEvent::OfferAccepted(e) => e.occurred_at,
            PropertyEvent::OfferRefused(e) => e.occurred_at,
            PropertyEvent::PropertySold(e) => e.occurred_at,
            PropertyEvent::PropertyCanceled(e) => e.occurred_at,
            PropertyEvent::PropertyArchived(e) => e.occurred_at,
            PropertyEvent::PropertyRestored(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Property {
    type Command = PropertyCommand;
    type Event = PropertyEvent;
    type Error = EstateError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PropertyEvent::PropertyCreated(e) => {
                self.id = e.property_id;
                self.tenant_id = Some(e.tenant_id);
                self.details = e.details.clone();
                self.salesperson_id = Some(e.salesperson_id);
                self.selling_price = 0;
                self.state = PropertyState::New;
                self.buyer_id = None;
                self.offers.clear();
                self.active = true;
                self.created = true;
            }
            PropertyEvent::ExpectedPriceRevised(e) => {
                self.details.expected_price = e.expected_price;
            }
            PropertyEvent::GardenChanged(e) => {
                self.details.garden = e.garden;
                self.details.garden_area = e.garden_area;
                self.details.garden_orientation = e.garden_orientation;
            }
            PropertyEvent::ClassificationChanged(e) => {
                self.details.property_type_id = e.property_type_id;
                self.details.tag_ids = e.tag_ids.clone();
            }
            PropertyEvent::OfferReceived(e) => {
                self.offers.push(e.offer.clone());
                self.state = self.state.after_offer_received();
            }
            PropertyEvent::OfferValidityChanged(e) => {
                if let Some(offer) = self.offers.iter_mut().find(|o| o.id == e.offer_id) {
                    offer.validity_days = e.validity_days;
                }
            }
            PropertyEvent::OfferAccepted(e) => {
                if let Some(offer) = self.offers.iter_mut().find(|o| o.id == e.offer_id) {
                    offer.status = OfferStatus::Accepted;
                }
                self.state = PropertyState::OfferAccepted;
                self.buyer_id = Some(e.partner_id);
                self.selling_price = e.price;
            }
            PropertyEvent::OfferRefused(e) => {
                if let Some(offer) = self.offers.iter_mut().find(|o| o.id == e.offer_id) {
                    offer.status = OfferStatus::Refused;
                }
            }
            PropertyEvent::PropertySold(_) => {
                self.state = PropertyState::Sold;
            }
            PropertyEvent::PropertyCanceled(_) => {
                self.state = PropertyState::Canceled;
            }
            PropertyEvent::PropertyArchived(_) => {
                self.active = false;
            }
            PropertyEvent::PropertyRestored(_) => {
                self.active = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = match command {
            PropertyCommand::CreateProperty(cmd) => self.handle_create(cmd),
            PropertyCommand::ReviseExpectedPrice(cmd) => self.handle_revise_expected_price(cmd),
            PropertyCommand::SetGarden(cmd) => self.handle_set_garden(cmd),
            PropertyCommand::SetClassification(cmd) => self.handle_set_classification(cmd),
            PropertyCommand::ReceiveOffer(cmd) => self.handle_receive_offer(cmd),
            PropertyCommand::SetOfferValidity(cmd) => self.handle_set_offer_validity(cmd),
            PropertyCommand::SetOfferDeadline(cmd) => self.handle_set_offer_deadline(cmd),
            PropertyCommand::ConfirmOffer(cmd) => self.handle_confirm_offer(cmd),
            PropertyCommand::DeclineOffer(cmd) => self.handle_decline_offer(cmd),
            PropertyCommand::MarkSold(cmd) => self.handle_mark_sold(cmd),
            PropertyCommand::MarkCanceled(cmd) => self.handle_mark_canceled(cmd),
            PropertyCommand::ArchiveProperty(cmd) => self.handle_archive(cmd),
            PropertyCommand::RestoreProperty(cmd) => self.handle_restore(cmd),
        }?;

        self.ensure_commit_valid(&events)?;
        Ok(events)
    }
}

impl Property {
    fn ensure_target(&self, tenant_id: TenantId, property_id: PropertyId) -> EstateResult<()> {
        if !self.created {
            return Err(DomainError::not_found().into());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch").into());
        }
        if self.id != property_id {
            return Err(DomainError::invariant("property_id mismatch").into());
        }
        Ok(())
    }

    fn find_offer(&self, offer_id: OfferId) -> EstateResult<&Offer> {
        self.offer(offer_id)
            .ok_or_else(|| DomainError::not_found().into())
    }

    /// Validate the state the events would produce; rejects the whole batch.
    fn ensure_commit_valid(&self, events: &[PropertyEvent]) -> EstateResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut next = self.clone();
        for event in events {
            next.apply(event);
        }

        next.validate()?;

        if self.state == PropertyState::Sold && next.selling_price != self.selling_price {
            return Err(DomainError::invariant("selling price is immutable once sold").into());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProperty) -> EstateResult<Vec<PropertyEvent>> {
        if self.created {
            return Err(DomainError::conflict("property already exists").into());
        }

        if cmd.details.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty").into());
        }

        let mut details = cmd.details.clone();
        if details.date_available.is_none() {
            let available = cmd
                .occurred_at
                .date_naive()
                .checked_add_months(Months::new(AVAILABILITY_DELAY_MONTHS))
                .ok_or_else(|| DomainError::validation("availability date is out of range"))?;
            details.date_available = Some(available);
        }
        if !details.garden {
            details.garden_area = 0;
            details.garden_orientation = None;
        }

        Ok(vec![PropertyEvent::PropertyCreated(PropertyCreated {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            details,
            salesperson_id: cmd.salesperson_id.unwrap_or(cmd.actor),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise_expected_price(
        &self,
        cmd: &ReviseExpectedPrice,
    ) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        if cmd.expected_price == self.details.expected_price {
            return Ok(vec![]);
        }

        Ok(vec![PropertyEvent::ExpectedPriceRevised(ExpectedPriceRevised {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            expected_price: cmd.expected_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_garden(&self, cmd: &SetGarden) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        if cmd.garden == self.details.garden {
            return Ok(vec![]);
        }

        let (garden_area, garden_orientation) = if cmd.garden {
            (DEFAULT_GARDEN_AREA, Some(GardenOrientation::North))
        } else {
            (0, None)
        };

        Ok(vec![PropertyEvent::GardenChanged(GardenChanged {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            garden: cmd.garden,
            garden_area,
            garden_orientation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_classification(
        &self,
        cmd: &SetClassification,
    ) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        let mut tag_ids = cmd.tag_ids.clone();
        tag_ids.sort_by_key(|t| *t.0.as_uuid());
        tag_ids.dedup();

        Ok(vec![PropertyEvent::ClassificationChanged(ClassificationChanged {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            property_type_id: cmd.property_type_id,
            tag_ids,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_offer(&self, cmd: &ReceiveOffer) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        if cmd.price == 0 {
            return Err(DomainError::validation("offer price must be strictly positive").into());
        }
        if self.offer(cmd.offer_id).is_some() {
            return Err(DomainError::conflict("offer already exists").into());
        }

        let created_on = cmd.occurred_at.date_naive();
        let validity_days = cmd.validity_days.unwrap_or(DEFAULT_VALIDITY_DAYS);
        offer::deadline_from_validity(created_on, validity_days)?;

        Ok(vec![PropertyEvent::OfferReceived(OfferReceived {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            offer: Offer {
                id: cmd.offer_id,
                partner_id: cmd.partner_id,
                price: cmd.price,
                validity_days,
                created_on,
                status: OfferStatus::Pending,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_offer_validity(
        &self,
        cmd: &SetOfferValidity,
    ) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;
        let offer = self.find_offer(cmd.offer_id)?;
        offer::deadline_from_validity(offer.created_on, cmd.validity_days)?;

        Ok(vec![PropertyEvent::OfferValidityChanged(OfferValidityChanged {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            offer_id: cmd.offer_id,
            validity_days: cmd.validity_days,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_offer_deadline(
        &self,
        cmd: &SetOfferDeadline,
    ) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;
        let offer = self.find_offer(cmd.offer_id)?;
        let validity_days = offer::validity_from_deadline(offer.created_on, cmd.date_deadline)?;

        Ok(vec![PropertyEvent::OfferValidityChanged(OfferValidityChanged {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            offer_id: cmd.offer_id,
            validity_days,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_offer(&self, cmd: &ConfirmOffer) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;
        let offer = self.find_offer(cmd.offer_id)?;

        if offer.status == OfferStatus::Refused {
            return Err(EstateError::OfferAlreadyRefused);
        }
        self.state.ensure_offer_acceptable()?;

        // Competing offers are left untouched.
        Ok(vec![PropertyEvent::OfferAccepted(OfferAccepted {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            offer_id: offer.id,
            partner_id: offer.partner_id,
            price: offer.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_decline_offer(&self, cmd: &DeclineOffer) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;
        let offer = self.find_offer(cmd.offer_id)?;

        match offer.status {
            OfferStatus::Accepted => Err(EstateError::OfferAlreadyAccepted),
            OfferStatus::Refused => Ok(vec![]),
            OfferStatus::Pending => Ok(vec![PropertyEvent::OfferRefused(OfferRefused {
                tenant_id: cmd.tenant_id,
                property_id: cmd.property_id,
                offer_id: offer.id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_mark_sold(&self, cmd: &MarkSold) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        match self.state.sell()? {
            None => Ok(vec![]),
            Some(_) => Ok(vec![PropertyEvent::PropertySold(PropertySold {
                tenant_id: cmd.tenant_id,
                property_id: cmd.property_id,
                buyer_id: self.buyer_id,
                selling_price: self.selling_price,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_mark_canceled(&self, cmd: &MarkCanceled) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        match self.state.cancel()? {
            None => Ok(vec![]),
            Some(_) => Ok(vec![PropertyEvent::PropertyCanceled(PropertyCanceled {
                tenant_id: cmd.tenant_id,
                property_id: cmd.property_id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_archive(&self, cmd: &ArchiveProperty) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        if !self.active {
            return Ok(vec![]);
        }

        Ok(vec![PropertyEvent::PropertyArchived(PropertyArchived {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restore(&self, cmd: &RestoreProperty) -> EstateResult<Vec<PropertyEvent>> {
        self.ensure_target(cmd.tenant_id, cmd.property_id)?;

        if self.active {
            return Ok(vec![]);
        }

        Ok(vec![PropertyEvent::PropertyRestored(PropertyRestored {
            tenant_id: cmd.tenant_id,
            property_id: cmd.property_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixture {
        tenant_id: TenantId,
        property_id: PropertyId,
        property: Property,
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn test_offer_id() -> OfferId {
        OfferId::new(AggregateId::new())
    }

    fn listed(expected_price: u64) -> Fixture {
        let tenant_id = TenantId::new();
        let property_id = PropertyId::new(AggregateId::new());
        let mut property = Property::empty(property_id);

        property
            .execute(&PropertyCommand::CreateProperty(CreateProperty {
                tenant_id,
                property_id,
                details: PropertyDetails::new("Big Villa", expected_price),
                salesperson_id: None,
                actor: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();

        Fixture {
            tenant_id,
            property_id,
            property,
        }
    }

    impl Fixture {
        fn offer(&mut self, price: u64) -> OfferId {
            let offer_id = test_offer_id();
            self.property
                .execute(&PropertyCommand::ReceiveOffer(ReceiveOffer {
                    tenant_id: self.tenant_id,
                    property_id: self.property_id,
                    offer_id,
                    partner_id: PartnerId::new(),
                    price,
                    validity_days: None,
                    occurred_at: test_time(),
                }))
                .unwrap();
            offer_id
        }

        fn confirm(&mut self, offer_id: OfferId) -> EstateResult<Vec<PropertyEvent>> {
            self.property
                .execute(&PropertyCommand::ConfirmOffer(ConfirmOffer {
                    tenant_id: self.tenant_id,
                    property_id: self.property_id,
                    offer_id,
                    occurred_at: test_time(),
                }))
        }

        fn decline(&mut self, offer_id: OfferId) -> EstateResult<Vec<PropertyEvent>> {
            self.property
                .execute(&PropertyCommand::DeclineOffer(DeclineOffer {
                    tenant_id: self.tenant_id,
                    property_id: self.property_id,
                    offer_id,
                    occurred_at: test_time(),
                }))
        }

        fn sell(&mut self) -> EstateResult<Vec<PropertyEvent>> {
            self.property.execute(&PropertyCommand::MarkSold(MarkSold {
                tenant_id: self.tenant_id,
                property_id: self.property_id,
                occurred_at: test_time(),
            }))
        }

        fn cancel(&mut self) -> EstateResult<Vec<PropertyEvent>> {
            self.property.execute(&PropertyCommand::MarkCanceled(MarkCanceled {
                tenant_id: self.tenant_id,
                property_id: self.property_id,
                occurred_at: test_time(),
            }))
        }
    }

    #[test]
    fn create_applies_listing_defaults() {
        let fx = listed(100_000);
        let p = &fx.property;

        assert_eq!(p.state(), PropertyState::New);
        assert_eq!(p.details().bedrooms, DEFAULT_BEDROOMS);
        assert_eq!(
            p.details().date_available,
            NaiveDate::from_ymd_opt(2024, 4, 1)
        );
        assert_eq!(p.selling_price(), 0);
        assert_eq!(p.best_price(), 0);
        assert!(p.is_active());
        assert!(p.salesperson_id().is_some());
        assert_eq!(p.version(), 1);
    }

    #[test]
    fn create_defaults_salesperson_to_actor() {
        let actor = UserId::new();
        let property_id = PropertyId::new(AggregateId::new());
        let events = Property::empty(property_id)
            .handle(&PropertyCommand::CreateProperty(CreateProperty {
                tenant_id: TenantId::new(),
                property_id,
                details: PropertyDetails::new("Cottage", 50_000),
                salesperson_id: None,
                actor,
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            PropertyEvent::PropertyCreated(e) => assert_eq!(e.salesperson_id, actor),
            other => panic!("Expected PropertyCreated, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_non_positive_expected_price() {
        let property_id = PropertyId::new(AggregateId::new());
        let err = Property::empty(property_id)
            .handle(&PropertyCommand::CreateProperty(CreateProperty {
                tenant_id: TenantId::new(),
                property_id,
                details: PropertyDetails::new("Shed", 0),
                salesperson_id: None,
                actor: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, EstateError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn first_offer_moves_new_property_to_offer_received() {
        let mut fx = listed(100_000);
        fx.offer(95_000);
        assert_eq!(fx.property.state(), PropertyState::OfferReceived);

        fx.offer(97_000);
        assert_eq!(fx.property.state(), PropertyState::OfferReceived);
        assert_eq!(fx.property.offer_count(), 2);
        assert_eq!(fx.property.best_price(), 97_000);
        assert_eq!(fx.property.offers_by_price()[0].price, 97_000);
    }

    #[test]
    fn offer_defaults_to_seven_days_validity() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        let offer = fx.property.offer(offer_id).unwrap();
        assert_eq!(offer.validity_days, 7);
        assert_eq!(
            offer.date_deadline(),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn zero_priced_offer_is_rejected() {
        let fx = listed(100_000);
        let err = fx
            .property
            .handle(&PropertyCommand::ReceiveOffer(ReceiveOffer {
                tenant_id: fx.tenant_id,
                property_id: fx.property_id,
                offer_id: test_offer_id(),
                partner_id: PartnerId::new(),
                price: 0,
                validity_days: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn validity_and_deadline_stay_consistent() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);

        fx.property
            .execute(&PropertyCommand::SetOfferValidity(SetOfferValidity {
                tenant_id: fx.tenant_id,
                property_id: fx.property_id,
                offer_id,
                validity_days: 10,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(
            fx.property.offer(offer_id).unwrap().date_deadline(),
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap()
        );

        fx.property
            .execute(&PropertyCommand::SetOfferDeadline(SetOfferDeadline {
                tenant_id: fx.tenant_id,
                property_id: fx.property_id,
                offer_id,
                date_deadline: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(fx.property.offer(offer_id).unwrap().validity_days, 5);
    }

    #[test]
    fn confirming_offer_sets_buyer_and_selling_price() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        let partner_id = fx.property.offer(offer_id).unwrap().partner_id;

        fx.confirm(offer_id).unwrap();

        assert_eq!(fx.property.state(), PropertyState::OfferAccepted);
        assert_eq!(fx.property.buyer_id(), Some(partner_id));
        assert_eq!(fx.property.selling_price(), 95_000);
        assert_eq!(
            fx.property.offer(offer_id).unwrap().status,
            OfferStatus::Accepted
        );
    }

    #[test]
    fn confirming_low_offer_violates_price_constraint_and_changes_nothing() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(85_000);
        let before = fx.property.clone();

        let err = fx.confirm(offer_id).unwrap_err();

        assert_eq!(
            err,
            EstateError::PriceConstraintViolation {
                expected_price: 100_000,
                selling_price: 85_000
            }
        );
        assert_eq!(fx.property, before);
        assert_eq!(fx.property.state(), PropertyState::OfferReceived);
        assert_eq!(fx.property.buyer_id(), None);
    }

    #[test]
    fn second_confirmation_fails_and_competing_offers_stay_pending() {
        let mut fx = listed(100_000);
        let first = fx.offer(95_000);
        let second = fx.offer(96_000);

        fx.confirm(first).unwrap();
        let err = fx.confirm(second).unwrap_err();

        assert_eq!(err, EstateError::OfferAlreadyAcceptedElsewhere);
        assert_eq!(
            fx.property.offer(second).unwrap().status,
            OfferStatus::Pending
        );
    }

    #[test]
    fn refused_offer_cannot_be_confirmed() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        fx.decline(offer_id).unwrap();

        assert_eq!(fx.confirm(offer_id).unwrap_err(), EstateError::OfferAlreadyRefused);
    }

    #[test]
    fn accepted_offer_cannot_be_declined() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        fx.confirm(offer_id).unwrap();

        assert_eq!(fx.decline(offer_id).unwrap_err(), EstateError::OfferAlreadyAccepted);
    }

    #[test]
    fn confirming_on_sold_or_canceled_property_fails() {
        let mut sold = listed(100_000);
        let offer_id = sold.offer(95_000);
        sold.sell().unwrap();
        assert_eq!(sold.confirm(offer_id).unwrap_err(), EstateError::PropertyAlreadySold);

        let mut canceled = listed(100_000);
        let offer_id = canceled.offer(95_000);
        canceled.cancel().unwrap();
        assert_eq!(canceled.confirm(offer_id).unwrap_err(), EstateError::PropertyCanceled);
    }

    #[test]
    fn canceled_property_cannot_be_sold() {
        let mut fx = listed(100_000);
        fx.cancel().unwrap();

        let err = fx.sell().unwrap_err();
        assert!(matches!(
            err,
            EstateError::InvalidTransition { from: PropertyState::Canceled, .. }
        ));
        assert_eq!(fx.property.state(), PropertyState::Canceled);
    }

    #[test]
    fn sold_property_cannot_be_canceled() {
        let mut fx = listed(100_000);
        fx.sell().unwrap();

        let err = fx.cancel().unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(fx.property.state(), PropertyState::Sold);
    }

    #[test]
    fn selling_twice_is_a_no_op() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        fx.confirm(offer_id).unwrap();

        let events = fx.sell().unwrap();
        match &events[0] {
            PropertyEvent::PropertySold(e) => {
                assert_eq!(e.selling_price, 95_000);
                assert!(e.buyer_id.is_some());
            }
            other => panic!("Expected PropertySold, got {other:?}"),
        }

        let version = fx.property.version();
        assert!(fx.sell().unwrap().is_empty());
        assert_eq!(fx.property.version(), version);
    }

    #[test]
    fn revising_expected_price_is_checked_against_selling_price() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        fx.confirm(offer_id).unwrap();

        let err = fx
            .property
            .execute(&PropertyCommand::ReviseExpectedPrice(ReviseExpectedPrice {
                tenant_id: fx.tenant_id,
                property_id: fx.property_id,
                expected_price: 120_000,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err.code(), "price_constraint_violation");
        assert_eq!(fx.property.expected_price(), 100_000);
    }

    #[test]
    fn garden_toggle_sets_and_clears_defaults() {
        let mut fx = listed(100_000);
        let set_garden = |garden| {
            PropertyCommand::SetGarden(SetGarden {
                tenant_id: fx.tenant_id,
                property_id: fx.property_id,
                garden,
                occurred_at: test_time(),
            })
        };
        let on = set_garden(true);
        let off = set_garden(false);

        fx.property.execute(&on).unwrap();
        assert_eq!(fx.property.details().garden_area, DEFAULT_GARDEN_AREA);
        assert_eq!(
            fx.property.details().garden_orientation,
            Some(GardenOrientation::North)
        );
        assert_eq!(fx.property.total_area(), DEFAULT_GARDEN_AREA);

        fx.property.execute(&off).unwrap();
        assert_eq!(fx.property.details().garden_area, 0);
        assert_eq!(fx.property.details().garden_orientation, None);
    }

    #[test]
    fn archive_keeps_state_and_is_idempotent() {
        let mut fx = listed(100_000);
        fx.offer(95_000);
        let archive = PropertyCommand::ArchiveProperty(ArchiveProperty {
            tenant_id: fx.tenant_id,
            property_id: fx.property_id,
            occurred_at: test_time(),
        });

        assert_eq!(fx.property.execute(&archive).unwrap().len(), 1);
        assert!(fx.property.execute(&archive).unwrap().is_empty());
        assert!(!fx.property.is_active());
        assert_eq!(fx.property.state(), PropertyState::OfferReceived);
    }

    #[test]
    fn commands_for_other_tenant_are_rejected() {
        let fx = listed(100_000);
        let err = fx
            .property
            .handle(&PropertyCommand::MarkSold(MarkSold {
                tenant_id: TenantId::new(),
                property_id: fx.property_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            EstateError::Domain(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let mut fx = listed(100_000);
        let offer_id = fx.offer(95_000);
        let before = fx.property.clone();

        let cmd = PropertyCommand::ConfirmOffer(ConfirmOffer {
            tenant_id: fx.tenant_id,
            property_id: fx.property_id,
            offer_id,
            occurred_at: test_time(),
        });
        let events1 = fx.property.handle(&cmd).unwrap();
        let events2 = fx.property.handle(&cmd).unwrap();

        assert_eq!(fx.property, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn replaying_events_rebuilds_the_same_state() {
        let tenant_id = TenantId::new();
        let property_id = PropertyId::new(AggregateId::new());
        let mut original = Property::empty(property_id);
        let mut history = Vec::new();

        history.extend(
            original
                .execute(&PropertyCommand::CreateProperty(CreateProperty {
                    tenant_id,
                    property_id,
                    details: PropertyDetails::new("Loft", 200_000),
                    salesperson_id: None,
                    actor: UserId::new(),
                    occurred_at: test_time(),
                }))
                .unwrap(),
        );
        let offer_id = test_offer_id();
        history.extend(
            original
                .execute(&PropertyCommand::ReceiveOffer(ReceiveOffer {
                    tenant_id,
                    property_id,
                    offer_id,
                    partner_id: PartnerId::new(),
                    price: 190_000,
                    validity_days: Some(3),
                    occurred_at: test_time(),
                }))
                .unwrap(),
        );
        history.extend(
            original
                .execute(&PropertyCommand::ConfirmOffer(ConfirmOffer {
                    tenant_id,
                    property_id,
                    offer_id,
                    occurred_at: test_time(),
                }))
                .unwrap(),
        );

        let mut replayed = Property::empty(property_id);
        for event in &history {
            replayed.apply(event);
        }

        assert_eq!(replayed, original);
        assert_eq!(replayed.version(), 3);
    }
}
