//! Real-estate domain module (event-sourced).
//!
//! Business rules for properties and the offers made on them, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod error;
pub mod offer;
pub mod pricing;
pub mod property;
pub mod state;

pub use catalog::{Catalog, PropertyTag, PropertyType, PropertyTypeId, TagId};
pub use error::{EstateError, EstateResult};
pub use offer::{Offer, OfferId, OfferStatus};
pub use property::{
    ArchiveProperty, ConfirmOffer, CreateProperty, DeclineOffer, GardenOrientation, MarkCanceled,
    MarkSold, Property, PropertyCommand, PropertyDetails, PropertyEvent, PropertyId,
    ReceiveOffer, RestoreProperty, ReviseExpectedPrice, SetClassification, SetGarden,
    SetOfferDeadline, SetOfferValidity,
};
pub use state::PropertyState;
