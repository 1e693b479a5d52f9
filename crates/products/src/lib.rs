//! Products domain module (event-sourced).
//!
//! Product catalog entries with their device-type extension. Which fields are
//! mandatory depends on the product kind (see [`requirement`]).

pub mod product;
pub mod requirement;

pub use product::{
    ActivateProduct, ArchiveProduct, ChangeProductKind, CreateProduct, DeviceType,
    DeviceTypeChanged, PricingMetadata, Product, ProductActivated, ProductArchived,
    ProductCommand, ProductCreated, ProductEvent, ProductId, ProductKind, ProductKindChanged,
    ProductStatus, SetDeviceType,
};
pub use requirement::{ProductField, ensure_complete, is_required, missing_field};
