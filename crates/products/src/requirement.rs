//! Conditional field requiredness.
//!
//! Whether a field is mandatory depends on other fields of the same product.
//! Rules are plain predicates evaluated when a product change is committed.

use serde::{Deserialize, Serialize};

use realty_core::{DomainError, DomainResult};

use crate::product::{Product, ProductKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Sku,
    Name,
    DeviceType,
}

impl ProductField {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductField::Sku => "sku",
            ProductField::Name => "name",
            ProductField::DeviceType => "device_type",
        }
    }
}

pub fn is_required(product: &Product, field: ProductField) -> bool {
    match field {
        ProductField::Sku | ProductField::Name => true,
        ProductField::DeviceType => product.kind() == ProductKind::Storable,
    }
}

fn is_present(product: &Product, field: ProductField) -> bool {
    match field {
        ProductField::Sku => !product.sku().trim().is_empty(),
        ProductField::Name => !product.name().trim().is_empty(),
        ProductField::DeviceType => product.device_type().is_some(),
    }
}

/// First required field that is missing, if any.
pub fn missing_field(product: &Product) -> Option<ProductField> {
    [ProductField::Sku, ProductField::Name, ProductField::DeviceType]
        .into_iter()
        .find(|f| is_required(product, *f) && !is_present(product, *f))
}

pub fn ensure_complete(product: &Product) -> DomainResult<()> {
    match missing_field(product) {
        None => Ok(()),
        Some(field) => Err(DomainError::validation(format!(
            "{} is required for {} products",
            field.as_str(),
            product.kind().as_str()
        ))),
    }
}
