use chrono::NaiveDate;
use serde::Deserialize;

use realty_core::{PartnerId, UserId};
use realty_estate::{GardenOrientation, PropertyDetails, PropertyTypeId, TagId};
use realty_invoicing::{InvoiceId, InvoiceLine, Tax};
use realty_products::{DeviceType, PricingMetadata, ProductId, ProductKind};

// -------------------------
// Estate
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    pub expected_price: u64,
    pub description: Option<String>,
    pub postcode: Option<String>,
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub living_area: u32,
    #[serde(default)]
    pub facades: u32,
    #[serde(default)]
    pub garage: bool,
    #[serde(default)]
    pub garden: bool,
    #[serde(default)]
    pub garden_area: u32,
    pub garden_orientation: Option<GardenOrientation>,
    pub date_available: Option<NaiveDate>,
    pub property_type_id: Option<PropertyTypeId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    /// Defaults to the calling user.
    pub salesperson_id: Option<UserId>,
}

impl CreatePropertyRequest {
    pub fn details(&self) -> PropertyDetails {
        let mut details = PropertyDetails::new(self.name.clone(), self.expected_price);
        details.description = self.description.clone();
        details.postcode = self.postcode.clone();
        if let Some(bedrooms) = self.bedrooms {
            details.bedrooms = bedrooms;
        }
        details.living_area = self.living_area;
        details.facades = self.facades;
        details.garage = self.garage;
        details.garden = self.garden;
        details.garden_area = self.garden_area;
        details.garden_orientation = self.garden_orientation;
        details.date_available = self.date_available;
        details.property_type_id = self.property_type_id;
        details.tag_ids = self.tag_ids.clone();
        details
    }
}

#[derive(Debug, Deserialize)]
pub struct RevisePriceRequest {
    pub expected_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetGardenRequest {
    pub garden: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetClassificationRequest {
    pub property_type_id: Option<PropertyTypeId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveOfferRequest {
    pub partner_id: PartnerId,
    pub price: u64,
    pub validity_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetOfferValidityRequest {
    pub validity_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetOfferDeadlineRequest {
    pub date_deadline: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ListPropertiesQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePropertyTypeRequest {
    pub name: String,
    pub sequence: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(default)]
    pub color: u32,
}

// -------------------------
// Invoicing
// -------------------------

#[derive(Debug, Deserialize)]
pub struct InvoiceLineRequest {
    pub product_id: Option<ProductId>,
    pub label: String,
    pub quantity: i64,
    pub unit_price: u64,
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub taxes: Vec<Tax>,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    pub partner_id: PartnerId,
    pub reference: String,
    pub lines: Vec<InvoiceLineRequest>,
}

impl IssueInvoiceRequest {
    /// Lines numbered from 1 in request order.
    pub fn lines(self) -> Vec<InvoiceLine> {
        self.lines
            .into_iter()
            .zip(1u32..)
            .map(|(l, line_no)| InvoiceLine {
                line_no,
                product_id: l.product_id,
                label: l.label,
                quantity: l.quantity,
                unit_price: l.unit_price,
                discount_bp: l.discount_bp,
                taxes: l.taxes.into_iter().collect(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoiceSelectionRequest {
    pub invoice_ids: Vec<InvoiceId>,
}

// -------------------------
// Products
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub device_type: Option<DeviceType>,
    pub pricing: Option<PricingMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeProductKindRequest {
    pub kind: ProductKind,
}

#[derive(Debug, Deserialize)]
pub struct SetDeviceTypeRequest {
    pub device_type: Option<DeviceType>,
}
