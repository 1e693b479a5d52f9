use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use realty_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use realty_events::Event;

use crate::requirement;

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

/// How the product is handled in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Consumable,
    Service,
    Storable,
}

impl ProductKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductKind::Consumable => "consumable",
            ProductKind::Service => "service",
            ProductKind::Storable => "storable",
        }
    }
}

/// Network equipment category of a stocked device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Ont,
    Stb,
    Cables,
    OtherMaterials,
}

/// Optional pricing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingMetadata {
    pub base_price: Option<u64>, // Price in smallest currency unit (e.g., cents)
    pub currency: Option<String>, // ISO currency code (e.g., "USD", "MXN")
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    kind: ProductKind,
    device_type: Option<DeviceType>,
    status: ProductStatus,
    pricing: PricingMetadata,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            kind: ProductKind::Consumable,
            device_type: None,
            status: ProductStatus::Draft,
            pricing: PricingMetadata::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        self.device_type
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn pricing(&self) -> &PricingMetadata {
        &self.pricing
    }

    /// Check if product can be invoiced (must be Active, not Archived).
    pub fn can_be_sold(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub device_type: Option<DeviceType>,
    pub pricing: Option<PricingMetadata>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeProductKind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProductKind {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: ProductKind,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDeviceType (`None` clears it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDeviceType {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub device_type: Option<DeviceType>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangeProductKind(ChangeProductKind),
    SetDeviceType(SetDeviceType),
    ActivateProduct(ActivateProduct),
    ArchiveProduct(ArchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub device_type: Option<DeviceType>,
    pub pricing: PricingMetadata,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductKindChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductKindChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: ProductKind,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeviceTypeChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTypeChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub device_type: Option<DeviceType>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductKindChanged(ProductKindChanged),
    DeviceTypeChanged(DeviceTypeChanged),
    ProductActivated(ProductActivated),
    ProductArchived(ProductArchived),
}

impl ProductEvent {
    pub fn stream(&self) -> (TenantId, ProductId) {
        match self {
            ProductEvent::ProductCreated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductKindChanged(e) => (e.tenant_id, e.product_id),
            ProductEvent::DeviceTypeChanged(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductActivated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductArchived(e) => (e.tenant_id, e.product_id),
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductKindChanged(_) => "products.product.kind_changed",
            ProductEvent::DeviceTypeChanged(_) => "products.product.device_type_changed",
            ProductEvent::ProductActivated(_) => "products.product.activated",
            ProductEvent::ProductArchived(_) => "products.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductKindChanged(e) => e.occurred_at,
            ProductEvent::DeviceTypeChanged(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.kind = e.kind;
                self.device_type = e.device_type;
                self.status = ProductStatus::Draft;
                self.pricing = e.pricing.clone();
                self.created = true;
            }
            ProductEvent::ProductKindChanged(e) => {
                self.kind = e.kind;
            }
            ProductEvent::DeviceTypeChanged(e) => {
                self.device_type = e.device_type;
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangeProductKind(cmd) => self.handle_change_kind(cmd),
            ProductCommand::SetDeviceType(cmd) => self.handle_set_device_type(cmd),
            ProductCommand::ActivateProduct(cmd) => self.handle_activate(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }?;

        self.ensure_commit_valid(&events)?;
        Ok(events)
    }
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_target(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_product_id(product_id)
    }

    /// Requiredness is checked on the state the events would produce.
    fn ensure_commit_valid(&self, events: &[ProductEvent]) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut next = self.clone();
        for event in events {
            next.apply(event);
        }
        requirement::ensure_complete(&next)
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        // SKU uniqueness per tenant is checked against the read model before dispatch.

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.clone(),
            kind: cmd.kind,
            device_type: cmd.device_type,
            pricing: cmd.pricing.clone().unwrap_or_default(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_kind(&self, cmd: &ChangeProductKind) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if self.kind == cmd.kind {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductKindChanged(ProductKindChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            kind: cmd.kind,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_device_type(&self, cmd: &SetDeviceType) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if self.device_type == cmd.device_type {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::DeviceTypeChanged(DeviceTypeChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            device_type: cmd.device_type,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Active {
            return Err(DomainError::conflict("product is already active"));
        }

        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("archived products cannot be activated"));
        }

        Ok(vec![ProductEvent::ProductActivated(ProductActivated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
