//! Projections (read model builders).
//!
//! Projections consume committed events and build query-optimized read models.
//! All of them are:
//! - **Rebuildable**: can be reconstructed from the event streams
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: replaying an already-seen sequence number is a no-op

pub mod cursor;
pub mod invoices;
pub mod products;
pub mod properties;

pub use cursor::{ProjectionError, StreamCursors};
pub use invoices::{INVOICE_AGGREGATE, InvoiceReadModel, InvoicesProjection};
pub use products::{PRODUCT_AGGREGATE, ProductCatalogProjection, ProductReadModel};
pub use properties::{PROPERTY_AGGREGATE, PropertiesProjection, PropertyReadModel};
