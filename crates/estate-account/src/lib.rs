//! Billing of sold properties.
//!
//! Bridges the estate and invoicing modules: a property that actually
//! transitions to `sold` is invoiced to its buyer.

pub mod billing;

pub use billing::{ADMIN_FEE_LABEL, BillingPolicy, SELLING_PRICE_LABEL, sale_invoice};
