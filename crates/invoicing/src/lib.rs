//! Invoicing domain module (event-sourced).
//!
//! Invoices, their tax sets and the tax documents produced from them,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod dispatch;
pub mod document;
pub mod invoice;
pub mod tax;

pub use dispatch::{Dispatch, DispatchedLine, OrphanLine, dispatch_negative_lines};
pub use document::{
    DocumentIssue, DocumentLine, DocumentState, GlobalDocumentId, TaxDocument, build_batch,
    build_global_document, build_invoice_document,
};
pub use invoice::{
    DocumentStateRecorded, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceIssued,
    InvoiceLine, IssueInvoice, RecordDocumentState,
};
pub use tax::{RoundingMethod, Tax, TaxSet, TaxTotal, compute_tax_totals};
