//! Tax documents for single invoices and global (consolidated) invoices.
//!
//! A document is always produced; lines that could not be redistributed are
//! recorded as issues and put the document in a failed state.

use serde::{Deserialize, Serialize};

use realty_core::{AggregateId, DomainError, DomainResult, TenantId};

use crate::dispatch::{DispatchedLine, dispatch_negative_lines};
use crate::invoice::{Invoice, InvoiceId};
use crate::tax::{RoundingMethod, TaxTotal, compute_tax_totals, to_amount};

/// Identifier of a global (consolidated) document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalDocumentId(pub AggregateId);

impl GlobalDocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GlobalDocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    InvoiceSent,
    InvoiceSentFailed,
    #[serde(rename = "ginvoice_sent")]
    GlobalInvoiceSent,
    #[serde(rename = "ginvoice_sent_failed")]
    GlobalInvoiceSentFailed,
}

impl DocumentState {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentState::InvoiceSent => "invoice_sent",
            DocumentState::InvoiceSentFailed => "invoice_sent_failed",
            DocumentState::GlobalInvoiceSent => "ginvoice_sent",
            DocumentState::GlobalInvoiceSentFailed => "ginvoice_sent_failed",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            DocumentState::InvoiceSent | DocumentState::GlobalInvoiceSent
        )
    }

    pub fn is_global(self) -> bool {
        matches!(
            self,
            DocumentState::GlobalInvoiceSent | DocumentState::GlobalInvoiceSentFailed
        )
    }

    fn resolve(global: bool, failed: bool) -> Self {
        match (global, failed) {
            (false, false) => DocumentState::InvoiceSent,
            (false, true) => DocumentState::InvoiceSentFailed,
            (true, false) => DocumentState::GlobalInvoiceSent,
            (true, true) => DocumentState::GlobalInvoiceSentFailed,
        }
    }
}

/// Recoverable problem found while building a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentIssue {
    OrphanNegativeLine {
        invoice_id: InvoiceId,
        line_no: u32,
        amount: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub invoice_id: InvoiceId,
    #[serde(flatten)]
    pub line: DispatchedLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDocument {
    /// Set on global documents only.
    pub global_document_id: Option<GlobalDocumentId>,
    pub invoice_ids: Vec<InvoiceId>,
    pub rounding: RoundingMethod,
    pub lines: Vec<DocumentLine>,
    pub tax_totals: Vec<TaxTotal>,
    pub untaxed_amount: i64,
    pub tax_amount: i64,
    pub total: i64,
    pub issues: Vec<DocumentIssue>,
    pub state: DocumentState,
}

impl TaxDocument {
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }
}

fn ensure_sendable(invoice: &Invoice) -> DomainResult<()> {
    if !invoice.is_created() {
        return Err(DomainError::not_found());
    }
    if !invoice.can_send_document() {
        return Err(DomainError::conflict(format!(
            "tax document already sent for invoice {}",
            invoice.id_typed()
        )));
    }
    Ok(())
}

fn build(
    invoices: &[&Invoice],
    rounding: RoundingMethod,
    global_document_id: Option<GlobalDocumentId>,
) -> DomainResult<TaxDocument> {
    let mut lines = Vec::new();
    let mut issues = Vec::new();

    for invoice in invoices {
        let invoice_id = invoice.id_typed();
        let dispatch = dispatch_negative_lines(invoice.lines());
        issues.extend(dispatch.orphans.iter().map(|o| DocumentIssue::OrphanNegativeLine {
            invoice_id,
            line_no: o.line_no,
            amount: o.amount,
        }));
        lines.extend(
            dispatch
                .lines
                .into_iter()
                .map(|line| DocumentLine { invoice_id, line }),
        );
    }

    let tax_totals = compute_tax_totals(
        lines.iter().map(|l| (l.line.net, &l.line.taxes)),
        rounding,
    )?;
    // Members are bounded one by one; their sum is not.
    let untaxed: i128 = lines.iter().map(|l| l.line.net as i128).sum();
    let taxed: i128 = tax_totals.iter().map(|t| t.amount as i128).sum();
    let untaxed_amount = to_amount(untaxed)?;
    let tax_amount = to_amount(taxed)?;
    let total = to_amount(untaxed + taxed)?;
    let state = DocumentState::resolve(global_document_id.is_some(), !issues.is_empty());

    Ok(TaxDocument {
        global_document_id,
        invoice_ids: invoices.iter().map(|i| i.id_typed()).collect(),
        rounding,
        lines,
        tax_totals,
        untaxed_amount,
        tax_amount,
        total,
        issues,
        state,
    })
}

/// Document for a single invoice.
pub fn build_invoice_document(
    invoice: &Invoice,
    rounding: RoundingMethod,
) -> DomainResult<TaxDocument> {
    ensure_sendable(invoice)?;
    build(&[invoice], rounding, None)
}

/// One document consolidating several invoices of the same tenant.
///
/// Negative lines are redistributed within their own invoice. Any orphan in
/// any member fails the whole document.
pub fn build_global_document(
    global_document_id: GlobalDocumentId,
    invoices: &[&Invoice],
    rounding: RoundingMethod,
) -> DomainResult<TaxDocument> {
    let Some(first) = invoices.first() else {
        return Err(DomainError::validation(
            "a global document needs at least one invoice",
        ));
    };

    let tenant_id: Option<TenantId> = first.tenant_id();
    for (idx, invoice) in invoices.iter().enumerate() {
        ensure_sendable(invoice)?;
        if invoice.tenant_id() != tenant_id {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if invoices[..idx]
            .iter()
            .any(|other| other.id_typed() == invoice.id_typed())
        {
            return Err(DomainError::validation(format!(
                "invoice {} listed twice",
                invoice.id_typed()
            )));
        }
    }

    build(invoices, rounding, Some(global_document_id))
}

/// Single-invoice documents for each invoice, independently.
pub fn build_batch<'a, I>(
    invoices: I,
    rounding: RoundingMethod,
) -> Vec<(InvoiceId, DomainResult<TaxDocument>)>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    invoices
        .into_iter()
        .map(|invoice| (invoice.id_typed(), build_invoice_document(invoice, rounding)))
        .collect()
}
