use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use realty_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PartnerId, TenantId};
use realty_events::Event;
use realty_products::ProductId;

use crate::document::{DocumentState, GlobalDocumentId};
use crate::tax::{BASIS_POINTS, TaxSet, round_half_away};

/// Invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice line. A negative quantity is a correction (return, rebate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub label: String,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    /// Discount in basis points (10000 = 100%).
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub taxes: TaxSet,
}

impl InvoiceLine {
    /// `quantity * unit_price` before discount.
    pub fn gross(&self) -> i64 {
        (self.quantity as i128 * self.unit_price as i128) as i64
    }

    /// `quantity * unit_price * (1 - discount)`, rounded half away from zero.
    pub fn subtotal(&self) -> i64 {
        let gross = self.quantity as i128 * self.unit_price as i128;
        let kept_bp = BASIS_POINTS - self.discount_bp.min(10_000) as i128;
        round_half_away(gross * kept_bp, BASIS_POINTS) as i64
    }

    pub fn is_negative(&self) -> bool {
        self.quantity < 0
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.discount_bp as i128 > BASIS_POINTS {
            return Err(DomainError::validation(
                "invoice line discount cannot exceed 100%",
            ));
        }
        let gross = (self.quantity as i128)
            .checked_mul(self.unit_price as i128)
            .ok_or_else(|| DomainError::invariant("invoice line amount overflow"))?;
        if i64::try_from(gross).is_err() {
            return Err(DomainError::invariant("invoice line amount overflow"));
        }
        Ok(())
    }
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    partner_id: Option<PartnerId>,
    reference: String,
    lines: Vec<InvoiceLine>,
    total_amount: i64,
    document_state: Option<DocumentState>,
    global_document_id: Option<GlobalDocumentId>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            partner_id: None,
            reference: String::new(),
            lines: Vec::new(),
            total_amount: 0,
            document_state: None,
            global_document_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn partner_id(&self) -> Option<PartnerId> {
        self.partner_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn document_state(&self) -> Option<DocumentState> {
        self.document_state
    }

    pub fn global_document_id(&self) -> Option<GlobalDocumentId> {
        self.global_document_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// No document yet, or the last attempt failed.
    pub fn can_send_document(&self) -> bool {
        self.created && !self.document_state.is_some_and(DocumentState::is_success)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub partner_id: PartnerId,
    pub reference: String,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDocumentState.
///
/// Records the outcome of a tax document produced for this invoice, either on
/// its own or as a member of a global document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDocumentState {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub state: DocumentState,
    pub global_document_id: Option<GlobalDocumentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    RecordDocumentState(RecordDocumentState),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub partner_id: PartnerId,
    pub reference: String,
    pub lines: Vec<InvoiceLine>,
    pub total_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentStateRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStateRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub state: DocumentState,
    pub global_document_id: Option<GlobalDocumentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    DocumentStateRecorded(DocumentStateRecorded),
}

impl InvoiceEvent {
    pub fn stream(&self) -> (TenantId, InvoiceId) {
        match self {
            InvoiceEvent::InvoiceIssued(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::DocumentStateRecorded(e) => (e.tenant_id, e.invoice_id),
        }
    }
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::DocumentStateRecorded(_) => "invoicing.invoice.document_state_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::DocumentStateRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.partner_id = Some(e.partner_id);
                self.reference = e.reference.clone();
                self.lines = e.lines.clone();
                self.total_amount = e.total_amount;
                self.document_state = None;
                self.global_document_id = None;
                self.created = true;
            }
            InvoiceEvent::DocumentStateRecorded(e) => {
                self.document_state = Some(e.state);
                self.global_document_id = e.global_document_id;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::RecordDocumentState(cmd) => self.handle_record_document_state(cmd),
        }
    }
}

impl Invoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without lines"));
        }

        let mut total: i64 = 0;
        // Positive lines alone must fit, so redistribution never overflows.
        let mut positive: i64 = 0;
        for (idx, line) in cmd.lines.iter().enumerate() {
            line.validate()?;
            if cmd.lines[..idx].iter().any(|l| l.line_no == line.line_no) {
                return Err(DomainError::validation(format!(
                    "duplicate invoice line number {}",
                    line.line_no
                )));
            }
            let subtotal = line.subtotal();
            total = total
                .checked_add(subtotal)
                .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
            if subtotal > 0 {
                positive = positive
                    .checked_add(subtotal)
                    .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
            }
        }

        if total < 0 {
            return Err(DomainError::validation("invoice total cannot be negative"));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            partner_id: cmd.partner_id,
            reference: cmd.reference.clone(),
            lines: cmd.lines.clone(),
            total_amount: total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_document_state(
        &self,
        cmd: &RecordDocumentState,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if cmd.state.is_global() != cmd.global_document_id.is_some() {
            return Err(DomainError::validation(
                "global document states require a global document id",
            ));
        }

        if !self.can_send_document() {
            return Err(DomainError::conflict("tax document already sent"));
        }

        Ok(vec![InvoiceEvent::DocumentStateRecorded(DocumentStateRecorded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            state: cmd.state,
            global_document_id: cmd.global_document_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
