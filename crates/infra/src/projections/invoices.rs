use serde::Serialize;
use serde_json::Value as JsonValue;

use realty_core::{PartnerId, TenantId};
use realty_events::EventEnvelope;
use realty_invoicing::{DocumentState, GlobalDocumentId, InvoiceEvent, InvoiceId, InvoiceLine};

use crate::projections::cursor::{
    ProjectionError, StreamCursors, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

pub const INVOICE_AGGREGATE: &str = "invoicing.invoice";

/// Queryable invoice read model (header + lines + tax document state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub partner_id: PartnerId,
    pub reference: String,
    pub lines: Vec<InvoiceLine>,
    pub total_amount: i64,
    pub document_state: Option<DocumentState>,
    pub global_document_id: Option<GlobalDocumentId>,
}

#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        let mut items = self.store.list(tenant_id);
        items.sort_by(|a, b| a.reference.cmp(&b.reference));
        items
    }

    /// Invoices whose tax document has never been sent successfully.
    pub fn pending_documents(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|i| !i.document_state.is_some_and(DocumentState::is_success))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != INVOICE_AGGREGATE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let (event_tenant, invoice_id) = ev.stream();
        ensure_same_stream(envelope, event_tenant, invoice_id.0)?;

        let rm = match ev {
            InvoiceEvent::InvoiceIssued(e) => Some(InvoiceReadModel {
                invoice_id: e.invoice_id,
                partner_id: e.partner_id,
                reference: e.reference,
                lines: e.lines,
                total_amount: e.total_amount,
                document_state: None,
                global_document_id: None,
            }),
            InvoiceEvent::DocumentStateRecorded(e) => {
                self.store.get(tenant_id, &invoice_id).map(|mut rm| {
                    rm.document_state = Some(e.state);
                    rm.global_document_id = e.global_document_id;
                    rm
                })
            }
        };

        let Some(rm) = rm else {
            return Err(ProjectionError::NonMonotonicSequence { last: 0, found: seq });
        };
        self.store.upsert(tenant_id, invoice_id, rm);
        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let (tenants, envs) = replay_order(envelopes);
        for t in tenants {
            self.store.clear_tenant(t);
            self.cursors.clear_tenant(t);
        }
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
