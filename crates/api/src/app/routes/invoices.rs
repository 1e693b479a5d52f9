use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use realty_core::AggregateId;
use realty_invoicing::{InvoiceCommand, InvoiceId, IssueInvoice};

use crate::app::routes::created;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/send", post(send_tax_document))
        .route("/documents/global", post(send_global_document))
        .route("/documents/batch", post(send_batch))
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    /// Only invoices without a successfully sent tax document.
    #[serde(default)]
    pub pending: bool,
}

fn invoice_id(raw: &str) -> Result<InvoiceId, axum::response::Response> {
    errors::parse_id(raw, "invoice").map(InvoiceId::new)
}

pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::IssueInvoiceRequest>,
) -> axum::response::Response {
    let invoice_id = InvoiceId::new(AggregateId::new());
    let partner_id = body.partner_id;
    let reference = body.reference.clone();
    let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
        tenant_id: ctx.tenant_id(),
        invoice_id,
        partner_id,
        reference,
        lines: body.lines(),
        occurred_at: Utc::now(),
    });
    created(invoice_id, services.invoice_command(ctx.tenant_id(), invoice_id, cmd))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListInvoicesQuery>,
) -> axum::response::Response {
    Json(services.invoices(ctx.tenant_id(), query.pending)).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.invoice(ctx.tenant_id(), invoice_id) {
        Some(rm) => Json(rm).into_response(),
        None => errors::not_found("invoice"),
    }
}

/// Build, record and return the invoice's tax document.
pub async fn send_tax_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match invoice_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.send_tax_document(ctx.tenant_id(), invoice_id) {
        Ok(document) => Json(document).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn send_global_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::InvoiceSelectionRequest>,
) -> axum::response::Response {
    match services.send_global_document(ctx.tenant_id(), &body.invoice_ids) {
        Ok(document) => Json(document).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn send_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::InvoiceSelectionRequest>,
) -> axum::response::Response {
    Json(services.send_batch(ctx.tenant_id(), &body.invoice_ids)).into_response()
}
