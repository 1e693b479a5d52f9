use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use realty_infra::command_dispatcher::DispatchError;
use realty_infra::event_store::StoredEvent;

use crate::app::errors;

pub mod catalog;
pub mod invoices;
pub mod products;
pub mod properties;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/admin/rebuild", post(system::rebuild))
        .nest("/properties", properties::router())
        .nest("/catalog", catalog::router())
        .nest("/invoices", invoices::router())
        .nest("/products", products::router())
}

/// `201` for a newly created aggregate.
pub(crate) fn created(
    id: impl ToString,
    result: Result<Vec<StoredEvent>, DispatchError>,
) -> axum::response::Response {
    match result {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// `200` for a command on an existing aggregate. No-ops commit zero events.
pub(crate) fn accepted(
    id: impl ToString,
    result: Result<Vec<StoredEvent>, DispatchError>,
) -> axum::response::Response {
    match result {
        Ok(committed) => Json(serde_json::json!({
            "id": id.to_string(),
            "events_committed": committed.len(),
        }))
        .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
