use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": ctx.tenant_id().to_string(),
        "user_id": ctx.user_id().to_string(),
    }))
}

/// Rebuild the caller tenant's read models from the event store.
pub async fn rebuild(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match services.rebuild_read_models(ctx.tenant_id()) {
        Ok(replayed) => Json(serde_json::json!({ "events_replayed": replayed })).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
