use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/types", get(list_property_types).post(create_property_type))
        .route("/tags", get(list_tags).post(create_tag))
}

pub async fn create_property_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreatePropertyTypeRequest>,
) -> axum::response::Response {
    match services.add_property_type(ctx.tenant_id(), &body.name, body.sequence) {
        Ok(added) => (StatusCode::CREATED, Json(added)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_property_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match services.property_types(ctx.tenant_id()) {
        Ok(types) => Json(types).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_tag(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateTagRequest>,
) -> axum::response::Response {
    match services.add_tag(ctx.tenant_id(), &body.name, body.color) {
        Ok(added) => (StatusCode::CREATED, Json(added)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_tags(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match services.tags(ctx.tenant_id()) {
        Ok(tags) => Json(tags).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
