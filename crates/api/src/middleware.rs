use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use realty_core::{TenantId, UserId};

use crate::app::errors;
use crate::context::RequestContext;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Resolve the caller identity from headers and attach it to the request.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id: TenantId = header_id(req.headers(), TENANT_HEADER)?;
    let user_id: UserId = header_id(req.headers(), USER_HEADER)?;

    req.extensions_mut()
        .insert(RequestContext::new(tenant_id, user_id));

    Ok(next.run(req).await)
}

fn header_id<T: std::str::FromStr>(headers: &HeaderMap, name: &'static str) -> Result<T, Response> {
    let value = headers.get(name).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_identity",
            format!("{name} header is required"),
        )
    })?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_identity",
                format!("{name} must be a UUID"),
            )
        })
}
