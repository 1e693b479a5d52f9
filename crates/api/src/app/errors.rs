use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use realty_core::AggregateId;
use realty_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    let code = err.code();
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, code, msg),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, code, msg)
        }
        DispatchError::Rejected { message, .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, code, message)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, code, "not found"),
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, code, msg),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

/// Parse a path segment as an aggregate id.
pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, axum::response::Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
