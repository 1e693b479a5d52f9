//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store, dispatcher, read models and catalogs
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig) -> Router {
    let services = Arc::new(services::build_services(config));

    // Tenant-scoped routes: require caller identity headers.
    let scoped = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(scoped)
        .layer(ServiceBuilder::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use realty_core::{TenantId, UserId};
    use tower::ServiceExt;

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_identity() {
        let app = build_app(&ApiConfig::default());
        let res = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn scoped_routes_require_a_tenant() {
        let app = build_app(&ApiConfig::default());
        let res = app
            .oneshot(
                Request::get("/properties")
                    .header(middleware::USER_HEADER, UserId::new().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "missing_identity");
    }

    #[tokio::test]
    async fn whoami_echoes_the_identity() {
        let app = build_app(&ApiConfig::default());
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let res = app
            .oneshot(
                Request::get("/whoami")
                    .header(middleware::TENANT_HEADER, tenant_id.to_string())
                    .header(middleware::USER_HEADER, user_id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["tenant_id"], tenant_id.to_string());
        assert_eq!(body["user_id"], user_id.to_string());
    }
}
