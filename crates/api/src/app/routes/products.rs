use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use realty_core::{AggregateId, TenantId};
use realty_products::{
    ActivateProduct, ArchiveProduct, ChangeProductKind, CreateProduct, ProductCommand, ProductId,
    SetDeviceType,
};

use crate::app::routes::{accepted, created};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/kind", post(change_kind))
        .route("/:id/device-type", post(set_device_type))
        .route("/:id/activate", post(activate_product))
        .route("/:id/archive", post(archive_product))
}

fn run(
    services: &AppServices,
    ctx: RequestContext,
    id: &str,
    command: impl FnOnce(TenantId, ProductId) -> ProductCommand,
) -> axum::response::Response {
    let product_id = match errors::parse_id(id, "product") {
        Ok(agg) => ProductId::new(agg),
        Err(res) => return res,
    };
    let tenant_id = ctx.tenant_id();
    accepted(
        product_id,
        services.product_command(tenant_id, product_id, command(tenant_id, product_id)),
    )
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let product_id = ProductId::new(AggregateId::new());
    let cmd = CreateProduct {
        tenant_id: ctx.tenant_id(),
        product_id,
        sku: body.sku,
        name: body.name,
        kind: body.kind,
        device_type: body.device_type,
        pricing: body.pricing,
        occurred_at: Utc::now(),
    };
    created(product_id, services.create_product(cmd))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    Json(services.products(ctx.tenant_id())).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match errors::parse_id(&id, "product") {
        Ok(agg) => ProductId::new(agg),
        Err(res) => return res,
    };
    match services.product(ctx.tenant_id(), product_id) {
        Some(rm) => Json(rm).into_response(),
        None => errors::not_found("product"),
    }
}

pub async fn change_kind(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeProductKindRequest>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, product_id| {
        ProductCommand::ChangeProductKind(ChangeProductKind {
            tenant_id,
            product_id,
            kind: body.kind,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn set_device_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetDeviceTypeRequest>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, product_id| {
        ProductCommand::SetDeviceType(SetDeviceType {
            tenant_id,
            product_id,
            device_type: body.device_type,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, product_id| {
        ProductCommand::ActivateProduct(ActivateProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, product_id| {
        ProductCommand::ArchiveProduct(ArchiveProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        })
    })
}
