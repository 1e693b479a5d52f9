use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use realty_core::{AggregateId, TenantId};
use realty_estate::{
    ArchiveProperty, ConfirmOffer, CreateProperty, DeclineOffer, MarkCanceled, OfferId,
    PropertyCommand, PropertyId, ReceiveOffer, RestoreProperty, ReviseExpectedPrice,
    SetClassification, SetGarden, SetOfferDeadline, SetOfferValidity,
};

use crate::app::routes::{accepted, created};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_property).get(list_properties))
        .route("/:id", get(get_property))
        .route("/:id/expected-price", post(revise_expected_price))
        .route("/:id/garden", post(set_garden))
        .route("/:id/classification", post(set_classification))
        .route("/:id/offers", post(receive_offer))
        .route("/:id/offers/:offer_id/validity", post(set_offer_validity))
        .route("/:id/offers/:offer_id/deadline", post(set_offer_deadline))
        .route("/:id/offers/:offer_id/confirm", post(confirm_offer))
        .route("/:id/offers/:offer_id/decline", post(decline_offer))
        .route("/:id/sell", post(sell_property))
        .route("/:id/cancel", post(cancel_property))
        .route("/:id/archive", post(archive_property))
        .route("/:id/restore", post(restore_property))
}

fn property_id(raw: &str) -> Result<PropertyId, axum::response::Response> {
    errors::parse_id(raw, "property").map(PropertyId::new)
}

fn offer_id(raw: &str) -> Result<OfferId, axum::response::Response> {
    errors::parse_id(raw, "offer").map(OfferId::new)
}

/// Dispatch a command against an existing property.
fn run(
    services: &AppServices,
    ctx: RequestContext,
    id: &str,
    command: impl FnOnce(TenantId, PropertyId) -> PropertyCommand,
) -> axum::response::Response {
    let property_id = match property_id(id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let tenant_id = ctx.tenant_id();
    accepted(
        property_id,
        services.property_command(tenant_id, property_id, command(tenant_id, property_id)),
    )
}

pub async fn create_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreatePropertyRequest>,
) -> axum::response::Response {
    let property_id = PropertyId::new(AggregateId::new());
    let cmd = CreateProperty {
        tenant_id: ctx.tenant_id(),
        property_id,
        details: body.details(),
        salesperson_id: body.salesperson_id,
        actor: ctx.user_id(),
        occurred_at: Utc::now(),
    };
    created(property_id, services.create_property(cmd))
}

pub async fn list_properties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<dto::ListPropertiesQuery>,
) -> axum::response::Response {
    Json(services.properties(ctx.tenant_id(), query.include_archived)).into_response()
}

pub async fn get_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let property_id = match property_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.property(ctx.tenant_id(), property_id) {
        Some(rm) => Json(rm).into_response(),
        None => errors::not_found("property"),
    }
}

pub async fn revise_expected_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RevisePriceRequest>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::ReviseExpectedPrice(ReviseExpectedPrice {
            tenant_id,
            property_id,
            expected_price: body.expected_price,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn set_garden(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetGardenRequest>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::SetGarden(SetGarden {
            tenant_id,
            property_id,
            garden: body.garden,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn set_classification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetClassificationRequest>,
) -> axum::response::Response {
    let property_id = match property_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let cmd = SetClassification {
        tenant_id: ctx.tenant_id(),
        property_id,
        property_type_id: body.property_type_id,
        tag_ids: body.tag_ids,
        occurred_at: Utc::now(),
    };
    accepted(property_id, services.set_classification(cmd))
}

pub async fn receive_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveOfferRequest>,
) -> axum::response::Response {
    let property_id = match property_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let offer_id = OfferId::new(AggregateId::new());
    let cmd = PropertyCommand::ReceiveOffer(ReceiveOffer {
        tenant_id: ctx.tenant_id(),
        property_id,
        offer_id,
        partner_id: body.partner_id,
        price: body.price,
        validity_days: body.validity_days,
        occurred_at: Utc::now(),
    });
    created(offer_id.0, services.property_command(ctx.tenant_id(), property_id, cmd))
}

pub async fn set_offer_validity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, offer)): Path<(String, String)>,
    Json(body): Json<dto::SetOfferValidityRequest>,
) -> axum::response::Response {
    let offer_id = match offer_id(&offer) {
        Ok(v) => v,
        Err(res) => return res,
    };
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::SetOfferValidity(SetOfferValidity {
            tenant_id,
            property_id,
            offer_id,
            validity_days: body.validity_days,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn set_offer_deadline(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, offer)): Path<(String, String)>,
    Json(body): Json<dto::SetOfferDeadlineRequest>,
) -> axum::response::Response {
    let offer_id = match offer_id(&offer) {
        Ok(v) => v,
        Err(res) => return res,
    };
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::SetOfferDeadline(SetOfferDeadline {
            tenant_id,
            property_id,
            offer_id,
            date_deadline: body.date_deadline,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn confirm_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, offer)): Path<(String, String)>,
) -> axum::response::Response {
    let offer_id = match offer_id(&offer) {
        Ok(v) => v,
        Err(res) => return res,
    };
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::ConfirmOffer(ConfirmOffer {
            tenant_id,
            property_id,
            offer_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn decline_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, offer)): Path<(String, String)>,
) -> axum::response::Response {
    let offer_id = match offer_id(&offer) {
        Ok(v) => v,
        Err(res) => return res,
    };
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::DeclineOffer(DeclineOffer {
            tenant_id,
            property_id,
            offer_id,
            occurred_at: Utc::now(),
        })
    })
}

/// Sells the property and returns the buyer's invoice id when one was issued.
pub async fn sell_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let property_id = match property_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.sell_property(ctx.tenant_id(), property_id, Utc::now()) {
        Ok(outcome) => Json(serde_json::json!({
            "id": property_id.to_string(),
            "events_committed": outcome.events_committed,
            "invoice_id": outcome.invoice_id.map(|i| i.to_string()),
        }))
        .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::MarkCanceled(MarkCanceled {
            tenant_id,
            property_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn archive_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::ArchiveProperty(ArchiveProperty {
            tenant_id,
            property_id,
            occurred_at: Utc::now(),
        })
    })
}

pub async fn restore_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    run(&services, ctx, &id, |tenant_id, property_id| {
        PropertyCommand::RestoreProperty(RestoreProperty {
            tenant_id,
            property_id,
            occurred_at: Utc::now(),
        })
    })
}
