use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Principal;
use stockledger_infra::StockLedger;
use stockledger_infra::services::RegisterVariantRequest;
use stockledger_inventory::VariantId;

use super::Reply;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_variant).get(list_variants))
        .route("/:id", get(get_variant))
}

pub async fn register_variant(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    body: Result<Json<RegisterVariantRequest>, JsonRejection>,
) -> Reply {
    let Json(body) = body.map_err(errors::bad_json)?;
    let stock = ledger
        .register_variant(body, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": stock.variant_id.to_string(),
            "stock": stock,
        })),
    )
        .into_response())
}

pub async fn list_variants(Extension(ledger): Extension<Arc<StockLedger>>) -> impl IntoResponse {
    Json(ledger.variants())
}

pub async fn get_variant(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let variant_id: VariantId = dto::parse_id(&id)?;
    let stock = ledger.variant(variant_id).map_err(errors::service_error_to_response)?;
    Ok(Json(stock).into_response())
}
