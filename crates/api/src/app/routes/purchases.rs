use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Principal;
use stockledger_infra::StockLedger;
use stockledger_infra::services::CreatePurchaseRequest;
use stockledger_purchasing::PurchaseId;

use super::{Reply, created_or_replayed};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase))
        .route("/:id", get(get_purchase))
        .route("/:id/cancel", post(cancel_purchase))
}

pub async fn create_purchase(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    body: Result<Json<CreatePurchaseRequest>, JsonRejection>,
) -> Reply {
    let Json(body) = body.map_err(errors::bad_json)?;
    let receipt = ledger
        .create_purchase(body, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok((
        created_or_replayed(receipt.replayed),
        Json(serde_json::json!({
            "success": true,
            "purchase_id": receipt.purchase_id.to_string(),
            "invoice_no": receipt.invoice_no,
            "total_amount": receipt.total_amount,
            "items_count": receipt.items_count,
            "replayed": receipt.replayed,
        })),
    )
        .into_response())
}

pub async fn get_purchase(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let purchase_id: PurchaseId = dto::parse_id(&id)?;
    let view = ledger.purchase(purchase_id).map_err(errors::service_error_to_response)?;
    Ok(Json(view).into_response())
}

pub async fn cancel_purchase(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> Reply {
    let purchase_id: PurchaseId = dto::parse_id(&id)?;
    let Json(body) = body.map_err(errors::bad_json)?;
    let receipt = ledger
        .cancel_purchase(purchase_id, body.reason(), &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(receipt).into_response())
}
