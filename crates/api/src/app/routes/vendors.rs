use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Principal;
use stockledger_infra::StockLedger;
use stockledger_infra::services::RegisterVendorRequest;
use stockledger_vendors::VendorId;

use super::Reply;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_vendor).get(list_vendors))
        .route("/:id/summary", get(vendor_summary))
        .route("/:id/deactivate", post(deactivate_vendor))
        .route("/:id/transactions", get(vendor_transactions))
        .route("/:id/purchases", get(vendor_purchases))
        .route("/:id/payments", get(vendor_payments))
        .route("/:id/reconcile", post(reconcile_vendor))
        .route("/:id/ledger/import", post(import_ledger))
        .route("/:id/verify", get(verify_vendor))
}

pub async fn register_vendor(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    body: Result<Json<RegisterVendorRequest>, JsonRejection>,
) -> Reply {
    let Json(body) = body.map_err(errors::bad_json)?;
    let account = ledger
        .register_vendor(body, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": account.vendor_id.to_string(),
            "account": account,
        })),
    )
        .into_response())
}

pub async fn list_vendors(Extension(ledger): Extension<Arc<StockLedger>>) -> impl IntoResponse {
    Json(ledger.vendors())
}

pub async fn vendor_summary(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    let account = ledger
        .vendor_summary(vendor_id)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(account).into_response())
}

pub async fn deactivate_vendor(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    let Json(body) = body.map_err(errors::bad_json)?;
    let account = ledger
        .deactivate_vendor(vendor_id, body.reason, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(account).into_response())
}

pub async fn vendor_transactions(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Path(id): Path<String>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    let Query(page) = query
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))?;
    let page = ledger
        .vendor_transactions(vendor_id, page.limit, page.offset)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(page).into_response())
}

pub async fn vendor_purchases(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    ledger
        .vendor_summary(vendor_id)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(ledger.vendor_purchases(vendor_id)).into_response())
}

pub async fn vendor_payments(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    ledger
        .vendor_summary(vendor_id)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(ledger.vendor_payments(vendor_id)).into_response())
}

pub async fn reconcile_vendor(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    let report = ledger
        .reconcile_vendor(vendor_id, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(report).into_response())
}

pub async fn import_ledger(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ImportLedgerRequest>, JsonRejection>,
) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    let Json(body) = body.map_err(errors::bad_json)?;
    let report = ledger
        .import_legacy_ledger(vendor_id, body.entries, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(report).into_response())
}

pub async fn verify_vendor(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let vendor_id: VendorId = dto::parse_id(&id)?;
    let report = ledger
        .verify_vendor(vendor_id)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(report).into_response())
}
