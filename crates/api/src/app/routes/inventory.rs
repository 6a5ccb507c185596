use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Principal;
use stockledger_infra::StockLedger;
use stockledger_infra::services::{CreateTransactionRequest, TransactionReceipt};
use stockledger_inventory::InventoryTransactionId;

use super::{Reply, created_or_replayed};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route("/transactions/pending", get(pending_transactions))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/approve", post(approve_transaction))
        .route("/transactions/:id/reject", post(reject_transaction))
        .route("/transactions/:id/void", post(void_transaction))
}

fn receipt_json(receipt: &TransactionReceipt) -> serde_json::Value {
    serde_json::json!({
        "id": receipt.transaction_id.to_string(),
        "transaction_type": receipt.transaction_type,
        "invoice_no": receipt.invoice_no,
        "status": receipt.status,
        "requires_approval": receipt.requires_approval,
        "items": receipt.items,
        "replayed": receipt.replayed,
    })
}

pub async fn create_transaction(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Reply {
    let Json(body) = body.map_err(errors::bad_json)?;
    let receipt = ledger
        .create_transaction(body, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok((created_or_replayed(receipt.replayed), Json(receipt_json(&receipt))).into_response())
}

pub async fn pending_transactions(Extension(ledger): Extension<Arc<StockLedger>>) -> impl IntoResponse {
    Json(ledger.pending_transactions())
}

pub async fn get_transaction(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let transaction_id: InventoryTransactionId = dto::parse_id(&id)?;
    let view = ledger
        .transaction(transaction_id)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(view).into_response())
}

pub async fn approve_transaction(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
) -> Reply {
    let transaction_id: InventoryTransactionId = dto::parse_id(&id)?;
    let receipt = ledger
        .approve_transaction(transaction_id, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(receipt_json(&receipt)).into_response())
}

pub async fn reject_transaction(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> Reply {
    let transaction_id: InventoryTransactionId = dto::parse_id(&id)?;
    let Json(body) = body.map_err(errors::bad_json)?;
    let receipt = ledger
        .reject_transaction(transaction_id, body.reason(), &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(receipt_json(&receipt)).into_response())
}

pub async fn void_transaction(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> Reply {
    let transaction_id: InventoryTransactionId = dto::parse_id(&id)?;
    let Json(body) = body.map_err(errors::bad_json)?;
    let receipt = ledger
        .void_transaction(transaction_id, body.reason(), &actor)
        .map_err(errors::service_error_to_response)?;
    Ok(Json(receipt_json(&receipt)).into_response())
}
