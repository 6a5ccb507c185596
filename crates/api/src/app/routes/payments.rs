use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Principal;
use stockledger_infra::StockLedger;
use stockledger_infra::services::RecordPaymentRequest;
use stockledger_purchasing::PaymentId;

use super::{Reply, created_or_replayed};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_payment))
        .route("/:id", get(get_payment))
}

pub async fn record_payment(
    Extension(ledger): Extension<Arc<StockLedger>>,
    Extension(actor): Extension<Principal>,
    body: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> Reply {
    let Json(body) = body.map_err(errors::bad_json)?;
    let receipt = ledger
        .record_payment(body, &actor)
        .map_err(errors::service_error_to_response)?;
    Ok((
        created_or_replayed(receipt.replayed),
        Json(serde_json::json!({
            "success": true,
            "payment_id": receipt.payment_id.to_string(),
            "payment_no": receipt.payment_no,
            "amount": receipt.amount,
            "balance_before": receipt.balance_before,
            "new_balance": receipt.new_balance,
            "replayed": receipt.replayed,
        })),
    )
        .into_response())
}

pub async fn get_payment(Extension(ledger): Extension<Arc<StockLedger>>, Path(id): Path<String>) -> Reply {
    let payment_id: PaymentId = dto::parse_id(&id)?;
    let payment = ledger.payment(payment_id).map_err(errors::service_error_to_response)?;
    Ok(Json(payment).into_response())
}
