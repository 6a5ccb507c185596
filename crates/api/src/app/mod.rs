//! HTTP application wiring.
//!
//! - `services.rs`: store backend and ledger service construction
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request DTOs that are not service requests
//! - `errors.rs`: `{"error", "message"}` responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use stockledger_infra::StockLedger;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around a ledger service.
pub fn build_app(ledger: Arc<StockLedger>) -> Router {
    // Every route except health needs an actor.
    let protected = routes::router()
        .layer(Extension(ledger))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
