use axum::Router;
use axum::http::StatusCode;
use axum::response::Response;

pub mod inventory;
pub mod payments;
pub mod purchases;
pub mod system;
pub mod variants;
pub mod vendors;

/// Handlers answer with a ready response either way.
pub type Reply = Result<Response, Response>;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", axum::routing::get(system::whoami))
        .nest("/vendors", vendors::router())
        .nest("/variants", variants::router())
        .nest("/purchases", purchases::router())
        .nest("/payments", payments::router())
        .nest("/inventory", inventory::router())
}

/// A retried request that was already recorded answers 200 instead of 201.
pub(crate) fn created_or_replayed(replayed: bool) -> StatusCode {
    if replayed { StatusCode::OK } else { StatusCode::CREATED }
}
