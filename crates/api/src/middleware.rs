//! Actor resolution.
//!
//! Authentication happens at the gateway in front of this service; it
//! forwards the caller as `x-actor-id` (UUID) and `x-actor-roles`
//! (comma-separated role names). Requests without a valid actor are refused
//! before any handler runs.

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use stockledger_auth::{Principal, Role};
use stockledger_core::UserId;

use crate::app::errors;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

pub async fn actor_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let principal = match extract_actor(req.headers()) {
        Ok(p) => p,
        Err(message) => return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message),
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Result<Principal, &'static str> {
    let raw_id = headers
        .get(ACTOR_ID_HEADER)
        .ok_or("missing x-actor-id header")?
        .to_str()
        .map_err(|_| "x-actor-id is not valid ASCII")?;
    let user_id: Uuid = raw_id.trim().parse().map_err(|_| "x-actor-id must be a UUID")?;

    let roles = match headers.get(ACTOR_ROLES_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| "x-actor-roles is not valid ASCII")?
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| Role::new(r.to_ascii_lowercase()))
            .collect(),
        None => Vec::new(),
    };

    Ok(Principal::with_roles(UserId::from_uuid(user_id), roles))
}
