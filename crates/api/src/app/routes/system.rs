use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use stockledger_auth::Principal;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(actor): Extension<Principal>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": actor.user_id.to_string(),
        "roles": actor.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "privileged": actor.is_privileged(),
    }))
}
