//! Request DTOs that are not service requests themselves, plus path parsing.

use std::str::FromStr;

use axum::response::Response;
use serde::Deserialize;

use stockledger_core::DomainError;
use stockledger_infra::services::LegacyLedgerRow;

use crate::app::errors;

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReasonRequest {
    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ImportLedgerRequest {
    pub entries: Vec<LegacyLedgerRow>,
}

/// Parse a typed id out of a path segment.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}
