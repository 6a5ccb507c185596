use thiserror::Error;

use stockledger_auth::AuthzError;
use stockledger_core::DomainError;
use stockledger_events::ProjectionError;

use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Store(String),

    #[error("read model update failed: {0}")]
    Projection(#[from] ProjectionError),

    #[error("read model rebuild failed: {0}")]
    Replay(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

impl ServiceError {
    /// Stable error kind for API mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Domain(e) => e.kind(),
            _ => "internal_error",
        }
    }
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => ServiceError::Domain(e),
            // Retries exhausted: the caller may try again.
            DispatchError::Concurrency(msg) => ServiceError::Domain(DomainError::conflict(format!(
                "concurrent update, please retry ({msg})"
            ))),
            other => ServiceError::Store(other.to_string()),
        }
    }
}

impl From<EventStoreError> for ServiceError {
    fn from(value: EventStoreError) -> Self {
        DispatchError::from(value).into()
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}
