//! Infrastructure layer: event stores, the unit-of-work dispatcher, read
//! models and the application services built on them.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;

#[cfg(test)]
mod integration_tests;

pub use services::{ServiceError, StockLedger, WorkflowConfig};
