//! # Storage backend contracts
//!
//! These traits define what a database backend must provide for the order engine to run on it.
//!
//! * [`OrderManagement`] persists orders and performs compare-and-set status transitions. Every transition the engine
//!   makes is a single `UPDATE ... WHERE id = ? AND status = ?`, so concurrent callers can never apply the same
//!   transition twice.
//! * [`CatalogManagement`] provides read access to works and their versions, which drive pricing and delivery.
//! * [`RateLimitManagement`] keeps fixed-window counters in the shared store, so that several service instances
//!   enforce one limit.
mod catalog_management;
mod order_management;
mod rate_limit_management;

pub use catalog_management::CatalogManagement;
pub use order_management::{OrderManagement, OrderQueryFilter};
pub use rate_limit_management::RateLimitManagement;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("An order with number {0} already exists")]
    OrderNumberExists(String),
    #[error("Work {0} does not exist")]
    WorkNotFound(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
