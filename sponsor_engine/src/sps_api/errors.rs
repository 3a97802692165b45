use thiserror::Error;

use crate::{
    db_types::{DeliveryLinks, OrderStatusType},
    refunds::RefundError,
    traits::StoreError,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Work {0} does not exist")]
    WorkNotFound(i64),
    #[error("This work has nothing to deliver yet")]
    NothingToDeliver,
    #[error("You have already purchased this work")]
    AlreadyPurchased(DeliveryLinks),
    #[error("The requested order does not exist")]
    OrderNotFound,
    #[error("An order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("{0}")]
    RefundFailed(#[from] RefundError),
    #[error("Payment amount {received} does not match the order amount {expected} (minor units)")]
    AmountMismatch { expected: i64, received: i64 },
    #[error("{0}")]
    StoreError(#[from] StoreError),
}
