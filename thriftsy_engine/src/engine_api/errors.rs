use thiserror::Error;

use crate::{
    db::traits::StoreError,
    db_types::{OrderId, OrderStatusType, PaymentStatus},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("A buyer identity is required to place an order")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} kept changing underneath the request. Giving up after {1} attempts.")]
    Conflict(OrderId, usize),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn forbidden_status_change(from: OrderStatusType, to: OrderStatusType) -> Self {
        Self::Forbidden(format!("Order status cannot change from {from} to {to}"))
    }

    pub fn forbidden_payment_change(from: PaymentStatus, to: PaymentStatus) -> Self {
        Self::Forbidden(format!("Payment status cannot change from {from} to {to}"))
    }
}

impl From<StoreError> for OrderFlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::InvalidRequest(s) => Self::InvalidRequest(s),
            StoreError::DatabaseError(s) => Self::DatabaseError(s),
        }
    }
}
