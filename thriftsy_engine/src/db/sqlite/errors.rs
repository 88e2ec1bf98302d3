use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("An order with idempotency key '{0}' already exists")]
    DuplicateIdempotencyKey(String),
}

impl SqliteDatabaseError {
    /// True if the error was caused by a UNIQUE constraint, e.g. two concurrent inserts of the same idempotency key.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::DriverError(sqlx::Error::Database(e)) => e.is_unique_violation(),
            Self::DuplicateIdempotencyKey(_) => true,
            _ => false,
        }
    }
}
