//! Error types for the user override layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsfError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UsfResult<T> = Result<T, UsfError>;
