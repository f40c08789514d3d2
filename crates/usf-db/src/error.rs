//! Errors of the override store and how they surface as [`UsfError`].

use usf_core::error::UsfError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    /// A schema statement or its bookkeeping was rejected.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// A data statement reached the server but did not succeed.
    #[error("{statement} on {table} rejected: {message}")]
    Write {
        statement: &'static str,
        table: &'static str,
        message: String,
    },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Stored row could not be decoded: {0}")]
    Decode(String),
}

impl DbError {
    /// Adapter for `.check().map_err(..)` on data statements.
    pub(crate) fn write(
        statement: &'static str,
        table: &'static str,
    ) -> impl FnOnce(surrealdb::Error) -> Self {
        move |err| DbError::Write {
            statement,
            table,
            message: err.to_string(),
        }
    }
}

impl From<DbError> for UsfError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => UsfError::NotFound { entity, id },
            DbError::Decode(message) => {
                UsfError::Internal(format!("corrupt override row: {message}"))
            }
            other => UsfError::Database(other.to_string()),
        }
    }
}
