//! USF Database — SurrealDB connection management and the override
//! record store.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - [`repository::SurrealOverrideRepository`], the `usf-core`
//!   [`OverrideRepository`](usf_core::repository::OverrideRepository)
//!   implementation

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
