//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Callers await them before
//! continuing; nothing here is fire-and-forget.

use crate::error::UsfResult;
use crate::models::identity::Identity;
use crate::models::record::{OverrideRecord, UpsertOverride};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Override records (keyed by account identity)
// ---------------------------------------------------------------------------

pub trait OverrideRepository: Send + Sync {
    /// Fetch the record of `identity`. `Ok(None)` when nothing is stored.
    fn get(
        &self,
        identity: Identity,
    ) -> impl Future<Output = UsfResult<Option<OverrideRecord>>> + Send;

    /// Atomically replace the whole record, creating it if needed.
    fn upsert(&self, input: UpsertOverride)
    -> impl Future<Output = UsfResult<OverrideRecord>> + Send;

    /// Remove the record. Deleting an absent record is not an error.
    fn delete(&self, identity: Identity) -> impl Future<Output = UsfResult<()>> + Send;

    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = UsfResult<PaginatedResult<OverrideRecord>>> + Send;
}
