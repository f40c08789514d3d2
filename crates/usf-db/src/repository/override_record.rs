//! SurrealDB implementation of [`OverrideRepository`].
//!
//! One `user_override` row per account, keyed by the identity's decimal
//! string. Writes go through a single `UPSERT ... SET` that assigns every
//! field, so a concurrent reader sees either the old or the new record.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use usf_core::error::UsfResult;
use usf_core::models::identity::Identity;
use usf_core::models::record::{OverrideRecord, UpsertOverride};
use usf_core::permission::PermissionSet;
use usf_core::repository::{OverrideRepository, PaginatedResult, Pagination};

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct OverrideRow {
    identity: String,
    prefix: Option<String>,
    suffix: Option<String>,
    color: Option<String>,
    grants: Vec<String>,
    denials: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OverrideRow {
    fn try_into_record(self) -> Result<OverrideRecord, DbError> {
        let identity = self
            .identity
            .parse::<Identity>()
            .map_err(|e| DbError::Decode(format!("invalid identity {:?}: {e}", self.identity)))?;
        Ok(OverrideRecord {
            identity,
            prefix: self.prefix,
            suffix: self.suffix,
            color: self.color,
            permissions: PermissionSet::from_parts(self.grants, self.denials),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the override record store.
#[derive(Clone)]
pub struct SurrealOverrideRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOverrideRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OverrideRepository for SurrealOverrideRepository<C> {
    async fn get(&self, identity: Identity) -> UsfResult<Option<OverrideRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('user_override', $id)")
            .bind(("id", identity.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OverrideRow> = result.take(0).map_err(DbError::from)?;
        let record = rows
            .into_iter()
            .next()
            .map(OverrideRow::try_into_record)
            .transpose()?;

        debug!(%identity, found = record.is_some(), "Loaded override record");
        Ok(record)
    }

    async fn upsert(&self, input: UpsertOverride) -> UsfResult<OverrideRecord> {
        let id_str = input.identity.to_string();
        let grants: Vec<String> = input.permissions.grants().map(str::to_string).collect();
        let denials: Vec<String> = input.permissions.denials().map(str::to_string).collect();

        let result = self
            .db
            .query(
                "UPSERT type::record('user_override', $id) SET \
                 identity = $id, \
                 prefix = $prefix, suffix = $suffix, color = $color, \
                 grants = $grants, denials = $denials, \
                 updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("prefix", input.prefix))
            .bind(("suffix", input.suffix))
            .bind(("color", input.color))
            .bind(("grants", grants))
            .bind(("denials", denials))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(DbError::write("UPSERT", "user_override"))?;

        let rows: Vec<OverrideRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_override".into(),
            id: id_str,
        })?;

        row.try_into_record().map_err(Into::into)
    }

    async fn delete(&self, identity: Identity) -> UsfResult<()> {
        self.db
            .query("DELETE type::record('user_override', $id)")
            .bind(("id", identity.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::write("DELETE", "user_override"))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> UsfResult<PaginatedResult<OverrideRecord>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user_override GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT * FROM user_override \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OverrideRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(OverrideRow::try_into_record)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
