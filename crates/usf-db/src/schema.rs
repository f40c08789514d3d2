//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables use SCHEMAFULL mode. Optional chat fields are `option<string>`
//! so that an unset field and an empty string stay distinguishable.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "user_override",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — per-account override records
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
DEFINE TABLE user_override SCHEMAFULL;
DEFINE FIELD identity ON TABLE user_override TYPE string;
DEFINE FIELD prefix ON TABLE user_override TYPE option<string>;
DEFINE FIELD suffix ON TABLE user_override TYPE option<string>;
DEFINE FIELD color ON TABLE user_override TYPE option<string>;
DEFINE FIELD grants ON TABLE user_override TYPE array<string> \
    DEFAULT [];
DEFINE FIELD denials ON TABLE user_override TYPE array<string> \
    DEFAULT [];
DEFINE FIELD created_at ON TABLE user_override TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user_override TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_override_identity ON TABLE user_override \
    COLUMNS identity UNIQUE;
";

/// Run all pending migrations.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(version = migration.version, "Migration applied");
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
