//! # Schema Migrations
//!
//! The schema ships inside the binary (`migrations/sqlite`, embedded with
//! `sqlx::migrate!`) and is applied by [`Database::new`](crate::Database::new).
//!
//! ```text
//!   001_initial_schema.sql
//!     products ─┬─< sale_items >── sales      UNIQUE (tenant_id, sale_number)
//!               └─< stock_transactions         append-only (triggers)
//!     customers ──< sales                      sales/sale_items immutable
//! ```
//!
//! Applied files are never edited; schema changes go in a new
//! `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Triggers the sale path relies on for immutability of its records.
pub const GUARD_TRIGGERS: [&str; 4] = [
    "sales_immutable",
    "sale_items_immutable",
    "stock_transactions_no_update",
    "stock_transactions_no_delete",
];

/// Embedded vs applied migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

/// Applies every pending migration, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let before = migration_status(pool).await?;
    MIGRATOR.run(pool).await?;
    info!(
        embedded = before.embedded,
        newly_applied = before.embedded.saturating_sub(before.applied),
        "Migrations applied"
    );
    Ok(())
}

/// How many embedded migrations have been applied. A database that was never
/// migrated reports zero.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let has_table: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if has_table > 0 {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}

/// Fails if any of [`GUARD_TRIGGERS`] is missing.
pub async fn verify_guards(pool: &SqlitePool) -> DbResult<()> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'trigger'")
            .fetch_all(pool)
            .await?;

    let missing: Vec<&str> = GUARD_TRIGGERS
        .iter()
        .copied()
        .filter(|t| !present.iter().any(|p| p == t))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        warn!(?missing, "Immutability triggers missing");
        Err(DbError::MigrationFailed(format!(
            "missing triggers: {}",
            missing.join(", ")
        )))
    }
}
