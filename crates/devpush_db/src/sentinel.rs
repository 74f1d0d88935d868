//! Migration ledger sentinel.
//!
//! After a successful dev push the ledger holds exactly one row with
//! `name = "dev"` and `batch = -1`. Its presence tells the regular migration
//! runner that the schema was last shaped by a push rather than by migrations.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PushError, Result};
use crate::model::{quote_ident, ColumnDef, ColumnType, TableDef};
use crate::pool::{DbPool, Dialect};

/// Batch number reserved for the dev push marker.
pub const SENTINEL_BATCH: i64 = -1;

/// Name of the dev push marker row.
pub const DEV_PUSH_NAME: &str = "dev";

/// Default ledger table name.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MigrationSentinelRecord {
    pub name: String,
    pub batch: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// What [`MigrationLedger::record_dev_push`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelUpdate {
    /// No marker existed; one was inserted
    Created,
    /// The marker existed; its `updated_at` was bumped
    Refreshed,
}

/// Handle on the migration ledger table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationLedger {
    table: String,
}

impl Default for MigrationLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MIGRATIONS_TABLE)
    }
}

impl MigrationLedger {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Shape of the ledger table, merged into the model before diffing.
    pub fn table_definition(&self) -> TableDef {
        TableDef::new(&self.table)
            .column(ColumnDef::new("name", ColumnType::Text).not_null())
            .column(ColumnDef::new("batch", ColumnType::BigInt).not_null())
            .column(ColumnDef::new("created_at", ColumnType::Timestamp).not_null())
            .column(ColumnDef::new("updated_at", ColumnType::Timestamp).not_null())
    }

    /// Insert the marker, or refresh its `updated_at` if present.
    ///
    /// Read-then-write; concurrent pushers against one database are not
    /// coordinated.
    pub async fn record_dev_push(&self, pool: &DbPool) -> Result<SentinelUpdate> {
        let now = chrono::Utc::now().naive_utc();
        let table = quote_ident(&self.table);

        match self.dev_push_record(pool).await? {
            Some(existing) => {
                sqlx::query(&format!(
                    "UPDATE {} SET updated_at = {} WHERE batch = {}",
                    table,
                    param(1),
                    param(2)
                ))
                .bind(now)
                .bind(SENTINEL_BATCH)
                .execute(pool)
                .await
                .map_err(PushError::Sentinel)?;

                debug!(
                    table = %self.table,
                    created_at = %existing.created_at,
                    "Refreshed dev push sentinel"
                );
                Ok(SentinelUpdate::Refreshed)
            }
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {} (name, batch, created_at, updated_at) VALUES ({}, {}, {}, {})",
                    table,
                    param(1),
                    param(2),
                    param(3),
                    param(4)
                ))
                .bind(DEV_PUSH_NAME)
                .bind(SENTINEL_BATCH)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map_err(PushError::Sentinel)?;

                info!(table = %self.table, "Recorded dev push sentinel");
                Ok(SentinelUpdate::Created)
            }
        }
    }

    /// The marker row, if any. Matched on the reserved batch alone.
    pub async fn dev_push_record(&self, pool: &DbPool) -> Result<Option<MigrationSentinelRecord>> {
        sqlx::query_as::<_, MigrationSentinelRecord>(&format!(
            "SELECT name, batch, created_at, updated_at FROM {} WHERE batch = {} ORDER BY created_at LIMIT 1",
            quote_ident(&self.table),
            param(1)
        ))
        .bind(SENTINEL_BATCH)
        .fetch_optional(pool)
        .await
        .map_err(PushError::Sentinel)
    }

    /// Number of marker rows. One after any successful push.
    pub async fn count_sentinel_rows(&self, pool: &DbPool) -> Result<i64> {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE batch = {}",
            quote_ident(&self.table),
            param(1)
        ))
        .bind(SENTINEL_BATCH)
        .fetch_one(pool)
        .await
        .map_err(PushError::Sentinel)
    }

    /// Whether the schema was last shaped by a dev push.
    pub async fn has_dev_push(&self, pool: &DbPool) -> Result<bool> {
        Ok(self.dev_push_record(pool).await?.is_some())
    }
}

fn param(n: usize) -> String {
    match Dialect::current() {
        Dialect::Sqlite => "?".to_string(),
        Dialect::Postgres => format!("${}", n),
    }
}
