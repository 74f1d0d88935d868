//! Per-test schema isolation on a shared PostgreSQL server.

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

/// Owns a throwaway schema and a pool whose connections all resolve
/// unqualified names inside it.
///
/// `current_schema()` on [`Self::pool`] is the test schema, so catalog
/// introspection only sees objects created by the test. The schema is
/// dropped on [`Self::cleanup`] or, best effort, on drop.
pub struct PostgresTestGuard {
    admin: PgPool,
    pool: PgPool,
    schema_name: String,
}

impl PostgresTestGuard {
    /// Create `test_<uuid>` on the server behind `admin`.
    pub async fn new(admin: PgPool, url: &str) -> Result<Self> {
        let schema_name = format!("test_{}", Uuid::new_v4().simple());
        debug!(schema = %schema_name, "Creating test schema");

        sqlx::query(&format!("CREATE SCHEMA \"{}\"", schema_name))
            .execute(&admin)
            .await?;

        let search_path = format!("SET search_path TO \"{}\"", schema_name);
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(url)
            .await?;

        Ok(Self {
            admin,
            pool,
            schema_name,
        })
    }

    /// Pool scoped to the test schema.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub async fn execute(&self, query: &str) -> Result<()> {
        sqlx::query(query).execute(&self.pool).await?;
        Ok(())
    }

    /// Drop the schema now and report failures.
    pub async fn cleanup(&self) -> Result<()> {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema_name))
            .execute(&self.admin)
            .await?;
        debug!(schema = %self.schema_name, "Dropped test schema");
        Ok(())
    }
}

impl Drop for PostgresTestGuard {
    fn drop(&mut self) {
        let admin = self.admin.clone();
        let statement = format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema_name);
        let schema = self.schema_name.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query(&statement).execute(&admin).await {
                        warn!(%schema, error = %e, "Failed to drop test schema");
                    }
                });
            }
            Err(_) => warn!(%schema, "No runtime available, test schema left behind"),
        }
    }
}
