//! Pools on the Dockerized PostgreSQL servers.

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::cleanup::PostgresTestGuard;
use crate::config::{DbVersion, TestDbConfig};
use crate::containers::lifecycle::ensure_running;

/// Admin pool on one test server, started on demand.
#[derive(Debug, Clone)]
pub struct TestPgPool {
    pub pool: PgPool,
    pub version: DbVersion,
    url: String,
}

impl TestPgPool {
    /// Start (if needed) and connect to the server for `version`.
    ///
    /// ```rust,ignore
    /// let server = TestPgPool::new(DbVersion::Postgres16).await?;
    /// let guard = server.isolated().await?;
    /// bootstrapper.run_with_pool(guard.pool()).await?;
    /// ```
    pub async fn new(version: DbVersion) -> Result<Self> {
        ensure_running(version).await?;

        let url = TestDbConfig::new(version).database_url();
        info!(%version, port = version.port(), "Connecting to test database");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&url)
            .await?;

        Ok(Self { pool, version, url })
    }

    /// Fresh schema plus a pool confined to it.
    pub async fn isolated(&self) -> Result<PostgresTestGuard> {
        PostgresTestGuard::new(self.pool.clone(), &self.url).await
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
