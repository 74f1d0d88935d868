//! Database pool creation.
//!
//! The backend is selected at compile time via feature flags, so queries can
//! use the concrete pool type and `#[derive(FromRow)]` works with chrono types.
//!
//! # Feature Priority
//!
//! - `sqlite` feature (default): Uses `SqlitePool`
//! - `postgres` feature: Uses `PgPool`
//!
//! If both features are enabled, `sqlite` takes priority.

use std::fmt;

use tracing::{error, info};

use crate::error::{PushError, Result};

/// Database pool type alias.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbPool = sqlx::PgPool;

#[cfg(feature = "sqlite")]
pub type DbPool = sqlx::SqlitePool;

/// SQL dialect spoken by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Dialect of the compiled-in [`DbPool`].
    pub const fn current() -> Self {
        if cfg!(feature = "sqlite") {
            Dialect::Sqlite
        } else {
            Dialect::Postgres
        }
    }

    /// Detect the dialect from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("sqlite:") {
            Some(Dialect::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "SQLite",
            Dialect::Postgres => "PostgreSQL",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum connections in the pool
    pub max_connections: u32,
}

impl DbConfig {
    /// Configuration for a URL with the dialect's default pool size.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let max_connections = match Dialect::from_url(&url) {
            Some(Dialect::Postgres) => 10,
            _ => 5,
        };
        Self {
            url,
            max_connections,
        }
    }

    /// SQLite file configuration (created if missing).
    pub fn sqlite(path: impl AsRef<str>) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path.as_ref()),
            max_connections: 5,
        }
    }

    /// In-memory SQLite configuration (for testing).
    ///
    /// A single connection, since every SQLite memory connection is its own
    /// database.
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    /// Set maximum connections.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Open a pool and make sure a connection can be acquired.
///
/// Connection failures are logged and returned as [`PushError::Connect`];
/// every later bootstrap step needs a live connection.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool> {
    let dialect = Dialect::current();
    if let Some(requested) = Dialect::from_url(&config.url) {
        if requested != dialect {
            let err = sqlx::Error::Configuration(
                format!("{} URL given but this build speaks {}", requested, dialect).into(),
            );
            error!("Error: cannot connect to {}. Details: {}", dialect, err);
            return Err(PushError::Connect(err));
        }
    }

    #[cfg(feature = "sqlite")]
    let options = sqlx::sqlite::SqlitePoolOptions::new();
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    let options = sqlx::postgres::PgPoolOptions::new();

    let pool = options
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| {
            error!("Error: cannot connect to {}. Details: {}", dialect, e);
            PushError::Connect(e)
        })?;

    info!("Connected to {} successfully", dialect);
    Ok(pool)
}
