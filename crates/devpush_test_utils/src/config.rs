//! Connection settings for the Dockerized PostgreSQL servers.

use std::fmt;

/// Overrides every generated URL, for CI that provides its own server.
pub const TEST_DATABASE_URL_ENV: &str = "DEVPUSH_TEST_DATABASE_URL";

/// PostgreSQL releases the protocol is exercised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbVersion {
    Postgres14,
    Postgres15,
    Postgres16,
}

impl DbVersion {
    /// Service name in `docker/docker-compose.yml`.
    pub fn service_name(&self) -> &'static str {
        match self {
            DbVersion::Postgres14 => "postgres14",
            DbVersion::Postgres15 => "postgres15",
            DbVersion::Postgres16 => "postgres16",
        }
    }

    /// Host port the service is published on.
    pub fn port(&self) -> u16 {
        match self {
            DbVersion::Postgres14 => 25432,
            DbVersion::Postgres15 => 25433,
            DbVersion::Postgres16 => 25434,
        }
    }

    pub fn all() -> &'static [DbVersion] {
        &[
            DbVersion::Postgres14,
            DbVersion::Postgres15,
            DbVersion::Postgres16,
        ]
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = match self {
            DbVersion::Postgres14 => 14,
            DbVersion::Postgres15 => 15,
            DbVersion::Postgres16 => 16,
        };
        write!(f, "PostgreSQL {}", major)
    }
}

/// Credentials and address of a test server.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    pub version: DbVersion,
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl TestDbConfig {
    /// Defaults matching the compose file.
    pub fn new(version: DbVersion) -> Self {
        Self {
            version,
            host: "localhost".to_string(),
            database: "devpush_test".to_string(),
            username: "devpush".to_string(),
            password: "devpush_test".to_string(),
        }
    }

    /// `postgres://` URL for this server, unless overridden by
    /// [`TEST_DATABASE_URL_ENV`].
    pub fn database_url(&self) -> String {
        std::env::var(TEST_DATABASE_URL_ENV).unwrap_or_else(|_| self.compose_url())
    }

    fn compose_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password,
            self.host,
            self.version.port(),
            self.database
        )
    }
}
