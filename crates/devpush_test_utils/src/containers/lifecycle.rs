//! Start test servers with docker compose and wait until they answer queries.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::config::{DbVersion, TestDbConfig, TEST_DATABASE_URL_ENV};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn compose_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("docker")
        .join("docker-compose.yml")
}

fn succeeds(command: &mut Command) -> bool {
    command.output().map(|o| o.status.success()).unwrap_or(false)
}

/// Run `docker compose` (v2), falling back to `docker-compose` (v1).
fn compose(args: &[&str]) -> Result<Output> {
    let file = compose_file();

    if let Ok(out) = Command::new("docker")
        .arg("compose")
        .arg("-f")
        .arg(&file)
        .args(args)
        .output()
    {
        if out.status.success() {
            return Ok(out);
        }
    }

    Command::new("docker-compose")
        .arg("-f")
        .arg(&file)
        .args(args)
        .output()
        .context("Failed to run docker-compose")
}

pub fn is_running(version: DbVersion) -> bool {
    compose(&["ps", "-q", version.service_name()])
        .map(|out| !out.stdout.is_empty())
        .unwrap_or(false)
}

pub fn start(version: DbVersion) -> Result<()> {
    info!(service = version.service_name(), "Starting test database");
    let out = compose(&["up", "-d", version.service_name()])?;
    if !out.status.success() {
        bail!(
            "Failed to start {}: {}",
            version.service_name(),
            String::from_utf8_lossy(&out.stderr)
        );
    }
    Ok(())
}

/// Tear down every test server and its volumes.
pub fn stop_all() -> Result<()> {
    let out = compose(&["down", "-v"])?;
    if !out.status.success() {
        bail!(
            "Failed to stop test databases: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }
    Ok(())
}

async fn accepts_queries(url: &str) -> bool {
    let connect = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(1))
        .connect(url);

    match timeout(Duration::from_secs(2), connect).await {
        Ok(Ok(pool)) => sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok(),
        _ => false,
    }
}

/// Poll until the server answers `SELECT 1` or the startup timeout passes.
pub async fn wait_until_ready(version: DbVersion) -> Result<()> {
    let url = TestDbConfig::new(version).database_url();
    let start = Instant::now();

    while !accepts_queries(&url).await {
        if start.elapsed() > STARTUP_TIMEOUT {
            bail!("{} not ready after {:?}", version, STARTUP_TIMEOUT);
        }
        sleep(POLL_INTERVAL).await;
    }

    debug!(%version, elapsed_ms = start.elapsed().as_millis() as u64, "Test database ready");
    Ok(())
}

/// Make sure `version` is up. An externally provided server
/// ([`TEST_DATABASE_URL_ENV`]) is only waited on.
pub async fn ensure_running(version: DbVersion) -> Result<()> {
    if std::env::var_os(TEST_DATABASE_URL_ENV).is_none() {
        if !succeeds(Command::new("docker").arg("info")) {
            bail!("Docker is not available; install Docker or set {}", TEST_DATABASE_URL_ENV);
        }
        if !is_running(version) {
            start(version)?;
        }
    }
    wait_until_ready(version).await
}
