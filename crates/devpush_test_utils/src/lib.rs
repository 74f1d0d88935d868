//! Test support for devpush.
//!
//! - [`FakeDiffEngine`] and [`ScriptedConfirmation`] drive the bootstrap
//!   protocol without a real diff or a human.
//! - [`TestPgPool`] and [`PostgresTestGuard`] give each test an isolated
//!   schema on a Dockerized PostgreSQL (`docker/docker-compose.yml`).
//!
//! # Features
//!
//! - `sqlite` (default) / `postgres`: backend forwarded to `devpush_db`
//! - `docker-tests`: enable tests that need Docker

pub mod cleanup;
pub mod config;
pub mod containers;
pub mod fakes;
pub mod pools;

pub use cleanup::PostgresTestGuard;
pub use config::{DbVersion, TestDbConfig};
pub use containers::lifecycle::{ensure_running, wait_until_ready};
pub use fakes::{FakeDiffEngine, ScriptedConfirmation};
pub use pools::postgres::TestPgPool;
