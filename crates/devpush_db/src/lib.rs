//! Development-mode schema push for relational databases.
//!
//! On bootstrap the declared [`SchemaModel`] is compared with the live
//! database and, outside production, the difference is applied directly. Risky
//! plans are confirmed by an operator first. Every successful push records a
//! sentinel row (`batch = -1`) in the migration ledger so versioned migration
//! runs can tell the schema was last shaped by a dev push.
//!
//! # Usage
//!
//! ```rust,ignore
//! use devpush_db::{
//!     BootstrapConfig, Bootstrapper, CatalogDiffEngine, DbConfig, StdinConfirmation,
//! };
//!
//! let bootstrapper = Bootstrapper::new(
//!     model,
//!     DbConfig::new("sqlite:app.db?mode=rwc"),
//!     BootstrapConfig::from_env(),
//!     CatalogDiffEngine,
//!     StdinConfirmation,
//! );
//! let (pool, outcome) = bootstrapper.run().await?;
//! ```
//!
//! Exactly one backend is compiled in: `sqlite` (default) or `postgres`.

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("devpush_db needs a database backend: enable the `sqlite` or `postgres` feature");

mod apply;
mod bootstrap;
mod config;
mod confirm;
pub mod diff;
mod error;
mod gate;
pub mod model;
mod pool;
mod reset;
pub mod sentinel;

pub use apply::apply_plan;
pub use bootstrap::{BootstrapOutcome, Bootstrapper, PushReport};
pub use config::{
    is_truthy, BootstrapConfig, EnvironmentMode, DROP_DATABASE_ENV, ENVIRONMENT_ENV, MIGRATING_ENV,
};
pub use confirm::{
    confirm_plan, AbortReason, AutoConfirm, ConfirmationDecision, ConfirmationPrompt,
    ConfirmationProvider, GateOutcome, StdinConfirmation, CONFIRM_MESSAGE,
};
pub use diff::{CatalogDiffEngine, DiffPlan, PushRisk, SchemaDiffEngine};
pub use error::{ModelError, PushError, Result};
pub use gate::{BlockReason, GateDecision, ModeGate};
pub use model::{
    ColumnDef, ColumnType, EnumDef, ModelDeclaration, RelationDef, RelationKind, SchemaModel,
    TableDef,
};
pub use pool::{create_pool, DbConfig, DbPool, Dialect};
pub use reset::reset_schema;
pub use sentinel::{
    MigrationLedger, MigrationSentinelRecord, SentinelUpdate, DEFAULT_MIGRATIONS_TABLE,
    DEV_PUSH_NAME, SENTINEL_BATCH,
};
