//! Error types for the schema push protocol.

use thiserror::Error;

/// Push operation result type.
pub type Result<T> = std::result::Result<T, PushError>;

/// Errors raised while bootstrapping and pushing a schema.
///
/// Every variant is fatal for the current bootstrap. An operator declining the
/// confirmation prompt is *not* an error; see [`crate::BootstrapOutcome`].
#[derive(Error, Debug)]
pub enum PushError {
    /// The pool could not be opened
    #[error("Cannot connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// The drop directive failed part way
    #[error("Failed to reset working schema: {0}")]
    Reset(#[source] sqlx::Error),

    /// The diff engine could not produce a plan
    #[error("Schema diff failed: {0}")]
    Diff(String),

    /// Applying the plan failed (no rollback is attempted here)
    #[error("Schema push failed: {0}")]
    Apply(String),

    /// Reading or writing the dev-push sentinel row failed
    #[error("Migration sentinel update failed: {0}")]
    Sentinel(#[source] sqlx::Error),

    /// The declared schema model is inconsistent
    #[error("Invalid schema model: {0}")]
    Model(#[from] ModelError),

    /// The confirmation prompt could not be read
    #[error("Confirmation prompt failed: {0}")]
    Confirmation(#[from] std::io::Error),

    /// Any other SQLx error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PushError {
    /// Create a diff error.
    pub fn diff(msg: impl Into<String>) -> Self {
        Self::Diff(msg.into())
    }

    /// Create an apply error.
    pub fn apply(msg: impl Into<String>) -> Self {
        Self::Apply(msg.into())
    }
}

/// Schema model assembly errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Name '{name}' is declared as both {first} and {second}")]
    NameCollision {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("Relation '{relation}' refers to undeclared table '{table}'")]
    UnknownTable { relation: String, table: String },

    #[error("Table '{0}' declares no columns")]
    EmptyTable(String),

    #[error("Table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("Column '{table}.{column}' uses undeclared enum '{enum_name}'")]
    UnknownEnum {
        table: String,
        column: String,
        enum_name: String,
    },
}
