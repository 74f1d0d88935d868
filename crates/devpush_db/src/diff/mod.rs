//! Schema diff contract.
//!
//! The protocol does not diff schemas itself. It asks a [`SchemaDiffEngine`]
//! for a [`DiffPlan`] and later asks the same engine to apply it. Engines must
//! be:
//!
//! - deterministic: same live state and same model give the same statements
//! - idempotent: no drift gives an empty plan (no statements, no warnings)
//! - safe to apply as a unit: the protocol adds no transaction or rollback
//!
//! [`CatalogDiffEngine`] is the bundled table/column engine.

mod catalog;
mod live;

pub use catalog::{plan_diff, CatalogDiffEngine};
pub use live::{LiveColumn, LiveSchema, LiveTable};

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::model::SchemaModel;
use crate::pool::DbPool;

/// Statements that reconcile the live schema with the model, plus risk data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffPlan {
    /// DDL in execution order
    pub statements: Vec<String>,
    /// Some statement may destroy existing data
    pub has_data_loss: bool,
    /// Human-readable warnings; non-empty means an operator must confirm
    pub warnings: Vec<String>,
}

impl DiffPlan {
    /// Plan for a schema that already matches.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.warnings.is_empty()
    }

    /// Warnings require an operator decision before apply.
    pub fn requires_confirmation(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn risk(&self) -> PushRisk {
        if self.is_empty() {
            PushRisk::NoChanges
        } else if self.warnings.is_empty() {
            PushRisk::Safe
        } else if self.has_data_loss {
            PushRisk::DataLoss
        } else {
            PushRisk::NeedsReview
        }
    }
}

/// Risk classification of a [`DiffPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushRisk {
    /// Nothing to do
    NoChanges,
    /// Statements only, applied without asking
    Safe,
    /// Warnings without data loss
    NeedsReview,
    /// Warnings and possible data loss
    DataLoss,
}

impl fmt::Display for PushRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PushRisk::NoChanges => "no changes",
            PushRisk::Safe => "safe",
            PushRisk::NeedsReview => "needs review",
            PushRisk::DataLoss => "data loss",
        };
        f.write_str(s)
    }
}

/// Computes and applies the difference between a live schema and a model.
#[async_trait]
pub trait SchemaDiffEngine: Send + Sync {
    /// Compare the live schema behind `pool` with `model`.
    async fn diff(&self, model: &SchemaModel, pool: &DbPool) -> Result<DiffPlan>;

    /// Execute `plan` against the live database.
    async fn apply(&self, plan: &DiffPlan, pool: &DbPool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(statements: &[&str], warnings: &[&str], has_data_loss: bool) -> DiffPlan {
        DiffPlan {
            statements: statements.iter().map(|s| s.to_string()).collect(),
            has_data_loss,
            warnings: warnings.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_risk_classification() {
        assert_eq!(DiffPlan::empty().risk(), PushRisk::NoChanges);
        assert_eq!(plan(&["CREATE TABLE t (id INTEGER)"], &[], false).risk(), PushRisk::Safe);
        assert_eq!(
            plan(&["ALTER TABLE t ADD COLUMN c TEXT"], &["check this"], false).risk(),
            PushRisk::NeedsReview
        );
        assert_eq!(
            plan(&["DROP TABLE t"], &["about to delete t"], true).risk(),
            PushRisk::DataLoss
        );
    }

    #[test]
    fn test_data_loss_without_warnings_needs_no_confirmation() {
        let plan = plan(&["DROP TABLE empty"], &[], true);
        assert!(!plan.requires_confirmation());
        assert_eq!(plan.risk(), PushRisk::Safe);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(PushRisk::DataLoss > PushRisk::NeedsReview);
        assert!(PushRisk::NeedsReview > PushRisk::Safe);
    }
}
