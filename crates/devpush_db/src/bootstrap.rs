//! Connection bootstrap and the dev push protocol.
//!
//! Order is fixed: connect, drop directive, mode gate, diff, confirmation
//! (only when the plan has warnings), apply, sentinel upsert. The drop
//! directive runs before the gate, so it also fires in production.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::apply::apply_plan;
use crate::config::BootstrapConfig;
use crate::confirm::{confirm_plan, AbortReason, ConfirmationProvider, GateOutcome};
use crate::diff::{DiffPlan, PushRisk, SchemaDiffEngine};
use crate::error::Result;
use crate::gate::{BlockReason, GateDecision, ModeGate};
use crate::model::SchemaModel;
use crate::pool::{create_pool, DbConfig, DbPool};
use crate::reset::reset_schema;
use crate::sentinel::{MigrationLedger, SentinelUpdate};

/// What a completed push did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub statements: Vec<String>,
    pub warnings: Vec<String>,
    pub risk: PushRisk,
    pub sentinel: SentinelUpdate,
}

/// How a bootstrap ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Plan applied and sentinel recorded
    Synced(PushReport),
    /// Mode gate refused auto-sync; nothing was diffed or written
    Skipped(BlockReason),
    /// Operator declined or cancelled; nothing was applied
    Aborted(AbortReason),
}

impl BootstrapOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, BootstrapOutcome::Synced(_))
    }
}

/// Drives one bootstrap of a database against a declared model.
pub struct Bootstrapper<E, C> {
    model: SchemaModel,
    db: DbConfig,
    config: BootstrapConfig,
    ledger: MigrationLedger,
    engine: E,
    confirmation: C,
}

impl<E, C> Bootstrapper<E, C>
where
    E: SchemaDiffEngine,
    C: ConfirmationProvider,
{
    pub fn new(
        model: SchemaModel,
        db: DbConfig,
        config: BootstrapConfig,
        engine: E,
        confirmation: C,
    ) -> Self {
        Self {
            model,
            db,
            config,
            ledger: MigrationLedger::default(),
            engine,
            confirmation,
        }
    }

    pub fn with_ledger(mut self, ledger: MigrationLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn confirmation(&self) -> &C {
        &self.confirmation
    }

    /// Open the pool and run the protocol on it.
    ///
    /// The pool is returned alongside the outcome so the caller keeps using
    /// the same connection set.
    pub async fn run(&self) -> Result<(DbPool, BootstrapOutcome)> {
        let pool = create_pool(&self.db).await?;
        let outcome = self.run_with_pool(&pool).await?;
        Ok((pool, outcome))
    }

    /// Run the protocol on an already open pool.
    pub async fn run_with_pool(&self, pool: &DbPool) -> Result<BootstrapOutcome> {
        if self.config.drop_on_start {
            if self.config.mode.is_production() {
                warn!("Drop directive honored in production mode");
            }
            reset_schema(pool).await?;
        }

        if let GateDecision::Blocked(reason) = ModeGate::evaluate(&self.config) {
            info!(%reason, "Skipping automatic schema push");
            return Ok(BootstrapOutcome::Skipped(reason));
        }

        let plan = self.plan(pool).await?;

        if let GateOutcome::Abort(reason) = confirm_plan(&plan, &self.confirmation).await? {
            info!(%reason, "Schema push aborted");
            return Ok(BootstrapOutcome::Aborted(reason));
        }

        apply_plan(&self.engine, &plan, pool).await?;
        let sentinel = self.ledger.record_dev_push(pool).await?;

        Ok(BootstrapOutcome::Synced(PushReport {
            risk: plan.risk(),
            statements: plan.statements,
            warnings: plan.warnings,
            sentinel,
        }))
    }

    /// Diff the model (ledger table included) against `pool` without applying.
    pub async fn plan(&self, pool: &DbPool) -> Result<DiffPlan> {
        let model = self
            .model
            .with_ledger_table(self.ledger.table_definition())?;

        info!("Pulling schema from database...");
        let plan = self.engine.diff(&model, pool).await?;
        debug!(
            statements = plan.statements.len(),
            warnings = plan.warnings.len(),
            risk = %plan.risk(),
            "Computed schema diff"
        );
        Ok(plan)
    }
}
