//! Execute an accepted diff plan.

use std::time::Instant;

use tracing::{error, info};

use crate::diff::{DiffPlan, SchemaDiffEngine};
use crate::error::{PushError, Result};
use crate::pool::DbPool;

/// Run `plan` through the engine that produced it.
///
/// Failures surface as [`PushError::Apply`]; nothing is retried or rolled back
/// here.
pub async fn apply_plan<E>(engine: &E, plan: &DiffPlan, pool: &DbPool) -> Result<()>
where
    E: SchemaDiffEngine + ?Sized,
{
    let start = Instant::now();
    info!(statements = plan.statements.len(), "Pushing schema changes");

    match engine.apply(plan, pool).await {
        Ok(()) => {
            info!(
                statements = plan.statements.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Schema pushed"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Schema push failed");
            Err(match e {
                PushError::Apply(msg) => PushError::Apply(msg),
                other => PushError::apply(other.to_string()),
            })
        }
    }
}
