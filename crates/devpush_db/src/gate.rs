//! Mode gate: whether automatic schema synchronization may run at all.

use std::fmt;

use crate::config::BootstrapConfig;

/// Why automatic synchronization was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Production,
    MigrationInProgress,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Production => f.write_str("running in production"),
            BlockReason::MigrationInProgress => f.write_str("a versioned migration run is in progress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Blocked(BlockReason),
}

/// Auto-sync runs only outside production and outside migration runs.
pub struct ModeGate;

impl ModeGate {
    pub fn evaluate(config: &BootstrapConfig) -> GateDecision {
        if config.mode.is_production() {
            GateDecision::Blocked(BlockReason::Production)
        } else if config.migration_in_progress {
            GateDecision::Blocked(BlockReason::MigrationInProgress)
        } else {
            GateDecision::Proceed
        }
    }
}
