//! In-memory stand-ins for the diff engine and the operator.
//!
//! Both record every call so tests can assert on what the protocol asked for
//! and in which order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use devpush_db::{
    ConfirmationDecision, ConfirmationPrompt, ConfirmationProvider, DbPool, DiffPlan, PushError,
    SchemaDiffEngine, SchemaModel,
};

/// Diff engine that returns a canned plan and never touches the database.
#[derive(Debug, Default)]
pub struct FakeDiffEngine {
    plan: DiffPlan,
    fail_apply: Option<String>,
    diff_calls: AtomicUsize,
    applied: Mutex<Vec<DiffPlan>>,
    seen_tables: Mutex<Vec<Vec<String>>>,
}

impl FakeDiffEngine {
    pub fn new(plan: DiffPlan) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    /// Engine reporting zero drift.
    pub fn no_changes() -> Self {
        Self::new(DiffPlan::empty())
    }

    /// Plan with statements and no warnings.
    pub fn safe(statements: &[&str]) -> Self {
        Self::new(DiffPlan {
            statements: statements.iter().map(|s| s.to_string()).collect(),
            ..DiffPlan::default()
        })
    }

    /// Plan that destroys data and carries warnings.
    pub fn data_loss(statements: &[&str], warnings: &[&str]) -> Self {
        Self::new(DiffPlan {
            statements: statements.iter().map(|s| s.to_string()).collect(),
            has_data_loss: true,
            warnings: warnings.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Make `apply` fail with `message`.
    pub fn failing_apply(mut self, message: impl Into<String>) -> Self {
        self.fail_apply = Some(message.into());
        self
    }

    pub fn diff_calls(&self) -> usize {
        self.diff_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        lock(&self.applied).len()
    }

    pub fn applied_plans(&self) -> Vec<DiffPlan> {
        lock(&self.applied).clone()
    }

    /// Table names of the model passed to the most recent `diff`.
    pub fn last_model_tables(&self) -> Option<Vec<String>> {
        lock(&self.seen_tables).last().cloned()
    }
}

#[async_trait]
impl SchemaDiffEngine for FakeDiffEngine {
    async fn diff(&self, model: &SchemaModel, _pool: &DbPool) -> devpush_db::Result<DiffPlan> {
        self.diff_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen_tables).push(model.tables().map(|t| t.name.clone()).collect());
        Ok(self.plan.clone())
    }

    async fn apply(&self, plan: &DiffPlan, _pool: &DbPool) -> devpush_db::Result<()> {
        lock(&self.applied).push(plan.clone());
        match &self.fail_apply {
            Some(message) => Err(PushError::apply(message.clone())),
            None => Ok(()),
        }
    }
}

/// Operator with a fixed answer who remembers every prompt.
#[derive(Debug)]
pub struct ScriptedConfirmation {
    decision: ConfirmationDecision,
    prompts: Mutex<Vec<ConfirmationPrompt>>,
}

impl ScriptedConfirmation {
    pub fn new(decision: ConfirmationDecision) -> Self {
        Self {
            decision,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(ConfirmationDecision::Accepted)
    }

    pub fn declining() -> Self {
        Self::new(ConfirmationDecision::Declined)
    }

    pub fn cancelling() -> Self {
        Self::new(ConfirmationDecision::Cancelled)
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }

    pub fn prompts(&self) -> Vec<ConfirmationPrompt> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl ConfirmationProvider for ScriptedConfirmation {
    async fn confirm(
        &self,
        prompt: &ConfirmationPrompt,
    ) -> devpush_db::Result<ConfirmationDecision> {
        lock(&self.prompts).push(prompt.clone());
        Ok(self.decision)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
