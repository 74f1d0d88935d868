//! Confirmation gate for plans that carry warnings.
//!
//! Plans without warnings pass straight through. Otherwise the warnings (and a
//! separate data-loss notice) are logged and a [`ConfirmationProvider`] is asked
//! for a blocking yes/no decision. Anything but an explicit yes aborts.

use std::fmt;
use std::io::BufRead;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::diff::DiffPlan;
use crate::error::Result;

/// Question asked when a plan carries warnings.
pub const CONFIRM_MESSAGE: &str = "Accept warnings and push schema to database?";

/// What the operator is asked to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub message: String,
    pub warnings: Vec<String>,
    pub has_data_loss: bool,
}

impl ConfirmationPrompt {
    pub fn for_plan(plan: &DiffPlan) -> Self {
        Self {
            message: CONFIRM_MESSAGE.to_string(),
            warnings: plan.warnings.clone(),
            has_data_loss: plan.has_data_loss,
        }
    }
}

/// Operator answer. The safe default is `Declined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationDecision {
    Accepted,
    #[default]
    Declined,
    /// The prompt was interrupted (Ctrl-C, closed input)
    Cancelled,
}

/// Why a bootstrap stopped at the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Declined,
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Declined => f.write_str("operator declined the schema push"),
            AbortReason::Cancelled => f.write_str("operator cancelled the confirmation prompt"),
        }
    }
}

/// Result of passing a plan through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Proceed,
    Abort(AbortReason),
}

/// Source of operator decisions.
#[async_trait]
pub trait ConfirmationProvider: Send + Sync {
    /// Block until the operator decides. No timeout applies.
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<ConfirmationDecision>;
}

/// Surface the plan's risk and ask for a decision when it has warnings.
pub async fn confirm_plan<C>(plan: &DiffPlan, provider: &C) -> Result<GateOutcome>
where
    C: ConfirmationProvider + ?Sized,
{
    if !plan.requires_confirmation() {
        debug!("No warnings in schema push, skipping confirmation");
        return Ok(GateOutcome::Proceed);
    }

    info!(
        warnings = ?plan.warnings,
        "Warnings detected during schema push: {}",
        plan.warnings.join("\n")
    );
    if plan.has_data_loss {
        warn!("DATA LOSS WARNING: Possible data loss detected if schema is pushed.");
    }

    let decision = provider.confirm(&ConfirmationPrompt::for_plan(plan)).await?;
    let outcome = match decision {
        ConfirmationDecision::Accepted => GateOutcome::Proceed,
        ConfirmationDecision::Declined => GateOutcome::Abort(AbortReason::Declined),
        ConfirmationDecision::Cancelled => GateOutcome::Abort(AbortReason::Cancelled),
    };
    info!(?decision, "Schema push confirmation answered");
    Ok(outcome)
}

/// Fixed answer, for non-interactive runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    decision: ConfirmationDecision,
}

impl AutoConfirm {
    pub fn accept() -> Self {
        Self {
            decision: ConfirmationDecision::Accepted,
        }
    }

    pub fn decline() -> Self {
        Self {
            decision: ConfirmationDecision::Declined,
        }
    }
}

#[async_trait]
impl ConfirmationProvider for AutoConfirm {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<ConfirmationDecision> {
        info!(
            decision = ?self.decision,
            warnings = prompt.warnings.len(),
            "Answering schema push confirmation automatically"
        );
        Ok(self.decision)
    }
}

/// Interactive `y/N` prompt on stderr, answered on stdin.
///
/// The answer is read on a detached thread, so a Ctrl-C while waiting returns
/// `Cancelled` at once and leaves nothing for the runtime to join. End of input
/// also counts as `Cancelled`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

#[async_trait]
impl ConfirmationProvider for StdinConfirmation {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<ConfirmationDecision> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(render_prompt(prompt).as_bytes()).await?;
        stderr.flush().await?;

        let answer = read_answer()?;

        tokio::select! {
            answer = answer => match answer {
                Ok(Ok(Some(line))) => Ok(parse_answer(&line)),
                Ok(Ok(None)) | Err(_) => {
                    debug!("stdin closed (EOF) during confirmation");
                    Ok(ConfirmationDecision::Cancelled)
                }
                Ok(Err(e)) => Err(e.into()),
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                stderr.write_all(b"\n").await?;
                debug!("Ctrl-C during confirmation");
                Ok(ConfirmationDecision::Cancelled)
            }
        }
    }
}

/// Read one line from stdin on its own thread. `None` means end of input.
fn read_answer() -> std::io::Result<oneshot::Receiver<std::io::Result<Option<String>>>> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("devpush-confirm".to_string())
        .spawn(move || {
            let mut line = String::new();
            let read = std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map(|n| (n > 0).then_some(line));
            let _ = tx.send(read);
        })?;
    Ok(rx)
}

fn render_prompt(prompt: &ConfirmationPrompt) -> String {
    let mut text = String::from("\nWarnings detected during schema push:\n");
    for warning in &prompt.warnings {
        text.push_str("  · ");
        text.push_str(warning);
        text.push('\n');
    }
    if prompt.has_data_loss {
        text.push_str("\nDATA LOSS WARNING: Possible data loss detected if schema is pushed.\n");
    }
    text.push_str(&format!("\n? {} (y/N) ", prompt.message));
    text
}

/// `y` / `yes` accepts; anything else, including an empty line, declines.
fn parse_answer(line: &str) -> ConfirmationDecision {
    let answer = line.trim();
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        ConfirmationDecision::Accepted
    } else {
        ConfirmationDecision::Declined
    }
}
