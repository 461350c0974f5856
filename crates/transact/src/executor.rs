//! Execution engine - runs ordered steps inside a transaction

use crate::context::ProgressCallback;
use crate::rollback::RollbackReport;
use crate::transaction::Transaction;
use crate::types::{ExecuteSummary, Outcome};
use anyhow::Result;
use thiserror::Error;

/// One side-effecting unit of work
///
/// `C` is whatever context the steps share (resolved options, providers).
pub trait Step<C: ?Sized> {
    /// Stable name for logs and progress output
    fn name(&self) -> &'static str;

    /// Converge this step; must be idempotent
    fn run(&self, ctx: &C) -> Result<Outcome>;
}

/// Why execution stopped early
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// A step failed; everything created before it was rolled back
    #[error("{step} failed: {source:#}")]
    Step {
        step: &'static str,
        #[source]
        source: anyhow::Error,
        rollback: RollbackReport,
    },

    /// A signal arrived; everything created so far was rolled back
    #[error("interrupted by {}", crate::interrupt::signal_name(*.signal))]
    Interrupted { signal: i32, rollback: RollbackReport },
}

impl ExecuteError {
    pub fn rollback(&self) -> &RollbackReport {
        match self {
            Self::Step { rollback, .. } | Self::Interrupted { rollback, .. } => rollback,
        }
    }
}

/// Run `steps` strictly in order
///
/// Interrupts are observed only between steps, so a step's side effect is
/// always complete before rollback starts. On failure or interrupt the
/// transaction is rolled back before this returns. On success the caller
/// commits.
pub fn execute<C: ?Sized>(
    steps: &[&dyn Step<C>],
    ctx: &C,
    tx: &mut Transaction<'_>,
    progress: &mut dyn ProgressCallback,
) -> Result<ExecuteSummary, ExecuteError> {
    let mut summary = ExecuteSummary::default();

    for step in steps {
        interrupted(tx)?;

        progress.on_step_start(step.name());
        match step.run(ctx) {
            Ok(outcome) => {
                summary.add_outcome(&outcome);
                progress.on_step_complete(step.name(), &outcome);
                if let Outcome::Created(artifact) = outcome {
                    tx.record(artifact);
                }
            }
            Err(source) => {
                log::error!("Step {} failed: {:#}", step.name(), source);
                progress.on_step_failed(step.name(), &source);
                let rollback = tx.rollback();
                return Err(ExecuteError::Step {
                    step: step.name(),
                    source,
                    rollback,
                });
            }
        }
    }

    interrupted(tx)?;
    Ok(summary)
}

fn interrupted(tx: &mut Transaction<'_>) -> Result<(), ExecuteError> {
    match tx.pending_interrupt() {
        Some(signal) => {
            log::warn!(
                "Received {}, stopping",
                crate::interrupt::signal_name(signal)
            );
            let rollback = tx.rollback();
            Err(ExecuteError::Interrupted { signal, rollback })
        }
        None => Ok(()),
    }
}
