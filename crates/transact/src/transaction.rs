//! Scoped transaction - rolls back on drop unless committed

use crate::context::Undo;
use crate::interrupt::InterruptFlag;
use crate::journal::TransactionLog;
use crate::rollback::{RollbackReport, rollback};
use crate::types::Artifact;

/// Options for a transaction
#[derive(Debug, Clone, Copy)]
pub struct TransactionOptions {
    /// Restore preexisting files from numbered backups instead of deleting them
    pub backups: bool,
    /// Nothing is really mutated; the log only records what would be created
    pub dry_run: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            backups: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    RolledBack,
}

/// An all-or-nothing unit of work
///
/// Every artifact a step creates is recorded here. If the transaction is
/// neither committed nor explicitly rolled back, dropping it rolls back,
/// so an early return or a panic cannot leave half a setup behind.
pub struct Transaction<'a> {
    undo: &'a dyn Undo,
    log: TransactionLog,
    options: TransactionOptions,
    interrupt: Option<InterruptFlag>,
    state: State,
}

impl<'a> Transaction<'a> {
    pub fn new(undo: &'a dyn Undo, options: TransactionOptions) -> Self {
        Self {
            undo,
            log: TransactionLog::new(),
            options,
            interrupt: None,
            state: State::Open,
        }
    }

    /// Watch an interrupt flag between steps
    pub fn with_interrupt(mut self, flag: InterruptFlag) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn options(&self) -> TransactionOptions {
        self.options
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Record a created artifact
    pub fn record(&mut self, artifact: Artifact) {
        self.log.record(artifact);
    }

    /// Signal received since the transaction started, if any
    pub fn pending_interrupt(&self) -> Option<i32> {
        self.interrupt.as_ref().and_then(InterruptFlag::pending)
    }

    /// Whether rollback may still do something
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Undo everything recorded so far
    ///
    /// Runs at most once; later calls return an empty report. In dry-run
    /// mode nothing was mutated, so nothing is undone and the log is kept
    /// for reporting.
    pub fn rollback(&mut self) -> RollbackReport {
        if self.state != State::Open {
            log::debug!("Rollback already done or transaction committed, skipping");
            return RollbackReport::default();
        }
        self.state = State::RolledBack;

        if self.options.dry_run {
            log::info!("Dry run - {} artifact(s) would have been rolled back", self.log.len());
            return RollbackReport::default();
        }

        let entries = self.log.drain();
        if entries.is_empty() {
            log::debug!("Nothing to roll back");
            return RollbackReport::default();
        }

        log::warn!("Rolling back {} artifact(s)...", entries.len());
        let report = rollback(entries, self.undo, self.options.backups);
        log::info!("Rollback complete: {}", report);
        report
    }

    /// Finish successfully and hand back the log
    pub fn commit(mut self) -> TransactionLog {
        self.state = State::Committed;
        std::mem::take(&mut self.log)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == State::Open && !self.log.is_empty() {
            log::debug!("Transaction dropped without commit, rolling back");
            let _ = self.rollback();
        }
    }
}
