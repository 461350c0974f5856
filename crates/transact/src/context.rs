//! Provider and callback traits
//!
//! These traits keep the transaction engine independent of how accounts,
//! devices and files are actually manipulated, and of how progress is shown.

use crate::types::Outcome;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Operations rollback needs to reverse created artifacts
///
/// Implement this on top of whatever performs the real mutations. Every
/// method is expected to be safe to call on an already-reverted artifact.
pub trait Undo {
    /// Delete a file this run created
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Most recent numbered backup of `path` owned by the running principal
    fn latest_backup(&self, path: &Path) -> Result<Option<PathBuf>>;

    /// Move `backup` back over `path`
    fn restore_file(&self, backup: &Path, path: &Path) -> Result<()>;

    fn device_exists(&self, name: &str) -> Result<bool>;
    fn remove_device(&self, name: &str) -> Result<()>;

    fn account_exists(&self, name: &str) -> Result<bool>;
    fn remove_account(&self, name: &str) -> Result<()>;

    fn group_exists(&self, name: &str) -> Result<bool>;
    fn remove_group(&self, name: &str) -> Result<()>;
}

/// Progress callback for execution
pub trait ProgressCallback {
    /// Called before a step runs
    fn on_step_start(&mut self, name: &str);

    /// Called after a step returns successfully
    fn on_step_complete(&mut self, name: &str, outcome: &Outcome);

    /// Called when a step fails, before rollback begins
    fn on_step_failed(&mut self, name: &str, error: &anyhow::Error);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&mut self, _name: &str) {}
    fn on_step_complete(&mut self, _name: &str, _outcome: &Outcome) {}
    fn on_step_failed(&mut self, _name: &str, _error: &anyhow::Error) {}
}

/// Progress callback that remembers every outcome, in order
#[derive(Debug, Default)]
pub struct RecordProgress {
    pub outcomes: Vec<(String, Outcome)>,
    pub failed: Option<String>,
}

impl ProgressCallback for RecordProgress {
    fn on_step_start(&mut self, _name: &str) {}

    fn on_step_complete(&mut self, name: &str, outcome: &Outcome) {
        self.outcomes.push((name.to_string(), outcome.clone()));
    }

    fn on_step_failed(&mut self, name: &str, _error: &anyhow::Error) {
        self.failed = Some(name.to_string());
    }
}
