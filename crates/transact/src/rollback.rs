//! Rollback engine - reverses every artifact in a drained transaction log

use crate::context::Undo;
use crate::journal::TransactionLog;
use crate::types::{Artifact, ArtifactKind};
use anyhow::{Result, bail};
use std::fmt;

/// What rollback did to a single artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reversal {
    /// File deleted, or account/group/device removed
    Removed,
    /// File restored from a numbered backup
    Restored,
    /// Already gone; nothing to do
    AlreadyGone,
}

/// Outcome of a rollback pass
#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    pub reverted: Vec<(Artifact, Reversal)>,
    pub failures: Vec<(Artifact, String)>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.reverted.is_empty() && self.failures.is_empty()
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} artifact(s) reverted, {} failure(s)",
            self.reverted.len(),
            self.failures.len()
        )
    }
}

/// Reverse every artifact, best effort
///
/// A failure on one artifact is recorded and the pass continues with the
/// rest.
pub fn rollback(entries: Vec<Artifact>, undo: &dyn Undo, backups: bool) -> RollbackReport {
    let mut report = RollbackReport::default();

    for artifact in TransactionLog::rollback_order(entries) {
        match revert(&artifact, undo, backups) {
            Ok(reversal) => {
                log::info!("Rolled back {} ({:?})", artifact, reversal);
                report.reverted.push((artifact, reversal));
            }
            Err(e) => {
                log::error!("Failed to roll back {}: {:#}", artifact, e);
                report.failures.push((artifact, format!("{:#}", e)));
            }
        }
    }

    report
}

fn revert(artifact: &Artifact, undo: &dyn Undo, backups: bool) -> Result<Reversal> {
    match artifact.kind {
        ArtifactKind::File => {
            if backups && artifact.preexisting {
                if let Some(backup) = undo.latest_backup(artifact.path())? {
                    undo.restore_file(&backup, artifact.path())?;
                    return Ok(Reversal::Restored);
                }
            }
            undo.remove_file(artifact.path())?;
            Ok(Reversal::Removed)
        }
        ArtifactKind::SharedFile => {
            if let Some(backup) = undo.latest_backup(artifact.path())? {
                undo.restore_file(&backup, artifact.path())?;
                return Ok(Reversal::Restored);
            }
            bail!("no backup to restore and shared files are never deleted")
        }
        ArtifactKind::Device => {
            if !undo.device_exists(&artifact.identity)? {
                return Ok(Reversal::AlreadyGone);
            }
            undo.remove_device(&artifact.identity)?;
            Ok(Reversal::Removed)
        }
        ArtifactKind::Account => {
            if !undo.account_exists(&artifact.identity)? {
                return Ok(Reversal::AlreadyGone);
            }
            undo.remove_account(&artifact.identity)?;
            Ok(Reversal::Removed)
        }
        ArtifactKind::Group => {
            if !undo.group_exists(&artifact.identity)? {
                return Ok(Reversal::AlreadyGone);
            }
            undo.remove_group(&artifact.identity)?;
            Ok(Reversal::Removed)
        }
    }
}
