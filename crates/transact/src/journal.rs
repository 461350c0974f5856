//! Append-only record of the artifacts created during one run

use crate::types::{Artifact, ArtifactKind};

/// Ordered log of created artifacts
///
/// Entries are only ever appended while steps run. The log is consumed
/// exactly once, either by rollback or by a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionLog {
    entries: Vec<Artifact>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an artifact
    ///
    /// Accounts, groups and devices are recorded at most once; a repeated
    /// record of the same identity is ignored.
    pub fn record(&mut self, artifact: Artifact) {
        if !artifact.kind.is_file()
            && self
                .entries
                .iter()
                .any(|a| a.kind == artifact.kind && a.identity == artifact.identity)
        {
            log::debug!("{} already recorded, ignoring", artifact);
            return;
        }
        log::debug!("Recorded {}", artifact);
        self.entries.push(artifact);
    }

    pub fn entries(&self) -> &[Artifact] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every entry, leaving the log empty
    pub fn drain(&mut self) -> Vec<Artifact> {
        std::mem::take(&mut self.entries)
    }

    /// Entries in the order rollback must undo them
    ///
    /// Files go first (newest first) since they are owned by the account and
    /// group; then devices, accounts, and finally groups, because a group
    /// cannot be removed while it is still some account's primary group.
    pub fn rollback_order(entries: Vec<Artifact>) -> Vec<Artifact> {
        let mut ordered: Vec<Artifact> = entries
            .iter()
            .rev()
            .filter(|a| a.kind.is_file())
            .cloned()
            .collect();
        for kind in [ArtifactKind::Device, ArtifactKind::Account, ArtifactKind::Group] {
            ordered.extend(entries.iter().rev().filter(|a| a.kind == kind).cloned());
        }
        ordered
    }
}
