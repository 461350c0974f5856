//! Core types for transactional artifact generation

use std::fmt;
use std::path::{Path, PathBuf};

/// What kind of thing a step created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A system account
    Account,
    /// A system group
    Group,
    /// A virtual network device
    Device,
    /// A file this run owns outright (deleted or restored on rollback)
    File,
    /// A file shared with the rest of the system (restored on rollback, never deleted)
    SharedFile,
}

impl ArtifactKind {
    /// Whether the artifact lives on the filesystem
    pub fn is_file(self) -> bool {
        matches!(self, Self::File | Self::SharedFile)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Account => "account",
            Self::Group => "group",
            Self::Device => "device",
            Self::File => "file",
            Self::SharedFile => "shared file",
        };
        f.write_str(name)
    }
}

/// Something a step created during this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Account/group/device name, or file path
    pub identity: String,
    /// A regular file already existed at this path before the step ran
    pub preexisting: bool,
    /// Numbered backup taken before replacing a preexisting file
    pub backup: Option<PathBuf>,
}

impl Artifact {
    pub fn account(name: impl Into<String>) -> Self {
        Self::named(ArtifactKind::Account, name)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::named(ArtifactKind::Group, name)
    }

    pub fn device(name: impl Into<String>) -> Self {
        Self::named(ArtifactKind::Device, name)
    }

    /// A file written by this run
    pub fn file(path: &Path, preexisting: bool, backup: Option<PathBuf>) -> Self {
        Self {
            kind: ArtifactKind::File,
            identity: path.display().to_string(),
            preexisting,
            backup,
        }
    }

    /// A system-wide file that was appended to
    pub fn shared_file(path: &Path, backup: Option<PathBuf>) -> Self {
        Self {
            kind: ArtifactKind::SharedFile,
            identity: path.display().to_string(),
            preexisting: true,
            backup,
        }
    }

    fn named(kind: ArtifactKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            identity: name.into(),
            preexisting: false,
            backup: None,
        }
    }

    /// Path of a file artifact
    pub fn path(&self) -> &Path {
        Path::new(&self.identity)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identity)
    }
}

/// Result of running one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new artifact exists; it goes into the transaction log
    Created(Artifact),
    /// A preexisting entity was modified; never rolled back
    Touched(String),
    /// Already in the desired state
    Satisfied,
    /// Not applicable for this run
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Touched(_))
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub touched: usize,
    pub satisfied: usize,
    pub skipped: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.touched
    }

    /// Total number of steps processed
    pub fn total(&self) -> usize {
        self.created + self.touched + self.satisfied + self.skipped
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Touched(_) => self.touched += 1,
            Outcome::Satisfied => self.satisfied += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
        }
    }
}
