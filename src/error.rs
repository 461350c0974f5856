//! Error taxonomy and exit statuses

use crate::options::ArtifactId;
use crate::runner;
use thiserror::Error;
use transact::{ExecuteError, RollbackReport, signal_name};

/// Command line usage error (sysexits `EX_USAGE`)
pub const EX_USAGE: i32 = 64;
/// Configuration error (sysexits `EX_CONFIG`)
pub const EX_CONFIG: i32 = 78;

/// An artifact together with the prerequisites nobody asked for
pub type MissingPrerequisite = (ArtifactId, Vec<ArtifactId>);

#[derive(Debug, Error)]
pub enum UnrootError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Validation(String),

    #[error("missing prerequisites: {}", describe_missing(.0))]
    MissingPrerequisites(Vec<MissingPrerequisite>),

    #[error("{0}")]
    Allocation(String),

    #[error("{step} failed: {source:#}")]
    Runtime {
        step: &'static str,
        #[source]
        source: anyhow::Error,
        rollback: RollbackReport,
    },

    #[error("interrupted by {}", signal_name(*.signal))]
    Interrupted { signal: i32, rollback: RollbackReport },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_missing(missing: &[MissingPrerequisite]) -> String {
    missing
        .iter()
        .map(|(id, prereqs)| {
            let names: Vec<&str> = prereqs.iter().map(|p| p.as_str()).collect();
            format!("{} needs {}", id, names.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl UnrootError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => EX_USAGE,
            Self::Validation(_) | Self::MissingPrerequisites(_) | Self::Allocation(_) => EX_CONFIG,
            Self::Runtime { source, .. } => runner::exit_code(source).unwrap_or(1),
            Self::Interrupted { signal, .. } => 128 + signal,
            Self::Io(_) => 1,
            Self::Other(err) => runner::exit_code(err).unwrap_or(1),
        }
    }

    /// Rollback performed on the way out, if any
    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            Self::Runtime { rollback, .. } | Self::Interrupted { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

impl From<ExecuteError> for UnrootError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::Step {
                step,
                source,
                rollback,
            } => Self::Runtime {
                step,
                source,
                rollback,
            },
            ExecuteError::Interrupted { signal, rollback } => Self::Interrupted { signal, rollback },
        }
    }
}
