//! # Transact
//!
//! All-or-nothing execution of side-effecting steps.
//!
//! Steps run strictly in order. Each one reports whether it created an
//! artifact (an account, a group, a network device, or a file); created
//! artifacts go into a [`TransactionLog`]. If a step fails, a signal
//! arrives, or the [`Transaction`] is dropped without being committed, the
//! log is handed to the rollback engine, which reverses every artifact.
//!
//! ## Core Concepts
//!
//! - **Step**: one idempotent unit of work, returning an [`Outcome`]
//! - **Transaction**: owns the log; rolls back on drop unless committed
//! - **Undo**: provider trait rollback uses to reverse artifacts
//! - **InterruptFlag**: signal notification polled between steps
//!
//! ## Example
//!
//! ```ignore
//! use transact::{execute, NoProgress, Transaction, TransactionOptions};
//!
//! let mut tx = Transaction::new(&undo, TransactionOptions::default())
//!     .with_interrupt(InterruptFlag::install()?);
//! let summary = execute(&steps, &ctx, &mut tx, &mut NoProgress)?;
//! let log = tx.commit();
//! ```

pub mod context;
pub mod executor;
pub mod interrupt;
pub mod journal;
pub mod rollback;
pub mod transaction;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback, RecordProgress, Undo};
pub use executor::{ExecuteError, Step, execute};
pub use interrupt::{InterruptFlag, signal_name};
pub use journal::TransactionLog;
pub use rollback::{Reversal, RollbackReport, rollback};
pub use transaction::{Transaction, TransactionOptions};
pub use types::{Artifact, ArtifactKind, ExecuteSummary, Outcome};
