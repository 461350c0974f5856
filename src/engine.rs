//! One conversion run, from validated options to committed artifacts
//!
//! Validation and derivation happen before anything is touched. The
//! scheduled generators then run inside a single transaction; any failure
//! or signal rolls back what this run created.

use crate::access::{self, Finding};
use crate::derive::{Derived, derive};
use crate::error::UnrootError;
use crate::generators::{self, Generator, RunContext, config, write};
use crate::layout::HostLayout;
use crate::openvpn::OldConfig;
use crate::options::EffectiveOptions;
use crate::system::System;
use crate::system::pretend::Pretend;
use crate::validate;
use anyhow::Result;
use std::path::{Path, PathBuf};
use transact::{
    ExecuteSummary, InterruptFlag, ProgressCallback, Step, Transaction, TransactionLog,
    TransactionOptions, Undo, execute,
};

/// Rollback operations on top of a capability provider
pub struct SystemUndo<'a>(pub &'a dyn System);

impl Undo for SystemUndo<'_> {
    fn remove_file(&self, path: &Path) -> Result<()> {
        self.0.remove(path)
    }

    fn latest_backup(&self, path: &Path) -> Result<Option<PathBuf>> {
        write::latest_backup(self.0, path)
    }

    fn restore_file(&self, backup: &Path, path: &Path) -> Result<()> {
        self.0.rename(backup, path)
    }

    fn device_exists(&self, name: &str) -> Result<bool> {
        self.0.device_exists(name)
    }

    fn remove_device(&self, name: &str) -> Result<()> {
        self.0.remove_device(name)
    }

    fn account_exists(&self, name: &str) -> Result<bool> {
        Ok(self.0.user(name)?.is_some())
    }

    fn remove_account(&self, name: &str) -> Result<()> {
        self.0.remove_user(name)
    }

    fn group_exists(&self, name: &str) -> Result<bool> {
        Ok(self.0.group(name)?.is_some())
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        self.0.remove_group(name)
    }
}

/// What a successful run did
#[derive(Debug)]
pub struct Report {
    pub old: OldConfig,
    pub derived: Derived,
    pub plan: Vec<Generator>,
    pub summary: ExecuteSummary,
    pub log: TransactionLog,
    pub findings: Vec<Finding>,
    /// The config as the config generator renders it
    pub config_preview: String,
}

pub fn run(
    opts: &EffectiveOptions,
    layout: &HostLayout,
    sys: &dyn System,
    interrupt: Option<InterruptFlag>,
    progress: &mut dyn ProgressCallback,
) -> Result<Report, UnrootError> {
    validate::check_options(opts)?;

    let old = OldConfig::load(sys, &opts.source)?;
    let derived = derive(opts, &old, layout, sys)?;

    let pretend = Pretend::new(sys);
    let active: &dyn System = if opts.pretend { &pretend } else { sys };
    let ctx = RunContext {
        options: opts,
        layout,
        derived: &derived,
        old: &old,
        sys: active,
    };

    let plan = generators::schedule(&ctx)?;
    validate::check_derived(&plan, &ctx)?;
    log::info!(
        "Scheduled: {}",
        plan.iter()
            .map(|g| format!("{} ({})", g.label(), g.artifact_kind()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let undo = SystemUndo(active);
    let mut tx = Transaction::new(
        &undo,
        TransactionOptions {
            backups: opts.backups,
            dry_run: opts.pretend,
        },
    );
    if let Some(flag) = interrupt {
        tx = tx.with_interrupt(flag);
    }

    let steps: Vec<&dyn Step<RunContext<'_>>> = plan
        .iter()
        .map(|g| g as &dyn Step<RunContext<'_>>)
        .collect();
    let summary = execute(&steps, &ctx, &mut tx, progress)?;
    let log = tx.commit();

    let findings = if opts.pretend || sys.group(&derived.group)?.is_none() {
        Vec::new()
    } else {
        access::check(sys, &derived, &old).unwrap_or_else(|err| {
            log::warn!("Access check failed: {:#}", err);
            Vec::new()
        })
    };

    let config_preview = config::render(&old, &derived);
    Ok(Report {
        old,
        derived,
        plan,
        summary,
        log,
        findings,
        config_preview,
    })
}
