//! Sudoers rule letting the account run exactly the elevated commands
//!
//! With a drop-in directory the rule gets its own file. Otherwise it is
//! appended to the monolithic sudoers file. That file is always backed up
//! first, and rollback restores it but never deletes it.

use super::RunContext;
use super::write::{Target, next_backup, scoped_write};
use crate::derive::Derived;
use anyhow::{Context, Result};
use std::path::Path;
use transact::{Artifact, Outcome};

/// Mode sudo requires for its files
const SUDOERS_MODE: u32 = 0o440;

/// The single rule granted to the account
///
/// The down clause is left out when it would repeat the up clause, or when
/// the down wrapper shares the up wrapper's path and is never written.
pub fn sudoers_line(derived: &Derived) -> String {
    let mut line = format!(
        "{} ALL=(ALL) NOPASSWD: {}",
        derived.user, derived.ip_command
    );
    if let Some(up) = &derived.old_up {
        line.push_str(&format!(", NOPASSWD:SETENV: {up}"));
    }
    let shared_wrapper = derived.up.is_some() && derived.up == derived.down;
    if let Some(down) = &derived.old_down
        && derived.old_up.as_ref() != Some(down)
        && !shared_wrapper
    {
        line.push_str(&format!(", NOPASSWD:SETENV: {down}"));
    }
    line
}

fn fragment(ctx: &RunContext<'_>, line: &str) -> String {
    format!(
        "# Generated by openvpn-unroot for {}\n{}\n",
        ctx.old.path().display(),
        line
    )
}

pub fn generate(ctx: &RunContext<'_>) -> Result<Outcome> {
    let path = ctx.derived.sudoers.as_path();
    let line = sudoers_line(ctx.derived);

    if path == ctx.layout.sudoers_file {
        return append_to_monolith(ctx, &line);
    }

    let content = fragment(ctx, &line);
    ctx.sys
        .check_sudoers(&content)
        .with_context(|| format!("Refusing to install invalid sudoers rule in {}", path.display()))?;
    scoped_write(
        ctx.sys,
        &Target {
            path,
            content: &content,
            mode: SUDOERS_MODE,
            owner: None,
        },
        ctx.backups(),
    )
}

fn append_to_monolith(ctx: &RunContext<'_>, line: &str) -> Result<Outcome> {
    let path = ctx.derived.sudoers.as_path();
    let current = ctx.sys.read(path)?;
    if current.lines().any(|l| l.trim() == line) {
        log::debug!("{} already grants {}", path.display(), ctx.derived.user);
        return Ok(Outcome::Satisfied);
    }

    let mut addition = String::new();
    if !current.is_empty() && !current.ends_with('\n') {
        addition.push('\n');
    }
    addition.push_str(line);
    addition.push('\n');

    let candidate = format!("{current}{addition}");
    ctx.sys
        .check_sudoers(&candidate)
        .with_context(|| format!("Refusing to append invalid rule to {}", path.display()))?;

    // taken regardless of --no-backup
    let backup = next_backup(ctx.sys, path)?;
    ctx.sys.copy(path, &backup)?;
    if let Err(err) = ctx.sys.append(path, &addition) {
        discard(ctx, &backup);
        return Err(err);
    }
    Ok(Outcome::Created(Artifact::shared_file(path, Some(backup))))
}

fn discard(ctx: &RunContext<'_>, backup: &Path) {
    if let Err(err) = ctx.sys.remove(backup) {
        log::warn!("Could not remove {}: {:#}", backup.display(), err);
    }
}
