//! Elevation wrappers
//!
//! Each wrapper is a two-line shell script that re-executes one privileged
//! command through `sudo -n`. The up/down wrappers preserve the environment,
//! since that is how OpenVPN hands its state to scripts.

use super::RunContext;
use super::write::{Target, scoped_write};
use crate::system::Owner;
use anyhow::{Context, Result};
use std::path::Path;
use transact::Outcome;

const WRAPPER_MODE: u32 = 0o755;

/// Quote `word` for `/bin/sh` unless it only has unambiguous characters
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:,@%=".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

pub fn wrapper_script(sudo: &Path, target: &str, preserve_env: bool) -> String {
    let env = if preserve_env { " -E" } else { "" };
    format!(
        "#!/bin/sh\nexec {} -n{env} -- {} \"$@\"\n",
        shell_quote(&sudo.display().to_string()),
        shell_quote(target)
    )
}

fn write_wrapper(ctx: &RunContext<'_>, path: &Path, target: &str, preserve_env: bool) -> Result<Outcome> {
    let content = wrapper_script(&ctx.layout.sudo, target, preserve_env);
    scoped_write(
        ctx.sys,
        &Target {
            path,
            content: &content,
            mode: WRAPPER_MODE,
            owner: Some(Owner::new(&ctx.derived.user, &ctx.derived.group)),
        },
        ctx.backups(),
    )
}

pub fn generate_iproute(ctx: &RunContext<'_>) -> Result<Outcome> {
    let path = ctx
        .derived
        .iproute
        .as_deref()
        .context("No location for the iproute wrapper")?;
    write_wrapper(ctx, path, &ctx.derived.ip_command, false)
}

pub fn generate_up(ctx: &RunContext<'_>) -> Result<Outcome> {
    let d = ctx.derived;
    let (Some(path), Some(target)) = (d.up.as_deref(), d.old_up.as_deref()) else {
        anyhow::bail!("{} has no up script to wrap", ctx.old.path().display());
    };
    write_wrapper(ctx, path, target, true)
}

pub fn generate_down(ctx: &RunContext<'_>) -> Result<Outcome> {
    let d = ctx.derived;
    let (Some(path), Some(target)) = (d.down.as_deref(), d.old_down.as_deref()) else {
        anyhow::bail!("{} has no down script to wrap", ctx.old.path().display());
    };
    if d.up.as_deref() == Some(path) {
        return Ok(Outcome::Skipped {
            reason: format!("{} is already the up wrapper", path.display()),
        });
    }
    write_wrapper(ctx, path, target, true)
}
