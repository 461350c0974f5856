//! Concrete systemd unit derived from the openvpn-client@ template
//!
//! The instance name is baked in, the service runs as the account, and the
//! runtime directory gets a name of its own so it cannot collide with the
//! root instance.

use super::RunContext;
use super::write::{Target, scoped_write};
use crate::derive::{Derived, SUFFIX};
use crate::rewrite::RuleSet;
use anyhow::{Context, Result};
use regex::Regex;
use transact::Outcome;

fn key_is(line: &str, keys: &[&str]) -> bool {
    line.trim_start()
        .split_once('=')
        .is_some_and(|(key, _)| keys.contains(&key.trim()))
}

pub fn runtime_dir(derived: &Derived) -> String {
    format!("openvpn-client-{}{SUFFIX}", derived.base)
}

pub fn render(template: &str, derived: &Derived) -> Result<String> {
    let rundir = runtime_dir(derived);
    let instance = derived
        .config
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .context("New config path has no file name")?;
    let workdir = derived
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.display().to_string())
        .context("New config path has no directory")?;
    let runtime_path = Regex::new(r"(%t|/run)/[^/\s]+/")?;
    let runtime_target = format!("%t/{rundir}/");

    let rules = RuleSet::new()
        .drop_when("identity", |l| key_is(l, &["User", "Group", "RuntimeDirectory"]))
        .insert_after(
            "service identity",
            |l| l.trim() == "[Service]",
            vec![
                format!("User={}", derived.user),
                format!("Group={}", derived.group),
                format!("RuntimeDirectory={rundir}"),
            ],
        )
        .rewrite_when(
            "working directory",
            |l| key_is(l, &["WorkingDirectory"]),
            move |_| format!("WorkingDirectory={workdir}"),
        )
        .rewrite_when(
            "runtime paths",
            {
                let re = runtime_path.clone();
                move |l| re.is_match(l)
            },
            move |l| {
                runtime_path
                    .replace_all(l, regex::NoExpand(&runtime_target))
                    .into_owned()
            },
        )
        .rewrite_when(
            "instance",
            |l| l.contains("%i") || l.contains("%I"),
            move |l| l.replace("%i", &instance).replace("%I", &instance),
        );

    Ok(rules.apply(template))
}

pub fn generate(ctx: &RunContext<'_>) -> Result<Outcome> {
    let template_path = &ctx.layout.unit_template;
    let template = ctx
        .sys
        .read(template_path)
        .with_context(|| format!("Could not read unit template {}", template_path.display()))?;
    let content = render(&template, ctx.derived)?;
    scoped_write(
        ctx.sys,
        &Target {
            path: &ctx.derived.unit,
            content: &content,
            mode: 0o644,
            owner: None,
        },
        ctx.backups(),
    )
}
