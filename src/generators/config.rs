//! Rewritten client config
//!
//! Directives that only make sense for a root process go away, script hooks
//! point at the wrappers, and the device settings move to a trailer so they
//! name the persistent device.

use super::RunContext;
use super::write::{Target, scoped_write};
use crate::derive::Derived;
use crate::openvpn::{OldConfig, block_close, is_down_root, parse_line, replace_command};
use crate::rewrite::RuleSet;
use crate::system::Owner;
use anyhow::Result;
use std::path::Path;
use transact::Outcome;

pub const MARKER: &str = "# Added by openvpn-unroot";

/// Directives the unprivileged setup replaces or cannot use
const DROPPED: [&str; 6] = ["dev", "dev-type", "group", "user", "iproute", "persist-tun"];

fn is_directive(line: &str, names: &[&str]) -> bool {
    parse_line(line).is_some_and(|d| names.contains(&d.name.as_str()))
}

fn path_text(path: &Path) -> String {
    path.display().to_string()
}

/// `down` directive running `wrapper` with the plugin command's arguments
fn down_from_plugin(line: &str, wrapper: &str) -> String {
    let args = parse_line(line)
        .and_then(|d| d.arg(1).map(String::from))
        .unwrap_or_default();
    let rest = args
        .trim_start()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim());
    match rest {
        Some(rest) if !rest.is_empty() => format!("down \"{wrapper} {rest}\""),
        _ => format!("down {wrapper}"),
    }
}

pub fn render(old: &OldConfig, derived: &Derived) -> String {
    let mut rules = RuleSet::new()
        .opaque_blocks(block_close)
        .drop_when("root-only directives", |l| is_directive(l, &DROPPED));

    if let Some(up) = derived.up.as_deref().map(path_text) {
        rules = rules.rewrite_when(
            "up wrapper",
            |l| is_directive(l, &["up"]),
            move |l| replace_command(l, 0, &up).unwrap_or_else(|| l.to_string()),
        );
    }
    if let Some(down) = derived.down.as_deref().map(path_text) {
        rules = rules.rewrite_when(
            "down wrapper",
            |l| is_directive(l, &["down"]),
            move |l| replace_command(l, 0, &down).unwrap_or_else(|| l.to_string()),
        );
    }

    let is_plugin = |l: &str| parse_line(l).is_some_and(|d| is_down_root(&d) && d.arg(1).is_some());
    if old.has("down") {
        // the down directive already carries the wrapper
        rules = rules.drop_when("down-root plugin", is_plugin);
    } else if let Some(down) = derived.down.as_deref().map(path_text) {
        rules = rules.rewrite_when("down-root plugin", is_plugin, move |l| down_from_plugin(l, &down));
    }

    let mut trailer = vec![String::new(), MARKER.to_string()];
    if let Some(kind) = derived.device_kind {
        trailer.push(format!("dev-type {kind}"));
    }
    if let Some(device) = &derived.device {
        trailer.push(format!("dev {device}"));
    }
    if let Some(iproute) = &derived.iproute {
        trailer.push(format!("iproute {}", iproute.display()));
    }

    rules.trailer(trailer).apply(old.text())
}

pub fn generate(ctx: &RunContext<'_>) -> Result<Outcome> {
    let content = render(ctx.old, ctx.derived);
    scoped_write(
        ctx.sys,
        &Target {
            path: &ctx.derived.config,
            content: &content,
            mode: 0o640,
            owner: Some(Owner::new(&ctx.derived.user, &ctx.derived.group)),
        },
        ctx.backups(),
    )
}
