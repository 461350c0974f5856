use super::RunContext;
use anyhow::{Context, Result};
use transact::{Artifact, Outcome};

pub fn ensure_group(ctx: &RunContext<'_>) -> Result<Outcome> {
    let group = &ctx.derived.group;
    if ctx.sys.group(group)?.is_some() {
        log::debug!("Group {} already exists", group);
        return Ok(Outcome::Satisfied);
    }
    ctx.sys
        .add_group(group)
        .with_context(|| format!("Failed to create group {group}"))?;
    Ok(Outcome::Created(Artifact::group(group.as_str())))
}

/// Create the account, or make sure an existing one is in the group
///
/// Adding an existing account to the group is reported as touched and is
/// not undone by rollback.
pub fn ensure_account(ctx: &RunContext<'_>) -> Result<Outcome> {
    let user = &ctx.derived.user;
    let group = &ctx.derived.group;

    let Some(account) = ctx.sys.user(user)? else {
        ctx.sys
            .add_user(user, group, &ctx.layout.nologin)
            .with_context(|| format!("Failed to create account {user}"))?;
        return Ok(Outcome::Created(Artifact::account(user.as_str())));
    };

    let gid = ctx.sys.group(group)?.map(|g| g.gid);
    if gid.is_some_and(|gid| account.is_member(gid)) {
        log::debug!("{} is already in group {}", user, group);
        return Ok(Outcome::Satisfied);
    }

    ctx.sys
        .add_to_group(user, group)
        .with_context(|| format!("Failed to add {user} to group {group}"))?;
    Ok(Outcome::Touched(format!("added {user} to group {group}")))
}
