use super::RunContext;
use anyhow::{Context, Result};
use transact::{Artifact, Outcome};

/// Create the persistent device, owned by the account
pub fn generate(ctx: &RunContext<'_>) -> Result<Outcome> {
    let d = ctx.derived;
    let kind = d.device_kind.context("Device kind is unresolved")?;
    let device = d.device.as_deref().context("No device name was derived")?;

    if ctx.sys.device_exists(device)? {
        log::debug!("Device {} already exists", device);
        return Ok(Outcome::Satisfied);
    }
    ctx.sys
        .add_device(device, kind, &d.user, &d.group)
        .with_context(|| format!("Failed to create {kind} device {device}"))?;
    Ok(Outcome::Created(Artifact::device(device)))
}
