use super::RunContext;
use super::write::{Target, scoped_write};
use crate::derive::Derived;
use crate::openvpn::DeviceKind;
use anyhow::{Context, Result};
use transact::Outcome;

/// systemd-networkd description of the persistent device
pub fn render(derived: &Derived, device: &str, kind: DeviceKind) -> String {
    let section = match kind {
        DeviceKind::Tun => "Tun",
        DeviceKind::Tap => "Tap",
    };
    format!(
        "[NetDev]\nName={device}\nKind={kind}\n\n[{section}]\nUser={}\nGroup={}\n",
        derived.user, derived.group
    )
}

pub fn generate(ctx: &RunContext<'_>) -> Result<Outcome> {
    let d = ctx.derived;
    let path = d.netdev.as_deref().context("No location for the netdev file")?;
    let kind = d.device_kind.context("Device kind is unresolved")?;
    let device = d.device.as_deref().context("No device name was derived")?;

    let content = render(d, device, kind);
    scoped_write(
        ctx.sys,
        &Target {
            path,
            content: &content,
            mode: 0o644,
            owner: None,
        },
        ctx.backups(),
    )
}
