//! Value derivation
//!
//! Every new identifier and path is resolved through a priority chain:
//! explicit override first, then whatever the old config says, then a
//! computed default. Later chains read earlier results, so the fields are
//! resolved in declaration order. Every probe is read-only.

use crate::error::UnrootError;
use crate::layout::HostLayout;
use crate::openvpn::{DeviceKind, OldConfig};
use crate::options::{ArtifactId, EffectiveOptions};
use crate::system::System;
use std::path::{Path, PathBuf};

/// Marker added to every derived name
pub const SUFFIX: &str = "-unrooted";

/// Highest device number tried when probing
const MAX_DEVICE_NUMBER: u32 = 99;

/// Resolved identifiers and paths for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    /// Stem of the source config
    pub base: String,
    pub user: String,
    pub group: String,
    pub device_kind: Option<DeviceKind>,
    pub device: Option<String>,
    pub config: PathBuf,
    pub old_up: Option<String>,
    pub up: Option<PathBuf>,
    pub old_down: Option<String>,
    pub down: Option<PathBuf>,
    /// What the iproute wrapper elevates to
    pub ip_command: String,
    pub iproute: Option<PathBuf>,
    pub sudoers: PathBuf,
    pub netdev: Option<PathBuf>,
    pub unit: PathBuf,
}

impl Derived {
    /// Name/value pairs for display
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        fn opt<T: AsRef<Path>>(value: Option<&T>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.as_ref().display().to_string())
        }
        vec![
            ("user", self.user.clone()),
            ("group", self.group.clone()),
            (
                "device",
                match (&self.device, self.device_kind) {
                    (Some(dev), Some(kind)) => format!("{dev} ({kind})"),
                    _ => "-".to_string(),
                },
            ),
            ("config", self.config.display().to_string()),
            ("iproute", opt(self.iproute.as_ref())),
            ("up", opt(self.up.as_ref())),
            ("down", opt(self.down.as_ref())),
            ("sudoers", self.sudoers.display().to_string()),
            ("netdev", opt(self.netdev.as_ref())),
            ("unit", self.unit.display().to_string()),
        ]
    }
}

/// Insert [`SUFFIX`] before the extension, or append it when there is none
pub fn suffixed(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{SUFFIX}"),
    };
    path.with_file_name(name)
}

/// Resolve every derived value
pub fn derive(
    opts: &EffectiveOptions,
    old: &OldConfig,
    layout: &HostLayout,
    sys: &dyn System,
) -> Result<Derived, UnrootError> {
    let base = opts
        .source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            UnrootError::Usage(format!("{} has no file name", opts.source.display()))
        })?;

    let user = override_of(opts, ArtifactId::User)
        .or_else(|| old.value("user"))
        .unwrap_or_else(|| layout.default_user.clone());

    let group = match override_of(opts, ArtifactId::Group).or_else(|| old.value("group")) {
        Some(group) => group,
        None => primary_group(sys, &user)?.unwrap_or_else(|| user.clone()),
    };

    let device_kind = device_kind(opts, old)?;
    let device = match (override_of(opts, ArtifactId::Dev), device_kind) {
        (Some(dev), _) => Some(dev),
        (None, Some(kind)) => Some(probe_device(sys, kind, old.value("dev").as_deref())?),
        (None, None) => None,
    };

    let config = path_override(opts, ArtifactId::Config).unwrap_or_else(|| suffixed(old.path()));

    let old_up = old.up_command();
    let up = path_override(opts, ArtifactId::Up)
        .or_else(|| old_up.as_deref().map(|p| suffixed(Path::new(p))));

    let old_down = old.down_command();
    let down = path_override(opts, ArtifactId::Down)
        .or_else(|| old_down.as_deref().map(|p| suffixed(Path::new(p))));

    let ip_command = ip_command(old, layout, sys)?;

    let iproute = match path_override(opts, ArtifactId::Iproute) {
        Some(path) => Some(path),
        None => iproute_path(
            old,
            layout,
            sys,
            &base,
            &[up.as_deref(), down.as_deref(), Some(config.as_path())],
        )?,
    };

    let sudoers = match path_override(opts, ArtifactId::Sudoers) {
        Some(path) => path,
        None if sys.is_dir(&layout.sudoers_dir)? => layout
            .sudoers_dir
            .join(format!("openvpn-{}{SUFFIX}", sudoers_safe(&base))),
        None => layout.sudoers_file.clone(),
    };

    let netdev = match (path_override(opts, ArtifactId::Netdev), &device) {
        (Some(path), _) => Some(path),
        (None, Some(dev)) if sys.is_dir(&layout.networkd_dir)? => {
            Some(layout.networkd_dir.join(format!("{dev}.netdev")))
        }
        _ => None,
    };

    let unit = path_override(opts, ArtifactId::Unit).unwrap_or_else(|| {
        layout
            .unit_dir
            .join(format!("openvpn-client-{base}{SUFFIX}.service"))
    });

    let derived = Derived {
        base,
        user,
        group,
        device_kind,
        device,
        config,
        old_up,
        up,
        old_down,
        down,
        ip_command,
        iproute,
        sudoers,
        netdev,
        unit,
    };
    log::debug!("Derived values: {:?}", derived);
    Ok(derived)
}

fn override_of(opts: &EffectiveOptions, id: ArtifactId) -> Option<String> {
    opts.value(id).map(String::from)
}

fn path_override(opts: &EffectiveOptions, id: ArtifactId) -> Option<PathBuf> {
    opts.value(id).map(PathBuf::from)
}

fn primary_group(sys: &dyn System, user: &str) -> anyhow::Result<Option<String>> {
    let Some(account) = sys.user(user)? else {
        return Ok(None);
    };
    Ok(sys.group_by_gid(account.gid)?.map(|g| g.name))
}

fn device_kind(opts: &EffectiveOptions, old: &OldConfig) -> Result<Option<DeviceKind>, UnrootError> {
    if let Some(dev) = opts.value(ArtifactId::Dev) {
        return DeviceKind::from_prefix(dev).map(Some).ok_or_else(|| {
            UnrootError::Usage(format!("device name `{dev}` must start with tun or tap"))
        });
    }

    let kind = old
        .value("dev-type")
        .as_deref()
        .and_then(DeviceKind::from_prefix)
        .or_else(|| old.value("dev").as_deref().and_then(DeviceKind::from_prefix))
        .or_else(|| old.has("topology").then_some(DeviceKind::Tun))
        .or_else(|| old.has_prefixed("tun-").then_some(DeviceKind::Tun))
        .or_else(|| old.has_prefixed("tap-").then_some(DeviceKind::Tap));
    Ok(kind)
}

/// Trailing decimal digits of a device name
fn device_number(dev: &str) -> Option<u32> {
    let digits = dev.len() - dev.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    dev[dev.len() - digits..].parse().ok()
}

fn probe_device(
    sys: &dyn System,
    kind: DeviceKind,
    old_dev: Option<&str>,
) -> Result<String, UnrootError> {
    let preferred = old_dev.and_then(device_number).unwrap_or(0);
    for n in std::iter::once(preferred).chain(0..=MAX_DEVICE_NUMBER) {
        let candidate = format!("{kind}{n}{SUFFIX}");
        if !sys.device_exists(&candidate)? {
            log::debug!("Device {} is free", candidate);
            return Ok(candidate);
        }
        log::debug!("Device {} is taken", candidate);
    }
    Err(UnrootError::Allocation(format!(
        "no free {kind} device name between {kind}0{SUFFIX} and {kind}{MAX_DEVICE_NUMBER}{SUFFIX}"
    )))
}

fn ip_command(old: &OldConfig, layout: &HostLayout, sys: &dyn System) -> anyhow::Result<String> {
    if let Some(iproute) = old.value("iproute") {
        return Ok(iproute);
    }
    for candidate in &layout.ip_candidates {
        if sys.exists(candidate)? {
            return Ok(candidate.display().to_string());
        }
    }
    Ok(layout
        .ip_candidates
        .first()
        .map_or_else(|| "ip".to_string(), |p| p.display().to_string()))
}

fn iproute_path(
    old: &OldConfig,
    layout: &HostLayout,
    sys: &dyn System,
    base: &str,
    neighbours: &[Option<&Path>],
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(old_iproute) = old.value("iproute") {
        return Ok(Some(suffixed(Path::new(&old_iproute))));
    }

    let name = format!("{base}-iproute{SUFFIX}.sh");
    for path in neighbours.iter().flatten() {
        // existing non-regular entries such as /dev/stdout are skipped
        if sys.stat(path)?.is_some_and(|m| !m.is_regular()) {
            continue;
        }
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        return Ok(Some(dir.join(name)));
    }

    if sys.is_dir(&layout.openvpn_dir)? {
        return Ok(Some(layout.openvpn_dir.join(name)));
    }
    Ok(None)
}

/// sudo ignores drop-in files whose name contains `.` or ends in `~`
fn sudoers_safe(name: &str) -> String {
    name.replace(['.', '~'], "_")
}
