//! Well-known host paths
//!
//! Distributions disagree on where sudo, ip, nologin and the systemd
//! directories live, so every host path the tool reads or writes comes from
//! a [`HostLayout`].
//!
//! # Resolution Priority
//!
//! 1. `--layout <FILE>`
//! 2. `OPENVPN_UNROOT_LAYOUT` environment variable
//! 3. Built-in defaults
//!
//! Layout files are TOML. Missing keys fall back to the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming a layout file
pub const ENV_LAYOUT: &str = "OPENVPN_UNROOT_LAYOUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostLayout {
    /// Monolithic sudoers file, used when there is no drop-in directory
    pub sudoers_file: PathBuf,
    pub sudoers_dir: PathBuf,
    /// systemd-networkd configuration directory
    pub networkd_dir: PathBuf,
    pub unit_dir: PathBuf,
    /// Template unit the generated instance is derived from
    pub unit_template: PathBuf,
    pub openvpn_dir: PathBuf,
    pub sys_class_net: PathBuf,
    pub sudo: PathBuf,
    /// Where to look for `ip`, in order
    pub ip_candidates: Vec<PathBuf>,
    pub nologin: PathBuf,
    pub default_user: String,
}

impl Default for HostLayout {
    fn default() -> Self {
        Self {
            sudoers_file: PathBuf::from("/etc/sudoers"),
            sudoers_dir: PathBuf::from("/etc/sudoers.d"),
            networkd_dir: PathBuf::from("/etc/systemd/network"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            unit_template: PathBuf::from("/usr/lib/systemd/system/openvpn-client@.service"),
            openvpn_dir: PathBuf::from("/etc/openvpn"),
            sys_class_net: PathBuf::from("/sys/class/net"),
            sudo: PathBuf::from("/usr/bin/sudo"),
            ip_candidates: ["/usr/bin/ip", "/usr/sbin/ip", "/sbin/ip", "/bin/ip"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            nologin: PathBuf::from("/usr/sbin/nologin"),
            default_user: "openvpn".to_string(),
        }
    }
}

impl HostLayout {
    /// Resolve the layout for this run
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            log::debug!("Using layout from --layout: {}", path.display());
            return Self::from_file(&expand(&path.to_string_lossy()));
        }

        if let Ok(file) = std::env::var(ENV_LAYOUT)
            && !file.trim().is_empty()
        {
            let path = expand(&file);
            log::debug!("Using layout from {}: {}", ENV_LAYOUT, path.display());
            return Self::from_file(&path);
        }

        log::debug!("Using built-in host layout");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read layout file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid layout file {}", path.display()))
    }
}

/// Expand `~` and environment variables in a path
///
/// Unknown variables are left untouched.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("layout.toml");
        fs::write(
            &file,
            "sudoers_dir = \"/srv/sudoers.d\"\nip_candidates = [\"/opt/ip\"]\n",
        )
        .unwrap();

        let layout = HostLayout::load(Some(&file)).unwrap();
        assert_eq!(layout.sudoers_dir, PathBuf::from("/srv/sudoers.d"));
        assert_eq!(layout.ip_candidates, vec![PathBuf::from("/opt/ip")]);
        assert_eq!(layout.sudoers_file, PathBuf::from("/etc/sudoers"));
        assert_eq!(layout.default_user, "openvpn");
    }

    #[test]
    fn test_env_var_layout() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("env-layout.toml");
        fs::write(&file, "default_user = \"vpn\"\n").unwrap();

        let layout = with_env_var(ENV_LAYOUT, &file.to_string_lossy(), || {
            HostLayout::load(None).unwrap()
        });
        assert_eq!(layout.default_user, "vpn");
    }

    #[test]
    fn test_invalid_layout_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.toml");
        fs::write(&file, "sudoers_dir = [").unwrap();

        let err = HostLayout::from_file(&file).unwrap_err();
        assert!(err.to_string().contains("Invalid layout file"));
    }

    #[test]
    fn test_missing_layout_file() {
        assert!(HostLayout::from_file(Path::new("/nonexistent/layout.toml")).is_err());
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/etc/sudoers"), PathBuf::from("/etc/sudoers"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("$OPENVPN_UNROOT_SURELY_UNSET/x");
        assert_eq!(result, PathBuf::from("$OPENVPN_UNROOT_SURELY_UNSET/x"));
    }
}
