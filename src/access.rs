//! Post-run accessibility check
//!
//! Simulates whether the new account can reach every file the unprivileged
//! daemon will open. Problems are advisory and never fail the run.

use crate::derive::Derived;
use crate::openvpn::OldConfig;
use crate::system::{AccountInfo, FileMeta, System};
use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

/// Directives whose first argument names a file OpenVPN reads
const FILE_DIRECTIVES: [&str; 14] = [
    "ca",
    "cert",
    "key",
    "tls-auth",
    "tls-crypt",
    "tls-crypt-v2",
    "secret",
    "pkcs12",
    "dh",
    "crl-verify",
    "auth-user-pass",
    "askpass",
    "extra-certs",
    "http-proxy-user-pass",
];

const INLINE: &str = "[inline]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    Read,
    /// Read and execute, for scripts
    Run,
}

/// A file the account will not be able to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub path: PathBuf,
    pub user: String,
    /// Where access is denied: the file itself or an ancestor directory
    pub blocked_at: PathBuf,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.blocked_at == self.path {
            write!(f, "{} is not accessible to {}", self.path.display(), self.user)
        } else {
            write!(
                f,
                "{} is not accessible to {} (blocked at {})",
                self.path.display(),
                self.user,
                self.blocked_at.display()
            )
        }
    }
}

/// Directory relative references are resolved against
fn reference_dir(old: &OldConfig) -> PathBuf {
    match old.value("cd") {
        Some(cd) if Path::new(&cd).is_absolute() => PathBuf::from(cd),
        Some(cd) => old.dir().join(cd),
        None => old.dir(),
    }
}

/// Files named by the old config, resolved to absolute paths
pub fn referenced_files(old: &OldConfig) -> Vec<PathBuf> {
    let base = reference_dir(old);
    let mut files: Vec<PathBuf> = old
        .directives()
        .iter()
        .filter(|d| FILE_DIRECTIVES.contains(&d.name.as_str()))
        .filter_map(|d| d.arg(0))
        .filter(|arg| !arg.is_empty() && *arg != INLINE)
        .map(|arg| base.join(arg))
        .collect();
    files.dedup();
    files
}

fn allows(meta: &FileMeta, account: &AccountInfo, bits: u32) -> bool {
    let class = if meta.uid == account.uid {
        meta.mode >> 6
    } else if account.is_member(meta.gid) {
        meta.mode >> 3
    } else {
        meta.mode
    };
    class & bits == bits
}

/// First path component that denies `need` to `account`, if any
fn blocked_at(sys: &dyn System, account: &AccountInfo, path: &Path, need: Need) -> Result<Option<PathBuf>> {
    if account.uid == 0 {
        return Ok(None);
    }
    for dir in path.ancestors().skip(1) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        if let Some(meta) = sys.stat(dir)?
            && !allows(&meta, account, 0o1)
        {
            return Ok(Some(dir.to_path_buf()));
        }
    }
    let bits = match need {
        Need::Read => 0o4,
        Need::Run => 0o5,
    };
    match sys.stat(path)? {
        Some(meta) if !allows(&meta, account, bits) => Ok(Some(path.to_path_buf())),
        _ => Ok(None),
    }
}

/// Check every file the daemon needs against the account's permissions
pub fn check(sys: &dyn System, derived: &Derived, old: &OldConfig) -> Result<Vec<Finding>> {
    let Some(account) = sys.user(&derived.user)? else {
        log::debug!("Skipping access check: {} does not exist", derived.user);
        return Ok(Vec::new());
    };

    let mut wanted: Vec<(PathBuf, Need)> = vec![(derived.config.clone(), Need::Read)];
    for wrapper in [&derived.iproute, &derived.up, &derived.down].into_iter().flatten() {
        wanted.push((wrapper.clone(), Need::Run));
    }
    wanted.extend(referenced_files(old).into_iter().map(|p| (p, Need::Read)));

    let mut findings = Vec::new();
    for (path, need) in wanted {
        if !sys.exists(&path)? {
            log::debug!("Not checking {}: it does not exist", path.display());
            continue;
        }
        if let Some(blocked) = blocked_at(sys, &account, &path, need)? {
            findings.push(Finding {
                path,
                user: account.name.clone(),
                blocked_at: blocked,
            });
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::tests::{CONFIG, Fixture, sample_host};
    use crate::options::EffectiveOptions;
    use crate::system::memory::MemorySystem;
    use crate::system::{Accounts, EntryKind};

    fn with_account(mem: &MemorySystem) -> AccountInfo {
        mem.add_group("openvpn").unwrap();
        mem.add_user("openvpn", "openvpn", Path::new("/usr/sbin/nologin"))
            .unwrap();
        mem.user("openvpn").unwrap().unwrap()
    }

    #[test]
    fn test_referenced_files_resolution() {
        let old = OldConfig::parse(
            "/etc/openvpn/client/vpn.conf",
            "ca ca.crt\ncert /etc/ssl/me.crt\nkey [inline]\nauth-user-pass\ntls-auth ta.key 1\nremote x\n",
        );
        assert_eq!(
            referenced_files(&old),
            vec![
                PathBuf::from("/etc/openvpn/client/ca.crt"),
                PathBuf::from("/etc/ssl/me.crt"),
                PathBuf::from("/etc/openvpn/client/ta.key"),
            ]
        );

        let with_cd = OldConfig::parse("/etc/openvpn/client/vpn.conf", "cd /srv/vpn\nca ca.crt\n");
        assert_eq!(referenced_files(&with_cd), vec![PathBuf::from("/srv/vpn/ca.crt")]);
    }

    #[test]
    fn test_unreadable_key_is_reported() {
        let mem = sample_host();
        let account = with_account(&mem);
        mem.add_file("/etc/openvpn/client/ca.crt", "", 0o600);
        let fx = Fixture::new(&mem, EffectiveOptions::new(CONFIG));

        let findings = check(&mem, &fx.derived, &fx.old).unwrap();

        assert_eq!(
            findings,
            vec![Finding {
                path: PathBuf::from("/etc/openvpn/client/ca.crt"),
                user: account.name,
                blocked_at: PathBuf::from("/etc/openvpn/client/ca.crt"),
            }]
        );
    }

    #[test]
    fn test_group_readable_through_membership() {
        let mem = sample_host();
        let account = with_account(&mem);
        mem.add_node(
            "/etc/openvpn/client/ca.crt",
            EntryKind::Regular,
            "",
            0o640,
            0,
            account.gid,
        );
        let fx = Fixture::new(&mem, EffectiveOptions::new(CONFIG));
        assert!(check(&mem, &fx.derived, &fx.old).unwrap().is_empty());
    }

    #[test]
    fn test_closed_directory_blocks() {
        let mem = sample_host();
        with_account(&mem);
        mem.add_node("/etc/openvpn/client", EntryKind::Directory, "", 0o700, 0, 0);
        mem.add_file("/etc/openvpn/client/ca.crt", "", 0o644);
        let fx = Fixture::new(&mem, EffectiveOptions::new(CONFIG));

        let findings = check(&mem, &fx.derived, &fx.old).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].blocked_at, PathBuf::from("/etc/openvpn/client"));
        assert!(findings[0].to_string().contains("blocked at /etc/openvpn/client"));
    }

    #[test]
    fn test_missing_account_skips_check() {
        let mem = sample_host();
        mem.add_file("/etc/openvpn/client/ca.crt", "", 0o600);
        let fx = Fixture::new(&mem, EffectiveOptions::new(CONFIG));
        assert!(check(&mem, &fx.derived, &fx.old).unwrap().is_empty());
    }
}
