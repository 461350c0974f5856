//! Scoped writes with numbered backups
//!
//! A replaced regular file is first copied to `<path>.~N~` (N one above the
//! highest existing backup), then the new content is renamed over it. A
//! missing file is created. A failed write leaves neither the file nor a
//! fresh backup behind. Non-regular targets are written in place and never
//! recorded, so rollback never deletes a pipe or device node.

use crate::system::{Owner, System, with_suffix};
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use transact::{Artifact, Outcome};

/// A file a generator wants to exist
#[derive(Debug, Clone)]
pub struct Target<'a> {
    pub path: &'a Path,
    pub content: &'a str,
    pub mode: u32,
    pub owner: Option<Owner>,
}

pub fn scoped_write(sys: &dyn System, target: &Target<'_>, backups: bool) -> Result<Outcome> {
    let path = target.path;
    let owner = target.owner.as_ref();

    match sys.stat(path)? {
        Some(meta) if meta.is_dir() => bail!("{} is a directory", path.display()),
        Some(meta) if !meta.is_regular() => {
            sys.write_in_place(path, target.content)?;
            Ok(Outcome::Touched(format!("wrote to {}", path.display())))
        }
        Some(meta) => {
            if meta.mode == target.mode && sys.read(path)? == target.content {
                log::debug!("{} is up to date", path.display());
                return Ok(Outcome::Satisfied);
            }
            let backup = if backups {
                let backup = next_backup(sys, path)?;
                sys.copy(path, &backup)?;
                log::info!("Backed up {} to {}", path.display(), backup.display());
                Some(backup)
            } else {
                None
            };
            if let Err(err) = sys.replace(path, target.content, target.mode, owner) {
                if let Some(backup) = &backup
                    && let Err(cleanup) = sys.remove(backup)
                {
                    log::warn!("Could not remove {}: {:#}", backup.display(), cleanup);
                }
                return Err(err);
            }
            Ok(Outcome::Created(Artifact::file(path, true, backup)))
        }
        None => {
            sys.create(path, target.content, target.mode, owner)?;
            Ok(Outcome::Created(Artifact::file(path, false, None)))
        }
    }
}

/// Existing numbered backups of `path`, lowest first
fn backups_of(sys: &dyn System, path: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(Vec::new());
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if !sys.is_dir(dir)? {
        return Ok(Vec::new());
    }

    let prefix = format!("{name}.~");
    let mut found: Vec<(u32, PathBuf)> = sys
        .list_dir(dir)?
        .into_iter()
        .filter_map(|entry| {
            let n = entry.strip_prefix(&prefix)?.strip_suffix('~')?.parse().ok()?;
            Some((n, dir.join(entry)))
        })
        .collect();
    found.sort_by_key(|(n, _)| *n);
    Ok(found)
}

/// Path for the next numbered backup of `path`
pub fn next_backup(sys: &dyn System, path: &Path) -> Result<PathBuf> {
    let next = backups_of(sys, path)?
        .last()
        .map_or(1, |(n, _)| n + 1);
    Ok(with_suffix(path, &format!(".~{next}~")))
}

/// Most recent backup of `path` owned by this process's effective uid
pub fn latest_backup(sys: &dyn System, path: &Path) -> Result<Option<PathBuf>> {
    let euid = sys.euid();
    for (_, backup) in backups_of(sys, path)?.into_iter().rev() {
        if sys.stat(&backup)?.is_some_and(|m| m.is_regular() && m.uid == euid) {
            return Ok(Some(backup));
        }
        log::debug!("Ignoring {}: not a regular file owned by uid {}", backup.display(), euid);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::HostLayout;
    use crate::system::host::Host;
    use crate::system::memory::MemorySystem;
    use crate::system::{EntryKind, Files};
    use std::fs;
    use tempfile::TempDir;

    fn target<'a>(path: &'a Path, content: &'a str) -> Target<'a> {
        Target {
            path,
            content,
            mode: 0o644,
            owner: None,
        }
    }

    #[test]
    fn test_missing_file_is_created() {
        let mem = MemorySystem::new();
        mem.add_dir("/etc");
        let path = Path::new("/etc/a.conf");

        let outcome = scoped_write(&mem, &target(path, "x"), true).unwrap();

        assert_eq!(outcome, Outcome::Created(Artifact::file(path, false, None)));
        assert_eq!(mem.content(path).as_deref(), Some("x"));
    }

    #[test]
    fn test_identical_file_is_satisfied() {
        let mem = MemorySystem::new();
        mem.add_file("/etc/a.conf", "x", 0o644);
        let outcome = scoped_write(&mem, &target(Path::new("/etc/a.conf"), "x"), true).unwrap();
        assert_eq!(outcome, Outcome::Satisfied);
    }

    #[test]
    fn test_mode_change_alone_replaces() {
        let mem = MemorySystem::new();
        mem.add_file("/etc/a.conf", "x", 0o600);
        let outcome = scoped_write(&mem, &target(Path::new("/etc/a.conf"), "x"), false).unwrap();
        assert!(matches!(outcome, Outcome::Created(ref a) if a.preexisting && a.backup.is_none()));
        assert_eq!(mem.node("/etc/a.conf").unwrap().mode, 0o644);
    }

    #[test]
    fn test_replacement_takes_next_numbered_backup() {
        let mem = MemorySystem::new();
        mem.add_file("/etc/a.conf", "old", 0o644);
        mem.add_file("/etc/a.conf.~1~", "older", 0o644);
        mem.add_file("/etc/a.conf.~3~", "oldest?", 0o644);
        let path = Path::new("/etc/a.conf");

        let outcome = scoped_write(&mem, &target(path, "new"), true).unwrap();

        let backup = PathBuf::from("/etc/a.conf.~4~");
        assert_eq!(
            outcome,
            Outcome::Created(Artifact::file(path, true, Some(backup.clone())))
        );
        assert_eq!(mem.content(&backup).as_deref(), Some("old"));
        assert_eq!(mem.content(path).as_deref(), Some("new"));
    }

    #[test]
    fn test_non_regular_target_is_touched() {
        let mem = MemorySystem::new();
        mem.add_node("/dev/stdout", EntryKind::Other, "", 0o620, 0, 5);
        let outcome =
            scoped_write(&mem, &target(Path::new("/dev/stdout"), "hello"), true).unwrap();
        assert!(matches!(outcome, Outcome::Touched(_)));
        assert_eq!(mem.content("/dev/stdout").as_deref(), Some("hello"));
    }

    #[test]
    fn test_directory_target_fails() {
        let mem = MemorySystem::new();
        mem.add_dir("/etc/openvpn");
        assert!(scoped_write(&mem, &target(Path::new("/etc/openvpn"), "x"), true).is_err());
    }

    #[test]
    fn test_latest_backup_ignores_foreign_owners() {
        let mem = MemorySystem::new();
        mem.add_file("/etc/a.conf", "x", 0o644);
        mem.add_file("/etc/a.conf.~1~", "mine", 0o644);
        mem.add_node("/etc/a.conf.~2~", EntryKind::Regular, "planted", 0o644, 1000, 1000);
        mem.add_file("/etc/a.conf.~x~", "junk", 0o644);

        let latest = latest_backup(&mem, Path::new("/etc/a.conf")).unwrap();
        assert_eq!(latest, Some(PathBuf::from("/etc/a.conf.~1~")));
        assert_eq!(
            next_backup(&mem, Path::new("/etc/a.conf")).unwrap(),
            PathBuf::from("/etc/a.conf.~3~")
        );
    }

    fn host(dir: &Path) -> Host {
        let layout = HostLayout {
            sys_class_net: dir.join("net"),
            ..HostLayout::default()
        };
        Host::new(&layout)
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn unknown_owner<'a>(path: &'a Path, content: &'a str) -> Target<'a> {
        Target {
            owner: Some(Owner::new("no-such-user-zz", "no-such-group-zz")),
            ..target(path, content)
        }
    }

    #[test]
    fn test_failed_create_on_host_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let host = host(dir.path());
        let path = dir.path().join("vpn-unrooted.conf");

        assert!(scoped_write(&host, &unknown_owner(&path, "client\n"), true).is_err());

        assert!(!path.exists());
        assert!(listing(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_replace_on_host_drops_fresh_backup() {
        let dir = TempDir::new().unwrap();
        let host = host(dir.path());
        let path = dir.path().join("vpn-unrooted.conf");
        fs::write(&path, "old\n").unwrap();

        assert!(scoped_write(&host, &unknown_owner(&path, "new\n"), true).is_err());

        assert_eq!(listing(dir.path()), vec!["vpn-unrooted.conf".to_string()]);
        assert_eq!(host.read(&path).unwrap(), "old\n");
    }

    #[test]
    fn test_failed_replace_keeps_older_backups() {
        let mem = MemorySystem::new();
        mem.add_file("/etc/a.conf", "old", 0o644);
        mem.add_file("/etc/a.conf.~1~", "older", 0o644);
        mem.fail_writes_to("/etc/a.conf");
        let before = mem.snapshot();

        assert!(scoped_write(&mem, &target(Path::new("/etc/a.conf"), "new"), true).is_err());

        assert_eq!(mem.snapshot(), before);
    }
}
