//! The real host: shadow-utils, iproute2, visudo and the local filesystem

use super::{AccountInfo, Accounts, Devices, EntryKind, FileMeta, Files, GroupInfo, Owner, Policy};
use crate::layout::HostLayout;
use crate::openvpn::DeviceKind;
use crate::runner;
use anyhow::{Context, Result};
use nix::unistd::{Gid, Group, Uid, User};
use tempfile::NamedTempFile;
use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

pub struct Host {
    sys_class_net: PathBuf,
    ip: PathBuf,
}

impl Host {
    pub fn new(layout: &HostLayout) -> Self {
        let ip = layout
            .ip_candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .unwrap_or_else(|| PathBuf::from("ip"));
        log::debug!("Using {} for device management", ip.display());
        Self {
            sys_class_net: layout.sys_class_net.clone(),
            ip,
        }
    }

    fn ip(&self, args: &[&str]) -> Result<()> {
        runner::run(&self.ip.to_string_lossy(), args)
    }
}

fn resolve_owner(owner: &Owner) -> Result<(Uid, Gid)> {
    let user = User::from_name(&owner.user)
        .with_context(|| format!("Could not look up user `{}`", owner.user))?
        .with_context(|| format!("User `{}` does not exist", owner.user))?;
    let group = Group::from_name(&owner.group)
        .with_context(|| format!("Could not look up group `{}`", owner.group))?
        .with_context(|| format!("Group `{}` does not exist", owner.group))?;
    Ok((user.uid, group.gid))
}

/// Temporary file next to `path` holding `content` with its final mode and owner
///
/// The owner is resolved before anything is written. The file disappears
/// when dropped unless it is persisted.
fn staged(path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<NamedTempFile> {
    let ids = owner.map(resolve_owner).transpose()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".openvpn-unroot")
        .tempfile_in(dir)
        .with_context(|| format!("Could not create temporary file in {}", dir.display()))?;
    temp.write_all(content.as_bytes())
        .with_context(|| format!("Could not write temporary file for {}", path.display()))?;
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod failed for {}", path.display()))?;
    if let Some((uid, gid)) = ids {
        nix::unistd::chown(temp.path(), Some(uid), Some(gid))
            .with_context(|| format!("chown failed for {}", path.display()))?;
    }
    Ok(temp)
}

impl Accounts for Host {
    fn user(&self, name: &str) -> Result<Option<AccountInfo>> {
        let Some(user) =
            User::from_name(name).with_context(|| format!("Could not look up user `{name}`"))?
        else {
            return Ok(None);
        };
        let cname = CString::new(name).context("User name contains a NUL byte")?;
        let groups = nix::unistd::getgrouplist(&cname, user.gid)
            .with_context(|| format!("Could not list groups of `{name}`"))?;
        Ok(Some(AccountInfo {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            groups: groups.into_iter().map(Gid::as_raw).collect(),
        }))
    }

    fn group(&self, name: &str) -> Result<Option<GroupInfo>> {
        let group =
            Group::from_name(name).with_context(|| format!("Could not look up group `{name}`"))?;
        Ok(group.map(|g| GroupInfo {
            name: g.name,
            gid: g.gid.as_raw(),
        }))
    }

    fn group_by_gid(&self, gid: u32) -> Result<Option<GroupInfo>> {
        let group = Group::from_gid(Gid::from_raw(gid))
            .with_context(|| format!("Could not look up gid {gid}"))?;
        Ok(group.map(|g| GroupInfo {
            name: g.name,
            gid: g.gid.as_raw(),
        }))
    }

    fn add_group(&self, name: &str) -> Result<()> {
        runner::run("groupadd", &["--system", name])
    }

    fn add_user(&self, name: &str, group: &str, shell: &Path) -> Result<()> {
        let shell = path_str(shell);
        runner::run(
            "useradd",
            &[
                "--system",
                "--gid",
                group,
                "--no-create-home",
                "--home-dir",
                "/nonexistent",
                "--shell",
                &shell,
                name,
            ],
        )
    }

    fn add_to_group(&self, user: &str, group: &str) -> Result<()> {
        runner::run("usermod", &["--append", "--groups", group, user])
    }

    fn remove_user(&self, name: &str) -> Result<()> {
        runner::run("userdel", &[name])
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        runner::run("groupdel", &[name])
    }
}

impl Devices for Host {
    fn device_exists(&self, name: &str) -> Result<bool> {
        Ok(self.sys_class_net.join(name).exists())
    }

    fn add_device(&self, name: &str, kind: DeviceKind, user: &str, group: &str) -> Result<()> {
        self.ip(&[
            "tuntap",
            "add",
            "dev",
            name,
            "mode",
            kind.as_str(),
            "user",
            user,
            "group",
            group,
        ])
    }

    fn remove_device(&self, name: &str) -> Result<()> {
        self.ip(&["link", "delete", "dev", name])
    }
}

impl Policy for Host {
    fn check_sudoers(&self, content: &str) -> Result<()> {
        let mut candidate = tempfile::Builder::new()
            .prefix("openvpn-unroot-sudoers")
            .tempfile()
            .context("Could not create sudoers candidate file")?;
        candidate
            .write_all(content.as_bytes())
            .context("Could not write sudoers candidate file")?;
        let path = path_str(candidate.path());
        runner::run("visudo", &["-c", "-q", "-f", &path]).context("sudoers validation failed")
    }
}

impl Files for Host {
    fn stat(&self, path: &Path) -> Result<Option<FileMeta>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Could not stat {}", path.display())),
        };
        let kind = if meta.is_file() {
            EntryKind::Regular
        } else if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        };
        Ok(Some(FileMeta {
            kind,
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
        }))
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(dir).with_context(|| format!("Could not list {}", dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Could not list {}", dir.display()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn create(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<()> {
        let temp = staged(path, content, mode, owner)?;
        temp.persist_noclobber(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        Ok(())
    }

    fn replace(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<()> {
        let temp = staged(path, content, mode, owner)?;
        temp.persist(path)
            .with_context(|| format!("Could not replace {}", path.display()))?;
        Ok(())
    }

    fn write_in_place(&self, path: &Path, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Could not open {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Could not write {}", path.display()))
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Could not open {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Could not append to {}", path.display()))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to)
            .with_context(|| format!("Could not copy {} to {}", from.display(), to.display()))?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)
            .with_context(|| format!("Could not move {} to {}", from.display(), to.display()))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Could not remove {}", path.display())),
        }
    }

    fn euid(&self) -> u32 {
        nix::unistd::geteuid().as_raw()
    }
}


fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
