//! Capability providers
//!
//! Everything that touches the host goes through these traits so the
//! engine can run against the real system ([`host::Host`]), a dry-run
//! wrapper ([`pretend::Pretend`]), or an in-memory simulation in tests.

pub mod host;
#[cfg(test)]
pub mod memory;
pub mod pretend;

use crate::openvpn::DeviceKind;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// A system account as seen by the user database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub name: String,
    pub uid: u32,
    /// Primary group id
    pub gid: u32,
    /// Supplementary group ids
    pub groups: Vec<u32>,
}

impl AccountInfo {
    /// Whether the account is in `gid`, as primary or supplementary group
    pub fn is_member(&self, gid: u32) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    pub gid: u32,
}

/// Owner to give a written file, by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub user: String,
    pub group: String,
}

impl Owner {
    pub fn new(user: &str, group: &str) -> Self {
        Self {
            user: user.to_string(),
            group: group.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    /// Device node, pipe, socket
    Other,
}

/// Result of `stat` (symlinks followed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub kind: EntryKind,
    /// Permission bits only
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl FileMeta {
    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::Regular
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// User database
pub trait Accounts {
    fn user(&self, name: &str) -> Result<Option<AccountInfo>>;
    fn group(&self, name: &str) -> Result<Option<GroupInfo>>;
    fn group_by_gid(&self, gid: u32) -> Result<Option<GroupInfo>>;

    /// Create a system group
    fn add_group(&self, name: &str) -> Result<()>;
    /// Create a system account with no home and no login shell
    fn add_user(&self, name: &str, group: &str, shell: &Path) -> Result<()>;
    /// Add an existing account to a supplementary group
    fn add_to_group(&self, user: &str, group: &str) -> Result<()>;
    fn remove_user(&self, name: &str) -> Result<()>;
    fn remove_group(&self, name: &str) -> Result<()>;
}

/// Persistent network devices
pub trait Devices {
    fn device_exists(&self, name: &str) -> Result<bool>;
    fn add_device(&self, name: &str, kind: DeviceKind, user: &str, group: &str) -> Result<()>;
    fn remove_device(&self, name: &str) -> Result<()>;
}

/// Elevation policy checks
pub trait Policy {
    /// Fail unless `content` is a valid sudoers file
    fn check_sudoers(&self, content: &str) -> Result<()>;
}

/// Filesystem access
pub trait Files {
    fn stat(&self, path: &Path) -> Result<Option<FileMeta>>;
    fn read(&self, path: &Path) -> Result<String>;
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>>;

    /// Create a file that must not exist yet
    fn create(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<()>;
    /// Atomically replace a regular file
    fn replace(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>)
    -> Result<()>;
    /// Write into an existing non-regular entry such as a pipe
    fn write_in_place(&self, path: &Path, content: &str) -> Result<()>;
    fn append(&self, path: &Path, content: &str) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// Remove a file; a missing file is not an error
    fn remove(&self, path: &Path) -> Result<()>;

    /// Effective uid of this process
    fn euid(&self) -> u32;

    fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(self.stat(path)?.is_some_and(|m| m.is_dir()))
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.stat(path)?.is_some())
    }
}

/// Every capability the generators need
pub trait System: Accounts + Devices + Policy + Files {}

impl<T: Accounts + Devices + Policy + Files + ?Sized> System for T {}

/// `path` with `suffix` appended to its final component
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}
