//! In-memory host used by tests
//!
//! Simulates a filesystem with ownership and modes, the user database and
//! network devices, with fault injection for writes and device creation.

use super::{
    AccountInfo, Accounts, Devices, EntryKind, FileMeta, Files, GroupInfo, Owner, Policy,
};
use crate::openvpn::DeviceKind;
use crate::runner::CommandError;
use anyhow::{Context, Result, bail};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: EntryKind,
    pub content: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

/// Everything the simulation can mutate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub nodes: BTreeMap<PathBuf, Node>,
    pub users: BTreeMap<String, AccountInfo>,
    pub groups: BTreeMap<String, GroupInfo>,
    pub devices: BTreeSet<String>,
}

pub struct MemorySystem {
    state: RefCell<MemoryState>,
    next_id: Cell<u32>,
    device_probes: Cell<usize>,
    failing_writes: RefCell<BTreeSet<PathBuf>>,
    fail_device_add: Cell<bool>,
    reject_sudoers: Cell<bool>,
    sudoers_checks: RefCell<Vec<String>>,
}

fn command_failure(command: &str, code: i32, stderr: &str) -> anyhow::Error {
    CommandError {
        command: command.to_string(),
        code: Some(code),
        stderr: stderr.to_string(),
    }
    .into()
}

impl MemorySystem {
    /// An empty host with `/` and the root account
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.nodes.insert(
            PathBuf::from("/"),
            Node {
                kind: EntryKind::Directory,
                content: String::new(),
                mode: 0o755,
                uid: 0,
                gid: 0,
            },
        );
        state.users.insert(
            "root".into(),
            AccountInfo {
                name: "root".into(),
                uid: 0,
                gid: 0,
                groups: vec![0],
            },
        );
        state.groups.insert(
            "root".into(),
            GroupInfo {
                name: "root".into(),
                gid: 0,
            },
        );
        Self {
            state: RefCell::new(state),
            next_id: Cell::new(900),
            device_probes: Cell::new(0),
            failing_writes: RefCell::new(BTreeSet::new()),
            fail_device_add: Cell::new(false),
            reject_sudoers: Cell::new(false),
            sudoers_checks: RefCell::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.borrow().clone()
    }

    /// Create a root-owned directory and any missing ancestors
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.state
            .borrow_mut()
            .nodes
            .entry(path.to_path_buf())
            .or_insert(Node {
                kind: EntryKind::Directory,
                content: String::new(),
                mode: 0o755,
                uid: 0,
                gid: 0,
            });
    }

    /// Create a root-owned regular file, with its directory
    pub fn add_file(&self, path: impl AsRef<Path>, content: &str, mode: u32) {
        self.add_node(path, EntryKind::Regular, content, mode, 0, 0);
    }

    pub fn add_node(
        &self,
        path: impl AsRef<Path>,
        kind: EntryKind,
        content: &str,
        mode: u32,
        uid: u32,
        gid: u32,
    ) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.state.borrow_mut().nodes.insert(
            path.to_path_buf(),
            Node {
                kind,
                content: content.to_string(),
                mode,
                uid,
                gid,
            },
        );
    }

    pub fn add_existing_device(&self, name: &str) {
        self.state.borrow_mut().devices.insert(name.to_string());
    }

    pub fn node(&self, path: impl AsRef<Path>) -> Option<Node> {
        self.state.borrow().nodes.get(path.as_ref()).cloned()
    }

    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.node(path).map(|n| n.content)
    }

    /// Make every later write to `path` fail
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        self.failing_writes
            .borrow_mut()
            .insert(path.as_ref().to_path_buf());
    }

    pub fn fail_device_creation(&self) {
        self.fail_device_add.set(true);
    }

    pub fn reject_sudoers(&self) {
        self.reject_sudoers.set(true);
    }

    /// Number of `device_exists` lookups so far
    pub fn device_probes(&self) -> usize {
        self.device_probes.get()
    }

    /// Every candidate passed to `check_sudoers`
    pub fn sudoers_checks(&self) -> Vec<String> {
        self.sudoers_checks.borrow().clone()
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.failing_writes.borrow().contains(path) {
            bail!("simulated write failure for {}", path.display());
        }
        let parent = path
            .parent()
            .with_context(|| format!("{} has no parent", path.display()))?;
        match self.state.borrow().nodes.get(parent) {
            Some(node) if node.kind == EntryKind::Directory => Ok(()),
            _ => bail!("{}: no such directory", parent.display()),
        }
    }

    fn resolve_owner(&self, owner: Option<&Owner>) -> Result<(u32, u32)> {
        let Some(owner) = owner else {
            return Ok((0, 0));
        };
        let state = self.state.borrow();
        let uid = state
            .users
            .get(&owner.user)
            .with_context(|| format!("User `{}` does not exist", owner.user))?
            .uid;
        let gid = state
            .groups
            .get(&owner.group)
            .with_context(|| format!("Group `{}` does not exist", owner.group))?
            .gid;
        Ok((uid, gid))
    }

    fn put(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<()> {
        let (uid, gid) = self.resolve_owner(owner)?;
        self.state.borrow_mut().nodes.insert(
            path.to_path_buf(),
            Node {
                kind: EntryKind::Regular,
                content: content.to_string(),
                mode,
                uid,
                gid,
            },
        );
        Ok(())
    }
}

impl Accounts for MemorySystem {
    fn user(&self, name: &str) -> Result<Option<AccountInfo>> {
        Ok(self.state.borrow().users.get(name).cloned())
    }

    fn group(&self, name: &str) -> Result<Option<GroupInfo>> {
        Ok(self.state.borrow().groups.get(name).cloned())
    }

    fn group_by_gid(&self, gid: u32) -> Result<Option<GroupInfo>> {
        Ok(self
            .state
            .borrow()
            .groups
            .values()
            .find(|g| g.gid == gid)
            .cloned())
    }

    fn add_group(&self, name: &str) -> Result<()> {
        if self.state.borrow().groups.contains_key(name) {
            return Err(command_failure("groupadd", 9, "group already exists"));
        }
        let gid = self.next_id();
        self.state.borrow_mut().groups.insert(
            name.to_string(),
            GroupInfo {
                name: name.to_string(),
                gid,
            },
        );
        Ok(())
    }

    fn add_user(&self, name: &str, group: &str, _shell: &Path) -> Result<()> {
        let gid = match self.state.borrow().groups.get(group) {
            Some(g) => g.gid,
            None => return Err(command_failure("useradd", 6, "group does not exist")),
        };
        if self.state.borrow().users.contains_key(name) {
            return Err(command_failure("useradd", 9, "user already exists"));
        }
        let uid = self.next_id();
        self.state.borrow_mut().users.insert(
            name.to_string(),
            AccountInfo {
                name: name.to_string(),
                uid,
                gid,
                groups: vec![gid],
            },
        );
        Ok(())
    }

    fn add_to_group(&self, user: &str, group: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let gid = match state.groups.get(group) {
            Some(g) => g.gid,
            None => return Err(command_failure("usermod", 6, "group does not exist")),
        };
        match state.users.get_mut(user) {
            Some(account) => {
                account.groups.push(gid);
                Ok(())
            }
            None => Err(command_failure("usermod", 6, "user does not exist")),
        }
    }

    fn remove_user(&self, name: &str) -> Result<()> {
        match self.state.borrow_mut().users.remove(name) {
            Some(_) => Ok(()),
            None => Err(command_failure("userdel", 6, "user does not exist")),
        }
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let Some(group) = state.groups.get(name) else {
            return Err(command_failure("groupdel", 6, "group does not exist"));
        };
        if state.users.values().any(|u| u.gid == group.gid) {
            return Err(command_failure(
                "groupdel",
                8,
                "cannot remove the primary group of a user",
            ));
        }
        state.groups.remove(name);
        Ok(())
    }
}

impl Devices for MemorySystem {
    fn device_exists(&self, name: &str) -> Result<bool> {
        self.device_probes.set(self.device_probes.get() + 1);
        Ok(self.state.borrow().devices.contains(name))
    }

    fn add_device(&self, name: &str, _kind: DeviceKind, user: &str, group: &str) -> Result<()> {
        if self.fail_device_add.get() {
            return Err(command_failure("ip tuntap add", 2, "Operation not permitted"));
        }
        self.resolve_owner(Some(&Owner::new(user, group)))?;
        if !self.state.borrow_mut().devices.insert(name.to_string()) {
            return Err(command_failure("ip tuntap add", 1, "Device or resource busy"));
        }
        Ok(())
    }

    fn remove_device(&self, name: &str) -> Result<()> {
        if !self.state.borrow_mut().devices.remove(name) {
            return Err(command_failure("ip link delete", 1, "Cannot find device"));
        }
        Ok(())
    }
}

impl Policy for MemorySystem {
    fn check_sudoers(&self, content: &str) -> Result<()> {
        self.sudoers_checks.borrow_mut().push(content.to_string());
        if self.reject_sudoers.get() {
            return Err(command_failure("visudo", 1, "syntax error"))
                .context("sudoers validation failed");
        }
        Ok(())
    }
}

impl Files for MemorySystem {
    fn stat(&self, path: &Path) -> Result<Option<FileMeta>> {
        Ok(self.state.borrow().nodes.get(path).map(|n| FileMeta {
            kind: n.kind,
            mode: n.mode,
            uid: n.uid,
            gid: n.gid,
        }))
    }

    fn read(&self, path: &Path) -> Result<String> {
        match self.state.borrow().nodes.get(path) {
            Some(node) if node.kind != EntryKind::Directory => Ok(node.content.clone()),
            Some(_) => bail!("{} is a directory", path.display()),
            None => bail!("{}: no such file", path.display()),
        }
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        if !self.is_dir(dir)? {
            bail!("{}: no such directory", dir.display());
        }
        Ok(self
            .state
            .borrow()
            .nodes
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    fn create(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<()> {
        self.check_writable(path)?;
        if self.state.borrow().nodes.contains_key(path) {
            bail!("{} already exists", path.display());
        }
        self.put(path, content, mode, owner)
    }

    fn replace(&self, path: &Path, content: &str, mode: u32, owner: Option<&Owner>) -> Result<()> {
        self.check_writable(path)?;
        self.put(path, content, mode, owner)
    }

    fn write_in_place(&self, path: &Path, content: &str) -> Result<()> {
        self.check_writable(path)?;
        match self.state.borrow_mut().nodes.get_mut(path) {
            Some(node) => {
                node.content.push_str(content);
                Ok(())
            }
            None => bail!("{}: no such file", path.display()),
        }
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        self.check_writable(path)?;
        match self.state.borrow_mut().nodes.get_mut(path) {
            Some(node) if node.kind == EntryKind::Regular => {
                node.content.push_str(content);
                Ok(())
            }
            _ => bail!("{}: no such file", path.display()),
        }
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        self.check_writable(to)?;
        let mut state = self.state.borrow_mut();
        let Some(source) = state.nodes.get(from).cloned() else {
            bail!("{}: no such file", from.display());
        };
        let euid = self.euid();
        state.nodes.insert(
            to.to_path_buf(),
            Node {
                uid: euid,
                gid: euid,
                ..source
            },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let Some(node) = state.nodes.remove(from) else {
            bail!("{}: no such file", from.display());
        };
        state.nodes.insert(to.to_path_buf(), node);
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.state.borrow_mut().nodes.remove(path);
        Ok(())
    }

    fn euid(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_parent_directory() {
        let mem = MemorySystem::new();
        assert!(
            mem.create(Path::new("/etc/x"), "x", 0o644, None)
                .is_err()
        );
        mem.add_dir("/etc");
        mem.create(Path::new("/etc/x"), "x", 0o644, None).unwrap();
        assert_eq!(mem.content("/etc/x").as_deref(), Some("x"));
    }

    #[test]
    fn test_group_in_use_cannot_be_removed() {
        let mem = MemorySystem::new();
        mem.add_group("vpn").unwrap();
        mem.add_user("vpn", "vpn", Path::new("/usr/sbin/nologin"))
            .unwrap();
        assert!(mem.remove_group("vpn").is_err());
        mem.remove_user("vpn").unwrap();
        mem.remove_group("vpn").unwrap();
    }

    #[test]
    fn test_list_dir() {
        let mem = MemorySystem::new();
        mem.add_file("/etc/sudoers.d/a", "", 0o440);
        mem.add_file("/etc/sudoers.d/b", "", 0o440);
        mem.add_file("/etc/sudoers", "", 0o440);
        let mut names = mem.list_dir(Path::new("/etc/sudoers.d")).unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
