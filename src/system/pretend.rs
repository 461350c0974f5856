//! Dry-run provider: reads pass through, mutations are only logged

use super::{AccountInfo, Accounts, Devices, FileMeta, Files, GroupInfo, Owner, Policy, System};
use crate::openvpn::DeviceKind;
use anyhow::Result;
use std::path::Path;

pub struct Pretend<'a> {
    inner: &'a dyn System,
}

impl<'a> Pretend<'a> {
    pub fn new(inner: &'a dyn System) -> Self {
        Self { inner }
    }
}

impl Accounts for Pretend<'_> {
    fn user(&self, name: &str) -> Result<Option<AccountInfo>> {
        self.inner.user(name)
    }

    fn group(&self, name: &str) -> Result<Option<GroupInfo>> {
        self.inner.group(name)
    }

    fn group_by_gid(&self, gid: u32) -> Result<Option<GroupInfo>> {
        self.inner.group_by_gid(gid)
    }

    fn add_group(&self, name: &str) -> Result<()> {
        log::info!("Would create group {}", name);
        Ok(())
    }

    fn add_user(&self, name: &str, group: &str, _shell: &Path) -> Result<()> {
        log::info!("Would create account {} in group {}", name, group);
        Ok(())
    }

    fn add_to_group(&self, user: &str, group: &str) -> Result<()> {
        log::info!("Would add {} to group {}", user, group);
        Ok(())
    }

    fn remove_user(&self, name: &str) -> Result<()> {
        log::info!("Would remove account {}", name);
        Ok(())
    }

    fn remove_group(&self, name: &str) -> Result<()> {
        log::info!("Would remove group {}", name);
        Ok(())
    }
}

impl Devices for Pretend<'_> {
    fn device_exists(&self, name: &str) -> Result<bool> {
        self.inner.device_exists(name)
    }

    fn add_device(&self, name: &str, kind: DeviceKind, user: &str, group: &str) -> Result<()> {
        log::info!("Would create {} device {} for {}:{}", kind, name, user, group);
        Ok(())
    }

    fn remove_device(&self, name: &str) -> Result<()> {
        log::info!("Would remove device {}", name);
        Ok(())
    }
}

impl Policy for Pretend<'_> {
    fn check_sudoers(&self, content: &str) -> Result<()> {
        self.inner.check_sudoers(content)
    }
}

impl Files for Pretend<'_> {
    fn stat(&self, path: &Path) -> Result<Option<FileMeta>> {
        self.inner.stat(path)
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.inner.read(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        self.inner.list_dir(dir)
    }

    fn create(&self, path: &Path, _content: &str, mode: u32, _owner: Option<&Owner>) -> Result<()> {
        log::info!("Would create {} (mode {:o})", path.display(), mode);
        Ok(())
    }

    fn replace(&self, path: &Path, _content: &str, mode: u32, _owner: Option<&Owner>) -> Result<()> {
        log::info!("Would replace {} (mode {:o})", path.display(), mode);
        Ok(())
    }

    fn write_in_place(&self, path: &Path, _content: &str) -> Result<()> {
        log::info!("Would write to {}", path.display());
        Ok(())
    }

    fn append(&self, path: &Path, _content: &str) -> Result<()> {
        log::info!("Would append to {}", path.display());
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        log::info!("Would copy {} to {}", from.display(), to.display());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        log::info!("Would move {} to {}", from.display(), to.display());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        log::info!("Would remove {}", path.display());
        Ok(())
    }

    fn euid(&self) -> u32 {
        self.inner.euid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::memory::MemorySystem;
    use std::path::PathBuf;

    #[test]
    fn test_mutations_are_noops_and_reads_pass_through() {
        let mem = MemorySystem::new();
        mem.add_dir("/etc");
        mem.add_file("/etc/vpn.conf", "client\n", 0o644);
        let before = mem.snapshot();

        let pretend = Pretend::new(&mem);
        pretend.add_group("vpn").unwrap();
        pretend
            .create(Path::new("/etc/new.conf"), "x", 0o640, None)
            .unwrap();
        pretend.remove(Path::new("/etc/vpn.conf")).unwrap();
        pretend
            .add_device("tun0-unrooted", DeviceKind::Tun, "vpn", "vpn")
            .unwrap();

        assert_eq!(mem.snapshot(), before);
        assert_eq!(
            pretend.read(&PathBuf::from("/etc/vpn.conf")).unwrap(),
            "client\n"
        );
        assert!(pretend.group("vpn").unwrap().is_none());
    }
}
