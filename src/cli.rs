use crate::options::{ArtifactId, EffectiveOptions, Intent};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "openvpn-unroot")]
#[command(version)]
#[command(about = "Convert a root OpenVPN client config into an unprivileged setup", long_about = None)]
pub struct Cli {
    /// OpenVPN client config to convert
    #[arg(value_name = "CONFIG")]
    pub source: PathBuf,

    /// Generate every artifact that applies to this host
    #[arg(short, long)]
    pub automagic: bool,

    /// Show what would be done without changing anything
    #[arg(short, long)]
    pub pretend: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not keep numbered backups of replaced files
    #[arg(short = 'B', long)]
    pub no_backup: bool,

    /// Suppress artifacts (comma separated)
    #[arg(short = 'x', long, value_enum, value_delimiter = ',', value_name = "ARTIFACT")]
    pub skip: Vec<ArtifactId>,

    /// Host layout file (TOML); defaults to $OPENVPN_UNROOT_LAYOUT
    #[arg(long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    // ------------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------------
    /// Account the daemon runs as
    #[arg(short, long, value_name = "NAME", help_heading = "Account")]
    pub user: Option<String>,
    /// Create the account with its default name
    #[arg(long, help_heading = "Account")]
    pub gen_user: bool,
    #[arg(long, help_heading = "Account")]
    pub no_user: bool,

    /// Group the daemon runs as
    #[arg(short, long, value_name = "NAME", help_heading = "Account")]
    pub group: Option<String>,
    /// Create the group with its default name
    #[arg(long, help_heading = "Account")]
    pub gen_group: bool,
    #[arg(long, help_heading = "Account")]
    pub no_group: bool,

    // ------------------------------------------------------------------------
    // Device
    // ------------------------------------------------------------------------
    /// Persistent device name (must start with tun or tap)
    #[arg(short, long, value_name = "NAME", help_heading = "Device")]
    pub dev: Option<String>,
    /// Create the first free tun/tap device
    #[arg(long, help_heading = "Device")]
    pub gen_dev: bool,
    #[arg(long, help_heading = "Device")]
    pub no_dev: bool,

    /// systemd-networkd .netdev file for the device
    #[arg(short, long, value_name = "PATH", help_heading = "Device")]
    pub netdev: Option<String>,
    #[arg(long, help_heading = "Device")]
    pub gen_netdev: bool,
    #[arg(long, help_heading = "Device")]
    pub no_netdev: bool,

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------
    /// Rewritten OpenVPN config
    #[arg(short, long, value_name = "PATH", help_heading = "Files")]
    pub config: Option<String>,
    #[arg(long, help_heading = "Files")]
    pub gen_config: bool,
    #[arg(long, help_heading = "Files")]
    pub no_config: bool,

    /// Wrapper elevating the ip command
    #[arg(short, long, value_name = "PATH", help_heading = "Files")]
    pub iproute: Option<String>,
    #[arg(long, help_heading = "Files")]
    pub gen_iproute: bool,
    #[arg(long, help_heading = "Files")]
    pub no_iproute: bool,

    /// Wrapper elevating the up script
    #[arg(short = 'U', long, value_name = "PATH", help_heading = "Files")]
    pub up: Option<String>,
    #[arg(long, help_heading = "Files")]
    pub gen_up: bool,
    #[arg(long, help_heading = "Files")]
    pub no_up: bool,

    /// Wrapper elevating the down script
    #[arg(short = 'D', long, value_name = "PATH", help_heading = "Files")]
    pub down: Option<String>,
    #[arg(long, help_heading = "Files")]
    pub gen_down: bool,
    #[arg(long, help_heading = "Files")]
    pub no_down: bool,

    /// Sudoers file or drop-in granting the wrappers
    #[arg(short, long, value_name = "PATH", help_heading = "Files")]
    pub sudoers: Option<String>,
    #[arg(long, help_heading = "Files")]
    pub gen_sudoers: bool,
    #[arg(long, help_heading = "Files")]
    pub no_sudoers: bool,

    /// systemd unit for the unprivileged instance
    #[arg(short = 't', long, value_name = "PATH", help_heading = "Files")]
    pub unit: Option<String>,
    #[arg(long, help_heading = "Files")]
    pub gen_unit: bool,
    #[arg(long, help_heading = "Files")]
    pub no_unit: bool,
}

impl Cli {
    /// (override, --gen-*, --no-*) for one artifact
    fn flags(&self, id: ArtifactId) -> (Option<&String>, bool, bool) {
        match id {
            ArtifactId::User => (self.user.as_ref(), self.gen_user, self.no_user),
            ArtifactId::Group => (self.group.as_ref(), self.gen_group, self.no_group),
            ArtifactId::Dev => (self.dev.as_ref(), self.gen_dev, self.no_dev),
            ArtifactId::Config => (self.config.as_ref(), self.gen_config, self.no_config),
            ArtifactId::Iproute => (self.iproute.as_ref(), self.gen_iproute, self.no_iproute),
            ArtifactId::Up => (self.up.as_ref(), self.gen_up, self.no_up),
            ArtifactId::Down => (self.down.as_ref(), self.gen_down, self.no_down),
            ArtifactId::Sudoers => (self.sudoers.as_ref(), self.gen_sudoers, self.no_sudoers),
            ArtifactId::Netdev => (self.netdev.as_ref(), self.gen_netdev, self.no_netdev),
            ArtifactId::Unit => (self.unit.as_ref(), self.gen_unit, self.no_unit),
        }
    }

    pub fn options(&self) -> EffectiveOptions {
        let mut opts = EffectiveOptions::new(&self.source);
        opts.automagic = self.automagic;
        opts.pretend = self.pretend;
        opts.verbose = self.verbose;
        opts.backups = !self.no_backup;

        for id in ArtifactId::ALL {
            let (value, generate, suppress) = self.flags(id);
            opts = opts.with_intent(
                id,
                Intent {
                    value: value.cloned(),
                    generate,
                    suppress: suppress || self.skip.contains(&id),
                },
            );
        }
        opts
    }
}
