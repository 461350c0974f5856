//! Generator registry
//!
//! Each generator produces at most one artifact, is idempotent, and reports
//! what it did as an [`Outcome`]. They always run in [`Generator::ORDER`].

mod account;
pub mod config;
mod device;
mod netdev;
pub mod sudoers;
pub mod unit;
pub mod wrapper;
pub mod write;

use crate::derive::Derived;
use crate::layout::HostLayout;
use crate::openvpn::OldConfig;
use crate::options::{ArtifactId, EffectiveOptions, Request};
use crate::system::System;
use anyhow::Result;
use transact::{ArtifactKind, Outcome, Step};

/// Everything a generator reads
pub struct RunContext<'a> {
    pub options: &'a EffectiveOptions,
    pub layout: &'a HostLayout,
    pub derived: &'a Derived,
    pub old: &'a OldConfig,
    pub sys: &'a dyn System,
}

impl RunContext<'_> {
    pub fn backups(&self) -> bool {
        self.options.backups
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    Group,
    Account,
    Sudoers,
    Iproute,
    Up,
    Down,
    Device,
    Netdev,
    Config,
    Unit,
}

impl Generator {
    /// Dependency order: identities first, then what is owned by them
    pub const ORDER: [Self; 10] = [
        Self::Group,
        Self::Account,
        Self::Sudoers,
        Self::Iproute,
        Self::Up,
        Self::Down,
        Self::Device,
        Self::Netdev,
        Self::Config,
        Self::Unit,
    ];

    /// CLI key that requests or suppresses this generator
    pub fn id(self) -> ArtifactId {
        match self {
            Self::Group => ArtifactId::Group,
            Self::Account => ArtifactId::User,
            Self::Sudoers => ArtifactId::Sudoers,
            Self::Iproute => ArtifactId::Iproute,
            Self::Up => ArtifactId::Up,
            Self::Down => ArtifactId::Down,
            Self::Device => ArtifactId::Dev,
            Self::Netdev => ArtifactId::Netdev,
            Self::Config => ArtifactId::Config,
            Self::Unit => ArtifactId::Unit,
        }
    }

    pub fn artifact_kind(self) -> ArtifactKind {
        match self {
            Self::Group => ArtifactKind::Group,
            Self::Account => ArtifactKind::Account,
            Self::Device => ArtifactKind::Device,
            _ => ArtifactKind::File,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Account => "account",
            Self::Sudoers => "sudoers",
            Self::Iproute => "iproute wrapper",
            Self::Up => "up wrapper",
            Self::Down => "down wrapper",
            Self::Device => "device",
            Self::Netdev => "netdev",
            Self::Config => "config",
            Self::Unit => "unit",
        }
    }

    /// Whether automagic mode would run this generator
    pub fn eligible(self, ctx: &RunContext<'_>) -> Result<bool> {
        let d = ctx.derived;
        Ok(match self {
            Self::Group | Self::Account | Self::Config | Self::Sudoers => true,
            Self::Device => d.device.is_some(),
            Self::Iproute => d.iproute.is_some(),
            Self::Up => d.old_up.is_some() && d.up.is_some(),
            Self::Down => d.old_down.is_some() && d.down.is_some() && d.down != d.up,
            Self::Netdev => d.netdev.is_some(),
            Self::Unit => ctx.sys.exists(&ctx.layout.unit_template)?,
        })
    }
}

impl Step<RunContext<'_>> for Generator {
    fn name(&self) -> &'static str {
        self.label()
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<Outcome> {
        match self {
            Self::Group => account::ensure_group(ctx),
            Self::Account => account::ensure_account(ctx),
            Self::Sudoers => sudoers::generate(ctx),
            Self::Iproute => wrapper::generate_iproute(ctx),
            Self::Up => wrapper::generate_up(ctx),
            Self::Down => wrapper::generate_down(ctx),
            Self::Device => device::generate(ctx),
            Self::Netdev => netdev::generate(ctx),
            Self::Config => config::generate(ctx),
            Self::Unit => unit::generate(ctx),
        }
    }
}

/// Generators to run, in order
///
/// Suppression always wins. Otherwise a generator runs when its artifact
/// was requested, or in automagic mode when it is eligible.
pub fn schedule(ctx: &RunContext<'_>) -> Result<Vec<Generator>> {
    let mut plan = Vec::new();
    for generator in Generator::ORDER {
        let include = match ctx.options.request(generator.id()) {
            Request::Suppressed => false,
            Request::Requested => true,
            Request::Default => ctx.options.automagic && generator.eligible(ctx)?,
        };
        if include {
            plan.push(generator);
        } else {
            log::debug!("Not scheduling {}", generator.label());
        }
    }
    Ok(plan)
}
