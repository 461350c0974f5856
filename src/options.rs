//! Resolved per-run intents
//!
//! Every artifact can be overridden with an explicit value, requested at its
//! computed default, or suppressed. The CLI layer fills in an [`Intent`] per
//! artifact; everything downstream reads the frozen [`EffectiveOptions`].

use clap::ValueEnum;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Artifacts a run can produce, named the way the CLI names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum ArtifactId {
    User,
    Group,
    Dev,
    Config,
    Iproute,
    Up,
    Down,
    Sudoers,
    Netdev,
    Unit,
}

impl ArtifactId {
    pub const ALL: [Self; 10] = [
        Self::User,
        Self::Group,
        Self::Dev,
        Self::Config,
        Self::Iproute,
        Self::Up,
        Self::Down,
        Self::Sudoers,
        Self::Netdev,
        Self::Unit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Dev => "dev",
            Self::Config => "config",
            Self::Iproute => "iproute",
            Self::Up => "up",
            Self::Down => "down",
            Self::Sudoers => "sudoers",
            Self::Netdev => "netdev",
            Self::Unit => "unit",
        }
    }

    /// Artifacts that must also be produced for this one to make sense
    pub fn prerequisites(self) -> &'static [Self] {
        match self {
            Self::Config => &[Self::User, Self::Group, Self::Dev, Self::Iproute],
            Self::Netdev => &[Self::Dev, Self::User, Self::Group],
            Self::Sudoers => &[Self::User],
            Self::Dev | Self::Iproute | Self::Up | Self::Down | Self::Unit => {
                &[Self::User, Self::Group]
            }
            Self::User | Self::Group => &[],
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user asked for an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Not mentioned; automagic decides
    Default,
    /// Overridden or `--gen-*`
    Requested,
    /// `--no-*` or listed in `--skip`
    Suppressed,
}

/// Raw CLI intent for one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intent {
    pub value: Option<String>,
    pub generate: bool,
    pub suppress: bool,
}

impl Intent {
    /// Override value, ignoring blanks
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn is_requested(&self) -> bool {
        self.generate || self.value().is_some()
    }

    /// Requested and suppressed at the same time
    pub fn is_contradictory(&self) -> bool {
        self.is_requested() && self.suppress
    }
}

/// Everything the user asked for, frozen after parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOptions {
    pub source: PathBuf,
    pub automagic: bool,
    pub pretend: bool,
    pub verbose: u8,
    pub backups: bool,
    intents: BTreeMap<ArtifactId, Intent>,
}

impl EffectiveOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            automagic: false,
            pretend: false,
            verbose: 0,
            backups: true,
            intents: BTreeMap::new(),
        }
    }

    pub fn with_intent(mut self, id: ArtifactId, intent: Intent) -> Self {
        self.intents.insert(id, intent);
        self
    }

    /// Request an artifact at its default
    pub fn generate(self, id: ArtifactId) -> Self {
        let intent = Intent {
            generate: true,
            ..self.intent(id).clone()
        };
        self.with_intent(id, intent)
    }

    /// Request an artifact with an explicit value
    pub fn set(self, id: ArtifactId, value: impl Into<String>) -> Self {
        let intent = Intent {
            value: Some(value.into()),
            ..self.intent(id).clone()
        };
        self.with_intent(id, intent)
    }

    pub fn suppress(self, id: ArtifactId) -> Self {
        let intent = Intent {
            suppress: true,
            ..self.intent(id).clone()
        };
        self.with_intent(id, intent)
    }

    pub fn intent(&self, id: ArtifactId) -> &Intent {
        static NONE: Intent = Intent {
            value: None,
            generate: false,
            suppress: false,
        };
        self.intents.get(&id).unwrap_or(&NONE)
    }

    /// Suppression wins over any request
    pub fn request(&self, id: ArtifactId) -> Request {
        let intent = self.intent(id);
        if intent.suppress {
            Request::Suppressed
        } else if intent.is_requested() {
            Request::Requested
        } else {
            Request::Default
        }
    }

    /// Explicit override value, if one was given
    pub fn value(&self, id: ArtifactId) -> Option<&str> {
        self.intent(id).value()
    }

    /// Artifacts explicitly asked for, in CLI order
    pub fn requested(&self) -> impl Iterator<Item = ArtifactId> + '_ {
        ArtifactId::ALL
            .into_iter()
            .filter(|id| self.intent(*id).is_requested())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppression_wins() {
        let opts = EffectiveOptions::new("vpn.conf")
            .generate(ArtifactId::Unit)
            .suppress(ArtifactId::Unit);
        assert_eq!(opts.request(ArtifactId::Unit), Request::Suppressed);
        assert!(opts.intent(ArtifactId::Unit).is_contradictory());
    }

    #[test]
    fn test_blank_override_is_not_a_request() {
        let opts = EffectiveOptions::new("vpn.conf").set(ArtifactId::User, "  ");
        assert_eq!(opts.value(ArtifactId::User), None);
        assert_eq!(opts.request(ArtifactId::User), Request::Default);
    }

    #[test]
    fn test_requested_order() {
        let opts = EffectiveOptions::new("vpn.conf")
            .generate(ArtifactId::Unit)
            .set(ArtifactId::User, "vpn");
        let ids: Vec<_> = opts.requested().collect();
        assert_eq!(ids, vec![ArtifactId::User, ArtifactId::Unit]);
    }

    #[test]
    fn test_prerequisites() {
        assert_eq!(
            ArtifactId::Config.prerequisites(),
            &[
                ArtifactId::User,
                ArtifactId::Group,
                ArtifactId::Dev,
                ArtifactId::Iproute
            ]
        );
        assert!(ArtifactId::Group.prerequisites().is_empty());
    }
}
