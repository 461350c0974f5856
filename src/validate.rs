//! Option validation
//!
//! Both passes run before anything is mutated. The first looks at the flags
//! alone, the second at what derivation could and could not resolve for the
//! generators that are about to run.

use crate::error::{MissingPrerequisite, UnrootError};
use crate::generators::{Generator, RunContext};
use crate::options::{ArtifactId, EffectiveOptions};

/// Check the flags for contradictions, emptiness and missing prerequisites
pub fn check_options(opts: &EffectiveOptions) -> Result<(), UnrootError> {
    let contradictions: Vec<&str> = ArtifactId::ALL
        .into_iter()
        .filter(|id| opts.intent(*id).is_contradictory())
        .map(ArtifactId::as_str)
        .collect();
    if !contradictions.is_empty() {
        return Err(UnrootError::Usage(format!(
            "requested and suppressed at the same time: {}",
            contradictions.join(", ")
        )));
    }

    if !opts.automagic && !opts.pretend && opts.requested().next().is_none() {
        return Err(UnrootError::Validation(
            "nothing to do: request artifacts, or pass --automagic or --pretend".to_string(),
        ));
    }

    if !opts.automagic {
        let missing = missing_prerequisites(opts);
        if !missing.is_empty() {
            return Err(UnrootError::MissingPrerequisites(missing));
        }
    }

    Ok(())
}

fn missing_prerequisites(opts: &EffectiveOptions) -> Vec<MissingPrerequisite> {
    opts.requested()
        .filter_map(|id| {
            let missing: Vec<ArtifactId> = id
                .prerequisites()
                .iter()
                .copied()
                .filter(|p| !opts.intent(*p).is_requested())
                .collect();
            (!missing.is_empty()).then_some((id, missing))
        })
        .collect()
}

/// Check that every scheduled generator has the values it needs
pub fn check_derived(plan: &[Generator], ctx: &RunContext<'_>) -> Result<(), UnrootError> {
    let d = ctx.derived;
    let mut problems = Vec::new();

    for generator in plan {
        let problem = match generator {
            Generator::Device | Generator::Netdev | Generator::Config
                if d.device_kind.is_none() =>
            {
                Some("cannot tell whether the device is tun or tap; pass --dev".to_string())
            }
            Generator::Netdev if d.netdev.is_none() => Some(format!(
                "no default location: {} is not a directory; pass --netdev",
                ctx.layout.networkd_dir.display()
            )),
            Generator::Up if d.old_up.is_none() => {
                Some(format!("{} has no up script", ctx.old.path().display()))
            }
            Generator::Down if d.old_down.is_none() => {
                Some(format!("{} has no down script", ctx.old.path().display()))
            }
            Generator::Iproute if d.iproute.is_none() => {
                Some("no location for the iproute wrapper; pass --iproute".to_string())
            }
            Generator::Unit if !ctx.sys.exists(&ctx.layout.unit_template)? => Some(format!(
                "unit template {} does not exist",
                ctx.layout.unit_template.display()
            )),
            _ => None,
        };
        if let Some(problem) = problem {
            problems.push(format!("{}: {problem}", generator.label()));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(UnrootError::Validation(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::tests::{CONFIG, Fixture, sample_host};
    use crate::system::memory::MemorySystem;

    #[test]
    fn test_contradiction_is_usage_error() {
        let opts = EffectiveOptions::new(CONFIG)
            .set(ArtifactId::User, "vpn")
            .suppress(ArtifactId::User);
        assert!(matches!(check_options(&opts), Err(UnrootError::Usage(_))));
    }

    #[test]
    fn test_nothing_to_do() {
        let opts = EffectiveOptions::new(CONFIG).suppress(ArtifactId::Unit);
        assert!(matches!(
            check_options(&opts),
            Err(UnrootError::Validation(_))
        ));

        let mut pretend = EffectiveOptions::new(CONFIG);
        pretend.pretend = true;
        assert!(check_options(&pretend).is_ok());
    }

    #[test]
    fn test_config_alone_names_its_prerequisites() {
        let opts = EffectiveOptions::new(CONFIG).generate(ArtifactId::Config);
        match check_options(&opts) {
            Err(UnrootError::MissingPrerequisites(missing)) => assert_eq!(
                missing,
                vec![(
                    ArtifactId::Config,
                    vec![
                        ArtifactId::User,
                        ArtifactId::Group,
                        ArtifactId::Dev,
                        ArtifactId::Iproute
                    ]
                )]
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_automagic_skips_prerequisite_check() {
        let mut opts = EffectiveOptions::new(CONFIG).generate(ArtifactId::Netdev);
        opts.automagic = true;
        assert!(check_options(&opts).is_ok());
    }

    #[test]
    fn test_complete_request_passes() {
        let opts = EffectiveOptions::new(CONFIG)
            .generate(ArtifactId::User)
            .generate(ArtifactId::Group)
            .set(ArtifactId::Dev, "tun3")
            .generate(ArtifactId::Iproute)
            .generate(ArtifactId::Config);
        assert!(check_options(&opts).is_ok());
    }

    #[test]
    fn test_derived_gaps_are_reported() {
        let mem = MemorySystem::new();
        mem.add_file(CONFIG, "client\n", 0o600);
        let fx = Fixture::new(&mem, EffectiveOptions::new(CONFIG));

        let err = check_derived(
            &[Generator::Device, Generator::Up, Generator::Netdev, Generator::Unit],
            &fx.ctx(&mem),
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("device: cannot tell"));
        assert!(message.contains("up wrapper: "));
        assert!(message.contains("netdev: cannot tell"));
        assert!(message.contains("unit: unit template"));
        assert_eq!(err.exit_code(), crate::error::EX_CONFIG);
    }

    #[test]
    fn test_sample_plan_is_complete() {
        let mem = sample_host();
        let fx = Fixture::new(&mem, EffectiveOptions::new(CONFIG));
        let plan = [
            Generator::Group,
            Generator::Account,
            Generator::Sudoers,
            Generator::Iproute,
            Generator::Up,
            Generator::Down,
            Generator::Device,
            Generator::Config,
        ];
        assert!(check_derived(&plan, &fx.ctx(&mem)).is_ok());
    }
}
