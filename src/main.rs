mod access;
mod cli;
mod derive;
mod engine;
mod error;
mod generators;
mod layout;
mod openvpn;
mod options;
mod progress;
mod rewrite;
mod runner;
mod system;
mod ui;
mod validate;

use clap::Parser;
use clap::error::ErrorKind;
use cli::Cli;
use error::{EX_USAGE, UnrootError};
use layout::HostLayout;
use progress::ConsoleProgress;
use system::Files;
use system::host::Host;
use transact::InterruptFlag;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EX_USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<(), UnrootError> {
    let layout = HostLayout::load(cli.layout.as_deref())
        .map_err(|err| UnrootError::Validation(format!("{err:#}")))?;
    let opts = cli.options();
    let interrupt = InterruptFlag::install()?;
    let host = Host::new(&layout);

    if !opts.pretend && host.euid() != 0 {
        log::warn!("Not running as root; creating accounts and devices will likely fail");
    }

    ui::header(&format!("Unrooting {}", opts.source.display()));
    let mut progress = ConsoleProgress::new(opts.pretend);
    let outcome = engine::run(&opts, &layout, &host, Some(interrupt.clone()), &mut progress);
    interrupt.release();
    let report = outcome?;
    if let Some(signal) = interrupt.pending() {
        ui::warn(&format!(
            "{} arrived after the changes were committed",
            transact::signal_name(signal)
        ));
        std::process::exit(128 + signal);
    }

    if opts.pretend || opts.verbose > 0 {
        ui::section("Derived values");
        for (key, value) in report.derived.rows() {
            ui::kv(key, &value);
        }
    }

    if opts.pretend && opts.verbose > 0 {
        ui::section(&format!(
            "{} -> {}",
            report.old.path().display(),
            report.derived.config.display()
        ));
        ui::diff(report.old.text(), &report.config_preview);
    }

    if report.plan.is_empty() {
        ui::info("Nothing was scheduled");
    }
    progress::print_summary(&report.summary, opts.pretend);

    if !report.findings.is_empty() {
        ui::section("Access problems");
        for finding in &report.findings {
            ui::warn(&finding.to_string());
        }
        ui::dim("The daemon will not be able to open these files as the new account");
    }

    Ok(())
}

fn report_error(err: &UnrootError) {
    ui::error(&err.to_string());

    let Some(rollback) = err.rollback() else {
        return;
    };
    if rollback.is_empty() {
        return;
    }
    if rollback.is_clean() {
        ui::info(&format!("Rolled back: {rollback}"));
    } else {
        for (artifact, reason) in &rollback.failures {
            ui::warn(&format!("Could not roll back {artifact}: {reason}"));
        }
    }
}
