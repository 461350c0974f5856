//! Console progress for the generator run

use crate::ui;
use colored::Colorize;
use transact::{ExecuteSummary, Outcome, ProgressCallback};

/// Prints one line per generator as it finishes
pub struct ConsoleProgress {
    pretend: bool,
}

impl ConsoleProgress {
    pub fn new(pretend: bool) -> Self {
        Self { pretend }
    }

    fn verb(&self) -> &'static str {
        if self.pretend { "would create" } else { "created" }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_step_start(&mut self, name: &str) {
        log::debug!("Running {}", name);
    }

    fn on_step_complete(&mut self, name: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Created(artifact) if artifact.preexisting => {
                let verb = if self.pretend { "would replace" } else { "replaced" };
                ui::success(&format!("{name}: {verb} {}", artifact.identity));
            }
            Outcome::Created(artifact) => {
                ui::success(&format!("{name}: {} {}", self.verb(), artifact.identity));
            }
            Outcome::Touched(what) => ui::success(&format!("{name}: {what}")),
            Outcome::Satisfied => ui::unchanged(&format!("{name}: already in place")),
            Outcome::Skipped { reason } => ui::unchanged(&format!("{name}: skipped ({reason})")),
        }
    }

    fn on_step_failed(&mut self, name: &str, error: &anyhow::Error) {
        ui::error(&format!("{name}: {error:#}"));
    }
}

pub fn print_summary(summary: &ExecuteSummary, pretend: bool) {
    println!();
    if pretend {
        println!("  {} Dry run, nothing was changed", "ℹ".blue().bold());
    } else if summary.total_changes() == 0 {
        println!("  {} Everything was already in place", "✓".green().bold());
    } else {
        println!("  {} Unrooted setup applied", "✓".green().bold());
    }

    if summary.created > 0 {
        println!("    • {} artifacts created", summary.created);
    }
    if summary.touched > 0 {
        println!("    • {} existing entities modified", summary.touched);
    }
    if summary.satisfied > 0 {
        println!("    • {} already satisfied", summary.satisfied);
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", summary.skipped);
    }
}
