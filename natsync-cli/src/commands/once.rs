//! `natsync once`: one reconciliation cycle, then exit.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use natsync_daemon::{CycleReport, ReloadOutcome};

use super::{bootstrap, connect};

#[derive(Args, Debug)]
pub struct OnceArgs {}

impl OnceArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = bootstrap(config)?;
        let client = connect(&settings)?;

        let report = natsync_daemon::run_once_blocking(&settings, Box::new(client))
            .context("sync cycle failed")?;
        println!("{}", summary_line(&report, &settings.nats.config_file));
        Ok(())
    }
}

fn summary_line(report: &CycleReport, artifact: &Path) -> String {
    let counts = format!(
        "{} roles, {} users, {} excluded",
        report.role_count, report.user_count, report.excluded
    );
    let status = if report.published {
        format!("published {}", artifact.display()).green().to_string()
    } else {
        "unchanged".bright_black().to_string()
    };
    let reload = match &report.reload {
        Some(ReloadOutcome::Executed { .. }) => "; reload executed",
        Some(ReloadOutcome::Debounced) => "; reload debounced",
        None => "",
    };
    format!("{status} ({counts}){reload}")
}
