//! `natsync sweep`: prune old backups without running a sync cycle.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use natsync_core::config::retention_from_days;

use super::load_settings;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Retention in days. Defaults to `nats.backup_retention_days`.
    #[arg(long)]
    pub days: Option<u64>,
}

impl SweepArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = load_settings(config)?;
        let dir = &settings.nats.config_backup_dir;
        let max_age = match self.days {
            Some(days) => retention_from_days(days)
                .with_context(|| format!("--days {days} is too large"))?,
            None => settings.backup_retention(),
        };

        let report = natsync_sync::sweep(dir, max_age)
            .with_context(|| format!("failed to sweep {}", dir.display()))?;

        println!(
            "Removed {} backup(s), kept {} in {}.",
            report.removed,
            report.kept,
            dir.display()
        );
        if report.failed > 0 {
            println!(
                "{}",
                format!("{} backup(s) could not be removed.", report.failed).yellow()
            );
        }
        Ok(())
    }
}
