//! `natsync diff`: show what the next cycle would publish.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use natsync_sync::Pipeline;

use super::{connect, load_settings};

#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = load_settings(config)?;
        let client = connect(&settings)?;

        let pipeline = Pipeline::from_settings(Box::new(client), &settings)
            .context("failed to prepare sync pipeline")?;
        let diff = pipeline.diff().context("failed to render candidate config")?;

        if diff.is_empty() {
            println!("No differences for '{}'.", diff.path.display());
            return Ok(());
        }

        for line in diff.unified_diff.lines() {
            println!("{}", colorize(line));
        }
        Ok(())
    }
}

fn colorize(line: &str) -> String {
    if line.starts_with("+++") || line.starts_with("---") {
        line.bold().to_string()
    } else if line.starts_with('+') {
        line.green().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else if line.starts_with("@@") {
        line.cyan().to_string()
    } else {
        line.to_string()
    }
}
