//! `natsync run`: the long-running service.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use super::{bootstrap, connect};

#[derive(Args, Debug, Default)]
pub struct RunArgs {}

impl RunArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = bootstrap(config)?;
        tracing::info!(
            artifact = %settings.nats.config_file.display(),
            interval_secs = settings.app.sync_interval,
            "starting natsync",
        );
        let client = connect(&settings)?;

        natsync_daemon::start_blocking(&settings, Box::new(client)).context("sync service failed")?;
        Ok(())
    }
}
