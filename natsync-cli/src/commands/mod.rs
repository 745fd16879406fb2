pub mod backups;
pub mod diff;
pub mod once;
pub mod run;
pub mod sweep;

use std::path::Path;

use anyhow::{Context, Result};

use natsync_core::{config, Settings};
use natsync_pocketbase::PocketBaseClient;

/// Load settings without installing logging.
///
/// Inspection commands use this so their stdout carries only their own output.
pub(crate) fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    Ok(config::load(config_path)
        .context("failed to load configuration")?
        .settings)
}

/// Load settings and install logging for the sync commands.
pub(crate) fn bootstrap(config_path: Option<&Path>) -> Result<Settings> {
    let loaded = config::load(config_path).context("failed to load configuration")?;
    natsync_daemon::init_tracing(&loaded.settings.app).context("failed to set up logging")?;

    match &loaded.source {
        Some(path) => tracing::info!(path = %path.display(), "loaded configuration"),
        None => tracing::warn!("no config file found, using defaults and environment"),
    }
    Ok(loaded.settings)
}

/// A client that has already proven its credentials. Auth failure is fatal.
pub(crate) fn connect(settings: &Settings) -> Result<PocketBaseClient> {
    let client = PocketBaseClient::new(&settings.pocketbase);
    client.authenticate().with_context(|| {
        format!(
            "failed to authenticate with PocketBase at {}",
            settings.pocketbase.url
        )
    })?;
    Ok(client)
}
