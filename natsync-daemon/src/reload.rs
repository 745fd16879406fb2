//! Debounced, time-bounded invocation of the NATS reload command.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{Instrument, Span};

use natsync_core::Settings;

use crate::error::ReloadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The command ran and exited successfully.
    Executed { output: String },
    /// Skipped: the previous reload is inside the cool-down window.
    Debounced,
}

pub struct ReloadSignaler {
    command: String,
    min_interval: Duration,
    timeout: Duration,
    // Held across check, invoke and update so concurrent callers serialize.
    last_success: Mutex<Option<Instant>>,
    span: Span,
}

impl ReloadSignaler {
    pub fn new(command: impl Into<String>, min_interval: Duration, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            min_interval,
            timeout,
            last_success: Mutex::new(None),
            span: tracing::info_span!("reloader", component = "reloader"),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.nats.reload_command.clone(),
            settings.reload_min_interval(),
            settings.reload_timeout(),
        )
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Ask the NATS server to reload its configuration.
    pub async fn signal(&self) -> Result<ReloadOutcome, ReloadError> {
        self.signal_inner().instrument(self.span.clone()).await
    }

    async fn signal_inner(&self) -> Result<ReloadOutcome, ReloadError> {
        let mut last = self.last_success.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < self.min_interval {
                tracing::debug!("skipping reload, too soon since last reload");
                return Ok(ReloadOutcome::Debounced);
            }
        }

        let output = self.invoke().await?;
        *last = Some(Instant::now());
        tracing::info!(output = %output.trim_end(), "reloaded NATS configuration");
        Ok(ReloadOutcome::Executed { output })
    }

    async fn invoke(&self) -> Result<String, ReloadError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or(ReloadError::EmptyCommand)?;

        let child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // On timeout the child future is dropped, which kills the process.
        let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ReloadError::TimedOut {
                timeout: self.timeout,
            })?
            .map_err(|source| ReloadError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let mut output = String::from_utf8_lossy(&finished.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&finished.stderr));

        if !finished.status.success() {
            return Err(ReloadError::Failed {
                status: finished.status.to_string(),
                output,
            });
        }
        Ok(output)
    }
}
