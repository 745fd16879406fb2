use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the reload command.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("reload command is empty")]
    EmptyCommand,

    #[error("failed to start reload command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command exited with {status}, output: {output}")]
    Failed { status: String, output: String },

    #[error("reload command did not finish within {timeout:?}")]
    TimedOut { timeout: Duration },
}

/// Error surface for the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] natsync_sync::SyncError),

    #[error("reload error: {0}")]
    Reload(#[from] ReloadError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natsync_core::SourceError;
    use natsync_sync::SyncError;

    #[test]
    fn source_failures_arrive_through_the_pipeline_error() {
        let err: DaemonError = SyncError::from(SourceError::NotAuthenticated).into();
        assert!(matches!(err, DaemonError::Sync(SyncError::Source(_))));
        assert!(err.to_string().starts_with("sync error: "));
    }
}
