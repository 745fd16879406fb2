//! Error types for natsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use natsync_core::SourceError;
use natsync_renderer::RenderError;

/// Everything that can abort a reconciliation step.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("identity source error: {0}")]
    Source(#[from] SourceError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// `true` when the identity source rejected our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Source(err) if err.is_auth())
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
