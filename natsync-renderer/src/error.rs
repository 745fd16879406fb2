//! Error types for natsync-renderer.

use thiserror::Error;

/// All errors that can arise while rendering the artifact.
///
/// Malformed permission data is not an error here: it degrades to the empty
/// token and is reported through [`crate::Generated::degraded`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),
}
