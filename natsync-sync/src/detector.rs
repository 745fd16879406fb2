//! Change detection against the published artifact.
//!
//! Compares a candidate rendering with what is on disk, caching the last
//! candidate fingerprint so a steady state costs no filesystem reads.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::Span;

use crate::error::{io_err, SyncError};
use crate::fingerprint::fingerprint;

pub struct ChangeDetector {
    path: PathBuf,
    last: Option<String>,
    span: Span,
}

impl ChangeDetector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let span = tracing::info_span!("detector", component = "detector", path = %path.display());
        Self {
            path,
            last: None,
            span,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The fingerprint of the last candidate checked, if any.
    pub fn cached(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Drop the cached fingerprint so the next check reads the file again.
    pub fn forget(&mut self) {
        self.last = None;
    }

    /// `true` when `candidate` differs from the artifact on disk.
    ///
    /// A missing or empty artifact always counts as changed. Read errors other
    /// than not-found propagate and leave the cache untouched.
    pub fn has_changed(&mut self, candidate: &str) -> Result<bool, SyncError> {
        let _entered = self.span.enter();
        let candidate_hash = fingerprint(candidate);

        if self.last.as_deref() == Some(candidate_hash.as_str()) {
            tracing::debug!("candidate matches cached fingerprint");
            return Ok(false);
        }

        let changed = match std::fs::read(&self.path) {
            Ok(current) if current.is_empty() => {
                tracing::debug!("artifact is empty, treating as changed");
                true
            }
            Ok(current) => {
                let current_hash = fingerprint(&current);
                let changed = current_hash != candidate_hash;
                if changed {
                    tracing::debug!(
                        new_hash = &candidate_hash[..8],
                        old_hash = &current_hash[..8],
                        "artifact content changed",
                    );
                } else {
                    tracing::debug!("artifact content unchanged");
                }
                changed
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("artifact does not exist, treating as changed");
                true
            }
            Err(err) => return Err(io_err(&self.path, err)),
        };

        self.last = Some(candidate_hash);
        Ok(changed)
    }
}
