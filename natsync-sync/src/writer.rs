//! Atomic publisher for the NATS authorization artifact.
//!
//! ## `publish` protocol
//!
//! 1. Create `natsync-*.tmp` next to the artifact (same filesystem).
//! 2. Write, flush and fsync the new content.
//! 3. Copy the current artifact into the backup directory (best effort).
//! 4. Rename the temp file onto the artifact path (atomic on POSIX).
//! 5. Set mode 0644 (best effort).
//!
//! The temp file is removed on any failure before step 4 completes.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;
use tracing::Span;

use crate::error::{io_err, SyncError};

const TMP_PREFIX: &str = "natsync-";
const TMP_SUFFIX: &str = ".tmp";
const BACKUP_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub path: PathBuf,
    /// The backup written for the replaced artifact, if there was one.
    pub backup: Option<PathBuf>,
}

pub struct Publisher {
    artifact: PathBuf,
    backup_dir: PathBuf,
    span: Span,
}

impl Publisher {
    pub fn new(artifact: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        let artifact = artifact.into();
        let span =
            tracing::info_span!("publisher", component = "publisher", path = %artifact.display());
        Self {
            artifact,
            backup_dir: backup_dir.into(),
            span,
        }
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Atomically replace the artifact with `text`.
    pub fn publish(&self, text: &str) -> Result<PublishReport, SyncError> {
        self.publish_staged(text, |_| Ok(()))
    }

    // `before_rename` runs once the temp file is complete; tests use it to
    // inject a failure between write and rename.
    fn publish_staged(
        &self,
        text: &str,
        before_rename: impl FnOnce(&Path) -> std::io::Result<()>,
    ) -> Result<PublishReport, SyncError> {
        let _entered = self.span.enter();
        let dir = artifact_dir(&self.artifact);
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .suffix(TMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| io_err(dir, e))?;
        write_all_synced(&mut tmp, text).map_err(|e| io_err(tmp.path(), e))?;

        let backup = match self.backup_current() {
            Ok(backup) => backup,
            Err(err) => {
                tracing::warn!(error = %err, "failed to back up current artifact");
                None
            }
        };

        before_rename(tmp.path()).map_err(|e| io_err(tmp.path(), e))?;

        // On failure the returned NamedTempFile is dropped, which deletes it.
        tmp.persist(&self.artifact)
            .map_err(|e| io_err(&self.artifact, e.error))?;

        if let Err(err) = set_readable_mode(&self.artifact) {
            tracing::warn!(error = %err, "failed to set artifact permissions");
        }

        tracing::info!(bytes = text.len(), "published artifact");
        Ok(PublishReport {
            path: self.artifact.clone(),
            backup,
        })
    }

    /// Copy the current artifact into the backup directory.
    ///
    /// Returns `Ok(None)` when there is nothing to back up.
    fn backup_current(&self) -> std::io::Result<Option<PathBuf>> {
        match std::fs::metadata(&self.artifact) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        }

        std::fs::create_dir_all(&self.backup_dir)?;
        let stamp = Local::now().format(BACKUP_TIMESTAMP).to_string();
        let target = unused_backup_path(&self.backup_dir, &self.artifact, &stamp);
        std::fs::copy(&self.artifact, &target)?;

        tracing::info!(backup = %target.display(), "created artifact backup");
        Ok(Some(target))
    }
}

fn artifact_dir(artifact: &Path) -> &Path {
    match artifact.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn write_all_synced(tmp: &mut NamedTempFile, text: &str) -> std::io::Result<()> {
    tmp.write_all(text.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()
}

/// `<stem>-<stamp><.ext>`, or `<stem>-<stamp>.<n><.ext>` when that exists.
pub fn backup_file_name(artifact: &Path, stamp: &str, n: usize) -> String {
    let stem = artifact
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let ext = artifact
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    if n == 0 {
        format!("{stem}-{stamp}{ext}")
    } else {
        format!("{stem}-{stamp}.{n}{ext}")
    }
}

fn unused_backup_path(dir: &Path, artifact: &Path, stamp: &str) -> PathBuf {
    let mut n = 0;
    loop {
        let candidate = dir.join(backup_file_name(artifact, stamp, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(unix)]
fn set_readable_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_readable_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
