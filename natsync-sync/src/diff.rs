//! Unified diff between the published artifact and a fresh rendering.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::error::{io_err, SyncError};

/// Result of comparing a rendering with the artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDiff {
    pub path: PathBuf,
    /// Empty when the two are identical.
    pub unified_diff: String,
}

impl ArtifactDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Diff `rendered` against the file at `path`. A missing file diffs as empty.
pub fn diff_artifact(path: &Path, rendered: &str) -> Result<ArtifactDiff, SyncError> {
    let existing = read_existing_or_empty(path)?;
    if existing == rendered {
        return Ok(ArtifactDiff {
            path: path.to_path_buf(),
            unified_diff: String::new(),
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let old_header = format!("a/{name}");
    let new_header = format!("b/{name}");
    let unified = TextDiff::from_lines(existing.as_str(), rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(ArtifactDiff {
        path: path.to_path_buf(),
        unified_diff: unified,
    })
}

// Invalid UTF-8 shows up as replacement characters rather than failing.
fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn identical_content_has_no_diff() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("auth.conf");
        fs::write(&path, "a\nb\n").unwrap();
        assert!(diff_artifact(&path, "a\nb\n").unwrap().is_empty());
    }

    #[test]
    fn changed_line_produces_unified_hunk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("auth.conf");
        fs::write(&path, "a\nb\n").unwrap();

        let diff = diff_artifact(&path, "a\nc\n").unwrap();

        assert!(diff.unified_diff.contains("--- a/auth.conf"));
        assert!(diff.unified_diff.contains("+++ b/auth.conf"));
        assert!(diff.unified_diff.contains("@@"));
        assert!(diff.unified_diff.contains("-b"));
        assert!(diff.unified_diff.contains("+c"));
    }

    #[test]
    fn missing_artifact_diffs_as_all_additions() {
        let tmp = TempDir::new().unwrap();
        let diff = diff_artifact(&tmp.path().join("auth.conf"), "x\n").unwrap();
        assert!(diff.unified_diff.contains("+x"));
    }

    #[test]
    fn non_utf8_artifact_still_diffs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("auth.conf");
        fs::write(&path, [0xff, b'\n']).unwrap();

        let diff = diff_artifact(&path, "x\n").unwrap();

        assert!(diff.unified_diff.contains("-\u{fffd}"));
        assert!(diff.unified_diff.contains("+x"));
    }
}
