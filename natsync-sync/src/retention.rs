//! Backup retention: listing and age-based sweeping of the backup directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{io_err, SyncError};

/// Counts from one sweep of the backup directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub kept: usize,
    pub failed: usize,
}

/// A regular file found in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl BackupEntry {
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }
}

/// Every regular file in `dir`, oldest first. A missing directory is empty.
pub fn list_backups(dir: &Path) -> Result<Vec<BackupEntry>, SyncError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(dir, err)),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to stat backup");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        backups.push(BackupEntry {
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            path,
        });
    }
    backups.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(backups)
}

/// Remove regular files in `dir` last modified more than `max_age` ago.
///
/// Per-file failures are logged and counted; only an unreadable directory is
/// an error.
pub fn sweep(dir: &Path, max_age: Duration) -> Result<SweepReport, SyncError> {
    sweep_at(dir, max_age, SystemTime::now())
}

pub(crate) fn sweep_at(
    dir: &Path,
    max_age: Duration,
    now: SystemTime,
) -> Result<SweepReport, SyncError> {
    let span = tracing::info_span!("sweeper", component = "sweeper", dir = %dir.display());
    let _entered = span.enter();

    let mut report = SweepReport::default();
    for backup in list_backups(dir)? {
        if backup.age(now) <= max_age {
            report.kept += 1;
            continue;
        }
        match std::fs::remove_file(&backup.path) {
            Ok(()) => {
                tracing::debug!(file = %backup.path.display(), "removed old backup");
                report.removed += 1;
            }
            Err(err) => {
                tracing::warn!(file = %backup.path.display(), error = %err, "failed to remove old backup");
                report.failed += 1;
            }
        }
    }

    if report.removed > 0 || report.failed > 0 {
        tracing::info!(
            removed = report.removed,
            kept = report.kept,
            failed = report.failed,
            "backup sweep finished",
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn aged_file(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        let mtime = SystemTime::now() - age;
        set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();
        path
    }

    #[test]
    fn removes_only_files_past_retention() {
        let tmp = TempDir::new().unwrap();
        let old = aged_file(tmp.path(), "auth-old.conf", 40 * DAY);
        let fresh = aged_file(tmp.path(), "auth-new.conf", DAY);

        let report = sweep(tmp.path(), 30 * DAY).unwrap();

        assert_eq!(report, SweepReport { removed: 1, kept: 1, failed: 0 });
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn subdirectories_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("archive");
        fs::create_dir(&nested).unwrap();
        set_file_mtime(&nested, FileTime::from_unix_time(0, 0)).unwrap();

        let report = sweep(tmp.path(), DAY).unwrap();

        assert_eq!(report, SweepReport::default());
        assert!(nested.exists());
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let report = sweep(&tmp.path().join("nope"), DAY).unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn list_is_oldest_first_with_sizes() {
        let tmp = TempDir::new().unwrap();
        aged_file(tmp.path(), "b.conf", DAY);
        aged_file(tmp.path(), "a.conf", 3 * DAY);

        let listed = list_backups(tmp.path()).unwrap();
        let names: Vec<_> = listed
            .iter()
            .map(|b| b.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.conf", "b.conf"]);
        assert_eq!(listed[0].size, "a.conf".len() as u64);
    }

    #[test]
    fn age_is_measured_from_the_given_instant() {
        let tmp = TempDir::new().unwrap();
        let path = aged_file(tmp.path(), "x.conf", 2 * DAY);
        let later = SystemTime::now() + 5 * DAY;

        let report = sweep_at(tmp.path(), 6 * DAY, later).unwrap();

        assert_eq!(report.removed, 1);
        assert!(!path.exists());
    }
}
