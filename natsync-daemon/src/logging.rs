//! Tracing subscriber setup and startup rotation of the optional log file.
//!
//! Output always goes to stdout. When `app.log_file` is set the same lines
//! are appended to that file; it is rotated once at startup when it has grown
//! past [`MAX_LOG_BYTES`], keeping [`MAX_ROTATED_FILES`] numbered copies
//! (`natsync.log.1` newest).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use natsync_core::config::AppSettings;
use natsync_core::LogFormat;

use crate::error::{io_err, DaemonError};

pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_ROTATED_FILES: usize = 5;

/// Install the global subscriber. `RUST_LOG` wins over `app.log_level`.
///
/// A second call is a no-op, so tests and subcommands may call it freely.
pub fn init_tracing(app: &AppSettings) -> Result<(), DaemonError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&app.log_level).map_err(|err| {
            DaemonError::Logging(format!("invalid log level {:?}: {err}", app.log_level))
        })?,
    };

    let (writer, ansi) = match &app.log_file {
        Some(path) => (BoxMakeWriter::new(io::stdout.and(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(io::stdout), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);
    let _ = match app.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(ansi).try_init(),
    };
    Ok(())
}

fn open_log_file(path: &Path) -> Result<Mutex<fs::File>, DaemonError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    // Rotation trouble must not keep the service from logging at all.
    if let Err(err) = rotate_if_needed(path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        eprintln!("natsync: log rotation failed for {}: {err}", path.display());
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    Ok(Mutex::new(file))
}

/// Rotate `log_path` when it is at least `max_bytes` long.
///
/// Returns `true` if rotation happened. A missing file is not rotated.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes || max_files == 0 {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("natsync.log");
    base.with_file_name(format!("{name}.{n}"))
}
