//! `natsync backups`: list what the publisher has kept.

use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use natsync_sync::{list_backups, BackupEntry};

use super::load_settings;

#[derive(Args, Debug)]
pub struct BackupsArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct BackupJson {
    name: String,
    path: String,
    size: u64,
    modified: String,
    age_secs: u64,
}

#[derive(Tabled)]
struct BackupTableRow {
    #[tabled(rename = "backup")]
    name: String,
    #[tabled(rename = "modified")]
    modified: String,
    #[tabled(rename = "age")]
    age: String,
    #[tabled(rename = "size")]
    size: String,
}

impl BackupsArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = load_settings(config)?;
        let dir = &settings.nats.config_backup_dir;
        let backups =
            list_backups(dir).with_context(|| format!("failed to list {}", dir.display()))?;
        let now = SystemTime::now();

        if self.json {
            let payload: Vec<BackupJson> = backups.iter().map(|b| to_json(b, now)).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize backups")?
            );
            return Ok(());
        }

        if backups.is_empty() {
            println!("No backups in {}.", dir.display());
            return Ok(());
        }

        let retention = settings.backup_retention();
        let expired = backups.iter().filter(|b| b.age(now) > retention).count();
        let rows: Vec<BackupTableRow> = backups
            .iter()
            .map(|b| BackupTableRow {
                name: file_name(b),
                modified: format_time(b.modified),
                age: format_age(b.age(now)),
                size: format_size(b.size),
            })
            .collect();

        println!("{} backup(s) in {}", backups.len(), dir.display());
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        if expired > 0 {
            println!(
                "{}",
                format!(
                    "{expired} backup(s) older than {} days; run 'natsync sweep' to remove them.",
                    settings.nats.backup_retention_days
                )
                .yellow()
            );
        }
        Ok(())
    }
}

fn to_json(entry: &BackupEntry, now: SystemTime) -> BackupJson {
    let modified: DateTime<Local> = entry.modified.into();
    BackupJson {
        name: file_name(entry),
        path: entry.path.display().to_string(),
        size: entry.size,
        modified: modified.to_rfc3339(),
        age_secs: entry.age(now).as_secs(),
    }
}

fn file_name(entry: &BackupEntry) -> String {
    entry
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.path.display().to_string())
}

fn format_time(at: SystemTime) -> String {
    let local: DateTime<Local> = at.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}
