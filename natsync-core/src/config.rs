//! Settings: YAML file, then `APP_*` environment overrides, then validation.
//!
//! # Discovery
//!
//! ```text
//! --config <file>            explicit file
//! --config <dir>             <dir>/config.yaml
//! (none)                     ./config.yaml, ./config/config.yaml,
//!                            <config_dir>/natsync/config.yaml
//! ```
//!
//! A missing file is not an error; defaults and environment variables apply.
//! Environment keys are `APP_<SECTION>_<FIELD>` in upper case, for example
//! `APP_POCKETBASE_ADMIN_PASSWORD` or `APP_NATS_RELOAD_COMMAND`.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::DefaultPermissions;

pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const ENV_PREFIX: &str = "APP";

// ---------------------------------------------------------------------------
// Settings tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub pocketbase: PocketBaseSettings,
    #[serde(default)]
    pub nats: NatsSettings,
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'; expected: text, json")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Seconds between reconciliation cycles.
    pub sync_interval: u64,
    pub log_level: String,
    /// Extra log destination; stdout is always written.
    pub log_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            sync_interval: 60,
            log_level: "info".to_string(),
            log_file: None,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketBaseSettings {
    pub url: String,
    pub admin_email: String,
    pub admin_password: String,
    pub user_collection: String,
    pub role_collection: String,
    pub per_page: u32,
    /// HTTP timeout in seconds.
    pub timeout: u64,
}

impl Default for PocketBaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            admin_email: String::new(),
            admin_password: String::new(),
            user_collection: "mqtt_users".to_string(),
            role_collection: "mqtt_roles".to_string(),
            per_page: 100,
            timeout: 10,
        }
    }
}

impl fmt::Debug for PocketBaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PocketBaseSettings")
            .field("url", &self.url)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"<redacted>")
            .field("user_collection", &self.user_collection)
            .field("role_collection", &self.role_collection)
            .field("per_page", &self.per_page)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsSettings {
    /// The artifact path the NATS server includes.
    pub config_file: PathBuf,
    pub config_backup_dir: PathBuf,
    /// Shell-less command line, split on whitespace.
    pub reload_command: String,
    /// Seconds; reload requests inside this window are skipped.
    pub reload_min_interval: u64,
    /// Seconds to wait for the reload command before killing it.
    pub reload_timeout: u64,
    pub backup_retention_days: u64,
    pub default_permissions: DefaultPermissions,
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::new(),
            config_backup_dir: PathBuf::from("./backups"),
            reload_command: String::new(),
            reload_min_interval: 5,
            reload_timeout: 30,
            backup_retention_days: 30,
            default_permissions: DefaultPermissions::default(),
        }
    }
}

impl Settings {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.app.sync_interval)
    }

    pub fn reload_min_interval(&self) -> Duration {
        Duration::from_secs(self.nats.reload_min_interval)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.nats.reload_timeout)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.pocketbase.timeout)
    }

    /// Saturates for day counts that `validate` would reject.
    pub fn backup_retention(&self) -> Duration {
        retention_from_days(self.nats.backup_retention_days).unwrap_or(Duration::MAX)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.sync_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "app.sync_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pocketbase.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "pocketbase.url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.pocketbase.per_page == 0 {
            return Err(ConfigError::Invalid {
                field: "pocketbase.per_page",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.nats.config_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "nats.config_file",
                reason: "must not be empty".to_string(),
            });
        }
        if self.nats.reload_command.split_whitespace().next().is_none() {
            return Err(ConfigError::Invalid {
                field: "nats.reload_command",
                reason: "must name a program".to_string(),
            });
        }
        if retention_from_days(self.nats.backup_retention_days).is_none() {
            return Err(ConfigError::Invalid {
                field: "nats.backup_retention_days",
                reason: format!(
                    "{} days does not fit in seconds",
                    self.nats.backup_retention_days
                ),
            });
        }
        let artifact_dir = match self.nats.config_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if normalized(&self.nats.config_backup_dir) == normalized(artifact_dir) {
            // The sweeper would eventually delete the live artifact.
            return Err(ConfigError::Invalid {
                field: "nats.config_backup_dir",
                reason: "must not be the directory holding nats.config_file".to_string(),
            });
        }
        Ok(())
    }

    /// Apply `APP_<SECTION>_<FIELD>` overrides read through `env`.
    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        override_parse(env, "APP_SYNC_INTERVAL", &mut self.app.sync_interval)?;
        override_string(env, "APP_LOG_LEVEL", &mut self.app.log_level);
        if let Some(value) = lookup(env, "APP_LOG_FILE") {
            self.app.log_file = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        override_parse(env, "APP_LOG_FORMAT", &mut self.app.log_format)?;

        override_string(env, "POCKETBASE_URL", &mut self.pocketbase.url);
        override_string(env, "POCKETBASE_ADMIN_EMAIL", &mut self.pocketbase.admin_email);
        override_string(env, "POCKETBASE_ADMIN_PASSWORD", &mut self.pocketbase.admin_password);
        override_string(env, "POCKETBASE_USER_COLLECTION", &mut self.pocketbase.user_collection);
        override_string(env, "POCKETBASE_ROLE_COLLECTION", &mut self.pocketbase.role_collection);
        override_parse(env, "POCKETBASE_PER_PAGE", &mut self.pocketbase.per_page)?;
        override_parse(env, "POCKETBASE_TIMEOUT", &mut self.pocketbase.timeout)?;

        override_parse(env, "NATS_CONFIG_FILE", &mut self.nats.config_file)?;
        override_parse(env, "NATS_CONFIG_BACKUP_DIR", &mut self.nats.config_backup_dir)?;
        override_string(env, "NATS_RELOAD_COMMAND", &mut self.nats.reload_command);
        override_parse(env, "NATS_RELOAD_MIN_INTERVAL", &mut self.nats.reload_min_interval)?;
        override_parse(env, "NATS_RELOAD_TIMEOUT", &mut self.nats.reload_timeout)?;
        override_parse(env, "NATS_BACKUP_RETENTION_DAYS", &mut self.nats.backup_retention_days)?;
        Ok(())
    }
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}_{suffix}")
}

fn lookup(env: &dyn Fn(&str) -> Option<String>, suffix: &str) -> Option<String> {
    env(&env_key(suffix))
}

fn override_string(env: &dyn Fn(&str) -> Option<String>, suffix: &str, field: &mut String) {
    if let Some(value) = lookup(env, suffix) {
        *field = value;
    }
}

fn override_parse<T: FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    suffix: &str,
    field: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(env, suffix) {
        let parsed = value.trim().parse().map_err(|_| ConfigError::Env {
            key: env_key(suffix),
            value: value.clone(),
        })?;
        *field = parsed;
    }
    Ok(())
}

/// `days` as a [`Duration`], or `None` if the second count overflows.
pub fn retention_from_days(days: u64) -> Option<Duration> {
    days.checked_mul(24 * 60 * 60).map(Duration::from_secs)
}

fn normalized(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let lexical: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if lexical.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        lexical
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Settings plus the file they came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub source: Option<PathBuf>,
}

/// Load settings using the process environment.
pub fn load(explicit: Option<&Path>) -> Result<LoadedSettings, ConfigError> {
    load_with(explicit, &|key| std::env::var(key).ok())
}

/// Load settings with an injectable environment lookup.
///
/// Validates the result and creates the backup directory.
pub fn load_with(
    explicit: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<LoadedSettings, ConfigError> {
    let source = resolve_config_path(explicit);
    let mut settings = match &source {
        Some(path) => parse_file(path)?,
        None => Settings::default(),
    };
    settings.apply_env(env)?;
    settings.validate()?;

    let backup_dir = &settings.nats.config_backup_dir;
    if !backup_dir.exists() {
        std::fs::create_dir_all(backup_dir).map_err(|e| io_err(backup_dir, e))?;
    }

    Ok(LoadedSettings { settings, source })
}

/// Parse one YAML file into [`Settings`] without overrides or validation.
pub fn parse_file(path: &Path) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_dir() {
            return Some(path.join(CONFIG_FILE_NAME));
        }
        return Some(path.to_path_buf());
    }

    let mut candidates = vec![
        PathBuf::from(CONFIG_FILE_NAME),
        Path::new("config").join(CONFIG_FILE_NAME),
    ];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("natsync").join(CONFIG_FILE_NAME));
    }
    candidates.into_iter().find(|p| p.is_file())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn minimal(dir: &TempDir) -> String {
        format!(
            "pocketbase:\n  url: http://127.0.0.1:8090\nnats:\n  config_file: {}\n  config_backup_dir: {}\n  reload_command: nats-server --signal reload\n",
            dir.path().join("auth.conf").display(),
            dir.path().join("backups").display(),
        )
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(&dir));
        let loaded = load_with(Some(&path), &no_env).unwrap();
        let s = loaded.settings;

        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(s.app.sync_interval, 60);
        assert_eq!(s.app.log_level, "info");
        assert_eq!(s.app.log_format, LogFormat::Text);
        assert_eq!(s.pocketbase.user_collection, "mqtt_users");
        assert_eq!(s.pocketbase.per_page, 100);
        assert_eq!(s.reload_min_interval(), Duration::from_secs(5));
        assert_eq!(s.backup_retention(), Duration::from_secs(30 * 24 * 60 * 60));
        assert!(s.nats.default_permissions.publish.is_none());
    }

    #[test]
    fn directory_argument_resolves_config_yaml() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, &minimal(&dir));
        let loaded = load_with(Some(dir.path()), &no_env).unwrap();
        assert_eq!(
            loaded.source.as_deref(),
            Some(dir.path().join(CONFIG_FILE_NAME).as_path())
        );
    }

    #[test]
    fn backup_directory_is_created_on_load() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(&dir));
        load_with(Some(&path), &no_env).unwrap();
        assert!(dir.path().join("backups").is_dir());
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(&dir));
        let vars: HashMap<&str, &str> = [
            ("APP_APP_SYNC_INTERVAL", "15"),
            ("APP_APP_LOG_FORMAT", "json"),
            ("APP_POCKETBASE_ADMIN_PASSWORD", "s3cret"),
            ("APP_NATS_RELOAD_MIN_INTERVAL", "0"),
        ]
        .into_iter()
        .collect();
        let env = |key: &str| vars.get(key).map(|v| v.to_string());

        let s = load_with(Some(&path), &env).unwrap().settings;
        assert_eq!(s.app.sync_interval, 15);
        assert_eq!(s.app.log_format, LogFormat::Json);
        assert_eq!(s.pocketbase.admin_password, "s3cret");
        assert_eq!(s.nats.reload_min_interval, 0);
    }

    #[test]
    fn unparsable_environment_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &minimal(&dir));
        let env = |key: &str| (key == "APP_APP_SYNC_INTERVAL").then(|| "soon".to_string());
        let err = load_with(Some(&path), &env).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "APP_APP_SYNC_INTERVAL"));
    }

    #[test]
    fn default_permissions_accept_string_and_list() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "{}  default_permissions:\n    publish: \"_INBOX.>\"\n    subscribe: [\"public.>\", \"_INBOX.>\"]\n",
            minimal(&dir)
        );
        let path = write_config(&dir, &body);
        let s = load_with(Some(&path), &no_env).unwrap().settings;
        assert_eq!(s.nats.default_permissions.publish_subjects(), vec!["_INBOX.>"]);
        assert_eq!(
            s.nats.default_permissions.subscribe_subjects(),
            vec!["public.>", "_INBOX.>"]
        );
    }

    #[test]
    fn missing_reload_command_fails_validation() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "pocketbase:\n  url: http://pb\nnats:\n  config_file: {}\n  reload_command: \"   \"\n",
            dir.path().join("auth.conf").display()
        );
        let path = write_config(&dir, &body);
        let err = load_with(Some(&path), &no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "nats.reload_command",
                ..
            }
        ));
    }

    #[test]
    fn zero_sync_interval_fails_validation() {
        let mut s = Settings::default();
        s.pocketbase.url = "http://pb".into();
        s.nats.config_file = PathBuf::from("/tmp/auth.conf");
        s.nats.reload_command = "true".into();
        s.app.sync_interval = 0;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid {
                field: "app.sync_interval",
                ..
            })
        ));
    }

    fn valid_settings() -> Settings {
        let mut s = Settings::default();
        s.pocketbase.url = "http://pb".into();
        s.nats.config_file = PathBuf::from("/srv/nats/auth.conf");
        s.nats.config_backup_dir = PathBuf::from("/srv/nats/backups");
        s.nats.reload_command = "true".into();
        s
    }

    #[test]
    fn huge_retention_is_rejected_instead_of_overflowing() {
        let mut s = valid_settings();
        s.nats.backup_retention_days = u64::MAX;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid {
                field: "nats.backup_retention_days",
                ..
            })
        ));
        assert_eq!(s.backup_retention(), Duration::MAX);
        assert_eq!(retention_from_days(2), Some(Duration::from_secs(2 * 86_400)));
    }

    #[test]
    fn backup_dir_must_differ_from_artifact_dir() {
        let mut s = valid_settings();
        assert!(s.validate().is_ok());

        s.nats.config_backup_dir = PathBuf::from("/srv/nats/./");
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid {
                field: "nats.config_backup_dir",
                ..
            })
        ));

        s.nats.config_file = PathBuf::from("auth.conf");
        s.nats.config_backup_dir = PathBuf::from(".");
        assert!(s.validate().is_err());
    }

    #[test]
    fn backup_dir_equal_to_artifact_dir_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "pocketbase:\n  url: http://pb\nnats:\n  config_file: {}\n  config_backup_dir: {}\n  reload_command: \"true\"\n",
            dir.path().join("auth.conf").display(),
            dir.path().display(),
        );
        let path = write_config(&dir, &body);
        let err = load_with(Some(&path), &no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "nats.config_backup_dir",
                ..
            }
        ));
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "app: [unterminated");
        let err = parse_file(&path).unwrap_err();
        match err {
            ConfigError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn debug_output_hides_admin_password() {
        let mut s = Settings::default();
        s.pocketbase.admin_password = "topsecret".into();
        assert!(!format!("{s:?}").contains("topsecret"));
    }
}
