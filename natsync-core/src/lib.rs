//! natsync core library: identity records, the identity-source seam, settings.
//!
//! Public API surface:
//! - [`types`]: role and user records, config-safe names, permission sets
//! - [`source`]: the [`IdentitySource`] trait consumed by the pipeline
//! - [`config`]: YAML + environment settings
//! - [`error`]: [`ConfigError`] and [`SourceError`]

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::{LoadedSettings, LogFormat, Settings};
pub use error::{ConfigError, SourceError};
pub use source::{IdentitySource, StaticSource};
pub use types::{
    normalize_role_name, ConfigSafeName, DefaultPermissions, PermissionSet, Role, RoleId, User,
    UserId,
};
