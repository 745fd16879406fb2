//! Error types for natsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating [`crate::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the file path for context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override could not be parsed into the field's type.
    #[error("invalid value {value:?} for environment variable {key}")]
    Env { key: String, value: String },

    /// A setting is present but unusable.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors returned by an [`crate::IdentitySource`].
///
/// Every variant aborts the current cycle the same way; the split exists so
/// logs can tell an expired session from a flaky network.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A fetch was attempted before a successful authentication.
    #[error("not authenticated with the identity source")]
    NotAuthenticated,

    /// Authentication was rejected or could not be completed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Connection, DNS, TLS or timeout failure.
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// The identity source answered with a non-success status.
    #[error("request to {url} failed with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The response body did not match the expected record shape.
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl SourceError {
    /// `true` when the failure is about credentials rather than transport.
    pub fn is_auth(&self) -> bool {
        match self {
            SourceError::NotAuthenticated | SourceError::Auth(_) => true,
            SourceError::Status { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_classification() {
        assert!(SourceError::NotAuthenticated.is_auth());
        assert!(SourceError::Auth("bad password".into()).is_auth());
        assert!(SourceError::Status {
            url: "http://pb/api".into(),
            status: 401,
            body: String::new(),
        }
        .is_auth());
        assert!(!SourceError::Status {
            url: "http://pb/api".into(),
            status: 502,
            body: String::new(),
        }
        .is_auth());
        assert!(!SourceError::Transport {
            url: "http://pb/api".into(),
            message: "connection refused".into(),
        }
        .is_auth());
    }
}
