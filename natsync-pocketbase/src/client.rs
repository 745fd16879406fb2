//! Blocking PocketBase client implementing [`IdentitySource`].

use std::sync::RwLock;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::Span;

use natsync_core::config::PocketBaseSettings;
use natsync_core::error::SourceError;
use natsync_core::source::IdentitySource;
use natsync_core::types::{Role, User};

use crate::models::{AuthRequest, AuthResponse, ListResponse};

/// Longest response body carried in a [`SourceError::Status`].
pub const MAX_ERROR_BODY: usize = 1000;

const AUTH_PATH: &str = "/api/collections/_superusers/auth-with-password";

pub struct PocketBaseClient {
    agent: ureq::Agent,
    base_url: String,
    admin_email: String,
    admin_password: String,
    user_collection: String,
    role_collection: String,
    per_page: u32,
    token: RwLock<Option<String>>,
    span: Span,
}

impl PocketBaseClient {
    pub fn new(settings: &PocketBaseSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout.max(1)))
            .build();
        Self {
            agent,
            base_url: settings.url.trim_end_matches('/').to_string(),
            admin_email: settings.admin_email.clone(),
            admin_password: settings.admin_password.clone(),
            user_collection: settings.user_collection.clone(),
            role_collection: settings.role_collection.clone(),
            per_page: settings.per_page.max(1),
            token: RwLock::new(None),
            span: tracing::info_span!("pocketbase", url = %settings.url),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    /// Exchange the configured admin credentials for a session token.
    pub fn authenticate(&self) -> Result<(), SourceError> {
        let _entered = self.span.enter();
        let url = format!("{}{}", self.base_url, AUTH_PATH);
        tracing::debug!(endpoint = %url, "authenticating");

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(AuthRequest {
                identity: &self.admin_email,
                password: &self.admin_password,
            })
            .map_err(|err| match into_source_error(&url, err) {
                SourceError::Status { status, body, .. } => {
                    SourceError::Auth(format!("status {status}: {body}"))
                }
                other => other,
            })?;

        let auth: AuthResponse = response.into_json().map_err(|err| SourceError::Decode {
            what: "auth response",
            message: err.to_string(),
        })?;
        if auth.token.is_empty() {
            return Err(SourceError::Auth("empty token in auth response".into()));
        }

        tracing::debug!(token_prefix = %token_prefix(&auth.token), "received session token");
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = Some(auth.token);
        tracing::info!("authenticated with PocketBase");
        Ok(())
    }

    fn current_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    /// Fetch every page of a collection.
    fn fetch_all<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: Option<&str>,
        what: &'static str,
    ) -> Result<Vec<T>, SourceError> {
        let token = self.current_token().ok_or(SourceError::NotAuthenticated)?;
        let url = self.collection_url(collection);
        let per_page = self.per_page.to_string();
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let mut request = self
                .agent
                .get(&url)
                .set("Accept", "application/json")
                .set("Authorization", &format!("Bearer {token}"))
                .query("perPage", &per_page)
                .query("page", &page_param);
            if let Some(filter) = filter {
                request = request.query("filter", filter);
            }
            tracing::debug!(url = %url, page, "fetching {what}");

            let response = request.call().map_err(|err| into_source_error(&url, err))?;
            let body = response.into_string().map_err(|err| SourceError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;
            let list: ListResponse<T> = serde_json::from_str(&body).map_err(|err| {
                tracing::error!(
                    error = %err,
                    response = %truncate(&body),
                    "failed to decode {what} response",
                );
                SourceError::Decode {
                    what,
                    message: err.to_string(),
                }
            })?;

            let last = list.items.is_empty() || page >= list.total_pages;
            items.extend(list.items);
            if last {
                break;
            }
            page += 1;
        }

        tracing::info!(count = items.len(), "retrieved {what}");
        Ok(items)
    }

    // A 401/403 mid-run usually means the session expired; log in again once.
    fn with_reauth<T>(
        &self,
        fetch: impl Fn() -> Result<Vec<T>, SourceError>,
    ) -> Result<Vec<T>, SourceError> {
        match fetch() {
            Err(err) if is_expired_session(&err) => {
                tracing::warn!(error = %err, "session rejected, re-authenticating");
                self.authenticate()?;
                fetch()
            }
            other => other,
        }
    }
}

impl IdentitySource for PocketBaseClient {
    fn fetch_roles(&self) -> Result<Vec<Role>, SourceError> {
        let _entered = self.span.enter();
        self.with_reauth(|| self.fetch_all(&self.role_collection, None, "roles"))
    }

    fn fetch_users(&self) -> Result<Vec<User>, SourceError> {
        let _entered = self.span.enter();
        self.with_reauth(|| self.fetch_all(&self.user_collection, Some("active=true"), "users"))
    }
}

fn is_expired_session(err: &SourceError) -> bool {
    matches!(err, SourceError::Status { status, .. } if *status == 401 || *status == 403)
}

fn into_source_error(url: &str, err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::Status(status, response) => SourceError::Status {
            url: url.to_string(),
            status,
            body: truncate(&response.into_string().unwrap_or_default()),
        },
        ureq::Error::Transport(transport) => SourceError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

/// At most [`MAX_ERROR_BODY`] characters of `body`.
pub fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> PocketBaseSettings {
        PocketBaseSettings {
            url: url.to_string(),
            ..PocketBaseSettings::default()
        }
    }

    #[test]
    fn fetch_before_authenticate_is_rejected() {
        let client = PocketBaseClient::new(&settings("http://127.0.0.1:1"));
        assert!(!client.is_authenticated());
        assert!(matches!(client.fetch_roles(), Err(SourceError::NotAuthenticated)));
        assert!(matches!(client.fetch_users(), Err(SourceError::NotAuthenticated)));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = PocketBaseClient::new(&settings("http://pb.local:8090/"));
        assert_eq!(
            client.collection_url("mqtt_roles"),
            "http://pb.local:8090/api/collections/mqtt_roles/records"
        );
    }

    #[test]
    fn truncate_caps_at_limit_on_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY + 50);
        assert_eq!(truncate(&long).chars().count(), MAX_ERROR_BODY);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn token_prefix_never_exposes_the_full_token() {
        assert_eq!(token_prefix("abcdefghijklmnop"), "abcdefghij...");
        assert_eq!(token_prefix("abc"), "abc...");
    }
}
