//! Identity records and the derived names used in the NATS artifact.
//!
//! Records deserialize straight from the identity store's JSON. Unknown fields
//! (collection ids, created/updated stamps) are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, unique role identifier assigned by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque user identifier assigned by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A role name reduced to `[A-Z0-9_]`, usable as a NATS config variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigSafeName(pub String);

impl fmt::Display for ConfigSafeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Uppercase, spaces to underscores, then drop anything outside `[A-Z0-9_]`.
pub fn normalize_role_name(name: &str) -> ConfigSafeName {
    let name = name.to_uppercase().replace(' ', "_");
    ConfigSafeName(
        name.chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A role with its publish/subscribe subject permissions.
///
/// Permission fields are kept as raw JSON: a malformed field must degrade that
/// one role, not fail the whole fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub publish_permissions: Value,
    #[serde(default)]
    pub subscribe_permissions: Value,
}

impl Role {
    pub fn config_safe_name(&self) -> ConfigSafeName {
        normalize_role_name(&self.name)
    }

    /// Publish subjects; `null` means none.
    pub fn publish_list(&self) -> Result<Vec<String>, serde_json::Error> {
        parse_permissions(&self.publish_permissions)
    }

    /// Subscribe subjects; `null` means none.
    pub fn subscribe_list(&self) -> Result<Vec<String>, serde_json::Error> {
        parse_permissions(&self.subscribe_permissions)
    }
}

fn parse_permissions(raw: &Value) -> Result<Vec<String>, serde_json::Error> {
    match raw {
        Value::Null => Ok(Vec::new()),
        other => Vec::<String>::deserialize(other),
    }
}

/// A login entry. `password` is passed through to the artifact verbatim.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password: String,
    pub role_id: RoleId,
    #[serde(default)]
    pub active: bool,
}

// Hand-written so the password never reaches a log line through `{:?}`.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role_id", &self.role_id)
            .field("active", &self.active)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Default permissions
// ---------------------------------------------------------------------------

/// A permission value from configuration: one subject or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionSet {
    One(String),
    Many(Vec<String>),
}

impl PermissionSet {
    pub fn subjects(&self) -> Vec<String> {
        match self {
            PermissionSet::One(subject) => vec![subject.clone()],
            PermissionSet::Many(subjects) => subjects.clone(),
        }
    }
}

/// Fallback permissions for users whose role grants nothing specific.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPermissions {
    #[serde(default)]
    pub publish: Option<PermissionSet>,
    #[serde(default)]
    pub subscribe: Option<PermissionSet>,
}

impl DefaultPermissions {
    pub fn publish_subjects(&self) -> Vec<String> {
        self.publish.as_ref().map(PermissionSet::subjects).unwrap_or_default()
    }

    pub fn subscribe_subjects(&self) -> Vec<String> {
        self.subscribe.as_ref().map(PermissionSet::subjects).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("Admin Panel", "ADMIN_PANEL")]
    #[case("sensor-readers", "SENSORREADERS")]
    #[case("  ops team ", "__OPS_TEAM_")]
    #[case("v2.devices", "V2DEVICES")]
    #[case("already_SAFE_1", "ALREADY_SAFE_1")]
    #[case("Über Gruppe", "BER_GRUPPE")]
    #[case("", "")]
    fn normalizes_role_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_role_name(raw).0, expected);
    }

    #[test]
    fn role_decodes_permission_arrays() {
        let role: Role = serde_json::from_value(json!({
            "id": "r1",
            "name": "Admin Panel",
            "publish_permissions": ["a/b", "a/c"],
            "subscribe_permissions": null,
            "collectionId": "pbc_123",
            "created": "2024-01-01 10:00:00.000Z"
        }))
        .expect("decode role");

        assert_eq!(role.publish_list().unwrap(), vec!["a/b", "a/c"]);
        assert!(role.subscribe_list().unwrap().is_empty());
        assert_eq!(role.config_safe_name().0, "ADMIN_PANEL");
    }

    #[test]
    fn missing_permission_fields_are_empty() {
        let role: Role = serde_json::from_value(json!({"id": "r1", "name": "x"})).unwrap();
        assert!(role.publish_list().unwrap().is_empty());
        assert!(role.subscribe_list().unwrap().is_empty());
    }

    #[test]
    fn malformed_permissions_surface_as_errors() {
        let role: Role = serde_json::from_value(json!({
            "id": "r1",
            "name": "x",
            "publish_permissions": {"not": "a list"},
            "subscribe_permissions": [1, 2]
        }))
        .unwrap();
        assert!(role.publish_list().is_err());
        assert!(role.subscribe_list().is_err());
    }

    #[test]
    fn user_debug_redacts_password() {
        let user = User {
            id: UserId::from("u1"),
            username: "bob".into(),
            password: "hunter2".into(),
            role_id: RoleId::from("r1"),
            active: true,
        };
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn permission_set_accepts_string_or_list() {
        let one: PermissionSet = serde_yaml::from_str("\">\"").unwrap();
        assert_eq!(one.subjects(), vec![">"]);

        let many: PermissionSet = serde_yaml::from_str("[\"a.>\", \"b.>\"]").unwrap();
        assert_eq!(many.subjects(), vec!["a.>", "b.>"]);
    }

    #[test]
    fn absent_defaults_have_no_subjects() {
        let defaults = DefaultPermissions::default();
        assert!(defaults.publish_subjects().is_empty());
        assert!(defaults.subscribe_subjects().is_empty());
    }
}
