//! Artifact context: the sorted, pre-formatted payload handed to the template.
//!
//! Everything that decides *what* ends up in the artifact lives here: role
//! lookup, permission formatting, user exclusion and ordering. The template
//! only decides layout.

use std::collections::HashMap;

use serde::Serialize;

use natsync_core::types::{ConfigSafeName, DefaultPermissions, Role, RoleId, User, UserId};

/// Rendered in place of an empty or unusable permission list.
pub const EMPTY_TOKEN: &str = "\"\"";

/// Quote a value for the NATS config grammar.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// `[]` → `""`, `[a]` → `"a"`, `[a, b]` → `["a", "b"]`.
pub fn format_permissions(subjects: &[String]) -> String {
    match subjects {
        [] => EMPTY_TOKEN.to_string(),
        [one] => quote(one),
        many => {
            let quoted: Vec<String> = many.iter().map(|s| quote(s)).collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Context types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleEntry {
    pub name: String,
    pub publish: String,
    pub subscribe: String,
    #[serde(skip)]
    pub id: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntry {
    /// Login as fetched; ordering uses its lowercase form.
    pub username: String,
    pub role: String,
    /// The complete `{user: …, password: …, permissions: $ROLE}` entry.
    pub entry: String,
    #[serde(skip)]
    pub id: UserId,
}

/// Which permission field of a role could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionField {
    Publish,
    Subscribe,
}

/// A role field that fell back to [`EMPTY_TOKEN`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedField {
    pub role_id: RoleId,
    pub role_name: String,
    pub field: PermissionField,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    UnknownRole,
    Inactive,
}

/// A user left out of the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedUser {
    pub user_id: UserId,
    pub username: String,
    pub role_id: RoleId,
    pub reason: ExclusionReason,
}

/// Two or more role ids that normalize to the same config-safe name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    pub name: ConfigSafeName,
    pub role_ids: Vec<RoleId>,
}

/// A role whose name normalizes to nothing, so it cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnnamedRole {
    pub role_id: RoleId,
    pub role_name: String,
}

/// Template payload plus the diagnostics gathered while building it.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactContext {
    pub default_publish: String,
    pub default_subscribe: String,
    pub roles: Vec<RoleEntry>,
    pub users: Vec<UserEntry>,
    #[serde(skip)]
    pub excluded: Vec<ExcludedUser>,
    #[serde(skip)]
    pub degraded: Vec<DegradedField>,
    #[serde(skip)]
    pub collisions: Vec<NameCollision>,
    #[serde(skip)]
    pub unnamed: Vec<UnnamedRole>,
}

impl ArtifactContext {
    /// Build the sorted payload from fetched records.
    ///
    /// Roles sort by config-safe name, then id. Users sort by lowercased
    /// username, then username, then id. Input order never matters.
    pub fn build(roles: &[Role], users: &[User], defaults: &DefaultPermissions) -> Self {
        let mut degraded = Vec::new();
        let mut by_id: HashMap<&RoleId, ConfigSafeName> = HashMap::with_capacity(roles.len());
        let mut role_entries = Vec::with_capacity(roles.len());
        let mut unnamed = Vec::new();

        for role in roles {
            let name = role.config_safe_name();
            // Left out of the lookup, so its users fall out as unknown-role.
            if name.0.is_empty() {
                unnamed.push(UnnamedRole {
                    role_id: role.id.clone(),
                    role_name: role.name.clone(),
                });
                continue;
            }
            let publish = degrade_on_error(
                role,
                PermissionField::Publish,
                role.publish_list(),
                &mut degraded,
            );
            let subscribe = degrade_on_error(
                role,
                PermissionField::Subscribe,
                role.subscribe_list(),
                &mut degraded,
            );
            by_id.insert(&role.id, name.clone());
            role_entries.push(RoleEntry {
                name: name.0,
                publish,
                subscribe,
                id: role.id.clone(),
            });
        }
        role_entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        let collisions = find_collisions(&role_entries);

        let mut excluded = Vec::new();
        let mut user_entries = Vec::with_capacity(users.len());
        for user in users {
            if !user.active {
                excluded.push(exclusion(user, ExclusionReason::Inactive));
                continue;
            }
            let Some(role_name) = by_id.get(&user.role_id) else {
                excluded.push(exclusion(user, ExclusionReason::UnknownRole));
                continue;
            };
            user_entries.push(UserEntry {
                username: user.username.clone(),
                role: role_name.0.clone(),
                entry: format!(
                    "{{user: {}, password: {}, permissions: ${}}}",
                    quote(&user.username),
                    quote(&user.password),
                    role_name
                ),
                id: user.id.clone(),
            });
        }
        user_entries.sort_by(|a, b| {
            a.username
                .to_lowercase()
                .cmp(&b.username.to_lowercase())
                .then_with(|| a.username.cmp(&b.username))
                .then_with(|| a.id.cmp(&b.id))
        });
        degraded.sort_by(|a, b| a.role_id.cmp(&b.role_id));
        excluded.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        unnamed.sort_by(|a, b| a.role_id.cmp(&b.role_id));

        Self {
            default_publish: format_permissions(&defaults.publish_subjects()),
            default_subscribe: format_permissions(&defaults.subscribe_subjects()),
            roles: role_entries,
            users: user_entries,
            excluded,
            degraded,
            collisions,
            unnamed,
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, tera::Error> {
        tera::Context::from_serialize(self)
    }
}

fn degrade_on_error(
    role: &Role,
    field: PermissionField,
    parsed: Result<Vec<String>, serde_json::Error>,
    degraded: &mut Vec<DegradedField>,
) -> String {
    match parsed {
        Ok(subjects) => format_permissions(&subjects),
        Err(err) => {
            degraded.push(DegradedField {
                role_id: role.id.clone(),
                role_name: role.name.clone(),
                field,
                reason: err.to_string(),
            });
            EMPTY_TOKEN.to_string()
        }
    }
}

fn exclusion(user: &User, reason: ExclusionReason) -> ExcludedUser {
    ExcludedUser {
        user_id: user.id.clone(),
        username: user.username.clone(),
        role_id: user.role_id.clone(),
        reason,
    }
}

// Expects entries already sorted by name.
fn find_collisions(entries: &[RoleEntry]) -> Vec<NameCollision> {
    let mut collisions = Vec::new();
    for group in entries.chunk_by(|a, b| a.name == b.name) {
        if group.len() > 1 {
            collisions.push(NameCollision {
                name: ConfigSafeName(group[0].name.clone()),
                role_ids: group.iter().map(|e| e.id.clone()).collect(),
            });
        }
    }
    collisions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
