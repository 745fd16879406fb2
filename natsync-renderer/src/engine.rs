//! Tera rendering engine and the [`ArtifactGenerator`].
//!
//! The template is embedded at compile time; the artifact grammar is a fixed
//! contract with the NATS server, so there are no user overrides.

use tera::Tera;
use tracing::Span;

use natsync_core::types::{DefaultPermissions, Role, User};

use crate::context::{
    ArtifactContext, DegradedField, ExcludedUser, ExclusionReason, NameCollision, UnnamedRole,
};
use crate::error::RenderError;

pub const AUTHORIZATION_TEMPLATE: &str = "nats/authorization.conf.tera";

const TPLS: &[(&str, &str)] = &[(
    AUTHORIZATION_TEMPLATE,
    include_str!("templates/authorization.conf.tera"),
)];

fn build_tera() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TPLS.iter().copied())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Thin wrapper around a [`Tera`] instance loaded with the embedded templates.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new() -> Result<Self, RenderError> {
        Ok(TemplateEngine { tera: build_tera()? })
    }

    /// Render the authorization artifact for a prepared context.
    pub fn render(&self, ctx: &ArtifactContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(self.tera.render(AUTHORIZATION_TEMPLATE, &tera_ctx)?)
    }
}

// ---------------------------------------------------------------------------
// ArtifactGenerator
// ---------------------------------------------------------------------------

/// Output of one generation: the artifact text and what was left out of it.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub role_count: usize,
    pub user_count: usize,
    pub excluded: Vec<ExcludedUser>,
    pub degraded: Vec<DegradedField>,
    pub collisions: Vec<NameCollision>,
    pub unnamed: Vec<UnnamedRole>,
}

/// Turns fetched roles and users into canonical NATS config text.
///
/// Pure apart from logging: the same records always give the same bytes.
pub struct ArtifactGenerator {
    engine: TemplateEngine,
    defaults: DefaultPermissions,
    span: Span,
}

impl ArtifactGenerator {
    pub fn new(defaults: DefaultPermissions) -> Result<Self, RenderError> {
        Ok(Self {
            engine: TemplateEngine::new()?,
            defaults,
            span: tracing::info_span!("generator"),
        })
    }

    pub fn defaults(&self) -> &DefaultPermissions {
        &self.defaults
    }

    pub fn generate(&self, roles: &[Role], users: &[User]) -> Result<Generated, RenderError> {
        let _entered = self.span.enter();
        let ctx = ArtifactContext::build(roles, users, &self.defaults);

        for field in &ctx.degraded {
            tracing::warn!(
                role_id = %field.role_id,
                role = %field.role_name,
                field = ?field.field,
                reason = %field.reason,
                "malformed permissions, rendering as empty",
            );
        }
        for role in &ctx.unnamed {
            tracing::warn!(
                role_id = %role.role_id,
                role = %role.role_name,
                "role name has no usable characters, skipping role",
            );
        }
        for collision in &ctx.collisions {
            tracing::warn!(
                name = %collision.name,
                role_ids = ?collision.role_ids,
                "role names collide after normalization",
            );
        }
        for user in &ctx.excluded {
            match user.reason {
                ExclusionReason::UnknownRole => tracing::warn!(
                    username = %user.username,
                    role_id = %user.role_id,
                    "user has unknown role id, skipping",
                ),
                ExclusionReason::Inactive => tracing::debug!(
                    username = %user.username,
                    "user is inactive, skipping",
                ),
            }
        }

        let text = self.engine.render(&ctx)?;
        tracing::info!(
            roles = ctx.roles.len(),
            users = ctx.users.len(),
            excluded = ctx.excluded.len(),
            "generated NATS configuration",
        );

        Ok(Generated {
            text,
            role_count: ctx.roles.len(),
            user_count: ctx.users.len(),
            excluded: ctx.excluded,
            degraded: ctx.degraded,
            collisions: ctx.collisions,
            unnamed: ctx.unnamed,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use natsync_core::types::{RoleId, UserId};
    use serde_json::{json, Value};

    fn generator() -> ArtifactGenerator {
        ArtifactGenerator::new(DefaultPermissions::default()).expect("embedded template loads")
    }

    #[test]
    fn engine_new_succeeds() {
        TemplateEngine::new().expect("TemplateEngine::new should succeed with embedded templates");
    }

    #[test]
    fn empty_inputs_render_empty_users_list() {
        let out = generator().generate(&[], &[]).unwrap();
        assert!(out.text.contains("authorization {"));
        assert!(out.text.contains("  users = []\n}"));
        assert_eq!(out.role_count, 0);
        assert_eq!(out.user_count, 0);
    }

    #[test]
    fn last_user_has_no_trailing_comma() {
        let roles = vec![Role {
            id: RoleId::from("r1"),
            name: "ops".into(),
            publish_permissions: json!([">"]),
            subscribe_permissions: Value::Null,
        }];
        let users: Vec<User> = ["amy", "ben"]
            .iter()
            .map(|name| User {
                id: UserId::from(*name),
                username: name.to_string(),
                password: "pw".into(),
                role_id: RoleId::from("r1"),
                active: true,
            })
            .collect();

        let out = generator().generate(&roles, &users).unwrap();
        let expected = "  users = [\n    {user: \"amy\", password: \"pw\", permissions: $OPS},\n    {user: \"ben\", password: \"pw\", permissions: $OPS}\n  ]\n}";
        assert!(out.text.contains(expected), "unexpected users block:\n{}", out.text);
    }

    #[test]
    fn no_crlf_in_rendered_output() {
        let out = generator().generate(&[], &[]).unwrap();
        assert!(!out.text.contains('\r'));
    }
}
