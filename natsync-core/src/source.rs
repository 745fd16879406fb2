//! The identity-source seam.
//!
//! The pipeline only ever sees this trait; the PocketBase client in
//! `natsync-pocketbase` is one implementation and [`StaticSource`] is another.

use std::sync::Arc;

use crate::error::SourceError;
use crate::types::{Role, User};

/// Read access to the identity store.
///
/// Implementations block; callers run them off the async executor.
pub trait IdentitySource: Send + Sync {
    /// Every role known to the store.
    fn fetch_roles(&self) -> Result<Vec<Role>, SourceError>;

    /// Every user known to the store. Sources may pre-filter inactive users.
    fn fetch_users(&self) -> Result<Vec<User>, SourceError>;
}

impl<T: IdentitySource + ?Sized> IdentitySource for Arc<T> {
    fn fetch_roles(&self) -> Result<Vec<Role>, SourceError> {
        (**self).fetch_roles()
    }

    fn fetch_users(&self) -> Result<Vec<User>, SourceError> {
        (**self).fetch_users()
    }
}

impl<T: IdentitySource + ?Sized> IdentitySource for Box<T> {
    fn fetch_roles(&self) -> Result<Vec<Role>, SourceError> {
        (**self).fetch_roles()
    }

    fn fetch_users(&self) -> Result<Vec<User>, SourceError> {
        (**self).fetch_users()
    }
}

/// In-memory source over a fixed snapshot of records.
///
/// Records can be swapped between cycles with [`StaticSource::replace`].
#[derive(Debug, Default)]
pub struct StaticSource {
    snapshot: std::sync::RwLock<(Vec<Role>, Vec<User>)>,
}

impl StaticSource {
    pub fn new(roles: Vec<Role>, users: Vec<User>) -> Self {
        Self {
            snapshot: std::sync::RwLock::new((roles, users)),
        }
    }

    pub fn replace(&self, roles: Vec<Role>, users: Vec<User>) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = (roles, users);
    }
}

impl IdentitySource for StaticSource {
    fn fetch_roles(&self) -> Result<Vec<Role>, SourceError> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.0.clone())
    }

    fn fetch_users(&self) -> Result<Vec<User>, SourceError> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RoleId, UserId};
    use serde_json::Value;

    fn role(id: &str) -> Role {
        Role {
            id: RoleId::from(id),
            name: id.to_uppercase(),
            publish_permissions: Value::Null,
            subscribe_permissions: Value::Null,
        }
    }

    #[test]
    fn static_source_serves_and_replaces_snapshot() {
        let source = StaticSource::new(vec![role("r1")], vec![]);
        assert_eq!(source.fetch_roles().unwrap().len(), 1);
        assert!(source.fetch_users().unwrap().is_empty());

        source.replace(
            vec![role("r1"), role("r2")],
            vec![User {
                id: UserId::from("u1"),
                username: "bob".into(),
                password: "pw".into(),
                role_id: RoleId::from("r2"),
                active: true,
            }],
        );
        assert_eq!(source.fetch_roles().unwrap().len(), 2);
        assert_eq!(source.fetch_users().unwrap()[0].username, "bob");
    }

    #[test]
    fn arc_forwards_to_inner_source() {
        let source: Arc<dyn IdentitySource> = Arc::new(StaticSource::new(vec![role("r1")], vec![]));
        assert_eq!(source.fetch_roles().unwrap()[0].id.0, "r1");
    }
}
