//! Shared reconciliation pipeline used by the CLI and the daemon.
//!
//! One pass is fetch → generate → detect → publish-if-changed. Reloading the
//! NATS server and scheduling are the daemon's concern.

use std::path::Path;
use std::time::Duration;

use natsync_core::{DefaultPermissions, IdentitySource, Role, Settings, User};
use natsync_renderer::{ArtifactGenerator, Generated};

use crate::detector::ChangeDetector;
use crate::diff::{diff_artifact, ArtifactDiff};
use crate::error::SyncError;
use crate::retention::{self, SweepReport};
use crate::writer::{PublishReport, Publisher};

/// What one reconciliation pass did.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub role_count: usize,
    pub user_count: usize,
    pub excluded: usize,
    pub changed: bool,
    /// Present only when the artifact was replaced.
    pub published: Option<PublishReport>,
}

pub struct Pipeline {
    source: Box<dyn IdentitySource>,
    generator: ArtifactGenerator,
    detector: ChangeDetector,
    publisher: Publisher,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn IdentitySource>,
        defaults: DefaultPermissions,
        artifact: &Path,
        backup_dir: &Path,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            source,
            generator: ArtifactGenerator::new(defaults)?,
            detector: ChangeDetector::new(artifact),
            publisher: Publisher::new(artifact, backup_dir),
        })
    }

    pub fn from_settings(
        source: Box<dyn IdentitySource>,
        settings: &Settings,
    ) -> Result<Self, SyncError> {
        Self::new(
            source,
            settings.nats.default_permissions.clone(),
            &settings.nats.config_file,
            &settings.nats.config_backup_dir,
        )
    }

    pub fn artifact(&self) -> &Path {
        self.publisher.artifact()
    }

    pub fn backup_dir(&self) -> &Path {
        self.publisher.backup_dir()
    }

    /// Roles first, then users. Either failure aborts.
    pub fn fetch(&self) -> Result<(Vec<Role>, Vec<User>), SyncError> {
        let roles = self.source.fetch_roles()?;
        let users = self.source.fetch_users()?;
        Ok((roles, users))
    }

    /// Fetch and render without touching the filesystem.
    pub fn render(&self) -> Result<Generated, SyncError> {
        let (roles, users) = self.fetch()?;
        Ok(self.generator.generate(&roles, &users)?)
    }

    /// Run one pass, publishing only when the rendering differs from disk.
    pub fn reconcile(&mut self) -> Result<PassOutcome, SyncError> {
        let generated = self.render()?;
        let changed = self.detector.has_changed(&generated.text)?;

        let published = if changed {
            match self.publisher.publish(&generated.text) {
                Ok(report) => Some(report),
                Err(err) => {
                    // The cache now holds a fingerprint that never reached disk.
                    self.detector.forget();
                    return Err(err);
                }
            }
        } else {
            tracing::debug!("artifact unchanged, nothing to publish");
            None
        };

        Ok(PassOutcome {
            role_count: generated.role_count,
            user_count: generated.user_count,
            excluded: generated.excluded.len(),
            changed,
            published,
        })
    }

    /// Render and diff against the artifact on disk. Writes nothing.
    pub fn diff(&self) -> Result<ArtifactDiff, SyncError> {
        let generated = self.render()?;
        diff_artifact(self.artifact(), &generated.text)
    }

    pub fn sweep(&self, max_age: Duration) -> Result<SweepReport, SyncError> {
        retention::sweep(self.backup_dir(), max_age)
    }
}
