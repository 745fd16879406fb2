//! # natsync-sync
//!
//! Change-gated atomic publishing of the NATS authorization artifact.
//!
//! [`Pipeline::reconcile`] fetches identity records, renders them, and replaces
//! the artifact only when its fingerprint changed. Backups of replaced
//! artifacts are pruned with [`retention::sweep`].

pub mod detector;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod retention;
pub mod writer;

pub use detector::ChangeDetector;
pub use diff::{diff_artifact, ArtifactDiff};
pub use error::SyncError;
pub use fingerprint::fingerprint;
pub use pipeline::{PassOutcome, Pipeline};
pub use retention::{list_backups, sweep, BackupEntry, SweepReport};
pub use writer::{PublishReport, Publisher};
