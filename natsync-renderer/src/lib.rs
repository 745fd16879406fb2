//! # natsync-renderer
//!
//! Tera-based generator that renders the NATS authorization artifact from
//! identity-store records.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use natsync_core::types::DefaultPermissions;
//! use natsync_renderer::ArtifactGenerator;
//!
//! fn render(roles: &[natsync_core::Role], users: &[natsync_core::User]) {
//!     if let Ok(generator) = ArtifactGenerator::new(DefaultPermissions::default()) {
//!         if let Ok(out) = generator.generate(roles, users) {
//!             println!("{} users, {} bytes", out.user_count, out.text.len());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{
    format_permissions, quote, ArtifactContext, ExcludedUser, ExclusionReason, UnnamedRole,
    EMPTY_TOKEN,
};
pub use engine::{ArtifactGenerator, Generated, TemplateEngine};
pub use error::RenderError;
