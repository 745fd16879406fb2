//! PocketBase-backed [`natsync_core::IdentitySource`].
//!
//! Authenticates as a superuser, then pages through the role and user
//! collections with blocking `ureq` calls. Callers on an async runtime run it
//! under `spawn_blocking`.

pub mod client;
pub mod models;

pub use client::{truncate, PocketBaseClient, MAX_ERROR_BODY};
pub use models::ListResponse;
