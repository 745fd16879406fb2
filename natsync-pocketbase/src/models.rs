//! Wire shapes of the PocketBase REST API.

use serde::{Deserialize, Serialize};

/// One page of a collection listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    /// `true` once `page` is the last page the server reported.
    pub fn is_last_page(&self) -> bool {
        self.page >= self.total_pages
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub identity: &'a str,
    pub password: &'a str,
}

/// Only the token is used; the admin record is ignored.
#[derive(Deserialize)]
pub(crate) struct AuthResponse {
    pub token: String,
}
