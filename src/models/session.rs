//! Server-side login sessions.

use serde::{Deserialize, Serialize};

/// The identity behind a session cookie, resolved on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub membership_id: String,
    pub membership_type: i32,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: String,
    pub expires_at: String,
}
