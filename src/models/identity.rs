//! Canonical player identities produced by the search engine.

use serde::{Deserialize, Serialize};

/// One platform-linked game account chosen to represent a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIdentity {
    /// Global name in `Name#Code` form
    pub display_name: String,
    pub membership_type: i32,
    pub membership_id: String,
}
