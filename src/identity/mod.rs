//! Player search: turns a free-text query into canonical account identities.
//!
//! Queries of the form `Name#1234` go through the provider's exact-name lookup. Anything
//! else is a prefix search, where each result may link several platform accounts of the
//! same person and one of them has to be picked to represent the player.

use std::collections::HashMap;

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::models::CanonicalIdentity;
use crate::upstream::{string_or_number, UpstreamClient};

/// Shorter queries return nothing without contacting the provider.
pub const MIN_QUERY_CHARS: usize = 2;

/// Maximum number of identities returned for one query.
pub const MAX_RESULTS: usize = 10;

/// Membership type preferred when nothing else marks a primary account (Steam).
pub const PREFERRED_MEMBERSHIP_TYPE: i32 = 3;

const EXACT_NAME_PATH: &str = "/Destiny2/SearchDestinyPlayerByBungieName/All/";
const PREFIX_SEARCH_PATH: &str = "/User/Search/GlobalName/0/";

/// Account record returned by the exact-name lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPlayerRecord {
    #[serde(default)]
    pub bungie_global_display_name: String,
    #[serde(default)]
    pub bungie_global_display_name_code: Option<u32>,
    #[serde(default)]
    pub membership_type: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub membership_id: Option<String>,
}

/// One platform account linked to a search result.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipLink {
    #[serde(default)]
    pub membership_type: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub membership_id: Option<String>,
    #[serde(default)]
    pub is_cross_save_primary: bool,
    #[serde(default)]
    pub cross_save_override: Option<i32>,
}

/// One display-name group from the prefix search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchEntry {
    #[serde(default)]
    pub bungie_global_display_name: String,
    #[serde(default)]
    pub bungie_global_display_name_code: Option<u32>,
    #[serde(default)]
    pub destiny_memberships: Vec<MembershipLink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrefixSearchResponse {
    #[serde(default)]
    search_results: Vec<RawSearchEntry>,
}

/// Resolve a query into at most [`MAX_RESULTS`] identities, unique by membership id.
///
/// Provider failures are returned unchanged; the caller decides how to present them.
pub async fn resolve_identities(
    client: &UpstreamClient,
    query: &str,
) -> Result<Vec<CanonicalIdentity>, AppError> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Ok(Vec::new());
    }

    let identities = if query.contains('#') {
        let Some((name, code)) = parse_bungie_name(query) else {
            return Ok(Vec::new());
        };
        exact_name_lookup(client, name, code).await?
    } else {
        prefix_search(client, query).await?
    };

    Ok(dedupe_and_truncate(identities))
}

/// Split `Name#Code` into its parts; `None` when the name is empty or the code is not a number.
pub fn parse_bungie_name(query: &str) -> Option<(&str, u32)> {
    let mut parts = query.split('#');
    let name = parts.next()?.trim();
    let code = parts.next()?.trim().parse::<u32>().ok()?;

    if name.is_empty() {
        return None;
    }
    Some((name, code))
}

async fn exact_name_lookup(
    client: &UpstreamClient,
    name: &str,
    code: u32,
) -> Result<Vec<CanonicalIdentity>, AppError> {
    let body = json!({ "displayName": name, "displayNameCode": code });
    let players: Vec<ExactPlayerRecord> = client
        .fetch_envelope(EXACT_NAME_PATH, Method::POST, Some(&body))
        .await?;

    Ok(players
        .into_iter()
        .filter_map(|p| {
            Some(CanonicalIdentity {
                display_name: format_display_name(
                    &p.bungie_global_display_name,
                    p.bungie_global_display_name_code,
                ),
                membership_type: p.membership_type?,
                membership_id: p.membership_id?,
            })
        })
        .collect())
}

async fn prefix_search(
    client: &UpstreamClient,
    prefix: &str,
) -> Result<Vec<CanonicalIdentity>, AppError> {
    let body = json!({ "displayNamePrefix": prefix });
    let response: PrefixSearchResponse = client
        .fetch_envelope(PREFIX_SEARCH_PATH, Method::POST, Some(&body))
        .await?;

    Ok(response
        .search_results
        .iter()
        .filter_map(canonical_from_entry)
        .collect())
}

/// Collapse a search entry to its representative account, if it has one.
pub fn canonical_from_entry(entry: &RawSearchEntry) -> Option<CanonicalIdentity> {
    let link = pick_membership(&entry.destiny_memberships)?;
    Some(CanonicalIdentity {
        display_name: format_display_name(
            &entry.bungie_global_display_name,
            entry.bungie_global_display_name_code,
        ),
        membership_type: link.membership_type?,
        membership_id: link.membership_id.clone()?,
    })
}

/// Choose the link representing a cross-save account.
///
/// Order: the cross-save primary, then a link whose override names its own platform,
/// then the preferred platform, then the first link.
pub fn pick_membership(links: &[MembershipLink]) -> Option<&MembershipLink> {
    links
        .iter()
        .find(|m| m.is_cross_save_primary)
        .or_else(|| {
            links.iter().find(|m| {
                matches!((m.cross_save_override, m.membership_type), (Some(o), Some(t)) if o == t)
            })
        })
        .or_else(|| {
            links
                .iter()
                .find(|m| m.membership_type == Some(PREFERRED_MEMBERSHIP_TYPE))
        })
        .or_else(|| links.first())
}

/// Keep provider order, one entry per membership id; a repeated id keeps its first
/// position but takes the later value.
pub fn dedupe_and_truncate(identities: Vec<CanonicalIdentity>) -> Vec<CanonicalIdentity> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<CanonicalIdentity> = Vec::with_capacity(identities.len());

    for identity in identities {
        match positions.get(&identity.membership_id) {
            Some(&index) => unique[index] = identity,
            None => {
                positions.insert(identity.membership_id.clone(), unique.len());
                unique.push(identity);
            }
        }
    }

    unique.truncate(MAX_RESULTS);
    unique
}

fn format_display_name(name: &str, code: Option<u32>) -> String {
    match code {
        Some(code) => format!("{}#{:04}", name, code),
        None => name.to_string(),
    }
}
