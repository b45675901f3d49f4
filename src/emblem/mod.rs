//! Emblem asset resolution with a process-lifetime memo table.
//!
//! One [`EmblemCache`] is built at startup and shared through the application state.

use std::collections::HashMap;

use reqwest::Method;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::EmblemResolution;
use crate::upstream::UpstreamClient;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayProperties {
    #[serde(default)]
    icon: Option<String>,
}

/// The parts of an inventory item definition used for emblem art.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDefinition {
    #[serde(default)]
    display_properties: DisplayProperties,
    #[serde(default)]
    secondary_special: Option<String>,
}

/// Memoized hash-to-assets table. Entries are never evicted.
#[derive(Default)]
pub struct EmblemCache {
    entries: RwLock<HashMap<i64, EmblemResolution>>,
}

impl EmblemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the icon and background URLs for an emblem hash.
    ///
    /// Absent or non-positive hashes resolve to all-null without touching the table or the
    /// provider. Two concurrent misses for the same hash may both fetch; the value is
    /// deterministic, so whichever insert lands last is equivalent.
    pub async fn resolve(
        &self,
        client: &UpstreamClient,
        hash: Option<i64>,
    ) -> Result<EmblemResolution, AppError> {
        let Some(hash) = hash.filter(|h| *h > 0) else {
            return Ok(EmblemResolution::default());
        };

        if let Some(hit) = self.entries.read().await.get(&hash) {
            return Ok(hit.clone());
        }

        let path = format!("/Destiny2/Manifest/DestinyInventoryItemDefinition/{}/", hash);
        let definition: ItemDefinition = client.fetch_envelope(&path, Method::GET, None).await?;

        let resolution = EmblemResolution {
            source_hash: Some(hash),
            icon_url: definition
                .display_properties
                .icon
                .filter(|p| !p.is_empty())
                .map(|p| client.asset_url(&p)),
            background_url: definition
                .secondary_special
                .filter(|p| !p.is_empty())
                .map(|p| client.asset_url(&p)),
        };

        self.entries.write().await.insert(hash, resolution.clone());
        let cached = self.len().await;
        tracing::debug!(hash, cached, "Emblem resolved");

        Ok(resolution)
    }

    /// Number of memoized hashes.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Parse an emblem hash from untrusted text. Anything that is not a finite positive
/// number becomes `None`.
pub fn parse_emblem_hash(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(hash) = raw.parse::<i64>() {
        return Some(hash).filter(|h| *h > 0);
    }

    let value = raw.parse::<f64>().ok()?;
    if !value.is_finite() || value <= 0.0 || value.fract() != 0.0 || value > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}
