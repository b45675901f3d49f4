//! PvP map catalog built from the provider's activity definitions.
//!
//! The filtered catalog is small, so it is written once to disk and then served from
//! memory.

use std::path::{Path, PathBuf};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::badge_store::temp_sibling_path;
use crate::errors::AppError;
use crate::models::{PvpMap, ResolvedMap};
use crate::upstream::UpstreamClient;

/// Maximum number of maps returned by a search.
pub const MAX_SEARCH_RESULTS: usize = 20;

pub struct MapCatalog {
    path: PathBuf,
    maps: RwLock<Option<Vec<PvpMap>>>,
}

impl MapCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            maps: RwLock::new(None),
        }
    }

    /// All maps sorted by name.
    pub async fn list(&self, client: &UpstreamClient) -> Result<Vec<PvpMap>, AppError> {
        if let Some(maps) = self.maps.read().await.as_ref() {
            return Ok(maps.clone());
        }

        let mut maps = match read_cached(&self.path).await? {
            Some(maps) => maps,
            None => {
                let maps = download_pvp_maps(client).await?;
                write_cached(&self.path, &maps).await?;
                tracing::info!("Cached {} PvP maps at {:?}", maps.len(), self.path);
                maps
            }
        };
        maps.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        *self.maps.write().await = Some(maps.clone());
        Ok(maps)
    }

    /// Case-insensitive substring search; a blank query returns the first maps.
    pub async fn search(
        &self,
        client: &UpstreamClient,
        query: &str,
    ) -> Result<Vec<PvpMap>, AppError> {
        let maps = self.list(client).await?;
        let query = query.trim().to_lowercase();

        Ok(maps
            .into_iter()
            .filter(|m| query.is_empty() || m.name.to_lowercase().contains(&query))
            .take(MAX_SEARCH_RESULTS)
            .collect())
    }

    /// Exact, case-insensitive name lookup.
    pub async fn find_by_name(
        &self,
        client: &UpstreamClient,
        name: &str,
    ) -> Result<ResolvedMap, AppError> {
        let wanted = name.trim().to_lowercase();
        let maps = self.list(client).await?;

        let found = maps
            .into_iter()
            .find(|m| m.name.to_lowercase() == wanted)
            .ok_or_else(|| AppError::NotFound(format!("PvP map not found: {}", name.trim())))?;

        Ok(ResolvedMap {
            map_image_url: found.icon.as_deref().map(|icon| client.asset_url(icon)),
            map_name: found.name,
            map_hash: found.hash,
        })
    }
}

async fn read_cached(path: &Path) -> Result<Option<Vec<PvpMap>>, AppError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(maps) => Ok(Some(maps)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable map cache {:?}: {}", path, e);
            Ok(None)
        }
    }
}

async fn write_cached(path: &Path, maps: &[PvpMap]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_sibling_path(path);
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(maps)?).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

async fn download_pvp_maps(client: &UpstreamClient) -> Result<Vec<PvpMap>, AppError> {
    let manifest: Value = client
        .fetch_envelope("/Destiny2/Manifest/", Method::GET, None)
        .await?;

    let activity_path = manifest
        .pointer("/jsonWorldComponentContentPaths/en/DestinyActivityDefinition")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::Internal("Manifest has no DestinyActivityDefinition path".to_string())
        })?;

    let activities = client.fetch_json(&client.asset_url(activity_path)).await?;
    Ok(pvp_maps_from_activities(&activities))
}

/// Keep PvP activities that have both a name and an icon.
pub fn pvp_maps_from_activities(activities: &Value) -> Vec<PvpMap> {
    let Some(entries) = activities.as_object() else {
        return Vec::new();
    };

    entries
        .values()
        .filter(|act| act.get("isPvP").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|act| {
            let display = act.get("displayProperties")?;
            let name = display.get("name").and_then(Value::as_str)?;
            let icon = display.get("icon").and_then(Value::as_str)?;
            if name.is_empty() || icon.is_empty() {
                return None;
            }
            Some(PvpMap {
                hash: act.get("hash").and_then(Value::as_i64)?,
                name: name.to_string(),
                icon: Some(icon.to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_filters_pvp_activities() {
        let activities = json!({
            "1": { "hash": 1, "isPvP": true,
                   "displayProperties": { "name": "Javelin-4", "icon": "/img/javelin.png" } },
            "2": { "hash": 2, "isPvP": false,
                   "displayProperties": { "name": "Strike", "icon": "/img/strike.png" } },
            "3": { "hash": 3, "isPvP": true,
                   "displayProperties": { "name": "", "icon": "/img/blank.png" } },
            "4": { "hash": 4, "isPvP": true,
                   "displayProperties": { "name": "Endless Vale" } }
        });

        let maps = pvp_maps_from_activities(&activities);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].name, "Javelin-4");
        assert_eq!(maps[0].hash, 1);
    }

    #[tokio::test]
    async fn test_reads_existing_cache_without_network() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("maps.json");
        let cached = vec![
            PvpMap {
                hash: 2,
                name: "Widow's Court".into(),
                icon: Some("/img/w.png".into()),
            },
            PvpMap {
                hash: 1,
                name: "Burnout".into(),
                icon: Some("/img/b.png".into()),
            },
        ];
        std::fs::write(&path, serde_json::to_string(&cached).unwrap()).unwrap();

        // No API key: a network attempt would fail with a configuration error.
        let client = UpstreamClient::new("https://www.bungie.net", None).unwrap();
        let catalog = MapCatalog::new(&path);

        let maps = catalog.list(&client).await.unwrap();
        assert_eq!(maps[0].name, "Burnout");
        assert_eq!(maps[1].name, "Widow's Court");

        let found = catalog.find_by_name(&client, "  widow's COURT ").await.unwrap();
        assert_eq!(found.map_hash, 2);
        assert_eq!(
            found.map_image_url.as_deref(),
            Some("https://www.bungie.net/img/w.png")
        );

        let missing = catalog.find_by_name(&client, "Twilight Gap").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let hits = catalog.search(&client, "BURN").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(catalog.search(&client, "").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_cache_writes_both_succeed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("maps.json");
        let maps = vec![PvpMap {
            hash: 1,
            name: "Burnout".into(),
            icon: Some("/img/b.png".into()),
        }];

        let (first, second) = tokio::join!(write_cached(&path, &maps), write_cached(&path, &maps));
        first.unwrap();
        second.unwrap();

        let stored: Vec<PvpMap> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, maps);

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
