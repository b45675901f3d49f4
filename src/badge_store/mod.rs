//! Per-account badge assignments kept in a single JSON document.
//!
//! Writes replace the whole document through a temp file and a rename, so readers see
//! either the old or the new document. Two writers racing on different accounts can
//! still lose one update: the last rename wins for the whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use crate::errors::AppError;
use crate::models::{BadgeKey, UserBadgeAssignment};

type Document = BTreeMap<String, UserBadgeAssignment>;

pub struct BadgeAssignmentStore {
    path: PathBuf,
}

impl BadgeAssignmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Badges assigned to an account; empty when it has no record.
    pub async fn get_assigned_badges(
        &self,
        membership_id: &str,
    ) -> Result<Vec<BadgeKey>, AppError> {
        let document = self.read_document().await?;
        Ok(document
            .get(membership_id)
            .map(|entry| entry.badges.clone())
            .unwrap_or_default())
    }

    /// Replace an account's badges with the valid, de-duplicated subset of `raw_badges`.
    pub async fn set_assigned_badges(
        &self,
        membership_id: &str,
        raw_badges: &Value,
        updated_by: &str,
    ) -> Result<UserBadgeAssignment, AppError> {
        let membership_id = membership_id.trim();
        if membership_id.is_empty() {
            return Err(AppError::Validation("membershipId is required".to_string()));
        }

        let mut document = self.read_document().await?;
        let updated_by = updated_by.trim();

        let entry = UserBadgeAssignment {
            badges: sanitize_badges(raw_badges),
            updated_at: crate::db::now_timestamp(),
            updated_by: if updated_by.is_empty() {
                "unknown".to_string()
            } else {
                updated_by.to_string()
            },
        };
        document.insert(membership_id.to_string(), entry.clone());

        self.write_document(&document).await?;
        tracing::info!(
            membership_id,
            badges = entry.badges.len(),
            updated_by = %entry.updated_by,
            "Badge assignment replaced"
        );

        Ok(entry)
    }

    async fn read_document(&self) -> Result<Document, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Document::new());
        }

        // Only an unparseable file is quarantined; odd entries are decoded leniently.
        match serde_json::from_str::<Map<String, Value>>(trimmed) {
            Ok(entries) => Ok(entries
                .iter()
                .map(|(id, entry)| (id.clone(), decode_entry(entry)))
                .collect()),
            Err(e) => {
                self.quarantine(&raw, &e).await?;
                Ok(Document::new())
            }
        }
    }

    /// Keep an unreadable document beside the live path and reset the live one.
    async fn quarantine(&self, raw: &str, cause: &serde_json::Error) -> Result<(), AppError> {
        let backup = sibling_path(
            &self.path,
            &format!("corrupt-{}", chrono::Utc::now().timestamp_millis()),
        );
        tracing::warn!(
            "Badge store {:?} is unreadable ({}); moved aside to {:?}",
            self.path(),
            cause,
            backup
        );

        tokio::fs::write(&backup, raw).await?;
        self.write_document(&Document::new()).await
    }

    async fn write_document(&self, document: &Document) -> Result<(), AppError> {
        let tmp = self.stage_document(document).await?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// Write the full document to a fresh temp file beside the live path.
    async fn stage_document(&self, document: &Document) -> Result<PathBuf, AppError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = temp_sibling_path(&self.path);
        let bytes = serde_json::to_vec_pretty(document)?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        Ok(tmp)
    }
}

/// Read one stored entry, tolerating missing fields and retired badge keys.
fn decode_entry(entry: &Value) -> UserBadgeAssignment {
    let text = |field: &str| entry.get(field).and_then(Value::as_str).map(str::to_string);

    UserBadgeAssignment {
        badges: sanitize_badges(entry.get("badges").unwrap_or(&Value::Null)),
        updated_at: text("updatedAt").unwrap_or_default(),
        updated_by: text("updatedBy").unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Keep string entries naming a known badge, first occurrence wins.
pub fn sanitize_badges(raw: &Value) -> Vec<BadgeKey> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    let mut badges = Vec::new();
    for key in entries.iter().filter_map(Value::as_str).filter_map(BadgeKey::from_str) {
        if !badges.contains(&key) {
            badges.push(key);
        }
    }
    badges
}

/// `<path>.<suffix>` next to `path`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// A temp path next to `path`, unique per process and call.
pub fn temp_sibling_path(path: &Path) -> PathBuf {
    sibling_path(
        path,
        &format!("tmp-{}-{}", std::process::id(), uuid::Uuid::new_v4().simple()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> BadgeAssignmentStore {
        BadgeAssignmentStore::new(dir.path().join("data").join("userBadges.json"))
    }

    #[test]
    fn test_sanitize_filters_and_dedupes() {
        let raw = json!(["developer", "bogus_key", "developer", 7, null, "verified"]);
        assert_eq!(
            sanitize_badges(&raw),
            vec![BadgeKey::Developer, BadgeKey::Verified]
        );
        assert!(sanitize_badges(&json!("developer")).is_empty());
        assert!(sanitize_badges(&Value::Null).is_empty());
    }

    #[tokio::test]
    async fn test_missing_document_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.get_assigned_badges("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_persists_sanitized_set() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let entry = store
            .set_assigned_badges("1", &json!(["developer", "bogus_key", "developer"]), "admin")
            .await
            .unwrap();
        assert_eq!(entry.badges, vec![BadgeKey::Developer]);
        assert_eq!(entry.updated_by, "admin");

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get_assigned_badges("1").await.unwrap(),
            vec![BadgeKey::Developer]
        );

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["1"]["badges"], json!(["developer"]));
        assert_eq!(on_disk["1"]["updatedBy"], "admin");
    }

    #[tokio::test]
    async fn test_set_replaces_rather_than_merges() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .set_assigned_badges("1", &json!(["developer", "advisor"]), "admin")
            .await
            .unwrap();
        store
            .set_assigned_badges("1", &json!(["moderator"]), "")
            .await
            .unwrap();
        store
            .set_assigned_badges("2", &json!(["verified"]), "admin")
            .await
            .unwrap();

        assert_eq!(
            store.get_assigned_badges("1").await.unwrap(),
            vec![BadgeKey::Moderator]
        );
        assert_eq!(
            store.get_assigned_badges("2").await.unwrap(),
            vec![BadgeKey::Verified]
        );
    }

    #[tokio::test]
    async fn test_blank_updated_by_becomes_unknown() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let entry = store
            .set_assigned_badges("1", &json!([]), "  ")
            .await
            .unwrap();
        assert_eq!(entry.updated_by, "unknown");
        assert!(entry.badges.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.get_assigned_badges("1").await.unwrap().is_empty());

        let live = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&live).unwrap(), json!({}));

        let backups: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            std::fs::read_to_string(backups[0].path()).unwrap(),
            "{ not json"
        );
    }

    fn temp_files(store: &BadgeAssignmentStore) -> Vec<PathBuf> {
        std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .map(|e| e.path())
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_keys_do_not_wipe_other_accounts() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{
                "1": {
                    "badges": ["developer"],
                    "updatedAt": "2024-01-01T00:00:00Z",
                    "updatedBy": "admin"
                },
                "2": { "badges": ["legend", "verified"] }
            }"#,
        )
        .unwrap();

        assert_eq!(
            store.get_assigned_badges("1").await.unwrap(),
            vec![BadgeKey::Developer]
        );
        assert_eq!(
            store.get_assigned_badges("2").await.unwrap(),
            vec![BadgeKey::Verified]
        );

        // Valid JSON is never quarantined.
        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["1"]["badges"], json!(["developer"]));
        let backups = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(backups, 0);

        // A later write keeps the other account.
        store
            .set_assigned_badges("3", &json!(["advisor"]), "admin")
            .await
            .unwrap();
        assert_eq!(
            store.get_assigned_badges("1").await.unwrap(),
            vec![BadgeKey::Developer]
        );
    }

    #[tokio::test]
    async fn test_crash_before_rename_keeps_prior_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .set_assigned_badges("1", &json!(["advisor"]), "admin")
            .await
            .unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        // Run the real write up to the point a crash would cut it off.
        let mut next = store.read_document().await.unwrap();
        next.insert(
            "1".to_string(),
            UserBadgeAssignment {
                badges: vec![BadgeKey::Developer],
                updated_at: crate::db::now_timestamp(),
                updated_by: "admin".to_string(),
            },
        );
        let staged = store.stage_document(&next).await.unwrap();

        assert_ne!(staged, store.path());
        assert!(std::fs::read_to_string(&staged).unwrap().contains("developer"));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);

        let reloaded = store_in(&dir);
        assert_eq!(
            reloaded.get_assigned_badges("1").await.unwrap(),
            vec![BadgeKey::Advisor]
        );
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        // A directory in the live spot makes the final rename fail.
        std::fs::create_dir_all(store.path()).unwrap();

        let result = store.write_document(&Document::new()).await;

        assert!(result.is_err());
        assert!(store.path().is_dir());
        assert!(temp_files(&store).is_empty());
    }

    #[tokio::test]
    async fn test_successful_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .set_assigned_badges("1", &json!(["moderator"]), "admin")
            .await
            .unwrap();
        assert!(temp_files(&store).is_empty());
    }

    #[test]
    fn test_sibling_path() {
        let path = Path::new("/data/userBadges.json");
        assert_eq!(
            sibling_path(path, "tmp-1-x"),
            PathBuf::from("/data/userBadges.json.tmp-1-x")
        );
        assert_ne!(temp_sibling_path(path), temp_sibling_path(path));
    }
}
