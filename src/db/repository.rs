//! Database repository for the metadata tables.
//!
//! Trials state and badges are append-only; settings are upserted in place.

use chrono::{Duration, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    badge_class_priority, Badge, CanonicalIdentity, CreateBadgeRequest, Session, SiteSetting,
    TrialsMeta,
};

/// How long a login session stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Current time as fixed-width RFC 3339 UTC, so text order equals time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== TRIALS OPERATIONS ====================

    /// Record a new trials state. Earlier rows are kept as history.
    pub async fn append_trials_meta(
        &self,
        active: bool,
        map_name: Option<&str>,
        map_hash: Option<i64>,
        map_image_url: Option<&str>,
    ) -> Result<TrialsMeta, AppError> {
        let now = now_timestamp();
        let map_name = non_blank(map_name);
        let map_image_url = non_blank(map_image_url);
        let map_hash = map_hash.filter(|h| *h != 0);

        let result = sqlx::query(
            "INSERT INTO trials_meta (active, map_name, map_hash, map_image, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(active as i32)
        .bind(&map_name)
        .bind(map_hash)
        .bind(&map_image_url)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(TrialsMeta {
            id: result.last_insert_rowid(),
            active,
            map_name,
            map_hash,
            map_image_url,
            updated_at: now,
        })
    }

    /// The newest trials state, by `(updated_at, id)`.
    pub async fn get_current_trials_meta(&self) -> Result<Option<TrialsMeta>, AppError> {
        let row = sqlx::query(
            "SELECT id, active, map_name, map_hash, map_image, updated_at FROM trials_meta ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(trials_from_row))
    }

    /// Trials states, newest first.
    pub async fn list_trials_history(&self, limit: i64) -> Result<Vec<TrialsMeta>, AppError> {
        let rows = sqlx::query(
            "SELECT id, active, map_name, map_hash, map_image, updated_at FROM trials_meta ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trials_from_row).collect())
    }

    // ==================== BADGE OPERATIONS ====================

    /// Add a badge to a player name.
    pub async fn append_badge(&self, request: &CreateBadgeRequest) -> Result<Badge, AppError> {
        let player_name = request.player_name.trim();
        let badge_text = request.badge_text.trim();

        if player_name.is_empty() {
            return Err(AppError::Validation("Player name is required".to_string()));
        }
        if badge_text.is_empty() {
            return Err(AppError::Validation("Badge text is required".to_string()));
        }

        let now = now_timestamp();
        let icon_url = non_blank(request.icon_url.as_deref());
        let color = non_blank(request.color.as_deref());
        let tooltip = non_blank(request.tooltip.as_deref());
        let badge_class = non_blank(request.badge_class.as_deref());

        let result = sqlx::query(
            "INSERT INTO badges (player_name, badge_text, icon_url, color, tooltip, badge_class, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(player_name)
        .bind(badge_text)
        .bind(&icon_url)
        .bind(&color)
        .bind(&tooltip)
        .bind(&badge_class)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Badge {
            id: result.last_insert_rowid(),
            player_name: player_name.to_string(),
            badge_text: badge_text.to_string(),
            icon_url,
            color,
            tooltip,
            badge_class,
            created_at: now,
        })
    }

    /// Badges of one player: by class priority, then oldest first.
    pub async fn list_badges_for_player(
        &self,
        player_name: &str,
    ) -> Result<Vec<Badge>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, player_name, badge_text, icon_url, color, tooltip, badge_class, created_at
               FROM badges
               WHERE player_name = ?
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(player_name.trim())
        .fetch_all(&self.pool)
        .await?;

        let mut badges: Vec<Badge> = rows.iter().map(badge_from_row).collect();
        // Stable: equal classes keep creation order.
        badges.sort_by_key(|b| badge_class_priority(b.badge_class.as_deref()));
        Ok(badges)
    }

    /// Newest badges across all players.
    pub async fn list_recent_badges(&self, limit: i64) -> Result<Vec<Badge>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, player_name, badge_text, icon_url, color, tooltip, badge_class, created_at
               FROM badges
               ORDER BY created_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(badge_from_row).collect())
    }

    // ==================== SETTING OPERATIONS ====================

    /// Get a setting value; `None` when the key is unknown or holds null.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM site_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>("value")))
    }

    /// Insert or overwrite a setting in a single statement.
    pub async fn set_setting(
        &self,
        key: &str,
        value: Option<&str>,
    ) -> Result<SiteSetting, AppError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::Validation("Setting key is required".to_string()));
        }

        let now = now_timestamp();
        sqlx::query(
            r#"INSERT INTO site_settings (key, value, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(key) DO UPDATE
               SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(SiteSetting {
            key: key.to_string(),
            value: value.map(str::to_string),
            updated_at: now,
        })
    }

    /// All settings ordered by key.
    pub async fn list_settings(&self) -> Result<Vec<SiteSetting>, AppError> {
        let rows = sqlx::query("SELECT key, value, updated_at FROM site_settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| SiteSetting {
                key: row.get("key"),
                value: row.get("value"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    // ==================== SESSION OPERATIONS ====================

    /// Open a login session for an identity and return it with its fresh token.
    pub async fn create_session(
        &self,
        identity: &CanonicalIdentity,
        is_admin: bool,
    ) -> Result<Session, AppError> {
        let token = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let created_at = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        let expires_at =
            (now + Duration::days(SESSION_TTL_DAYS)).to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "INSERT INTO sessions (token, membership_id, membership_type, display_name, is_admin, created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(&identity.membership_id)
        .bind(identity.membership_type)
        .bind(&identity.display_name)
        .bind(is_admin as i32)
        .bind(&created_at)
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;

        Ok(Session {
            token,
            membership_id: identity.membership_id.clone(),
            membership_type: identity.membership_type,
            display_name: identity.display_name.clone(),
            is_admin,
            created_at,
            expires_at,
        })
    }

    /// Look up an unexpired session.
    pub async fn get_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let row = sqlx::query(
            "SELECT token, membership_id, membership_type, display_name, is_admin, created_at, expires_at FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(now_timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(session_from_row))
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop sessions past their expiry; returns how many were removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// Helper functions for row conversion

fn trials_from_row(row: &sqlx::sqlite::SqliteRow) -> TrialsMeta {
    let active: i32 = row.get("active");
    TrialsMeta {
        id: row.get("id"),
        active: active != 0,
        map_name: row.get("map_name"),
        map_hash: row.get("map_hash"),
        map_image_url: row.get("map_image"),
        updated_at: row.get("updated_at"),
    }
}

fn badge_from_row(row: &sqlx::sqlite::SqliteRow) -> Badge {
    Badge {
        id: row.get("id"),
        player_name: row.get("player_name"),
        badge_text: row.get("badge_text"),
        icon_url: row.get("icon_url"),
        color: row.get("color"),
        tooltip: row.get("tooltip"),
        badge_class: row.get("badge_class"),
        created_at: row.get("created_at"),
    }
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Session {
    let is_admin: i32 = row.get("is_admin");
    Session {
        token: row.get("token"),
        membership_id: row.get("membership_id"),
        membership_type: row.get("membership_type"),
        display_name: row.get("display_name"),
        is_admin: is_admin != 0,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn test_repo() -> (Repository, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&dir.path().join("test.db"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), dir)
    }

    fn badge(player: &str, text: &str, class: Option<&str>) -> CreateBadgeRequest {
        CreateBadgeRequest {
            player_name: player.to_string(),
            badge_text: text.to_string(),
            badge_class: class.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = now_timestamp();
        assert_eq!(a.len(), "2024-01-01T00:00:00.000000Z".len());
        assert!(a.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_trials_empty_table_has_no_current() {
        let (repo, _dir) = test_repo().await;
        assert!(repo.get_current_trials_meta().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trials_append_is_current_and_history_is_kept() {
        let (repo, _dir) = test_repo().await;

        let first = repo
            .append_trials_meta(true, Some("Javelin-4"), Some(1_234), Some("https://img/j.png"))
            .await
            .unwrap();
        assert_eq!(repo.get_current_trials_meta().await.unwrap(), Some(first.clone()));

        let second = repo
            .append_trials_meta(false, None, None, None)
            .await
            .unwrap();
        let current = repo.get_current_trials_meta().await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert!(!current.active);
        assert!(current.map_name.is_none());

        let history = repo.list_trials_history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1], first);
    }

    #[tokio::test]
    async fn test_trials_blank_fields_stored_as_null() {
        let (repo, _dir) = test_repo().await;
        let row = repo
            .append_trials_meta(true, Some("  "), Some(0), Some(""))
            .await
            .unwrap();
        assert!(row.map_name.is_none());
        assert!(row.map_hash.is_none());
        assert!(row.map_image_url.is_none());
    }

    #[tokio::test]
    async fn test_append_badge_requires_name_and_text() {
        let (repo, _dir) = test_repo().await;

        let missing_name = repo.append_badge(&badge("   ", "Founder", None)).await;
        assert!(matches!(missing_name, Err(AppError::Validation(_))));

        let missing_text = repo.append_badge(&badge("Ghost#0001", " ", None)).await;
        assert!(matches!(missing_text, Err(AppError::Validation(_))));

        assert!(repo.list_recent_badges(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_player_badges_sorted_by_class_then_age() {
        let (repo, _dir) = test_repo().await;
        let player = "Ghost#0001";

        repo.append_badge(&badge(player, "Supporter", Some("supporter"))).await.unwrap();
        repo.append_badge(&badge(player, "Advisor", Some("advisor"))).await.unwrap();
        repo.append_badge(&badge(player, "Early", None)).await.unwrap();
        repo.append_badge(&badge(player, "Dev", Some("dev"))).await.unwrap();
        repo.append_badge(&badge(player, "Partner", Some("partner"))).await.unwrap();
        repo.append_badge(&badge("Other#0002", "Dev", Some("dev"))).await.unwrap();

        let texts: Vec<String> = repo
            .list_badges_for_player(player)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.badge_text)
            .collect();

        assert_eq!(texts, vec!["Dev", "Advisor", "Partner", "Supporter", "Early"]);
    }

    #[tokio::test]
    async fn test_recent_badges_newest_first_and_capped() {
        let (repo, _dir) = test_repo().await;
        for i in 0..5 {
            repo.append_badge(&badge("Ghost#0001", &format!("B{}", i), None))
                .await
                .unwrap();
        }

        let recent = repo.list_recent_badges(3).await.unwrap();
        let texts: Vec<&str> = recent.iter().map(|b| b.badge_text.as_str()).collect();
        assert_eq!(texts, vec!["B4", "B3", "B2"]);
    }

    #[tokio::test]
    async fn test_setting_upsert_overwrites() {
        let (repo, _dir) = test_repo().await;

        assert!(repo.get_setting("app_status").await.unwrap().is_none());

        let first = repo.set_setting("app_status", Some("beta")).await.unwrap();
        let second = repo.set_setting("app_status", Some("live")).await.unwrap();
        assert!(second.updated_at >= first.updated_at);

        assert_eq!(repo.get_setting("app_status").await.unwrap().as_deref(), Some("live"));

        let all = repo.list_settings().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (repo, _dir) = test_repo().await;
        let identity = CanonicalIdentity {
            display_name: "Ghost#0001".to_string(),
            membership_type: 3,
            membership_id: "4611686018400000001".to_string(),
        };

        let session = repo.create_session(&identity, true).await.unwrap();
        let loaded = repo.get_session(&session.token).await.unwrap().unwrap();
        assert_eq!(loaded, session);

        repo.delete_session(&session.token).await.unwrap();
        assert!(repo.get_session(&session.token).await.unwrap().is_none());
        assert!(repo.get_session("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_purged() {
        let (repo, _dir) = test_repo().await;
        sqlx::query(
            "INSERT INTO sessions (token, membership_id, membership_type, display_name, is_admin, created_at, expires_at) VALUES ('old', '1', 3, 'Old#0001', 0, '2020-01-01T00:00:00.000000Z', '2020-01-02T00:00:00.000000Z')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        assert!(repo.get_session("old").await.unwrap().is_none());
        assert_eq!(repo.purge_expired_sessions().await.unwrap(), 1);
    }
}
