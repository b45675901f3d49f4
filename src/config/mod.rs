//! Configuration module for the Guardian Ledger backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default origin of the stats provider.
pub const DEFAULT_BUNGIE_BASE_URL: &str = "https://www.bungie.net";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key sent with every upstream request
    pub bungie_api_key: Option<String>,
    /// Provider origin, used for platform calls and asset URLs
    pub bungie_base_url: String,
    /// OAuth application id
    pub oauth_client_id: Option<String>,
    /// OAuth application secret
    pub oauth_client_secret: Option<String>,
    /// OAuth redirect target registered with the provider
    pub oauth_redirect_uri: Option<String>,
    /// Shared admin secret (admin area is closed when unset)
    pub admin_token: Option<String>,
    /// Membership ids whose login sessions carry admin rights
    pub admin_membership_ids: Vec<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to the badge assignment document
    pub user_badges_path: PathBuf,
    /// Path to the cached PvP map catalog
    pub maps_cache_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Mark cookies as Secure
    pub secure_cookies: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bungie_api_key = non_empty_var("BUNGIE_API_KEY");

        let bungie_base_url = non_empty_var("BUNGIE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BUNGIE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let admin_membership_ids = env::var("ADMIN_MEMBERSHIP_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        let db_path = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "./data/app.db".to_string())
            .into();

        let user_badges_path = env::var("USER_BADGES_PATH")
            .unwrap_or_else(|_| "./data/userBadges.json".to_string())
            .into();

        let maps_cache_path = env::var("PVP_MAPS_PATH")
            .unwrap_or_else(|_| "./data/manifest_pvp_maps.json".to_string())
            .into();

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid BIND_ADDR format");

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let secure_cookies = env::var("COOKIE_SECURE")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            bungie_api_key,
            bungie_base_url,
            oauth_client_id: non_empty_var("BUNGIE_CLIENT_ID"),
            oauth_client_secret: non_empty_var("BUNGIE_CLIENT_SECRET"),
            oauth_redirect_uri: non_empty_var("BUNGIE_REDIRECT_URI"),
            admin_token: non_empty_var("ADMIN_TOKEN"),
            admin_membership_ids,
            db_path,
            user_badges_path,
            maps_cache_path,
            bind_addr,
            log_level,
            secure_cookies,
        }
    }

    /// Whether a logged-in account is granted admin rights.
    pub fn is_admin_membership(&self, membership_id: &str) -> bool {
        self.admin_membership_ids.iter().any(|id| id == membership_id)
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "BUNGIE_API_KEY",
            "BUNGIE_BASE_URL",
            "BUNGIE_CLIENT_ID",
            "BUNGIE_CLIENT_SECRET",
            "BUNGIE_REDIRECT_URI",
            "ADMIN_TOKEN",
            "ADMIN_MEMBERSHIP_IDS",
            "SQLITE_PATH",
            "USER_BADGES_PATH",
            "PVP_MAPS_PATH",
            "BIND_ADDR",
            "LOG_LEVEL",
            "COOKIE_SECURE",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env();

        assert!(config.bungie_api_key.is_none());
        assert!(config.admin_token.is_none());
        assert!(config.admin_membership_ids.is_empty());
        assert_eq!(config.bungie_base_url, DEFAULT_BUNGIE_BASE_URL);
        assert_eq!(config.db_path, PathBuf::from("./data/app.db"));
        assert_eq!(
            config.user_badges_path,
            PathBuf::from("./data/userBadges.json")
        );
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.secure_cookies);
    }

    #[test]
    fn test_is_admin_membership() {
        let mut config = test_config();
        config.admin_membership_ids = vec!["4611686018400000001".to_string()];

        assert!(config.is_admin_membership("4611686018400000001"));
        assert!(!config.is_admin_membership("4611686018400000002"));
    }

    fn test_config() -> Config {
        Config {
            bungie_api_key: None,
            bungie_base_url: DEFAULT_BUNGIE_BASE_URL.to_string(),
            oauth_client_id: None,
            oauth_client_secret: None,
            oauth_redirect_uri: None,
            admin_token: None,
            admin_membership_ids: Vec::new(),
            db_path: PathBuf::from("./data/app.db"),
            user_badges_path: PathBuf::from("./data/userBadges.json"),
            maps_cache_path: PathBuf::from("./data/manifest_pvp_maps.json"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            secure_cookies: false,
        }
    }
}
