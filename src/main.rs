//! Guardian Ledger Backend
//!
//! A REST proxy in front of the Destiny 2 stats provider, with SQLite persistence for
//! trials state, display badges, site settings and login sessions.

mod api;
mod auth;
mod badge_store;
mod config;
mod db;
mod emblem;
mod errors;
mod identity;
mod maps;
mod models;
mod upstream;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::AdminGuard;
use badge_store::BadgeAssignmentStore;
use config::Config;
use db::Repository;
use emblem::EmblemCache;
use maps::MapCatalog;
use upstream::UpstreamClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub upstream: Arc<UpstreamClient>,
    pub emblems: Arc<EmblemCache>,
    pub maps: Arc<MapCatalog>,
    pub badge_store: Arc<BadgeAssignmentStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Guardian Ledger Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Badge store path: {:?}", config.user_badges_path);
    tracing::info!("Provider: {}", config.bungie_base_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.bungie_api_key.is_none() {
        tracing::warn!("No provider API key configured (BUNGIE_API_KEY). Proxy routes will fail!");
    }
    if config.admin_token.is_none() {
        tracing::warn!("No admin token configured (ADMIN_TOKEN). Only admin sessions can write!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let purged = repo.purge_expired_sessions().await?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let upstream = Arc::new(UpstreamClient::from_config(&config)?);

    // Create application state
    let state = AppState {
        repo,
        upstream,
        emblems: Arc::new(EmblemCache::new()),
        maps: Arc::new(MapCatalog::new(&config.maps_cache_path)),
        badge_store: Arc::new(BadgeAssignmentStore::new(&config.user_badges_path)),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guard = AdminGuard {
        admin_token: state.config.admin_token.clone(),
        repo: state.repo.clone(),
    };

    // Admin routes
    let admin_routes = Router::new()
        .route("/trials", post(api::append_trials))
        .route("/badges", post(api::create_badge))
        .route("/settings", post(api::update_settings))
        .route(
            "/user-badges",
            get(api::admin_get_user_badges).post(api::admin_set_user_badges),
        )
        // Apply admin auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(guard.clone(), req, next)
        }))
        // Login and logout sit outside the guard
        .route("/login", post(api::admin_login))
        .route("/logout", post(api::admin_logout));

    // Public API routes
    let api_routes = Router::new()
        // Player search
        .route(
            "/search",
            get(api::search_players_get).post(api::search_players_post),
        )
        // Profile
        .route("/profile", get(api::get_profile))
        .route("/comp", get(api::get_comp))
        .route("/emblem", get(api::get_emblem))
        // Trials
        .route("/trials", get(api::get_current_trials))
        .route("/trials/history", get(api::list_trials_history))
        .route("/maps", get(api::list_maps))
        // Badges
        .route("/badges", get(api::list_recent_badges))
        .route("/players/{name}/badges", get(api::list_player_badges))
        .route("/user-badges/{membership_id}", get(api::get_user_badges))
        // Settings
        .route("/settings", get(api::list_settings))
        .route("/settings/{key}", get(api::get_setting))
        // Login
        .route("/auth/login", get(api::oauth_login))
        .route("/auth/callback", get(api::oauth_callback))
        .route("/auth/logout", post(api::oauth_logout))
        .route("/auth/me", get(api::current_user))
        .nest("/admin", admin_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
