//! CyferTrace Scan API Server

mod auth;
mod db;
mod error;
mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use ct_core::ScanManager;
use ct_tools::ToolConfig;
use db::PgScanStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers
pub struct AppState {
    pub manager: ScanManager,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub checkov_path: Option<String>,
    pub tool_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/cyfertrace".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            max_connections: 10,
            checkov_path: None,
            tool_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_connections: defaults.max_connections,
            checkov_path: lookup("CHECKOV_PATH").filter(|p| !p.is_empty()),
            tool_timeout_secs: lookup("TOOL_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tool_timeout_secs),
        }
    }

    pub fn tool_config(&self) -> ToolConfig {
        let config = ToolConfig::default().with_timeout(self.tool_timeout_secs);
        match &self.checkov_path {
            Some(path) => config.with_tool_path("checkov", path),
            None => config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(routes::health_check))

        // Scans
        .route("/api/scan/was", post(routes::scans::create_was_scan))
        .route("/api/scan/iac", post(routes::scans::create_iac_scan))
        .route("/api/scan/:id/status", get(routes::scans::get_scan_status))
        .route("/api/scans", get(routes::scans::list_scans))

        // Reports
        .route("/api/scan/:id/report/:format", get(routes::reports::download_report))

        // Admin
        .route("/api/admin/stats", get(routes::admin::get_stats))

        // CORS
        .layer(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any))

        // Tracing
        .layer(TraceLayer::new_for_http())

        // State
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ct_api=debug,ct_core=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CyferTrace Scan API Server");

    let config = AppConfig::from_env();

    let store = PgScanStore::connect(&config.database_url, config.max_connections).await?;
    let manager = ScanManager::with_default_scanners(Arc::new(store), config.tool_config()).await;

    let state = Arc::new(AppState { manager });
    let app = router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
