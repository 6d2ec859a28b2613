//! # Stockline API
//!
//! REST server for the Stockline multi-tenant inventory backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Stockline REST API                              │
//! │                                                                         │
//! │   HTTP ──► TraceLayer ──► CorsLayer ──► Router (/api)                  │
//! │                                            │                            │
//! │     ┌──────────┬──────────┬──────────┬─────┴────┬──────────┐           │
//! │     │  auth    │ tenants  │  users   │ products │inventory │           │
//! │     ├──────────┼──────────┼──────────┼──────────┼──────────┤           │
//! │     │  orders  │suppliers │ reports  │dashboard │  health  │           │
//! │     └────┬─────┴──────────┴──────────┴──────────┴──────────┘           │
//! │          │  AuthUser extractor (JWT bearer) + role checks              │
//! │          ▼                                                              │
//! │     services (auth, reports, uploads) ──► stockline-db repositories    │
//! │                                                                         │
//! │   /uploads ──► ServeDir (avatars, generated reports)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ApiConfig`]. Every key can be set in `stockline.toml` or
//! through an environment variable of the same name (`PORT`, `JWT_SECRET`,
//! `DATABASE_URL`, `FRONTEND_URL`, `UPLOAD_DIR`, ...).

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use auth::JwtManager;
pub use config::ApiConfig;
pub use error::ApiError;

use stockline_db::Database;

/// Shared application state.
pub struct AppState {
    /// Database handle
    pub db: Database,

    /// Server configuration
    pub config: ApiConfig,

    /// Token signing and validation
    pub jwt: JwtManager,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let jwt = JwtManager::new(
            &config.jwt_secret,
            config.jwt_access_lifetime_secs,
            config.jwt_refresh_lifetime_secs,
        );

        AppState { db, config, jwt }
    }
}

/// Builds the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/tenants", routes::tenants::router())
        .nest("/users", routes::users::router())
        .nest("/products", routes::products::router())
        .nest("/inventory", routes::inventory::router())
        .nest("/orders", routes::orders::router())
        .nest("/suppliers", routes::suppliers::router())
        .nest("/reports", routes::reports::router())
        .nest("/dashboard", routes::dashboard::router())
        .merge(routes::health::router());

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(cors_layer(&state.config.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(frontend_url = %frontend_url, "Invalid FRONTEND_URL, cross-origin requests disabled");
            layer
        }
    }
}
