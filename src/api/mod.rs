//! HTTP API server for the voice orchestrator

pub mod health;
pub mod rate_limit;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, header};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::ServerConfig;
use crate::orchestrator::VoiceOrchestrator;

/// Default request body limit (10 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<VoiceOrchestrator>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    orchestrator: Arc<VoiceOrchestrator>,
    port: u16,
    static_dir: Option<PathBuf>,
    rate_limit_rpm: Option<u32>,
    body_limit: usize,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(orchestrator: Arc<VoiceOrchestrator>, port: u16) -> Self {
        Self {
            orchestrator,
            port,
            static_dir: None,
            rate_limit_rpm: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Apply the `[server]` settings
    #[must_use]
    pub fn server_config(mut self, config: &ServerConfig) -> Self {
        self.port = config.port;
        self.static_dir.clone_from(&config.static_dir);
        self.rate_limit_rpm = config.rate_limit_rpm;
        self.body_limit = config.body_limit_bytes;
        self
    }

    /// Override the listening port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the static files directory for serving a web frontend
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Limit all requests to `rpm` per minute
    #[must_use]
    pub const fn rate_limit(mut self, rpm: Option<u32>) -> Self {
        self.rate_limit_rpm = rpm;
        self
    }

    /// Set the maximum accepted request body size in bytes
    #[must_use]
    pub const fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.rate_limit_rpm.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            orchestrator: self.orchestrator,
            rate_limiter,
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
            body_limit: self.body_limit,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
    body_limit: usize,
}

impl ApiServer {
    /// Build the router with all routes and layers
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(voice::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let router = router
            .layer(DefaultBodyLimit::max(self.body_limit))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::rate_limit_middleware,
            ));

        router.layer(cors_layer()).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            store = self.state.orchestrator.store_backend(),
            rate_limited = self.state.rate_limiter.is_some(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Permissive CORS for browser recorders
///
/// Any `OPTIONS` request is answered here with an empty 200 body.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}
