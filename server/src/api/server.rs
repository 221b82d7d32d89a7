//! API server initialization

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::routes::health;
use super::routes::shell::{self, ShellState};
use super::routes::tables::{self, TablesApiState};
use crate::core::CoreApp;
use crate::core::config::RewriteConfig;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::domain::table::TableRegistry;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Serve until the shutdown signal fires
    pub async fn start(self) -> Result<()> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(
            host.parse::<IpAddr>()
                .with_context(|| format!("Invalid server host: {}", host))?,
            port,
        );

        let router = router(app.registry.clone(), &app.config.rewrite, &allowed_origins);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(%addr, "Listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(app.shutdown.wait())
            .await?;

        Ok(())
    }
}

/// Build the application router
///
/// The path rewrite wraps the routed application from the outside so the
/// rewritten URI is what gets routed.
pub fn router(
    registry: Arc<TableRegistry>,
    rewrite: &RewriteConfig,
    allowed_origins: &AllowedOrigins,
) -> Router {
    let shell_routes = Router::new()
        .route("/", get(shell::shell))
        .with_state(ShellState {
            param: rewrite.param.clone(),
            registry: registry.clone(),
        });

    let health_routes = Router::new()
        .route("/api/v1/health", get(health::health))
        .with_state(TablesApiState {
            registry: registry.clone(),
        });

    let app = Router::new()
        .merge(shell_routes)
        .merge(health_routes)
        .nest("/api/v1/tables", tables::routes(registry))
        .fallback(middleware::handle_404)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

    Router::new()
        .fallback_service(app)
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(rewrite.clone()),
            middleware::rewrite_app_path,
        ))
        .layer(middleware::cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
