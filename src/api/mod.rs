//! HTTP facade over the orchestrator and the catalog.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST   | `/upload` | ingest + convert one file (multipart `heicFile`, `format`) |
//! | GET    | `/convert-all?format=` | convert the whole inbox |
//! | GET    | `/converted-files` | list artifacts |
//! | DELETE | `/clear` | delete every source and artifact |
//! | GET    | `/jobs`, `/jobs/{id}` | job table |
//! | POST   | `/jobs/{id}/retry` | retry a failed job |
//! | DELETE | `/jobs/{id}` | remove a job's files |
//! | GET    | `/session` | reconciled client view |
//! | GET    | `/health` | liveness |
//! | GET    | `<public_prefix>/<name>` | artifact download |

pub mod handlers;
pub mod response;

use crate::catalog::ArtifactCatalog;
use crate::config::ServiceConfig;
use crate::convert::Orchestrator;
use crate::error::HeicError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub catalog: ArtifactCatalog,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let catalog = ArtifactCatalog::new(orchestrator.storage().clone());
        Self {
            orchestrator,
            catalog,
        }
    }

    /// Build the orchestrator for `config` and make sure its directories exist.
    pub async fn from_config(config: ServiceConfig) -> Result<Self, HeicError> {
        let orchestrator = Orchestrator::new(config);
        orchestrator.storage().ensure_directories().await?;
        Ok(Self::new(Arc::new(orchestrator)))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.orchestrator.config();
    let prefix = config.public_prefix.trim_end_matches('/').to_string();
    let outbox = state.orchestrator.storage().outbox_dir().to_path_buf();
    let public_dir = config.public_dir.clone();
    let body_limit = config.max_upload_bytes;

    let mut app = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/convert-all", get(handlers::convert_all))
        .route("/converted-files", get(handlers::converted_files))
        .route("/clear", delete(handlers::clear))
        .route("/jobs", get(handlers::list_jobs))
        .route(
            "/jobs/{id}",
            get(handlers::get_job).delete(handlers::remove_job),
        )
        .route("/jobs/{id}/retry", post(handlers::retry_job))
        .route("/session", get(handlers::session))
        .route("/health", get(handlers::health))
        .nest_service(&prefix, ServeDir::new(outbox));

    if let Some(dir) = public_dir {
        let index = dir.join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `addr` until Ctrl+C or SIGTERM.
pub async fn serve(config: ServiceConfig, addr: SocketAddr) -> Result<(), HeicError> {
    let state = AppState::from_config(config).await?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| HeicError::Internal(format!("Failed to bind {addr}: {e}")))?;

    let storage = state.orchestrator.storage();
    info!(
        %addr,
        inbox = %storage.inbox_dir().display(),
        outbox = %storage.outbox_dir().display(),
        converter = state.orchestrator.converter().name(),
        "Listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HeicError::Internal(format!("Server error: {e}")))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
