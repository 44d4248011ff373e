//! HTTP service: upload a DNG, get a PNG back.
//!
//! ```text
//! client ─▶ upload (store) ─▶ Converter (decode + encode) ─▶ download (serve + delete)
//! ```
//!
//! All per-request files live in [`ServerConfig::upload_dir`] under unique
//! names, so concurrent requests never touch the same path and no locking
//! is needed. The only shared state is the [`CleanupScheduler`].

pub mod cleanup;
pub mod errors;
pub mod handlers;
pub mod pages;
pub mod upload;

use crate::config::ServerConfig;
use crate::convert::Converter;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

pub use cleanup::CleanupScheduler;
pub use errors::ApiError;
pub use handlers::ConvertResponse;
pub use upload::UploadedFile;

/// Room for multipart boundaries and part headers on top of the file limit.
const MULTIPART_SLACK: usize = 64 * 1024;

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub converter: Converter,
    pub cleanup: CleanupScheduler,
}

impl AppState {
    pub fn new(config: ServerConfig, converter: Converter) -> Self {
        Self {
            config: Arc::new(config),
            converter,
            cleanup: CleanupScheduler::new(),
        }
    }
}

/// Build the router with every page and API route.
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_SLACK);

    let uploads = Router::new()
        .route("/convert", post(handlers::convert))
        .route("/api-mode/convert", post(handlers::convert))
        .route("/inspect", post(handlers::inspect))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(handlers::index_page))
        .route("/api-mode", get(handlers::api_mode_page))
        .route("/wasm-mode", get(handlers::wasm_mode_page))
        .route("/download/{filename}", get(handlers::download))
        .route("/api-mode/download/{filename}", get(handlers::download))
        .merge(uploads)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Bind `0.0.0.0:<port>` and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::fs::create_dir_all(&state.config.upload_dir).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "DNG to PNG converter listening on http://{} (scratch dir: {})",
        listener.local_addr()?,
        state.config.upload_dir.display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
