//! HTTP API server for Reelstream
//!
//! Wires the session manager, settings, outbound transport and indexer
//! search into one axum router. Every response allows any origin.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use reelstream_core::config::ReelstreamConfig;
use reelstream_core::{
    EngineFactory, HttpTransport, ReelstreamError, SessionManager, Settings, SettingsStore,
    StreamingResponder,
};
use reelstream_search::MediaSearchService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    convert_torrent, create_session, delete_session, get_settings, list_files, list_sessions,
    search_indexer, stream_file, test_indexer, test_proxy, update_jackett, update_prowlarr,
    update_proxy,
};

/// Headroom for multipart framing on top of the torrent size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub settings: Arc<SettingsStore>,
    pub transport: Arc<HttpTransport>,
    pub search: MediaSearchService,
    pub responder: StreamingResponder,
    pub config: Arc<ReelstreamConfig>,
}

impl AppState {
    /// Builds the shared services around an engine factory.
    ///
    /// # Errors
    ///
    /// - `ReelstreamError::Transport` - Initial proxy settings are unusable
    pub fn new(
        config: ReelstreamConfig,
        settings: Settings,
        engines: Arc<dyn EngineFactory>,
    ) -> Result<Self, ReelstreamError> {
        let transport = Arc::new(HttpTransport::new(
            config.network.clone(),
            &settings.proxy(),
        )?);
        let settings = Arc::new(SettingsStore::new(settings));
        let manager = Arc::new(SessionManager::new(
            &config,
            Arc::clone(&settings),
            Arc::clone(&transport),
            engines,
        ));
        let search = MediaSearchService::new(Arc::clone(&transport), Arc::clone(&settings));
        let responder = StreamingResponder::new(config.streaming.clone());

        Ok(Self {
            manager,
            settings,
            transport,
            search,
            responder,
            config: Arc::new(config),
        })
    }
}

/// Builds the API router.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.session.max_torrent_body + MULTIPART_OVERHEAD;

    Router::new()
        .route("/session", post(create_session))
        .route("/session/{id}", get(list_files).delete(delete_session))
        .route("/session/{id}/stream/{file}", get(stream_file))
        .route("/sessions", get(list_sessions))
        .route("/settings", get(get_settings))
        .route("/settings/proxy", post(update_proxy))
        .route("/settings/prowlarr", post(update_prowlarr))
        .route("/settings/jackett", post(update_jackett))
        .route("/proxy/test", post(test_proxy))
        .route(
            "/torrent/convert",
            post(convert_torrent).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/search/{indexer}", get(search_indexer))
        .route("/indexers/{indexer}/test", post(test_indexer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until Ctrl-C, then destroys every session.
///
/// The idle reaper is started here and stops with the server.
///
/// # Errors
///
/// - `ReelstreamError::Io` - The listener could not be bound
pub async fn run_server(state: AppState) -> Result<(), ReelstreamError> {
    let addr = SocketAddr::new(state.config.server.host, state.config.server.port);
    let manager = Arc::clone(&state.manager);
    let reaper = manager.spawn_reaper();

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Reelstream API listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    reaper.abort();
    manager.shutdown().await;
    tracing::info!("All sessions destroyed");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
