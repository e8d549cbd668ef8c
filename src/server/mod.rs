//! HTTP surface: API routes plus the SSR fallback for every other path.

mod handlers;

use axum::routing::{any, get};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::drivers::GeminiDriver;
use crate::images::UnsplashClient;
use crate::ssr::{SsrBridge, UpstreamRenderer};
use crate::store::{AppwriteStore, DocumentStore, MemoryStore};
use crate::transport::HttpTransport;
use crate::trip::{TripCatalog, TripPipeline};
use crate::users::UserDirectory;
use crate::Result;

pub use handlers::ApiError;

/// Chunks buffered between a render task and the client connection.
pub const SSR_STREAM_BUFFER: usize = 16;

/// Everything the handlers need, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TripPipeline>,
    pub catalog: Arc<TripCatalog>,
    pub users: Arc<UserDirectory>,
    pub ssr: SsrBridge,
}

impl AppState {
    /// Construct every client from configuration and inject them.
    ///
    /// Without an Appwrite project the in-memory store is used, and without an SSR
    /// upstream page requests answer 500.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.http)?;

        let store: Arc<dyn DocumentStore> = if config.appwrite.is_configured() {
            Arc::new(AppwriteStore::new(&transport, &config.appwrite)?)
        } else {
            warn!("APPWRITE_PROJECT_ID not set, trips and users are kept in memory");
            Arc::new(MemoryStore::new())
        };

        let pipeline = TripPipeline::new(
            config.secrets(),
            Arc::new(GeminiDriver::new(&transport, &config.gemini)),
            Arc::new(UnsplashClient::new(&transport, &config.unsplash)),
            store.clone(),
            config.appwrite.trip_collection_id.clone(),
        );

        let ssr = match config.server.ssr_upstream_url.as_deref() {
            Some(url) => {
                let passthrough = HttpTransport::passthrough(&config.http)?;
                info!(upstream = url, "forwarding page requests");
                SsrBridge::new(Arc::new(UpstreamRenderer::new(&passthrough, url)?))
            }
            None => {
                warn!("SSR_UPSTREAM_URL not set, page requests will fail");
                SsrBridge::without_handler()
            }
        };

        Ok(Self {
            pipeline: Arc::new(pipeline),
            catalog: Arc::new(TripCatalog::new(
                store.clone(),
                config.appwrite.trip_collection_id.clone(),
            )),
            users: Arc::new(UserDirectory::new(
                store,
                config.appwrite.user_collection_id.clone(),
            )),
            ssr,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/create-trip", any(handlers::create_trip))
        .route("/api/trips", get(handlers::list_trips))
        .route("/api/trips/:id", get(handlers::get_trip))
        .route("/api/users", get(handlers::list_users))
        .route("/health", get(handlers::health))
        .fallback(handlers::render_page)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the listener fails or ctrl-c is received.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
        })
        .await?;
    Ok(())
}
