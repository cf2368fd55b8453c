//! HTTP transport for the broadcast server.
//!
//! Exposes the event stream endpoint, the publish endpoints, a channel listing
//! and a health check, and ties the lifetime of every open stream to the
//! process: on Ctrl-C or SIGTERM the broadcast server is shut down so that
//! graceful shutdown does not wait on connections that never end.

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use log::*;
use ::sse::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;

pub use self::error::{Error, Result};
pub use service::AppState;

mod controller;
mod error;
mod params;
pub mod router;
mod sse;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let server_url = app_state.config.bind_address();
    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    let sse_server = app_state.sse_server.clone();
    let app = build_app(app_state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(sse_server))
    .await
}

/// The full application: routes plus the CORS policy from the configuration.
pub fn build_app(app_state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("last-event-id"),
        ]);

    router::define_routes(app_state).layer(cors_layer)
}

async fn shutdown_signal(sse_server: Arc<Server>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing event streams");
    sse_server.shutdown().await;
}
