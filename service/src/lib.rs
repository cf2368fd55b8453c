use config::Config;
use log::{info, warn};
use sse::Server;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_server: Arc<Server>,
    pub config: Config,
}

impl AppState {
    /// Builds the broadcast server from `app_config` and pre-registers the
    /// configured channels.
    pub fn new(app_config: Config) -> Self {
        let sse_server = Arc::new(Server::new(app_config.sse_options()));
        Self::with_server(app_config, &sse_server)
    }

    pub fn with_server(app_config: Config, sse_server: &Arc<Server>) -> Self {
        info!(
            "SSE server config: mailbox_capacity={}, backpressure={}, retry={:?}, keep_alive={}s",
            app_config.mailbox_capacity,
            app_config.backpressure,
            app_config.retry_interval(),
            app_config.keep_alive().as_secs(),
        );

        for name in app_config.channels.iter().filter(|name| !name.is_empty()) {
            if let Err(e) = sse_server.add_channel(name) {
                warn!("Could not create channel {name}: {e}");
            }
        }

        Self {
            sse_server: Arc::clone(sse_server),
            config: app_config,
        }
    }

    pub fn sse_server_ref(&self) -> &Server {
        self.sse_server.as_ref()
    }
}
