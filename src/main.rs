use log::*;
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting broadcast server [{}] in {} mode",
        config.bind_address(),
        config.runtime_env()
    );

    let app_state = AppState::new(config);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped with error: {e}");
        std::process::exit(1);
    }

    info!("Broadcast server stopped");
}
