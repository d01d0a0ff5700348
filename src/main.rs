use domain::{JsonFileTokenStore, TokenRegistry, VehicleStore};
use log::*;
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use web::AppState;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Starting up transit hub...");

    let tokens = Arc::new(TokenRegistry::load(
        JsonFileTokenStore::new(config.token_store_path().clone()),
        config.token_ttl(),
    ));
    let vehicles = Arc::new(VehicleStore::new());

    if config.sample_token {
        print_sample_links(&config, &tokens);
    }

    let app_state = AppState::new(config, tokens, vehicles);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}

/// Issue a token for `bus-1` and print ready-to-open driver and commuter links.
fn print_sample_links(config: &Config, tokens: &TokenRegistry) {
    let sample_token = tokens.issue("bus-1", Some("route-1"), None);
    let base = format!("http://{}:{}", config.interface(), config.port);

    info!("Sample token (for quick testing): {sample_token}");
    info!("Open commuter UI: {base}/commuter.html");
    info!(
        "Driver link example: {base}/driver.html?token={sample_token}&busId=bus-1&busNumber=BUS-1"
    );
}
