use axum::http::{HeaderValue, Method};
use axum::Router;
use broadcast::{LocationFanout, Manager};
use domain::{Ingestion, TokenRegistry, VehicleStore};
use events::EventPublisher;
use log::*;
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

mod controller;
mod error;
mod params;
mod response;
pub(crate) mod router;
mod sse;
mod ws;

/// Everything a request handler needs. Built once at startup.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenRegistry>,
    pub vehicles: Arc<VehicleStore>,
    pub broadcast: Arc<Manager>,
    pub ingestion: Ingestion,
}

impl AppState {
    /// Wire the ingestion pipeline to the subscriber fan-out.
    pub fn new(config: Config, tokens: Arc<TokenRegistry>, vehicles: Arc<VehicleStore>) -> Self {
        let broadcast = Arc::new(Manager::new());
        let event_publisher =
            EventPublisher::new().with_handler(Arc::new(LocationFanout::new(broadcast.clone())));
        let ingestion = Ingestion::new(tokens.clone(), vehicles.clone(), event_publisher);

        Self {
            config,
            tokens,
            vehicles,
            broadcast,
            ingestion,
        }
    }
}

/// The full application: routes plus the CORS layer.
pub fn app(app_state: AppState) -> Router {
    let cors_layer = cors_layer(&app_state.config);
    router::define_routes(app_state).layer(cors_layer)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let server_url = format!("{host}:{port}");

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, app(app_state)).await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring invalid CORS origin {origin}: {e}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
