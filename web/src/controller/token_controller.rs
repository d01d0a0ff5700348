use crate::params::token::GenerateTokenParams;
use crate::response::IssuedToken;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use domain::token::generate_vehicle_id;
use log::*;
use service::config::DEFAULT_ROUTE_ID;

/// GET generate a driver token.
///
/// Intended for admins and demos: anyone who can reach the endpoint can mint a
/// token for any vehicle.
pub async fn generate(
    State(app_state): State<AppState>,
    Query(params): Query<GenerateTokenParams>,
) -> impl IntoResponse {
    let bus_id = params
        .bus_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(generate_vehicle_id);
    let route_id = params
        .route_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_ROUTE_ID.to_string());

    let token = app_state.tokens.issue(&bus_id, Some(&route_id), None);
    info!("Generated driver token for {bus_id} on {route_id}");

    Json(IssuedToken {
        token,
        bus_id,
        route_id,
    })
}
