use crate::response::VehicleSnapshot;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

/// GET the latest location of every vehicle seen since startup.
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(VehicleSnapshot {
        buses: app_state.vehicles.snapshot(),
    })
}
