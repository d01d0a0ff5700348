//! One-shot location updates for driver devices that cannot keep a socket open.

use crate::error::Error;
use crate::response::Acknowledged;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use domain::error::{ingestion_error, IngestionErrorKind};
use domain::{EntryPath, LocationSubmission};
use log::*;

/// Header that carries the driver token. Takes precedence over a `token` body field.
pub(crate) const DRIVER_TOKEN_HEADER: &str = "x-driver-token";

/// POST a location update: `{ id, busNumber, lat, lng, speed, routeId, token }`
///
/// Responds `{ ok: true }` once the update is stored; subscriber fan-out never
/// changes the response.
pub async fn update(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LocationSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(submission) = payload.map_err(|rejection| {
        debug!("Undecodable driver update: {rejection}");
        ingestion_error(IngestionErrorKind::InvalidPayload, "body is not a JSON object")
    })?;

    let header_token = headers
        .get(DRIVER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let location = app_state
        .ingestion
        .submit(
            submission.with_token_override(header_token),
            EntryPath::Request,
        )
        .await?;

    debug!("Accepted location update for {}", location.id);

    Ok(Json(Acknowledged::ok()))
}
