use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::error::{DomainErrorKind, Error as DomainError, IngestionErrorKind};

#[derive(Debug)]
pub struct Error(DomainError);

impl Error {
    /// The `error` string shown to a driver, shared by the HTTP and WebSocket paths.
    pub fn client_message(&self) -> &'static str {
        client_message(&self.0.error_kind)
    }

    fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Ingestion(kind) => match kind {
                IngestionErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                IngestionErrorKind::MissingIdentity
                | IngestionErrorKind::InvalidCoordinates
                | IngestionErrorKind::InvalidPayload => StatusCode::BAD_REQUEST,
            },
            DomainErrorKind::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub(crate) fn client_message(kind: &DomainErrorKind) -> &'static str {
    match kind {
        DomainErrorKind::Ingestion(kind) => match kind {
            IngestionErrorKind::MissingIdentity => "missing payload.id",
            IngestionErrorKind::Unauthorized => "invalid token",
            IngestionErrorKind::InvalidCoordinates => "invalid coordinates",
            IngestionErrorKind::InvalidPayload => "invalid payload",
        },
        DomainErrorKind::Persistence(_) => "internal server error",
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.client_message() })),
        )
            .into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
