//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree with `domain::error::Error` as
/// the root holding an `error_kind` enum that describes what went wrong, and an
/// optional `source` holding the original error. `web` only ever looks at the
/// `error_kind` to pick a status code and a client-facing message.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Ingestion(IngestionErrorKind),
    Persistence(PersistenceErrorKind),
}

/// Rejections of a location submission. These are reported to the submitting
/// producer only.
#[derive(Debug, PartialEq)]
pub enum IngestionErrorKind {
    /// The submission carried no producer id.
    MissingIdentity,
    /// Token missing, unknown, expired or bound to another producer.
    Unauthorized,
    /// Latitude or longitude did not coerce to a finite number.
    InvalidCoordinates,
    /// The submission could not be decoded at all.
    InvalidPayload,
}

/// Failures of the durable token store. Logged, never surfaced to clients.
#[derive(Debug, PartialEq)]
pub enum PersistenceErrorKind {
    Read,
    Write,
    Encoding,
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        self.error_kind == DomainErrorKind::Ingestion(IngestionErrorKind::Unauthorized)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            DomainErrorKind::Ingestion(kind) => write!(f, "Ingestion error: {kind:?}"),
            DomainErrorKind::Persistence(kind) => match &self.source {
                Some(source) => write!(f, "Persistence error: {kind:?} ({source})"),
                None => write!(f, "Persistence error: {kind:?}"),
            },
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Persistence(PersistenceErrorKind::Write),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Persistence(PersistenceErrorKind::Encoding),
        }
    }
}

/// Helper function to create ingestion errors.
pub fn ingestion_error(kind: IngestionErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: DomainErrorKind::Ingestion(kind),
    }
}

/// Helper function to create persistence errors that wrap an underlying cause.
pub fn persistence_error<E>(kind: PersistenceErrorKind, err: E) -> Error
where
    E: StdError + Send + Sync + 'static,
{
    Error {
        source: Some(Box::new(err)),
        error_kind: DomainErrorKind::Persistence(kind),
    }
}
