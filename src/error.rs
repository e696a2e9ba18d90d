//! Error types.
//!
//! Two families live here. [`Error`] surfaces infrastructure failures of the
//! server itself: binding to a port or accepting a connection. [`ApiError`]
//! is what a route handler fails with; it converts into an HTTP
//! [`Response`] so handlers can use `?` all the way down.

use std::fmt::{self, Write as _};

use serde::Serialize;
use tracing::error;

use crate::config::ConfigError;
use crate::db::ConnectionError;
use crate::nivel::Endpoint;
use crate::response::{IntoResponse, Json, Response};
use crate::status::Status;

/// The error type returned by the server's fallible operations.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ── ApiError ──────────────────────────────────────────────────────────────────

/// Failure of a single API request.
///
/// Client errors are raised before a connection is opened. Server errors carry
/// the driver's message and its `source()` chain, never a backtrace.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Nivel debe ser: {}", .endpoint.allowed_message())]
    InvalidNivel { endpoint: Endpoint },

    #[error("Falta el parámetro obligatorio: {0}")]
    MissingParam(&'static str),

    #[error("Periodo inválido (formato YYYY-MM-DD): {0}")]
    InvalidPeriodo(String),

    #[error("Error conectando a PostgreSQL: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Error en base de datos: {0}")]
    Query(#[from] tokio_postgres::Error),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidNivel { .. } | Self::MissingParam(_) | Self::InvalidPeriodo(_) => {
                Status::BadRequest
            }
            Self::Connection(_) | Self::Query(_) => Status::InternalServerError,
        }
    }

    /// The message sent to the client: the error itself followed by every
    /// cause below it.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !detail.contains(&text) {
                let _ = write!(detail, ": {text}");
            }
            source = cause.source();
        }
        detail
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() {
            error!(%detail, "request failed");
        }
        Json(ErrorBody { detail }).with_status(status)
    }
}
