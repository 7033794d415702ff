//! Error types for ingestion, windowing, the upstream fetch and the HTTP edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;

// ---

/// Failure while turning a raw payload into records.
///
/// `Parse` is scoped to a single entry: the ingestor logs it and skips the
/// entry. Only `EmptySource` ever escapes a normalize call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("no data available from source")]
    EmptySource,

    #[error("sensor '{sensor}' entry '{key}': {reason}")]
    Parse {
        sensor: String,
        key: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Failure fetching the raw payload. No retry is attempted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("Sensor source error: {0}")]
    Source(#[from] SourceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::Ingest(IngestError::EmptySource) => {
                tracing::warn!("Source returned no usable records");
                (StatusCode::NOT_FOUND, "no data available".to_string())
            }
            Self::Ingest(e) => {
                tracing::error!("Ingest error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Window(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Source(e) => {
                tracing::error!("Sensor source error: {e}");
                (StatusCode::BAD_GATEWAY, format!("Sensor source error: {e}"))
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
