//! Error handling for the Agri Advisor platform
//!
//! Every error carries a stable code and a human-readable message so the
//! session driver can render a user-facing reply.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{DetectionParseError, MissingContext, SessionState, SoilError, StoreError};
use thiserror::Error;
use uuid::Uuid;

/// External collaborators the core talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Vision,
    Geocoding,
    Weather,
    Soil,
    ProductSearch,
    Nlg,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Vision => write!(f, "vision service"),
            Upstream::Geocoding => write!(f, "geocoding service"),
            Upstream::Weather => write!(f, "weather service"),
            Upstream::Soil => write!(f, "soil service"),
            Upstream::ProductSearch => write!(f, "product search service"),
            Upstream::Nlg => write!(f, "language generation service"),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Invalid input: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Missing context: {0} has not been provided yet")]
    ContextMissing(MissingContext),

    #[error("Could not parse detection result: {0}")]
    DetectionParse(String),

    // Session errors
    #[error("Cannot {action} while session is {state}")]
    InvalidStateTransition {
        state: SessionState,
        action: String,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    // External service errors
    #[error("Could not resolve zip code {zipcode}: {message}")]
    Geocoding { zipcode: String, message: String },

    #[error("Weather data unavailable: {0}")]
    WeatherUnavailable(String),

    #[error("Soil data unavailable: {0}")]
    SoilDataUnavailable(String),

    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable { service: Upstream, message: String },

    #[error("{service} timed out")]
    UpstreamTimeout { service: Upstream },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(service: Upstream, message: impl Into<String>) -> Self {
        AppError::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "INVALID_INPUT",
            AppError::ContextMissing(_) => "CONTEXT_MISSING",
            AppError::DetectionParse(_) => "DETECTION_PARSE_ERROR",
            AppError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            AppError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            AppError::Geocoding { .. } => "GEOCODING_ERROR",
            AppError::WeatherUnavailable(_) => "WEATHER_UNAVAILABLE",
            AppError::SoilDataUnavailable(_) => "SOIL_DATA_UNAVAILABLE",
            AppError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            AppError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether repeating the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamUnavailable { .. }
                | AppError::UpstreamTimeout { .. }
                | AppError::WeatherUnavailable(_)
                | AppError::SoilDataUnavailable(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } | AppError::DetectionParse(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ContextMissing(_) | AppError::InvalidStateTransition { .. } => {
                StatusCode::CONFLICT
            }
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Geocoding { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::WeatherUnavailable(_)
            | AppError::SoilDataUnavailable(_)
            | AppError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<SoilError> for AppError {
    fn from(e: SoilError) -> Self {
        match e {
            SoilError::InvalidSample(message) => AppError::InvalidInput {
                field: "soil_sample".to_string(),
                message,
            },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::InvalidInput {
            field: "store".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<DetectionParseError> for AppError {
    fn from(e: DetectionParseError) -> Self {
        AppError::DetectionParse(e.0)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&AppError> for ErrorDetail {
    fn from(e: &AppError) -> Self {
        let field = match e {
            AppError::InvalidInput { field, .. } => Some(field.clone()),
            AppError::ContextMissing(missing) => Some(missing.to_string()),
            _ => None,
        };
        ErrorDetail {
            code: e.code().to_string(),
            message: e.to_string(),
            retryable: e.is_retryable(),
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(code = self.code(), "Error: {:?}", self);
        } else {
            tracing::debug!(code = self.code(), "Rejected request: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail::from(&self),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_missing_names_the_piece() {
        let err = AppError::ContextMissing(MissingContext::Location);
        assert!(err.to_string().contains("location"));
        let detail = ErrorDetail::from(&err);
        assert_eq!(detail.code, "CONTEXT_MISSING");
        assert_eq!(detail.field.as_deref(), Some("location"));
        assert!(!detail.retryable);
    }

    #[test]
    fn test_timeout_is_distinguishable_and_retryable() {
        let err = AppError::UpstreamTimeout {
            service: Upstream::Nlg,
        };
        assert_eq!(err.code(), "UPSTREAM_TIMEOUT");
        assert!(err.is_retryable());
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_soil_error_maps_to_invalid_input() {
        let err: AppError = SoilError::InvalidSample("sum is 90".to_string()).into();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field == "soil_sample"));
    }
}
