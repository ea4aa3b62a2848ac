use crate::checkout::admin::AdminError;
use crate::checkout::repository::RepositoryError;
use crate::checkout::risk::BlocklistImportError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Import(BlocklistImportError),
    Admin(AdminError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Import(err) => write!(f, "blocklist import error: {}", err),
            AppError::Admin(err) => write!(f, "admin operation failed: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Admin(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Import(_) => StatusCode::BAD_REQUEST,
            AppError::Admin(AdminError::OrderNotFound(_) | AdminError::BlocklistEntryNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Admin(AdminError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            AppError::Admin(AdminError::Rule(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Admin(AdminError::Repository(RepositoryError::Conflict)) => StatusCode::CONFLICT,
            AppError::Admin(AdminError::Repository(RepositoryError::NotFound)) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Admin(AdminError::Repository(RepositoryError::Unavailable(_)))
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<BlocklistImportError> for AppError {
    fn from(value: BlocklistImportError) -> Self {
        Self::Import(value)
    }
}

impl From<AdminError> for AppError {
    fn from(value: AdminError) -> Self {
        Self::Admin(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Admin(AdminError::Repository(value))
    }
}
