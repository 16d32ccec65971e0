use axum::{Json, http::StatusCode};
use thiserror::Error;

use crate::anchors::CatalogError;
use crate::config::ConfigError;
use crate::geocode::GeocodeError;
use crate::models::{ApiError, CoordinateError};
use crate::provider::ProviderError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("invalid coordinate: {0}")]
    Coordinate(#[from] CoordinateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error("synthesis task failed: {0}")]
    Task(String),
}

/// Failures while wiring the service together at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to build routing client: {0}")]
    Provider(#[from] ProviderError),
    #[error("failed to build geocoding client: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::Coordinate(_) => StatusCode::BAD_REQUEST,
            RouteError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            RouteError::Session(SessionError::StartUnknown | SessionError::Superseded) => {
                StatusCode::CONFLICT
            }
            RouteError::Geocode(_) => StatusCode::BAD_GATEWAY,
            RouteError::Gpx(_) | RouteError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RouteError> for (StatusCode, Json<ApiError>) {
    fn from(err: RouteError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", err);
        } else {
            tracing::debug!("request rejected: {}", err);
        }
        (
            status,
            Json(ApiError {
                message: err.to_string(),
            }),
        )
    }
}
