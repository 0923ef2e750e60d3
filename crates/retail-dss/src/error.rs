use crate::config::ConfigError;
use crate::ranking::router::status_for;
use crate::ranking::RankingError;
use crate::sites::SiteImportError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Top-level failure for the service binary and CLI. Handler errors render as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("site import error: {0}")]
    Import(#[from] SiteImportError),
    #[error("analysis error: {0}")]
    Ranking(#[from] RankingError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Import(_) => StatusCode::BAD_REQUEST,
            AppError::Ranking(err) => status_for(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{BatchId, RepositoryError};

    #[test]
    fn ranking_errors_keep_their_status() {
        let response = AppError::from(RankingError::BatchNotFound(BatchId(
            "batch-missing".to_string(),
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(RankingError::Persistence {
            batch_id: BatchId("batch-1".to_string()),
            source: RepositoryError::Unavailable("offline".to_string()),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn import_errors_are_client_errors() {
        let response =
            AppError::from(SiteImportError::MissingColumn("rent_cost".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
