use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::batch::BatchId;
use super::domain::{CandidateId, WeightProfileId};
use super::error::{ConfigurationError, RankingError};
use super::repository::{BatchStore, CandidateCatalog, WeightProfileStore};
use super::service::{RankingService, METHOD_TOPSIS};
use super::summary::{ResultSource, StatisticsScope};

/// Router builder exposing analysis runs and result queries.
pub fn analysis_router<C, P, B>(service: Arc<RankingService<C, P, B>>) -> Router
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    Router::new()
        .route("/api/v1/analysis/run", post(run_handler::<C, P, B>))
        .route("/api/v1/analysis/top-sites", get(top_sites_handler::<C, P, B>))
        .route(
            "/api/v1/analysis/batches/latest",
            get(latest_batch_handler::<C, P, B>),
        )
        .route(
            "/api/v1/analysis/batches/:batch_id",
            get(batch_handler::<C, P, B>),
        )
        .route(
            "/api/v1/analysis/sites/:site_id/history",
            get(history_handler::<C, P, B>),
        )
        .route(
            "/api/v1/analysis/statistics",
            get(statistics_handler::<C, P, B>),
        )
        .route("/api/v1/analysis/algorithms", get(algorithms_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RunAnalysisRequest {
    pub(crate) weight_profile_id: Option<u64>,
    pub(crate) top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TopSitesQuery {
    pub(crate) limit: Option<usize>,
    pub(crate) source: Option<ResultSource>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatisticsQuery {
    pub(crate) scope: Option<String>,
    pub(crate) batch_id: Option<String>,
}

pub(crate) async fn run_handler<C, P, B>(
    State(service): State<Arc<RankingService<C, P, B>>>,
    Json(request): Json<RunAnalysisRequest>,
) -> Response
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    let limit = match service.validate_top_n(request.top_n) {
        Ok(limit) => limit,
        Err(error) => return error_response(&error),
    };

    match service.run_analysis(request.weight_profile_id.map(WeightProfileId)) {
        Ok(report) => (StatusCode::CREATED, Json(report.truncated(limit))).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn top_sites_handler<C, P, B>(
    State(service): State<Arc<RankingService<C, P, B>>>,
    Query(query): Query<TopSitesQuery>,
) -> Response
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    let source = query.source.unwrap_or_default();
    match service.top_n(query.limit, source) {
        Ok(results) => {
            let payload = json!({
                "source": source,
                "count": results.len(),
                "results": results,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn latest_batch_handler<C, P, B>(
    State(service): State<Arc<RankingService<C, P, B>>>,
) -> Response
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    match service.latest_batch() {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => {
            let payload = json!({
                "batch": serde_json::Value::Null,
                "records": [],
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn batch_handler<C, P, B>(
    State(service): State<Arc<RankingService<C, P, B>>>,
    Path(batch_id): Path<String>,
) -> Response
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    match service.batch_results(&BatchId(batch_id)) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn history_handler<C, P, B>(
    State(service): State<Arc<RankingService<C, P, B>>>,
    Path(site_id): Path<u64>,
) -> Response
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    match service.history(CandidateId(site_id)) {
        Ok(history) => {
            let payload = json!({
                "site_id": site_id,
                "total_evaluations": history.len(),
                "history": history,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn statistics_handler<C, P, B>(
    State(service): State<Arc<RankingService<C, P, B>>>,
    Query(query): Query<StatisticsQuery>,
) -> Response
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    let scope = match parse_scope(&query) {
        Ok(scope) => scope,
        Err(message) => {
            let payload = json!({
                "error": message,
                "kind": "invalid_request",
            });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    match service.statistics(scope) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn algorithms_handler() -> Response {
    let payload = json!({
        "supported_algorithms": [METHOD_TOPSIS],
        "default_algorithm": METHOD_TOPSIS,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

fn parse_scope(query: &StatisticsQuery) -> Result<StatisticsScope, String> {
    match (query.scope.as_deref(), query.batch_id.as_deref()) {
        (None | Some("latest_per_site"), None) => Ok(StatisticsScope::LatestPerSite),
        (Some("latest_batch"), None) => Ok(StatisticsScope::LatestBatch),
        (None | Some("batch"), Some(batch_id)) => {
            Ok(StatisticsScope::Batch(BatchId(batch_id.to_string())))
        }
        (Some("batch"), None) => Err("scope=batch requires a batch_id".to_string()),
        (Some(other), Some(_)) => {
            Err(format!("batch_id cannot be combined with scope={other}"))
        }
        (Some(other), _) => Err(format!(
            "unknown scope '{other}'; expected latest_batch, latest_per_site or batch"
        )),
    }
}

/// HTTP status for each failure category.
pub(crate) fn status_for(error: &RankingError) -> StatusCode {
    match error {
        RankingError::Configuration(ConfigurationError::ProfileNotFound(_))
        | RankingError::BatchNotFound(_) => StatusCode::NOT_FOUND,
        RankingError::Configuration(_) | RankingError::Data(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RankingError::InvalidTopN { .. } => StatusCode::BAD_REQUEST,
        RankingError::Persistence { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RankingError::RunTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        RankingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: &RankingError) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (status_for(error), Json(payload)).into_response()
}
