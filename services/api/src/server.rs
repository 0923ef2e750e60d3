use crate::cli::ServeArgs;
use crate::infra::{
    demo_profiles, load_sites, AppState, InMemoryCandidateCatalog, InMemoryWeightProfileStore,
};
use crate::routes::with_analysis_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use retail_dss::config::AppConfig;
use retail_dss::error::AppError;
use retail_dss::ranking::{BatchLedger, CriteriaSchema, RankingService};
use retail_dss::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let schema = CriteriaSchema::retail_sites();
    let sites = load_sites(args.sites_csv.as_deref(), &schema)?;
    let profiles = demo_profiles(&schema);
    info!(sites = sites.len(), profiles = profiles.len(), "site catalog seeded");

    let ranking_service = Arc::new(RankingService::new(
        schema,
        Arc::new(InMemoryCandidateCatalog::new(sites)),
        Arc::new(InMemoryWeightProfileStore::new(profiles)),
        Arc::new(BatchLedger::new()),
        config.analysis.clone(),
    )?);

    let app = with_analysis_routes(ranking_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "retail site ranking service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
