use crate::cli::ServeArgs;
use crate::infra::{progress, AppState, InMemoryAuditLog, StaticDegreeAudit};
use crate::routes::with_graduation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use graduation_clearance::config::AppConfig;
use graduation_clearance::error::AppError;
use graduation_clearance::telemetry;
use graduation_clearance::workflows::graduation::{
    GraduationClearanceService, InMemoryApplicationStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Credits required when no per-student degree audit has been registered.
const DEFAULT_CREDITS_NEEDED: f32 = 120.0;

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

    let repository = Arc::new(InMemoryApplicationStore::default());
    let audit = Arc::new(InMemoryAuditLog::default());
    let degree_audit = Arc::new(StaticDegreeAudit::with_fallback(progress(
        DEFAULT_CREDITS_NEEDED,
        DEFAULT_CREDITS_NEEDED,
    )));
    let clearance_service = Arc::new(GraduationClearanceService::with_paging(
        repository,
        audit,
        degree_audit,
        config.paging,
    ));

    let app = with_graduation_routes(clearance_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "graduation clearance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
