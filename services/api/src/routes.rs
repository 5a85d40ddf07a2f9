use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use graduation_clearance::workflows::graduation::{
    graduation_router, ApplicationRepository, AuditSink, DegreeAuditProvider,
    GraduationClearanceService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_graduation_routes<R, A, D>(
    service: Arc<GraduationClearanceService<R, A, D>>,
) -> Router
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    Router::new()
        .nest("/api/v1", graduation_router(service))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
