use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ApplicationId, ApplicationSubmission, GraduationStatus, StudentId};
use super::machine::TransitionError;
use super::repository::{ApplicationRepository, AuditSink, DegreeAuditProvider};
use super::service::{
    Actor, ApplicationView, ClearanceServiceError, GraduationClearanceService, ListQuery,
};

type SharedService<R, A, D> = Arc<GraduationClearanceService<R, A, D>>;

/// Router builder exposing the graduation clearance endpoints.
pub fn graduation_router<R, A, D>(service: SharedService<R, A, D>) -> Router
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    Router::new()
        .route(
            "/graduation-applications",
            post(submit_handler::<R, A, D>).get(list_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id",
            get(get_handler::<R, A, D>).delete(delete_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id/submit-for-review",
            post(submit_for_review_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id/begin-clearance",
            post(begin_clearance_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id/clear/:department",
            post(clear_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id/block/:department",
            post(block_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id/final-approve",
            post(final_approve_handler::<R, A, D>),
        )
        .route(
            "/graduation-applications/:application_id/deny",
            post(deny_handler::<R, A, D>),
        )
        .with_state(service)
}

/// Success payload wrapper expected by the admin frontend.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ListEnvelope {
    pub data: Vec<ApplicationView>,
    pub meta: PageMeta,
}

/// Error body `{message, code}` with the matching HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: message.to_string(),
        }
    }

    fn validation(message: String) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "validation_error",
            message,
        }
    }

    fn rejected(status: StatusCode, message: String) -> Self {
        Self {
            status,
            code: "validation_error",
            message,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<ClearanceServiceError> for ApiError {
    fn from(error: ClearanceServiceError) -> Self {
        let status = match &error {
            ClearanceServiceError::Transition(
                TransitionError::InvalidState { .. }
                | TransitionError::AlreadyCleared(_)
                | TransitionError::NotCleared { .. },
            )
            | ClearanceServiceError::InvalidDepartment(_)
            | ClearanceServiceError::DuplicateApplication
            | ClearanceServiceError::ConcurrencyConflict => StatusCode::CONFLICT,
            ClearanceServiceError::Transition(TransitionError::MissingNotes { .. })
            | ClearanceServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ClearanceServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ClearanceServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ClearanceServiceError::DegreeAudit(_) => StatusCode::BAD_GATEWAY,
        };

        Self {
            status,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({
            "message": self.message,
            "code": self.code,
        });
        (self.status, Json(payload)).into_response()
    }
}

/// Resolves the acting staff member from `Authorization: Bearer <token>`.
///
/// Token verification happens upstream in the session layer; the bearer value is the staff id.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("Authorization header is not valid text"))?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthorized("expected a Bearer token"))?;

        Ok(Actor::new(token))
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    per_page: Option<usize>,
}

impl ListParams {
    fn into_query(self) -> Result<ListQuery, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(GraduationStatus::parse(raw).ok_or_else(|| {
                ApiError::validation(format!("unknown application status '{raw}'"))
            })?),
        };

        Ok(ListQuery {
            status,
            student_id: self
                .student_id
                .filter(|id| !id.trim().is_empty())
                .map(StudentId),
            page: self.page,
            per_page: self.per_page,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotesPayload {
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReviewerNotesPayload {
    #[serde(default)]
    reviewer_notes: Option<String>,
}

type ViewResponse = Result<Json<Envelope<ApplicationView>>, ApiError>;

fn envelope(view: ApplicationView) -> Json<Envelope<ApplicationView>> {
    Json(Envelope { data: view })
}

pub(crate) async fn submit_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    submission: Result<Json<ApplicationSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<ApplicationView>>), ApiError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Json(submission) = submission?;
    let view = service.submit(&actor, submission)?;
    Ok((StatusCode::CREATED, envelope(view)))
}

pub(crate) async fn list_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    _actor: Actor,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListEnvelope>, ApiError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Query(params) = params?;
    let page = service.list(params.into_query()?)?;
    Ok(Json(ListEnvelope {
        data: page.items,
        meta: PageMeta {
            page: page.page,
            per_page: page.per_page,
            total: page.total,
        },
    }))
}

pub(crate) async fn get_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    _actor: Actor,
    application_id: Result<Path<String>, PathRejection>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path(application_id) = application_id?;
    let view = service.get(&ApplicationId(application_id))?;
    Ok(envelope(view))
}

pub(crate) async fn delete_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    application_id: Result<Path<String>, PathRejection>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path(application_id) = application_id?;
    let view = service.delete(&actor, &ApplicationId(application_id))?;
    Ok(envelope(view))
}

pub(crate) async fn submit_for_review_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    application_id: Result<Path<String>, PathRejection>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path(application_id) = application_id?;
    let view = service.submit_for_review(&actor, &ApplicationId(application_id))?;
    Ok(envelope(view))
}

pub(crate) async fn begin_clearance_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    application_id: Result<Path<String>, PathRejection>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path(application_id) = application_id?;
    let view = service.begin_clearance(&actor, &ApplicationId(application_id))?;
    Ok(envelope(view))
}

pub(crate) async fn clear_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Option<Json<NotesPayload>>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path((application_id, department)) = path?;
    let notes = payload.and_then(|Json(payload)| payload.notes);
    let view = service.clear(&actor, &ApplicationId(application_id), &department, notes)?;
    Ok(envelope(view))
}

pub(crate) async fn block_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Option<Json<NotesPayload>>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path((application_id, department)) = path?;
    let notes = payload
        .and_then(|Json(payload)| payload.notes)
        .unwrap_or_default();
    let view = service.block(&actor, &ApplicationId(application_id), &department, &notes)?;
    Ok(envelope(view))
}

pub(crate) async fn final_approve_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    application_id: Result<Path<String>, PathRejection>,
    payload: Option<Json<ReviewerNotesPayload>>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path(application_id) = application_id?;
    let notes = payload.and_then(|Json(payload)| payload.reviewer_notes);
    let view = service.final_approve(&actor, &ApplicationId(application_id), notes)?;
    Ok(envelope(view))
}

pub(crate) async fn deny_handler<R, A, D>(
    State(service): State<SharedService<R, A, D>>,
    actor: Actor,
    application_id: Result<Path<String>, PathRejection>,
    payload: Option<Json<ReviewerNotesPayload>>,
) -> ViewResponse
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    let Path(application_id) = application_id?;
    let notes = payload
        .and_then(|Json(payload)| payload.reviewer_notes)
        .unwrap_or_default();
    let view = service.deny(&actor, &ApplicationId(application_id), &notes)?;
    Ok(envelope(view))
}
