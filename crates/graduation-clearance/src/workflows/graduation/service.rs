use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ApplicationId, ApplicationSubmission, ClearanceRecord, DegreeAuditSnapshot, Department,
    GraduationApplication, GraduationStatus, ProgramId, StaffId, StudentId, TermId,
};
use super::machine::{ClearanceAction, Transition, TransitionError};
use super::repository::{
    ApplicationFilter, ApplicationRepository, AuditEvent, AuditSink, DegreeAuditError,
    DegreeAuditProvider, RepositoryError,
};
use super::tracker::ClearanceSummary;
use crate::config::PagingConfig;

/// Authenticated staff member performing a request, passed explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub staff_id: StaffId,
}

impl Actor {
    pub fn new(staff_id: impl Into<String>) -> Self {
        Self {
            staff_id: StaffId(staff_id.into()),
        }
    }
}

/// Application as exposed to the admin frontend, with the clearance aggregate recomputed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub program_id: ProgramId,
    pub term_id: TermId,
    pub status: GraduationStatus,
    pub application_date: NaiveDate,
    pub ceremony_date: Option<NaiveDate>,
    pub special_requests: Option<String>,
    pub reviewer_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub degree_audit_snapshot: Option<DegreeAuditSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_status: Option<BTreeMap<Department, ClearanceRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_summary: Option<ClearanceSummary>,
    pub version: u64,
}

impl GraduationApplication {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            id: self.id.clone(),
            student_id: self.student_id.clone(),
            program_id: self.program_id.clone(),
            term_id: self.term_id.clone(),
            status: self.status,
            application_date: self.application_date,
            ceremony_date: self.ceremony_date,
            special_requests: self.special_requests.clone(),
            reviewer_notes: self.reviewer_notes.clone(),
            reviewed_at: self.reviewed_at,
            degree_audit_snapshot: self.degree_audit_snapshot.clone(),
            clearance_status: self
                .clearances
                .as_ref()
                .map(|clearances| clearances.as_map().clone()),
            clearance_summary: self.clearance_summary(),
            version: self.version,
        }
    }
}

/// Listing parameters; `page` is 1-based.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub status: Option<GraduationStatus>,
    pub student_id: Option<StudentId>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationPage {
    pub items: Vec<ApplicationView>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

/// Service driving applications through review, departmental clearance and final decision.
pub struct GraduationClearanceService<R, A, D> {
    repository: Arc<R>,
    audit: Arc<A>,
    degree_audit: Arc<D>,
    paging: PagingConfig,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("grad-{id:06}"))
}

impl<R, A, D> GraduationClearanceService<R, A, D>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    D: DegreeAuditProvider + 'static,
{
    pub fn new(repository: Arc<R>, audit: Arc<A>, degree_audit: Arc<D>) -> Self {
        Self::with_paging(repository, audit, degree_audit, PagingConfig::default())
    }

    pub fn with_paging(
        repository: Arc<R>,
        audit: Arc<A>,
        degree_audit: Arc<D>,
        paging: PagingConfig,
    ) -> Self {
        Self {
            repository,
            audit,
            degree_audit,
            paging,
        }
    }

    /// Record a student's application in `pending` status.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        require_id(&submission.student_id.0, "student_id")?;
        require_id(&submission.program_id.0, "program_id")?;
        require_id(&submission.term_id.0, "term_id")?;

        let filter = ApplicationFilter {
            status: None,
            student_id: Some(submission.student_id.clone()),
        };
        let existing = self.repository.list(&filter, 0, usize::MAX)?;
        let duplicate = existing.items.iter().any(|application| {
            application.program_id == submission.program_id
                && application.term_id == submission.term_id
                && application.status != GraduationStatus::Denied
        });
        if duplicate {
            return Err(ClearanceServiceError::DuplicateApplication);
        }

        let now = Utc::now();
        let application =
            GraduationApplication::new(next_application_id(), submission, now.date_naive());
        let stored = self.repository.insert(application)?;

        info!(
            application_id = %stored.id,
            actor = %actor.staff_id,
            "graduation application submitted"
        );
        self.emit(AuditEvent {
            application_id: stored.id.clone(),
            actor: actor.staff_id.clone(),
            action: ClearanceAction::Submit,
            department: None,
            from_status: None,
            to_status: Some(stored.status),
            notes: None,
            occurred_at: now,
        });

        Ok(stored.view())
    }

    pub fn get(&self, id: &ApplicationId) -> Result<ApplicationView, ClearanceServiceError> {
        Ok(self.load(id)?.view())
    }

    pub fn list(&self, query: ListQuery) -> Result<ApplicationPage, ClearanceServiceError> {
        let per_page = self.paging.resolve(query.per_page);
        let page = query.page.unwrap_or(1).max(1);
        let offset = (page - 1).saturating_mul(per_page);
        let filter = ApplicationFilter {
            status: query.status,
            student_id: query.student_id,
        };

        let result = self.repository.list(&filter, offset, per_page)?;
        Ok(ApplicationPage {
            items: result.items.iter().map(GraduationApplication::view).collect(),
            page,
            per_page,
            total: result.total,
        })
    }

    pub fn submit_for_review(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        self.transition(actor, id, None, |application| {
            application.submit_for_review().map_err(Into::into)
        })
    }

    /// Open departmental clearance, capturing the degree audit snapshot at this instant.
    pub fn begin_clearance(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        self.transition(actor, id, None, |application| {
            application.ensure_permits(ClearanceAction::BeginClearance)?;
            let snapshot = self
                .degree_audit
                .snapshot(&application.student_id, &application.program_id)?;
            application.begin_clearance(snapshot).map_err(Into::into)
        })
    }

    pub fn clear(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        department: &str,
        notes: Option<String>,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        let department = parse_department(department)?;
        let audit_notes = notes.clone();
        self.transition(actor, id, audit_notes, |application| {
            application
                .clear(department, &actor.staff_id, notes, Utc::now())
                .map_err(Into::into)
        })
    }

    pub fn block(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        department: &str,
        notes: &str,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        let department = parse_department(department)?;
        self.transition(actor, id, Some(notes.trim().to_string()), |application| {
            application.block(department, notes).map_err(Into::into)
        })
    }

    pub fn final_approve(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        reviewer_notes: Option<String>,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        let audit_notes = reviewer_notes.clone();
        self.transition(actor, id, audit_notes, |application| {
            application
                .final_approve(reviewer_notes, Utc::now())
                .map_err(Into::into)
        })
    }

    pub fn deny(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        reviewer_notes: &str,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        self.transition(
            actor,
            id,
            Some(reviewer_notes.trim().to_string()),
            |application| application.deny(reviewer_notes, Utc::now()).map_err(Into::into),
        )
    }

    /// Remove an application and the clearance records it owns.
    pub fn delete(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<ApplicationView, ClearanceServiceError> {
        let removed = self.repository.delete(id).map_err(|err| match err {
            RepositoryError::NotFound => ClearanceServiceError::NotFound(id.clone()),
            other => other.into(),
        })?;

        info!(application_id = %id, actor = %actor.staff_id, "graduation application deleted");
        self.emit(AuditEvent {
            application_id: id.clone(),
            actor: actor.staff_id.clone(),
            action: ClearanceAction::Delete,
            department: None,
            from_status: Some(removed.status),
            to_status: None,
            notes: None,
            occurred_at: Utc::now(),
        });

        Ok(removed.view())
    }

    fn load(&self, id: &ApplicationId) -> Result<GraduationApplication, ClearanceServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ClearanceServiceError::NotFound(id.clone()))
    }

    /// Read, apply and compare-and-swap in one pass. A stale write is reported, never retried.
    fn transition<F>(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        notes: Option<String>,
        apply: F,
    ) -> Result<ApplicationView, ClearanceServiceError>
    where
        F: FnOnce(&mut GraduationApplication) -> Result<Transition, ClearanceServiceError>,
    {
        let mut application = self.load(id)?;
        let expected_version = application.version;
        let transition = apply(&mut application)?;

        let stored = self
            .repository
            .update(application, expected_version)
            .map_err(|err| match err {
                RepositoryError::VersionConflict { .. } => {
                    ClearanceServiceError::ConcurrencyConflict
                }
                RepositoryError::NotFound => ClearanceServiceError::NotFound(id.clone()),
                other => other.into(),
            })?;

        info!(
            application_id = %id,
            actor = %actor.staff_id,
            action = transition.action.label(),
            department = transition.department.map(Department::label),
            from = %transition.from,
            to = %transition.to,
            "graduation application transitioned"
        );
        self.emit(AuditEvent::for_transition(
            id.clone(),
            actor.staff_id.clone(),
            &transition,
            notes.filter(|notes| !notes.is_empty()),
            Utc::now(),
        ));

        Ok(stored.view())
    }

    fn emit(&self, event: AuditEvent) {
        let application_id = event.application_id.clone();
        let action = event.action.label();
        if let Err(err) = self.audit.record(event) {
            warn!(
                application_id = %application_id,
                action,
                error = %err,
                "audit event dropped"
            );
        }
    }
}

fn parse_department(raw: &str) -> Result<Department, ClearanceServiceError> {
    Department::parse(raw).ok_or_else(|| ClearanceServiceError::InvalidDepartment(raw.to_string()))
}

fn require_id(value: &str, field: &'static str) -> Result<(), ClearanceServiceError> {
    if value.trim().is_empty() {
        return Err(ClearanceServiceError::Validation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

/// Error raised by the clearance service.
#[derive(Debug, thiserror::Error)]
pub enum ClearanceServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("unknown department '{0}'; expected one of academic, financial, library, registrar")]
    InvalidDepartment(String),
    #[error("{0}")]
    Validation(String),
    #[error("graduation application {0} not found")]
    NotFound(ApplicationId),
    #[error("an active graduation application already exists for this program and term")]
    DuplicateApplication,
    #[error("application was modified concurrently; reload and retry")]
    ConcurrencyConflict,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    DegreeAudit(#[from] DegreeAuditError),
}

impl ClearanceServiceError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ClearanceServiceError::Transition(TransitionError::InvalidState { .. }) => {
                "invalid_state"
            }
            ClearanceServiceError::Transition(TransitionError::AlreadyCleared(_)) => {
                "already_cleared"
            }
            ClearanceServiceError::Transition(TransitionError::NotCleared { .. }) => "not_cleared",
            ClearanceServiceError::Transition(TransitionError::MissingNotes { .. })
            | ClearanceServiceError::Validation(_) => "validation_error",
            ClearanceServiceError::InvalidDepartment(_) => "invalid_department",
            ClearanceServiceError::NotFound(_) => "not_found",
            ClearanceServiceError::DuplicateApplication => "duplicate_application",
            ClearanceServiceError::ConcurrencyConflict => "concurrency_conflict",
            ClearanceServiceError::Repository(_) => "storage_unavailable",
            ClearanceServiceError::DegreeAudit(_) => "degree_audit_unavailable",
        }
    }
}
