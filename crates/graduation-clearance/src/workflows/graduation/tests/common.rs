use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::graduation::domain::{
    ApplicationId, ApplicationSubmission, DegreeAuditSnapshot, GraduationApplication,
    OverallProgress, ProgramId, StudentId, TermId,
};
use crate::workflows::graduation::repository::{
    ApplicationFilter, ApplicationRepository, AuditError, AuditEvent, AuditSink,
    DegreeAuditError, DegreeAuditProvider, Page, RepositoryError,
};
use crate::workflows::graduation::service::{Actor, GraduationClearanceService};
use crate::workflows::graduation::store::InMemoryApplicationStore;
use crate::workflows::graduation::{graduation_router, Department, StaffId};

pub(super) fn actor() -> Actor {
    Actor::new("staff-registrar-7")
}

pub(super) fn submission() -> ApplicationSubmission {
    submission_for("stu-1001")
}

pub(super) fn submission_for(student: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        student_id: StudentId(student.to_string()),
        program_id: ProgramId("bsc-computer-science".to_string()),
        term_id: TermId("2026-spring".to_string()),
        application_date: NaiveDate::from_ymd_opt(2026, 2, 14),
        ceremony_date: NaiveDate::from_ymd_opt(2026, 5, 22),
        special_requests: Some("Wheelchair-accessible seating".to_string()),
    }
}

pub(super) fn snapshot() -> DegreeAuditSnapshot {
    DegreeAuditSnapshot {
        graduation_eligible: true,
        overall_progress: OverallProgress {
            credits_completed: 124.0,
            credits_needed: 120.0,
            percentage_complete: 100.0,
        },
        captured_at: Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

/// Application already moved to `clearance_in_progress`, without going through a service.
pub(super) fn application_in_clearance() -> GraduationApplication {
    let mut application = GraduationApplication::new(
        ApplicationId("grad-test".to_string()),
        submission(),
        NaiveDate::from_ymd_opt(2026, 2, 14).expect("valid date"),
    );
    application.submit_for_review().expect("pending -> under_review");
    application
        .begin_clearance(snapshot())
        .expect("under_review -> clearance_in_progress");
    application
}

pub(super) fn staff() -> StaffId {
    actor().staff_id
}

pub(super) fn clear_all(application: &mut GraduationApplication) {
    for department in Department::ALL {
        application
            .clear(department, &staff(), None, Utc::now())
            .expect("department clears");
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAudit {
    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("lock").clone()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("lock").push(event);
        Ok(())
    }
}

pub(super) struct FailingAudit;

impl AuditSink for FailingAudit {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::Transport("audit queue offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct FixedDegreeAudit;

impl DegreeAuditProvider for FixedDegreeAudit {
    fn snapshot(
        &self,
        _student_id: &StudentId,
        _program_id: &ProgramId,
    ) -> Result<DegreeAuditSnapshot, DegreeAuditError> {
        Ok(snapshot())
    }
}

pub(super) struct UnavailableDegreeAudit;

impl DegreeAuditProvider for UnavailableDegreeAudit {
    fn snapshot(
        &self,
        _student_id: &StudentId,
        _program_id: &ProgramId,
    ) -> Result<DegreeAuditSnapshot, DegreeAuditError> {
        Err(DegreeAuditError::Unavailable("timeout".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(
        &self,
        _application: GraduationApplication,
    ) -> Result<GraduationApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<GraduationApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _application: GraduationApplication,
        _expected_version: u64,
    ) -> Result<GraduationApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(
        &self,
        _filter: &ApplicationFilter,
        _offset: usize,
        _limit: usize,
    ) -> Result<Page<GraduationApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ApplicationId) -> Result<GraduationApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Store whose writes always lose the version race, as if another request committed first.
#[derive(Default)]
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryApplicationStore,
}

impl ApplicationRepository for RacingRepository {
    fn insert(
        &self,
        application: GraduationApplication,
    ) -> Result<GraduationApplication, RepositoryError> {
        self.inner.insert(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<GraduationApplication>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update(
        &self,
        _application: GraduationApplication,
        expected_version: u64,
    ) -> Result<GraduationApplication, RepositoryError> {
        Err(RepositoryError::VersionConflict {
            expected: expected_version,
            actual: expected_version + 1,
        })
    }

    fn list(
        &self,
        filter: &ApplicationFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<GraduationApplication>, RepositoryError> {
        self.inner.list(filter, offset, limit)
    }

    fn delete(&self, id: &ApplicationId) -> Result<GraduationApplication, RepositoryError> {
        self.inner.delete(id)
    }
}

pub(super) type TestService =
    GraduationClearanceService<InMemoryApplicationStore, MemoryAudit, FixedDegreeAudit>;

pub(super) fn build_service() -> (TestService, Arc<InMemoryApplicationStore>, Arc<MemoryAudit>) {
    let repository = Arc::new(InMemoryApplicationStore::default());
    let audit = Arc::new(MemoryAudit::default());
    let service = GraduationClearanceService::new(
        repository.clone(),
        audit.clone(),
        Arc::new(FixedDegreeAudit),
    );
    (service, repository, audit)
}

/// Submitted application walked into `clearance_in_progress` through the service.
pub(super) fn application_under_clearance(service: &TestService) -> ApplicationId {
    let view = service.submit(&actor(), submission()).expect("submits");
    service
        .submit_for_review(&actor(), &view.id)
        .expect("moves to review");
    service
        .begin_clearance(&actor(), &view.id)
        .expect("opens clearance");
    view.id
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    graduation_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("json body")
}
