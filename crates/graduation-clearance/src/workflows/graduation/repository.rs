use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, DegreeAuditSnapshot, Department, GraduationApplication, GraduationStatus,
    ProgramId, StaffId, StudentId,
};
use super::machine::{ClearanceAction, Transition};

/// Storage abstraction for applications and the clearance records they own.
///
/// An application and its records are persisted as one aggregate, so every write replaces both
/// atomically. `update` is a compare-and-swap on `GraduationApplication::version`.
pub trait ApplicationRepository: Send + Sync {
    fn insert(
        &self,
        application: GraduationApplication,
    ) -> Result<GraduationApplication, RepositoryError>;
    fn fetch(&self, id: &ApplicationId)
        -> Result<Option<GraduationApplication>, RepositoryError>;
    /// Persist `application` if the stored version still equals `expected_version`.
    /// Returns the stored aggregate with its bumped version.
    fn update(
        &self,
        application: GraduationApplication,
        expected_version: u64,
    ) -> Result<GraduationApplication, RepositoryError>;
    fn list(
        &self,
        filter: &ApplicationFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<GraduationApplication>, RepositoryError>;
    /// Remove the application together with its clearance records.
    fn delete(&self, id: &ApplicationId) -> Result<GraduationApplication, RepositoryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub status: Option<GraduationStatus>,
    pub student_id: Option<StudentId>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &GraduationApplication) -> bool {
        self.status.map_or(true, |status| application.status == status)
            && self
                .student_id
                .as_ref()
                .map_or(true, |student| &application.student_id == student)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Source of degree audit facts, consulted once when clearance begins.
pub trait DegreeAuditProvider: Send + Sync {
    fn snapshot(
        &self,
        student_id: &StudentId,
        program_id: &ProgramId,
    ) -> Result<DegreeAuditSnapshot, DegreeAuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DegreeAuditError {
    #[error("no degree audit available for student {0}")]
    Missing(String),
    #[error("degree audit service unavailable: {0}")]
    Unavailable(String),
}

/// Outbound audit trail hook.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub application_id: ApplicationId,
    pub actor: StaffId,
    pub action: ClearanceAction,
    pub department: Option<Department>,
    pub from_status: Option<GraduationStatus>,
    pub to_status: Option<GraduationStatus>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn for_transition(
        application_id: ApplicationId,
        actor: StaffId,
        transition: &Transition,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            application_id,
            actor,
            action: transition.action,
            department: transition.department,
            from_status: Some(transition.from),
            to_status: Some(transition.to),
            notes,
            occurred_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}
