use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for graduation applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermId(pub String);

/// Staff member acting on an application; stamped into `cleared_by` and audit events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a graduation application. `Approved` and `Denied` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraduationStatus {
    Pending,
    UnderReview,
    ClearanceInProgress,
    Cleared,
    Approved,
    Denied,
}

impl GraduationStatus {
    pub const ALL: [GraduationStatus; 6] = [
        GraduationStatus::Pending,
        GraduationStatus::UnderReview,
        GraduationStatus::ClearanceInProgress,
        GraduationStatus::Cleared,
        GraduationStatus::Approved,
        GraduationStatus::Denied,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            GraduationStatus::Pending => "pending",
            GraduationStatus::UnderReview => "under_review",
            GraduationStatus::ClearanceInProgress => "clearance_in_progress",
            GraduationStatus::Cleared => "cleared",
            GraduationStatus::Approved => "approved",
            GraduationStatus::Denied => "denied",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw))
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, GraduationStatus::Approved | GraduationStatus::Denied)
    }
}

impl fmt::Display for GraduationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Departments that must sign off before graduation. The set is closed: adding one is a schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Academic,
    Financial,
    Library,
    Registrar,
}

impl Department {
    pub const ALL: [Department; 4] = [
        Department::Academic,
        Department::Financial,
        Department::Library,
        Department::Registrar,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Department::Academic => "academic",
            Department::Financial => "financial",
            Department::Library => "library",
            Department::Registrar => "registrar",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|department| department.label().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceStatus {
    Pending,
    Cleared,
    Hold,
}

impl ClearanceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ClearanceStatus::Pending => "pending",
            ClearanceStatus::Cleared => "cleared",
            ClearanceStatus::Hold => "hold",
        }
    }
}

/// One department's sign-off state for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceRecord {
    pub department: Department,
    pub status: ClearanceStatus,
    pub cleared_by: Option<StaffId>,
    pub cleared_at: Option<DateTime<Utc>>,
    /// Required whenever `status` is `Hold`.
    pub notes: Option<String>,
}

impl ClearanceRecord {
    fn pending(department: Department) -> Self {
        Self {
            department,
            status: ClearanceStatus::Pending,
            cleared_by: None,
            cleared_at: None,
            notes: None,
        }
    }
}

/// The four clearance records owned by an application, exactly one per department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Department, ClearanceRecord>",
    into = "BTreeMap<Department, ClearanceRecord>"
)]
pub struct ClearanceSet {
    records: BTreeMap<Department, ClearanceRecord>,
}

impl ClearanceSet {
    /// Create all department records in `Pending` status.
    pub fn open() -> Self {
        let records = Department::ALL
            .into_iter()
            .map(|department| (department, ClearanceRecord::pending(department)))
            .collect();
        Self { records }
    }

    pub fn get(&self, department: Department) -> &ClearanceRecord {
        // Every department is inserted by `open` and checked on deserialization.
        &self.records[&department]
    }

    pub(crate) fn get_mut(&mut self, department: Department) -> &mut ClearanceRecord {
        self.records
            .entry(department)
            .or_insert_with(|| ClearanceRecord::pending(department))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClearanceRecord> {
        self.records.values()
    }

    pub fn as_map(&self) -> &BTreeMap<Department, ClearanceRecord> {
        &self.records
    }
}

/// Rejected clearance map while deserializing a stored application.
#[derive(Debug, thiserror::Error)]
pub enum ClearanceSetError {
    #[error("clearance record missing for department {0}")]
    MissingDepartment(Department),
    #[error("clearance record keyed under {key} describes department {record}")]
    MismatchedDepartment { key: Department, record: Department },
    #[error("clearance record for department {0} is on hold without notes")]
    HoldWithoutNotes(Department),
}

impl TryFrom<BTreeMap<Department, ClearanceRecord>> for ClearanceSet {
    type Error = ClearanceSetError;

    fn try_from(records: BTreeMap<Department, ClearanceRecord>) -> Result<Self, Self::Error> {
        for department in Department::ALL {
            let record = records
                .get(&department)
                .ok_or(ClearanceSetError::MissingDepartment(department))?;
            if record.department != department {
                return Err(ClearanceSetError::MismatchedDepartment {
                    key: department,
                    record: record.department,
                });
            }
            let has_notes = record
                .notes
                .as_deref()
                .is_some_and(|notes| !notes.trim().is_empty());
            if record.status == ClearanceStatus::Hold && !has_notes {
                return Err(ClearanceSetError::HoldWithoutNotes(department));
            }
        }
        Ok(Self { records })
    }
}

impl From<ClearanceSet> for BTreeMap<Department, ClearanceRecord> {
    fn from(value: ClearanceSet) -> Self {
        value.records
    }
}

/// Credit progress reported by the degree audit service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallProgress {
    pub credits_completed: f32,
    pub credits_needed: f32,
    pub percentage_complete: f32,
}

/// Point-in-time eligibility facts captured once when clearance begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeAuditSnapshot {
    pub graduation_eligible: bool,
    pub overall_progress: OverallProgress,
    pub captured_at: DateTime<Utc>,
}

/// Student-provided payload creating a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub student_id: StudentId,
    pub program_id: ProgramId,
    pub term_id: TermId,
    #[serde(default)]
    pub application_date: Option<NaiveDate>,
    #[serde(default)]
    pub ceremony_date: Option<NaiveDate>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// Stored graduation application together with the clearance records it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduationApplication {
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
    /// `None` until clearance begins; afterwards all four departments are present.
    pub clearances: Option<ClearanceSet>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub version: u64,
}

impl GraduationApplication {
    pub fn new(id: ApplicationId, submission: ApplicationSubmission, today: NaiveDate) -> Self {
        Self {
            id,
            student_id: submission.student_id,
            program_id: submission.program_id,
            term_id: submission.term_id,
            status: GraduationStatus::Pending,
            application_date: submission.application_date.unwrap_or(today),
            ceremony_date: submission.ceremony_date,
            special_requests: submission
                .special_requests
                .filter(|requests| !requests.trim().is_empty()),
            reviewer_notes: None,
            reviewed_at: None,
            degree_audit_snapshot: None,
            clearances: None,
            version: 0,
        }
    }
}
