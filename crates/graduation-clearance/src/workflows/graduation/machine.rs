//! Lifecycle transitions for graduation applications.
//!
//! Every operation validates against the current status before touching the application, so a
//! failed call leaves the application exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ClearanceSet, ClearanceStatus, DegreeAuditSnapshot, Department, GraduationApplication,
    GraduationStatus, StaffId,
};
use super::tracker::ClearanceSummary;

/// Operations recorded against an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceAction {
    Submit,
    SubmitForReview,
    BeginClearance,
    Clear,
    Block,
    FinalApprove,
    Deny,
    Delete,
}

impl ClearanceAction {
    pub const fn label(self) -> &'static str {
        match self {
            ClearanceAction::Submit => "submit",
            ClearanceAction::SubmitForReview => "submit_for_review",
            ClearanceAction::BeginClearance => "begin_clearance",
            ClearanceAction::Clear => "clear",
            ClearanceAction::Block => "block",
            ClearanceAction::FinalApprove => "final_approve",
            ClearanceAction::Deny => "deny",
            ClearanceAction::Delete => "delete",
        }
    }
}

impl GraduationStatus {
    /// Transition table: which actions are legal from this status.
    pub const fn permits(self, action: ClearanceAction) -> bool {
        use ClearanceAction as A;
        use GraduationStatus as S;

        match action {
            A::Submit | A::Delete => true,
            A::SubmitForReview => matches!(self, S::Pending),
            A::BeginClearance => matches!(self, S::UnderReview),
            A::Clear | A::Block | A::FinalApprove => {
                matches!(self, S::ClearanceInProgress | S::Cleared)
            }
            A::Deny => !self.is_terminal(),
        }
    }
}

/// Result of a successful lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub action: ClearanceAction,
    pub department: Option<Department>,
    pub from: GraduationStatus,
    pub to: GraduationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {} an application that is {status}", .action.label())]
    InvalidState {
        action: ClearanceAction,
        status: GraduationStatus,
    },
    #[error("{0} clearance has already been granted")]
    AlreadyCleared(Department),
    #[error("application is not fully cleared ({pending} pending, {hold} on hold)")]
    NotCleared { pending: usize, hold: usize },
    #[error("{field} must not be empty")]
    MissingNotes { field: &'static str },
}

fn required_notes(notes: &str, field: &'static str) -> Result<String, TransitionError> {
    let trimmed = notes.trim();
    if trimmed.is_empty() {
        return Err(TransitionError::MissingNotes { field });
    }
    Ok(trimmed.to_string())
}

fn optional_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty())
}

impl GraduationApplication {
    pub fn ensure_permits(&self, action: ClearanceAction) -> Result<(), TransitionError> {
        if self.status.permits(action) {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                action,
                status: self.status,
            })
        }
    }

    /// Current aggregate, `None` before clearance has begun.
    pub fn clearance_summary(&self) -> Option<ClearanceSummary> {
        self.clearances.as_ref().map(ClearanceSummary::tally)
    }

    fn advance(
        &mut self,
        action: ClearanceAction,
        department: Option<Department>,
        to: GraduationStatus,
    ) -> Transition {
        let from = self.status;
        self.status = to;
        Transition {
            action,
            department,
            from,
            to,
        }
    }

    pub fn submit_for_review(&mut self) -> Result<Transition, TransitionError> {
        self.ensure_permits(ClearanceAction::SubmitForReview)?;
        Ok(self.advance(
            ClearanceAction::SubmitForReview,
            None,
            GraduationStatus::UnderReview,
        ))
    }

    /// Open the four department records and freeze the degree audit snapshot.
    pub fn begin_clearance(
        &mut self,
        snapshot: DegreeAuditSnapshot,
    ) -> Result<Transition, TransitionError> {
        self.ensure_permits(ClearanceAction::BeginClearance)?;
        self.clearances = Some(ClearanceSet::open());
        self.degree_audit_snapshot = Some(snapshot);
        Ok(self.advance(
            ClearanceAction::BeginClearance,
            None,
            GraduationStatus::ClearanceInProgress,
        ))
    }

    /// Grant a department's clearance. Clearing a hold is allowed; clearing twice is not.
    pub fn clear(
        &mut self,
        department: Department,
        actor: &StaffId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        self.ensure_permits(ClearanceAction::Clear)?;
        let status = self.status;
        let clearances = self
            .clearances
            .as_mut()
            .ok_or(TransitionError::InvalidState {
                action: ClearanceAction::Clear,
                status,
            })?;

        let record = clearances.get_mut(department);
        if record.status == ClearanceStatus::Cleared {
            return Err(TransitionError::AlreadyCleared(department));
        }
        record.status = ClearanceStatus::Cleared;
        record.cleared_by = Some(actor.clone());
        record.cleared_at = Some(at);
        record.notes = optional_notes(notes);

        let next = if ClearanceSummary::tally(clearances).is_fully_cleared() {
            GraduationStatus::Cleared
        } else {
            GraduationStatus::ClearanceInProgress
        };
        Ok(self.advance(ClearanceAction::Clear, Some(department), next))
    }

    /// Put a department on hold. A hold on a cleared application reopens clearance.
    pub fn block(
        &mut self,
        department: Department,
        notes: &str,
    ) -> Result<Transition, TransitionError> {
        let notes = required_notes(notes, "notes")?;
        self.ensure_permits(ClearanceAction::Block)?;
        let status = self.status;
        let clearances = self
            .clearances
            .as_mut()
            .ok_or(TransitionError::InvalidState {
                action: ClearanceAction::Block,
                status,
            })?;

        let record = clearances.get_mut(department);
        record.status = ClearanceStatus::Hold;
        record.cleared_by = None;
        record.cleared_at = None;
        record.notes = Some(notes);

        Ok(self.advance(
            ClearanceAction::Block,
            Some(department),
            GraduationStatus::ClearanceInProgress,
        ))
    }

    /// Approve once every department is cleared; outstanding records surface as `NotCleared`.
    pub fn final_approve(
        &mut self,
        reviewer_notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        self.ensure_permits(ClearanceAction::FinalApprove)?;
        let summary = self
            .clearance_summary()
            .ok_or(TransitionError::NotCleared {
                pending: Department::ALL.len(),
                hold: 0,
            })?;
        if !summary.is_fully_cleared() {
            return Err(TransitionError::NotCleared {
                pending: summary.pending,
                hold: summary.hold,
            });
        }

        if let Some(notes) = optional_notes(reviewer_notes) {
            self.reviewer_notes = Some(notes);
        }
        self.reviewed_at = Some(at);
        Ok(self.advance(
            ClearanceAction::FinalApprove,
            None,
            GraduationStatus::Approved,
        ))
    }

    /// Deny from any non-terminal status. Clearance records are left as they stand.
    pub fn deny(
        &mut self,
        reviewer_notes: &str,
        at: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let notes = required_notes(reviewer_notes, "reviewer_notes")?;
        self.ensure_permits(ClearanceAction::Deny)?;
        self.reviewer_notes = Some(notes);
        self.reviewed_at = Some(at);
        Ok(self.advance(ClearanceAction::Deny, None, GraduationStatus::Denied))
    }
}
