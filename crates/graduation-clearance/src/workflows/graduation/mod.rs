//! Graduation application clearance: review, parallel departmental sign-off and final decision.
//!
//! An application moves `pending -> under_review -> clearance_in_progress -> cleared -> approved`,
//! and may be denied from any non-terminal status. Each of the four departments owns one
//! clearance record; the aggregate is recomputed from those records on every read and write.

pub mod domain;
pub mod machine;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationSubmission, ClearanceRecord, ClearanceSet, ClearanceStatus,
    DegreeAuditSnapshot, Department, GraduationApplication, GraduationStatus, OverallProgress,
    ProgramId, StaffId, StudentId, TermId,
};
pub use machine::{ClearanceAction, Transition, TransitionError};
pub use repository::{
    ApplicationFilter, ApplicationRepository, AuditError, AuditEvent, AuditSink,
    DegreeAuditError, DegreeAuditProvider, Page, RepositoryError,
};
pub use router::graduation_router;
pub use service::{
    Actor, ApplicationPage, ApplicationView, ClearanceServiceError, GraduationClearanceService,
    ListQuery,
};
pub use store::InMemoryApplicationStore;
pub use tracker::ClearanceSummary;
