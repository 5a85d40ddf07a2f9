use chrono::Utc;
use graduation_clearance::workflows::graduation::{
    AuditError, AuditEvent, AuditSink, DegreeAuditError, DegreeAuditProvider,
    DegreeAuditSnapshot, OverallProgress, ProgramId, StudentId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Audit sink keeping events in memory and mirroring them to the trace log.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        info!(
            application_id = %event.application_id,
            actor = %event.actor,
            action = event.action.label(),
            "audit event recorded"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| AuditError::Transport("audit log mutex poisoned".to_string()))?;
        guard.push(event);
        Ok(())
    }
}

impl InMemoryAuditLog {
    pub(crate) fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Degree audit stand-in: per-student snapshots with an optional fallback for unknown students.
#[derive(Default, Clone)]
pub(crate) struct StaticDegreeAudit {
    snapshots: HashMap<StudentId, OverallProgress>,
    fallback: Option<OverallProgress>,
}

impl StaticDegreeAudit {
    pub(crate) fn with_fallback(fallback: OverallProgress) -> Self {
        Self {
            snapshots: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub(crate) fn insert(&mut self, student: StudentId, progress: OverallProgress) {
        self.snapshots.insert(student, progress);
    }
}

impl DegreeAuditProvider for StaticDegreeAudit {
    fn snapshot(
        &self,
        student_id: &StudentId,
        _program_id: &ProgramId,
    ) -> Result<DegreeAuditSnapshot, DegreeAuditError> {
        let progress = self
            .snapshots
            .get(student_id)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| DegreeAuditError::Missing(student_id.0.clone()))?;

        Ok(DegreeAuditSnapshot {
            graduation_eligible: progress.credits_completed >= progress.credits_needed,
            overall_progress: progress,
            captured_at: Utc::now(),
        })
    }
}

pub(crate) fn progress(credits_completed: f32, credits_needed: f32) -> OverallProgress {
    let percentage_complete = if credits_needed > 0.0 {
        (credits_completed / credits_needed * 100.0).min(100.0)
    } else {
        100.0
    };
    OverallProgress {
        credits_completed,
        credits_needed,
        percentage_complete,
    }
}
