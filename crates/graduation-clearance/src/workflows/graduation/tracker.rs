use serde::{Deserialize, Serialize};

use super::domain::{ClearanceSet, ClearanceStatus, Department};

/// Aggregate view over an application's clearance records. Derived on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceSummary {
    pub total: usize,
    pub cleared: usize,
    pub pending: usize,
    pub hold: usize,
}

impl ClearanceSummary {
    pub fn tally(records: &ClearanceSet) -> Self {
        let mut summary = Self {
            total: Department::ALL.len(),
            cleared: 0,
            pending: 0,
            hold: 0,
        };

        for record in records.iter() {
            match record.status {
                ClearanceStatus::Cleared => summary.cleared += 1,
                ClearanceStatus::Pending => summary.pending += 1,
                ClearanceStatus::Hold => summary.hold += 1,
            }
        }

        summary
    }

    pub fn is_fully_cleared(&self) -> bool {
        self.cleared == self.total
    }

    /// Departments still blocking final approval.
    pub fn outstanding(&self) -> usize {
        self.pending + self.hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::graduation::domain::StaffId;

    fn set_status(set: &mut ClearanceSet, department: Department, status: ClearanceStatus) {
        let record = set.get_mut(department);
        record.status = status;
        if status == ClearanceStatus::Hold {
            record.notes = Some("outstanding item".to_string());
        }
        if status == ClearanceStatus::Cleared {
            record.cleared_by = Some(StaffId("staff-1".to_string()));
        }
    }

    #[test]
    fn fresh_set_is_all_pending() {
        let summary = ClearanceSummary::tally(&ClearanceSet::open());
        assert_eq!(
            summary,
            ClearanceSummary {
                total: 4,
                cleared: 0,
                pending: 4,
                hold: 0,
            }
        );
        assert!(!summary.is_fully_cleared());
        assert_eq!(summary.outstanding(), 4);
    }

    #[test]
    fn mixed_statuses_add_up_to_total() {
        let mut set = ClearanceSet::open();
        set_status(&mut set, Department::Academic, ClearanceStatus::Cleared);
        set_status(&mut set, Department::Library, ClearanceStatus::Hold);

        let summary = ClearanceSummary::tally(&set);
        assert_eq!(summary.cleared, 1);
        assert_eq!(summary.hold, 1);
        assert_eq!(summary.pending, 2);
        assert_eq!(
            summary.cleared + summary.pending + summary.hold,
            summary.total
        );
    }

    #[test]
    fn all_cleared_is_fully_cleared() {
        let mut set = ClearanceSet::open();
        for department in Department::ALL {
            set_status(&mut set, department, ClearanceStatus::Cleared);
        }
        let summary = ClearanceSummary::tally(&set);
        assert!(summary.is_fully_cleared());
        assert_eq!(summary.outstanding(), 0);
    }
}
