//! Availability query for the read path.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use common::{DeptId, DoctorId, HalfDay, ScheduleId};

/// Builder for availability listings.
///
/// All filters are optional; an empty query returns every approved
/// schedule that still has capacity.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityQuery {
    /// Filter by department.
    pub dept_id: Option<DeptId>,

    /// Filter by doctor.
    pub doctor_id: Option<DoctorId>,

    /// Filter by calendar date.
    pub date: Option<NaiveDate>,
}

impl AvailabilityQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by department.
    pub fn dept(mut self, dept_id: DeptId) -> Self {
        self.dept_id = Some(dept_id);
        self
    }

    /// Filters by doctor.
    pub fn doctor(mut self, doctor_id: DoctorId) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    /// Filters by calendar date.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// One bookable schedule as presented to patients.
///
/// The capacity figures are a snapshot: they may change between this read
/// and a subsequent booking attempt, which is why the booking coordinator
/// re-checks capacity under lock rather than trusting a prior read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub schedule_id: ScheduleId,
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub doctor_title: String,
    pub department_name: String,
    pub date: NaiveDate,
    pub half_day: HalfDay,

    /// Fixed hour labels the front end offers for this half-day.
    pub hour_labels: Vec<String>,

    pub remaining: i32,
    pub max_capacity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_filters() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let query = AvailabilityQuery::new()
            .dept(DeptId::new(1))
            .doctor(DoctorId::new(2))
            .on(date);
        assert_eq!(query.dept_id, Some(DeptId::new(1)));
        assert_eq!(query.doctor_id, Some(DoctorId::new(2)));
        assert_eq!(query.date, Some(date));
    }

    #[test]
    fn empty_query_has_no_filters() {
        let query = AvailabilityQuery::new();
        assert!(query.dept_id.is_none());
        assert!(query.doctor_id.is_none());
        assert!(query.date.is_none());
    }
}
