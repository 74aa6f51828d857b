//! Schedules: one doctor's bookable half-day session.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::{DoctorId, HalfDay, ScheduleId};

/// Admin review state of a published schedule.
///
/// Only approved schedules accept bookings; the transition away from
/// `Pending` happens exactly once, through the review operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Published by the doctor, awaiting admin review.
    #[default]
    Pending,

    /// Accepted by an admin; bookable while capacity remains.
    Approved,

    /// Declined by an admin (terminal).
    Rejected,
}

impl ApprovalStatus {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    /// Returns true if the schedule is still awaiting review.
    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One doctor's bookable half-day session with a fixed capacity.
///
/// `remaining` is mutated exclusively by the booking and cancellation
/// coordinators, under the schedule row lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: ScheduleId,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub half_day: HalfDay,

    /// Maximum number of patients the session can take (positive).
    pub max_capacity: i32,

    /// Capacity units not yet claimed; `0 <= remaining <= max_capacity`.
    pub remaining: i32,

    pub approval: ApprovalStatus,
}

impl Schedule {
    /// Returns true if a booking may be created against this schedule.
    pub fn is_bookable(&self) -> bool {
        self.approval == ApprovalStatus::Approved && self.remaining > 0
    }

    /// Asserts the two-sided ledger bound. Debug builds panic on a
    /// violated bound; release builds rely on the database CHECK.
    pub fn assert_capacity_bounds(&self) {
        debug_assert!(
            self.remaining >= 0 && self.remaining <= self.max_capacity,
            "schedule {} remaining {} outside [0, {}]",
            self.schedule_id,
            self.remaining,
            self.max_capacity,
        );
    }
}

/// Error building a schedule selector from request parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// Both a schedule ID and a (doctor, date, half-day) triple were
    /// supplied. Treated as an input error rather than silently
    /// preferring one.
    #[error("supply either a schedule id or a doctor/date/half-day triple, not both")]
    Ambiguous,

    /// Neither a schedule ID nor a complete triple was supplied.
    #[error("supply a schedule id or a complete doctor/date/half-day triple")]
    Incomplete,
}

/// Identifies the target schedule of a booking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleSelector {
    /// Direct schedule identifier.
    ById(ScheduleId),

    /// The unique (doctor, date, half-day) session triple.
    BySession {
        doctor_id: DoctorId,
        date: NaiveDate,
        half_day: HalfDay,
    },
}

impl ScheduleSelector {
    /// Selects by schedule identifier.
    pub fn by_id(schedule_id: ScheduleId) -> Self {
        ScheduleSelector::ById(schedule_id)
    }

    /// Selects by the unique session triple.
    pub fn by_session(doctor_id: DoctorId, date: NaiveDate, half_day: HalfDay) -> Self {
        ScheduleSelector::BySession {
            doctor_id,
            date,
            half_day,
        }
    }

    /// Builds a selector from optional request parts.
    ///
    /// Exactly one of the two forms must be present: a schedule ID, or a
    /// complete (doctor, date, half-day) triple. Anything else is an
    /// input error.
    pub fn from_parts(
        schedule_id: Option<ScheduleId>,
        doctor_id: Option<DoctorId>,
        date: Option<NaiveDate>,
        half_day: Option<HalfDay>,
    ) -> std::result::Result<Self, SelectorError> {
        let triple_given = doctor_id.is_some() || date.is_some() || half_day.is_some();
        match (schedule_id, doctor_id, date, half_day) {
            (Some(_), _, _, _) if triple_given => Err(SelectorError::Ambiguous),
            (Some(id), None, None, None) => Ok(ScheduleSelector::ById(id)),
            (None, Some(doctor_id), Some(date), Some(half_day)) => {
                Ok(ScheduleSelector::by_session(doctor_id, date, half_day))
            }
            _ => Err(SelectorError::Incomplete),
        }
    }
}

/// Terminal outcome of a called visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitOutcome {
    /// The patient was seen.
    Completed,

    /// The patient did not show up when called.
    Missed,
}
