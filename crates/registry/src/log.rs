//! Append-only audit and call logs.
//!
//! Neither log is concurrency-critical; both are written inside the
//! transaction that performs the state change they record and consumed
//! read-mostly afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{AdminId, BookingId, DoctorId, ScheduleId};

/// Result of an admin schedule review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Approved,
    Rejected,
}

impl ReviewOutcome {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Approved => "approved",
            ReviewOutcome::Rejected => "rejected",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ReviewOutcome::Approved),
            "rejected" => Some(ReviewOutcome::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One admin approval/rejection of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReview {
    pub review_id: i64,
    pub schedule_id: ScheduleId,
    pub admin_id: AdminId,
    pub outcome: ReviewOutcome,
    pub reason: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Action recorded against a booking by the queue-call workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallAction {
    Called,
    Missed,
    Completed,
}

impl CallAction {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallAction::Called => "called",
            CallAction::Missed => "missed",
            CallAction::Completed => "completed",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "called" => Some(CallAction::Called),
            "missed" => Some(CallAction::Missed),
            "completed" => Some(CallAction::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One call/miss/complete event against a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    pub event_id: i64,
    pub booking_id: BookingId,
    pub doctor_id: DoctorId,
    pub action: CallAction,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_outcome_parse_roundtrip() {
        assert_eq!(ReviewOutcome::parse("approved"), Some(ReviewOutcome::Approved));
        assert_eq!(ReviewOutcome::parse("rejected"), Some(ReviewOutcome::Rejected));
        assert_eq!(ReviewOutcome::parse("deferred"), None);
    }

    #[test]
    fn call_action_parse_roundtrip() {
        for action in [CallAction::Called, CallAction::Missed, CallAction::Completed] {
            assert_eq!(CallAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(CallAction::parse("paged"), None);
    }
}
