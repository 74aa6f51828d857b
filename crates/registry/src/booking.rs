//! Bookings: a patient's claim on one capacity unit of a schedule.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use common::{BookingId, HalfDay, PatientId, ScheduleId};

/// Lifecycle state of a booking.
///
/// State transitions:
/// ```text
/// Pending ──► Called ──┬──► Completed
///    │          │      └──► Missed
///    └──────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Waiting in the schedule's queue.
    #[default]
    Pending,

    /// Called to the consultation room.
    Called,

    /// Visit finished (terminal).
    Completed,

    /// Did not show up when called (terminal).
    Missed,

    /// Cancelled by the patient (terminal); the booking turns invalid.
    Cancelled,
}

impl BookingStatus {
    /// Returns true if the patient may cancel in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Called)
    }

    /// Returns true if the queue may call this booking.
    pub fn can_call(&self) -> bool {
        matches!(self, BookingStatus::Pending)
    }

    /// Returns true if the visit can be closed out (completed or missed).
    pub fn can_finish(&self) -> bool {
        matches!(self, BookingStatus::Called)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Missed | BookingStatus::Cancelled
        )
    }

    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Called => "called",
            BookingStatus::Completed => "completed",
            BookingStatus::Missed => "missed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "called" => Some(BookingStatus::Called),
            "completed" => Some(BookingStatus::Completed),
            "missed" => Some(BookingStatus::Missed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A booking row as stored.
///
/// `serial` is the patient's fixed position in the schedule's queue,
/// assigned once under the schedule row lock and never reused. Cancelled
/// bookings keep their serial but turn invalid, so the active queue may
/// have holes; consumers must filter on `is_valid`, never assume serial
/// density.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub patient_id: PatientId,
    pub schedule_id: ScheduleId,
    pub serial: i32,
    pub status: BookingStatus,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

/// A booking joined with its denormalized display fields.
///
/// These are read-only projections for the caller's convenience, not
/// separate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub booking_id: BookingId,
    pub schedule_id: ScheduleId,
    pub doctor_name: String,
    pub doctor_title: String,
    pub department_name: String,
    pub schedule_date: NaiveDate,
    pub half_day: HalfDay,

    /// Optional human-readable hour label echoed from the request.
    pub time_label: Option<String>,

    pub serial: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Acknowledgement returned by the cancellation coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationReceipt {
    pub booking_id: BookingId,
    pub status: BookingStatus,
}
