pub mod booking;
pub mod directory;
pub mod error;
pub mod log;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod schedule;
pub mod store;

pub use booking::{Booking, BookingStatus, BookingSummary, CancellationReceipt};
pub use common::{AdminId, BookingId, DeptId, DoctorId, HalfDay, PatientId, ScheduleId};
pub use directory::{Department, Doctor, Patient};
pub use error::{RegistryError, Result};
pub use log::{CallAction, CallEvent, ReviewOutcome, ScheduleReview};
pub use memory::InMemoryRegistry;
pub use postgres::PostgresRegistry;
pub use query::{AvailabilityQuery, AvailableSlot};
pub use schedule::{ApprovalStatus, Schedule, ScheduleSelector, SelectorError, VisitOutcome};
pub use store::RegistryStore;
