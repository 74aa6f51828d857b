pub mod half_day;
pub mod types;

pub use half_day::HalfDay;
pub use types::{AdminId, BookingId, DeptId, DoctorId, PatientId, ScheduleId};
