//! Service layer for the outpatient registration system.
//!
//! This crate wraps the transactional registry store with:
//! - `BookingService` for slot booking, cancellation, and availability
//! - `ScheduleService` for schedule publication and admin review
//! - `QueueService` for the doctor-side call workflow
//!
//! Services validate requests before they reach the store and add
//! `tracing` spans and `metrics` counters around each operation.

pub mod booking;
pub mod error;
pub mod queue;
pub mod schedule;

pub use booking::{BookingRequest, BookingService};
pub use error::DomainError;
pub use queue::QueueService;
pub use schedule::ScheduleService;
