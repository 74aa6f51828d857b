use async_trait::async_trait;
use chrono::NaiveDate;

use common::{AdminId, BookingId, DeptId, DoctorId, HalfDay, PatientId, ScheduleId};

use crate::{
    AvailabilityQuery, AvailableSlot, Booking, BookingStatus, BookingSummary, CallEvent,
    CancellationReceipt, Department, Doctor, Patient, Result, ReviewOutcome, Schedule,
    ScheduleReview, ScheduleSelector, VisitOutcome,
};

/// Core trait for registry store implementations.
///
/// Every mutating operation is atomic: it either applies all of its row
/// changes or none of them. The booking and cancellation coordinators
/// additionally serialize concurrent attempts against the same schedule
/// through a row-level lock (or its in-memory equivalent), so the
/// capacity ledger can never be over-subscribed and serial numbers are
/// never duplicated. All implementations must be thread-safe.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    // -- directory --

    /// Registers a department. Duplicate names surface `ConstraintViolation`.
    async fn create_department(&self, name: &str) -> Result<Department>;

    /// Registers a doctor under an existing department.
    async fn create_doctor(&self, dept_id: DeptId, name: &str, title: &str) -> Result<Doctor>;

    /// Registers a patient.
    async fn create_patient(&self, name: &str, phone: &str) -> Result<Patient>;

    // -- schedule lifecycle --

    /// Publishes a schedule in the pending state with `remaining` equal to
    /// `max_capacity`. At most one schedule may exist per (doctor, date,
    /// half-day); duplicates surface `ConstraintViolation`.
    async fn publish_schedule(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        half_day: HalfDay,
        max_capacity: i32,
    ) -> Result<Schedule>;

    /// Applies an admin review to a pending schedule and appends the
    /// review to the audit log, atomically. Fails `InvalidState` once the
    /// schedule has left the pending state.
    async fn review_schedule(
        &self,
        admin_id: AdminId,
        schedule_id: ScheduleId,
        outcome: ReviewOutcome,
        reason: Option<&str>,
    ) -> Result<Schedule>;

    /// Returns the audit trail for a schedule, oldest first.
    async fn list_reviews(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleReview>>;

    // -- slot ledger --

    /// Reads the capacity state of the approved schedule matching the
    /// selector. Fails `NotFound` if no approved schedule matches.
    async fn read_slot(&self, selector: &ScheduleSelector) -> Result<Schedule>;

    /// Loads a schedule regardless of approval state. Intended for
    /// administrative reads and test snapshots, never for booking
    /// resolution.
    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Schedule>;

    // -- booking coordinator --

    /// Creates a booking against the schedule the selector resolves to.
    ///
    /// One atomic unit of work with the schedule row locked throughout:
    /// resolve and lock the approved schedule (`NotFound`), check
    /// remaining capacity (`SlotExhausted`), assign the next serial from
    /// the highest ever handed out, insert the pending booking with a
    /// server-assigned timestamp, decrement the ledger, commit. Any
    /// failure rolls the whole transaction back.
    async fn create_booking(
        &self,
        patient_id: PatientId,
        selector: &ScheduleSelector,
        time_label: Option<&str>,
    ) -> Result<BookingSummary>;

    /// Cancels a booking owned by the caller.
    ///
    /// One atomic unit of work: lock the valid booking owned by
    /// `patient_id` (`NotFound`), require a cancellable status
    /// (`InvalidState`), mark it cancelled and invalid, restore one
    /// capacity unit to the schedule, commit. The serial is never
    /// reassigned.
    async fn cancel_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<CancellationReceipt>;

    // -- booking read paths --

    /// The caller's valid bookings with display fields, newest first,
    /// optionally filtered by status.
    async fn list_patient_bookings(
        &self,
        patient_id: PatientId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingSummary>>;

    /// Detail for one valid booking owned by the caller.
    async fn get_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<BookingSummary>;

    /// Approved schedules with capacity left, ordered by date then
    /// half-day. Takes no locks; results are a snapshot.
    async fn list_available(&self, query: &AvailabilityQuery) -> Result<Vec<AvailableSlot>>;

    // -- queue-call workflow --

    /// Calls the next patient: the lowest-serial valid pending booking of
    /// the doctor's schedule moves to `called` and the call is logged,
    /// atomically. Fails `NotFound` when the queue has no pending entry.
    async fn call_next(&self, doctor_id: DoctorId, schedule_id: ScheduleId) -> Result<Booking>;

    /// Closes out a called visit as completed or missed and logs the
    /// event, atomically. Fails `InvalidState` unless the booking is
    /// currently `called`.
    async fn finish_visit(
        &self,
        doctor_id: DoctorId,
        booking_id: BookingId,
        outcome: VisitOutcome,
    ) -> Result<Booking>;

    /// Valid bookings for a schedule ordered by serial. Serials may have
    /// holes after cancellations.
    async fn queue_snapshot(&self, schedule_id: ScheduleId) -> Result<Vec<Booking>>;

    /// A booking's call history, oldest first.
    async fn list_call_events(&self, booking_id: BookingId) -> Result<Vec<CallEvent>>;
}

/// Serial number assigned to the next booking of a schedule.
///
/// Derived from the highest serial ever assigned, recomputed inside the
/// coordinator's transaction; the schedule row lock is what makes the
/// recomputation race-free. Cancelled bookings keep their serial, so the
/// sequence never reuses one even after the queue develops holes.
pub fn next_serial(highest_assigned: Option<i32>) -> i32 {
    highest_assigned.unwrap_or(0) + 1
}
