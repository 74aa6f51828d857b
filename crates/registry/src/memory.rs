use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use common::{AdminId, BookingId, DeptId, DoctorId, HalfDay, PatientId, ScheduleId};

use crate::{
    ApprovalStatus, AvailabilityQuery, AvailableSlot, Booking, BookingStatus, BookingSummary,
    CallAction, CallEvent, CancellationReceipt, Department, Doctor, Patient, RegistryError,
    Result, ReviewOutcome, Schedule, ScheduleReview, ScheduleSelector, VisitOutcome,
    store::{RegistryStore, next_serial},
};

#[derive(Default)]
struct State {
    departments: Vec<Department>,
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
    schedules: Vec<Schedule>,
    bookings: Vec<Booking>,
    reviews: Vec<ScheduleReview>,
    call_events: Vec<CallEvent>,
    next_id: i64,
}

impl State {
    fn bump(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve_approved(&self, selector: &ScheduleSelector) -> Option<usize> {
        self.schedules.iter().position(|s| {
            s.approval == ApprovalStatus::Approved
                && match selector {
                    ScheduleSelector::ById(id) => s.schedule_id == *id,
                    ScheduleSelector::BySession {
                        doctor_id,
                        date,
                        half_day,
                    } => {
                        s.doctor_id == *doctor_id && s.date == *date && s.half_day == *half_day
                    }
                }
        })
    }

    fn summary(
        &self,
        booking: &Booking,
        time_label: Option<&str>,
    ) -> Result<BookingSummary> {
        let schedule = self
            .schedules
            .iter()
            .find(|s| s.schedule_id == booking.schedule_id)
            .ok_or_else(|| RegistryError::not_found("schedule"))?;
        let doctor = self
            .doctors
            .iter()
            .find(|d| d.doctor_id == schedule.doctor_id)
            .ok_or_else(|| RegistryError::not_found("doctor"))?;
        let department = self
            .departments
            .iter()
            .find(|d| d.dept_id == doctor.dept_id)
            .ok_or_else(|| RegistryError::not_found("department"))?;

        Ok(BookingSummary {
            booking_id: booking.booking_id,
            schedule_id: booking.schedule_id,
            doctor_name: doctor.name.clone(),
            doctor_title: doctor.title.clone(),
            department_name: department.name.clone(),
            schedule_date: schedule.date,
            half_day: schedule.half_day,
            time_label: time_label.map(String::from),
            serial: booking.serial,
            status: booking.status,
            created_at: booking.created_at,
        })
    }
}

/// In-memory registry implementation for tests and local development.
///
/// A single writer lock stands in for the database's row-level locking:
/// every mutating operation holds it for its full read-then-write span,
/// which serializes concurrent bookings exactly the way `FOR UPDATE`
/// does on the schedule row, and preserves the same observable
/// invariants.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<State>>,
}

impl InMemoryRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of booking rows ever created.
    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn create_department(&self, name: &str) -> Result<Department> {
        let mut state = self.state.write().await;
        if state.departments.iter().any(|d| d.name == name) {
            return Err(RegistryError::ConstraintViolation {
                constraint: "departments_name_key".to_string(),
            });
        }
        let department = Department {
            dept_id: DeptId::new(state.bump()),
            name: name.to_string(),
        };
        state.departments.push(department.clone());
        Ok(department)
    }

    async fn create_doctor(&self, dept_id: DeptId, name: &str, title: &str) -> Result<Doctor> {
        let mut state = self.state.write().await;
        if !state.departments.iter().any(|d| d.dept_id == dept_id) {
            return Err(RegistryError::not_found("department"));
        }
        let doctor = Doctor {
            doctor_id: DoctorId::new(state.bump()),
            dept_id,
            name: name.to_string(),
            title: title.to_string(),
        };
        state.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn create_patient(&self, name: &str, phone: &str) -> Result<Patient> {
        let mut state = self.state.write().await;
        let patient = Patient {
            patient_id: PatientId::new(state.bump()),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        state.patients.push(patient.clone());
        Ok(patient)
    }

    async fn publish_schedule(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        half_day: HalfDay,
        max_capacity: i32,
    ) -> Result<Schedule> {
        let mut state = self.state.write().await;
        if !state.doctors.iter().any(|d| d.doctor_id == doctor_id) {
            return Err(RegistryError::not_found("doctor"));
        }
        if max_capacity <= 0 {
            return Err(RegistryError::ConstraintViolation {
                constraint: "schedules_max_capacity_check".to_string(),
            });
        }
        if state
            .schedules
            .iter()
            .any(|s| s.doctor_id == doctor_id && s.date == date && s.half_day == half_day)
        {
            return Err(RegistryError::ConstraintViolation {
                constraint: "schedules_doctor_session_key".to_string(),
            });
        }
        let schedule = Schedule {
            schedule_id: ScheduleId::new(state.bump()),
            doctor_id,
            date,
            half_day,
            max_capacity,
            remaining: max_capacity,
            approval: ApprovalStatus::Pending,
        };
        state.schedules.push(schedule.clone());
        Ok(schedule)
    }

    async fn review_schedule(
        &self,
        admin_id: AdminId,
        schedule_id: ScheduleId,
        outcome: ReviewOutcome,
        reason: Option<&str>,
    ) -> Result<Schedule> {
        let mut state = self.state.write().await;
        let idx = state
            .schedules
            .iter()
            .position(|s| s.schedule_id == schedule_id)
            .ok_or_else(|| RegistryError::not_found("schedule"))?;

        if !state.schedules[idx].approval.is_pending() {
            return Err(RegistryError::InvalidState {
                operation: "review schedule",
                current: state.schedules[idx].approval.to_string(),
            });
        }

        state.schedules[idx].approval = match outcome {
            ReviewOutcome::Approved => ApprovalStatus::Approved,
            ReviewOutcome::Rejected => ApprovalStatus::Rejected,
        };

        let review = ScheduleReview {
            review_id: state.bump(),
            schedule_id,
            admin_id,
            outcome,
            reason: reason.map(String::from),
            reviewed_at: Utc::now(),
        };
        state.reviews.push(review);

        Ok(state.schedules[idx].clone())
    }

    async fn list_reviews(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleReview>> {
        let state = self.state.read().await;
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    async fn read_slot(&self, selector: &ScheduleSelector) -> Result<Schedule> {
        let state = self.state.read().await;
        let idx = state
            .resolve_approved(selector)
            .ok_or_else(|| RegistryError::not_found("schedule"))?;
        Ok(state.schedules[idx].clone())
    }

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Schedule> {
        let state = self.state.read().await;
        state
            .schedules
            .iter()
            .find(|s| s.schedule_id == schedule_id)
            .cloned()
            .ok_or_else(|| RegistryError::not_found("schedule"))
    }

    async fn create_booking(
        &self,
        patient_id: PatientId,
        selector: &ScheduleSelector,
        time_label: Option<&str>,
    ) -> Result<BookingSummary> {
        // The write lock spans the whole read-then-write sequence, which
        // is the in-memory equivalent of the schedule row lock.
        let mut state = self.state.write().await;

        if !state.patients.iter().any(|p| p.patient_id == patient_id) {
            return Err(RegistryError::not_found("patient"));
        }

        let idx = state
            .resolve_approved(selector)
            .ok_or_else(|| RegistryError::not_found("schedule"))?;
        let schedule_id = state.schedules[idx].schedule_id;

        if state.schedules[idx].remaining <= 0 {
            return Err(RegistryError::SlotExhausted { schedule_id });
        }

        let highest = state
            .bookings
            .iter()
            .filter(|b| b.schedule_id == schedule_id)
            .map(|b| b.serial)
            .max();
        let serial = next_serial(highest);

        let booking = Booking {
            booking_id: BookingId::new(state.bump()),
            patient_id,
            schedule_id,
            serial,
            status: BookingStatus::Pending,
            is_valid: true,
            created_at: Utc::now(),
        };
        state.bookings.push(booking.clone());

        state.schedules[idx].remaining -= 1;
        state.schedules[idx].assert_capacity_bounds();

        state.summary(&booking, time_label)
    }

    async fn cancel_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<CancellationReceipt> {
        let mut state = self.state.write().await;

        let idx = state
            .bookings
            .iter()
            .position(|b| {
                b.booking_id == booking_id && b.patient_id == patient_id && b.is_valid
            })
            .ok_or_else(|| RegistryError::not_found("booking"))?;

        if !state.bookings[idx].status.can_cancel() {
            return Err(RegistryError::InvalidState {
                operation: "cancel booking",
                current: state.bookings[idx].status.to_string(),
            });
        }

        state.bookings[idx].status = BookingStatus::Cancelled;
        state.bookings[idx].is_valid = false;
        let schedule_id = state.bookings[idx].schedule_id;

        let sched_idx = state
            .schedules
            .iter()
            .position(|s| s.schedule_id == schedule_id)
            .ok_or_else(|| RegistryError::not_found("schedule"))?;
        state.schedules[sched_idx].remaining += 1;
        state.schedules[sched_idx].assert_capacity_bounds();

        Ok(CancellationReceipt {
            booking_id,
            status: BookingStatus::Cancelled,
        })
    }

    async fn list_patient_bookings(
        &self,
        patient_id: PatientId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingSummary>> {
        let state = self.state.read().await;
        let mut bookings: Vec<&Booking> = state
            .bookings
            .iter()
            .filter(|b| {
                b.patient_id == patient_id
                    && b.is_valid
                    && status.is_none_or(|wanted| b.status == wanted)
            })
            .collect();
        bookings.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.booking_id.cmp(&a.booking_id))
        });

        bookings
            .into_iter()
            .map(|b| state.summary(b, None))
            .collect()
    }

    async fn get_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<BookingSummary> {
        let state = self.state.read().await;
        let booking = state
            .bookings
            .iter()
            .find(|b| b.booking_id == booking_id && b.patient_id == patient_id && b.is_valid)
            .ok_or_else(|| RegistryError::not_found("booking"))?;
        state.summary(booking, None)
    }

    async fn list_available(&self, query: &AvailabilityQuery) -> Result<Vec<AvailableSlot>> {
        let state = self.state.read().await;

        let mut slots = Vec::new();
        for schedule in &state.schedules {
            if schedule.approval != ApprovalStatus::Approved || schedule.remaining <= 0 {
                continue;
            }
            let Some(doctor) = state
                .doctors
                .iter()
                .find(|d| d.doctor_id == schedule.doctor_id)
            else {
                continue;
            };
            if let Some(doctor_id) = query.doctor_id
                && doctor.doctor_id != doctor_id
            {
                continue;
            }
            if let Some(dept_id) = query.dept_id
                && doctor.dept_id != dept_id
            {
                continue;
            }
            if let Some(date) = query.date
                && schedule.date != date
            {
                continue;
            }
            let Some(department) = state.departments.iter().find(|d| d.dept_id == doctor.dept_id)
            else {
                continue;
            };

            slots.push(AvailableSlot {
                schedule_id: schedule.schedule_id,
                doctor_id: doctor.doctor_id,
                doctor_name: doctor.name.clone(),
                doctor_title: doctor.title.clone(),
                department_name: department.name.clone(),
                date: schedule.date,
                half_day: schedule.half_day,
                hour_labels: schedule
                    .half_day
                    .hour_labels()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                remaining: schedule.remaining,
                max_capacity: schedule.max_capacity,
            });
        }

        slots.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.half_day.cmp(&b.half_day))
                .then(a.schedule_id.cmp(&b.schedule_id))
        });
        Ok(slots)
    }

    async fn call_next(&self, doctor_id: DoctorId, schedule_id: ScheduleId) -> Result<Booking> {
        let mut state = self.state.write().await;

        let owns = state.schedules.iter().any(|s| {
            s.schedule_id == schedule_id
                && s.doctor_id == doctor_id
                && s.approval == ApprovalStatus::Approved
        });
        if !owns {
            return Err(RegistryError::not_found("schedule"));
        }

        let idx = state
            .bookings
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                b.schedule_id == schedule_id && b.is_valid && b.status.can_call()
            })
            .min_by_key(|(_, b)| b.serial)
            .map(|(i, _)| i)
            .ok_or_else(|| RegistryError::not_found("booking"))?;

        state.bookings[idx].status = BookingStatus::Called;
        let booking = state.bookings[idx].clone();

        let event = CallEvent {
            event_id: state.bump(),
            booking_id: booking.booking_id,
            doctor_id,
            action: CallAction::Called,
            occurred_at: Utc::now(),
        };
        state.call_events.push(event);

        Ok(booking)
    }

    async fn finish_visit(
        &self,
        doctor_id: DoctorId,
        booking_id: BookingId,
        outcome: VisitOutcome,
    ) -> Result<Booking> {
        let mut state = self.state.write().await;

        let idx = state
            .bookings
            .iter()
            .position(|b| b.booking_id == booking_id && b.is_valid)
            .ok_or_else(|| RegistryError::not_found("booking"))?;

        let schedule_id = state.bookings[idx].schedule_id;
        let owns = state
            .schedules
            .iter()
            .any(|s| s.schedule_id == schedule_id && s.doctor_id == doctor_id);
        if !owns {
            return Err(RegistryError::not_found("booking"));
        }

        if !state.bookings[idx].status.can_finish() {
            return Err(RegistryError::InvalidState {
                operation: "close out visit",
                current: state.bookings[idx].status.to_string(),
            });
        }

        let (status, action) = match outcome {
            VisitOutcome::Completed => (BookingStatus::Completed, CallAction::Completed),
            VisitOutcome::Missed => (BookingStatus::Missed, CallAction::Missed),
        };
        state.bookings[idx].status = status;
        let booking = state.bookings[idx].clone();

        let event = CallEvent {
            event_id: state.bump(),
            booking_id,
            doctor_id,
            action,
            occurred_at: Utc::now(),
        };
        state.call_events.push(event);

        Ok(booking)
    }

    async fn queue_snapshot(&self, schedule_id: ScheduleId) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        let mut queue: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| b.schedule_id == schedule_id && b.is_valid)
            .cloned()
            .collect();
        queue.sort_by_key(|b| b.serial);
        Ok(queue)
    }

    async fn list_call_events(&self, booking_id: BookingId) -> Result<Vec<CallEvent>> {
        let state = self.state.read().await;
        Ok(state
            .call_events
            .iter()
            .filter(|e| e.booking_id == booking_id)
            .cloned()
            .collect())
    }
}
