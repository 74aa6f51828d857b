//! Booking service wrapping the transactional coordinators.

use chrono::NaiveDate;
use serde::Deserialize;

use common::{BookingId, DoctorId, HalfDay, PatientId, ScheduleId};
use registry::{
    AvailabilityQuery, AvailableSlot, BookingStatus, BookingSummary, CancellationReceipt,
    RegistryError, RegistryStore, ScheduleSelector,
};

use crate::error::DomainError;

/// A patient's request to book one capacity unit.
///
/// The target schedule is named either directly by `schedule_id` or by
/// the unique (doctor, date, half-day) session triple. Supplying both
/// forms, or an incomplete triple, is an input error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    pub schedule_id: Option<ScheduleId>,
    pub doctor_id: Option<DoctorId>,
    pub date: Option<NaiveDate>,
    pub half_day: Option<HalfDay>,

    /// Optional display label ("08:00-09:00") echoed back on the
    /// confirmation.
    pub time_label: Option<String>,
}

impl BookingRequest {
    /// Targets a schedule by its identifier.
    pub fn for_schedule(schedule_id: ScheduleId) -> Self {
        Self {
            schedule_id: Some(schedule_id),
            ..Self::default()
        }
    }

    /// Targets a schedule by its session triple.
    pub fn for_session(doctor_id: DoctorId, date: NaiveDate, half_day: HalfDay) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            date: Some(date),
            half_day: Some(half_day),
            ..Self::default()
        }
    }

    /// Attaches a display-hour label to the request.
    pub fn at(mut self, time_label: impl Into<String>) -> Self {
        self.time_label = Some(time_label.into());
        self
    }

    fn selector(&self) -> Result<ScheduleSelector, DomainError> {
        Ok(ScheduleSelector::from_parts(
            self.schedule_id,
            self.doctor_id,
            self.date,
            self.half_day,
        )?)
    }
}

/// Service for creating, cancelling, and reading bookings.
///
/// The store performs every mutation as one atomic unit of work; this
/// layer adds request validation, instrumentation, and metrics.
pub struct BookingService<S: RegistryStore> {
    store: S,
}

impl<S: RegistryStore> BookingService<S> {
    /// Creates a new booking service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Books one capacity unit for the patient.
    ///
    /// Resolves the selector, then hands off to the store's booking
    /// coordinator: lock the schedule row, re-check capacity, assign the
    /// next serial, insert, decrement, commit.
    #[tracing::instrument(skip(self, request), fields(patient_id = %patient_id))]
    pub async fn create_booking(
        &self,
        patient_id: PatientId,
        request: BookingRequest,
    ) -> Result<BookingSummary, DomainError> {
        let selector = request.selector()?;
        let start = std::time::Instant::now();

        let result = self
            .store
            .create_booking(patient_id, &selector, request.time_label.as_deref())
            .await;

        match &result {
            Ok(summary) => {
                metrics::counter!("bookings_created_total").increment(1);
                metrics::histogram!("booking_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                tracing::info!(
                    booking_id = %summary.booking_id,
                    schedule_id = %summary.schedule_id,
                    serial = summary.serial,
                    "booking created"
                );
            }
            Err(RegistryError::SlotExhausted { schedule_id }) => {
                metrics::counter!("booking_slot_exhausted_total").increment(1);
                tracing::info!(%schedule_id, "booking rejected, schedule full");
            }
            Err(err) => {
                tracing::warn!(error = %err, "booking failed");
            }
        }

        Ok(result?)
    }

    /// Cancels a booking owned by the patient and restores its capacity
    /// unit. The serial is never reassigned.
    #[tracing::instrument(skip(self), fields(patient_id = %patient_id, booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<CancellationReceipt, DomainError> {
        let receipt = self.store.cancel_booking(patient_id, booking_id).await?;
        metrics::counter!("bookings_cancelled_total").increment(1);
        tracing::info!("booking cancelled");
        Ok(receipt)
    }

    /// The patient's valid bookings, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_bookings(
        &self,
        patient_id: PatientId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingSummary>, DomainError> {
        Ok(self.store.list_patient_bookings(patient_id, status).await?)
    }

    /// Detail for one of the patient's valid bookings.
    #[tracing::instrument(skip(self))]
    pub async fn get_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<BookingSummary, DomainError> {
        Ok(self.store.get_booking(patient_id, booking_id).await?)
    }

    /// Approved schedules with capacity left, ordered by date then
    /// half-day. The result is a snapshot; the booking coordinator
    /// re-checks capacity under lock.
    #[tracing::instrument(skip(self, query))]
    pub async fn list_available(
        &self,
        query: AvailabilityQuery,
    ) -> Result<Vec<AvailableSlot>, DomainError> {
        Ok(self.store.list_available(&query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::AdminId;
    use registry::{InMemoryRegistry, ReviewOutcome, SelectorError};

    async fn seed(store: &InMemoryRegistry, capacity: i32) -> (PatientId, DoctorId, ScheduleId) {
        let dept = store.create_department("Cardiology").await.unwrap();
        let doctor = store
            .create_doctor(dept.dept_id, "Chen Wei", "Chief Physician")
            .await
            .unwrap();
        let patient = store.create_patient("Li Na", "13800000001").await.unwrap();
        let schedule = store
            .publish_schedule(
                doctor.doctor_id,
                NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
                HalfDay::Am,
                capacity,
            )
            .await
            .unwrap();
        store
            .review_schedule(
                AdminId::new(1),
                schedule.schedule_id,
                ReviewOutcome::Approved,
                None,
            )
            .await
            .unwrap();
        (patient.patient_id, doctor.doctor_id, schedule.schedule_id)
    }

    #[tokio::test]
    async fn create_booking_by_schedule_id() {
        let store = InMemoryRegistry::new();
        let (patient_id, _, schedule_id) = seed(&store, 3).await;
        let service = BookingService::new(store);

        let summary = service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap();
        assert_eq!(summary.serial, 1);
        assert_eq!(summary.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn create_booking_echoes_time_label() {
        let store = InMemoryRegistry::new();
        let (patient_id, doctor_id, _) = seed(&store, 3).await;
        let service = BookingService::new(store);

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let summary = service
            .create_booking(
                patient_id,
                BookingRequest::for_session(doctor_id, date, HalfDay::Am).at("09:00-10:00"),
            )
            .await
            .unwrap();
        assert_eq!(summary.time_label.as_deref(), Some("09:00-10:00"));
    }

    #[tokio::test]
    async fn ambiguous_selector_is_rejected_before_the_store() {
        let store = InMemoryRegistry::new();
        let (patient_id, doctor_id, schedule_id) = seed(&store, 3).await;
        let service = BookingService::new(store);

        let request = BookingRequest {
            schedule_id: Some(schedule_id),
            doctor_id: Some(doctor_id),
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
            half_day: Some(HalfDay::Am),
            time_label: None,
        };
        let err = service.create_booking(patient_id, request).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Selector(SelectorError::Ambiguous)
        ));
    }

    #[tokio::test]
    async fn empty_selector_is_rejected() {
        let store = InMemoryRegistry::new();
        let (patient_id, _, _) = seed(&store, 3).await;
        let service = BookingService::new(store);

        let err = service
            .create_booking(patient_id, BookingRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Selector(SelectorError::Incomplete)
        ));
    }

    #[tokio::test]
    async fn exhausted_schedule_surfaces_registry_error() {
        let store = InMemoryRegistry::new();
        let (patient_id, _, schedule_id) = seed(&store, 1).await;
        let service = BookingService::new(store);

        service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap();
        let err = service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Registry(RegistryError::SlotExhausted { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_and_rebook_skips_the_freed_serial() {
        let store = InMemoryRegistry::new();
        let (patient_id, _, schedule_id) = seed(&store, 2).await;
        let service = BookingService::new(store);

        let first = service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap();
        service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap();

        let receipt = service
            .cancel_booking(patient_id, first.booking_id)
            .await
            .unwrap();
        assert_eq!(receipt.status, BookingStatus::Cancelled);

        let third = service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap();
        assert_eq!(third.serial, 3);
    }

    #[tokio::test]
    async fn list_available_reflects_bookings() {
        let store = InMemoryRegistry::new();
        let (patient_id, _, schedule_id) = seed(&store, 1).await;
        let service = BookingService::new(store);

        let open = service
            .list_available(AvailabilityQuery::new())
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].remaining, 1);

        service
            .create_booking(patient_id, BookingRequest::for_schedule(schedule_id))
            .await
            .unwrap();

        let open = service
            .list_available(AvailabilityQuery::new())
            .await
            .unwrap();
        assert!(open.is_empty());
    }
}
