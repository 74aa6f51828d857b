//! Queue-call workflow service.

use common::{BookingId, DoctorId, ScheduleId};
use registry::{Booking, CallEvent, RegistryStore, VisitOutcome};

use crate::error::DomainError;

/// Service for the doctor-side queue: calling patients in serial order
/// and closing out visits.
///
/// Serials may have holes after cancellations; the workflow always
/// filters on validity rather than assuming density.
pub struct QueueService<S: RegistryStore> {
    store: S,
}

impl<S: RegistryStore> QueueService<S> {
    /// Creates a new queue service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Calls the next pending patient in the doctor's queue (lowest
    /// serial among valid pending bookings) and logs the call.
    #[tracing::instrument(skip(self), fields(doctor_id = %doctor_id, schedule_id = %schedule_id))]
    pub async fn call_next(
        &self,
        doctor_id: DoctorId,
        schedule_id: ScheduleId,
    ) -> Result<Booking, DomainError> {
        let booking = self.store.call_next(doctor_id, schedule_id).await?;
        metrics::counter!("patients_called_total").increment(1);
        tracing::info!(
            booking_id = %booking.booking_id,
            serial = booking.serial,
            "patient called"
        );
        Ok(booking)
    }

    /// Closes out a called visit as completed.
    #[tracing::instrument(skip(self), fields(doctor_id = %doctor_id, booking_id = %booking_id))]
    pub async fn complete_visit(
        &self,
        doctor_id: DoctorId,
        booking_id: BookingId,
    ) -> Result<Booking, DomainError> {
        let booking = self
            .store
            .finish_visit(doctor_id, booking_id, VisitOutcome::Completed)
            .await?;
        metrics::counter!("visits_completed_total").increment(1);
        Ok(booking)
    }

    /// Records that a called patient did not show up.
    #[tracing::instrument(skip(self), fields(doctor_id = %doctor_id, booking_id = %booking_id))]
    pub async fn mark_missed(
        &self,
        doctor_id: DoctorId,
        booking_id: BookingId,
    ) -> Result<Booking, DomainError> {
        let booking = self
            .store
            .finish_visit(doctor_id, booking_id, VisitOutcome::Missed)
            .await?;
        metrics::counter!("visits_missed_total").increment(1);
        Ok(booking)
    }

    /// Valid bookings for a schedule, ordered by serial.
    #[tracing::instrument(skip(self))]
    pub async fn snapshot(&self, schedule_id: ScheduleId) -> Result<Vec<Booking>, DomainError> {
        Ok(self.store.queue_snapshot(schedule_id).await?)
    }

    /// A booking's call history, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn call_events(&self, booking_id: BookingId) -> Result<Vec<CallEvent>, DomainError> {
        Ok(self.store.list_call_events(booking_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::{AdminId, HalfDay, PatientId};
    use registry::{
        BookingStatus, CallAction, InMemoryRegistry, RegistryError, ReviewOutcome,
        ScheduleSelector,
    };

    async fn seed_with_bookings(
        store: &InMemoryRegistry,
        count: usize,
    ) -> (PatientId, DoctorId, ScheduleId, Vec<BookingId>) {
        let dept = store.create_department("Orthopedics").await.unwrap();
        let doctor = store
            .create_doctor(dept.dept_id, "Liu Yang", "Attending")
            .await
            .unwrap();
        let patient = store.create_patient("Wang Fang", "13800000002").await.unwrap();
        let schedule = store
            .publish_schedule(
                doctor.doctor_id,
                NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
                HalfDay::Am,
                10,
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

        let mut bookings = Vec::new();
        let selector = ScheduleSelector::by_id(schedule.schedule_id);
        for _ in 0..count {
            let summary = store
                .create_booking(patient.patient_id, &selector, None)
                .await
                .unwrap();
            bookings.push(summary.booking_id);
        }
        (
            patient.patient_id,
            doctor.doctor_id,
            schedule.schedule_id,
            bookings,
        )
    }

    #[tokio::test]
    async fn queue_drains_in_serial_order() {
        let store = InMemoryRegistry::new();
        let (_, doctor_id, schedule_id, bookings) = seed_with_bookings(&store, 2).await;
        let service = QueueService::new(store);

        let called = service.call_next(doctor_id, schedule_id).await.unwrap();
        assert_eq!(called.booking_id, bookings[0]);

        let done = service
            .complete_visit(doctor_id, called.booking_id)
            .await
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);

        let called = service.call_next(doctor_id, schedule_id).await.unwrap();
        assert_eq!(called.booking_id, bookings[1]);

        let missed = service
            .mark_missed(doctor_id, called.booking_id)
            .await
            .unwrap();
        assert_eq!(missed.status, BookingStatus::Missed);

        let err = service.call_next(doctor_id, schedule_id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Registry(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn finishing_a_pending_booking_is_invalid() {
        let store = InMemoryRegistry::new();
        let (_, doctor_id, _, bookings) = seed_with_bookings(&store, 1).await;
        let service = QueueService::new(store);

        // Never called.
        let err = service
            .complete_visit(doctor_id, bookings[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Registry(RegistryError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn snapshot_and_call_log_line_up() {
        let store = InMemoryRegistry::new();
        let (_, doctor_id, schedule_id, bookings) = seed_with_bookings(&store, 3).await;
        let service = QueueService::new(store);

        let queue = service.snapshot(schedule_id).await.unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.iter().map(|b| b.serial).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        service.call_next(doctor_id, schedule_id).await.unwrap();
        service.complete_visit(doctor_id, bookings[0]).await.unwrap();

        let events = service.call_events(bookings[0]).await.unwrap();
        let actions: Vec<CallAction> = events.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![CallAction::Called, CallAction::Completed]);
    }

    #[tokio::test]
    async fn foreign_doctor_cannot_drive_the_queue() {
        let store = InMemoryRegistry::new();
        let (_, _, schedule_id, _) = seed_with_bookings(&store, 1).await;
        let service = QueueService::new(store);

        let err = service
            .call_next(DoctorId::new(424242), schedule_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Registry(RegistryError::NotFound { .. })
        ));
    }
}
