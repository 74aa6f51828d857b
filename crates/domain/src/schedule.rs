//! Schedule publication and admin review service.

use chrono::NaiveDate;

use common::{AdminId, DoctorId, HalfDay, ScheduleId};
use registry::{RegistryStore, ReviewOutcome, Schedule, ScheduleReview, ScheduleSelector};

use crate::error::DomainError;

/// Service for the schedule lifecycle: publication by doctors and
/// approval or rejection by admins.
pub struct ScheduleService<S: RegistryStore> {
    store: S,
}

impl<S: RegistryStore> ScheduleService<S> {
    /// Creates a new schedule service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Publishes a pending schedule with `remaining` equal to
    /// `max_capacity`. At most one schedule may exist per (doctor, date,
    /// half-day).
    #[tracing::instrument(skip(self), fields(doctor_id = %doctor_id, %date, %half_day))]
    pub async fn publish(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        half_day: HalfDay,
        max_capacity: i32,
    ) -> Result<Schedule, DomainError> {
        if max_capacity <= 0 {
            return Err(DomainError::invalid(format!(
                "max_capacity must be positive, got {max_capacity}"
            )));
        }

        let schedule = self
            .store
            .publish_schedule(doctor_id, date, half_day, max_capacity)
            .await?;
        metrics::counter!("schedules_published_total").increment(1);
        tracing::info!(schedule_id = %schedule.schedule_id, "schedule published");
        Ok(schedule)
    }

    /// Applies an admin review to a pending schedule; the outcome and an
    /// optional reason land in the audit trail atomically.
    #[tracing::instrument(skip(self, reason), fields(admin_id = %admin_id, schedule_id = %schedule_id))]
    pub async fn review(
        &self,
        admin_id: AdminId,
        schedule_id: ScheduleId,
        outcome: ReviewOutcome,
        reason: Option<&str>,
    ) -> Result<Schedule, DomainError> {
        let schedule = self
            .store
            .review_schedule(admin_id, schedule_id, outcome, reason)
            .await?;
        metrics::counter!("schedules_reviewed_total", "outcome" => outcome.as_str()).increment(1);
        tracing::info!(%outcome, "schedule reviewed");
        Ok(schedule)
    }

    /// The audit trail for a schedule, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn reviews(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleReview>, DomainError> {
        Ok(self.store.list_reviews(schedule_id).await?)
    }

    /// Capacity state of the approved schedule the selector resolves to.
    #[tracing::instrument(skip(self, selector))]
    pub async fn slot(&self, selector: &ScheduleSelector) -> Result<Schedule, DomainError> {
        Ok(self.store.read_slot(selector).await?)
    }
}
