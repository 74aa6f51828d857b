//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p registry --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use common::{AdminId, DoctorId, HalfDay, PatientId, ScheduleId};
use registry::{
    AvailabilityQuery, BookingStatus, CallAction, Doctor, Patient, PostgresRegistry,
    RegistryError, RegistryStore, ReviewOutcome, Schedule, ScheduleSelector, VisitOutcome,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_registry_schema.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresRegistry {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE call_events, schedule_reviews, bookings, schedules, \
         patients, doctors, departments RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresRegistry::new(pool)
}

/// Seeds a department, doctor, patient, and an approved schedule with
/// the given capacity.
async fn seed_session(
    store: &PostgresRegistry,
    capacity: i32,
) -> (Patient, Doctor, Schedule) {
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
    let schedule = store
        .review_schedule(
            AdminId::new(1),
            schedule.schedule_id,
            ReviewOutcome::Approved,
            None,
        )
        .await
        .unwrap();
    (patient, doctor, schedule)
}

async fn remaining(store: &PostgresRegistry, schedule_id: ScheduleId) -> i32 {
    store.get_schedule(schedule_id).await.unwrap().remaining
}

#[tokio::test]
async fn booking_assigns_serials_and_decrements() {
    let store = get_test_store().await;
    let (patient, _, schedule) = seed_session(&store, 5).await;
    let selector = ScheduleSelector::by_id(schedule.schedule_id);

    for expected in 1..=3 {
        let summary = store
            .create_booking(patient.patient_id, &selector, None)
            .await
            .unwrap();
        assert_eq!(summary.serial, expected);
        assert_eq!(summary.status, BookingStatus::Pending);
        assert_eq!(summary.doctor_name, "Chen Wei");
        assert_eq!(summary.department_name, "Cardiology");
    }

    assert_eq!(remaining(&store, schedule.schedule_id).await, 2);
}

#[tokio::test]
async fn booking_resolves_by_session_triple() {
    let store = get_test_store().await;
    let (patient, doctor, schedule) = seed_session(&store, 2).await;

    let selector =
        ScheduleSelector::by_session(doctor.doctor_id, schedule.date, schedule.half_day);
    let summary = store
        .create_booking(patient.patient_id, &selector, Some("08:00-09:00"))
        .await
        .unwrap();

    assert_eq!(summary.schedule_id, schedule.schedule_id);
    assert_eq!(summary.time_label.as_deref(), Some("08:00-09:00"));
}

#[tokio::test]
async fn concurrent_bookings_respect_the_capacity_bound() {
    let store = get_test_store().await;
    let (patient, _, schedule) = seed_session(&store, 3).await;
    let selector = ScheduleSelector::by_id(schedule.schedule_id);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let patient_id = patient.patient_id;
        handles.push(tokio::spawn(async move {
            store.create_booking(patient_id, &selector, None).await
        }));
    }

    let mut serials = Vec::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(summary) => serials.push(summary.serial),
            Err(RegistryError::SlotExhausted { .. }) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Exactly max_capacity admissions, serials dense from 1.
    serials.sort_unstable();
    assert_eq!(serials, vec![1, 2, 3]);
    assert_eq!(exhausted, 5);
    assert_eq!(remaining(&store, schedule.schedule_id).await, 0);

    let queue = store.queue_snapshot(schedule.schedule_id).await.unwrap();
    assert_eq!(queue.len(), 3);
}

#[tokio::test]
async fn failed_booking_leaves_no_trace() {
    let store = get_test_store().await;
    let (_, _, schedule) = seed_session(&store, 3).await;
    let selector = ScheduleSelector::by_id(schedule.schedule_id);

    let before = remaining(&store, schedule.schedule_id).await;

    let err = store
        .create_booking(PatientId::new(424242), &selector, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { entity: "patient" }));

    assert_eq!(remaining(&store, schedule.schedule_id).await, before);
    let queue = store.queue_snapshot(schedule.schedule_id).await.unwrap();
    assert!(queue.is_empty());
}

#[tokio::test]
async fn cancellation_restores_capacity_and_serials_are_never_reused() {
    let store = get_test_store().await;
    let (patient, _, schedule) = seed_session(&store, 2).await;
    let selector = ScheduleSelector::by_id(schedule.schedule_id);

    let first = store
        .create_booking(patient.patient_id, &selector, None)
        .await
        .unwrap();
    let second = store
        .create_booking(patient.patient_id, &selector, None)
        .await
        .unwrap();
    assert_eq!((first.serial, second.serial), (1, 2));
    assert_eq!(remaining(&store, schedule.schedule_id).await, 0);

    let receipt = store
        .cancel_booking(patient.patient_id, first.booking_id)
        .await
        .unwrap();
    assert_eq!(receipt.status, BookingStatus::Cancelled);
    assert_eq!(remaining(&store, schedule.schedule_id).await, 1);

    // Serial 1 is gone for good; the next booking gets 3.
    let third = store
        .create_booking(patient.patient_id, &selector, None)
        .await
        .unwrap();
    assert_eq!(third.serial, 3);

    // The surviving booking's serial is untouched, and the queue has a
    // hole where serial 1 used to be.
    let queue = store.queue_snapshot(schedule.schedule_id).await.unwrap();
    assert_eq!(
        queue.iter().map(|b| b.serial).collect::<Vec<_>>(),
        vec![2, 3]
    );
}

#[tokio::test]
async fn double_cancel_is_rejected_without_side_effect() {
    let store = get_test_store().await;
    let (patient, _, schedule) = seed_session(&store, 2).await;
    let selector = ScheduleSelector::by_id(schedule.schedule_id);

    let booking = store
        .create_booking(patient.patient_id, &selector, None)
        .await
        .unwrap();
    store
        .cancel_booking(patient.patient_id, booking.booking_id)
        .await
        .unwrap();

    let err = store
        .cancel_booking(patient.patient_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { entity: "booking" }));
    assert_eq!(remaining(&store, schedule.schedule_id).await, 2);
}

#[tokio::test]
async fn completed_visit_cannot_be_cancelled() {
    let store = get_test_store().await;
    let (patient, doctor, schedule) = seed_session(&store, 2).await;

    let booking = store
        .create_booking(
            patient.patient_id,
            &ScheduleSelector::by_id(schedule.schedule_id),
            None,
        )
        .await
        .unwrap();
    store
        .call_next(doctor.doctor_id, schedule.schedule_id)
        .await
        .unwrap();
    store
        .finish_visit(doctor.doctor_id, booking.booking_id, VisitOutcome::Completed)
        .await
        .unwrap();

    let err = store
        .cancel_booking(patient.patient_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidState { .. }));
}

#[tokio::test]
async fn duplicate_session_is_a_constraint_violation() {
    let store = get_test_store().await;
    let (_, doctor, schedule) = seed_session(&store, 2).await;

    let err = store
        .publish_schedule(doctor.doctor_id, schedule.date, schedule.half_day, 8)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::ConstraintViolation { ref constraint }
            if constraint == "schedules_doctor_session_key"
    ));
}

#[tokio::test]
async fn review_transitions_happen_once_and_are_audited() {
    let store = get_test_store().await;
    let dept = store.create_department("Neurology").await.unwrap();
    let doctor = store
        .create_doctor(dept.dept_id, "Sun Hao", "Resident")
        .await
        .unwrap();
    let schedule = store
        .publish_schedule(
            doctor.doctor_id,
            NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            HalfDay::Pm,
            6,
        )
        .await
        .unwrap();

    // Pending schedules are invisible to booking resolution.
    let err = store
        .read_slot(&ScheduleSelector::by_id(schedule.schedule_id))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));

    store
        .review_schedule(
            AdminId::new(3),
            schedule.schedule_id,
            ReviewOutcome::Rejected,
            Some("overlapping leave"),
        )
        .await
        .unwrap();

    let err = store
        .review_schedule(
            AdminId::new(3),
            schedule.schedule_id,
            ReviewOutcome::Approved,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidState { .. }));

    let trail = store.list_reviews(schedule.schedule_id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].outcome, ReviewOutcome::Rejected);
    assert_eq!(trail[0].reason.as_deref(), Some("overlapping leave"));
}

#[tokio::test]
async fn queue_workflow_logs_every_transition() {
    let store = get_test_store().await;
    let (patient, doctor, schedule) = seed_session(&store, 3).await;
    let selector = ScheduleSelector::by_id(schedule.schedule_id);

    let first = store
        .create_booking(patient.patient_id, &selector, None)
        .await
        .unwrap();
    let second = store
        .create_booking(patient.patient_id, &selector, None)
        .await
        .unwrap();

    let called = store
        .call_next(doctor.doctor_id, schedule.schedule_id)
        .await
        .unwrap();
    assert_eq!(called.booking_id, first.booking_id);

    store
        .finish_visit(doctor.doctor_id, first.booking_id, VisitOutcome::Completed)
        .await
        .unwrap();

    let called = store
        .call_next(doctor.doctor_id, schedule.schedule_id)
        .await
        .unwrap();
    assert_eq!(called.booking_id, second.booking_id);

    store
        .finish_visit(doctor.doctor_id, second.booking_id, VisitOutcome::Missed)
        .await
        .unwrap();

    let err = store
        .call_next(doctor.doctor_id, schedule.schedule_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { entity: "booking" }));

    let events = store.list_call_events(first.booking_id).await.unwrap();
    let actions: Vec<CallAction> = events.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![CallAction::Called, CallAction::Completed]);

    let events = store.list_call_events(second.booking_id).await.unwrap();
    let actions: Vec<CallAction> = events.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![CallAction::Called, CallAction::Missed]);
}

#[tokio::test]
async fn foreign_doctor_cannot_finish_a_visit() {
    let store = get_test_store().await;
    let (patient, doctor, schedule) = seed_session(&store, 2).await;

    let booking = store
        .create_booking(
            patient.patient_id,
            &ScheduleSelector::by_id(schedule.schedule_id),
            None,
        )
        .await
        .unwrap();
    store
        .call_next(doctor.doctor_id, schedule.schedule_id)
        .await
        .unwrap();

    let err = store
        .finish_visit(
            DoctorId::new(424242),
            booking.booking_id,
            VisitOutcome::Completed,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
}

#[tokio::test]
async fn availability_filters_and_excludes_full_schedules() {
    let store = get_test_store().await;
    let (patient, doctor, schedule) = seed_session(&store, 1).await;

    let dept2 = store.create_department("Dermatology").await.unwrap();
    let doctor2 = store
        .create_doctor(dept2.dept_id, "Zhang Min", "Attending")
        .await
        .unwrap();
    let schedule2 = store
        .publish_schedule(
            doctor2.doctor_id,
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            HalfDay::Pm,
            4,
        )
        .await
        .unwrap();
    store
        .review_schedule(
            AdminId::new(1),
            schedule2.schedule_id,
            ReviewOutcome::Approved,
            None,
        )
        .await
        .unwrap();

    let all = store
        .list_available(&AvailabilityQuery::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    // Date-then-half-day ordering.
    assert_eq!(all[0].schedule_id, schedule.schedule_id);
    assert_eq!(all[0].hour_labels.len(), 4);

    let by_doctor = store
        .list_available(&AvailabilityQuery::new().doctor(doctor.doctor_id))
        .await
        .unwrap();
    assert_eq!(by_doctor.len(), 1);

    let by_dept = store
        .list_available(&AvailabilityQuery::new().dept(dept2.dept_id))
        .await
        .unwrap();
    assert_eq!(by_dept.len(), 1);
    assert_eq!(by_dept[0].department_name, "Dermatology");

    // Booking out the single slot drops the first schedule from the view.
    store
        .create_booking(
            patient.patient_id,
            &ScheduleSelector::by_id(schedule.schedule_id),
            None,
        )
        .await
        .unwrap();
    let open = store
        .list_available(&AvailabilityQuery::new())
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].schedule_id, schedule2.schedule_id);
}

#[tokio::test]
async fn patient_booking_views_are_scoped_to_the_owner() {
    let store = get_test_store().await;
    let (patient, _, schedule) = seed_session(&store, 3).await;
    let other = store.create_patient("Zhao Lei", "13800000003").await.unwrap();

    let booking = store
        .create_booking(
            patient.patient_id,
            &ScheduleSelector::by_id(schedule.schedule_id),
            None,
        )
        .await
        .unwrap();

    let mine = store
        .list_patient_bookings(patient.patient_id, None)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let theirs = store
        .list_patient_bookings(other.patient_id, None)
        .await
        .unwrap();
    assert!(theirs.is_empty());

    let err = store
        .get_booking(other.patient_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));

    let filtered = store
        .list_patient_bookings(patient.patient_id, Some(BookingStatus::Pending))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
}
