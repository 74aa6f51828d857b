use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use common::{AdminId, BookingId, DeptId, DoctorId, HalfDay, PatientId, ScheduleId};

use crate::{
    ApprovalStatus, AvailabilityQuery, AvailableSlot, Booking, BookingStatus, BookingSummary,
    CallAction, CallEvent, CancellationReceipt, Department, Doctor, Patient, RegistryError,
    Result, ReviewOutcome, Schedule, ScheduleReview, ScheduleSelector, VisitOutcome,
    store::{RegistryStore, next_serial},
};

/// PostgreSQL-backed registry implementation.
///
/// Row-level locking on the schedule row (`SELECT … FOR UPDATE`) is the
/// sole mechanism serializing concurrent booking attempts against the
/// same schedule; attempts against different schedules proceed fully in
/// parallel.
#[derive(Clone)]
pub struct PostgresRegistry {
    pool: PgPool,
}

impl PostgresRegistry {
    /// Creates a new PostgreSQL registry over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a fresh pool to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(map_db_err)?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Locks the approved schedule the selector resolves to, for the
    /// duration of the surrounding transaction.
    async fn lock_schedule(
        tx: &mut Transaction<'_, Postgres>,
        selector: &ScheduleSelector,
    ) -> Result<Schedule> {
        let row = match selector {
            ScheduleSelector::ById(schedule_id) => {
                sqlx::query(
                    r#"
                    SELECT schedule_id, doctor_id, schedule_date, half_day,
                           max_capacity, remaining, approval
                    FROM schedules
                    WHERE schedule_id = $1 AND approval = 'approved'
                    FOR UPDATE
                    "#,
                )
                .bind(schedule_id.as_i64())
                .fetch_optional(&mut **tx)
                .await
            }
            ScheduleSelector::BySession {
                doctor_id,
                date,
                half_day,
            } => {
                sqlx::query(
                    r#"
                    SELECT schedule_id, doctor_id, schedule_date, half_day,
                           max_capacity, remaining, approval
                    FROM schedules
                    WHERE doctor_id = $1 AND schedule_date = $2 AND half_day = $3
                      AND approval = 'approved'
                    FOR UPDATE
                    "#,
                )
                .bind(doctor_id.as_i64())
                .bind(date)
                .bind(half_day.as_str())
                .fetch_optional(&mut **tx)
                .await
            }
        }
        .map_err(map_db_err)?;

        row.map(row_to_schedule)
            .transpose()?
            .ok_or_else(|| RegistryError::not_found("schedule"))
    }

    async fn fetch_summary(
        &self,
        booking_id: BookingId,
        time_label: Option<&str>,
    ) -> Result<BookingSummary> {
        let row = sqlx::query(
            r#"
            SELECT b.booking_id, b.schedule_id, b.serial, b.status, b.created_at,
                   s.schedule_date, s.half_day,
                   d.name AS doctor_name, d.title AS doctor_title,
                   dep.name AS department_name
            FROM bookings b
            JOIN schedules s ON s.schedule_id = b.schedule_id
            JOIN doctors d ON d.doctor_id = s.doctor_id
            JOIN departments dep ON dep.dept_id = d.dept_id
            WHERE b.booking_id = $1
            "#,
        )
        .bind(booking_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| RegistryError::not_found("booking"))?;

        row_to_summary(row, time_label)
    }
}

/// Per-transaction lock budget: a blocked `FOR UPDATE` gives up with
/// 55P03 instead of queueing indefinitely.
async fn set_lock_timeout(tx: &mut Transaction<'_, Postgres>) -> Result<()> {
    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut **tx)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

async fn patient_exists(tx: &mut Transaction<'_, Postgres>, patient_id: PatientId) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM patients WHERE patient_id = $1")
        .bind(patient_id.as_i64())
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_err)?;
    Ok(found.is_some())
}

fn map_db_err(e: sqlx::Error) -> RegistryError {
    if matches!(e, sqlx::Error::PoolTimedOut) {
        return RegistryError::OperationTimeout;
    }
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.code().as_deref() {
            // lock_not_available: the row lock was not acquired in time.
            Some("55P03") => return RegistryError::OperationTimeout,
            // unique_violation / check_violation: an invariant broke at
            // commit time, surfaced as a conflict.
            Some("23505") | Some("23514") => {
                return RegistryError::ConstraintViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
            _ => {}
        }
    }
    RegistryError::Database(e)
}

fn decode_half_day(s: &str) -> Result<HalfDay> {
    HalfDay::parse(s)
        .ok_or_else(|| RegistryError::Database(sqlx::Error::Decode(
            format!("invalid half_day value: {s}").into(),
        )))
}

fn decode_approval(s: &str) -> Result<ApprovalStatus> {
    ApprovalStatus::parse(s)
        .ok_or_else(|| RegistryError::Database(sqlx::Error::Decode(
            format!("invalid approval value: {s}").into(),
        )))
}

fn decode_status(s: &str) -> Result<BookingStatus> {
    BookingStatus::parse(s)
        .ok_or_else(|| RegistryError::Database(sqlx::Error::Decode(
            format!("invalid booking status value: {s}").into(),
        )))
}

fn decode_action(s: &str) -> Result<CallAction> {
    CallAction::parse(s)
        .ok_or_else(|| RegistryError::Database(sqlx::Error::Decode(
            format!("invalid call action value: {s}").into(),
        )))
}

fn decode_outcome(s: &str) -> Result<ReviewOutcome> {
    ReviewOutcome::parse(s)
        .ok_or_else(|| RegistryError::Database(sqlx::Error::Decode(
            format!("invalid review outcome value: {s}").into(),
        )))
}

fn row_to_schedule(row: PgRow) -> Result<Schedule> {
    let half_day: String = row.try_get("half_day")?;
    let approval: String = row.try_get("approval")?;
    Ok(Schedule {
        schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
        doctor_id: DoctorId::new(row.try_get("doctor_id")?),
        date: row.try_get("schedule_date")?,
        half_day: decode_half_day(&half_day)?,
        max_capacity: row.try_get("max_capacity")?,
        remaining: row.try_get("remaining")?,
        approval: decode_approval(&approval)?,
    })
}

fn row_to_booking(row: PgRow) -> Result<Booking> {
    let status: String = row.try_get("status")?;
    Ok(Booking {
        booking_id: BookingId::new(row.try_get("booking_id")?),
        patient_id: PatientId::new(row.try_get("patient_id")?),
        schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
        serial: row.try_get("serial")?,
        status: decode_status(&status)?,
        is_valid: row.try_get("is_valid")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_summary(row: PgRow, time_label: Option<&str>) -> Result<BookingSummary> {
    let half_day: String = row.try_get("half_day")?;
    let status: String = row.try_get("status")?;
    Ok(BookingSummary {
        booking_id: BookingId::new(row.try_get("booking_id")?),
        schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
        doctor_name: row.try_get("doctor_name")?,
        doctor_title: row.try_get("doctor_title")?,
        department_name: row.try_get("department_name")?,
        schedule_date: row.try_get("schedule_date")?,
        half_day: decode_half_day(&half_day)?,
        time_label: time_label.map(String::from),
        serial: row.try_get("serial")?,
        status: decode_status(&status)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RegistryStore for PostgresRegistry {
    async fn create_department(&self, name: &str) -> Result<Department> {
        let dept_id: i64 = sqlx::query_scalar(
            "INSERT INTO departments (name) VALUES ($1) RETURNING dept_id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(Department {
            dept_id: DeptId::new(dept_id),
            name: name.to_string(),
        })
    }

    async fn create_doctor(&self, dept_id: DeptId, name: &str, title: &str) -> Result<Doctor> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM departments WHERE dept_id = $1")
                .bind(dept_id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_err)?;
        if exists.is_none() {
            return Err(RegistryError::not_found("department"));
        }

        let doctor_id: i64 = sqlx::query_scalar(
            "INSERT INTO doctors (dept_id, name, title) VALUES ($1, $2, $3) RETURNING doctor_id",
        )
        .bind(dept_id.as_i64())
        .bind(name)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(Doctor {
            doctor_id: DoctorId::new(doctor_id),
            dept_id,
            name: name.to_string(),
            title: title.to_string(),
        })
    }

    async fn create_patient(&self, name: &str, phone: &str) -> Result<Patient> {
        let patient_id: i64 = sqlx::query_scalar(
            "INSERT INTO patients (name, phone) VALUES ($1, $2) RETURNING patient_id",
        )
        .bind(name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(Patient {
            patient_id: PatientId::new(patient_id),
            name: name.to_string(),
            phone: phone.to_string(),
        })
    }

    async fn publish_schedule(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        half_day: HalfDay,
        max_capacity: i32,
    ) -> Result<Schedule> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM doctors WHERE doctor_id = $1")
            .bind(doctor_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        if exists.is_none() {
            return Err(RegistryError::not_found("doctor"));
        }

        let schedule_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO schedules (doctor_id, schedule_date, half_day, max_capacity, remaining)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING schedule_id
            "#,
        )
        .bind(doctor_id.as_i64())
        .bind(date)
        .bind(half_day.as_str())
        .bind(max_capacity)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(Schedule {
            schedule_id: ScheduleId::new(schedule_id),
            doctor_id,
            date,
            half_day,
            max_capacity,
            remaining: max_capacity,
            approval: ApprovalStatus::Pending,
        })
    }

    async fn review_schedule(
        &self,
        admin_id: AdminId,
        schedule_id: ScheduleId,
        outcome: ReviewOutcome,
        reason: Option<&str>,
    ) -> Result<Schedule> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        set_lock_timeout(&mut tx).await?;

        let row = sqlx::query(
            r#"
            SELECT schedule_id, doctor_id, schedule_date, half_day,
                   max_capacity, remaining, approval
            FROM schedules
            WHERE schedule_id = $1
            FOR UPDATE
            "#,
        )
        .bind(schedule_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| RegistryError::not_found("schedule"))?;

        let mut schedule = row_to_schedule(row)?;
        if !schedule.approval.is_pending() {
            return Err(RegistryError::InvalidState {
                operation: "review schedule",
                current: schedule.approval.to_string(),
            });
        }

        let approval = match outcome {
            ReviewOutcome::Approved => ApprovalStatus::Approved,
            ReviewOutcome::Rejected => ApprovalStatus::Rejected,
        };

        sqlx::query("UPDATE schedules SET approval = $1 WHERE schedule_id = $2")
            .bind(approval.as_str())
            .bind(schedule_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        sqlx::query(
            r#"
            INSERT INTO schedule_reviews (schedule_id, admin_id, outcome, reason)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(schedule_id.as_i64())
        .bind(admin_id.as_i64())
        .bind(outcome.as_str())
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        schedule.approval = approval;
        Ok(schedule)
    }

    async fn list_reviews(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleReview>> {
        let rows = sqlx::query(
            r#"
            SELECT review_id, schedule_id, admin_id, outcome, reason, reviewed_at
            FROM schedule_reviews
            WHERE schedule_id = $1
            ORDER BY reviewed_at ASC, review_id ASC
            "#,
        )
        .bind(schedule_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter()
            .map(|row| {
                let outcome: String = row.try_get("outcome")?;
                Ok(ScheduleReview {
                    review_id: row.try_get("review_id")?,
                    schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
                    admin_id: AdminId::new(row.try_get("admin_id")?),
                    outcome: decode_outcome(&outcome)?,
                    reason: row.try_get("reason")?,
                    reviewed_at: row.try_get("reviewed_at")?,
                })
            })
            .collect()
    }

    async fn read_slot(&self, selector: &ScheduleSelector) -> Result<Schedule> {
        let row = match selector {
            ScheduleSelector::ById(schedule_id) => {
                sqlx::query(
                    r#"
                    SELECT schedule_id, doctor_id, schedule_date, half_day,
                           max_capacity, remaining, approval
                    FROM schedules
                    WHERE schedule_id = $1 AND approval = 'approved'
                    "#,
                )
                .bind(schedule_id.as_i64())
                .fetch_optional(&self.pool)
                .await
            }
            ScheduleSelector::BySession {
                doctor_id,
                date,
                half_day,
            } => {
                sqlx::query(
                    r#"
                    SELECT schedule_id, doctor_id, schedule_date, half_day,
                           max_capacity, remaining, approval
                    FROM schedules
                    WHERE doctor_id = $1 AND schedule_date = $2 AND half_day = $3
                      AND approval = 'approved'
                    "#,
                )
                .bind(doctor_id.as_i64())
                .bind(date)
                .bind(half_day.as_str())
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(map_db_err)?;

        row.map(row_to_schedule)
            .transpose()?
            .ok_or_else(|| RegistryError::not_found("schedule"))
    }

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Schedule> {
        let row = sqlx::query(
            r#"
            SELECT schedule_id, doctor_id, schedule_date, half_day,
                   max_capacity, remaining, approval
            FROM schedules
            WHERE schedule_id = $1
            "#,
        )
        .bind(schedule_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        row.map(row_to_schedule)
            .transpose()?
            .ok_or_else(|| RegistryError::not_found("schedule"))
    }

    async fn create_booking(
        &self,
        patient_id: PatientId,
        selector: &ScheduleSelector,
        time_label: Option<&str>,
    ) -> Result<BookingSummary> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        set_lock_timeout(&mut tx).await?;

        if !patient_exists(&mut tx, patient_id).await? {
            return Err(RegistryError::not_found("patient"));
        }

        // The row lock serializes every concurrent booking attempt
        // against this schedule until commit or rollback.
        let schedule = Self::lock_schedule(&mut tx, selector).await?;

        if schedule.remaining <= 0 {
            return Err(RegistryError::SlotExhausted {
                schedule_id: schedule.schedule_id,
            });
        }

        // Recomputed under the lock; cancelled bookings keep their serial,
        // so MAX covers every serial ever handed out.
        let highest: Option<i32> =
            sqlx::query_scalar("SELECT MAX(serial) FROM bookings WHERE schedule_id = $1")
                .bind(schedule.schedule_id.as_i64())
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_err)?;
        let serial = next_serial(highest);

        let booking_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (patient_id, schedule_id, serial, status, is_valid)
            VALUES ($1, $2, $3, 'pending', TRUE)
            RETURNING booking_id
            "#,
        )
        .bind(patient_id.as_i64())
        .bind(schedule.schedule_id.as_i64())
        .bind(serial)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query("UPDATE schedules SET remaining = remaining - 1 WHERE schedule_id = $1")
            .bind(schedule.schedule_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        tracing::debug!(
            booking_id,
            schedule_id = %schedule.schedule_id,
            serial,
            "booking committed"
        );

        self.fetch_summary(BookingId::new(booking_id), time_label)
            .await
    }

    async fn cancel_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<CancellationReceipt> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        set_lock_timeout(&mut tx).await?;

        let row = sqlx::query(
            r#"
            SELECT booking_id, patient_id, schedule_id, serial, status, is_valid, created_at
            FROM bookings
            WHERE booking_id = $1 AND patient_id = $2 AND is_valid
            FOR UPDATE
            "#,
        )
        .bind(booking_id.as_i64())
        .bind(patient_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| RegistryError::not_found("booking"))?;

        let booking = row_to_booking(row)?;
        if !booking.status.can_cancel() {
            return Err(RegistryError::InvalidState {
                operation: "cancel booking",
                current: booking.status.to_string(),
            });
        }

        sqlx::query(
            "UPDATE bookings SET status = 'cancelled', is_valid = FALSE WHERE booking_id = $1",
        )
        .bind(booking_id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let row = sqlx::query(
            r#"
            UPDATE schedules SET remaining = remaining + 1
            WHERE schedule_id = $1
            RETURNING remaining, max_capacity
            "#,
        )
        .bind(booking.schedule_id.as_i64())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;

        // A decrement always preceded this increment; the CHECK constraint
        // backs the assertion in release builds.
        let remaining: i32 = row.try_get("remaining")?;
        let max_capacity: i32 = row.try_get("max_capacity")?;
        debug_assert!(remaining <= max_capacity);

        tx.commit().await.map_err(map_db_err)?;
        tracing::debug!(%booking_id, schedule_id = %booking.schedule_id, "booking cancelled");

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
        let mut sql = String::from(
            r#"
            SELECT b.booking_id, b.schedule_id, b.serial, b.status, b.created_at,
                   s.schedule_date, s.half_day,
                   d.name AS doctor_name, d.title AS doctor_title,
                   dep.name AS department_name
            FROM bookings b
            JOIN schedules s ON s.schedule_id = b.schedule_id
            JOIN doctors d ON d.doctor_id = s.doctor_id
            JOIN departments dep ON dep.dept_id = d.dept_id
            WHERE b.patient_id = $1 AND b.is_valid
            "#,
        );
        if status.is_some() {
            sql.push_str(" AND b.status = $2");
        }
        sql.push_str(" ORDER BY b.created_at DESC, b.booking_id DESC");

        let mut query = sqlx::query(&sql).bind(patient_id.as_i64());
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(map_db_err)?;
        rows.into_iter().map(|row| row_to_summary(row, None)).collect()
    }

    async fn get_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<BookingSummary> {
        let row = sqlx::query(
            r#"
            SELECT b.booking_id, b.schedule_id, b.serial, b.status, b.created_at,
                   s.schedule_date, s.half_day,
                   d.name AS doctor_name, d.title AS doctor_title,
                   dep.name AS department_name
            FROM bookings b
            JOIN schedules s ON s.schedule_id = b.schedule_id
            JOIN doctors d ON d.doctor_id = s.doctor_id
            JOIN departments dep ON dep.dept_id = d.dept_id
            WHERE b.booking_id = $1 AND b.patient_id = $2 AND b.is_valid
            "#,
        )
        .bind(booking_id.as_i64())
        .bind(patient_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| RegistryError::not_found("booking"))?;

        row_to_summary(row, None)
    }

    async fn list_available(&self, query: &AvailabilityQuery) -> Result<Vec<AvailableSlot>> {
        let mut sql = String::from(
            r#"
            SELECT s.schedule_id, s.doctor_id, s.schedule_date, s.half_day,
                   s.remaining, s.max_capacity,
                   d.name AS doctor_name, d.title AS doctor_title,
                   dep.name AS department_name
            FROM schedules s
            JOIN doctors d ON d.doctor_id = s.doctor_id
            JOIN departments dep ON dep.dept_id = d.dept_id
            WHERE s.approval = 'approved' AND s.remaining > 0
            "#,
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.dept_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND dep.dept_id = ${param_count}"));
        }
        if query.doctor_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND s.doctor_id = ${param_count}"));
        }
        if query.date.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND s.schedule_date = ${param_count}"));
        }

        sql.push_str(" ORDER BY s.schedule_date ASC, s.half_day ASC, s.schedule_id ASC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(dept_id) = query.dept_id {
            sqlx_query = sqlx_query.bind(dept_id.as_i64());
        }
        if let Some(doctor_id) = query.doctor_id {
            sqlx_query = sqlx_query.bind(doctor_id.as_i64());
        }
        if let Some(date) = query.date {
            sqlx_query = sqlx_query.bind(date);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await.map_err(map_db_err)?;
        rows.into_iter()
            .map(|row| {
                let half_day: String = row.try_get("half_day")?;
                let half_day = decode_half_day(&half_day)?;
                Ok(AvailableSlot {
                    schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
                    doctor_id: DoctorId::new(row.try_get("doctor_id")?),
                    doctor_name: row.try_get("doctor_name")?,
                    doctor_title: row.try_get("doctor_title")?,
                    department_name: row.try_get("department_name")?,
                    date: row.try_get("schedule_date")?,
                    half_day,
                    hour_labels: half_day
                        .hour_labels()
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    remaining: row.try_get("remaining")?,
                    max_capacity: row.try_get("max_capacity")?,
                })
            })
            .collect()
    }

    async fn call_next(&self, doctor_id: DoctorId, schedule_id: ScheduleId) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        set_lock_timeout(&mut tx).await?;

        let owns: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM schedules
            WHERE schedule_id = $1 AND doctor_id = $2 AND approval = 'approved'
            FOR UPDATE
            "#,
        )
        .bind(schedule_id.as_i64())
        .bind(doctor_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?;
        if owns.is_none() {
            return Err(RegistryError::not_found("schedule"));
        }

        let row = sqlx::query(
            r#"
            SELECT booking_id, patient_id, schedule_id, serial, status, is_valid, created_at
            FROM bookings
            WHERE schedule_id = $1 AND is_valid AND status = 'pending'
            ORDER BY serial ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(schedule_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| RegistryError::not_found("booking"))?;

        let mut booking = row_to_booking(row)?;

        sqlx::query("UPDATE bookings SET status = 'called' WHERE booking_id = $1")
            .bind(booking.booking_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        sqlx::query(
            "INSERT INTO call_events (booking_id, doctor_id, action) VALUES ($1, $2, 'called')",
        )
        .bind(booking.booking_id.as_i64())
        .bind(doctor_id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        booking.status = BookingStatus::Called;
        Ok(booking)
    }

    async fn finish_visit(
        &self,
        doctor_id: DoctorId,
        booking_id: BookingId,
        outcome: VisitOutcome,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        set_lock_timeout(&mut tx).await?;

        let row = sqlx::query(
            r#"
            SELECT b.booking_id, b.patient_id, b.schedule_id, b.serial, b.status,
                   b.is_valid, b.created_at, s.doctor_id AS schedule_doctor
            FROM bookings b
            JOIN schedules s ON s.schedule_id = b.schedule_id
            WHERE b.booking_id = $1 AND b.is_valid
            FOR UPDATE OF b
            "#,
        )
        .bind(booking_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| RegistryError::not_found("booking"))?;

        let schedule_doctor = DoctorId::new(row.try_get("schedule_doctor")?);
        let mut booking = row_to_booking(row)?;

        if schedule_doctor != doctor_id {
            return Err(RegistryError::not_found("booking"));
        }
        if !booking.status.can_finish() {
            return Err(RegistryError::InvalidState {
                operation: "close out visit",
                current: booking.status.to_string(),
            });
        }

        let (status, action) = match outcome {
            VisitOutcome::Completed => (BookingStatus::Completed, CallAction::Completed),
            VisitOutcome::Missed => (BookingStatus::Missed, CallAction::Missed),
        };

        sqlx::query("UPDATE bookings SET status = $1 WHERE booking_id = $2")
            .bind(status.as_str())
            .bind(booking_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        sqlx::query(
            "INSERT INTO call_events (booking_id, doctor_id, action) VALUES ($1, $2, $3)",
        )
        .bind(booking_id.as_i64())
        .bind(doctor_id.as_i64())
        .bind(action.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        booking.status = status;
        Ok(booking)
    }

    async fn queue_snapshot(&self, schedule_id: ScheduleId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT booking_id, patient_id, schedule_id, serial, status, is_valid, created_at
            FROM bookings
            WHERE schedule_id = $1 AND is_valid
            ORDER BY serial ASC
            "#,
        )
        .bind(schedule_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn list_call_events(&self, booking_id: BookingId) -> Result<Vec<CallEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, booking_id, doctor_id, action, occurred_at
            FROM call_events
            WHERE booking_id = $1
            ORDER BY occurred_at ASC, event_id ASC
            "#,
        )
        .bind(booking_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter()
            .map(|row| {
                let action: String = row.try_get("action")?;
                Ok(CallEvent {
                    event_id: row.try_get("event_id")?,
                    booking_id: BookingId::new(row.try_get("booking_id")?),
                    doctor_id: DoctorId::new(row.try_get("doctor_id")?),
                    action: decode_action(&action)?,
                    occurred_at: row.try_get("occurred_at")?,
                })
            })
            .collect()
    }
}
