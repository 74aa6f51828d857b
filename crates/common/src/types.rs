use serde::{Deserialize, Serialize};

/// Unique identifier for a patient account.
///
/// Wraps the relational primary key to provide type safety and prevent
/// mixing up patient IDs with other integer-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(i64);

impl PatientId {
    /// Creates a patient ID from a raw database key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying database key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PatientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<PatientId> for i64 {
    fn from(id: PatientId) -> Self {
        id.0
    }
}

/// Unique identifier for a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorId(i64);

impl DoctorId {
    /// Creates a doctor ID from a raw database key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying database key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for DoctorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DoctorId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<DoctorId> for i64 {
    fn from(id: DoctorId) -> Self {
        id.0
    }
}

/// Unique identifier for a hospital department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeptId(i64);

impl DeptId {
    /// Creates a department ID from a raw database key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying database key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for DeptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DeptId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<DeptId> for i64 {
    fn from(id: DeptId) -> Self {
        id.0
    }
}

/// Unique identifier for a doctor's bookable half-day session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(i64);

impl ScheduleId {
    /// Creates a schedule ID from a raw database key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying database key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ScheduleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ScheduleId> for i64 {
    fn from(id: ScheduleId) -> Self {
        id.0
    }
}

/// Unique identifier for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(i64);

impl BookingId {
    /// Creates a booking ID from a raw database key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying database key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BookingId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<BookingId> for i64 {
    fn from(id: BookingId) -> Self {
        id.0
    }
}

/// Unique identifier for an administrator account.
///
/// Administrators only appear in the schedule-review audit trail; the
/// account itself lives in the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminId(i64);

impl AdminId {
    /// Creates an admin ID from a raw database key.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying database key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AdminId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AdminId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<AdminId> for i64 {
    fn from(id: AdminId) -> Self {
        id.0
    }
}
