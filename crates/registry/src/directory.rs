//! Reference entities backing the denormalized display joins.
//!
//! Accounts and credentials live in the identity collaborator; these rows
//! carry only what booking confirmations and availability listings need.

use serde::{Deserialize, Serialize};

use common::{DeptId, DoctorId, PatientId};

/// A hospital department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub dept_id: DeptId,
    pub name: String,
}

/// A doctor attached to a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: DoctorId,
    pub dept_id: DeptId,
    pub name: String,
    pub title: String,
}

/// A patient able to hold bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientId,
    pub name: String,

    /// Delivery target for the verification-code flow.
    pub phone: String,
}
