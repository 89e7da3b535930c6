//src/store.rs
//! The record store the calendar reads from and writes to.
//!
//! The store owns the records; callers only ever hold a month-scoped copy.
use crate::date::MonthRange;
use crate::records::{
    NewPayment, NewWorkout, PaymentPatch, PaymentRecord, WorkoutPatch, WorkoutRecord,
};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },
    #[error("Not authorised to access {0}")]
    Unauthorized(String),
    #[error("Store rejected the change: {0}")]
    Constraint(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store returned malformed data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Database(#[from] crate::db::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Workout,
    Payment,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workout => write!(f, "Workout"),
            Self::Payment => write!(f, "Payment"),
        }
    }
}

/// The signed-in user's id. Opaque to the calendar; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    #[must_use]
    pub fn new(id: &str) -> Option<Self> {
        let trimmed = id.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every call may fail with a [`StoreError`]. Implementations are expected to
/// hold the derived next-due date authoritative on their side: a payment write
/// must store `recurrence.advance(payment_date)` regardless of what the caller sent.
pub trait RecordStore {
    /// Workouts whose workout date falls inside `range`, oldest first.
    fn fetch_workouts(
        &self,
        owner: &OwnerId,
        range: MonthRange,
    ) -> Result<Vec<WorkoutRecord>, StoreError>;

    /// Payments whose payment date *or* next-due date falls inside `range`,
    /// ordered by payment date.
    fn fetch_payments(
        &self,
        owner: &OwnerId,
        range: MonthRange,
    ) -> Result<Vec<PaymentRecord>, StoreError>;

    fn create_workout(
        &self,
        owner: &OwnerId,
        workout: &NewWorkout,
    ) -> Result<WorkoutRecord, StoreError>;

    fn update_workout(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: &WorkoutPatch,
    ) -> Result<WorkoutRecord, StoreError>;

    fn delete_workout(&self, owner: &OwnerId, id: &str) -> Result<(), StoreError>;

    fn create_payment(
        &self,
        owner: &OwnerId,
        payment: &NewPayment,
    ) -> Result<PaymentRecord, StoreError>;

    fn update_payment(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: &PaymentPatch,
    ) -> Result<PaymentRecord, StoreError>;

    fn delete_payment(&self, owner: &OwnerId, id: &str) -> Result<(), StoreError>;
}
