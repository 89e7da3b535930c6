//src/records.rs
use crate::date::{CalendarDate, DateError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Local, pre-submission failures. None of these ever reach the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Amount must be a positive number (got {0})")]
    NonPositiveAmount(f64),
    #[error("Recurrence count must be at least 1")]
    ZeroRecurrence,
    #[error("Invalid recurrence '{0}'. Use a preset (daily, weekly, biweekly, monthly, quarterly, semiannual, yearly) or <days|weeks|months>:<count>")]
    InvalidRecurrence(String),
    #[error("Next payment date would equal the payment date ({0})")]
    ZeroLengthCycle(CalendarDate),
    #[error("No fields provided to update")]
    EmptyUpdate,
    #[error(transparent)]
    Date(#[from] DateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrenceUnit {
    Days,
    Weeks,
    Months,
}

// Convert string from DB to RecurrenceUnit
impl TryFrom<&str> for RecurrenceUnit {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "days" | "day" => Ok(Self::Days),
            "weeks" | "week" => Ok(Self::Weeks),
            "months" | "month" => Ok(Self::Months),
            _ => Err(ValidationError::InvalidRecurrence(value.to_string())),
        }
    }
}

// Stored form, fixed by the schema
impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days => write!(f, "days"),
            Self::Weeks => write!(f, "weeks"),
            Self::Months => write!(f, "months"),
        }
    }
}

/// How far the next due date sits from the payment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Recurrence {
    unit: RecurrenceUnit,
    count: u32,
}

pub const RECURRENCE_PRESETS: [(&str, RecurrenceUnit, u32); 7] = [
    ("daily", RecurrenceUnit::Days, 1),
    ("weekly", RecurrenceUnit::Days, 7),
    ("biweekly", RecurrenceUnit::Weeks, 2),
    ("monthly", RecurrenceUnit::Months, 1),
    ("quarterly", RecurrenceUnit::Months, 3),
    ("semiannual", RecurrenceUnit::Months, 6),
    ("yearly", RecurrenceUnit::Months, 12),
];

impl Recurrence {
    pub fn new(unit: RecurrenceUnit, count: u32) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err(ValidationError::ZeroRecurrence);
        }
        Ok(Self { unit, count })
    }

    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        RECURRENCE_PRESETS
            .iter()
            .find(|(preset, _, _)| preset.eq_ignore_ascii_case(name.trim()))
            .map(|&(_, unit, count)| Self { unit, count })
    }

    #[must_use]
    pub const fn unit(&self) -> RecurrenceUnit {
        self.unit
    }

    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// The due date one cycle after `from`.
    pub fn advance(&self, from: CalendarDate) -> Result<CalendarDate, ValidationError> {
        let next = match self.unit {
            RecurrenceUnit::Days => from.add_days(u64::from(self.count))?,
            RecurrenceUnit::Weeks => from.add_days(u64::from(self.count) * 7)?,
            RecurrenceUnit::Months => from.add_months(self.count)?,
        };
        if next == from {
            return Err(ValidationError::ZeroLengthCycle(from));
        }
        Ok(next)
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Self {
            unit: RecurrenceUnit::Months,
            count: 1,
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match RECURRENCE_PRESETS
            .iter()
            .find(|(_, unit, count)| *unit == self.unit && *count == self.count)
        {
            Some((name, _, _)) => write!(f, "{name}"),
            None => write!(f, "{}:{}", self.unit, self.count),
        }
    }
}

impl FromStr for Recurrence {
    type Err = ValidationError;

    /// Accepts a preset name ("monthly") or "<unit>:<count>" ("weeks:2").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(preset) = Self::preset(s) {
            return Ok(preset);
        }
        let (unit, count) = s
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidRecurrence(s.to_string()))?;
        let unit = RecurrenceUnit::try_from(unit)?;
        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidRecurrence(s.to_string()))?;
        Self::new(unit, count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub id: String,
    pub user_id: String,
    pub workout_date: CalendarDate,
    pub workout_type: String,
    pub notes: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: String,
    pub payment_date: CalendarDate,
    pub amount: f64,
    pub recurrence: Recurrence,
    pub next_payment_date: CalendarDate,
    pub payment_type: String,
    pub created_at: DateTime<Utc>,
}

/// Why a payment shows up on a particular day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMark {
    Paid,
    Due,
}

impl PaymentRecord {
    /// `Paid` wins when both dates coincide, which validation rules out anyway.
    #[must_use]
    pub fn mark_on(&self, date: CalendarDate) -> Option<PaymentMark> {
        if self.payment_date == date {
            Some(PaymentMark::Paid)
        } else if self.next_payment_date == date {
            Some(PaymentMark::Due)
        } else {
            None
        }
    }
}

// Blank notes are stored as absent.
fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn required_text(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn checked_amount(amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkout {
    pub workout_date: CalendarDate,
    pub workout_type: String,
    pub notes: Option<String>,
    pub completed: bool,
}

impl NewWorkout {
    /// New workouts are logged as completed.
    #[must_use]
    pub fn new(workout_date: CalendarDate, workout_type: impl Into<String>) -> Self {
        Self {
            workout_date,
            workout_type: workout_type.into(),
            notes: None,
            completed: true,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Trims text fields and rejects a missing category.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            workout_type: required_text(&self.workout_type, "workout type")?,
            notes: clean_notes(self.notes),
            ..self
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub payment_date: CalendarDate,
    pub amount: f64,
    pub recurrence: Recurrence,
    pub payment_type: String,
}

impl NewPayment {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let payment_type = required_text(&self.payment_type, "payment type")?;
        let amount = checked_amount(self.amount)?;
        self.recurrence.advance(self.payment_date)?;
        Ok(Self {
            payment_type,
            amount,
            ..self
        })
    }

    pub fn next_payment_date(&self) -> Result<CalendarDate, ValidationError> {
        self.recurrence.advance(self.payment_date)
    }
}

/// Partial workout update. `notes: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkoutPatch {
    pub workout_date: Option<CalendarDate>,
    pub workout_type: Option<String>,
    pub notes: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl WorkoutPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.workout_date.is_none()
            && self.workout_type.is_none()
            && self.notes.is_none()
            && self.completed.is_none()
    }

    /// Checks the fields this patch sets, without needing the stored record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(ref kind) = self.workout_type {
            required_text(kind, "workout type")?;
        }
        Ok(())
    }

    pub fn apply_to(&self, record: &WorkoutRecord) -> Result<WorkoutRecord, ValidationError> {
        self.validate()?;
        let mut updated = record.clone();
        if let Some(date) = self.workout_date {
            updated.workout_date = date;
        }
        if let Some(ref kind) = self.workout_type {
            updated.workout_type = required_text(kind, "workout type")?;
        }
        if let Some(ref notes) = self.notes {
            updated.notes = clean_notes(notes.clone());
        }
        if let Some(completed) = self.completed {
            updated.completed = completed;
        }
        Ok(updated)
    }
}

/// Partial payment update. The next due date is not a field here: it is
/// always rederived from the (possibly updated) payment date and recurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentPatch {
    pub payment_date: Option<CalendarDate>,
    pub amount: Option<f64>,
    pub recurrence: Option<Recurrence>,
    pub payment_type: Option<String>,
}

impl PaymentPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.payment_date.is_none()
            && self.amount.is_none()
            && self.recurrence.is_none()
            && self.payment_type.is_none()
    }

    /// Checks the fields this patch sets. A zero-length cycle can only be
    /// detected once merged with the stored record, in [`PaymentPatch::apply_to`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(amount) = self.amount {
            checked_amount(amount)?;
        }
        if let Some(ref kind) = self.payment_type {
            required_text(kind, "payment type")?;
        }
        Ok(())
    }

    pub fn apply_to(&self, record: &PaymentRecord) -> Result<PaymentRecord, ValidationError> {
        self.validate()?;
        let mut updated = record.clone();
        if let Some(date) = self.payment_date {
            updated.payment_date = date;
        }
        if let Some(amount) = self.amount {
            updated.amount = checked_amount(amount)?;
        }
        if let Some(recurrence) = self.recurrence {
            updated.recurrence = recurrence;
        }
        if let Some(ref kind) = self.payment_type {
            updated.payment_type = required_text(kind, "payment type")?;
        }
        updated.next_payment_date = updated.recurrence.advance(updated.payment_date)?;
        Ok(updated)
    }
}
