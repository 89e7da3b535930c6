//src/index.rs
//! Date lookups over the month-scoped record collections.
//!
//! `CalendarDate` equality is equality of the canonical `YYYY-MM-DD` key, so
//! these lookups never see a time of day or a timezone offset.
use crate::date::CalendarDate;
use crate::records::{PaymentMark, PaymentRecord, WorkoutRecord};

/// Borrowed view over the backing collections. Lookups are linear scans; a
/// month of personal records is small enough that an index map buys nothing.
#[derive(Debug, Clone, Copy)]
pub struct RecordIndexer<'a> {
    workouts: &'a [WorkoutRecord],
    payments: &'a [PaymentRecord],
}

impl<'a> RecordIndexer<'a> {
    #[must_use]
    pub const fn new(workouts: &'a [WorkoutRecord], payments: &'a [PaymentRecord]) -> Self {
        Self { workouts, payments }
    }

    pub fn workouts_on(&self, date: CalendarDate) -> Vec<&'a WorkoutRecord> {
        self.workouts
            .iter()
            .filter(|w| w.workout_date == date)
            .collect()
    }

    /// Payments paid on `date` or falling due on `date`. A record can show up
    /// under two days; no deduplication happens here.
    pub fn payments_on(&self, date: CalendarDate) -> Vec<&'a PaymentRecord> {
        self.payments
            .iter()
            .filter(|p| p.payment_date == date || p.next_payment_date == date)
            .collect()
    }

    /// Same as [`Self::payments_on`], tagged with why each payment matched.
    pub fn payment_entries_on(&self, date: CalendarDate) -> Vec<(PaymentMark, &'a PaymentRecord)> {
        self.payments
            .iter()
            .filter_map(|p| p.mark_on(date).map(|mark| (mark, p)))
            .collect()
    }
}
