//src/calendar.rs
//! Month grid construction: the Sunday-aligned date range, per-cell record
//! lookups and the display-state decision for each cell.
use crate::date::{CalendarDate, DateError, YearMonth};
use crate::index::RecordIndexer;
use crate::records::{PaymentMark, PaymentRecord, WorkoutRecord};
use std::fmt;

pub const DAYS_PER_WEEK: usize = 7;
pub const WEEKDAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Every date the grid for `reference`'s month shows, Sunday through Saturday,
/// including the leading and trailing days of the neighbouring months.
///
/// The result is never empty and its length is always a multiple of 7. It only
/// fails at the very edges of the representable date range.
pub fn grid_dates(reference: CalendarDate) -> Result<Vec<CalendarDate>, DateError> {
    let month = reference.year_month();
    let month_start = month.first_day()?;
    let month_end = month.last_day()?;
    let grid_start = month_start.sub_days(u64::from(month_start.weekday_from_sunday()))?;
    let grid_end = month_end.add_days(u64::from(6 - month_end.weekday_from_sunday()))?;

    let mut dates = Vec::with_capacity(6 * DAYS_PER_WEEK);
    let mut current = grid_start;
    loop {
        dates.push(current);
        if current == grid_end {
            break;
        }
        current = current.succ().ok_or(DateError::Overflow(current))?;
    }
    Ok(dates)
}

/// How a cell should be styled. Purely presentational: a `Today` cell still
/// carries its workouts and payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayState {
    OutOfMonth,
    Today,
    WorkoutOnly,
    PaymentOnly,
    WorkoutAndPayment,
    Plain,
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::OutOfMonth => "OUT_OF_MONTH",
            Self::Today => "TODAY",
            Self::WorkoutOnly => "WORKOUT_ONLY",
            Self::PaymentOnly => "PAYMENT_ONLY",
            Self::WorkoutAndPayment => "WORKOUT_AND_PAYMENT",
            Self::Plain => "PLAIN",
        };
        write!(f, "{tag}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFlags {
    pub in_displayed_month: bool,
    pub is_today: bool,
    pub has_workouts: bool,
    pub has_payments: bool,
}

/// Out-of-month beats everything, then today, then record presence.
#[must_use]
pub const fn classify(flags: CellFlags) -> DisplayState {
    if !flags.in_displayed_month {
        return DisplayState::OutOfMonth;
    }
    if flags.is_today {
        return DisplayState::Today;
    }
    match (flags.has_workouts, flags.has_payments) {
        (true, true) => DisplayState::WorkoutAndPayment,
        (true, false) => DisplayState::WorkoutOnly,
        (false, true) => DisplayState::PaymentOnly,
        (false, false) => DisplayState::Plain,
    }
}

/// Result of clicking a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClick {
    OpenDay(CalendarDate),
    Ignored,
}

/// One rendered grid position. Built fresh for every render and never stored.
#[derive(Debug, Clone)]
pub struct CalendarCell<'a> {
    pub date: CalendarDate,
    pub in_displayed_month: bool,
    pub is_today: bool,
    pub state: DisplayState,
    pub workouts: Vec<&'a WorkoutRecord>,
    pub payments: Vec<(PaymentMark, &'a PaymentRecord)>,
}

impl<'a> CalendarCell<'a> {
    #[must_use]
    pub fn click(&self) -> CellClick {
        if self.state == DisplayState::OutOfMonth {
            CellClick::Ignored
        } else {
            CellClick::OpenDay(self.date)
        }
    }

    /// The first `limit` workouts plus how many were left out.
    #[must_use]
    pub fn visible_workouts(&self, limit: usize) -> (&[&'a WorkoutRecord], usize) {
        let shown = self.workouts.len().min(limit);
        (&self.workouts[..shown], self.workouts.len() - shown)
    }
}

#[derive(Debug, Clone)]
pub struct MonthGrid<'a> {
    pub month: YearMonth,
    pub cells: Vec<CalendarCell<'a>>,
}

impl<'a> MonthGrid<'a> {
    pub fn build(
        month: YearMonth,
        today: CalendarDate,
        index: &RecordIndexer<'a>,
    ) -> Result<Self, DateError> {
        let cells = grid_dates(month.first_day()?)?
            .into_iter()
            .map(|date| {
                let workouts = index.workouts_on(date);
                let payments = index.payment_entries_on(date);
                let in_displayed_month = month.contains(date);
                let is_today = date == today;
                let state = classify(CellFlags {
                    in_displayed_month,
                    is_today,
                    has_workouts: !workouts.is_empty(),
                    has_payments: !payments.is_empty(),
                });
                CalendarCell {
                    date,
                    in_displayed_month,
                    is_today,
                    state,
                    workouts,
                    payments,
                }
            })
            .collect();
        Ok(Self { month, cells })
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell<'a>]> {
        self.cells.chunks(DAYS_PER_WEEK)
    }

    #[must_use]
    pub fn cell(&self, date: CalendarDate) -> Option<&CalendarCell<'a>> {
        self.cells.iter().find(|c| c.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> CalendarDate {
        CalendarDate::parse_key(s).unwrap()
    }

    #[test]
    fn march_2024_grid() {
        // March 1st 2024 is a Friday, March 31st a Sunday.
        let dates = grid_dates(d("2024-03-17")).unwrap();
        assert_eq!(dates.first().copied(), Some(d("2024-02-25")));
        assert_eq!(dates.last().copied(), Some(d("2024-04-06")));
        assert_eq!(dates.len(), 42);
    }

    #[test]
    fn aligned_february_is_four_weeks() {
        // Feb 2015 starts on a Sunday and has 28 days.
        let dates = grid_dates(d("2015-02-10")).unwrap();
        assert_eq!(dates.len(), 28);
        assert_eq!(dates[0], d("2015-02-01"));
        assert_eq!(dates[27], d("2015-02-28"));
    }

    #[test]
    fn leap_day_only_in_leap_years() {
        assert!(grid_dates(d("2024-02-01")).unwrap().contains(&d("2024-02-29")));
        let feb_2023 = grid_dates(d("2023-02-01")).unwrap();
        assert!(!feb_2023.iter().any(|x| x.month() == 2 && x.day() == 29));
        assert!(feb_2023.contains(&d("2023-02-28")));
    }

    #[test]
    fn classification_precedence() {
        for has_workouts in [false, true] {
            for has_payments in [false, true] {
                for is_today in [false, true] {
                    let out = classify(CellFlags {
                        in_displayed_month: false,
                        is_today,
                        has_workouts,
                        has_payments,
                    });
                    assert_eq!(out, DisplayState::OutOfMonth);
                }
                let today = classify(CellFlags {
                    in_displayed_month: true,
                    is_today: true,
                    has_workouts,
                    has_payments,
                });
                assert_eq!(today, DisplayState::Today);
            }
        }
        let flags = CellFlags {
            in_displayed_month: true,
            ..Default::default()
        };
        assert_eq!(classify(flags), DisplayState::Plain);
        assert_eq!(classify(CellFlags { has_workouts: true, ..flags }), DisplayState::WorkoutOnly);
        assert_eq!(classify(CellFlags { has_payments: true, ..flags }), DisplayState::PaymentOnly);
        assert_eq!(
            classify(CellFlags { has_workouts: true, has_payments: true, ..flags }),
            DisplayState::WorkoutAndPayment
        );
    }

    #[test]
    fn out_of_month_cells_ignore_clicks() {
        let index = RecordIndexer::new(&[], &[]);
        let month = YearMonth::new(2024, 3).unwrap();
        let grid = MonthGrid::build(month, d("2024-03-10"), &index).unwrap();

        let leading = grid.cell(d("2024-02-25")).unwrap();
        assert_eq!(leading.state, DisplayState::OutOfMonth);
        assert_eq!(leading.click(), CellClick::Ignored);

        let today = grid.cell(d("2024-03-10")).unwrap();
        assert_eq!(today.state, DisplayState::Today);
        assert_eq!(today.click(), CellClick::OpenDay(d("2024-03-10")));

        assert_eq!(grid.weeks().count(), 6);
    }

    #[test]
    fn grid_only_fails_at_the_end_of_representable_dates() {
        use chrono::Datelike;

        let last_year = chrono::NaiveDate::MAX.year();
        let november = CalendarDate::from_ymd(last_year, 11, 15).unwrap();
        assert_eq!(grid_dates(november).unwrap().len() % DAYS_PER_WEEK, 0);
        let december = CalendarDate::from_ymd(last_year, 12, 15).unwrap();
        assert!(grid_dates(december).is_err());
    }
}
