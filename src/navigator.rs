//src/navigator.rs
use crate::date::{CalendarDate, DateError, MonthRange, YearMonth};
use tracing::debug;

/// What a navigation step produced. `generation` identifies the new month
/// for fetch bookkeeping: anything issued under an older generation is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub month: YearMonth,
    pub range: MonthRange,
    pub generation: u64,
}

/// Holds the displayed month. Every move bumps the generation, which is how
/// collaborators learn their cached collections belong to a month that is gone.
#[derive(Debug, Clone)]
pub struct MonthNavigator {
    current: YearMonth,
    generation: u64,
}

impl MonthNavigator {
    #[must_use]
    pub const fn new(month: YearMonth) -> Self {
        Self {
            current: month,
            generation: 0,
        }
    }

    #[must_use]
    pub const fn current(&self) -> YearMonth {
        self.current
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn range(&self) -> Result<MonthRange, DateError> {
        self.current.range()
    }

    /// Bumps the generation without moving, for when the displayed records
    /// stop being valid for some other reason (a change of user).
    pub fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        debug!(month = %self.current, generation = self.generation, "Invalidating calendar");
        self.generation
    }

    /// Moves one month back. Like every move, this only fails when the target
    /// month lies outside chrono's representable date range.
    pub fn previous_month(&mut self) -> Result<Navigation, DateError> {
        self.move_to(self.current.pred())
    }

    /// Moves one month forward. See [`MonthNavigator::previous_month`] for failures.
    pub fn next_month(&mut self) -> Result<Navigation, DateError> {
        self.move_to(self.current.succ())
    }

    /// Jumps to the month containing `date`. Jumping to the month already shown
    /// still counts as a navigation and invalidates in-flight fetches.
    pub fn go_to(&mut self, date: CalendarDate) -> Result<Navigation, DateError> {
        self.move_to(date.year_month())
    }

    fn move_to(&mut self, month: YearMonth) -> Result<Navigation, DateError> {
        // Validate before mutating so a failed move leaves the navigator as it was.
        let range = month.range()?;
        debug!(from = %self.current, to = %month, "Navigating calendar");
        self.current = month;
        self.generation += 1;
        Ok(Navigation {
            month,
            range,
            generation: self.generation,
        })
    }
}
