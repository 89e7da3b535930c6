//src/state.rs
//! The one place the displayed month and its record collections live.
//!
//! Fetches are split into issue ([`CalendarState::begin_fetch`]) and completion
//! ([`CalendarState::apply_workouts`] / [`CalendarState::apply_payments`]) so a
//! result can arrive after the user has already moved on. Completion checks the
//! ticket against the current month and drops anything issued for an older one.
use crate::calendar::{CellClick, MonthGrid};
use crate::date::{CalendarDate, DateError, MonthRange, YearMonth};
use crate::index::RecordIndexer;
use crate::navigator::{MonthNavigator, Navigation};
use crate::records::{PaymentRecord, WorkoutRecord};
use crate::store::StoreError;
use tracing::{debug, warn};

/// Form mode for a record list. Replaces a mode flag plus a nullable
/// "currently editing" reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<R> {
    Listing,
    Creating,
    Editing(R),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    /// Opened by clicking an in-month day.
    Day {
        date: CalendarDate,
        workouts: ViewState<WorkoutRecord>,
    },
    Payment(ViewState<PaymentRecord>),
}

/// Identifies one issued fetch: the month it was for and the order it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub range: MonthRange,
    generation: u64,
    sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { count: usize },
    /// The store call failed; the previous collection is kept.
    Failed,
    /// Issued for a month no longer displayed, or overtaken by a newer fetch.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct CalendarState {
    navigator: MonthNavigator,
    workouts: Vec<WorkoutRecord>,
    payments: Vec<PaymentRecord>,
    issued: u64,
    applied_workouts: u64,
    applied_payments: u64,
    dialog: Option<Dialog>,
}

impl CalendarState {
    #[must_use]
    pub const fn new(month: YearMonth) -> Self {
        Self {
            navigator: MonthNavigator::new(month),
            workouts: Vec::new(),
            payments: Vec::new(),
            issued: 0,
            applied_workouts: 0,
            applied_payments: 0,
            dialog: None,
        }
    }

    #[must_use]
    pub const fn month(&self) -> YearMonth {
        self.navigator.current()
    }

    pub fn range(&self) -> Result<MonthRange, DateError> {
        self.navigator.range()
    }

    #[must_use]
    pub fn workouts(&self) -> &[WorkoutRecord] {
        &self.workouts
    }

    #[must_use]
    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    #[must_use]
    pub const fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    #[must_use]
    pub fn indexer(&self) -> RecordIndexer<'_> {
        RecordIndexer::new(&self.workouts, &self.payments)
    }

    pub fn grid(&self, today: CalendarDate) -> Result<MonthGrid<'_>, DateError> {
        MonthGrid::build(self.month(), today, &self.indexer())
    }

    // --- Navigation ---

    pub fn previous_month(&mut self) -> Result<Navigation, DateError> {
        let nav = self.navigator.previous_month()?;
        self.invalidate();
        Ok(nav)
    }

    pub fn next_month(&mut self) -> Result<Navigation, DateError> {
        let nav = self.navigator.next_month()?;
        self.invalidate();
        Ok(nav)
    }

    pub fn go_to(&mut self, date: CalendarDate) -> Result<Navigation, DateError> {
        let nav = self.navigator.go_to(date)?;
        self.invalidate();
        Ok(nav)
    }

    /// Drops everything loaded and makes every ticket issued so far stale,
    /// keeping the displayed month. Used when the signed-in user changes.
    pub fn reset(&mut self) {
        self.navigator.invalidate();
        self.invalidate();
    }

    // The old month's collections and any dialog opened on one of its days go away.
    fn invalidate(&mut self) {
        self.workouts.clear();
        self.payments.clear();
        self.dialog = None;
    }

    // --- Fetch bookkeeping ---

    /// Issues a ticket for the month currently displayed.
    pub fn begin_fetch(&mut self) -> Result<FetchTicket, DateError> {
        let range = self.range()?;
        self.issued += 1;
        Ok(FetchTicket {
            range,
            generation: self.navigator.generation(),
            sequence: self.issued,
        })
    }

    #[must_use]
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.navigator.generation()
            && self.range().map_or(false, |range| range == ticket.range)
    }

    pub fn apply_workouts(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<WorkoutRecord>, StoreError>,
    ) -> FetchOutcome {
        if !self.is_current(ticket) || ticket.sequence < self.applied_workouts {
            debug!(range = %ticket.range, "Discarding stale workout fetch");
            return FetchOutcome::Discarded;
        }
        match result {
            Ok(workouts) => {
                self.applied_workouts = ticket.sequence;
                let count = workouts.len();
                self.workouts = workouts;
                FetchOutcome::Applied { count }
            }
            Err(e) => {
                warn!(range = %ticket.range, error = %e, "Failed to fetch workouts");
                FetchOutcome::Failed
            }
        }
    }

    pub fn apply_payments(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<PaymentRecord>, StoreError>,
    ) -> FetchOutcome {
        if !self.is_current(ticket) || ticket.sequence < self.applied_payments {
            debug!(range = %ticket.range, "Discarding stale payment fetch");
            return FetchOutcome::Discarded;
        }
        match result {
            Ok(payments) => {
                self.applied_payments = ticket.sequence;
                let count = payments.len();
                self.payments = payments;
                FetchOutcome::Applied { count }
            }
            Err(e) => {
                warn!(range = %ticket.range, error = %e, "Failed to fetch payments");
                FetchOutcome::Failed
            }
        }
    }

    // --- Dialogs ---

    /// Opens the day dialog for an in-month cell. Returns false for ignored clicks.
    pub fn click(&mut self, click: CellClick) -> bool {
        match click {
            CellClick::OpenDay(date) if self.month().contains(date) => {
                self.dialog = Some(Dialog::Day {
                    date,
                    workouts: ViewState::Listing,
                });
                true
            }
            _ => false,
        }
    }

    pub fn start_creating_workout(&mut self) -> bool {
        match self.dialog {
            Some(Dialog::Day { ref mut workouts, .. }) => {
                *workouts = ViewState::Creating;
                true
            }
            _ => false,
        }
    }

    /// Switches the day dialog to editing `id`, if that workout is on the open day.
    pub fn start_editing_workout(&mut self, id: &str) -> bool {
        let Some(Dialog::Day { date, .. }) = self.dialog else {
            return false;
        };
        let Some(record) = self
            .workouts
            .iter()
            .find(|w| w.id == id && w.workout_date == date)
            .cloned()
        else {
            return false;
        };
        self.dialog = Some(Dialog::Day {
            date,
            workouts: ViewState::Editing(record),
        });
        true
    }

    pub fn back_to_listing(&mut self) {
        if let Some(Dialog::Day { ref mut workouts, .. }) = self.dialog {
            *workouts = ViewState::Listing;
        }
    }

    pub fn open_payment_form(&mut self) {
        self.dialog = Some(Dialog::Payment(ViewState::Creating));
    }

    pub fn start_editing_payment(&mut self, id: &str) -> bool {
        match self.payments.iter().find(|p| p.id == id).cloned() {
            Some(record) => {
                self.dialog = Some(Dialog::Payment(ViewState::Editing(record)));
                true
            }
            None => false,
        }
    }

    /// A saved payment form closes; a saved workout form returns to the day's list.
    pub(crate) fn finish_saving(&mut self) {
        match self.dialog {
            Some(Dialog::Day { ref mut workouts, .. }) => *workouts = ViewState::Listing,
            Some(Dialog::Payment(_)) => self.dialog = None,
            None => {}
        }
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }
}
