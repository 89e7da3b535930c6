use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

// --- Declare modules ---
pub mod calendar;
mod config;
pub mod date;
pub mod db;
pub mod index;
pub mod navigator;
pub mod records;
pub mod state;
pub mod store;

// --- Expose public types ---
pub use calendar::{
    classify, grid_dates, CalendarCell, CellClick, CellFlags, DisplayState, MonthGrid,
};
pub use config::{
    get_config_path as get_config_path_util, load_config as load_config_util, parse_color,
    save_config as save_config_util, Config, Error as ConfigError, StandardColor, Theme,
};
pub use date::{CalendarDate, DateError, MonthRange, YearMonth};
pub use db::{get_db_path as get_db_path_util, Error as DbError, SqliteStore};
pub use index::RecordIndexer;
pub use navigator::{MonthNavigator, Navigation};
pub use records::{
    NewPayment, NewWorkout, PaymentMark, PaymentPatch, PaymentRecord, Recurrence, RecurrenceUnit,
    ValidationError, WorkoutPatch, WorkoutRecord, RECURRENCE_PRESETS,
};
pub use state::{CalendarState, Dialog, FetchOutcome, FetchTicket, ViewState};
pub use store::{OwnerId, RecordKind, RecordStore, StoreError};

/// Failure of a user action. Validation failures never reach the store; store
/// failures leave the calendar state exactly as it was.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Date(#[from] DateError),
}

/// Outcome of reloading both collections for the displayed month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    pub workouts: FetchOutcome,
    pub payments: FetchOutcome,
}

/// Everything recorded against one day.
#[derive(Debug, Clone)]
pub struct DayView<'a> {
    pub date: CalendarDate,
    pub workouts: Vec<&'a WorkoutRecord>,
    pub payments: Vec<(PaymentMark, &'a PaymentRecord)>,
}

#[derive(Serialize)]
struct WorkoutCsvRow<'a> {
    id: &'a str,
    workout_date: String,
    workout_type: &'a str,
    notes: &'a str,
    completed: bool,
    created_at: String,
}

#[derive(Serialize)]
struct PaymentCsvRow<'a> {
    id: &'a str,
    payment_date: String,
    amount: f64,
    payment_cycle_type: String,
    payment_cycle_value: u32,
    next_payment_date: String,
    payment_type: &'a str,
    created_at: String,
}

pub struct AppService<S: RecordStore = SqliteStore> {
    pub config: Config,
    pub store: S,
    pub state: CalendarState,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppService<SqliteStore> {
    /// Loads config, opens the database and shows the month containing today.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        Ok(Self {
            config,
            store,
            state: CalendarState::new(CalendarDate::today().year_month()),
            db_path,
            config_path,
        })
    }
}

impl<S: RecordStore> AppService<S> {
    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save_config(&self.config_path, &self.config)
    }

    /// Signs in as `owner_id` and persists it.
    /// # Errors
    /// `ConfigError::InvalidOwnerId` for a blank id, or a save failure.
    pub fn login(&mut self, owner_id: &str) -> Result<(), ConfigError> {
        self.config.set_owner(owner_id)?;
        // Anything fetched or in flight belonged to whoever was signed in before.
        self.state.reset();
        self.save_config()
    }

    /// Signs out and forgets the loaded records.
    pub fn logout(&mut self) -> Result<(), ConfigError> {
        self.config.clear_owner();
        self.state.reset();
        self.save_config()
    }

    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        self.config.owner()
    }

    // --- Reads ---

    /// Reloads workouts and payments for the displayed month. Returns `None`
    /// when signed out. Store failures are logged and reported in the
    /// [`Refresh`], never returned as errors.
    pub fn refresh(&mut self) -> Result<Option<Refresh>, DateError> {
        let Some(owner) = self.owner() else {
            debug!("No signed-in user; skipping fetch");
            return Ok(None);
        };
        let ticket = self.state.begin_fetch()?;
        let workouts = self.store.fetch_workouts(&owner, ticket.range);
        let workouts = self.state.apply_workouts(&ticket, workouts);
        let payments = self.store.fetch_payments(&owner, ticket.range);
        let payments = self.state.apply_payments(&ticket, payments);
        Ok(Some(Refresh { workouts, payments }))
    }

    pub fn previous_month(&mut self) -> Result<Navigation, DateError> {
        let nav = self.state.previous_month()?;
        self.refresh()?;
        Ok(nav)
    }

    pub fn next_month(&mut self) -> Result<Navigation, DateError> {
        let nav = self.state.next_month()?;
        self.refresh()?;
        Ok(nav)
    }

    pub fn go_to(&mut self, date: CalendarDate) -> Result<Navigation, DateError> {
        let nav = self.state.go_to(date)?;
        self.refresh()?;
        Ok(nav)
    }

    pub fn grid(&self, today: CalendarDate) -> Result<MonthGrid<'_>, DateError> {
        self.state.grid(today)
    }

    #[must_use]
    pub fn day(&self, date: CalendarDate) -> DayView<'_> {
        let index = self.state.indexer();
        DayView {
            date,
            workouts: index.workouts_on(date),
            payments: index.payment_entries_on(date),
        }
    }

    /// Clicks the grid cell for `date`. Out-of-month cells do nothing.
    pub fn select_day(
        &mut self,
        date: CalendarDate,
        today: CalendarDate,
    ) -> Result<bool, DateError> {
        let click = self
            .state
            .grid(today)?
            .cell(date)
            .map_or(CellClick::Ignored, CalendarCell::click);
        Ok(self.state.click(click))
    }

    // --- Writes ---
    // Each write either fully succeeds and reloads the month, or fails and
    // leaves the state untouched. Signed out, they do nothing and return None/false.

    pub fn add_workout(
        &mut self,
        workout: NewWorkout,
    ) -> Result<Option<WorkoutRecord>, ActionError> {
        let Some(owner) = self.owner() else {
            return Ok(None);
        };
        let workout = workout.validated()?;
        let created = self.store.create_workout(&owner, &workout)?;
        info!(id = %created.id, date = %created.workout_date, "Added workout");
        self.after_write()?;
        Ok(Some(created))
    }

    pub fn update_workout(
        &mut self,
        id: &str,
        patch: &WorkoutPatch,
    ) -> Result<Option<WorkoutRecord>, ActionError> {
        let Some(owner) = self.owner() else {
            return Ok(None);
        };
        patch.validate()?;
        if let Some(cached) = self.state.workouts().iter().find(|w| w.id == id) {
            patch.apply_to(cached)?;
        }
        let updated = self.store.update_workout(&owner, id, patch)?;
        info!(id, "Updated workout");
        self.after_write()?;
        Ok(Some(updated))
    }

    pub fn delete_workout(&mut self, id: &str) -> Result<bool, ActionError> {
        let Some(owner) = self.owner() else {
            return Ok(false);
        };
        self.store.delete_workout(&owner, id)?;
        info!(id, "Deleted workout");
        self.after_write()?;
        Ok(true)
    }

    pub fn add_payment(
        &mut self,
        payment: NewPayment,
    ) -> Result<Option<PaymentRecord>, ActionError> {
        let Some(owner) = self.owner() else {
            return Ok(None);
        };
        let payment = payment.validated()?;
        let created = self.store.create_payment(&owner, &payment)?;
        info!(
            id = %created.id,
            paid = %created.payment_date,
            next = %created.next_payment_date,
            "Added payment"
        );
        self.after_write()?;
        Ok(Some(created))
    }

    pub fn update_payment(
        &mut self,
        id: &str,
        patch: &PaymentPatch,
    ) -> Result<Option<PaymentRecord>, ActionError> {
        let Some(owner) = self.owner() else {
            return Ok(None);
        };
        patch.validate()?;
        if let Some(cached) = self.state.payments().iter().find(|p| p.id == id) {
            patch.apply_to(cached)?;
        }
        let updated = self.store.update_payment(&owner, id, patch)?;
        info!(id, next = %updated.next_payment_date, "Updated payment");
        self.after_write()?;
        Ok(Some(updated))
    }

    pub fn delete_payment(&mut self, id: &str) -> Result<bool, ActionError> {
        let Some(owner) = self.owner() else {
            return Ok(false);
        };
        self.store.delete_payment(&owner, id)?;
        info!(id, "Deleted payment");
        self.after_write()?;
        Ok(true)
    }

    fn after_write(&mut self) -> Result<(), DateError> {
        self.state.finish_saving();
        self.refresh()?;
        Ok(())
    }

    // --- Export ---

    /// Writes the displayed month's workouts as CSV.
    pub fn export_workouts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(writer);
        for w in self.state.workouts() {
            wtr.serialize(WorkoutCsvRow {
                id: &w.id,
                workout_date: w.workout_date.key(),
                workout_type: &w.workout_type,
                notes: w.notes.as_deref().unwrap_or(""),
                completed: w.completed,
                created_at: w.created_at.to_rfc3339(),
            })?;
        }
        wtr.flush().context("Failed to flush CSV output")?;
        Ok(self.state.workouts().len())
    }

    /// Writes the displayed month's payments (paid or due this month) as CSV.
    pub fn export_payments_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(writer);
        for p in self.state.payments() {
            wtr.serialize(PaymentCsvRow {
                id: &p.id,
                payment_date: p.payment_date.key(),
                amount: p.amount,
                payment_cycle_type: p.recurrence.unit().to_string(),
                payment_cycle_value: p.recurrence.count(),
                next_payment_date: p.next_payment_date.key(),
                payment_type: &p.payment_type,
                created_at: p.created_at.to_rfc3339(),
            })?;
        }
        wtr.flush().context("Failed to flush CSV output")?;
        Ok(self.state.payments().len())
    }
}
