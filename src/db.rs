//src/db.rs
use crate::date::{CalendarDate, MonthRange};
use crate::records::{
    NewPayment, NewWorkout, PaymentPatch, PaymentRecord, Recurrence, RecurrenceUnit,
    WorkoutPatch, WorkoutRecord,
};
use crate::store::{OwnerId, RecordKind, RecordStore, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// Custom Error type for DB operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
}

const DB_FILE_NAME: &str = "records.sqlite";
const APP_DATA_DIR: &str = "fit-calendar"; // Same dir name as config for consistency

const WORKOUT_COLUMNS: &str =
    "id, user_id, workout_date, workout_type, notes, completed, created_at";
const PAYMENT_COLUMNS: &str = "id, user_id, payment_date, amount, payment_cycle_type, \
     payment_cycle_value, next_payment_date, payment_type, created_at";

/// Gets the path to the SQLite database file within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_db_path() -> Result<PathBuf, Error> {
    let data_dir = dirs::data_dir().ok_or(Error::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, Error> {
    Connection::open(path).map_err(Error::Connection)
}

/// Initializes the database tables if they don't exist.
///
/// Dates are stored as `YYYY-MM-DD` text so range filters compare lexically.
pub fn init(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS workouts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            workout_date TEXT NOT NULL,
            workout_type TEXT NOT NULL,
            notes TEXT,
            completed INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL           -- RFC3339
        );
        CREATE INDEX IF NOT EXISTS idx_workouts_owner_date
            ON workouts (user_id, workout_date);

        CREATE TABLE IF NOT EXISTS membership_payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            payment_date TEXT NOT NULL,
            amount REAL NOT NULL CHECK(amount >= 0),
            payment_cycle_type TEXT NOT NULL CHECK(payment_cycle_type IN ('days', 'weeks', 'months')),
            payment_cycle_value INTEGER NOT NULL CHECK(payment_cycle_value > 0),
            next_payment_date TEXT NOT NULL,
            payment_type TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_owner_date
            ON membership_payments (user_id, payment_date);
        CREATE INDEX IF NOT EXISTS idx_payments_owner_next
            ON membership_payments (user_id, next_payment_date);",
    )
    .map_err(Error::Connection)
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn date_column(row: &Row, column: usize) -> Result<CalendarDate, rusqlite::Error> {
    let text: String = row.get(column)?;
    CalendarDate::parse_key(&text).map_err(|e| conversion_error(column, e))
}

fn timestamp_column(row: &Row, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

// Helper function to map a database row to a WorkoutRecord
fn map_row_to_workout(row: &Row) -> Result<WorkoutRecord, rusqlite::Error> {
    Ok(WorkoutRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        workout_date: date_column(row, 2)?,
        workout_type: row.get(3)?,
        notes: row.get(4)?,
        completed: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
    })
}

fn map_row_to_payment(row: &Row) -> Result<PaymentRecord, rusqlite::Error> {
    let unit_str: String = row.get(4)?;
    let count: u32 = row.get(5)?;
    let unit = RecurrenceUnit::try_from(unit_str.as_str()).map_err(|e| conversion_error(4, e))?;
    let recurrence = Recurrence::new(unit, count).map_err(|e| conversion_error(5, e))?;

    Ok(PaymentRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        payment_date: date_column(row, 2)?,
        amount: row.get(3)?,
        recurrence,
        next_payment_date: date_column(row, 6)?,
        payment_type: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
    })
}

// Rows that don't decode into records are malformed data; anything else is
// the database itself failing.
fn row_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::Malformed(err.to_string()),
        other => Error::QueryFailed(other).into(),
    }
}

fn rejected(err: impl std::fmt::Display) -> StoreError {
    StoreError::Constraint(err.to_string())
}

/// A `RecordStore` over a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wraps an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self, Error> {
        init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::new(open_db(path)?)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::new(Connection::open_in_memory().map_err(Error::Connection)?)
    }

    fn get_workout(&self, owner: &OwnerId, id: &str) -> Result<Option<WorkoutRecord>, Error> {
        let sql = format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE id = ?1 AND user_id = ?2");
        self.conn
            .query_row(&sql, params![id, owner.as_str()], map_row_to_workout)
            .optional()
            .map_err(Error::QueryFailed)
    }

    fn get_payment(&self, owner: &OwnerId, id: &str) -> Result<Option<PaymentRecord>, Error> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM membership_payments WHERE id = ?1 AND user_id = ?2"
        );
        self.conn
            .query_row(&sql, params![id, owner.as_str()], map_row_to_payment)
            .optional()
            .map_err(Error::QueryFailed)
    }
}

impl RecordStore for SqliteStore {
    fn fetch_workouts(
        &self,
        owner: &OwnerId,
        range: MonthRange,
    ) -> Result<Vec<WorkoutRecord>, StoreError> {
        let sql = format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts
             WHERE user_id = ?1 AND workout_date >= ?2 AND workout_date <= ?3
             ORDER BY workout_date ASC, created_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(Error::QueryFailed)?;
        let rows = stmt
            .query_map(
                params![owner.as_str(), range.start.key(), range.end.key()],
                map_row_to_workout,
            )
            .map_err(Error::QueryFailed)?;

        let workouts = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(row_error)?;
        debug!(count = workouts.len(), %range, "Fetched workouts");
        Ok(workouts)
    }

    fn fetch_payments(
        &self,
        owner: &OwnerId,
        range: MonthRange,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        // Either date may land in the month, so both are tested independently.
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM membership_payments
             WHERE user_id = ?1
               AND ((payment_date >= ?2 AND payment_date <= ?3)
                 OR (next_payment_date >= ?2 AND next_payment_date <= ?3))
             ORDER BY payment_date ASC, created_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(Error::QueryFailed)?;
        let rows = stmt
            .query_map(
                params![owner.as_str(), range.start.key(), range.end.key()],
                map_row_to_payment,
            )
            .map_err(Error::QueryFailed)?;

        let payments = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(row_error)?;
        debug!(count = payments.len(), %range, "Fetched payments");
        Ok(payments)
    }

    fn create_workout(
        &self,
        owner: &OwnerId,
        workout: &NewWorkout,
    ) -> Result<WorkoutRecord, StoreError> {
        let workout = workout.clone().validated().map_err(rejected)?;
        let record = WorkoutRecord {
            id: Uuid::new_v4().to_string(),
            user_id: owner.as_str().to_string(),
            workout_date: workout.workout_date,
            workout_type: workout.workout_type,
            notes: workout.notes,
            completed: workout.completed,
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                "INSERT INTO workouts (id, user_id, workout_date, workout_type, notes, completed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.user_id,
                    record.workout_date.key(),
                    record.workout_type,
                    record.notes,
                    record.completed,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(Error::InsertFailed)?;
        Ok(record)
    }

    fn update_workout(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: &WorkoutPatch,
    ) -> Result<WorkoutRecord, StoreError> {
        let existing = self.get_workout(owner, id)?.ok_or_else(|| StoreError::NotFound {
            kind: RecordKind::Workout,
            id: id.to_string(),
        })?;
        let updated = patch.apply_to(&existing).map_err(rejected)?;

        self.conn
            .execute(
                "UPDATE workouts SET workout_date = ?1, workout_type = ?2, notes = ?3, completed = ?4
                 WHERE id = ?5 AND user_id = ?6",
                params![
                    updated.workout_date.key(),
                    updated.workout_type,
                    updated.notes,
                    updated.completed,
                    id,
                    owner.as_str(),
                ],
            )
            .map_err(Error::UpdateFailed)?;
        Ok(updated)
    }

    fn delete_workout(&self, owner: &OwnerId, id: &str) -> Result<(), StoreError> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM workouts WHERE id = ?1 AND user_id = ?2",
                params![id, owner.as_str()],
            )
            .map_err(Error::DeleteFailed)?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound {
                kind: RecordKind::Workout,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn create_payment(
        &self,
        owner: &OwnerId,
        payment: &NewPayment,
    ) -> Result<PaymentRecord, StoreError> {
        let payment = payment.clone().validated().map_err(rejected)?;
        // Derived here, never taken from the caller.
        let next_payment_date = payment.next_payment_date().map_err(rejected)?;
        let record = PaymentRecord {
            id: Uuid::new_v4().to_string(),
            user_id: owner.as_str().to_string(),
            payment_date: payment.payment_date,
            amount: payment.amount,
            recurrence: payment.recurrence,
            next_payment_date,
            payment_type: payment.payment_type,
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                "INSERT INTO membership_payments (id, user_id, payment_date, amount, payment_cycle_type,
                     payment_cycle_value, next_payment_date, payment_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.user_id,
                    record.payment_date.key(),
                    record.amount,
                    record.recurrence.unit().to_string(),
                    record.recurrence.count(),
                    record.next_payment_date.key(),
                    record.payment_type,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(Error::InsertFailed)?;
        Ok(record)
    }

    fn update_payment(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: &PaymentPatch,
    ) -> Result<PaymentRecord, StoreError> {
        let existing = self.get_payment(owner, id)?.ok_or_else(|| StoreError::NotFound {
            kind: RecordKind::Payment,
            id: id.to_string(),
        })?;
        // apply_to rederives next_payment_date from the merged fields.
        let updated = patch.apply_to(&existing).map_err(rejected)?;

        self.conn
            .execute(
                "UPDATE membership_payments
                 SET payment_date = ?1, amount = ?2, payment_cycle_type = ?3, payment_cycle_value = ?4,
                     next_payment_date = ?5, payment_type = ?6
                 WHERE id = ?7 AND user_id = ?8",
                params![
                    updated.payment_date.key(),
                    updated.amount,
                    updated.recurrence.unit().to_string(),
                    updated.recurrence.count(),
                    updated.next_payment_date.key(),
                    updated.payment_type,
                    id,
                    owner.as_str(),
                ],
            )
            .map_err(Error::UpdateFailed)?;
        Ok(updated)
    }

    fn delete_payment(&self, owner: &OwnerId, id: &str) -> Result<(), StoreError> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM membership_payments WHERE id = ?1 AND user_id = ?2",
                params![id, owner.as_str()],
            )
            .map_err(Error::DeleteFailed)?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound {
                kind: RecordKind::Payment,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
