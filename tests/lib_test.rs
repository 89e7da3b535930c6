use anyhow::Result;
use fit_calendar_lib::{
    ActionError, AppService, CalendarDate, CalendarState, Config, Dialog, DisplayState,
    FetchOutcome, NewPayment, NewWorkout, OwnerId, PaymentMark, PaymentPatch, PaymentRecord,
    Recurrence, RecordStore, SqliteStore, StoreError, ValidationError, ViewState, WorkoutPatch,
    WorkoutRecord, YearMonth,
};
use fit_calendar_lib::{MonthRange, RecurrenceUnit};
use std::cell::Cell;

fn d(s: &str) -> CalendarDate {
    CalendarDate::parse_key(s).unwrap()
}

fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

// Helper function to create a test service with in-memory database
fn create_test_service() -> Result<AppService> {
    service_with(SqliteStore::open_in_memory()?)
}

fn service_with<S: RecordStore>(store: S) -> Result<AppService<S>> {
    let config = Config {
        owner_id: Some("tester".to_string()),
        ..Default::default()
    };

    Ok(AppService {
        config,
        store,
        state: CalendarState::new(ym(2024, 1)),
        db_path: ":memory:".into(),
        config_path: "test_config.toml".into(),
    })
}

fn monthly_payment(date: &str) -> NewPayment {
    NewPayment {
        payment_date: d(date),
        amount: 50_000.0,
        recurrence: Recurrence::default(),
        payment_type: "Gym".to_string(),
    }
}

/// Delegates to an in-memory store until `failing` is switched on.
struct FlakyStore {
    inner: SqliteStore,
    failing: Cell<bool>,
}

impl FlakyStore {
    fn new() -> Result<Self> {
        Ok(Self {
            inner: SqliteStore::open_in_memory()?,
            failing: Cell::new(false),
        })
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.get() {
            Err(StoreError::Unavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FlakyStore {
    fn fetch_workouts(
        &self,
        owner: &OwnerId,
        range: MonthRange,
    ) -> Result<Vec<WorkoutRecord>, StoreError> {
        self.check()?;
        self.inner.fetch_workouts(owner, range)
    }

    fn fetch_payments(
        &self,
        owner: &OwnerId,
        range: MonthRange,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.check()?;
        self.inner.fetch_payments(owner, range)
    }

    fn create_workout(
        &self,
        owner: &OwnerId,
        workout: &NewWorkout,
    ) -> Result<WorkoutRecord, StoreError> {
        self.check()?;
        self.inner.create_workout(owner, workout)
    }

    fn update_workout(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: &WorkoutPatch,
    ) -> Result<WorkoutRecord, StoreError> {
        self.check()?;
        self.inner.update_workout(owner, id, patch)
    }

    fn delete_workout(&self, owner: &OwnerId, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete_workout(owner, id)
    }

    fn create_payment(
        &self,
        owner: &OwnerId,
        payment: &NewPayment,
    ) -> Result<PaymentRecord, StoreError> {
        self.check()?;
        self.inner.create_payment(owner, payment)
    }

    fn update_payment(
        &self,
        owner: &OwnerId,
        id: &str,
        patch: &PaymentPatch,
    ) -> Result<PaymentRecord, StoreError> {
        self.check()?;
        self.inner.update_payment(owner, id, patch)
    }

    fn delete_payment(&self, owner: &OwnerId, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete_payment(owner, id)
    }
}

#[test]
fn test_add_workout_shows_in_grid() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;

    let created = service
        .add_workout(NewWorkout::new(d("2024-01-10"), " Gym ").with_notes("  "))?
        .expect("signed in");
    assert_eq!(created.workout_type, "Gym");
    assert_eq!(created.notes, None);
    assert!(created.completed);

    assert_eq!(service.state.workouts().len(), 1);
    let grid = service.grid(d("2024-01-20"))?;
    assert_eq!(grid.cell(d("2024-01-10")).unwrap().state, DisplayState::WorkoutOnly);
    assert_eq!(grid.cell(d("2024-01-11")).unwrap().state, DisplayState::Plain);
    assert_eq!(grid.cell(d("2024-01-20")).unwrap().state, DisplayState::Today);

    Ok(())
}

#[test]
fn test_payment_appears_on_paid_and_due_days() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;

    let payment = service.add_payment(monthly_payment("2024-01-05"))?.expect("signed in");
    assert_eq!(payment.next_payment_date, d("2024-02-05"));

    let grid = service.grid(d("2023-06-01"))?;
    assert_eq!(grid.cell(d("2024-01-05")).unwrap().state, DisplayState::PaymentOnly);

    service.next_month()?;
    assert_eq!(service.state.month(), ym(2024, 2));
    assert_eq!(service.state.payments().len(), 1);

    let day = service.day(d("2024-02-05"));
    assert_eq!(day.payments.len(), 1);
    assert_eq!(day.payments[0].0, PaymentMark::Due);
    let grid = service.grid(d("2023-06-01"))?;
    assert_eq!(grid.cell(d("2024-02-05")).unwrap().state, DisplayState::PaymentOnly);

    // March sees neither date
    service.next_month()?;
    assert!(service.state.payments().is_empty());

    Ok(())
}

#[test]
fn test_next_payment_date_derivation() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-03-01"))?;

    let monthly = service.add_payment(monthly_payment("2024-03-15"))?.unwrap();
    assert_eq!(monthly.next_payment_date, d("2024-04-15"));

    let weekly = service
        .add_payment(NewPayment {
            recurrence: Recurrence::new(RecurrenceUnit::Days, 7)?,
            ..monthly_payment("2024-03-15")
        })?
        .unwrap();
    assert_eq!(weekly.next_payment_date, d("2024-03-22"));

    // Month-end clamps instead of overflowing
    let clamped = service.add_payment(monthly_payment("2024-01-31"))?.unwrap();
    assert_eq!(clamped.next_payment_date, d("2024-02-29"));

    // Editing the date rederives the due date
    let updated = service
        .update_payment(
            &monthly.id,
            &PaymentPatch {
                payment_date: Some(d("2024-03-20")),
                ..Default::default()
            },
        )?
        .unwrap();
    assert_eq!(updated.next_payment_date, d("2024-04-20"));

    Ok(())
}

#[test]
fn test_signed_out_actions_do_nothing() -> Result<()> {
    let mut service = create_test_service()?;
    service.config.owner_id = None;

    assert!(service.refresh()?.is_none());
    assert!(service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?.is_none());
    assert!(service.add_payment(monthly_payment("2024-01-05"))?.is_none());
    assert!(!service.delete_workout("missing")?);

    let owner = OwnerId::new("tester").unwrap();
    let range = ym(2024, 1).range()?;
    assert!(service.store.fetch_workouts(&owner, range)?.is_empty());
    assert!(service.store.fetch_payments(&owner, range)?.is_empty());

    Ok(())
}

#[test]
fn test_validation_errors_never_reach_store() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;

    let result = service.add_payment(NewPayment {
        amount: 0.0,
        ..monthly_payment("2024-01-05")
    });
    assert!(matches!(
        result,
        Err(ActionError::Validation(ValidationError::NonPositiveAmount(_)))
    ));

    let result = service.add_workout(NewWorkout::new(d("2024-01-10"), "   "));
    assert!(matches!(
        result,
        Err(ActionError::Validation(ValidationError::MissingField(_)))
    ));

    let result = service.update_workout("anything", &WorkoutPatch::default());
    assert!(matches!(
        result,
        Err(ActionError::Validation(ValidationError::EmptyUpdate))
    ));

    service.refresh()?;
    assert!(service.state.workouts().is_empty());
    assert!(service.state.payments().is_empty());

    Ok(())
}

#[test]
fn test_store_failure_leaves_state_untouched() -> Result<()> {
    let mut service = service_with(FlakyStore::new()?)?;
    service.go_to(d("2024-01-01"))?;
    service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?;
    assert_eq!(service.state.workouts().len(), 1);

    service.store.failing.set(true);
    let result = service.add_workout(NewWorkout::new(d("2024-01-11"), "Yoga"));
    assert!(matches!(result, Err(ActionError::Store(StoreError::Unavailable(_)))));
    assert_eq!(service.state.workouts().len(), 1);

    // A failed reload keeps what was already shown
    let refresh = service.refresh()?.unwrap();
    assert_eq!(refresh.workouts, FetchOutcome::Failed);
    assert_eq!(refresh.payments, FetchOutcome::Failed);
    assert_eq!(service.state.workouts().len(), 1);

    service.store.failing.set(false);
    let refresh = service.refresh()?.unwrap();
    assert_eq!(refresh.workouts, FetchOutcome::Applied { count: 1 });

    Ok(())
}

#[test]
fn test_stale_fetch_is_discarded() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;
    service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?;

    let owner = service.owner().unwrap();
    let ticket = service.state.begin_fetch()?;
    let january = service.store.fetch_workouts(&owner, ticket.range);

    // User moves on before the January result arrives
    service.next_month()?;
    assert_eq!(service.state.apply_workouts(&ticket, january), FetchOutcome::Discarded);
    assert!(service.state.workouts().is_empty());

    // Going back issues a fresh fetch; the old ticket stays stale
    service.previous_month()?;
    assert_eq!(service.state.workouts().len(), 1);
    assert!(!service.state.is_current(&ticket));

    Ok(())
}

#[test]
fn test_navigation_round_trip() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-12-25"))?;
    service.add_workout(NewWorkout::new(d("2024-12-31"), "Running"))?;

    let nav = service.next_month()?;
    assert_eq!(nav.month, ym(2025, 1));
    assert!(service.state.workouts().is_empty());

    let nav = service.previous_month()?;
    assert_eq!(nav.month, ym(2024, 12));
    assert_eq!(service.state.workouts().len(), 1);
    assert_eq!(service.state.range()?.end, d("2024-12-31"));

    Ok(())
}

#[test]
fn test_select_day_dialog() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;
    let workout = service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?.unwrap();

    // Jan 2024 starts on a Monday, so the grid opens with Dec 31
    assert!(!service.select_day(d("2023-12-31"), d("2024-01-15"))?);
    assert!(service.state.dialog().is_none());

    assert!(service.select_day(d("2024-01-10"), d("2024-01-15"))?);
    assert!(service.state.start_editing_workout(&workout.id));
    assert!(matches!(
        service.state.dialog(),
        Some(Dialog::Day { workouts: ViewState::Editing(_), .. })
    ));

    // Saving returns the day dialog to its list
    service.update_workout(
        &workout.id,
        &WorkoutPatch {
            notes: Some(Some("legs".to_string())),
            ..Default::default()
        },
    )?;
    assert!(matches!(
        service.state.dialog(),
        Some(Dialog::Day { workouts: ViewState::Listing, .. })
    ));
    assert_eq!(service.day(d("2024-01-10")).workouts[0].notes.as_deref(), Some("legs"));

    service.next_month()?;
    assert!(service.state.dialog().is_none());

    Ok(())
}

#[test]
fn test_delete_records() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;
    let workout = service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?.unwrap();
    let payment = service.add_payment(monthly_payment("2024-01-05"))?.unwrap();

    assert!(service.delete_workout(&workout.id)?);
    assert!(service.delete_payment(&payment.id)?);
    assert!(service.state.workouts().is_empty());
    assert!(service.state.payments().is_empty());

    let missing = service.delete_workout(&workout.id);
    assert!(matches!(
        missing,
        Err(ActionError::Store(StoreError::NotFound { .. }))
    ));

    Ok(())
}

#[test]
fn test_logout_forgets_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut service = create_test_service()?;
    service.config_path = dir.path().join("config.toml");
    service.go_to(d("2024-01-01"))?;
    service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?;

    service.logout()?;
    assert!(service.owner().is_none());
    assert!(service.state.workouts().is_empty());
    assert_eq!(service.state.month(), ym(2024, 1));

    service.login("tester")?;
    service.refresh()?;
    assert_eq!(service.state.workouts().len(), 1);

    Ok(())
}

#[test]
fn test_csv_export() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-01-01"))?;
    service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym").with_notes("5x5"))?;
    service.add_payment(monthly_payment("2024-01-05"))?;

    let mut out = Vec::new();
    assert_eq!(service.export_workouts_csv(&mut out)?, 1);
    let text = String::from_utf8(out)?;
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,workout_date,workout_type,notes,completed,created_at")
    );
    assert!(lines.next().unwrap().contains(",2024-01-10,Gym,5x5,true,"));

    let mut out = Vec::new();
    assert_eq!(service.export_payments_csv(&mut out)?, 1);
    let text = String::from_utf8(out)?;
    assert!(text.contains(",2024-01-05,50000.0,months,1,2024-02-05,Gym,"));

    Ok(())
}

#[test]
fn test_edit_outside_displayed_month_is_validated_locally() -> Result<()> {
    let mut service = create_test_service()?;
    service.go_to(d("2024-03-01"))?;
    let payment = service.add_payment(monthly_payment("2024-03-10"))?.unwrap();
    let workout = service.add_workout(NewWorkout::new(d("2024-03-12"), "Gym"))?.unwrap();

    // March's records are no longer loaded
    service.go_to(d("2024-06-01"))?;
    assert!(service.state.payments().is_empty());

    let result = service.update_payment(
        &payment.id,
        &PaymentPatch {
            amount: Some(-5.0),
            ..Default::default()
        },
    );
    assert!(matches!(
        result,
        Err(ActionError::Validation(ValidationError::NonPositiveAmount(_)))
    ));

    let result = service.update_workout(
        &workout.id,
        &WorkoutPatch {
            workout_type: Some("  ".to_string()),
            ..Default::default()
        },
    );
    assert!(matches!(
        result,
        Err(ActionError::Validation(ValidationError::MissingField(_)))
    ));

    // Nothing changed in the store
    service.go_to(d("2024-03-01"))?;
    assert_eq!(service.state.payments()[0].amount, 50_000.0);
    assert_eq!(service.state.workouts()[0].workout_type, "Gym");

    Ok(())
}

#[test]
fn test_fetch_from_previous_user_is_discarded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut service = create_test_service()?;
    service.config_path = dir.path().join("config.toml");
    service.login("alice")?;
    service.go_to(d("2024-01-01"))?;
    service.add_workout(NewWorkout::new(d("2024-01-10"), "Gym"))?;

    let alice = service.owner().unwrap();
    let ticket = service.state.begin_fetch()?;
    let in_flight = service.store.fetch_workouts(&alice, ticket.range);

    service.logout()?;
    service.login("bob")?;
    assert_eq!(service.state.month(), ym(2024, 1));
    assert_eq!(service.state.apply_workouts(&ticket, in_flight), FetchOutcome::Discarded);
    assert!(service.state.workouts().is_empty());

    let refresh = service.refresh()?.unwrap();
    assert_eq!(refresh.workouts, FetchOutcome::Applied { count: 0 });

    Ok(())
}
