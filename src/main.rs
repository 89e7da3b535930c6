//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::stdout;
use tracing_subscriber::EnvFilter;

use fit_calendar_lib::{
    parse_color, AppService, CalendarCell, CalendarDate, Config, DayView, MonthGrid, NewPayment,
    NewWorkout, PaymentMark, PaymentPatch, Recurrence, RecordStore, WorkoutPatch, YearMonth,
    RECURRENCE_PRESETS,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli_args = cli::parse_args(); // Parse arguments once

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command(); // Get the command structure
        let bin_name = cmd.get_name().to_string(); // Get the binary name

        eprintln!("Generating completion script for {shell}..."); // Print to stderr
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout()); // Print script to stdout
        return Ok(()); // Exit after generating script
    }

    // Initialize the application service (loads config, connects to DB)
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    let today = CalendarDate::today();
    let header_color = header_color(&service.config);

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
        cli::Commands::Login { owner_id } => {
            service.login(&owner_id).context("Failed to sign in")?;
            println!("Signed in as '{}'.", owner_id.trim());
        }
        cli::Commands::Logout => {
            service.logout().context("Failed to sign out")?;
            println!("Signed out.");
        }
        cli::Commands::Categories => print_categories(&service.config),

        // Everything below reads or writes records and needs a signed-in user.
        _ if service.owner().is_none() => {
            println!("Not signed in. Use 'login <user-id>' first.");
        }

        cli::Commands::Show { month, prev, next } => {
            let mut target = month.unwrap_or_else(|| today.year_month());
            for _ in 0..prev.unwrap_or(0) {
                target = target.pred();
            }
            for _ in 0..next.unwrap_or(0) {
                target = target.succ();
            }
            show_month(&mut service, target)?;
            let grid = service.grid(today)?;
            print_month_grid(&grid, &service.config, header_color);
        }
        cli::Commands::Day { date } => {
            show_month(&mut service, date.year_month())?;
            print_day(&service.day(date), &service.config, header_color);
        }
        cli::Commands::AddWorkout {
            date,
            workout_type,
            notes,
            planned,
        } => {
            let date = date.unwrap_or(today);
            show_month(&mut service, date.year_month())?;
            let mut workout = NewWorkout::new(date, workout_type);
            workout.notes = notes;
            workout.completed = !planned;
            match service.add_workout(workout) {
                Ok(Some(created)) => println!(
                    "Successfully added '{}' workout on {} ID: {}",
                    created.workout_type, created.workout_date, created.id
                ),
                Ok(None) => println!("Not signed in; nothing was saved."),
                Err(e) => bail!("Error adding workout: {}", e),
            }
        }
        cli::Commands::EditWorkout {
            id,
            date,
            workout_type,
            notes,
            completed,
        } => {
            let patch = WorkoutPatch {
                workout_date: date,
                workout_type,
                notes: notes.map(|n| Some(n).filter(|n| !n.trim().is_empty())),
                completed,
            };
            match service.update_workout(&id, &patch) {
                Ok(Some(updated)) => println!(
                    "Successfully updated workout ID {} ({} on {}).",
                    updated.id, updated.workout_type, updated.workout_date
                ),
                Ok(None) => println!("Not signed in; nothing was saved."),
                Err(e) => bail!("Error editing workout ID {}: {}", id, e),
            }
        }
        cli::Commands::DeleteWorkout { id } => match service.delete_workout(&id) {
            Ok(true) => println!("Successfully deleted workout ID {id}."),
            Ok(false) => println!("Not signed in; nothing was deleted."),
            Err(e) => bail!("Error deleting workout ID {}: {}", id, e),
        },
        cli::Commands::AddPayment {
            date,
            amount,
            cycle,
            payment_type,
        } => {
            let date = date.unwrap_or(today);
            let recurrence = match cycle {
                Some(c) => c.parse::<Recurrence>()?,
                None => service.config.default_recurrence()?,
            };
            let payment_type = payment_type
                .or_else(|| service.config.payment_categories.first().cloned())
                .unwrap_or_default();
            show_month(&mut service, date.year_month())?;
            let payment = NewPayment {
                payment_date: date,
                amount,
                recurrence,
                payment_type,
            };
            match service.add_payment(payment) {
                Ok(Some(created)) => println!(
                    "Successfully recorded {} payment of {} on {} (next due {}) ID: {}",
                    created.payment_type,
                    format_amount(created.amount, &service.config.currency),
                    created.payment_date,
                    created.next_payment_date,
                    created.id
                ),
                Ok(None) => println!("Not signed in; nothing was saved."),
                Err(e) => bail!("Error adding payment: {}", e),
            }
        }
        cli::Commands::EditPayment {
            id,
            date,
            amount,
            cycle,
            payment_type,
        } => {
            let patch = PaymentPatch {
                payment_date: date,
                amount,
                recurrence: cycle.map(|c| c.parse::<Recurrence>()).transpose()?,
                payment_type,
            };
            match service.update_payment(&id, &patch) {
                Ok(Some(updated)) => println!(
                    "Successfully updated payment ID {} (paid {}, next due {}).",
                    updated.id, updated.payment_date, updated.next_payment_date
                ),
                Ok(None) => println!("Not signed in; nothing was saved."),
                Err(e) => bail!("Error editing payment ID {}: {}", id, e),
            }
        }
        cli::Commands::DeletePayment { id } => match service.delete_payment(&id) {
            Ok(true) => println!("Successfully deleted payment ID {id}."),
            Ok(false) => println!("Not signed in; nothing was deleted."),
            Err(e) => bail!("Error deleting payment ID {}: {}", id, e),
        },
        cli::Commands::Export { kind, month } => {
            show_month(&mut service, month.unwrap_or_else(|| today.year_month()))?;
            let written = match kind {
                cli::ExportKind::Workouts => service.export_workouts_csv(stdout())?,
                cli::ExportKind::Payments => service.export_payments_csv(stdout())?,
            };
            eprintln!("Exported {written} record(s).");
        }
    }

    Ok(())
}

/// Moves the calendar to `month` and loads its records.
fn show_month<S: RecordStore>(service: &mut AppService<S>, month: YearMonth) -> Result<()> {
    let first = month.first_day()?;
    service.go_to(first)?;
    Ok(())
}

fn header_color(config: &Config) -> Color {
    parse_color(&config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green)
}

fn format_amount(amount: f64, currency: &str) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0} {currency}")
    } else {
        format!("{amount:.2} {currency}")
    }
}

fn render_cell(cell: &CalendarCell<'_>, config: &Config) -> Cell {
    let mut lines = vec![if cell.is_today {
        format!("[{}]", cell.date.day())
    } else {
        cell.date.day().to_string()
    }];

    // Neighbouring-month days only show their number.
    if cell.in_displayed_month {
        let (shown, hidden) = cell.visible_workouts(config.max_workouts_per_cell);
        lines.extend(shown.iter().map(|w| w.workout_type.clone()));
        if hidden > 0 {
            lines.push(format!("+{hidden} more"));
        }
        for (mark, payment) in &cell.payments {
            let prefix = match mark {
                PaymentMark::Paid => "paid",
                PaymentMark::Due => "due",
            };
            lines.push(format!("{prefix} {}", payment.payment_type));
        }
    }

    let mut rendered = Cell::new(lines.join("\n"));
    if let Some(color) = config.theme.color_for(cell.state) {
        rendered = rendered.fg(color.into());
    }
    if cell.is_today {
        rendered = rendered.add_attribute(Attribute::Bold);
    }
    rendered
}

fn print_month_grid(grid: &MonthGrid<'_>, config: &Config, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            fit_calendar_lib::calendar::WEEKDAY_LABELS
                .iter()
                .map(|label| Cell::new(label).fg(header_color)),
        );

    for week in grid.weeks() {
        table.add_row(week.iter().map(|cell| render_cell(cell, config)));
    }
    println!("{} {}", grid.month.name(), grid.month.year());
    println!("{table}");
}

fn print_day(day: &DayView<'_>, config: &Config, header_color: Color) {
    println!("{}", day.date);
    if day.workouts.is_empty() && day.payments.is_empty() {
        println!("Nothing recorded on this day.");
        return;
    }

    if !day.workouts.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("ID").fg(header_color),
                Cell::new("Type").fg(header_color),
                Cell::new("Completed").fg(header_color),
                Cell::new("Notes").fg(header_color),
            ]);
        for w in &day.workouts {
            table.add_row(vec![
                Cell::new(&w.id),
                Cell::new(&w.workout_type),
                Cell::new(if w.completed { "yes" } else { "no" }),
                Cell::new(w.notes.as_deref().unwrap_or("-")),
            ]);
        }
        println!("{table}");
    }

    if !day.payments.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("ID").fg(header_color),
                Cell::new("").fg(header_color),
                Cell::new("Type").fg(header_color),
                Cell::new("Amount").fg(header_color),
                Cell::new("Cycle").fg(header_color),
                Cell::new("Paid").fg(header_color),
                Cell::new("Next Due").fg(header_color),
            ]);
        for (mark, p) in &day.payments {
            table.add_row(vec![
                Cell::new(&p.id),
                Cell::new(match mark {
                    PaymentMark::Paid => "paid",
                    PaymentMark::Due => "due",
                }),
                Cell::new(&p.payment_type),
                Cell::new(format_amount(p.amount, &config.currency)),
                Cell::new(p.recurrence.to_string()),
                Cell::new(p.payment_date.to_string()),
                Cell::new(p.next_payment_date.to_string()),
            ]);
        }
        println!("{table}");
    }
}

fn print_categories(config: &Config) {
    println!("Workout categories: {}", config.workout_categories.join(", "));
    println!("Payment categories: {}", config.payment_categories.join(", "));
    let presets: Vec<&str> = RECURRENCE_PRESETS.iter().map(|(name, _, _)| *name).collect();
    println!("Payment cycles: {}", presets.join(", "));
    println!("  or <days|weeks|months>:<count>, default '{}'", config.default_recurrence);
}
