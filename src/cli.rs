// src/cli.rs
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use fit_calendar_lib::{CalendarDate, YearMonth};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track workouts and membership payments on a month calendar", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Workouts,
    Payments,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a month calendar with workouts and payments
    Show {
        /// Month to show (YYYY-MM). Defaults to the current month
        #[arg(short, long)]
        month: Option<YearMonth>,
        /// Go back N months from the chosen month
        #[arg(long, value_name = "N", conflicts_with = "next")]
        prev: Option<u32>,
        /// Go forward N months from the chosen month
        #[arg(long, value_name = "N")]
        next: Option<u32>,
    },
    /// List the workouts and payments on one day
    Day {
        /// Date (YYYY-MM-DD)
        date: CalendarDate,
    },
    /// Log a workout
    AddWorkout {
        /// Workout date (YYYY-MM-DD). Defaults to today
        #[arg(short, long)]
        date: Option<CalendarDate>,
        /// Workout category (e.g., "Gym", "Swimming")
        #[arg(short = 't', long = "type")]
        workout_type: String,
        /// Additional notes about the workout
        #[arg(short, long)]
        notes: Option<String>,
        /// Log the workout as planned rather than completed
        #[arg(long)]
        planned: bool,
    },
    /// Edit a logged workout
    EditWorkout {
        /// ID of the workout to edit
        id: String,
        #[arg(short, long)]
        date: Option<CalendarDate>,
        #[arg(short = 't', long = "type")]
        workout_type: Option<String>,
        /// New notes. Pass an empty string to clear them
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Delete a logged workout
    DeleteWorkout {
        /// ID of the workout to delete
        id: String,
    },
    /// Record a membership-fee payment
    AddPayment {
        /// Payment date (YYYY-MM-DD). Defaults to today
        #[arg(short, long)]
        date: Option<CalendarDate>,
        /// Amount paid
        #[arg(short, long)]
        amount: f64,
        /// Payment cycle: daily, weekly, biweekly, monthly, quarterly, semiannual, yearly, or <days|weeks|months>:<count>
        #[arg(short, long)]
        cycle: Option<String>,
        /// Membership category (e.g., "Gym", "Swimming pool")
        #[arg(short = 't', long = "type")]
        payment_type: Option<String>,
    },
    /// Edit a recorded payment. The next due date is recomputed
    EditPayment {
        id: String,
        #[arg(short, long)]
        date: Option<CalendarDate>,
        #[arg(short, long)]
        amount: Option<f64>,
        #[arg(short, long)]
        cycle: Option<String>,
        #[arg(short = 't', long = "type")]
        payment_type: Option<String>,
    },
    /// Delete a recorded payment
    DeletePayment {
        /// ID of the payment to delete
        id: String,
    },
    /// Sign in as the given user id
    Login { owner_id: String },
    /// Sign out
    Logout,
    /// List the configured workout/payment categories and payment cycles
    Categories,
    /// Export a month's records as CSV to stdout
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        /// Month to export (YYYY-MM). Defaults to the current month
        #[arg(short, long)]
        month: Option<YearMonth>,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion script
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
