use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod api;
mod attendance;
mod collection;
mod config;
mod dashboard;
mod fees;
mod maintenance;
mod models;
mod report;
mod settings;
mod students;
#[cfg(test)]
mod testing;

use crate::api::{HttpApi, SchoolApi};
use crate::attendance::AttendanceSheet;
use crate::collection::{Confirm, DeleteOutcome, Feedback, LoadOutcome};
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::fees::FeeLedger;
use crate::maintenance::BackupsView;
use crate::models::{AttendanceStatus, ExportFormat, FeeId, StudentId};
use crate::settings::SettingsStore;
use crate::students::{StudentForm, StudentRoster};

#[derive(Parser)]
#[command(name = "school-admin")]
#[command(about = "Student records, attendance and fees for a school office", long_about = None)]
struct Cli {
    /// Backend base URL, overrides SCHOOL_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Local settings file, overrides SCHOOL_SETTINGS_PATH
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the student roster
    Students {
        #[command(subcommand)]
        command: StudentCommands,
    },
    /// Mark and review daily attendance
    Attendance {
        #[command(subcommand)]
        command: AttendanceCommands,
    },
    /// Record and review fee payments
    Fees {
        #[command(subcommand)]
        command: FeeCommands,
    },
    /// Show the dashboard, optionally writing it as markdown
    Dashboard {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// View or edit local school settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Backups and roster exports
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
enum StudentCommands {
    List,
    Search {
        query: String,
    },
    Add {
        #[arg(long)]
        roll_no: String,
        #[arg(long)]
        name: String,
        #[arg(long = "class")]
        class_name: String,
        #[arg(long)]
        contact: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        address: String,
    },
    Delete {
        #[arg(long)]
        id: StudentId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Add students from a CSV with a roll_no,name,class,contact,email,address header
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    Export {
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum AttendanceCommands {
    /// Mark everyone present except the listed ids
    Mark {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_delimiter = ',')]
        absent: Vec<StudentId>,
        #[arg(long, value_delimiter = ',')]
        leave: Vec<StudentId>,
    },
    /// Show what was recorded for a date
    Show {
        #[arg(long)]
        date: NaiveDate,
    },
    /// Attendance history for one student
    Student {
        #[arg(long)]
        id: StudentId,
    },
}

#[derive(Subcommand)]
enum FeeCommands {
    List,
    Add {
        #[arg(long)]
        student_id: StudentId,
        #[arg(long)]
        total: String,
        #[arg(long, default_value = "")]
        paid: String,
        /// Defaults to the current month, e.g. "January 2024"
        #[arg(long)]
        month: Option<String>,
        /// Defaults to thirty days from today
        #[arg(long)]
        due_date: Option<NaiveDate>,
    },
    Delete {
        #[arg(long)]
        id: FeeId,
        #[arg(long)]
        yes: bool,
    },
    Stats,
    /// Fee history for one student
    Student {
        #[arg(long)]
        id: StudentId,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Set {
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },
    /// Restore and save the default settings
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    List,
    Create,
    /// Drop an entry from the listed backups by its index
    Remove {
        #[arg(long)]
        index: usize,
        #[arg(long)]
        yes: bool,
    },
    /// Download a server-side roster export
    Export {
        #[arg(long)]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
    },
}

/// Asks on stdin unless `--yes` was given.
struct PromptConfirm {
    assume_yes: bool,
}

impl Confirm for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn print_feedback(feedback: Option<&Feedback>) {
    match feedback {
        Some(feedback) if feedback.is_error() => eprintln!("{}", feedback.message()),
        Some(feedback) => println!("{}", feedback.message()),
        None => {}
    }
}

/// Prints the notice of a successful submit, or turns a failed one into an
/// error so the process exits non-zero.
fn finish_submit<E: std::fmt::Display>(
    result: Result<(), E>,
    feedback: Option<&Feedback>,
) -> anyhow::Result<()> {
    match (result, feedback) {
        (Ok(()), feedback) => {
            print_feedback(feedback);
            Ok(())
        }
        (Err(_), Some(feedback)) if feedback.is_error() => Err(anyhow!("{}", feedback.message())),
        (Err(err), _) => Err(anyhow!("{err}")),
    }
}

fn finish_delete(outcome: DeleteOutcome, feedback: Option<&Feedback>) -> anyhow::Result<()> {
    match outcome {
        DeleteOutcome::Declined => {
            println!("Cancelled.");
            Ok(())
        }
        DeleteOutcome::Deleted => {
            print_feedback(feedback);
            Ok(())
        }
        DeleteOutcome::Failed => Err(anyhow!(
            "{}",
            feedback.map(Feedback::message).unwrap_or("delete failed")
        )),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(settings) = cli.settings {
        config.settings_path = settings;
    }

    let http = HttpApi::new(config.api_url.clone(), config.http_timeout)
        .context("failed to build HTTP client")?;
    tracing::debug!(base_url = http.base_url(), "using backend");
    let api: Arc<dyn SchoolApi> = Arc::new(http);

    match cli.command {
        Commands::Students { command } => run_students(api, command).await?,
        Commands::Attendance { command } => run_attendance(api, command).await?,
        Commands::Fees { command } => run_fees(api, command).await?,
        Commands::Dashboard { out } => {
            let mut dashboard = Dashboard::new(api);
            dashboard.load().await;
            let report = report::build_dashboard_report(&dashboard.summary(), today());
            dashboard.teardown();
            match out {
                Some(out) => {
                    std::fs::write(&out, report)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Dashboard written to {}.", out.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Settings { command } => run_settings(&config, command)?,
        Commands::Backups { command } => run_backups(api, command).await?,
    }

    Ok(())
}

async fn run_students(api: Arc<dyn SchoolApi>, command: StudentCommands) -> anyhow::Result<()> {
    let mut roster = StudentRoster::new(api.clone());

    match command {
        StudentCommands::List => {
            roster.load().await;
            print!("{}", report::render_roster(roster.view()));
        }
        StudentCommands::Search { query } => {
            match students::search(api.as_ref(), &query).await {
                Ok(found) => print!("{}", report::render_students(&found)),
                Err(err) => bail!("Error searching students: {}", err.user_message()),
            }
        }
        StudentCommands::Add {
            roll_no,
            name,
            class_name,
            contact,
            email,
            address,
        } => {
            roster.form = StudentForm {
                roll_no,
                name,
                class_name,
                contact,
                email,
                address,
            };
            let result = roster.submit_form().await;
            finish_submit(result, roster.feedback())?;
        }
        StudentCommands::Delete { id, yes } => {
            roster.load().await;
            let mut confirm = PromptConfirm { assume_yes: yes };
            let outcome = roster.delete(id, &mut confirm).await;
            finish_delete(outcome, roster.feedback())?;
        }
        StudentCommands::Import { csv } => {
            let summary = students::import_csv(&mut roster, &csv).await?;
            println!("Added {} students from {}.", summary.added, csv.display());
            for (line, message) in &summary.failures {
                eprintln!("line {line}: {message}");
            }
        }
        StudentCommands::Export { out } => {
            if roster.load().await != LoadOutcome::Applied {
                bail!("could not load the student roster; nothing exported");
            }
            let written = students::export_csv(roster.students(), &out)?;
            println!("Exported {written} students to {}.", out.display());
        }
    }

    roster.teardown();
    Ok(())
}

async fn run_attendance(
    api: Arc<dyn SchoolApi>,
    command: AttendanceCommands,
) -> anyhow::Result<()> {
    match command {
        AttendanceCommands::Mark {
            date,
            absent,
            leave,
        } => {
            let mut sheet = AttendanceSheet::new(api, date.unwrap_or_else(today));
            if sheet.load().await != LoadOutcome::Applied {
                bail!("could not load the student roster; attendance not submitted");
            }
            for (ids, status) in [(absent, AttendanceStatus::Absent), (leave, AttendanceStatus::Leave)] {
                for id in ids {
                    if !sheet.set_status(id, status) {
                        eprintln!("Student {id} is not on the roster, ignoring.");
                    }
                }
            }
            print!("{}", report::render_attendance_sheet(&sheet));
            let result = sheet.submit().await;
            finish_submit(result, sheet.feedback())?;
            sheet.teardown();
        }
        AttendanceCommands::Show { date } => match api.attendance_on(date).await {
            Ok(day) => print!("{}", report::render_daily_attendance(&day)),
            Err(err) => bail!("Error loading attendance: {}", err.user_message()),
        },
        AttendanceCommands::Student { id } => match api.student_attendance(id).await {
            Ok(summary) => print!("{}", report::render_student_attendance(&summary)),
            Err(err) => bail!("Error loading attendance: {}", err.user_message()),
        },
    }
    Ok(())
}

async fn run_fees(api: Arc<dyn SchoolApi>, command: FeeCommands) -> anyhow::Result<()> {
    let mut ledger = FeeLedger::new(api.clone(), today());
    ledger.load().await;

    match command {
        FeeCommands::List | FeeCommands::Stats => print!("{}", report::render_fees(&ledger)),
        FeeCommands::Add {
            student_id,
            total,
            paid,
            month,
            due_date,
        } => {
            ledger.select_student(student_id);
            if let Some(student) = ledger.selected_student() {
                println!(
                    "Recording fees for {} ({} | {})",
                    student.name, student.roll_no, student.class_name
                );
            }
            ledger.form.total_amount = total;
            ledger.form.paid_amount = paid;
            if let Some(month) = month {
                ledger.form.month = month;
            }
            if let Some(due_date) = due_date {
                ledger.form.due_date = due_date;
            }
            let result = ledger.submit_form().await;
            finish_submit(result, ledger.feedback())?;
        }
        FeeCommands::Delete { id, yes } => {
            let mut confirm = PromptConfirm { assume_yes: yes };
            let outcome = ledger.delete(id, &mut confirm).await;
            finish_delete(outcome, ledger.feedback())?;
        }
        FeeCommands::Student { id } => match api.student_fees(id).await {
            Ok(summary) => {
                let student = ledger.students().iter().find(|student| student.id == id);
                print!("{}", report::render_student_fees(&summary, student));
            }
            Err(err) => bail!("Error loading fees: {}", err.user_message()),
        },
    }

    ledger.teardown();
    Ok(())
}

fn run_settings(config: &Config, command: SettingsCommands) -> anyhow::Result<()> {
    let mut store = SettingsStore::open(&config.settings_path);

    match command {
        SettingsCommands::Show => print!("{}", report::render_settings(store.settings())),
        SettingsCommands::Set { field, value } => {
            store.set(&field, &value)?;
            store.save()?;
            println!("Settings saved successfully!");
        }
        SettingsCommands::Reset { yes } => {
            let mut confirm = PromptConfirm { assume_yes: yes };
            if store.reset_confirmed(&mut confirm)? {
                println!("Settings reset to default values!");
                tracing::debug!(path = %store.path().display(), "defaults written");
            } else {
                println!("Cancelled.");
            }
        }
    }
    Ok(())
}

async fn run_backups(api: Arc<dyn SchoolApi>, command: BackupCommands) -> anyhow::Result<()> {
    match command {
        BackupCommands::List => {
            let mut view = BackupsView::new(api);
            view.load().await;
            print!("{}", report::render_backups(&view));
        }
        BackupCommands::Create => {
            let mut view = BackupsView::new(api);
            view.load().await;
            view.create(Local::now().naive_local()).await;
            print_feedback(view.feedback());
            print!("{}", report::render_backups(&view));
        }
        BackupCommands::Remove { index, yes } => {
            let mut view = BackupsView::new(api);
            view.load().await;
            if index >= view.entries().len() {
                bail!("no backup at index {index}; see `backups list`");
            }
            let mut confirm = PromptConfirm { assume_yes: yes };
            if view.remove(index, &mut confirm) {
                print_feedback(view.feedback());
            } else {
                println!("Cancelled.");
            }
            print!("{}", report::render_backups(&view));
        }
        BackupCommands::Export { format, out } => {
            match maintenance::export_students(api.as_ref(), format, &out).await? {
                Ok(written) => println!("Exported {written} bytes to {}.", out.display()),
                Err(notice) => print_feedback(Some(&notice)),
            }
        }
    }
    Ok(())
}
