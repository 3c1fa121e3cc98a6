use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod config;
mod datasets;
mod error;
mod filter;
mod forms;
mod models;
mod normalize;
mod reconcile;
mod report;
mod session;
mod source;
mod stats;
mod store;

use config::Config;
use datasets::{Dataset, EnrollmentDataset, InternDataset, TaskDataset};
use filter::{filter_view, ViewFilter};
use models::{EnrollmentView, Task, TaskStatus};
use normalize::normalize_key;
use session::Session;
use source::{HttpRecordSource, RecordSource, WriteOutcome, WriteRequest};
use store::{Notice, RecordStore, RefetchOutcome};

#[derive(Parser)]
#[command(name = "enrollment-dashboard")]
#[command(
    about = "Admin and intern dashboards over the Group Scholar record service",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in on this machine
    Login {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List students with their payment details
    Enrollments {
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Summarize enrollments and revenue
    Stats,
    /// Change a student's application status
    SetStatus {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Approved")]
        status: String,
    },
    /// Delete a student record
    Remove {
        #[arg(long)]
        email: String,
    },
    /// List tasks, by default those assigned to the signed-in account
    Tasks {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Move a task to another status
    TaskStatus {
        #[arg(long)]
        id: String,
        #[arg(long)]
        status: String,
    },
    /// Show intern task completion
    Interns {
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Submit an enrollment
    Enroll {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        college: String,
        #[arg(long)]
        track: String,
    },
    /// Register an intern account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        college: String,
        #[arg(long, default_value = "intern")]
        role: String,
    },
    /// Assign a task to an intern
    AssignTask {
        #[arg(long)]
        email: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "General")]
        category: String,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long, default_value = "")]
        deadline: String,
    },
    /// Submit a payment confirmation
    ConfirmPayment {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        transaction_id: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "dashboard-report.md")]
        out: PathBuf,
    },
    /// Export the filtered enrollment view as CSV
    Export {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value = "")]
        search: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn require_session(config: &Config) -> anyhow::Result<Session> {
    Session::load(&config.session_path).context("not signed in; run `login` first")
}

fn print_notices<D: Dataset>(store: &mut RecordStore<D>) {
    for notice in store.take_notices() {
        match notice {
            Notice::Info(message) => println!("{message}"),
            Notice::Error(message) => eprintln!("error: {message}"),
        }
    }
}

fn record_source(config: &Config) -> anyhow::Result<Arc<dyn RecordSource>> {
    let source = HttpRecordSource::new(config.records_url()?, config.timeout, config.opaque_writes)
        .context("failed to build HTTP client")?;
    Ok(Arc::new(source))
}

async fn loaded<D: Dataset>(
    source: Arc<dyn RecordSource>,
    dataset: D,
) -> anyhow::Result<RecordStore<D>> {
    let mut store = RecordStore::new(source, dataset);
    let outcome = store.refetch().await;
    print_notices(&mut store);
    match outcome {
        RefetchOutcome::Applied { .. } => Ok(store),
        other => {
            store.close();
            anyhow::bail!("could not load records ({other:?})")
        }
    }
}

async fn submit(source: &dyn RecordSource, request: WriteRequest) -> anyhow::Result<()> {
    match source.write(&request).await {
        WriteOutcome::Accepted => println!("Submitted."),
        WriteOutcome::Unknown => {
            println!("Submitted; the service does not confirm writes, check back shortly.")
        }
        WriteOutcome::Rejected { reason } => anyhow::bail!("submission failed: {reason}"),
    }
    Ok(())
}

fn print_enrollment(view: &EnrollmentView) {
    println!(
        "- {} <{}> {} | {} | {} | payment {} {:.2} ({})",
        view.name,
        view.email,
        view.track,
        view.college,
        view.status,
        view.payment_status,
        view.amount,
        view.transaction_id
    );
}

fn print_task(task: &Task) {
    println!(
        "- [{}] {} ({}, {} priority) for {} due {}",
        task.id,
        task.title,
        task.category,
        task.priority.as_str(),
        task.email,
        if task.deadline.is_empty() { "-" } else { task.deadline.as_str() },
    );
    println!("  status: {}", task.status);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Login { name, email } => {
            let session = Session::login(&config.session_path, &name, &email)?;
            println!("Signed in as {} <{}>.", session.name, session.email);
        }
        Commands::Logout => {
            Session::logout(&config.session_path)?;
            println!("Signed out.");
        }
        Commands::Whoami => match Session::load(&config.session_path) {
            Some(session) => println!("{} <{}>", session.name, session.email),
            None => println!("Not signed in."),
        },
        Commands::Enrollments {
            status,
            search,
            limit,
        } => {
            require_session(&config)?;
            let store = loaded(record_source(&config)?, EnrollmentDataset).await?;
            let shown = filter_view(store.current(), &ViewFilter::new(&status, &search));

            if shown.is_empty() {
                println!("No enrollments match.");
                return Ok(());
            }

            println!("Showing {} of {} enrollments:", shown.len().min(limit), shown.len());
            for view in shown.iter().take(limit) {
                print_enrollment(view);
            }
        }
        Commands::Stats => {
            require_session(&config)?;
            let store = loaded(record_source(&config)?, EnrollmentDataset).await?;
            let stats = stats::enrollment_stats(store.current(), Utc::now().date_naive());

            println!("Enrollments: {}", stats.total);
            for (status, count) in &stats.by_status {
                println!("- {status}: {count}");
            }
            println!("Revenue: {:.2} from {} approved payments", stats.revenue, stats.paid_count);
            println!("Growth this month: {:.1}%", stats.growth_percent);
        }
        Commands::SetStatus { email, status } => {
            require_session(&config)?;
            let email = normalize_key(&email);
            let mut store = loaded(record_source(&config)?, EnrollmentDataset).await?;

            let target = email.clone();
            let new_status = status.clone();
            let pending = store.apply_local(
                move |view: &EnrollmentView| view.email == target,
                move |view: &EnrollmentView| EnrollmentView {
                    status: new_status.clone(),
                    ..view.clone()
                },
            );
            if pending.changed == 0 {
                store.settle(pending, &WriteOutcome::Accepted);
                anyhow::bail!("no student with email {email}");
            }

            let request = WriteRequest::new("updateStatus")
                .field("email", email.as_str())
                .field("status", status.as_str());
            let outcome = store.commit(pending, &request).await;
            print_notices(&mut store);
            if outcome.is_rejected() {
                anyhow::bail!("status change for {email} was rolled back");
            }

            println!("Marked {email} as {status}; syncing...");
            store.reconcile_after(config.reconcile_delay).await;
            print_notices(&mut store);
            if let Some(view) = store.current().iter().find(|view| view.email == email) {
                print_enrollment(view);
            }
        }
        Commands::Remove { email } => {
            require_session(&config)?;
            let email = normalize_key(&email);
            let mut store = loaded(record_source(&config)?, EnrollmentDataset).await?;

            let request = WriteRequest::new("deleteStudent").field("email", email.as_str());
            let outcome = store
                .remove(|view: &EnrollmentView| view.email == email, &request)
                .await;
            print_notices(&mut store);
            if outcome.is_rejected() {
                anyhow::bail!("could not delete {email}");
            }

            store.reconcile_after(config.reconcile_delay).await;
            print_notices(&mut store);
            println!("{} enrollments remain.", store.current().len());
        }
        Commands::Tasks {
            email,
            status,
            search,
        } => {
            let session = require_session(&config)?;
            let assignee = normalize_key(email.as_deref().unwrap_or(&session.email));
            let store = loaded(record_source(&config)?, TaskDataset).await?;

            let mine: Vec<Task> = store
                .current()
                .iter()
                .filter(|task| task.email == assignee)
                .cloned()
                .collect();
            let shown = filter_view(&mine, &ViewFilter::new(&status, &search));
            let task_stats = stats::task_stats(&mine);

            println!(
                "{} tasks for {assignee}, {:.0}% completed",
                task_stats.total, task_stats.completion_rate
            );
            if shown.is_empty() {
                println!("No tasks match.");
            }
            for task in shown {
                print_task(task);
            }
        }
        Commands::TaskStatus { id, status } => {
            require_session(&config)?;
            let status = TaskStatus::parse(&status);
            let mut store = loaded(record_source(&config)?, TaskDataset).await?;
            let Some(task) = store.current().iter().find(|task| task.has_id(&id)) else {
                store.close();
                anyhow::bail!("no task with id {}", id.trim());
            };
            // Writes echo the id as the service spelled it.
            let id = task.id.clone();

            let target = id.clone();
            let pending = store.apply_local(
                move |task: &Task| task.has_id(&target),
                move |task: &Task| Task {
                    status,
                    ..task.clone()
                },
            );
            if pending.changed == 0 {
                store.settle(pending, &WriteOutcome::Accepted);
                anyhow::bail!("no task with id {id}");
            }

            let request = WriteRequest::new("updateTask")
                .field("id", id.as_str())
                .field("status", status.as_str());
            let outcome = store.commit(pending, &request).await;
            print_notices(&mut store);
            if outcome.is_rejected() {
                anyhow::bail!("task {id} was rolled back");
            }

            store.reconcile_after(config.reconcile_delay).await;
            print_notices(&mut store);
            if let Some(task) = store.current().iter().find(|task| task.has_id(&id)) {
                print_task(task);
            }
        }
        Commands::Interns { status, search } => {
            require_session(&config)?;
            let store = loaded(record_source(&config)?, InternDataset).await?;
            let shown = filter_view(store.current(), &ViewFilter::new(&status, &search));

            if shown.is_empty() {
                println!("No interns match.");
            }
            for intern in shown {
                println!(
                    "- {} <{}> {} | {} | {}/{} tasks ({:.0}%)",
                    intern.name,
                    intern.email,
                    intern.role,
                    intern.status,
                    intern.completed_tasks,
                    intern.total_tasks,
                    intern.completion_rate
                );
            }
        }
        Commands::Enroll {
            name,
            email,
            phone,
            college,
            track,
        } => {
            let session = Session::load(&config.session_path);
            let form = forms::EnrollmentForm {
                name: name
                    .or_else(|| session.as_ref().map(|s| s.name.clone()))
                    .unwrap_or_default(),
                email: email
                    .or_else(|| session.as_ref().map(|s| s.email.clone()))
                    .unwrap_or_default(),
                phone,
                college,
                track,
            };
            submit(record_source(&config)?.as_ref(), form.validate()?).await?;
        }
        Commands::Register {
            name,
            email,
            college,
            role,
        } => {
            let form = forms::InternRegistration {
                name,
                email,
                college,
                role,
            };
            submit(record_source(&config)?.as_ref(), form.validate()?).await?;
        }
        Commands::AssignTask {
            email,
            title,
            category,
            priority,
            deadline,
        } => {
            require_session(&config)?;
            let form = forms::TaskAssignment {
                email,
                title,
                category,
                priority,
                deadline,
            };
            submit(record_source(&config)?.as_ref(), form.validate()?).await?;
        }
        Commands::ConfirmPayment {
            email,
            amount,
            transaction_id,
        } => {
            let session = Session::load(&config.session_path);
            let form = forms::PaymentConfirmation {
                email: email
                    .or_else(|| session.map(|s| s.email))
                    .unwrap_or_default(),
                amount,
                transaction_id,
            };
            submit(record_source(&config)?.as_ref(), form.validate()?).await?;
        }
        Commands::Report { out } => {
            require_session(&config)?;
            let source = record_source(&config)?;
            let enrollments = loaded(source.clone(), EnrollmentDataset).await?;
            let tasks = loaded(source.clone(), TaskDataset).await?;
            let interns = loaded(source, InternDataset).await?;

            let report = report::build_report(
                Utc::now().date_naive(),
                enrollments.current(),
                tasks.current(),
                interns.current(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            csv,
            status,
            search,
        } => {
            require_session(&config)?;
            let store = loaded(record_source(&config)?, EnrollmentDataset).await?;
            let shown = filter_view(store.current(), &ViewFilter::new(&status, &search));
            let written = report::export_csv(&csv, &shown)?;
            info!(rows = written, path = %csv.display(), "exported enrollments");
            println!("Exported {written} enrollments to {}.", csv.display());
        }
    }

    Ok(())
}
