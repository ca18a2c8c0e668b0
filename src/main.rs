//! Terminal front end for the task ticker.
//!
//! ```bash
//! # interactive session in the current directory
//! task-ticker run
//!
//! # store credentials, then list eligible tasks
//! task-ticker config set --secret secret_xxx --database 0123abcd
//! task-ticker tasks
//!
//! # verbose diagnostics in logs/ticker.log
//! RUST_LOG=task_ticker=debug task-ticker --root ~/ticker run
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use task_ticker::application::alerts::AlertReceiver;
use task_ticker::application::bootstrap::{bootstrap_workspace, open_session, Workspace};
use task_ticker::application::session::{Session, SessionSnapshot};
use task_ticker::application::task_board::{IncrementOutcome, LoadOutcome};
use task_ticker::domain::models::{Phase, SessionConfig, Task, TimerState};
use task_ticker::infrastructure::notion_client::ReqwestNotionClient;

type TickerSession = Session<ReqwestNotionClient>;

const PROGRESS_WIDTH: usize = 24;

/// Pomodoro timer that records finished work sessions on Notion tasks
#[derive(Parser, Debug)]
#[command(name = "task-ticker", version, about)]
struct Cli {
    /// Workspace directory holding config/, state/ and logs/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive timer session (default)
    Run,
    /// Load and print eligible tasks
    Tasks,
    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Play the completion sound once
    Ding,
    /// Record one finished session on a task
    Increment {
        /// Task id, or its 1-based position in the task list
        task: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print durations, credentials and workspace paths
    Show,
    /// Update durations (minutes) or credentials
    Set {
        #[arg(long)]
        work: Option<u32>,
        #[arg(long)]
        short: Option<u32>,
        #[arg(long)]
        long: Option<u32>,
        #[arg(long)]
        secret: Option<String>,
        #[arg(long)]
        database: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let workspace = bootstrap_workspace(&root)
        .with_context(|| format!("Failed to prepare workspace at {}", root.display()))?;
    init_logging(&workspace)?;
    info!(version = env!("CARGO_PKG_VERSION"), root = %root.display(), "task-ticker starting");

    let (session, alerts) = open_session(&workspace).context("Failed to open session")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_interactive(session, alerts).await,
        Command::Tasks => {
            report_load(session.load_tasks().await);
            print_tasks(&session.snapshot()?);
            flush_alerts(alerts);
            Ok(())
        }
        Command::Config { action } => run_config(&session, &workspace, action),
        Command::Ding => {
            session.test_chime();
            Ok(())
        }
        Command::Increment { task } => {
            let loaded = session.load_tasks().await;
            if !matches!(loaded, LoadOutcome::Loaded { .. }) {
                report_load(loaded);
                flush_alerts(alerts);
                bail!("Tasks could not be loaded, nothing recorded");
            }
            report_increment(&task, session.increment_listed(&task).await);
            flush_alerts(alerts);
            Ok(())
        }
    }
}

fn init_logging(workspace: &Workspace) -> Result<()> {
    let path = workspace.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("task_ticker=info"),
    };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_config(session: &TickerSession, workspace: &Workspace, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            let snapshot = session.snapshot()?;
            println!("workspace   {}", workspace.root.display());
            println!("database    {}", workspace.database_path.display());
            println!("log         {}", workspace.log_path().display());
            print_durations(&snapshot.config);
            println!(
                "credentials {}",
                if snapshot.credentials_ready { "set" } else { "missing" }
            );
            println!(
                "selected    {}",
                snapshot.selection.task_id().unwrap_or("(none)")
            );
            Ok(())
        }
        ConfigCommand::Set {
            work,
            short,
            long,
            secret,
            database,
        } => {
            for (phase, minutes) in [
                (Phase::Work, work),
                (Phase::ShortBreak, short),
                (Phase::LongBreak, long),
            ] {
                if let Some(minutes) = minutes {
                    session.set_duration(phase, minutes)?;
                }
            }
            if secret.is_some() || database.is_some() {
                session.update_credentials(secret, database)?;
            }
            print_durations(&session.snapshot()?.config);
            Ok(())
        }
    }
}

async fn run_interactive(session: TickerSession, mut alerts: AlertReceiver) -> Result<()> {
    let mut timer_rx = session.subscribe_timer();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    print_status(&session.snapshot()?);
    spawn_load(&session);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !handle_line(&session, line.trim())? {
                    break;
                }
            }
            Some(alert) = alerts.recv() => {
                eprintln!("\n! {}", alert.message);
            }
            changed = timer_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let timer = *timer_rx.borrow_and_update();
                let config = session.snapshot()?.config;
                render_timer(&timer, &config);
            }
        }
    }

    session.pause()?;
    println!();
    Ok(())
}

/// Returns false when the session should end.
fn handle_line(session: &TickerSession, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let argument = words.next();

    match (command, argument) {
        ("quit" | "exit" | "q", _) => return Ok(false),
        ("start", _) => {
            session.start()?;
        }
        ("pause", _) => {
            session.pause()?;
        }
        ("reset", _) => {
            session.reset()?;
        }
        ("work" | "short" | "long", _) => {
            let snapshot = session.snapshot()?;
            if snapshot.timer.running {
                println!("pause the timer before switching phase");
            } else if let Some(phase) = Phase::parse(command) {
                session.select_phase(phase)?;
            }
        }
        ("load", _) => spawn_load(session),
        ("tasks", _) => print_tasks(&session.snapshot()?),
        ("select", Some(reference)) => match session.resolve_task(reference)? {
            Some(task) => {
                session.select_task(&task.id)?;
                println!("selected {}", task.name);
            }
            None => println!("no task matches {reference}"),
        },
        ("clear", _) => {
            session.clear_selection()?;
            println!("selection cleared");
        }
        ("inc", Some(reference)) => {
            let reference = reference.to_string();
            let session = session.clone();
            tokio::spawn(async move {
                let outcome = session.increment_listed(&reference).await;
                report_increment(&reference, outcome);
            });
        }
        ("ding", _) => session.test_chime(),
        ("config", Some(kind)) => {
            let minutes = words.next().and_then(|value| value.parse::<u32>().ok());
            match (Phase::parse(kind), minutes) {
                (Some(phase), Some(minutes)) => {
                    session.set_duration(phase, minutes)?;
                    print_durations(&session.snapshot()?.config);
                }
                _ => println!("usage: config <work|short|long> <minutes>"),
            }
        }
        ("status", _) => print_status(&session.snapshot()?),
        ("help" | "?", _) => print_help(),
        _ => println!("unknown command: {line} (type help)"),
    }
    Ok(true)
}

fn spawn_load(session: &TickerSession) {
    let session = session.clone();
    tokio::spawn(async move {
        let outcome = session.load_tasks().await;
        let loaded = matches!(outcome, LoadOutcome::Loaded { .. });
        report_load(outcome);
        if loaded {
            if let Ok(snapshot) = session.snapshot() {
                print_tasks(&snapshot);
            }
        }
    });
}

fn report_load(outcome: LoadOutcome) {
    match outcome {
        LoadOutcome::NotConfigured => {
            println!("set a Notion secret and database id first (config set --secret --database)")
        }
        LoadOutcome::Loaded { count } => println!("loaded {count} task(s)"),
        LoadOutcome::Superseded | LoadOutcome::Failed => {}
    }
}

fn report_increment(reference: &str, outcome: IncrementOutcome) {
    match outcome {
        IncrementOutcome::NotConfigured => println!("Notion secret missing, nothing recorded"),
        IncrementOutcome::NotLoaded => {
            println!("{reference} is not in the loaded task list (try load), nothing recorded")
        }
        IncrementOutcome::Applied { finished_units } => {
            println!("{reference}: Finished {finished_units}")
        }
        IncrementOutcome::Failed => {}
    }
}

fn flush_alerts(mut alerts: AlertReceiver) {
    while let Ok(alert) = alerts.try_recv() {
        eprintln!("! {}", alert.message);
    }
}

fn render_timer(timer: &TimerState, config: &SessionConfig) {
    let filled = (timer.progress(config) * PROGRESS_WIDTH as f64).round() as usize;
    let filled = filled.min(PROGRESS_WIDTH);
    let state = if timer.running { "running" } else { "paused" };
    print!(
        "\r{:<11} {} [{}{}] {:<7}",
        timer.phase.label(),
        timer.clock_label(),
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        state
    );
    let _ = std::io::stdout().flush();
}

fn print_status(snapshot: &SessionSnapshot) {
    render_timer(&snapshot.timer, &snapshot.config);
    println!();
    match (&snapshot.selected_task, snapshot.selection.task_id()) {
        (Some(task), _) => println!("task: {} ({})", task.name, task.progress_label()),
        (None, Some(task_id)) => println!("task: {task_id} (not in loaded list)"),
        (None, None) => println!("task: (none)"),
    }
    if snapshot.loading {
        println!("loading tasks...");
    }
}

fn print_tasks(snapshot: &SessionSnapshot) {
    if snapshot.tasks.is_empty() {
        println!("no eligible tasks");
        return;
    }
    let selected = snapshot.selection.task_id();
    for (index, task) in snapshot.tasks.iter().enumerate() {
        let marker = if Some(task.id.as_str()) == selected { '*' } else { ' ' };
        println!("{marker}{:>3}. {}", index + 1, describe_task(task));
    }
}

fn describe_task(task: &Task) -> String {
    format!("{}  {}", task.name, task.progress_label())
}

fn print_durations(config: &SessionConfig) {
    println!(
        "durations   work {}m · short {}m · long {}m",
        config.minutes(Phase::Work),
        config.minutes(Phase::ShortBreak),
        config.minutes(Phase::LongBreak)
    );
}

fn print_help() {
    println!(
        "commands: start pause reset | work short long | load tasks select <n|id> clear \
         inc <n|id> | ding | config <work|short|long> <minutes> | status | quit"
    );
}
