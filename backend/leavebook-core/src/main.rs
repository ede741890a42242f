// src/main.rs
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use leavebook_core::backing_store::HttpBackingStore;
use leavebook_core::clock::{Clock, SystemClock};
use leavebook_core::config::DeskConfig;
use leavebook_core::desk::LeaveDesk;
use leavebook_core::duplicate_guard::GuardStatus;
use leavebook_core::export::{default_file_name, write_csv};
use leavebook_core::notice::LogNotices;
use leavebook_core::report::{DayFilter, NameFilter, ReportFilter};
use leavebook_core::request::{Request, RequestId, RequestStatus};
use leavebook_core::session::SessionError;
use leavebook_core::store::RefreshOutcome;
use leavebook_core::time_value::format_time_12h;

#[derive(Parser, Debug)]
#[command(name = "leavebook", version, about = "Staff leave request desk")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Exact staff name, or "All"
    #[arg(long, default_value = "All")]
    name: NameFilter,
    /// Day of month 1-31, or "All"
    #[arg(long, default_value = "All")]
    day: DayFilter,
}

impl FilterArgs {
    fn to_filter(&self) -> ReportFilter {
        ReportFilter::new(self.name.clone(), self.day)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the request table
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Write the filtered table as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// File a new leave request
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        time_in: String,
        #[arg(long)]
        time_out: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Suggest roster names containing TEXT
    Suggest { text: String },
    /// Manager login; the password is read from stdin
    Login {
        #[arg(long)]
        username: Option<String>,
    },
    Logout,
    Approve { id: RequestId },
    Reject { id: RequestId },
    Delete {
        id: RequestId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let config = DeskConfig::from_env().context("Failed to load LEAVEBOOK_* configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Suggest { text } => {
            for name in config.roster().suggest(&text) {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Login { username } => login(&config, clock.as_ref(), username),
        Command::Logout => {
            config
                .session_file()
                .clear()
                .context("Failed to clear manager session")?;
            info!("Manager logged out");
            Ok(())
        }
        command => {
            let desk = build_desk(&config, clock.clone())?;
            run_desk_command(&config, &desk, clock.as_ref(), command).await
        }
    }
}

fn build_desk(config: &DeskConfig, clock: Arc<dyn Clock>) -> Result<LeaveDesk> {
    let store_config = config.store_config()?;
    let backend =
        HttpBackingStore::new(store_config).context("Failed to build backing store client")?;
    info!("Using backing store at {}", backend.endpoint());
    Ok(LeaveDesk::new(
        Arc::new(backend),
        config.desk_settings(),
        Arc::new(LogNotices),
        clock,
    ))
}

async fn run_desk_command(
    config: &DeskConfig,
    desk: &LeaveDesk,
    clock: &dyn Clock,
    command: Command,
) -> Result<()> {
    if desk.refresh().await == RefreshOutcome::Retained {
        warn!("Could not load requests; continuing with an empty table");
    }

    match command {
        Command::List { filter } => {
            print_table(&desk.report(&filter.to_filter()));
            Ok(())
        }
        Command::Export { filter, out } => {
            let rows = desk.report(&filter.to_filter());
            let path =
                out.unwrap_or_else(|| PathBuf::from(default_file_name(Local::now().date_naive())));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create export file {:?}", path))?;
            let refs: Vec<&Request> = rows.iter().collect();
            let written = write_csv(file, &refs)
                .with_context(|| format!("Failed to write export file {:?}", path))?;
            info!("Exported {} rows to {:?}", written, path);
            Ok(())
        }
        Command::Submit {
            name,
            date,
            time_in,
            time_out,
            reason,
        } => submit(desk, name, date, time_in, time_out, reason).await,
        Command::Approve { id } => decide(config, desk, clock, id, RequestStatus::Approved).await,
        Command::Reject { id } => decide(config, desk, clock, id, RequestStatus::Rejected).await,
        Command::Delete { id, yes } => {
            let session = config
                .session_file()
                .restore(clock.now())
                .context("Failed to read manager session")?;
            desk.delete_request(session.as_ref(), id, |request| {
                yes || confirm_delete(request)
            })
            .await?;
            println!("Deleted request {}", id);
            Ok(())
        }
        Command::Suggest { .. } | Command::Login { .. } | Command::Logout => Ok(()),
    }
}

async fn submit(
    desk: &LeaveDesk,
    name: String,
    date: NaiveDate,
    time_in: String,
    time_out: String,
    reason: String,
) -> Result<()> {
    desk.set_name(&name);
    desk.set_date(Some(date));
    desk.set_time_in(&time_in);
    desk.blur_time_in();
    desk.set_time_out(&time_out);
    desk.blur_time_out();
    desk.set_reason(&reason);

    if let GuardStatus::Locked {
        staff_name,
        conflicting_date,
        ..
    } = desk.guard_status()
    {
        eprintln!(
            "{} already has a request on {}; waiting for the lock to clear...",
            staff_name, conflicting_date
        );
        let mut status = desk.subscribe_guard();
        while status.borrow_and_update().is_locked() {
            if status.changed().await.is_err() {
                break;
            }
        }
        bail!(
            "Not submitted: duplicate request for {} on {}",
            staff_name,
            conflicting_date
        );
    }

    let id = desk.submit().await?;
    println!("Submitted request {}", id);
    Ok(())
}

async fn decide(
    config: &DeskConfig,
    desk: &LeaveDesk,
    clock: &dyn Clock,
    id: RequestId,
    status: RequestStatus,
) -> Result<()> {
    let session = config
        .session_file()
        .restore(clock.now())
        .context("Failed to read manager session")?;
    desk.update_status(session.as_ref(), id, status).await?;
    println!("Request {} marked {}", id, status);
    Ok(())
}

fn login(config: &DeskConfig, clock: &dyn Clock, username: Option<String>) -> Result<()> {
    let credentials = config
        .manager_credentials()
        .ok_or(SessionError::NotConfigured)?;
    let username = username.unwrap_or_else(|| credentials.username.clone());

    eprint!("Password for {}: ", username);
    io::stderr().flush().ok();
    let password = read_stdin_line().context("Failed to read password")?;

    let session = config
        .session_file()
        .login(&credentials, &username, &password, clock.now())?;
    println!(
        "Logged in until {}",
        session
            .expires_at(config.session_ttl())
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn confirm_delete(request: &Request) -> bool {
    eprint!(
        "Delete request {} ({} on {})? [y/N] ",
        request.id, request.staff_name, request.date
    );
    io::stderr().flush().ok();
    match read_stdin_line() {
        Ok(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
        Err(e) => {
            warn!("Could not read confirmation: {}", e);
            false
        }
    }
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_table(rows: &[Request]) {
    println!(
        "{:<4} {:<10} {:<20} {:<8} {:<8} {:<9} {}",
        "No", "Date", "Name", "In", "Out", "Status", "Reason"
    );
    for (index, request) in rows.iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<20} {:<8} {:<8} {:<9} {}",
            index + 1,
            request.date.format("%Y-%m-%d"),
            request.staff_name,
            format_time_12h(request.time_in.as_deref()),
            format_time_12h(request.time_out.as_deref()),
            request.status,
            request.reason
        );
    }
    if rows.is_empty() {
        println!("(no requests)");
    }
}
