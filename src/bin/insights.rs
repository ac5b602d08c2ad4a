//! Insights CLI - Command-line interface for Engagement Flux
//!
//! Commands:
//! - record: Record one page view under a browsing-session token
//! - ingest: Bulk-import page views (NDJSON or JSON array)
//! - report: Per-user engagement reports
//! - summary: Global summary over an optional time window
//! - session: Show the ordered trail of one session
//! - recent: List a user's latest page views
//! - doctor: Diagnose store and configuration health

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use engagement_flux::encoder::{self, ReportEncoder};
use engagement_flux::ingest::ViewImporter;
use engagement_flux::render::{parse_utc_offset, TextRenderer};
use engagement_flux::{
    EngagementAggregator, EngagementConfig, EventRecorder, EventStore, SessionContext,
    SqliteEventStore, UserProfile, FLUX_VERSION, PRODUCER_NAME,
};

/// Insights - Session reconstruction and engagement reports over page-view logs
#[derive(Parser)]
#[command(name = "insights")]
#[command(version = FLUX_VERSION)]
#[command(about = "Engagement reports from page-view events", long_about = None)]
struct Cli {
    /// SQLite event store path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Pipeline configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one page view
    Record {
        /// Acting user
        #[arg(short, long)]
        user: String,

        /// Page being viewed
        #[arg(short, long)]
        page: String,

        /// Previously viewed page
        #[arg(long)]
        referrer: Option<String>,

        /// Resume an existing browsing-session token
        #[arg(long)]
        session: Option<String>,
    },

    /// Bulk-import page views
    Ingest {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,
    },

    /// Per-user engagement reports
    Report {
        /// Report a single user (defaults to every user in the store)
        #[arg(short, long)]
        user: Option<String>,

        /// JSON array of {id, name, email} used as the roster
        #[arg(long)]
        roster: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Offset for displayed times, e.g. +02:00 (defaults to local)
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,
    },

    /// Global summary across all users
    Summary {
        /// Inclusive lower bound (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Inclusive upper bound (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the ordered trail of one session
    Session {
        /// Session token
        session_id: String,

        /// Offset for displayed times, e.g. -05:00 (defaults to local)
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,
    },

    /// List a user's latest page views, newest first
    Recent {
        /// User to list
        #[arg(short, long)]
        user: String,

        /// Maximum number of views (all when omitted)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Offset for displayed times, e.g. +01:00 (defaults to local)
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,
    },

    /// Diagnose store and configuration health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one page view per line)
    Ndjson,
    /// JSON array of page views
    Json,
}

#[derive(Clone, PartialEq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// Newline-delimited JSON (one user per line)
    Ndjson,
    /// JSON envelope
    Json,
    /// Pretty-printed JSON envelope
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), InsightsCliError> {
    let Cli { db, config, command } = cli;

    match command {
        Commands::Record {
            user,
            page,
            referrer,
            session,
        } => cmd_record(
            open_store(db.as_deref())?,
            &user,
            &page,
            referrer.as_deref(),
            session,
        ),

        Commands::Ingest {
            input,
            input_format,
        } => cmd_ingest(&open_store(db.as_deref())?, &input, input_format),

        Commands::Report {
            user,
            roster,
            format,
            utc_offset,
        } => cmd_report(
            open_store(db.as_deref())?,
            load_config(config.as_deref())?,
            user,
            roster.as_deref(),
            format,
            utc_offset.as_deref(),
        ),

        Commands::Summary { start, end, format } => cmd_summary(
            open_store(db.as_deref())?,
            load_config(config.as_deref())?,
            start.as_deref(),
            end.as_deref(),
            format,
        ),

        Commands::Session {
            session_id,
            utc_offset,
        } => cmd_session(
            open_store(db.as_deref())?,
            load_config(config.as_deref())?,
            &session_id,
            utc_offset.as_deref(),
        ),

        Commands::Recent {
            user,
            limit,
            utc_offset,
        } => cmd_recent(
            open_store(db.as_deref())?,
            &user,
            limit,
            utc_offset.as_deref(),
        ),

        Commands::Doctor { json } => cmd_doctor(db.as_deref(), config.as_deref(), json),
    }
}

/// The store is required for every command but `doctor`
fn open_store(db: Option<&Path>) -> Result<SqliteEventStore, InsightsCliError> {
    let path = db.ok_or(InsightsCliError::MissingDatabase)?;
    Ok(SqliteEventStore::open(path)?)
}

fn load_config(path: Option<&Path>) -> Result<EngagementConfig, InsightsCliError> {
    match path {
        Some(path) => Ok(EngagementConfig::load(path)?),
        None => Ok(EngagementConfig::default()),
    }
}

fn renderer(utc_offset: Option<&str>) -> Result<TextRenderer, InsightsCliError> {
    match utc_offset {
        Some(offset) => Ok(TextRenderer::new(parse_utc_offset(offset)?)),
        None => Ok(TextRenderer::local()),
    }
}

fn read_input(input: &Path) -> Result<String, InsightsCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_record(
    store: SqliteEventStore,
    user: &str,
    page: &str,
    referrer: Option<&str>,
    session: Option<String>,
) -> Result<(), InsightsCliError> {
    let context = match session {
        Some(token) => SessionContext::resume(token),
        None => SessionContext::new(),
    };
    let recorder = EventRecorder::new(store);

    if !recorder.record_view(&context, user, page, referrer) {
        return Err(InsightsCliError::RecordFailed);
    }

    // Print the token so the caller can resume the same browsing session
    if let Some(token) = context.end() {
        println!("{token}");
    }
    Ok(())
}

fn cmd_ingest(
    store: &SqliteEventStore,
    input: &Path,
    input_format: InputFormat,
) -> Result<(), InsightsCliError> {
    let input_data = read_input(input)?;

    let views = match input_format {
        InputFormat::Ndjson => ViewImporter::parse_ndjson(&input_data)?,
        InputFormat::Json => ViewImporter::parse_array(&input_data)?,
    };

    if views.is_empty() {
        return Err(InsightsCliError::NoEvents);
    }

    let report = ViewImporter::import(store, views);
    println!("Imported {} page views ({} failed)", report.inserted, report.failed);

    if report.failed > 0 {
        Err(InsightsCliError::ImportIncomplete(report.failed))
    } else {
        Ok(())
    }
}

fn cmd_report(
    store: SqliteEventStore,
    config: EngagementConfig,
    user: Option<String>,
    roster: Option<&Path>,
    format: OutputFormat,
    utc_offset: Option<&str>,
) -> Result<(), InsightsCliError> {
    let aggregator = EngagementAggregator::with_config(store, config);

    let profiles: Vec<UserProfile> = match (user, roster) {
        (Some(id), Some(path)) => {
            let roster = ViewImporter::parse_roster(&fs::read_to_string(path)?)?;
            vec![roster
                .into_iter()
                .find(|p| p.id == id)
                .unwrap_or_else(|| UserProfile::from_id(id))]
        }
        (Some(id), None) => vec![UserProfile::from_id(id)],
        (None, Some(path)) => ViewImporter::parse_roster(&fs::read_to_string(path)?)?,
        (None, None) => aggregator.roster()?,
    };

    let outcomes = aggregator.build_all_user_reports(&profiles);

    let output = match format {
        OutputFormat::Text => renderer(utc_offset)?.render_batch(&outcomes),
        OutputFormat::Ndjson => encoder::to_ndjson(&outcomes)?,
        OutputFormat::Json => {
            encoder::to_json(&ReportEncoder::new().encode_users(&outcomes), false)? + "\n"
        }
        OutputFormat::JsonPretty => {
            encoder::to_json(&ReportEncoder::new().encode_users(&outcomes), true)? + "\n"
        }
    };
    print!("{output}");

    if outcomes.len() < profiles.len() {
        Err(InsightsCliError::UsersSkipped(profiles.len() - outcomes.len()))
    } else {
        Ok(())
    }
}

fn cmd_summary(
    store: SqliteEventStore,
    config: EngagementConfig,
    start: Option<&str>,
    end: Option<&str>,
    format: OutputFormat,
) -> Result<(), InsightsCliError> {
    let start = start.map(|s| parse_bound(s, false)).transpose()?;
    let end = end.map(|e| parse_bound(e, true)).transpose()?;

    let aggregator = EngagementAggregator::with_config(store, config);
    let summary = aggregator.build_global_summary(start, end)?;

    let output = match format {
        OutputFormat::Text => TextRenderer::local().render_global(&summary),
        OutputFormat::Ndjson | OutputFormat::Json => {
            encoder::to_json(&ReportEncoder::new().encode_global(&summary), false)? + "\n"
        }
        OutputFormat::JsonPretty => {
            encoder::to_json(&ReportEncoder::new().encode_global(&summary), true)? + "\n"
        }
    };
    print!("{output}");
    Ok(())
}

fn cmd_session(
    store: SqliteEventStore,
    config: EngagementConfig,
    session_id: &str,
    utc_offset: Option<&str>,
) -> Result<(), InsightsCliError> {
    let aggregator = EngagementAggregator::with_config(store, config);
    let session = aggregator.session_trail(session_id)?;
    let renderer = renderer(utc_offset)?;

    let span = match (session.started_at(), session.ended_at()) {
        (Some(start), Some(end)) => format!(
            ", {} to {}",
            renderer.format_time(start),
            renderer.format_time(end)
        ),
        _ => String::new(),
    };
    println!("Session {} ({} views{})", session_id, session.len(), span);
    for (idx, event) in session.events.iter().enumerate() {
        println!(
            "  {}. {} ({})",
            idx + 1,
            event.page_name,
            renderer.format_time(event.timestamp)
        );
    }
    Ok(())
}

fn cmd_recent(
    store: SqliteEventStore,
    user: &str,
    limit: Option<usize>,
    utc_offset: Option<&str>,
) -> Result<(), InsightsCliError> {
    let aggregator = EngagementAggregator::new(store);
    let views = aggregator.recent_activity(user, limit)?;
    let renderer = renderer(utc_offset)?;

    if views.is_empty() {
        println!("{user}: No activity yet");
        return Ok(());
    }
    for view in &views {
        let date = view.timestamp.with_timezone(renderer.offset()).format("%Y-%m-%d");
        let referrer = view
            .referrer_page
            .as_deref()
            .map(|r| format!(" (from {r})"))
            .unwrap_or_default();
        println!(
            "{} {} {}{} [{}]",
            date,
            renderer.format_time(view.timestamp),
            view.page_name,
            referrer,
            view.session_id
        );
    }
    Ok(())
}

/// Parse an RFC 3339 instant, or a bare date covering the whole day
fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, InsightsCliError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| InsightsCliError::InvalidDate(value.to_string()))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| InsightsCliError::InvalidDate(value.to_string()))?;
    Ok(date.and_time(time).and_utc())
}

fn cmd_doctor(
    db: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), InsightsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Flux version {}", FLUX_VERSION),
    });

    // Check the event store
    match db {
        None => checks.push(DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Error,
            message: "No --db path given".to_string(),
        }),
        Some(path) => match SqliteEventStore::open(path).and_then(|s| s.count()) {
            Ok(count) => checks.push(DoctorCheck {
                name: "store".to_string(),
                status: if count == 0 {
                    CheckStatus::Warning
                } else {
                    CheckStatus::Ok
                },
                message: format!("{} holds {} page views", path.display(), count),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
    }

    // Check configuration
    match config {
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        }),
        Some(path) => match EngagementConfig::load(path) {
            Ok(cfg) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (gap {}s, tail {}s, {:?} averages)",
                    cfg.gap_threshold_secs, cfg.tail_estimate_secs, cfg.average_policy
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
    }

    // Check stdin is available (for piped ingest)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ingest --input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Insights Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(InsightsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

// Error types

#[derive(Debug)]
enum InsightsCliError {
    Io(io::Error),
    Compute(engagement_flux::ComputeError),
    Store(engagement_flux::StoreError),
    Json(serde_json::Error),
    MissingDatabase,
    NoEvents,
    RecordFailed,
    ImportIncomplete(usize),
    UsersSkipped(usize),
    InvalidDate(String),
    DoctorFailed,
}

impl From<io::Error> for InsightsCliError {
    fn from(e: io::Error) -> Self {
        InsightsCliError::Io(e)
    }
}

impl From<engagement_flux::ComputeError> for InsightsCliError {
    fn from(e: engagement_flux::ComputeError) -> Self {
        InsightsCliError::Compute(e)
    }
}

impl From<engagement_flux::StoreError> for InsightsCliError {
    fn from(e: engagement_flux::StoreError) -> Self {
        InsightsCliError::Store(e)
    }
}

impl From<serde_json::Error> for InsightsCliError {
    fn from(e: serde_json::Error) -> Self {
        InsightsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InsightsCliError> for CliError {
    fn from(e: InsightsCliError) -> Self {
        match e {
            InsightsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InsightsCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check input and configuration files".to_string()),
            },
            InsightsCliError::Store(e) => CliError {
                code: "STORE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run `insights doctor --db <path>`".to_string()),
            },
            InsightsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            InsightsCliError::MissingDatabase => CliError {
                code: "MISSING_DATABASE".to_string(),
                message: "No event store configured".to_string(),
                hint: Some("Pass --db <path>".to_string()),
            },
            InsightsCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "Input contained no page views".to_string(),
                hint: None,
            },
            InsightsCliError::RecordFailed => CliError {
                code: "RECORD_FAILED".to_string(),
                message: "Page view was not recorded".to_string(),
                hint: Some("Set RUST_LOG=warn to see the store error".to_string()),
            },
            InsightsCliError::ImportIncomplete(n) => CliError {
                code: "IMPORT_INCOMPLETE".to_string(),
                message: format!("{} page views failed to import", n),
                hint: Some("Set RUST_LOG=warn to see the store errors".to_string()),
            },
            InsightsCliError::UsersSkipped(n) => CliError {
                code: "USERS_SKIPPED".to_string(),
                message: format!("{} users could not be read", n),
                hint: Some("Set RUST_LOG=warn to see which users failed".to_string()),
            },
            InsightsCliError::InvalidDate(value) => CliError {
                code: "INVALID_DATE".to_string(),
                message: format!("Cannot parse date: {}", value),
                hint: Some("Use RFC 3339 (2024-01-15T00:00:00Z) or YYYY-MM-DD".to_string()),
            },
            InsightsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: None,
            },
        }
    }
}
