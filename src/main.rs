// src/main.rs

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

mod app;
mod core;
mod logging;
mod report;
mod ui;

use app::{App, AppState};
use crate::core::models::Grade;
use crate::core::policy::Policy;
use crate::core::scanner::bulk::{parse_host_list, run_bulk};
use crate::core::scanner::{scan_target, ScanContext, ScanOptions, ScanOutcome};
use crate::core::store::ResultStore;

#[derive(Parser)]
#[command(name = "header-grader")]
#[command(about = "Grade HTTP security headers and track them over time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Policy document
    #[arg(long, global = true, env = "HEADER_GRADER_CONFIG", default_value = "headers_config.toml")]
    config: PathBuf,

    /// Results database (defaults to the data directory)
    #[arg(long, global = true, env = "HEADER_GRADER_DB")]
    db: Option<PathBuf>,

    /// Do not verify TLS certificates
    #[arg(long, global = true)]
    insecure: bool,

    /// Do not query securityheaders.com for warnings
    #[arg(long, global = true)]
    skip_warnings: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, grade and store one target
    Scan {
        /// Host (tried over https then http) or full URL
        target: String,

        /// Do not truncate long header values
        #[arg(long)]
        show_full_headers: bool,
    },

    /// Scan every host listed in a file, one per line
    Bulk {
        file: PathBuf,
    },

    /// Query stored results
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Every URL with its latest score and grade
    Export {
        /// Only URLs with this grade
        #[arg(long, value_parser = parse_grade)]
        grade: Option<Grade>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete results older than a number of days
    Prune {
        #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i64).range(0..=36_500))]
        days: i64,
    },

    /// Delete every result stored for a URL
    Delete {
        url: String,
    },

    /// Interactive terminal dashboard
    Dashboard,
}

#[derive(Subcommand)]
enum ReportKind {
    /// Totals, average score and grade distribution
    Summary,
    /// Latest scan of each URL, newest first
    Recent {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Average score per day
    Trend {
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(0..=36_500))]
        days: i64,
    },
    /// Headers failing most often
    Failing {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// URLs graded C+ or worse
    Attention {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Share of scans passing each header
    Adoption,
    /// URLs whose grade changed recently
    Changes {
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(0..=36_500))]
        days: i64,
    },
    /// Latest scans with a given grade
    Grade {
        #[arg(value_parser = parse_grade)]
        grade: Grade,
    },
    /// URLs sharing an identical header configuration
    Shared,
    /// Pass and failure counts per header
    Health,
    /// Latest stored scan of one URL
    Analyze {
        url: String,
    },
    /// Recommended header values and what they can break
    Proposal,
}

fn parse_grade(s: &str) -> Result<Grade, String> {
    Grade::from_str(s.trim())
        .map_err(|_| format!("unknown grade `{}` (expected A+, A, A-, ..., E, F)", s))
}

/// Prints `value` as JSON or the text produced by `text`.
fn emit<T: serde::Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", report::to_json(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

fn scan_context(config: &Path, options: &ScanOptions, store: ResultStore) -> Result<ScanContext> {
    let policy = Policy::load(config).wrap_err("could not load the header policy")?;
    ScanContext::new(options, policy, store).wrap_err("could not build the HTTP client")
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let dashboard = matches!(cli.command, Commands::Dashboard);
    logging::initialize_logging(cli.verbose && !dashboard)?;

    let db_path = cli.db.clone().unwrap_or_else(logging::default_db_path);
    let store = ResultStore::open(&db_path)
        .wrap_err_with(|| format!("could not open results database {}", db_path.display()))?;
    info!(db = %store.path().display(), "Results database ready.");

    let options = ScanOptions {
        verify_tls: !cli.insecure,
        fetch_warnings: !cli.skip_warnings,
        ..ScanOptions::default()
    };
    let json = cli.json;

    match cli.command {
        Commands::Scan { target, show_full_headers } => {
            let ctx = scan_context(&cli.config, &options, store)?;
            let outcome = scan_target(&ctx, &target).await?;
            emit(json, &outcome, || report::render_scan(&outcome, &ctx.policy, show_full_headers))?;
        }
        Commands::Bulk { file } => {
            let content = std::fs::read_to_string(&file)
                .wrap_err_with(|| format!("could not read host list {}", file.display()))?;
            let hosts = parse_host_list(&content);
            if hosts.is_empty() {
                return Err(eyre!("host list {} contains no hosts", file.display()));
            }
            let ctx = scan_context(&cli.config, &options, store)?;
            let bulk = run_bulk(hosts, &ctx).await;
            emit(json, &bulk, || report::render_bulk(&bulk))?;
        }
        Commands::Report { kind } => run_report(&store, kind, json)?,
        Commands::Export { grade, output } => {
            let scans = store.export(grade)?;
            let rendered = if json { report::to_json(&scans)? } else { report::render_scan_summaries(&scans) };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .wrap_err_with(|| format!("could not write {}", path.display()))?;
                    println!("Exported {} URLs to {}", scans.len(), path.display());
                }
                None => print!("{}", rendered),
            }
        }
        Commands::Prune { days } => {
            let deleted = store.prune(days)?;
            println!("Deleted {} rows older than {} days.", deleted, days);
        }
        Commands::Delete { url } => {
            let deleted = store.delete(&url)?;
            println!("Deleted {} rows for {}.", deleted, url);
        }
        Commands::Dashboard => {
            let ctx = scan_context(&cli.config, &options, store)?;
            run_dashboard(ctx).await?;
        }
    }
    Ok(())
}

fn run_report(store: &ResultStore, kind: ReportKind, json: bool) -> Result<()> {
    match kind {
        ReportKind::Summary => {
            let summary = store.overall_summary()?;
            emit(json, &summary, || report::render_summary(summary.as_ref()))
        }
        ReportKind::Recent { limit } => {
            let scans = store.recent_scans(limit)?;
            emit(json, &scans, || report::render_scan_summaries(&scans))
        }
        ReportKind::Trend { days } => {
            let points = store.trend(days)?;
            emit(json, &points, || report::render_trend(&points))
        }
        ReportKind::Failing { limit } => {
            let counts = store.top_failing_headers(limit)?;
            emit(json, &counts, || report::render_header_counts(&counts))
        }
        ReportKind::Attention { limit } => {
            let scans = store.urls_needing_attention(limit)?;
            emit(json, &scans, || report::render_scan_summaries(&scans))
        }
        ReportKind::Adoption => {
            let rates = store.adoption_rate()?;
            emit(json, &rates, || report::render_adoption(&rates))
        }
        ReportKind::Changes { days } => {
            let changes = store.recent_changes(days)?;
            emit(json, &changes, || report::render_changes(&changes))
        }
        ReportKind::Grade { grade } => {
            let scans = store.search_by_grade(grade)?;
            emit(json, &scans, || {
                if scans.is_empty() {
                    format!("No URLs found with grade {}\n", grade)
                } else {
                    report::render_scan_summaries(&scans)
                }
            })
        }
        ReportKind::Shared => {
            let groups = store.shared_configurations()?;
            emit(json, &groups, || report::render_shared(&groups))
        }
        ReportKind::Health => {
            let health = store.header_health()?;
            emit(json, &health, || report::render_health(&health))
        }
        ReportKind::Analyze { url } => {
            let records = store.latest(&url)?;
            emit(json, &records, || report::render_analysis(&url, &records))
        }
        ReportKind::Proposal => {
            let proposal: Vec<(&str, &str)> = crate::core::knowledge_base::configuration_proposal().collect();
            emit(json, &proposal, report::render_proposal)
        }
    }
}

async fn run_dashboard(ctx: ScanContext) -> Result<()> {
    // --- Setup ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let result = dashboard_loop(&mut terminal, &ctx).await;

    // --- Restore Terminal ---
    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    result
}

async fn dashboard_loop<B: Backend>(terminal: &mut Terminal<B>, ctx: &ScanContext) -> Result<()> {
    let mut app = App::new(ctx.store.recent_scans(20).unwrap_or_default());
    let (tx, mut rx) = mpsc::channel(1);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if event::poll(Duration::from_millis(100))? {
            handle_events(&mut app, ctx, &tx)?;
        }
        app.on_tick();

        if let Ok(result) = rx.try_recv() {
            app.finish_scan(result);
            if let Ok(history) = ctx.store.recent_scans(20) {
                app.history = history;
            }
        }
    }
    Ok(())
}

fn handle_events(
    app: &mut App,
    ctx: &ScanContext,
    tx: &mpsc::Sender<Result<ScanOutcome, String>>,
) -> Result<()> {
    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            match app.state {
                AppState::Idle => handle_idle_input(app, key.code, ctx, tx),
                AppState::Finished => handle_finished_input(app, key.code),
                AppState::Scanning => {
                    if key.code == KeyCode::Char('q') {
                        app.quit();
                    }
                }
            }
        }
    }
    Ok(())
}

fn handle_idle_input(
    app: &mut App,
    key_code: KeyCode,
    ctx: &ScanContext,
    tx: &mpsc::Sender<Result<ScanOutcome, String>>,
) {
    match key_code {
        KeyCode::Esc => app.quit(),
        KeyCode::Char(c) => app.input.push(c),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Enter => {
            let Some(target) = app.start_scan() else { return };
            let ctx = ctx.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = scan_target(&ctx, &target).await.map_err(|e| e.to_string());
                let _ = tx.send(result).await;
            });
        }
        _ => {}
    }
}

fn handle_finished_input(app: &mut App, key_code: KeyCode) {
    match key_code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Char('n') => app.reset(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        _ => {}
    }
}
