//! Sealium Dashboard - admin dashboard for a certificate-issuance service
//!
//! A CLI that reads the shared admin store, renders the signed-in admin's
//! role-specific dashboard, keeps it in sync with writes from other
//! instances, and performs logout and account withdrawal.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable store, config, rejected action, etc.)
//!   2 - No admin signed in (redirected to the entry screen)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod shell;
mod signals;
mod store;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use cli::{Action, Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use error::ShellError;
use shell::{Dashboard, DashboardView, LiveDashboard, SessionShell, WithdrawOutcome};
use signals::SignalBus;
use std::io::{BufRead, Write};
use std::time::Duration;
use store::FileStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit code when nobody is signed in.
const EXIT_SIGNED_OUT: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.action() == Action::InitConfig {
        return handle_init_config();
    }

    // Load configuration before logging so the file can turn on verbose output
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {:#}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("Sealium Dashboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {:#}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .sealium.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to choose the store file and dashboard options.");
    Ok(())
}

/// Initialize logging at `level`.
///
/// Logs go to stderr so that stdout carries only the dashboard.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the selected action. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let store = FileStore::open(&config.general.store);
    info!("Using store: {}", store.path().display());

    match args.action() {
        Action::Show => {
            let mut dashboard = Dashboard::new(store, config.dashboard_settings());
            let view = dashboard.load(local_now())?;
            emit(&view, &args)
        }
        Action::Watch => watch(store, &config, &args).await,
        Action::Logout => handle_logout(store),
        Action::Withdraw => handle_withdraw(store, args.yes),
        Action::InitConfig => handle_init_config().map(|_| 0),
    }
}

fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Render a view to the configured destination.
fn emit(view: &DashboardView, args: &Args) -> Result<i32> {
    let snapshot = match view {
        DashboardView::Redirect(to) => {
            eprintln!("🔒 No admin is signed in. Redirecting to {}", to);
            return Ok(EXIT_SIGNED_OUT);
        }
        DashboardView::Ready(snapshot) => snapshot,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(snapshot)?,
        OutputFormat::Markdown => report::generate_markdown_report(snapshot),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write dashboard to {}", path.display()))?;
            info!("Dashboard saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(0)
}

/// Render, then re-render whenever another instance changes the store or
/// the user presses Enter. Typing `logout` signs out from this view.
/// Stops on Ctrl-C.
async fn watch(store: FileStore, config: &Config, args: &Args) -> Result<i32> {
    let mut live = LiveDashboard::new(store, config.dashboard_settings())?;

    emit(&live.load(local_now())?, args)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.watch.poll_interval_ms));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!(
        "\n👀 Watching {} (Enter to refresh, \"logout\" to sign out, Ctrl-C to stop)",
        config.general.store.display()
    );

    loop {
        let view = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
            _ = ticker.tick() => live.poll(local_now())?,
            line = stdin.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) if line.trim().eq_ignore_ascii_case("logout") => {
                        let (to, view) = live.logout(local_now())?;
                        println!("👋 Logged out. Continue at {}", to);
                        view
                    }
                    Some(_) => live.focus(local_now())?,
                    None => {
                        stdin_open = false;
                        None
                    }
                }
            }
        };

        if let Some(view) = view {
            println!();
            emit(&view, args)?;
        }
    }

    info!("{} refresh(es) while watching", live.reloads());
    Ok(0)
}

/// Handle --logout.
fn handle_logout(store: FileStore) -> Result<i32> {
    let mut shell = SessionShell::new(store);
    shell.mount()?;

    if shell.identity().is_none() {
        warn!("No admin was signed in");
    }

    let to = shell.logout(&mut SignalBus::new())?;
    println!("👋 Logged out. Continue at {}", to);
    Ok(0)
}

/// Handle --withdraw.
fn handle_withdraw(store: FileStore, assume_yes: bool) -> Result<i32> {
    let mut shell = SessionShell::new(store);
    shell.mount()?;

    let outcome = shell.withdraw(|prompt| assume_yes || ask_confirmation(prompt));

    match outcome {
        Ok(WithdrawOutcome::Declined) => {
            println!("Withdrawal cancelled.");
            Ok(0)
        }
        Ok(WithdrawOutcome::Withdrawn { removed, navigate }) => {
            println!(
                "✅ Withdrawal complete ({} admin record(s) removed). Continue at {}",
                removed, navigate
            );
            Ok(0)
        }
        Err(ShellError::NotSignedIn) => {
            eprintln!("🔒 No admin is signed in.");
            Ok(EXIT_SIGNED_OUT)
        }
        Err(e @ ShellError::WithdrawalForbidden) => {
            eprintln!("⛔ {}", e);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// Ask a yes/no question on stdin. Anything but "y"/"yes" is a no.
fn ask_confirmation(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if let Err(e) = std::io::stdin().lock().read_line(&mut answer) {
        warn!("Failed to read confirmation: {}", e);
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
