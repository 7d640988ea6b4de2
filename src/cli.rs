//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::MonthScope;
use clap::Parser;
use std::path::PathBuf;

/// Sealium admin dashboard
///
/// Renders the signed-in admin's dashboard from a shared store file and
/// carries out session actions against it. Several instances may share one
/// store file, like browser tabs sharing local storage.
///
/// Examples:
///   sealium-dashboard --store ./store.json
///   sealium-dashboard --store ./store.json --format json --output dash.json
///   sealium-dashboard --store ./store.json --watch
///   sealium-dashboard --store ./store.json --logout
///   sealium-dashboard --store ./store.json --withdraw --yes
///   sealium-dashboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the shared store file
    ///
    /// Defaults to the config file setting, or sealium-store.json.
    #[arg(short, long, value_name = "FILE", env = "SEALIUM_STORE")]
    pub store: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .sealium.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the dashboard to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Keep running and re-render when the store changes
    ///
    /// Press Enter to force a refresh. Ctrl-C stops.
    #[arg(short, long, conflicts_with_all = ["logout", "withdraw"])]
    pub watch: bool,

    /// Sign the current admin out
    #[arg(long, conflicts_with = "withdraw")]
    pub logout: bool,

    /// Withdraw the current admin's account (institution admins only)
    #[arg(long)]
    pub withdraw: bool,

    /// Skip the withdrawal confirmation prompt
    #[arg(short, long, requires = "withdraw")]
    pub yes: bool,

    /// Number of processed requests to show
    #[arg(long, value_name = "COUNT")]
    pub recent_limit: Option<usize>,

    /// How "issued this month" is counted
    #[arg(long, value_name = "SCOPE")]
    pub month_scope: Option<MonthScope>,

    /// Store polling interval in watch mode, in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .sealium.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// What a run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Show,
    Watch,
    Logout,
    Withdraw,
    InitConfig,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.recent_limit == Some(0) {
            return Err("Recent limit must be at least 1".to_string());
        }

        if self.poll_interval == Some(0) {
            return Err("Poll interval must be at least 1 millisecond".to_string());
        }

        Ok(())
    }

    /// The action selected by the flags.
    pub fn action(&self) -> Action {
        if self.init_config {
            Action::InitConfig
        } else if self.logout {
            Action::Logout
        } else if self.withdraw {
            Action::Withdraw
        } else if self.watch {
            Action::Watch
        } else {
            Action::Show
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_default` comes from the config file; `--quiet` wins over it.
    pub fn log_level(&self, verbose_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            store: Some(PathBuf::from("store.json")),
            config: None,
            format: OutputFormat::Markdown,
            output: None,
            watch: false,
            logout: false,
            withdraw: false,
            yes: false,
            recent_limit: None,
            month_scope: None,
            poll_interval: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "sealium-dashboard",
            "--store",
            "tab.json",
            "--withdraw",
            "--yes",
            "--month-scope",
            "month-of-year",
        ])
        .unwrap();

        assert_eq!(args.store, Some(PathBuf::from("tab.json")));
        assert_eq!(args.action(), Action::Withdraw);
        assert!(args.yes);
        assert_eq!(args.month_scope, Some(MonthScope::MonthOfYear));
    }

    #[test]
    fn test_conflicting_actions_rejected_by_parser() {
        assert!(Args::try_parse_from(["sealium-dashboard", "--watch", "--logout"]).is_err());
        assert!(Args::try_parse_from(["sealium-dashboard", "--logout", "--withdraw"]).is_err());
        assert!(Args::try_parse_from(["sealium-dashboard", "--yes"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_limits() {
        let mut args = make_args();
        assert!(args.validate().is_ok());

        args.recent_limit = Some(0);
        assert!(args.validate().is_err());

        args.recent_limit = Some(3);
        args.poll_interval = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_default_action_is_show() {
        assert_eq!(make_args().action(), Action::Show);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
