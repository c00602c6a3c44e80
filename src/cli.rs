//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::TimeUnit;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;

/// PokerLens - hand-history analytics for cash-game sessions
///
/// Reads exported hand histories, computes behavioral stats per player,
/// labels players with cohorts and reports net results and activity
/// over time. Markdown/JSON reports.
///
/// Examples:
///   pokerlens ./histories
///   pokerlens ./histories --focal hero,hero_alt --report net
///   pokerlens ./histories --report timeline --time-unit weekday-hour
///   pokerlens ./histories --store ./pokerlens-db --format json
///   pokerlens ./histories --dry-run
///   pokerlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Hand-history file or directory
    ///
    /// Directories are walked recursively. Not required with --init-config.
    #[arg(value_name = "PATH", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Which report sections to produce
    #[arg(short, long, default_value = "all", value_name = "KIND")]
    pub report: ReportKind,

    /// Focal player aliases (comma-separated)
    ///
    /// Net results are attributed against these players.
    /// Can also be set via POKERLENS_FOCAL env var or .pokerlens.toml config.
    #[arg(
        long,
        value_name = "NAMES",
        value_delimiter = ',',
        env = "POKERLENS_FOCAL"
    )]
    pub focal: Option<Vec<String>>,

    /// Bucket granularity of the time series
    ///
    /// Values: day, hour, weekday, weekday-hour, monthly-hour
    #[arg(long, value_name = "UNIT")]
    pub time_unit: Option<TimeUnit>,

    /// Lowest big blind kept (table currency)
    #[arg(long, value_name = "AMOUNT")]
    pub min_bb: Option<Decimal>,

    /// Highest big blind kept (table currency)
    #[arg(long, value_name = "AMOUNT")]
    pub max_bb: Option<Decimal>,

    /// Fewest seated players kept
    #[arg(long, value_name = "COUNT")]
    pub min_players: Option<u32>,

    /// Most seated players kept
    #[arg(long, value_name = "COUNT")]
    pub max_players: Option<u32>,

    /// Report gross results without subtracting rake
    #[arg(long)]
    pub no_rake: bool,

    /// Persist player stats, observations and net results to this directory
    ///
    /// Observations accumulate across runs and the time series is built
    /// from everything stored.
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Default: from config or pokerlens_report.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pokerlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Worker threads for per-hand processing
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Dry run: list the files that would be read and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .pokerlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Report sections to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportKind {
    /// Player stats and cohort distribution
    Stats,
    /// Net results against the focal players
    Net,
    /// Big-loser / big-winner time series
    Timeline,
    /// Everything (default)
    #[default]
    All,
}

impl ReportKind {
    pub fn includes_stats(self) -> bool {
        matches!(self, ReportKind::Stats | ReportKind::All)
    }

    pub fn includes_net(self) -> bool {
        matches!(self, ReportKind::Net | ReportKind::All)
    }

    pub fn includes_timeline(self) -> bool {
        matches!(self, ReportKind::Timeline | ReportKind::All)
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input path does not exist: {}", input.display()));
            }
            None => return Err("An input file or directory is required".to_string()),
            _ => {}
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let (Some(min), Some(max)) = (self.min_bb, self.max_bb) {
            if min > max {
                return Err(format!("--min-bb ({min}) is above --max-bb ({max})"));
            }
        }
        if let Some(min) = self.min_bb {
            if min.is_sign_negative() {
                return Err("--min-bb cannot be negative".to_string());
            }
        }
        if let (Some(min), Some(max)) = (self.min_players, self.max_players) {
            if min > max {
                return Err(format!(
                    "--min-players ({min}) is above --max-players ({max})"
                ));
            }
        }

        if let Some(ref focal) = self.focal {
            if focal.iter().any(|name| name.trim().is_empty()) {
                return Err("Focal player names cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the config file; `--quiet`
    /// still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_args(input: &std::path::Path) -> Args {
        Args {
            input: Some(input.to_path_buf()),
            report: ReportKind::All,
            focal: None,
            time_unit: None,
            min_bb: None,
            max_bb: None,
            min_players: None,
            max_players: None,
            no_rake: false,
            store: None,
            format: OutputFormat::Markdown,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            concurrency: None,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_accepts_existing_input() {
        let dir = TempDir::new().unwrap();
        assert!(make_args(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let dir = TempDir::new().unwrap();
        let args = make_args(&dir.path().join("missing"));
        assert!(args.validate().is_err());

        let mut args = make_args(dir.path());
        args.input = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args(dir.path());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args(dir.path());
        args.min_bb = Some(Decimal::new(50, 2));
        args.max_bb = Some(Decimal::new(25, 2));
        assert!(args.validate().is_err());

        args.max_bb = Some(Decimal::new(50, 2));
        assert!(args.validate().is_ok());

        args.min_players = Some(6);
        args.max_players = Some(3);
        assert!(args.validate().is_err());

        args.max_players = None;
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_from_command_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let args = Args::try_parse_from([
            "pokerlens",
            path.as_str(),
            "--focal",
            "hero,hero_alt",
            "--report",
            "net",
            "--time-unit",
            "weekday-hour",
            "--min-bb",
            "0.05",
        ])
        .unwrap();

        assert_eq!(
            args.focal,
            Some(vec!["hero".to_string(), "hero_alt".to_string()])
        );
        assert_eq!(args.report, ReportKind::Net);
        assert_eq!(args.time_unit, Some(TimeUnit::WeekdayHour));
        assert_eq!(args.min_bb, Some(Decimal::new(5, 2)));
        assert!(args.report.includes_net());
        assert!(!args.report.includes_timeline());
    }

    #[test]
    fn test_log_level() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args(dir.path());
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
