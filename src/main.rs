//! PokerLens - hand-history analytics engine
//!
//! A CLI tool that reads exported poker hand histories, computes
//! behavioral stats per player, assigns cohorts and reports net results
//! and activity over time.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, store failure, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod parser;
mod report;
mod scanner;
mod store;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{Report, ReportMetadata, ReportSections};
use std::path::{Path, PathBuf};
use std::time::Instant;
use store::JsonlStore;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging; the config file may raise the level later
    let set_log_level = init_logging(&args);

    info!("PokerLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, set_log_level) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pokerlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize filters, rake, cohort rules, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Returns a setter for the max level, used once the config file is read.
fn init_logging(args: &Args) -> impl Fn(tracing::Level) {
    let level = args.log_level(false);

    let builder = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::default().add_directive(LevelFilter::from_level(level).into()))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter_reloading();
    let handle = builder.reload_handle();

    if let Err(e) = tracing::subscriber::set_global_default(builder.finish()) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    move |level: tracing::Level| {
        if let Err(e) = handle.reload(EnvFilter::default().add_directive(LevelFilter::from_level(level).into())) {
            eprintln!("Failed to change log level: {}", e);
        }
    }
}

/// Run the complete analysis workflow. Returns the exit code.
fn run(args: Args, set_log_level: impl Fn(tracing::Level)) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let level = args.log_level(config.general.verbose);
    if level != args.log_level(false) {
        set_log_level(level);
        debug!("Verbose logging enabled by config");
    }

    let input = args.input.clone().unwrap_or_else(|| PathBuf::from("."));
    let sections = ReportSections {
        stats: args.report.includes_stats(),
        net: args.report.includes_net(),
        timeline: args.report.includes_timeline(),
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.general.concurrency)
        .build_global()
        .ok();

    let mut scan_config = scanner::ScanConfig::from(&config.scanner);
    scan_config.show_progress = !args.quiet;
    let hand_scanner = scanner::HandScanner::new(input.clone(), scan_config);

    // Handle --dry-run: scan files and exit
    if args.dry_run {
        return handle_dry_run(&hand_scanner);
    }

    // Step 1: Read hand records
    println!("📥 Reading hand histories: {}", input.display());
    let scanned = hand_scanner.read_records()?;
    info!(
        "Read {} records from {} files ({} failed)",
        scanned.records.len(),
        scanned.files_read,
        scanned.files_failed
    );

    if sections.net && config.net_result.focal_players.is_empty() {
        warn!("No focal players configured; net results will be empty (use --focal)");
    }

    // Step 2: Analyze
    println!(
        "🔬 Analyzing {} hands on {} threads...",
        scanned.records.len(),
        config.general.concurrency
    );
    let opts = config.batch_options();
    let mut analysis = analysis::analyze(&scanned.records, &opts);

    // Step 3: Persist, then rebase stats and the time series on everything stored
    if let Some(ref dir) = config.general.store {
        let store = JsonlStore::open(Path::new(dir))?;
        store::sync(&store, &mut analysis, &opts)?;
    }

    // Step 4: Build the report
    println!("📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        input: input.display().to_string(),
        generated_at: Utc::now(),
        sections,
        files_read: scanned.files_read,
        files_failed: scanned.files_failed,
        focal_players: config.net_result.focal_players.clone(),
        time_unit: config.timeline.time_unit.to_string(),
        include_rake: config.net_result.include_rake,
        duration_seconds: duration,
    };

    let report = Report {
        metadata,
        summary: analysis.summary,
        player_stats: analysis.player_stats,
        cohort_distribution: analysis.cohort_distribution,
        cohort_results: analysis.cohort_results,
        seat_results: analysis.seat_results,
        cumulative: analysis.cumulative,
        timeline: analysis.timeline,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let summary = &report.summary;
    println!("\n📊 Analysis Summary:");
    println!("   Hands processed: {}", summary.processed);
    println!("   Hands analyzed for net results: {}", summary.analyzed);
    println!("   Hands skipped: {}", summary.total_skipped());
    println!("   Players: {}", report.player_stats.len());
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    Ok(0)
}

/// Handle --dry-run: scan files, print what would be read, exit.
fn handle_dry_run(hand_scanner: &scanner::HandScanner) -> Result<i32> {
    println!("\n🔍 Dry run: scanning files (nothing is analyzed)...\n");

    let files = hand_scanner.scan()?;

    if files.is_empty() {
        println!("   No matching hand-history files found.");
    } else {
        println!("   Found {} files that would be read:\n", files.len());
        for file in &files {
            println!("     📄 {} ({} bytes)", file.path.display(), file.size);
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
