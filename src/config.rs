//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pokerlens.toml` files.

use crate::analysis::cohort::CohortTable;
use crate::analysis::filter::{default_short_handed_cohorts, BoundedRange, CampRules, HandFilter, ObservationFilter};
use crate::analysis::net_result::{default_anonymized_players, NetResultSettings, RakeSchedule};
use crate::analysis::{BatchOptions, TimeUnit};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".pokerlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Hand filters for net results.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Net result settings.
    #[serde(default)]
    pub net_result: NetResultConfig,

    /// Cohort rule table.
    #[serde(default)]
    pub cohorts: CohortTable,

    /// Time series settings.
    #[serde(default)]
    pub timeline: TimelineConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Worker threads for per-hand processing.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory of the JSON-lines store. No store when unset.
    #[serde(default)]
    pub store: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
            store: None,
        }
    }
}

fn default_output() -> String {
    "pokerlens_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// File scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory or file names to skip.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Maximum file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excludes: Vec::new(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["xml".to_string(), "txt".to_string()]
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024 // 64MB
}

/// Big blind and table size ranges, both inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default)]
    pub min_big_blind: Decimal,

    #[serde(default = "default_max_big_blind")]
    pub max_big_blind: Decimal,

    #[serde(default = "default_min_players")]
    pub min_players: u32,

    #[serde(default = "default_max_players")]
    pub max_players: u32,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            min_big_blind: Decimal::ZERO,
            max_big_blind: default_max_big_blind(),
            min_players: default_min_players(),
            max_players: default_max_players(),
        }
    }
}

fn default_max_big_blind() -> Decimal {
    Decimal::from(10_000)
}

fn default_min_players() -> u32 {
    3
}

fn default_max_players() -> u32 {
    6
}

impl FiltersConfig {
    pub fn big_blind(&self) -> BoundedRange<Decimal> {
        BoundedRange::new(self.min_big_blind, self.max_big_blind)
    }

    pub fn hand_filter(&self) -> HandFilter {
        HandFilter {
            big_blind: self.big_blind(),
            active_players: BoundedRange::new(self.min_players, self.max_players),
        }
    }
}

/// Net result settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetResultConfig {
    /// Subtract rake shares from hands that saw a flop.
    #[serde(default = "default_true")]
    pub include_rake: bool,

    /// Aliases of the player results are attributed to.
    #[serde(default)]
    pub focal_players: Vec<String>,

    /// Placeholder names of unrevealed players.
    #[serde(default = "default_anonymized_players")]
    pub anonymized_players: Vec<String>,

    /// Cohorts the seat-distance table is restricted to.
    #[serde(default = "default_position_cohorts")]
    pub position_cohorts: Vec<String>,

    /// Rake percentage and caps.
    #[serde(default)]
    pub rake: RakeSchedule,
}

impl Default for NetResultConfig {
    fn default() -> Self {
        Self {
            include_rake: true,
            focal_players: Vec::new(),
            anonymized_players: default_anonymized_players(),
            position_cohorts: default_position_cohorts(),
            rake: RakeSchedule::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_position_cohorts() -> Vec<String> {
    vec!["reg_aggro".to_string()]
}

/// Time series settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default)]
    pub time_unit: TimeUnit,

    /// Cohorts only counted at tables of at least `filters.min_players`.
    #[serde(default = "default_short_handed_cohorts")]
    pub short_handed_cohorts: Vec<String>,

    /// Leave the focal players out of the time series.
    #[serde(default = "default_true")]
    pub exclude_focal: bool,

    /// Cohort camps compared by the ratio.
    #[serde(default)]
    pub camps: CampRules,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            time_unit: TimeUnit::default(),
            short_handed_cohorts: default_short_handed_cohorts(),
            exclude_focal: true,
            camps: CampRules::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.to_string_lossy().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref store) = args.store {
            self.general.store = Some(store.to_string_lossy().to_string());
        }

        if let Some(min) = args.min_bb {
            self.filters.min_big_blind = min;
        }
        if let Some(max) = args.max_bb {
            self.filters.max_big_blind = max;
        }
        if let Some(min) = args.min_players {
            self.filters.min_players = min;
        }
        if let Some(max) = args.max_players {
            self.filters.max_players = max;
        }

        if let Some(ref focal) = args.focal {
            self.net_result.focal_players = focal.clone();
        }
        if args.no_rake {
            self.net_result.include_rake = false;
        }

        if let Some(unit) = args.time_unit {
            self.timeline.time_unit = unit;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Analysis knobs derived from the merged configuration.
    pub fn batch_options(&self) -> BatchOptions {
        let mut excluded_players: std::collections::HashSet<String> =
            self.net_result.anonymized_players.iter().cloned().collect();
        if self.timeline.exclude_focal {
            excluded_players.extend(self.net_result.focal_players.iter().cloned());
        }

        BatchOptions {
            focal_players: self.net_result.focal_players.clone(),
            hand_filter: self.filters.hand_filter(),
            net_result: NetResultSettings {
                include_rake: self.net_result.include_rake,
                rake: self.net_result.rake.clone(),
                anonymized_players: self.net_result.anonymized_players.clone(),
            },
            cohorts: self.cohorts.clone(),
            camps: self.timeline.camps.clone(),
            observation_filter: ObservationFilter {
                big_blind: self.filters.big_blind(),
                min_active_players: self.filters.min_players,
                short_handed_cohorts: self.timeline.short_handed_cohorts.clone(),
                excluded_players,
            },
            position_cohorts: self.net_result.position_cohorts.clone(),
            time_unit: self.timeline.time_unit,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::d;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "pokerlens_report.md");
        assert_eq!(config.filters.max_big_blind, d("10000"));
        assert_eq!((config.filters.min_players, config.filters.max_players), (3, 6));
        assert!(config.net_result.include_rake);
        assert_eq!(config.net_result.anonymized_players.len(), 10);
        assert_eq!(config.cohorts.rules.len(), 9);
        assert_eq!(config.timeline.time_unit, TimeUnit::Day);
        assert!(config.scanner.extensions.contains(&"xml".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "weekly.md"
verbose = true

[filters]
min_big_blind = 0.5
max_big_blind = "2"
min_players = 4

[net_result]
include_rake = false
focal_players = ["hero", "hero_alt"]

[net_result.rake]
rate = 0.05
heads_up_cap = 1

[timeline]
time_unit = "monthly_hour"
exclude_focal = false

[timeline.camps]
big_winner = ["reg_aggro"]

[[cohorts.rules]]
label = "anyone"
conditions = []
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "weekly.md");
        assert!(config.general.verbose);
        assert_eq!(config.filters.min_big_blind, d("0.5"));
        assert_eq!(config.filters.max_big_blind, d("2"));
        assert_eq!(config.filters.min_players, 4);
        assert_eq!(config.filters.max_players, 6);
        assert!(!config.net_result.include_rake);
        assert_eq!(config.net_result.focal_players, vec!["hero", "hero_alt"]);
        assert_eq!(config.net_result.rake.rate, d("0.05"));
        assert_eq!(config.net_result.rake.heads_up_cap, d("1"));
        assert_eq!(config.net_result.rake.caps.len(), 5);
        assert_eq!(config.timeline.time_unit, TimeUnit::MonthlyHour);
        assert_eq!(config.timeline.camps.big_winner, vec!["reg_aggro"]);
        assert_eq!(config.timeline.camps.big_loser.len(), 4);
        assert_eq!(config.cohorts.rules.len(), 1);
    }

    #[test]
    fn test_batch_options_exclusions() {
        let mut config = Config::default();
        config.net_result.focal_players = vec!["hero".to_string()];

        let opts = config.batch_options();
        assert!(opts.observation_filter.excluded_players.contains("hero"));
        assert!(opts.observation_filter.excluded_players.contains("Player 7"));
        assert_eq!(opts.hand_filter, HandFilter::default());
        assert_eq!(opts.position_cohorts, vec!["reg_aggro"]);

        config.timeline.exclude_focal = false;
        let opts = config.batch_options();
        assert!(!opts.observation_filter.excluded_players.contains("hero"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[filters]"));
        assert!(toml_str.contains("[net_result.rake]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.cohorts, CohortTable::default());
        assert_eq!(parsed.net_result.rake, RakeSchedule::default());
        assert_eq!(parsed.timeline.camps, CampRules::default());
    }
}
