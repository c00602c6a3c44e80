//! Data models for the hand-history analytics engine.
//!
//! This module contains the core data structures shared by the parser,
//! the analysis stages and the report generator. Monetary fields carry
//! their unit in the doc comment: *currency* means the table currency as
//! recorded, *bb* means normalized to the hand's big blind.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Raw action type code as recorded in the hand history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionCode(pub u16);

impl ActionCode {
    /// Codes counted as voluntarily putting money in the pot.
    pub const VOLUNTARY: [u16; 4] = [3, 4, 5, 23];
    /// Codes counted as a preflop raise.
    pub const RAISE: [u16; 2] = [5, 23];

    pub fn is_voluntary(self) -> bool {
        Self::VOLUNTARY.contains(&self.0)
    }

    pub fn is_raise(self) -> bool {
        Self::RAISE.contains(&self.0)
    }
}

/// A single action inside a betting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub player: String,
    pub code: ActionCode,
}

/// A player seated in a hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatedPlayer {
    pub name: String,
    pub seat: u32,
    /// Total amount put in during the hand (currency).
    pub bet: Decimal,
    /// Stack at the start of the hand (currency).
    pub chips: Decimal,
    /// Amount collected from the pot (currency).
    pub win: Decimal,
}

/// Descriptive table fields, none of which the analysis depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub mode: Option<String>,
    pub game_type: Option<String>,
    pub table_name: Option<String>,
    pub currency: Option<String>,
}

/// One hand, parsed from a raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedHand {
    pub hand_id: u64,
    pub start_date: NaiveDateTime,
    /// Big blind (currency).
    pub big_blind: Decimal,
    /// Small blind (currency).
    pub small_blind: Option<Decimal>,
    pub table: TableInfo,
    /// Players in record order.
    pub players: Vec<SeatedPlayer>,
    /// Round number to ordered actions. 0 = blinds, 1 = preflop, 2 = flop.
    pub rounds: BTreeMap<u8, Vec<Action>>,
}

impl ParsedHand {
    pub const PREFLOP: u8 = 1;
    pub const FLOP: u8 = 2;

    /// Look up a seated player by name.
    pub fn player(&self, name: &str) -> Option<&SeatedPlayer> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Actions of a round, empty if the round was never reached.
    pub fn round(&self, no: u8) -> &[Action] {
        self.rounds.get(&no).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the flop was dealt.
    pub fn reached_flop(&self) -> bool {
        self.rounds.contains_key(&Self::FLOP)
    }

    /// Players with a positive win, in record order.
    pub fn winners(&self) -> Vec<&SeatedPlayer> {
        self.players.iter().filter(|p| p.win > Decimal::ZERO).collect()
    }

    pub fn active_players(&self) -> usize {
        self.players.len()
    }
}

/// First preflop action of one player in one hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflopEvent {
    pub player: String,
    pub vpip: bool,
    pub pfr: bool,
}

/// A player who saw the flop, and whether they won the hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlopEvent {
    pub player: String,
    pub won: bool,
}

/// Behavioral events extracted from one hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandEvents {
    pub preflop: Vec<PreflopEvent>,
    pub flop: Vec<FlopEvent>,
}

/// The behavioral events of one hand, keyed for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandEventRecord {
    pub hand_id: u64,
    pub start_date: NaiveDateTime,
    pub events: HandEvents,
}

/// Aggregated behavioral statistics of one player.
///
/// Percentages are whole numbers in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player: String,
    pub hands: u32,
    pub vpip: i32,
    pub pfr: i32,
    pub vpip_pfr_gap: i32,
    pub wwsf: i32,
    pub cohort: String,
}

/// What the focal player netted against one opponent in one hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetResultRecord {
    pub hand_id: u64,
    pub start_date: NaiveDateTime,
    pub focal_player: String,
    pub opponent: String,
    /// Signed result in bb; positive when the focal player won.
    pub won_vs_focal: Decimal,
    /// `1 / opponents in this hand`, a per-hand normalization weight.
    pub share_of_hand: f64,
    /// Seats the focal player acts after this opponent.
    pub seat_distance: u32,
}

/// One seated player in one hand, the unit of the time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerObservation {
    pub hand_id: u64,
    pub start_date: NaiveDateTime,
    pub player: String,
    /// Big blind (currency).
    pub big_blind: Decimal,
    pub active_players: u32,
}

/// Opposing cohort groups compared by the time series ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Camp {
    BigLoser,
    BigWinner,
    Other,
}

/// Why a record or hand contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Malformed,
    Duplicate,
    Filtered,
    NoWinner,
    AnonymizedWinner,
    MissingFocalPlayer,
    InsufficientRakeData,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed => write!(f, "Malformed record"),
            SkipReason::Duplicate => write!(f, "Duplicate hand"),
            SkipReason::Filtered => write!(f, "Outside filters"),
            SkipReason::NoWinner => write!(f, "No winner"),
            SkipReason::AnonymizedWinner => write!(f, "Anonymized winner"),
            SkipReason::MissingFocalPlayer => write!(f, "Focal player absent"),
            SkipReason::InsufficientRakeData => write!(f, "Rake not apportioned"),
        }
    }
}

/// Counts of what a batch did. Merging is a field-wise sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records parsed successfully.
    pub processed: usize,
    /// Hands that produced net-result records.
    pub analyzed: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Hands with more than one positive win (first winner kept).
    pub split_pots: usize,
    /// Hands whose rake could not be apportioned (gross results kept).
    pub rake_warnings: usize,
}

impl BatchSummary {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn merge(mut self, other: BatchSummary) -> Self {
        self.processed += other.processed;
        self.analyzed += other.analyzed;
        self.split_pots += other.split_pots;
        self.rake_warnings += other.rake_warnings;
        for (reason, count) in other.skipped {
            *self.skipped.entry(reason).or_insert(0) += count;
        }
        self
    }
}

/// Net result summed over one cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortResult {
    pub cohort: String,
    /// Sum of `won_vs_focal` (bb).
    pub focal_won: Decimal,
    /// Sum of `share_of_hand`.
    pub hands: f64,
    pub bb_per_100: f64,
}

/// Net result summed over one seat distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatDistanceResult {
    pub seat_distance: u32,
    /// Sum of `won_vs_focal` (bb).
    pub focal_won: Decimal,
    pub hands: f64,
    pub bb_per_100: f64,
}

/// One bucket of the time series, flattened for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub bucket: String,
    pub big_loser: u64,
    pub big_winner: u64,
    pub observations: u64,
    /// `big_loser / big_winner`; serialized as `null` when non-finite.
    pub ratio: f64,
}

/// Which report sections were requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSections {
    pub stats: bool,
    pub net: bool,
    pub timeline: bool,
}

impl Default for ReportSections {
    fn default() -> Self {
        Self {
            stats: true,
            net: true,
            timeline: true,
        }
    }
}

/// Metadata about a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub input: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub sections: ReportSections,
    pub files_read: usize,
    pub files_failed: usize,
    pub focal_players: Vec<String>,
    pub time_unit: String,
    pub include_rake: bool,
    pub duration_seconds: f64,
}

/// The complete analytics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: BatchSummary,
    pub player_stats: Vec<PlayerStats>,
    pub cohort_distribution: HashMap<String, usize>,
    pub cohort_results: Vec<CohortResult>,
    pub seat_results: Vec<SeatDistanceResult>,
    /// Running sum of `won_vs_focal` per cohort, in hand order (bb).
    pub cumulative: BTreeMap<String, Vec<Decimal>>,
    pub timeline: Vec<TimelineRow>,
}
