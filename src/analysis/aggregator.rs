//! Batch driver and report summaries.
//!
//! Records are parsed and reduced to per-hand facts in parallel, deduplicated
//! by hand id in input order, then folded into [`BatchAccumulator`]s that are
//! merged pairwise. The grouping helpers at the bottom turn the merged
//! output into the report tables.

use super::behavior::{extract_events, BehaviorTally};
use super::cohort::{CohortTable, UNKNOWN_COHORT};
use super::filter::{load_player_data, observations, CampRules, HandFilter, ObservationFilter};
use super::net_result::{compute, HandNetResult, NetResultSettings};
use super::timeline::{group, TimeUnit, Timeline};
use crate::error::HandError;
use crate::models::{
    BatchSummary, CohortResult, HandEventRecord, HandEvents, NetResultRecord, ParsedHand, PlayerObservation,
    PlayerStats, SeatDistanceResult, SkipReason, TimelineRow,
};
use crate::parser::parse_hand;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Everything the batch needs to know besides the records themselves.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Aliases of the player whose results are attributed. Empty disables net results.
    pub focal_players: Vec<String>,
    pub hand_filter: HandFilter,
    pub net_result: NetResultSettings,
    pub cohorts: CohortTable,
    pub camps: CampRules,
    pub observation_filter: ObservationFilter,
    /// Cohorts the seat-distance table is restricted to. Empty means all.
    pub position_cohorts: Vec<String>,
    pub time_unit: TimeUnit,
}

/// Net-result outcome of one hand.
#[derive(Debug, Clone, PartialEq)]
enum NetOutcome {
    NotRequested,
    Skipped(SkipReason),
    Analyzed(Vec<HandNetResult>),
}

/// What survives of a hand once it has been parsed.
#[derive(Debug, Clone)]
struct HandFacts {
    hand_id: u64,
    start_date: NaiveDateTime,
    events: HandEvents,
    observations: Vec<PlayerObservation>,
    outcome: NetOutcome,
}

impl HandFacts {
    fn extract(hand: &ParsedHand, opts: &BatchOptions) -> Self {
        Self {
            hand_id: hand.hand_id,
            start_date: hand.start_date,
            events: extract_events(hand),
            observations: observations(hand),
            outcome: net_outcome(hand, opts),
        }
    }
}

fn net_outcome(hand: &ParsedHand, opts: &BatchOptions) -> NetOutcome {
    if opts.focal_players.is_empty() {
        return NetOutcome::NotRequested;
    }
    if !opts.hand_filter.accepts(hand) {
        return NetOutcome::Skipped(SkipReason::Filtered);
    }

    let seated: Vec<&String> = opts
        .focal_players
        .iter()
        .filter(|alias| hand.player(alias).is_some())
        .collect();
    if seated.is_empty() {
        return NetOutcome::Skipped(SkipReason::MissingFocalPlayer);
    }

    let results: Result<Vec<HandNetResult>, HandError> = seated
        .into_iter()
        .map(|focal| compute(hand, focal, &opts.net_result))
        .collect();

    match results {
        Ok(results) => NetOutcome::Analyzed(results),
        Err(e) => {
            debug!(hand_id = hand.hand_id, "Skipping hand: {e}");
            NetOutcome::Skipped(e.reason())
        }
    }
}

/// Mergeable partial result of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchAccumulator {
    pub behavior: BehaviorTally,
    pub hand_events: Vec<HandEventRecord>,
    pub observations: Vec<PlayerObservation>,
    pub net_results: Vec<NetResultRecord>,
    pub summary: BatchSummary,
}

impl BatchAccumulator {
    fn absorb(mut self, facts: HandFacts) -> Self {
        self.summary.processed += 1;
        self.behavior.add_events(&facts.events);
        self.hand_events.push(HandEventRecord {
            hand_id: facts.hand_id,
            start_date: facts.start_date,
            events: facts.events,
        });
        self.observations.extend(facts.observations);

        match facts.outcome {
            NetOutcome::NotRequested => {}
            NetOutcome::Skipped(reason) => self.summary.record_skip(reason),
            NetOutcome::Analyzed(results) => {
                self.summary.analyzed += 1;
                if results.iter().any(|r| r.split_pot) {
                    self.summary.split_pots += 1;
                }
                if results.iter().any(|r| r.rake_skipped) {
                    self.summary.rake_warnings += 1;
                }
                for result in results {
                    self.net_results.extend(result.records);
                }
            }
        }
        self
    }

    /// Combine two partial results. Order of combination does not matter
    /// once [`BatchAccumulator::sorted`] has been applied.
    pub fn merge(mut self, other: BatchAccumulator) -> Self {
        self.behavior = self.behavior.merge(other.behavior);
        self.hand_events.extend(other.hand_events);
        self.observations.extend(other.observations);
        self.net_results.extend(other.net_results);
        self.summary = self.summary.merge(other.summary);
        self
    }

    /// Put the row streams in chronological order. Rows of one hand keep
    /// their relative order.
    pub fn sorted(mut self) -> Self {
        self.hand_events.sort_by_key(|e| (e.start_date, e.hand_id));
        self.observations.sort_by_key(|o| (o.start_date, o.hand_id));
        self.net_results.sort_by_key(|r| (r.start_date, r.hand_id));
        self
    }
}

/// Parse, deduplicate and fold a batch of raw records.
///
/// Duplicates keep the first occurrence in `records`.
pub fn process_records(records: &[String], opts: &BatchOptions) -> BatchAccumulator {
    let parsed: Vec<Result<HandFacts, HandError>> = records
        .par_iter()
        .map(|raw| parse_hand(raw).map(|hand| HandFacts::extract(&hand, opts)))
        .collect();

    let mut intake = BatchSummary::default();
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(parsed.len());

    for facts in parsed {
        match facts {
            Ok(facts) if seen.insert(facts.hand_id) => unique.push(facts),
            Ok(facts) => {
                debug!(hand_id = facts.hand_id, "Duplicate hand ignored");
                intake.record_skip(SkipReason::Duplicate);
            }
            Err(e) => {
                warn!("Skipping record: {e}");
                intake.record_skip(e.reason());
            }
        }
    }

    let mut batch = unique
        .into_par_iter()
        .fold(BatchAccumulator::default, BatchAccumulator::absorb)
        .reduce(BatchAccumulator::default, BatchAccumulator::merge)
        .sorted();
    batch.summary = batch.summary.merge(intake);

    info!(
        records = records.len(),
        processed = batch.summary.processed,
        analyzed = batch.summary.analyzed,
        skipped = batch.summary.total_skipped(),
        "Batch complete"
    );
    if batch.summary.split_pots > 0 {
        warn!(
            "{} split pot(s) attributed to the first winner only",
            batch.summary.split_pots
        );
    }

    batch
}

/// Everything derived from one batch.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub summary: BatchSummary,
    pub player_stats: Vec<PlayerStats>,
    pub hand_events: Vec<HandEventRecord>,
    pub observations: Vec<PlayerObservation>,
    pub net_results: Vec<NetResultRecord>,
    pub cohort_distribution: HashMap<String, usize>,
    pub cohort_results: Vec<CohortResult>,
    pub seat_results: Vec<SeatDistanceResult>,
    pub cumulative: BTreeMap<String, Vec<Decimal>>,
    pub timeline: Vec<TimelineRow>,
}

/// Run the whole pipeline over raw records.
pub fn analyze(records: &[String], opts: &BatchOptions) -> Analysis {
    let batch = process_records(records, opts);
    let player_stats = batch.behavior.finish(&opts.cohorts);

    let mut analysis = Analysis {
        summary: batch.summary,
        hand_events: batch.hand_events,
        observations: batch.observations,
        net_results: batch.net_results,
        ..Analysis::default()
    };
    analysis.apply_player_stats(player_stats, opts);
    analysis.timeline = build_timeline(&analysis.observations, &analysis.cohorts(), opts).rows();
    analysis
}

impl Analysis {
    /// Player name to cohort label, from the current stats.
    pub fn cohorts(&self) -> HashMap<String, String> {
        cohort_lookup(&self.player_stats)
    }

    /// Adopt `player_stats` and regroup the net results by its cohorts.
    pub fn apply_player_stats(&mut self, player_stats: Vec<PlayerStats>, opts: &BatchOptions) {
        let cohorts = cohort_lookup(&player_stats);
        self.cohort_distribution = cohort_distribution(&player_stats);
        self.cohort_results = group_by_cohort(&self.net_results, &cohorts);
        self.seat_results =
            group_by_seat_distance(&self.net_results, &cohorts, &opts.position_cohorts);
        self.cumulative = cumulative_by_cohort(&self.net_results, &cohorts);
        self.player_stats = player_stats;
    }
}

/// Bucket observations by camp.
pub fn build_timeline(
    observations: &[PlayerObservation],
    cohorts: &HashMap<String, String>,
    opts: &BatchOptions,
) -> Timeline {
    let tagged = load_player_data(observations, cohorts, &opts.observation_filter, &opts.camps);
    group(tagged, opts.time_unit)
}

/// Player name to cohort label.
pub fn cohort_lookup(stats: &[PlayerStats]) -> HashMap<String, String> {
    stats
        .iter()
        .map(|s| (s.player.clone(), s.cohort.clone()))
        .collect()
}

fn cohort_of<'a>(cohorts: &'a HashMap<String, String>, player: &str) -> &'a str {
    cohorts.get(player).map(String::as_str).unwrap_or(UNKNOWN_COHORT)
}

fn bb_per_100(won: Decimal, hands: f64) -> f64 {
    won.to_f64().unwrap_or(0.0) / hands * 100.0
}

/// Count players per cohort.
pub fn cohort_distribution(stats: &[PlayerStats]) -> HashMap<String, usize> {
    let mut dist: HashMap<String, usize> = HashMap::new();

    for row in stats {
        *dist.entry(row.cohort.clone()).or_default() += 1;
    }

    dist
}

/// Net result per opponent cohort, best cohort first.
pub fn group_by_cohort(
    records: &[NetResultRecord],
    cohorts: &HashMap<String, String>,
) -> Vec<CohortResult> {
    let mut grouped: HashMap<&str, (Decimal, f64)> = HashMap::new();

    for record in records {
        let entry = grouped.entry(cohort_of(cohorts, &record.opponent)).or_default();
        entry.0 = entry.0.saturating_add(record.won_vs_focal);
        entry.1 += record.share_of_hand;
    }

    let mut results: Vec<CohortResult> = grouped
        .into_iter()
        .map(|(cohort, (focal_won, hands))| CohortResult {
            cohort: cohort.to_string(),
            focal_won,
            hands,
            bb_per_100: bb_per_100(focal_won, hands),
        })
        .collect();

    results.sort_by(|a, b| {
        b.bb_per_100
            .partial_cmp(&a.bb_per_100)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cohort.cmp(&b.cohort))
    });
    results
}

/// Net result per seat distance against the given cohorts.
pub fn group_by_seat_distance(
    records: &[NetResultRecord],
    cohorts: &HashMap<String, String>,
    only: &[String],
) -> Vec<SeatDistanceResult> {
    let mut grouped: BTreeMap<u32, (Decimal, f64)> = BTreeMap::new();

    let wanted = |record: &&NetResultRecord| {
        only.is_empty() || only.iter().any(|c| c == cohort_of(cohorts, &record.opponent))
    };
    for record in records.iter().filter(wanted) {
        let entry = grouped.entry(record.seat_distance).or_default();
        entry.0 = entry.0.saturating_add(record.won_vs_focal);
        entry.1 += record.share_of_hand;
    }

    grouped
        .into_iter()
        .map(|(seat_distance, (focal_won, hands))| SeatDistanceResult {
            seat_distance,
            focal_won,
            hands,
            bb_per_100: bb_per_100(focal_won, hands),
        })
        .collect()
}

/// Running total of the focal player's result per cohort, in record order.
pub fn cumulative_by_cohort(
    records: &[NetResultRecord],
    cohorts: &HashMap<String, String>,
) -> BTreeMap<String, Vec<Decimal>> {
    let mut series: BTreeMap<String, Vec<Decimal>> = BTreeMap::new();

    for record in records {
        let points = series
            .entry(cohort_of(cohorts, &record.opponent).to_string())
            .or_default();
        let last = points.last().copied().unwrap_or(Decimal::ZERO);
        points.push(last.saturating_add(record.won_vs_focal));
    }

    series
}
