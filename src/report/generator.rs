//! Markdown report generation.
//!
//! This module generates Markdown analytics reports from the analysis
//! results. Sections not requested for the run are left out.

use crate::models::{
    BatchSummary, CohortResult, PlayerStats, Report, ReportMetadata, SeatDistanceResult,
    SkipReason, TimelineRow,
};
use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();
    let sections = report.metadata.sections;

    // Title
    output.push_str("# PokerLens Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));

    if sections.stats {
        output.push_str(&generate_cohort_distribution_section(
            &report.cohort_distribution,
        ));
        output.push_str(&generate_player_stats_section(&report.player_stats));
    }

    if sections.net {
        output.push_str(&generate_cohort_results_section(&report.cohort_results));
        output.push_str(&generate_seat_results_section(&report.seat_results));
        output.push_str(&generate_cumulative_section(&report.cumulative));
    }

    if sections.timeline {
        output.push_str(&generate_timeline_section(
            &report.timeline,
            &report.metadata.time_unit,
        ));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Files Read:** {}\n", metadata.files_read));
    if metadata.files_failed > 0 {
        section.push_str(&format!("- **Files Failed:** {}\n", metadata.files_failed));
    }
    if metadata.sections.net {
        let focal = if metadata.focal_players.is_empty() {
            "none".to_string()
        } else {
            metadata.focal_players.join(", ")
        };
        section.push_str(&format!("- **Focal Players:** {}\n", focal));
        section.push_str(&format!(
            "- **Rake:** {}\n",
            if metadata.include_rake {
                "subtracted"
            } else {
                "ignored"
            }
        ));
    }
    if metadata.sections.timeline {
        section.push_str(&format!("- **Time Unit:** {}\n", metadata.time_unit));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the batch summary section.
fn generate_summary_section(summary: &BatchSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Processed | Analyzed | Skipped | Split Pots | Rake Warnings |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        summary.processed,
        summary.analyzed,
        summary.total_skipped(),
        summary.split_pots,
        summary.rake_warnings
    ));

    if !summary.skipped.is_empty() {
        section.push_str("### Skipped Hands\n\n");
        section.push_str("| Reason | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut reasons: Vec<(&SkipReason, &usize)> = summary.skipped.iter().collect();
        reasons.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

        for (reason, count) in reasons {
            section.push_str(&format!("| {} | {} |\n", reason, count));
        }
        section.push('\n');
    }

    section
}

fn generate_cohort_distribution_section(distribution: &HashMap<String, usize>) -> String {
    if distribution.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    let total: usize = distribution.values().sum();

    section.push_str("## Cohort Distribution\n\n");
    section.push_str("| Cohort | Players | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");

    let mut cohorts: Vec<_> = distribution.iter().collect();
    cohorts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (cohort, count) in cohorts {
        let share = *count as f64 / total as f64 * 100.0;
        section.push_str(&format!("| {} | {} | {:.1}% |\n", cohort, count, share));
    }
    section.push('\n');

    section
}

/// Generate the player stats table, most hands first.
fn generate_player_stats_section(stats: &[PlayerStats]) -> String {
    let mut section = String::new();

    section.push_str("## Player Stats\n\n");

    if stats.is_empty() {
        section.push_str("No player took a preflop action in the analyzed hands.\n\n");
        return section;
    }

    section.push_str("| Player | Hands | VPIP | PFR | Gap | WWSF | Cohort |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|:---|\n");

    let mut rows: Vec<&PlayerStats> = stats.iter().collect();
    rows.sort_by(|a, b| b.hands.cmp(&a.hands).then_with(|| a.player.cmp(&b.player)));

    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            row.player, row.hands, row.vpip, row.pfr, row.vpip_pfr_gap, row.wwsf, row.cohort
        ));
    }
    section.push('\n');

    section
}

fn generate_cohort_results_section(results: &[CohortResult]) -> String {
    let mut section = String::new();

    section.push_str("## Net Results by Cohort\n\n");

    if results.is_empty() {
        section.push_str("No hands were attributed to a focal player.\n\n");
        return section;
    }

    section.push_str("| Cohort | Won (bb) | Hands | bb/100 |\n");
    section.push_str("|:---|---:|---:|---:|\n");
    for result in results {
        section.push_str(&format!(
            "| {} | {} | {:.2} | {} |\n",
            result.cohort,
            result.focal_won.round_dp(2),
            result.hands,
            format_ratio(result.bb_per_100)
        ));
    }
    section.push('\n');

    section
}

fn generate_seat_results_section(results: &[SeatDistanceResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Net Results by Seat Distance\n\n");
    section.push_str("| Seats | Won (bb) | Hands | bb/100 |\n");
    section.push_str("|:---:|---:|---:|---:|\n");
    for result in results {
        section.push_str(&format!(
            "| {} | {} | {:.2} | {} |\n",
            result.seat_distance,
            result.focal_won.round_dp(2),
            result.hands,
            format_ratio(result.bb_per_100)
        ));
    }
    section.push('\n');

    section
}

/// Final value and length of each running total.
fn generate_cumulative_section(cumulative: &BTreeMap<String, Vec<Decimal>>) -> String {
    if cumulative.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Cumulative Results\n\n");
    section.push_str("| Cohort | Records | Final (bb) | Low (bb) | High (bb) |\n");
    section.push_str("|:---|:---:|---:|---:|---:|\n");
    for (cohort, points) in cumulative {
        let last = points.last().copied().unwrap_or(Decimal::ZERO);
        let low = points.iter().copied().min().unwrap_or(Decimal::ZERO);
        let high = points.iter().copied().max().unwrap_or(Decimal::ZERO);
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            cohort,
            points.len(),
            last.round_dp(2),
            low.round_dp(2),
            high.round_dp(2)
        ));
    }
    section.push('\n');

    section
}

fn generate_timeline_section(rows: &[TimelineRow], time_unit: &str) -> String {
    let mut section = String::new();

    section.push_str("## Big Losers vs Big Winners\n\n");

    if rows.is_empty() {
        section.push_str("No observations passed the filters.\n\n");
        return section;
    }

    section.push_str(&format!(
        "| {} | Big Losers | Big Winners | Ratio |\n",
        time_unit
    ));
    section.push_str("|:---|:---:|:---:|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.bucket,
            row.big_loser,
            row.big_winner,
            format_ratio(row.ratio)
        ));
    }
    section.push('\n');

    section
}

/// Two decimals, or `n/a` for NaN and infinities.
fn format_ratio(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        "n/a".to_string()
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by PokerLens v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
