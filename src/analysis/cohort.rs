//! Cohort classification.
//!
//! A cohort table is an ordered list of rules. Each rule is a set of
//! threshold conditions on a player's aggregated stats; the first rule
//! whose conditions all hold names the player's cohort. Rules may overlap,
//! so order is part of the table's meaning.

use crate::models::PlayerStats;
use serde::{Deserialize, Serialize};

/// Label for players no rule matches.
pub const UNKNOWN_COHORT: &str = "unknown";

/// Stat a condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    Hands,
    Vpip,
    Wwsf,
    VpipPfrGap,
}

impl StatField {
    pub fn value(self, stats: &PlayerStats) -> f64 {
        match self {
            StatField::Hands => f64::from(stats.hands),
            StatField::Vpip => f64::from(stats.vpip),
            StatField::Wwsf => f64::from(stats.wwsf),
            StatField::VpipPfrGap => f64::from(stats.vpip_pfr_gap),
        }
    }
}

/// Comparison operator, written the way it reads in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">=")]
    AtLeast,
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "<")]
    Below,
    #[serde(rename = "==")]
    Equal,
}

impl Comparison {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::AtLeast => lhs >= rhs,
            Comparison::AtMost => lhs <= rhs,
            Comparison::Above => lhs > rhs,
            Comparison::Below => lhs < rhs,
            Comparison::Equal => lhs == rhs,
        }
    }
}

/// One threshold test, e.g. `vpip >= 40`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: StatField,
    pub op: Comparison,
    pub value: f64,
}

impl Condition {
    pub fn new(field: StatField, op: Comparison, value: f64) -> Self {
        Self { field, op, value }
    }

    pub fn matches(&self, stats: &PlayerStats) -> bool {
        self.op.holds(self.field.value(stats), self.value)
    }
}

/// A named conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRule {
    pub label: String,
    pub conditions: Vec<Condition>,
}

impl CohortRule {
    pub fn matches(&self, stats: &PlayerStats) -> bool {
        self.conditions.iter().all(|c| c.matches(stats))
    }
}

/// Ordered first-match rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortTable {
    #[serde(default = "default_rules")]
    pub rules: Vec<CohortRule>,
}

impl Default for CohortTable {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl CohortTable {
    pub fn new(rules: Vec<CohortRule>) -> Self {
        Self { rules }
    }

    /// Label of the first matching rule, or [`UNKNOWN_COHORT`].
    pub fn classify(&self, stats: &PlayerStats) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(stats))
            .map(|rule| rule.label.as_str())
            .unwrap_or(UNKNOWN_COHORT)
    }

    /// Re-label every row in place.
    pub fn classify_all(&self, rows: &mut [PlayerStats]) {
        for row in rows.iter_mut() {
            row.cohort = self.classify(row).to_string();
        }
    }
}

fn rule(label: &str, conditions: &[(StatField, Comparison, f64)]) -> CohortRule {
    CohortRule {
        label: label.to_string(),
        conditions: conditions
            .iter()
            .map(|&(field, op, value)| Condition::new(field, op, value))
            .collect(),
    }
}

/// The stock cohort table.
pub fn default_rules() -> Vec<CohortRule> {
    use Comparison::*;
    use StatField::*;

    vec![
        rule("fish_passiv", &[(Hands, AtLeast, 100.0), (Vpip, AtLeast, 40.0), (Wwsf, Below, 45.0)]),
        rule("fish_aggro", &[(Hands, AtLeast, 100.0), (Vpip, AtLeast, 50.0), (Wwsf, AtLeast, 45.0)]),
        rule(
            "reg_passiv",
            &[(Hands, AtLeast, 500.0), (Vpip, AtMost, 33.0), (VpipPfrGap, AtMost, 9.0), (Wwsf, Below, 43.0)],
        ),
        rule(
            "reg_medium",
            &[
                (Hands, AtLeast, 500.0),
                (Vpip, AtMost, 33.0),
                (VpipPfrGap, AtMost, 9.0),
                (Wwsf, Below, 47.0),
                (Wwsf, AtLeast, 43.0),
            ],
        ),
        rule(
            "reg_aggro",
            &[(Hands, AtLeast, 500.0), (Vpip, AtMost, 37.0), (VpipPfrGap, AtMost, 9.0), (Wwsf, AtLeast, 47.0)],
        ),
        rule(
            "semireg_passiv",
            &[(Hands, AtLeast, 240.0), (Vpip, Below, 40.0), (VpipPfrGap, AtLeast, 10.0), (Wwsf, Below, 45.0)],
        ),
        rule(
            "semireg_aggro",
            &[(Hands, AtLeast, 200.0), (Vpip, Below, 50.0), (VpipPfrGap, AtLeast, 10.0), (Wwsf, AtLeast, 45.0)],
        ),
        rule("fish_low_sample", &[(Hands, Below, 100.0), (Hands, Above, 15.0), (VpipPfrGap, AtLeast, 15.0)]),
        rule(
            "reg_low_sample",
            &[(Hands, Below, 100.0), (Hands, Above, 15.0), (Vpip, AtMost, 32.0), (VpipPfrGap, AtMost, 9.0)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(hands: u32, vpip: i32, pfr: i32, wwsf: i32) -> PlayerStats {
        PlayerStats {
            player: "p".to_string(),
            hands,
            vpip,
            pfr,
            vpip_pfr_gap: vpip - pfr,
            wwsf,
            cohort: String::new(),
        }
    }

    #[test]
    fn test_default_table_labels() {
        let table = CohortTable::default();

        assert_eq!(table.classify(&stats(150, 45, 10, 40)), "fish_passiv");
        assert_eq!(table.classify(&stats(150, 55, 10, 50)), "fish_aggro");
        assert_eq!(table.classify(&stats(800, 25, 20, 41)), "reg_passiv");
        assert_eq!(table.classify(&stats(800, 25, 20, 45)), "reg_medium");
        assert_eq!(table.classify(&stats(800, 35, 30, 50)), "reg_aggro");
        assert_eq!(table.classify(&stats(300, 35, 20, 40)), "semireg_passiv");
        assert_eq!(table.classify(&stats(220, 45, 30, 46)), "semireg_aggro");
        assert_eq!(table.classify(&stats(50, 40, 20, 30)), "fish_low_sample");
        assert_eq!(table.classify(&stats(50, 25, 20, 30)), "reg_low_sample");
    }

    #[test]
    fn test_no_match_is_unknown() {
        let table = CohortTable::default();
        assert_eq!(table.classify(&stats(10, 30, 10, 50)), UNKNOWN_COHORT);
        // boundary: hands must be strictly above 15 for low-sample rules
        assert_eq!(table.classify(&stats(15, 40, 10, 50)), UNKNOWN_COHORT);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let table = CohortTable::default();
        let mut rows = vec![stats(150, 45, 10, 40), stats(800, 35, 30, 50), stats(5, 0, 0, 0)];

        table.classify_all(&mut rows);
        let first: Vec<String> = rows.iter().map(|r| r.cohort.clone()).collect();
        table.classify_all(&mut rows);
        let second: Vec<String> = rows.iter().map(|r| r.cohort.clone()).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec!["fish_passiv", "reg_aggro", "unknown"]);
    }

    #[test]
    fn test_rule_order_only_affects_overlapping_rows() {
        let wide = rule("wide", &[(StatField::Hands, Comparison::AtLeast, 10.0)]);
        let narrow = rule("narrow", &[(StatField::Hands, Comparison::AtLeast, 100.0)]);

        let wide_first = CohortTable::new(vec![wide.clone(), narrow.clone()]);
        let narrow_first = CohortTable::new(vec![narrow, wide]);

        let both = stats(150, 0, 0, 0);
        let only_wide = stats(50, 0, 0, 0);
        let neither = stats(5, 0, 0, 0);

        assert_eq!(wide_first.classify(&both), "wide");
        assert_eq!(narrow_first.classify(&both), "narrow");
        assert_eq!(wide_first.classify(&only_wide), narrow_first.classify(&only_wide));
        assert_eq!(wide_first.classify(&neither), narrow_first.classify(&neither));
    }

    #[test]
    fn test_comparisons() {
        assert!(Comparison::AtLeast.holds(5.0, 5.0));
        assert!(!Comparison::Above.holds(5.0, 5.0));
        assert!(Comparison::AtMost.holds(5.0, 5.0));
        assert!(!Comparison::Below.holds(5.0, 5.0));
        assert!(Comparison::Equal.holds(5.0, 5.0));
    }

    #[test]
    fn test_table_from_toml() {
        let toml_content = r#"
[[rules]]
label = "nit"
conditions = [
    { field = "vpip", op = "<", value = 15 },
    { field = "hands", op = ">=", value = 50 },
]

[[rules]]
label = "anyone"
conditions = []
"#;
        let table: CohortTable = toml::from_str(toml_content).unwrap();
        assert_eq!(table.rules.len(), 2);
        assert_eq!(table.rules[0].conditions[0].op, Comparison::Below);
        assert_eq!(table.classify(&stats(60, 10, 5, 0)), "nit");
        assert_eq!(table.classify(&stats(60, 30, 5, 0)), "anyone");
    }
}
