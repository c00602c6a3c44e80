//! Hand and observation filters.
//!
//! [`HandFilter`] decides which hands are analysed for net results.
//! [`ObservationFilter`] and [`CampRules`] turn per-player observations
//! into the camp-tagged stream the time series is built from.

use crate::models::{Camp, ParsedHand, PlayerObservation};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::cohort::UNKNOWN_COHORT;

/// Inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> BoundedRange<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Which hands are analysed for net results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandFilter {
    /// Big blind range (currency).
    pub big_blind: BoundedRange<Decimal>,
    pub active_players: BoundedRange<u32>,
}

impl Default for HandFilter {
    fn default() -> Self {
        Self {
            big_blind: BoundedRange::new(Decimal::ZERO, Decimal::from(10_000)),
            active_players: BoundedRange::new(3, 6),
        }
    }
}

impl HandFilter {
    pub fn accepts(&self, hand: &ParsedHand) -> bool {
        self.big_blind.contains(hand.big_blind)
            && self.active_players.contains(hand.active_players() as u32)
    }
}

/// One observation per seated player.
pub fn observations(hand: &ParsedHand) -> Vec<PlayerObservation> {
    let active_players = hand.active_players() as u32;
    hand.players
        .iter()
        .map(|p| PlayerObservation {
            hand_id: hand.hand_id,
            start_date: hand.start_date,
            player: p.name.clone(),
            big_blind: hand.big_blind,
            active_players,
        })
        .collect()
}

/// Cohorts grouped into the two camps the ratio compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampRules {
    #[serde(default = "default_big_loser")]
    pub big_loser: Vec<String>,

    #[serde(default = "default_big_winner")]
    pub big_winner: Vec<String>,
}

impl Default for CampRules {
    fn default() -> Self {
        Self {
            big_loser: default_big_loser(),
            big_winner: default_big_winner(),
        }
    }
}

fn default_big_loser() -> Vec<String> {
    ["fish_low_sample", "fish_passiv", "semireg_passiv", "fish_aggro"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_big_winner() -> Vec<String> {
    ["semireg_aggro", "reg_aggro"].into_iter().map(String::from).collect()
}

impl CampRules {
    pub fn camp(&self, cohort: &str) -> Camp {
        if self.big_loser.iter().any(|c| c == cohort) {
            Camp::BigLoser
        } else if self.big_winner.iter().any(|c| c == cohort) {
            Camp::BigWinner
        } else {
            Camp::Other
        }
    }
}

/// Which observations count towards the time series.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFilter {
    /// Big blind range (currency).
    pub big_blind: BoundedRange<Decimal>,
    /// Table size below which `short_handed_cohorts` observations are dropped.
    pub min_active_players: u32,
    pub short_handed_cohorts: Vec<String>,
    /// Anonymized players, plus the focal players when they are excluded.
    pub excluded_players: HashSet<String>,
}

impl Default for ObservationFilter {
    fn default() -> Self {
        let hands = HandFilter::default();
        Self {
            big_blind: hands.big_blind,
            min_active_players: hands.active_players.min,
            short_handed_cohorts: default_short_handed_cohorts(),
            excluded_players: HashSet::new(),
        }
    }
}

pub fn default_short_handed_cohorts() -> Vec<String> {
    ["reg_passiv", "reg_medium", "reg_aggro"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl ObservationFilter {
    pub fn keeps(&self, observation: &PlayerObservation, cohort: &str) -> bool {
        if self.excluded_players.contains(&observation.player) {
            return false;
        }
        if !self.big_blind.contains(observation.big_blind) {
            return false;
        }
        let short_handed = observation.active_players < self.min_active_players;
        !(short_handed && self.short_handed_cohorts.iter().any(|c| c == cohort))
    }
}

/// Join observations with cohorts, filter them and tag each with its camp.
///
/// Players without a cohort are treated as `unknown`.
pub fn load_player_data(
    observations: &[PlayerObservation],
    cohorts: &HashMap<String, String>,
    filter: &ObservationFilter,
    camps: &CampRules,
) -> Vec<(NaiveDateTime, Camp)> {
    let tagged: Vec<(NaiveDateTime, Camp)> = observations
        .iter()
        .filter_map(|obs| {
            let cohort = cohorts
                .get(&obs.player)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_COHORT);
            filter
                .keeps(obs, cohort)
                .then(|| (obs.start_date, camps.camp(cohort)))
        })
        .collect();

    debug!(
        total = observations.len(),
        kept = tagged.len(),
        "Filtered player observations"
    );
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, d, HandBuilder};

    fn observation(player: &str, big_blind: &str, active_players: u32) -> PlayerObservation {
        PlayerObservation {
            hand_id: 1,
            start_date: at("2024-03-04 10:00:00"),
            player: player.to_string(),
            big_blind: d(big_blind),
            active_players,
        }
    }

    #[test]
    fn test_hand_filter_bounds_are_inclusive() {
        let filter = HandFilter {
            big_blind: BoundedRange::new(d("0.5"), d("2")),
            active_players: BoundedRange::new(3, 4),
        };
        let hand = |bb: &str, players: u32| {
            let mut builder = HandBuilder::new(1, bb);
            for seat in 1..=players {
                builder = builder.player(&format!("p{seat}"), seat, "1", "10", "0");
            }
            builder.build()
        };

        assert!(filter.accepts(&hand("0.5", 3)));
        assert!(filter.accepts(&hand("2", 4)));
        assert!(!filter.accepts(&hand("2.5", 3)));
        assert!(!filter.accepts(&hand("1", 2)));
        assert!(!filter.accepts(&hand("1", 5)));
    }

    #[test]
    fn test_observations_one_per_seat() {
        let hand = HandBuilder::new(9, "2")
            .player("a", 1, "1", "10", "0")
            .player("b", 2, "1", "10", "2")
            .build();
        let rows = observations(&hand);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.hand_id == 9 && r.active_players == 2));
        assert_eq!(rows[1].player, "b");
        assert_eq!(rows[1].big_blind, d("2"));
    }

    #[test]
    fn test_camps() {
        let camps = CampRules::default();
        assert_eq!(camps.camp("fish_aggro"), Camp::BigLoser);
        assert_eq!(camps.camp("reg_aggro"), Camp::BigWinner);
        assert_eq!(camps.camp("reg_medium"), Camp::Other);
        assert_eq!(camps.camp(UNKNOWN_COHORT), Camp::Other);
    }

    #[test]
    fn test_short_handed_regulars_dropped() {
        let filter = ObservationFilter::default();

        assert!(!filter.keeps(&observation("r", "1", 2), "reg_aggro"));
        assert!(filter.keeps(&observation("r", "1", 3), "reg_aggro"));
        assert!(filter.keeps(&observation("f", "1", 2), "fish_passiv"));
    }

    #[test]
    fn test_load_player_data() {
        let filter = ObservationFilter {
            big_blind: BoundedRange::new(d("1"), d("5")),
            excluded_players: ["hero".to_string(), "Player 1".to_string()].into_iter().collect(),
            ..ObservationFilter::default()
        };
        let cohorts: HashMap<String, String> = [
            ("fish".to_string(), "fish_passiv".to_string()),
            ("reg".to_string(), "reg_aggro".to_string()),
        ]
        .into_iter()
        .collect();
        let rows = vec![
            observation("fish", "1", 6),
            observation("reg", "2", 6),
            observation("reg", "2", 2),
            observation("hero", "2", 6),
            observation("Player 1", "2", 6),
            observation("fish", "0.5", 6),
            observation("stranger", "2", 6),
        ];

        let tagged = load_player_data(&rows, &cohorts, &filter, &CampRules::default());
        let camps: Vec<Camp> = tagged.iter().map(|(_, camp)| *camp).collect();
        assert_eq!(camps, vec![Camp::BigLoser, Camp::BigWinner, Camp::Other]);
    }
}
