//! Net result of a focal player against every opponent in a hand.
//!
//! Only bet, chips and win amounts are recorded per player, so the pot is
//! reconstructed from bets, uncalled excess is corrected for, and rake is
//! apportioned to opponents by their matched contribution. All amounts in
//! the output are in big blinds.

use crate::error::HandError;
use crate::models::{NetResultRecord, ParsedHand};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One row of the rake-cap table: hands with `big_blind <= max_big_blind`
/// are capped at `cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RakeCap {
    pub max_big_blind: Decimal,
    pub cap: Decimal,
}

impl RakeCap {
    fn new(max_big_blind: Decimal, cap: Decimal) -> Self {
        Self { max_big_blind, cap }
    }
}

/// Rake percentage and cap lookup. Caps are in table currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RakeSchedule {
    /// Fraction of the pot taken, e.g. `0.0303`.
    #[serde(default = "default_rate")]
    pub rate: Decimal,

    /// Flat cap for two-player hands.
    #[serde(default = "default_heads_up_cap")]
    pub heads_up_cap: Decimal,

    /// Cap above the last bound.
    #[serde(default = "default_fallback_cap")]
    pub fallback_cap: Decimal,

    /// Ordered by `max_big_blind`; the first row that fits wins.
    #[serde(default = "default_caps")]
    pub caps: Vec<RakeCap>,
}

impl Default for RakeSchedule {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            heads_up_cap: default_heads_up_cap(),
            caps: default_caps(),
            fallback_cap: default_fallback_cap(),
        }
    }
}

fn default_rate() -> Decimal {
    Decimal::new(303, 4)
}

fn default_heads_up_cap() -> Decimal {
    Decimal::new(5, 1)
}

fn default_caps() -> Vec<RakeCap> {
    vec![
        RakeCap::new(Decimal::new(29, 2), Decimal::ONE),
        RakeCap::new(Decimal::new(99, 2), Decimal::new(15, 1)),
        RakeCap::new(Decimal::new(199, 2), Decimal::TWO),
        RakeCap::new(Decimal::new(399, 2), Decimal::new(25, 1)),
        RakeCap::new(Decimal::new(599, 2), Decimal::new(3, 0)),
    ]
}

fn default_fallback_cap() -> Decimal {
    Decimal::new(4, 0)
}

impl RakeSchedule {
    /// Rake cap for a table of `n_players` at big blind `big_blind`.
    pub fn cap(&self, n_players: usize, big_blind: Decimal) -> Decimal {
        if n_players == 2 {
            return self.heads_up_cap;
        }
        self.caps
            .iter()
            .find(|row| big_blind <= row.max_big_blind)
            .map(|row| row.cap)
            .unwrap_or(self.fallback_cap)
    }

    /// Rake taken from `pot` (currency). `None` when the amount overflows.
    pub fn rake(&self, n_players: usize, big_blind: Decimal, pot: Decimal) -> Option<Decimal> {
        pot.checked_mul(self.rate)
            .map(|rake| rake.min(self.cap(n_players, big_blind)))
    }
}

/// Knobs for [`compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetResultSettings {
    /// Subtract each opponent's rake share when the flop was dealt.
    #[serde(default = "default_true")]
    pub include_rake: bool,

    #[serde(default)]
    pub rake: RakeSchedule,

    /// Placeholder names the site uses for players it does not reveal.
    #[serde(default = "default_anonymized_players")]
    pub anonymized_players: Vec<String>,
}

impl Default for NetResultSettings {
    fn default() -> Self {
        Self {
            include_rake: true,
            rake: RakeSchedule::default(),
            anonymized_players: default_anonymized_players(),
        }
    }
}

fn default_true() -> bool {
    true
}

pub fn default_anonymized_players() -> Vec<String> {
    (1..=10).map(|n| format!("Player {n}")).collect()
}

impl NetResultSettings {
    pub fn is_anonymized(&self, player: &str) -> bool {
        self.anonymized_players.iter().any(|p| p == player)
    }
}

/// Everything [`compute`] learned about one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandNetResult {
    pub hand_id: u64,
    pub start_date: NaiveDateTime,
    pub records: Vec<NetResultRecord>,
    /// More than one player had a positive win; only the first was used.
    pub split_pot: bool,
    /// Rake could not be apportioned; records are gross.
    pub rake_skipped: bool,
}

/// Reconstruct the pot from per-player bets (currency).
///
/// When the two largest bets differ, the excess of the largest went back
/// uncalled and only the second-largest amount is counted for it.
/// `None` when the sum overflows.
pub fn calculate_pot(bets: &[Decimal]) -> Option<Decimal> {
    let mut sorted = bets.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));

    let matched_top = match sorted.as_slice() {
        [] => return Some(Decimal::ZERO),
        [first, second, ..] if first != second => *second,
        [first, ..] => *first,
    };
    sorted
        .iter()
        .skip(1)
        .try_fold(matched_top, |pot, bet| pot.checked_add(*bet))
}

fn out_of_range(hand_id: u64) -> HandError {
    HandError::malformed(format!("hand {hand_id}: amounts out of range"))
}

/// Each opponent's share of `rake`, in big blinds rounded to 2 places.
///
/// Contributions are the recorded bets with the single largest bet clamped
/// to the second largest. The focal player is then removed from the pool.
pub fn rake_shares(
    hand: &ParsedHand,
    focal: &str,
    rake: Decimal,
) -> Result<HashMap<String, Decimal>, HandError> {
    let mut contributions: Vec<(&str, Decimal)> =
        hand.players.iter().map(|p| (p.name.as_str(), p.bet)).collect();

    let mut bets: Vec<Decimal> = contributions.iter().map(|(_, bet)| *bet).collect();
    bets.sort_by(|a, b| b.cmp(a));
    if let [top, second, ..] = bets.as_slice() {
        if top > second {
            if let Some(entry) = contributions.iter_mut().find(|(_, bet)| bet == top) {
                entry.1 = *second;
            }
        }
    }

    contributions.retain(|(name, _)| *name != focal);
    let pool = contributions
        .iter()
        .try_fold(Decimal::ZERO, |pool, (_, bet)| pool.checked_add(*bet))
        .ok_or_else(|| out_of_range(hand.hand_id))?;
    if pool.is_zero() {
        return Err(HandError::InsufficientRakeData { hand_id: hand.hand_id });
    }

    contributions
        .into_iter()
        .map(|(name, bet)| {
            bet.checked_div(pool)
                .and_then(|fraction| fraction.checked_mul(rake))
                .and_then(|share| share.checked_div(hand.big_blind))
                .map(|share| (name.to_string(), share.round_dp(2)))
        })
        .collect::<Option<HashMap<_, _>>>()
        .ok_or_else(|| out_of_range(hand.hand_id))
}

/// How many seats `focal` acts after each other player, going backward
/// around the table. The player seated immediately before is 1.
pub fn seat_distances(hand: &ParsedHand, focal: &str) -> HashMap<String, u32> {
    let mut seats: Vec<(&str, u32)> = hand.players.iter().map(|p| (p.name.as_str(), p.seat)).collect();
    seats.sort_by_key(|&(_, seat)| seat);

    let n = seats.len();
    let Some(f) = seats.iter().position(|&(name, _)| name == focal) else {
        return HashMap::new();
    };

    seats
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != f)
        .map(|(i, &(name, _))| (name.to_string(), ((f + n - i) % n) as u32))
        .collect()
}

/// Signed result of `focal` against every other seated player.
pub fn compute(
    hand: &ParsedHand,
    focal: &str,
    settings: &NetResultSettings,
) -> Result<HandNetResult, HandError> {
    let hand_id = hand.hand_id;
    let winners = hand.winners();
    let winner = *winners.first().ok_or(HandError::NoWinner { hand_id })?;

    let split_pot = winners.len() > 1;
    if split_pot {
        warn!(
            hand_id,
            winners = winners.len(),
            "Split pot, attributing the hand to {} only", winner.name
        );
    }

    if settings.is_anonymized(&winner.name) {
        debug!(hand_id, winner = %winner.name, "Winner is anonymized, skipping hand");
        return Err(HandError::AnonymizedWinner {
            hand_id,
            player: winner.name.clone(),
        });
    }

    let focal_player = hand.player(focal).ok_or_else(|| {
        debug!(hand_id, focal, "Focal player not seated, skipping hand");
        HandError::MissingFocalPlayer {
            hand_id,
            player: focal.to_string(),
        }
    })?;

    let bb = hand.big_blind;
    let in_bb = |amount: Decimal| amount.checked_div(bb).ok_or_else(|| out_of_range(hand_id));
    let mut results: Vec<(String, Decimal)> = Vec::with_capacity(hand.players.len());
    let mut rake_skipped = false;

    if winner.name != focal {
        let loss = in_bb(focal_player.bet)?.min(in_bb(winner.chips)?);
        for player in hand.players.iter().filter(|p| p.name != focal) {
            let value = if player.name == winner.name { -loss } else { Decimal::ZERO };
            results.push((player.name.clone(), value));
        }
    } else {
        let focal_stack = in_bb(focal_player.chips)?;
        if focal_stack.is_zero() {
            warn!(hand_id, focal, "Focal player won without a recorded stack");
        }

        for player in hand.players.iter().filter(|p| p.name != focal) {
            results.push((player.name.clone(), in_bb(player.bet)?.min(focal_stack)));
        }

        if hand.reached_flop() && settings.include_rake {
            let bets: Vec<Decimal> = hand.players.iter().map(|p| p.bet).collect();
            let rake = calculate_pot(&bets)
                .and_then(|pot| settings.rake.rake(hand.active_players(), bb, pot))
                .ok_or_else(|| out_of_range(hand_id))?;

            match rake_shares(hand, focal, rake) {
                Ok(shares) => {
                    for (name, value) in results.iter_mut() {
                        let share = shares.get(name.as_str()).copied().unwrap_or_default();
                        *value = value.checked_sub(share).ok_or_else(|| out_of_range(hand_id))?;
                    }
                }
                Err(e @ HandError::InsufficientRakeData { .. }) => {
                    warn!(hand_id, "{e}, keeping gross results");
                    rake_skipped = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    let distances = seat_distances(hand, focal);
    let share_of_hand = if results.is_empty() {
        0.0
    } else {
        1.0 / results.len() as f64
    };

    let records = results
        .into_iter()
        .map(|(opponent, won_vs_focal)| NetResultRecord {
            hand_id,
            start_date: hand.start_date,
            focal_player: focal.to_string(),
            seat_distance: distances.get(&opponent).copied().unwrap_or_default(),
            opponent,
            won_vs_focal,
            share_of_hand,
        })
        .collect();

    Ok(HandNetResult {
        hand_id,
        start_date: hand.start_date,
        records,
        split_pot,
        rake_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SkipReason;
    use crate::parser::{parse_hand, split_hands};
    use crate::test_support::{d, HandBuilder};

    const SESSION: &str = include_str!("../../fixtures/hands/session.xml");

    fn fixture(index: usize) -> ParsedHand {
        parse_hand(&split_hands(SESSION)[index]).unwrap()
    }

    fn won_against(result: &HandNetResult, opponent: &str) -> Decimal {
        result
            .records
            .iter()
            .find(|r| r.opponent == opponent)
            .map(|r| r.won_vs_focal)
            .unwrap()
    }

    #[test]
    fn test_calculate_pot() {
        assert_eq!(calculate_pot(&[d("10"), d("10"), d("5")]), Some(d("25")));
        assert_eq!(calculate_pot(&[d("5"), d("10"), d("6")]), Some(d("17")));
        assert_eq!(calculate_pot(&[d("7")]), Some(d("7")));
        assert_eq!(calculate_pot(&[]), Some(Decimal::ZERO));
        assert_eq!(calculate_pot(&[Decimal::MAX, Decimal::MAX]), None);
    }

    #[test]
    fn test_rake_cap_lookup() {
        let schedule = RakeSchedule::default();
        assert_eq!(schedule.cap(2, d("2.5")), d("0.5"));
        assert_eq!(schedule.cap(6, d("2.5")), d("2.5"));
        assert_eq!(schedule.cap(6, d("0.29")), d("1"));
        assert_eq!(schedule.cap(6, d("0.99")), d("1.5"));
        assert_eq!(schedule.cap(3, d("1")), d("2"));
        assert_eq!(schedule.cap(6, d("10")), d("4"));
    }

    #[test]
    fn test_rake_is_capped() {
        let schedule = RakeSchedule::default();
        assert_eq!(schedule.rake(6, d("1"), d("10")), Some(d("0.303")));
        assert_eq!(schedule.rake(6, d("1"), d("100")), Some(d("2")));
        assert_eq!(schedule.rake(2, d("1"), d("100")), Some(d("0.5")));
    }

    #[test]
    fn test_seat_distance_wraps() {
        let hand = HandBuilder::new(1, "1")
            .player("s1", 1, "0", "10", "0")
            .player("s4", 4, "0", "10", "0")
            .player("s3", 3, "0", "10", "1")
            .player("s2", 2, "0", "10", "0")
            .build();
        let distances = seat_distances(&hand, "s3");

        assert_eq!(distances.len(), 3);
        assert_eq!(distances["s2"], 1);
        assert_eq!(distances["s1"], 2);
        assert_eq!(distances["s4"], 3);
        assert!(seat_distances(&hand, "nobody").is_empty());
    }

    #[test]
    fn test_focal_win_capped_by_focal_stack() {
        let hand = HandBuilder::new(2, "1")
            .player("hero", 1, "20", "20", "45")
            .player("villain", 2, "25", "100", "0")
            .action(1, "villain", 23)
            .action(1, "hero", 3)
            .build();
        let result = compute(&hand, "hero", &NetResultSettings::default()).unwrap();

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.opponent, "villain");
        assert_eq!(record.won_vs_focal, d("20"));
        assert_eq!(record.share_of_hand, 1.0);
        assert_eq!(record.seat_distance, 1);
        assert!(!result.split_pot);
    }

    #[test]
    fn test_focal_loss_conserves_chips() {
        let hand = HandBuilder::new(3, "2")
            .player("a", 1, "4", "100", "0")
            .player("hero", 2, "30", "300", "0")
            .player("winner", 3, "24", "24", "58")
            .build();
        let result = compute(&hand, "hero", &NetResultSettings::default()).unwrap();

        assert_eq!(won_against(&result, "winner"), d("-12"));
        assert_eq!(won_against(&result, "a"), Decimal::ZERO);
        let total: Decimal = result.records.iter().map(|r| r.won_vs_focal.abs()).sum();
        assert!(total <= d("15"));
        assert!(result.records.iter().all(|r| r.share_of_hand == 0.5));
    }

    #[test]
    fn test_covered_focal_loss_equals_focal_bet() {
        let hand = HandBuilder::new(5, "0.5")
            .player("a", 1, "1", "80", "0")
            .player("hero", 2, "7.5", "40", "0")
            .player("b", 3, "0.5", "60", "0")
            .player("winner", 4, "7.5", "200", "16.5")
            .action(2, "hero", 5)
            .action(2, "winner", 3)
            .build();
        let result = compute(&hand, "hero", &NetResultSettings::default()).unwrap();

        let total: Decimal = result.records.iter().map(|r| r.won_vs_focal).sum();
        assert_eq!(total, -(d("7.5") / d("0.5")));
        assert_eq!(won_against(&result, "winner"), d("-15"));
        assert_eq!(won_against(&result, "a"), Decimal::ZERO);
    }

    #[test]
    fn test_overflowing_amounts_are_malformed() {
        let huge = "79228162514264337593543950335";
        let hand = HandBuilder::new(6, "1")
            .player("hero", 1, huge, huge, huge)
            .player("villain", 2, huge, huge, "0")
            .player("c", 3, "1", "10", "0")
            .action(2, "hero", 5)
            .action(2, "villain", 3)
            .build();

        let err = compute(&hand, "hero", &NetResultSettings::default()).unwrap_err();
        assert_eq!(err.reason(), SkipReason::Malformed);

        let tiny_blind = HandBuilder::new(7, "0.0000000000000000000000000001")
            .player("hero", 1, "1", "10", "0")
            .player("winner", 2, "1", "79228162514264337593543950", "2")
            .build();
        let err = compute(&tiny_blind, "hero", &NetResultSettings::default()).unwrap_err();
        assert_eq!(err.reason(), SkipReason::Malformed);
    }

    #[test]
    fn test_fixture_hand_with_rake() {
        let result = compute(&fixture(0), "hero", &NetResultSettings::default()).unwrap();

        assert_eq!(result.hand_id, 8_100_000_001);
        assert_eq!(won_against(&result, "fish"), d("7.59"));
        assert_eq!(won_against(&result, "villain1"), d("2.85"));
        assert_eq!(won_against(&result, "villain2"), d("0.47"));
        assert!(!result.rake_skipped);

        let distance = |name: &str| result.records.iter().find(|r| r.opponent == name).unwrap().seat_distance;
        assert_eq!(distance("villain2"), 1);
        assert_eq!(distance("villain1"), 2);
        assert_eq!(distance("fish"), 3);
    }

    #[test]
    fn test_fixture_hand_without_rake() {
        let settings = NetResultSettings {
            include_rake: false,
            ..NetResultSettings::default()
        };
        let result = compute(&fixture(0), "hero", &settings).unwrap();

        assert_eq!(won_against(&result, "fish"), d("8"));
        assert_eq!(won_against(&result, "villain1"), d("3"));
        assert_eq!(won_against(&result, "villain2"), d("0.5"));
    }

    #[test]
    fn test_fixture_hand_lost() {
        let result = compute(&fixture(1), "hero", &NetResultSettings::default()).unwrap();

        assert_eq!(won_against(&result, "villain1"), d("-0.5"));
        assert_eq!(won_against(&result, "fish"), Decimal::ZERO);
    }

    #[test]
    fn test_rake_shares_example() {
        let hand = HandBuilder::new(4, "1")
            .player("hero", 1, "10", "100", "19")
            .player("a", 2, "6", "100", "0")
            .player("b", 3, "3", "100", "0")
            .build();
        let shares = rake_shares(&hand, "hero", d("0.9")).unwrap();

        // hero clamped to 6 and removed; pool = 9
        assert_eq!(shares["a"], d("0.6"));
        assert_eq!(shares["b"], d("0.3"));
        assert!(!shares.contains_key("hero"));
    }

    #[test]
    fn test_insufficient_rake_data_keeps_gross() {
        let hand = HandBuilder::new(5, "1")
            .player("hero", 1, "2", "100", "2")
            .player("a", 2, "0", "100", "0")
            .action(2, "hero", 5)
            .build();

        assert_eq!(
            rake_shares(&hand, "hero", d("0.1")),
            Err(HandError::InsufficientRakeData { hand_id: 5 })
        );
        let result = compute(&hand, "hero", &NetResultSettings::default()).unwrap();
        assert!(result.rake_skipped);
        assert_eq!(won_against(&result, "a"), Decimal::ZERO);
    }

    #[test]
    fn test_no_winner() {
        let hand = HandBuilder::new(6, "1")
            .player("hero", 1, "1", "10", "0")
            .player("a", 2, "1", "10", "0")
            .build();
        assert_eq!(
            compute(&hand, "hero", &NetResultSettings::default()),
            Err(HandError::NoWinner { hand_id: 6 })
        );
    }

    #[test]
    fn test_anonymized_winner_skipped() {
        let err = compute(&fixture(2), "hero", &NetResultSettings::default()).unwrap_err();
        assert!(matches!(err, HandError::AnonymizedWinner { ref player, .. } if player == "Player 3"));
    }

    #[test]
    fn test_missing_focal_player() {
        let err = compute(&fixture(0), "someone", &NetResultSettings::default()).unwrap_err();
        assert!(matches!(err, HandError::MissingFocalPlayer { hand_id: 8_100_000_001, .. }));
    }

    #[test]
    fn test_split_pot_keeps_first_winner() {
        let hand = HandBuilder::new(7, "1")
            .player("hero", 1, "5", "50", "5")
            .player("a", 2, "5", "50", "5")
            .player("b", 3, "2", "50", "0")
            .build();
        let result = compute(&hand, "hero", &NetResultSettings::default()).unwrap();

        assert!(result.split_pot);
        assert_eq!(won_against(&result, "a"), d("5"));
        assert_eq!(won_against(&result, "b"), d("2"));
    }
}
