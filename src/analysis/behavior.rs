//! Behavioral statistics: VPIP, PFR and WWSF.
//!
//! Each hand yields a handful of events ([`extract_events`]); events are
//! counted into a [`BehaviorTally`], whose `merge` is associative and
//! commutative so tallies built on different threads combine in any
//! order. [`BehaviorTally::finish`] turns the counts into rounded rates.

use super::cohort::CohortTable;
use crate::models::{FlopEvent, HandEvents, ParsedHand, PlayerStats, PreflopEvent};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Extract the behavioral events of one hand.
///
/// Only a player's first preflop action counts for VPIP/PFR. A player saw
/// the flop when they act in round 2.
pub fn extract_events(hand: &ParsedHand) -> HandEvents {
    let mut acted = HashSet::new();
    let preflop = hand
        .round(ParsedHand::PREFLOP)
        .iter()
        .filter(|action| acted.insert(action.player.as_str()))
        .map(|action| PreflopEvent {
            player: action.player.clone(),
            vpip: action.code.is_voluntary(),
            pfr: action.code.is_raise(),
        })
        .collect();

    let on_flop: HashSet<&str> = hand
        .round(ParsedHand::FLOP)
        .iter()
        .map(|action| action.player.as_str())
        .collect();
    let flop = hand
        .players
        .iter()
        .filter(|p| on_flop.contains(p.name.as_str()))
        .map(|p| FlopEvent {
            player: p.name.clone(),
            won: p.win > Decimal::ZERO,
        })
        .collect();

    HandEvents { preflop, flop }
}

/// Raw counters for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerTally {
    pub hands: u32,
    pub vpip: u32,
    pub pfr: u32,
    pub saw_flop: u32,
    pub won_after_flop: u32,
}

impl PlayerTally {
    fn absorb(&mut self, other: &PlayerTally) {
        self.hands += other.hands;
        self.vpip += other.vpip;
        self.pfr += other.pfr;
        self.saw_flop += other.saw_flop;
        self.won_after_flop += other.won_after_flop;
    }
}

/// Per-player counters over any number of hands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorTally {
    players: HashMap<String, PlayerTally>,
}

impl BehaviorTally {
    #[cfg(test)]
    pub fn add_hand(&mut self, hand: &ParsedHand) {
        self.add_events(&extract_events(hand));
    }

    pub fn add_events(&mut self, events: &HandEvents) {
        for event in &events.preflop {
            let tally = self.players.entry(event.player.clone()).or_default();
            tally.hands += 1;
            tally.vpip += u32::from(event.vpip);
            tally.pfr += u32::from(event.pfr);
        }
        for event in &events.flop {
            let tally = self.players.entry(event.player.clone()).or_default();
            tally.saw_flop += 1;
            tally.won_after_flop += u32::from(event.won);
        }
    }

    pub fn merge(mut self, other: BehaviorTally) -> Self {
        for (player, tally) in other.players {
            self.players.entry(player).or_default().absorb(&tally);
        }
        self
    }

    pub fn get(&self, player: &str) -> Option<&PlayerTally> {
        self.players.get(player)
    }

    /// Reduce the counters to rates and assign cohorts.
    ///
    /// Players with no preflop events are left out. A player who never saw
    /// a flop gets `wwsf = 0`. Rows are sorted by player name.
    pub fn finish(&self, table: &CohortTable) -> Vec<PlayerStats> {
        let mut rows: Vec<PlayerStats> = self
            .players
            .iter()
            .filter(|(_, t)| t.hands > 0)
            .map(|(player, t)| {
                let vpip = percent(t.vpip, t.hands);
                let pfr = percent(t.pfr, t.hands);
                let mut row = PlayerStats {
                    player: player.clone(),
                    hands: t.hands,
                    vpip,
                    pfr,
                    vpip_pfr_gap: vpip - pfr,
                    wwsf: percent(t.won_after_flop, t.saw_flop),
                    cohort: String::new(),
                };
                row.cohort = table.classify(&row).to_string();
                row
            })
            .collect();

        rows.sort_by(|a, b| a.player.cmp(&b.player));
        rows
    }
}

/// Aggregate a full population of hand events into player stats.
pub fn aggregate<'a>(
    events: impl IntoIterator<Item = &'a HandEvents>,
    table: &CohortTable,
) -> Vec<PlayerStats> {
    let mut tally = BehaviorTally::default();
    for hand_events in events {
        tally.add_events(hand_events);
    }
    tally.finish(table)
}

/// `part / whole` as a whole percentage, ties rounded to the even
/// neighbour (`5/8` is 62). Zero when `whole` is zero.
pub fn percent(part: u32, whole: u32) -> i32 {
    if whole == 0 {
        return 0;
    }
    let (scaled, whole) = (100 * u64::from(part), u64::from(whole));
    let (quotient, rem) = (scaled / whole, scaled % whole);
    let round_up = match (2 * rem).cmp(&whole) {
        Ordering::Greater => true,
        Ordering::Equal => quotient % 2 == 1,
        Ordering::Less => false,
    };
    (quotient + u64::from(round_up)) as i32
}
