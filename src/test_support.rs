//! Builders shared by the unit tests.

use crate::models::{Action, ActionCode, ParsedHand, SeatedPlayer, TableInfo};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Fluent builder for [`ParsedHand`] values.
pub struct HandBuilder {
    hand: ParsedHand,
}

impl HandBuilder {
    pub fn new(hand_id: u64, big_blind: &str) -> Self {
        Self {
            hand: ParsedHand {
                hand_id,
                start_date: at("2024-03-04 10:00:00"),
                big_blind: d(big_blind),
                small_blind: None,
                table: TableInfo::default(),
                players: Vec::new(),
                rounds: BTreeMap::new(),
            },
        }
    }

    /// Add a player: amounts are plain decimals in table currency.
    pub fn player(mut self, name: &str, seat: u32, bet: &str, chips: &str, win: &str) -> Self {
        self.hand.players.push(SeatedPlayer {
            name: name.to_string(),
            seat,
            bet: d(bet),
            chips: d(chips),
            win: d(win),
        });
        self
    }

    pub fn action(mut self, round: u8, player: &str, code: u16) -> Self {
        self.hand.rounds.entry(round).or_default().push(Action {
            player: player.to_string(),
            code: ActionCode(code),
        });
        self
    }

    pub fn build(self) -> ParsedHand {
        self.hand
    }
}
