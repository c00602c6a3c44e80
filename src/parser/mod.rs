//! Hand record parsing.
//!
//! A hand record is a `<root>` document holding a `general` block with the
//! table settings and a `game` element with the seated players and the
//! actions of every betting round. [`parse_hand`] turns one record into a
//! [`ParsedHand`]; [`split_hands`] cuts a multi-hand export into records.

pub mod money;

use money::parse_money;

use crate::error::HandError;
use crate::models::{Action, ActionCode, ParsedHand, SeatedPlayer, TableInfo};
use chrono::NaiveDateTime;
use roxmltree::{Document, Node};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// Closing tag that terminates every hand in an export file.
pub const HAND_DELIMITER: &str = "</root>";

/// Marker present only in tournament hands.
const TOURNAMENT_MARKER: &str = "tournamentcurrency";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%d-%m-%Y %H:%M:%S", "%d.%m.%Y %H:%M:%S"];

/// Split an export file into standalone ring-game hand records.
pub fn split_hands(file: &str) -> Vec<String> {
    file.split(HAND_DELIMITER)
        .filter(|chunk| !chunk.trim().is_empty())
        .filter(|chunk| !chunk.contains(TOURNAMENT_MARKER))
        .map(|chunk| format!("{}{}", chunk.trim_start(), HAND_DELIMITER))
        .collect()
}

/// Parse one hand record.
pub fn parse_hand(raw: &str) -> Result<ParsedHand, HandError> {
    let doc = Document::parse(raw).map_err(|e| HandError::malformed(format!("invalid xml: {e}")))?;
    let root = doc.root_element();

    let game = find(root, "game").ok_or_else(|| HandError::malformed("missing game element"))?;
    let hand_id = game
        .attribute("gamecode")
        .ok_or_else(|| HandError::malformed("missing gamecode"))?
        .trim()
        .parse::<u64>()
        .map_err(|e| HandError::malformed(format!("bad gamecode: {e}")))?;

    let big_blind = required_text(root, "bigblind", hand_id).and_then(parse_money)?;
    if big_blind <= Decimal::ZERO {
        return Err(HandError::malformed(format!("hand {hand_id}: non-positive big blind")));
    }
    let small_blind = text(root, "smallblind").map(parse_money).transpose()?;
    let start_date = required_text(root, "startdate", hand_id).and_then(parse_start_date)?;

    let players = parse_players(root, hand_id)?;
    let rounds = parse_rounds(game, &players, hand_id)?;

    let general = root.children().find(|n| n.has_tag_name("general"));
    let table = TableInfo {
        mode: general.and_then(|g| text(g, "mode")).map(String::from),
        game_type: general.and_then(|g| text(g, "gametype")).map(String::from),
        table_name: general.and_then(|g| text(g, "tablename")).map(String::from),
        currency: general.and_then(|g| text(g, "tablecurrency")).map(String::from),
    };

    Ok(ParsedHand {
        hand_id,
        start_date,
        big_blind,
        small_blind,
        table,
        players,
        rounds,
    })
}

/// Parse a hand start date in any of the accepted layouts.
pub fn parse_start_date(raw: &str) -> Result<NaiveDateTime, HandError> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| HandError::malformed(format!("bad start date: {raw:?}")))
}

fn parse_players(root: Node<'_, '_>, hand_id: u64) -> Result<Vec<SeatedPlayer>, HandError> {
    let list = find(root, "players")
        .ok_or_else(|| HandError::malformed(format!("hand {hand_id}: missing players")))?;

    let mut players = Vec::new();
    let mut names = HashSet::new();
    let mut seats = HashSet::new();

    for node in list.children().filter(|n| n.has_tag_name("player")) {
        let attr = |name: &str| {
            node.attribute(name).ok_or_else(|| {
                HandError::malformed(format!("hand {hand_id}: player without {name}"))
            })
        };

        let name = attr("name")?.to_string();
        let seat = attr("seat")?
            .trim()
            .parse::<u32>()
            .map_err(|e| HandError::malformed(format!("hand {hand_id}: bad seat: {e}")))?;

        if !names.insert(name.clone()) {
            return Err(HandError::malformed(format!("hand {hand_id}: duplicate player {name}")));
        }
        if !seats.insert(seat) {
            return Err(HandError::malformed(format!("hand {hand_id}: duplicate seat {seat}")));
        }

        players.push(SeatedPlayer {
            seat,
            bet: parse_money(attr("bet")?)?,
            chips: parse_money(attr("chips")?)?,
            win: parse_money(attr("win")?)?,
            name,
        });
    }

    if players.is_empty() {
        return Err(HandError::malformed(format!("hand {hand_id}: empty player list")));
    }

    Ok(players)
}

fn parse_rounds(
    game: Node<'_, '_>,
    players: &[SeatedPlayer],
    hand_id: u64,
) -> Result<BTreeMap<u8, Vec<Action>>, HandError> {
    let mut rounds: BTreeMap<u8, Vec<Action>> = BTreeMap::new();

    for round in game.descendants().filter(|n| n.has_tag_name("round")) {
        let no = round
            .attribute("no")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .ok_or_else(|| HandError::malformed(format!("hand {hand_id}: round without number")))?;

        let actions = rounds.entry(no).or_default();
        for action in round.children().filter(|n| n.has_tag_name("action")) {
            let player = action.attribute("player").unwrap_or_default();
            if !players.iter().any(|p| p.name == player) {
                return Err(HandError::malformed(format!(
                    "hand {hand_id}: action by unseated player {player:?}"
                )));
            }
            let code = action
                .attribute("type")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .ok_or_else(|| HandError::malformed(format!("hand {hand_id}: bad action type")))?;

            actions.push(Action {
                player: player.to_string(),
                code: ActionCode(code),
            });
        }
    }

    Ok(rounds)
}

fn find<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.descendants().find(|n| n.has_tag_name(tag))
}

fn text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    find(node, tag)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn required_text<'a>(node: Node<'a, '_>, tag: &str, hand_id: u64) -> Result<&'a str, HandError> {
    text(node, tag).ok_or_else(|| HandError::malformed(format!("hand {hand_id}: missing {tag}")))
}
