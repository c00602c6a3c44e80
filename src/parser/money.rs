//! Locale-formatted money strings.
//!
//! Hand histories write amounts as `€1.234,56`: optional currency glyph,
//! `.` as thousands separator and `,` as decimal separator. Every amount
//! the engine reads goes through [`parse_money`].

use crate::error::HandError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Convert a locale-formatted amount to a canonical decimal.
///
/// Strips any currency glyph around the number, drops `.` thousands
/// separators and turns the `,` decimal separator into `.`.
pub fn parse_money(raw: &str) -> Result<Decimal, HandError> {
    let body = raw
        .trim()
        .trim_matches(|c: char| !(c.is_ascii_digit() || c == '-'));

    if body.is_empty() {
        return Err(HandError::malformed(format!("empty amount: {raw:?}")));
    }

    let canonical = body.replace('.', "").replace(',', ".");
    Decimal::from_str(&canonical)
        .map_err(|e| HandError::malformed(format!("bad amount {raw:?}: {e}")))
}

/// Format an amount the way hand histories write it.
///
/// Inverse of [`parse_money`]: `format_money(1234.56, Some('€'))` gives
/// `€1.234,56`. The sign goes after the glyph.
#[cfg(test)]
pub fn format_money(amount: Decimal, glyph: Option<char>) -> String {
    let plain = amount.abs().normalize().to_string();
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (plain.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let mut out = String::new();
    if let Some(g) = glyph {
        out.push(g);
    }
    if amount.is_sign_negative() && !amount.is_zero() {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push(',');
        out.push_str(frac);
    }
    out
}
