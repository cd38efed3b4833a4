//! # Amount Conversion
//!
//! Users type amounts in display units ("12.5"); the vault only ever sees
//! `u64` micro-units. Conversion floors to the micro-unit and enforces the
//! deposit bounds from [`crate::config`].
//!
//! Plain decimal text is converted digit by digit so that `"0.000001"`
//! really is one micro-unit and not `0.999…` after a float multiply.
//! Anything else a float parser understands (`"1e3"`, `"-2"`, `"NaN"`) goes
//! through `f64` and is bounds-checked the same way.

use thiserror::Error;

use crate::config::{MAX_DEPOSIT_MICRO, MICRO_UNITS_PER_UNIT, MIN_DEPOSIT_MICRO, UNIT_DECIMALS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Not a number, not finite, or not strictly positive.
    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("amount too small: minimum is 0.000001")]
    TooSmall,

    #[error("amount too large: maximum is 1000000")]
    TooLarge,
}

/// Parses display-unit text into micro-units, `floor(amount × 1_000_000)`.
///
/// # Errors
///
/// [`AmountError::Invalid`] for unparseable or non-positive input,
/// [`AmountError::TooSmall`] below 0.000001, [`AmountError::TooLarge`]
/// above 1,000,000.
pub fn parse_display_amount(text: &str) -> Result<u64, AmountError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Invalid("empty input".into()));
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    match split_decimal(unsigned) {
        Some((int, frac)) => from_decimal_parts(int, frac),
        None => from_float_text(trimmed),
    }
}

/// Splits `"123.456"` / `"123"` / `".5"` into digit runs.
fn split_decimal(s: &str) -> Option<(&str, &str)> {
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !digits(int) || !digits(frac) {
        return None;
    }
    Some((int, frac))
}

fn from_decimal_parts(int: &str, frac: &str) -> Result<u64, AmountError> {
    let int = int.trim_start_matches('0');
    // Anything past seven integer digits is above the cap.
    if int.len() > 7 {
        return Err(AmountError::TooLarge);
    }
    let whole: u64 = if int.is_empty() {
        0
    } else {
        int.parse()
            .map_err(|_| AmountError::Invalid(int.to_string()))?
    };

    let (kept, rest) = frac.split_at(frac.len().min(UNIT_DECIMALS));
    let mut micro_frac: u64 = 0;
    for i in 0..UNIT_DECIMALS {
        let d = kept.as_bytes().get(i).map(|b| (b - b'0') as u64).unwrap_or(0);
        micro_frac = micro_frac * 10 + d;
    }
    let truncated_nonzero = rest.bytes().any(|b| b != b'0');

    if whole == 0 && micro_frac == 0 {
        return Err(if truncated_nonzero {
            AmountError::TooSmall
        } else {
            AmountError::Invalid("amount must be greater than zero".into())
        });
    }

    let max_whole = MAX_DEPOSIT_MICRO / MICRO_UNITS_PER_UNIT;
    if whole > max_whole || (whole == max_whole && (micro_frac > 0 || truncated_nonzero)) {
        return Err(AmountError::TooLarge);
    }

    Ok(whole * MICRO_UNITS_PER_UNIT + micro_frac)
}

fn from_float_text(text: &str) -> Result<u64, AmountError> {
    let value: f64 = text
        .parse()
        .map_err(|_| AmountError::Invalid(text.to_string()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AmountError::Invalid(text.to_string()));
    }

    let min = MIN_DEPOSIT_MICRO as f64 / MICRO_UNITS_PER_UNIT as f64;
    let max = MAX_DEPOSIT_MICRO as f64 / MICRO_UNITS_PER_UNIT as f64;
    if value < min {
        return Err(AmountError::TooSmall);
    }
    if value > max {
        return Err(AmountError::TooLarge);
    }

    let micro = (value * MICRO_UNITS_PER_UNIT as f64).floor() as u64;
    if micro < MIN_DEPOSIT_MICRO {
        return Err(AmountError::TooSmall);
    }
    Ok(micro)
}

/// Micro-units to display units, for UI arithmetic only.
pub fn to_display_units(micro: u64) -> f64 {
    micro as f64 / MICRO_UNITS_PER_UNIT as f64
}

/// Renders micro-units as display text without float noise: `1500000` →
/// `"1.5"`, `1` → `"0.000001"`.
pub fn format_micro(micro: u64) -> String {
    let whole = micro / MICRO_UNITS_PER_UNIT;
    let frac = micro % MICRO_UNITS_PER_UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = UNIT_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
