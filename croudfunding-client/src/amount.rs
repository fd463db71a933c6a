// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conversions between on-chain base units and the decimal strings shown to users.

use alloy_primitives::U256;
use thiserror::Error;

/// The number of fractional digits of one whole token.
pub const DECIMAL_PLACES: u8 = 18;

/// Below this many base units (`1e-4` tokens), amounts are shown in scientific notation.
const SCIENTIFIC_THRESHOLD: u64 = 100_000_000_000_000;

/// The number of mantissa digits shown after the point in scientific notation.
const MANTISSA_PLACES: usize = 6;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ParseAmountError {
    #[error("cannot parse amount")]
    Parse,
    #[error("cannot represent amount: number too high")]
    TooHigh,
    #[error("cannot represent amount: too many decimal places after the point")]
    TooManyDigits,
}

/// Parses an unsigned decimal number of tokens into base units.
///
/// A negative exponent suffix such as `1.500000e-5` is accepted, so that scientific
/// renderings of small amounts parse back.
pub fn to_base_units(src: &str) -> Result<U256, ParseAmountError> {
    let src = src.trim();
    let src = src.strip_prefix('+').unwrap_or(src);
    let (mantissa, exponent) = match src.find(|c: char| c == 'e' || c == 'E') {
        Some(index) => (&src[..index], negative_exponent(&src[index + 1..])?),
        None => (src, 0),
    };
    let places = DECIMAL_PLACES
        .checked_sub(exponent)
        .ok_or(ParseAmountError::TooManyDigits)?;

    let ten = U256::from(10u8);
    let mut result = U256::ZERO;
    let mut decimals: Option<u8> = None;
    let mut has_digits = false;
    for char in mantissa.chars() {
        match char {
            '_' => {}
            '.' if decimals.is_some() => return Err(ParseAmountError::Parse),
            '.' => decimals = Some(places),
            char => {
                let digit = char.to_digit(10).ok_or(ParseAmountError::Parse)?;
                has_digits = true;
                if let Some(d) = &mut decimals {
                    match d.checked_sub(1) {
                        Some(remaining) => *d = remaining,
                        // Trailing zeros past the last representable place are harmless.
                        None if digit == 0 => continue,
                        None => return Err(ParseAmountError::TooManyDigits),
                    }
                }
                result = result
                    .checked_mul(ten)
                    .and_then(|r| r.checked_add(U256::from(digit)))
                    .ok_or(ParseAmountError::TooHigh)?;
            }
        }
    }
    if !has_digits {
        return Err(ParseAmountError::Parse);
    }
    let scale = ten.pow(U256::from(decimals.unwrap_or(places)));
    result.checked_mul(scale).ok_or(ParseAmountError::TooHigh)
}

/// Parses the `-N` after an exponent marker. Positive exponents are not accepted.
fn negative_exponent(src: &str) -> Result<u8, ParseAmountError> {
    match src.strip_prefix('-') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().map_err(|_| ParseAmountError::TooManyDigits)
        }
        _ => Err(ParseAmountError::Parse),
    }
}

/// Renders base units as a decimal number of tokens.
///
/// Nonzero amounts below `1e-4` tokens use scientific notation with six mantissa digits
/// after the point, e.g. `1.500000e-5`. Other amounts are rendered exactly, without
/// trailing zeros.
pub fn to_decimal_string(amount: U256) -> String {
    if amount.is_zero() {
        return "0".to_owned();
    }
    if amount < U256::from(SCIENTIFIC_THRESHOLD) {
        return scientific(amount);
    }
    let places = DECIMAL_PLACES as usize;
    let min_digits = places + 1;
    let digits = format!("{:0>min_digits$}", amount.to_string());
    let (integer_part, fractional_part) = digits.split_at(digits.len() - places);
    let fractional_part = fractional_part.trim_end_matches('0');
    if fractional_part.is_empty() {
        integer_part.to_owned()
    } else {
        format!("{integer_part}.{fractional_part}")
    }
}

fn scientific(amount: U256) -> String {
    let digits = amount.to_string();
    // The amount is `0.d1d2d3... * 10^(digits.len() - 18)` tokens.
    let mut exponent = DECIMAL_PLACES as usize + 1 - digits.len();
    let shown = MANTISSA_PLACES + 1;
    let padded = format!("{digits:0<width$}", width = shown + 1);
    let (kept, rest) = padded.split_at(shown);
    let mut mantissa: u64 = kept.parse().unwrap_or_default();
    if rest.as_bytes()[0] >= b'5' {
        mantissa += 1;
    }
    let unit = 10u64.pow(MANTISSA_PLACES as u32);
    if mantissa == 10 * unit {
        mantissa = unit;
        exponent -= 1;
    }
    format!(
        "{}.{:0places$}e-{exponent}",
        mantissa / unit,
        mantissa % unit,
        places = MANTISSA_PLACES
    )
}

/// Renders a raw base-unit value received from outside the typed boundary, either in
/// decimal or as `0x`-prefixed hexadecimal. Missing or malformed input renders as `"0"`.
pub fn display_raw(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim) else {
        return "0".to_owned();
    };
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(raw, 10),
    };
    match parsed {
        Ok(amount) => to_decimal_string(amount),
        Err(error) => {
            tracing::warn!(%raw, %error, "cannot display malformed amount");
            "0".to_owned()
        }
    }
}

/// Returns how much of `target` is covered by `current`, in percent, within `[0, 100]`.
pub fn percentage(current: U256, target: U256) -> f64 {
    if target.is_zero() {
        return 0.0;
    }
    if current >= target {
        return 100.0;
    }
    // Percent with six decimal places, computed in integers.
    let scale = U256::from(100_000_000u64);
    let (current, target) = match current.checked_mul(scale) {
        Some(_) => (current, target),
        None => (current >> 64, target >> 64),
    };
    let scaled = current.saturating_mul(scale) / target;
    let scaled = u64::try_from(scaled).unwrap_or(100_000_000);
    scaled as f64 / 1_000_000.0
}

/// Renders `"<current> / <target>"` in tokens.
pub fn progress_text(current: U256, target: U256) -> String {
    format!(
        "{} / {}",
        to_decimal_string(current),
        to_decimal_string(target)
    )
}
