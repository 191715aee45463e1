//! Lossless conversion between XEC, satoshis and nanosatoshis.
//!
//! All conversions work on decimal strings and integers. Balance conversions
//! (`to_satoshis`, `to_xec`) are exact and reject anything that would lose
//! precision; the nanosatoshi price conversion rounds to the nearest unit.

use crate::constants::{NANOSAT_DECIMALS, SATOSHIS_PER_XEC, XEC_DECIMALS};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount specified at greater precision than {0} decimal places")]
    Precision(String),

    #[error("result not an integer: {0}")]
    NotInteger(String),

    #[error("invalid amount: {0}")]
    InvalidInput(String),

    #[error("amount out of range: {0}")]
    Overflow(String),
}

/// Split a non-negative decimal string into its integer and fractional digits.
///
/// Accepts `123`, `123.45`, `.45` and `123.`; rejects signs, exponents,
/// whitespace, multiple points and strings without any digit.
pub(crate) fn split_decimal(amount: &str) -> Result<(&str, &str), AmountError> {
    let (int, frac) = match amount.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (amount, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int) || !all_digits(frac) || (int.is_empty() && frac.is_empty()) {
        return Err(AmountError::InvalidInput(format!(
            "\"{}\" must contain only digits and at most one decimal point",
            amount
        )));
    }
    Ok((int, frac))
}

/// Shift a decimal string `places` digits to the left of the point and parse it.
///
/// Fails with `NotInteger` if the fractional part has more significant digits
/// than `places`.
fn scale_exact(amount: &str, places: usize) -> Result<u64, AmountError> {
    let (int, frac) = split_decimal(amount)?;
    let frac = frac.trim_end_matches('0');
    if frac.len() > places {
        return Err(AmountError::NotInteger(format!(
            "{} has more than {} decimal places",
            amount, places
        )));
    }
    let digits = format!("{}{}{}", int, frac, "0".repeat(places - frac.len()));
    parse_u64(&digits)
}

/// Render an integer as a decimal string with `places` implied decimals,
/// dropping trailing fractional zeros.
fn unscale(value: u64, places: usize) -> String {
    let scale = 10u64.pow(places as u32);
    let int = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return int.to_string();
    }
    let frac = format!("{:0width$}", frac, width = places);
    format!("{}.{}", int, frac.trim_end_matches('0'))
}

fn parse_u64(digits: &str) -> Result<u64, AmountError> {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| AmountError::Overflow(digits.to_string()))
}

/// Convert an XEC amount to satoshis.
///
/// The amount may have at most two significant decimal places.
pub fn to_satoshis(xec_amount: &str) -> Result<u64, AmountError> {
    scale_exact(xec_amount.trim(), XEC_DECIMALS)
}

/// Convert satoshis to an XEC amount string.
pub fn to_xec(satoshis: u64) -> String {
    unscale(satoshis, XEC_DECIMALS)
}

/// Convert nanosatoshis to an XEC amount string.
pub fn nano_satoshis_to_xec(nanosats: u64) -> String {
    unscale(nanosats, NANOSAT_DECIMALS)
}

/// Convert an XEC price to nanosatoshis, rounding half up to the nearest unit.
///
/// Prices may be far below one XEC, so over-precise inputs are accepted.
pub fn xec_to_nano_satoshis(xec_amount: &str) -> Result<u64, AmountError> {
    let xec_amount = xec_amount.trim();
    let (int, frac) = split_decimal(xec_amount)?;
    if frac.len() <= NANOSAT_DECIMALS {
        return scale_exact(xec_amount, NANOSAT_DECIMALS);
    }
    let (kept, dropped) = frac.split_at(NANOSAT_DECIMALS);
    let truncated = parse_u64(&format!("{}{}", int, kept))?;
    let round_up = dropped.as_bytes()[0] >= b'5';
    if round_up {
        truncated
            .checked_add(1)
            .ok_or_else(|| AmountError::Overflow(xec_amount.to_string()))
    } else {
        Ok(truncated)
    }
}

/// Convert a fiat amount to satoshis at `fiat_price` (fiat per XEC), rounding down.
pub fn fiat_to_satoshis(fiat_amount: f64, fiat_price: f64) -> Result<u64, AmountError> {
    if !fiat_amount.is_finite() || fiat_amount < 0.0 {
        return Err(AmountError::InvalidInput(format!("fiat amount {}", fiat_amount)));
    }
    if !fiat_price.is_finite() || fiat_price <= 0.0 {
        return Err(AmountError::InvalidInput(format!("fiat price {}", fiat_price)));
    }
    let sats = ((fiat_amount / fiat_price) * SATOSHIS_PER_XEC as f64).floor();
    if sats > u64::MAX as f64 {
        return Err(AmountError::Overflow(format!("{} sats", sats)));
    }
    Ok(sats as u64)
}
