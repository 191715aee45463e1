//! Decimal token amounts.
//!
//! Token quantities travel as strings at API boundaries. "Undecimalized"
//! strings are raw on-chain integers (atoms); "decimalized" strings carry a
//! decimal point at the token's fixed precision. Conversions between the two
//! are pure string operations so they are exact for any length, and any input
//! that would need truncation is rejected.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::constants::MAX_TOKEN_DECIMALS;
use crate::units::{split_decimal, AmountError};

/// Largest exponent accepted in scientific notation.
const MAX_SCI_EXPONENT: i64 = 1024;

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn check_decimals(decimals: u32) -> Result<usize, AmountError> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(AmountError::InvalidInput(format!(
            "decimals must be at most {}, got {}",
            MAX_TOKEN_DECIMALS, decimals
        )));
    }
    Ok(decimals as usize)
}

/// Split `1.5e3`-style notation into mantissa and exponent.
///
/// The mantissa is `\d*\.?\d+`, the exponent an optionally signed integer.
fn parse_sci(s: &str) -> Option<(&str, &str)> {
    let idx = s.find(['e', 'E'])?;
    let (mantissa, exponent) = (&s[..idx], &s[idx + 1..]);

    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => (int.is_empty() || is_digits(int)) && is_digits(frac),
        None => is_digits(mantissa),
    };
    let unsigned = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    if mantissa_ok && is_digits(unsigned) {
        Some((mantissa, exponent))
    } else {
        None
    }
}

/// Whether `s` is a non-negative number in scientific notation.
pub fn is_sci_notation(s: &str) -> bool {
    parse_sci(s).is_some()
}

/// Remove leading `'0'` characters, always keeping the final character.
///
/// `"000"` becomes `"0"` and `"0.5"` becomes `".5"`.
pub fn remove_leading_zeros(s: &str) -> &str {
    let Some(last) = s.len().checked_sub(1) else {
        return s;
    };
    let zeros = s.as_bytes()[..last].iter().take_while(|&&b| b == b'0').count();
    &s[zeros..]
}

/// Convert a scientific-notation string to a plain integer string.
///
/// Only integer results are supported: negative exponents, and exponents too
/// small to absorb the mantissa's decimal places, fail with `Precision`.
pub fn sci_to_decimal(s: &str) -> Result<String, AmountError> {
    let (mantissa, exponent) = parse_sci(s).ok_or_else(|| {
        AmountError::InvalidInput(format!("\"{}\" is not valid scientific notation", s))
    })?;

    let mut exponent: i64 = exponent
        .parse()
        .map_err(|_| AmountError::Overflow(format!("exponent of {}", s)))?;
    if exponent < 0 {
        return Err(AmountError::Precision(format!(
            "negative exponent in {} is not supported",
            s
        )));
    }

    let mantissa = remove_leading_zeros(mantissa);
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    exponent -= frac.len() as i64;
    if exponent < 0 {
        return Err(AmountError::Precision(format!("{} is not an integer", s)));
    }
    if exponent > MAX_SCI_EXPONENT {
        return Err(AmountError::Overflow(format!("exponent of {}", s)));
    }

    let digits = format!("{}{}", int, frac);
    if digits.bytes().all(|b| b == b'0') {
        return Ok("0".to_string());
    }
    let digits = remove_leading_zeros(&digits);
    Ok(format!("{}{}", digits, "0".repeat(exponent as usize)))
}

/// Insert a decimal point into an undecimalized token amount.
///
/// `decimalize_token_amount("10012345", 5) == "100.12345"` and
/// `decimalize_token_amount("100", 5) == "0.00100"`.
pub fn decimalize_token_amount(amount: &str, decimals: u32) -> Result<String, AmountError> {
    let normalized;
    let amount = if is_sci_notation(amount) {
        normalized = sci_to_decimal(amount)?;
        normalized.as_str()
    } else {
        amount
    };
    if !is_digits(amount) {
        return Err(AmountError::InvalidInput(format!(
            "\"{}\" must be a stringified integer",
            amount
        )));
    }
    let decimals = check_decimals(decimals)?;
    if decimals == 0 {
        return Ok(amount.to_string());
    }

    // Pad so there is always at least one digit before the point.
    let padded = if decimals >= amount.len() {
        format!("{}{}", "0".repeat(decimals - amount.len() + 1), amount)
    } else {
        amount.to_string()
    };
    let (before, after) = padded.split_at(padded.len() - decimals);
    Ok(format!("{}.{}", before, after))
}

/// Remove the decimal point from a decimalized token amount.
///
/// Fewer fractional digits than `decimals` are padded with zeros; more are a
/// `Precision` error. With zero decimals a trailing `"."` is tolerated.
pub fn undecimalize_token_amount(amount: &str, decimals: u32) -> Result<String, AmountError> {
    let (int, frac) = split_decimal(amount)?;
    let decimals = check_decimals(decimals)?;

    if decimals == 0 {
        if !frac.is_empty() {
            return Err(AmountError::Precision(
                "token has 0 decimals, but amount has a fractional part".to_string(),
            ));
        }
        if int.is_empty() {
            return Err(AmountError::InvalidInput(format!("\"{}\"", amount)));
        }
        return Ok(remove_leading_zeros(int).to_string());
    }

    if frac.len() > decimals {
        return Err(AmountError::Precision(format!(
            "{} specified at greater precision than {} decimals",
            amount, decimals
        )));
    }

    let digits = format!("{}{}{}", int, frac, "0".repeat(decimals - frac.len()));
    Ok(remove_leading_zeros(&digits).to_string())
}

/// Parse an undecimalized amount (plain or scientific notation) into atoms.
pub fn parse_token_atoms(amount: &str) -> Result<u64, AmountError> {
    let normalized;
    let amount = if is_sci_notation(amount) {
        normalized = sci_to_decimal(amount)?;
        normalized.as_str()
    } else {
        amount
    };
    if !is_digits(amount) {
        return Err(AmountError::InvalidInput(format!(
            "\"{}\" must be a stringified integer",
            amount
        )));
    }
    remove_leading_zeros(amount)
        .parse::<u64>()
        .map_err(|_| AmountError::Overflow(format!("{} atoms", amount)))
}

/// Compare two decimalized amounts exactly.
pub fn cmp_decimalized(a: &str, b: &str) -> Result<Ordering, AmountError> {
    let (a_int, a_frac) = split_decimal(a)?;
    let (b_int, b_frac) = split_decimal(b)?;

    let norm_int = |s: &str| {
        let t = s.trim_start_matches('0');
        if t.is_empty() { "0".to_string() } else { t.to_string() }
    };
    let (a_int, b_int) = (norm_int(a_int), norm_int(b_int));

    let width = a_frac.len().max(b_frac.len());
    let a_frac = format!("{:0<width$}", a_frac, width = width);
    let b_frac = format!("{:0<width$}", b_frac, width = width);

    Ok(a_int
        .len()
        .cmp(&b_int.len())
        .then_with(|| a_int.cmp(&b_int))
        .then_with(|| a_frac.cmp(&b_frac)))
}

/// Whether `balances` (token id to decimalized balance) holds at least `qty` of `token_id`.
///
/// A malformed balance counts as not enough.
pub fn has_enough_token(balances: &HashMap<String, String>, token_id: &str, qty: &str) -> bool {
    balances
        .get(token_id)
        .and_then(|balance| cmp_decimalized(balance, qty).ok())
        .map_or(false, |ord| ord != Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decimalize() {
        assert_eq!(decimalize_token_amount("10012345", 5).unwrap(), "100.12345");
        assert_eq!(decimalize_token_amount("100", 5).unwrap(), "0.00100");
        assert_eq!(decimalize_token_amount("1", 9).unwrap(), "0.000000001");
        assert_eq!(decimalize_token_amount("123", 3).unwrap(), "0.123");
        assert_eq!(decimalize_token_amount("0", 2).unwrap(), "0.00");
        assert_eq!(decimalize_token_amount("100", 0).unwrap(), "100");
    }

    #[test]
    fn test_decimalize_sci_notation() {
        assert_eq!(decimalize_token_amount("1.5e3", 2).unwrap(), "15.00");
        assert_eq!(decimalize_token_amount("1e18", 9).unwrap(), "1000000000.000000000");
    }

    #[test]
    fn test_decimalize_rejects_non_integers() {
        assert!(matches!(
            decimalize_token_amount("100.5", 2),
            Err(AmountError::InvalidInput(_))
        ));
        assert!(matches!(decimalize_token_amount("", 2), Err(AmountError::InvalidInput(_))));
        assert!(matches!(decimalize_token_amount("5e-1", 2), Err(AmountError::Precision(_))));
        assert!(decimalize_token_amount("100", 19).is_err());
    }

    #[test]
    fn test_undecimalize() {
        assert_eq!(undecimalize_token_amount("100.12345", 5).unwrap(), "10012345");
        assert_eq!(undecimalize_token_amount("0.00100", 5).unwrap(), "100");
        assert_eq!(undecimalize_token_amount("100.123", 9).unwrap(), "100123000000");
        assert_eq!(undecimalize_token_amount("100", 2).unwrap(), "10000");
        assert_eq!(undecimalize_token_amount(".5", 1).unwrap(), "5");
        assert_eq!(undecimalize_token_amount("0.00", 2).unwrap(), "0");
    }

    #[test]
    fn test_undecimalize_too_much_precision() {
        assert!(matches!(
            undecimalize_token_amount("100.12345", 3),
            Err(AmountError::Precision(_))
        ));
        assert!(matches!(
            undecimalize_token_amount("100.12300", 3),
            Err(AmountError::Precision(_))
        ));
    }

    #[test]
    fn test_undecimalize_zero_decimals() {
        assert_eq!(undecimalize_token_amount("100", 0).unwrap(), "100");
        assert_eq!(undecimalize_token_amount("100.", 0).unwrap(), "100");
        assert!(matches!(
            undecimalize_token_amount("100.0", 0),
            Err(AmountError::Precision(_))
        ));
        assert!(matches!(
            undecimalize_token_amount("1.5", 0),
            Err(AmountError::Precision(_))
        ));
    }

    #[test]
    fn test_undecimalize_rejects_garbage() {
        for bad in ["", ".", "1.2.3", "abc", "-1", "1e5"] {
            assert!(undecimalize_token_amount(bad, 2).is_err(), "{:?} accepted", bad);
        }
    }

    #[test]
    fn test_sci_to_decimal() {
        assert_eq!(sci_to_decimal("1.5e3").unwrap(), "1500");
        assert_eq!(sci_to_decimal("1E3").unwrap(), "1000");
        assert_eq!(sci_to_decimal("1e+2").unwrap(), "100");
        assert_eq!(sci_to_decimal("123e0").unwrap(), "123");
        assert_eq!(sci_to_decimal("0.5e1").unwrap(), "5");
        assert_eq!(sci_to_decimal("0e10").unwrap(), "0");
        assert_eq!(sci_to_decimal("1.23456789e8").unwrap(), "123456789");
    }

    #[test]
    fn test_sci_to_decimal_failures() {
        assert!(matches!(sci_to_decimal("5e-1"), Err(AmountError::Precision(_))));
        assert!(matches!(sci_to_decimal("1.55e1"), Err(AmountError::Precision(_))));
        assert!(matches!(sci_to_decimal("1e99999"), Err(AmountError::Overflow(_))));
        assert!(matches!(sci_to_decimal("12"), Err(AmountError::InvalidInput(_))));
        assert!(matches!(sci_to_decimal("1.e3"), Err(AmountError::InvalidInput(_))));
    }

    #[test]
    fn test_remove_leading_zeros() {
        assert_eq!(remove_leading_zeros("000123"), "123");
        assert_eq!(remove_leading_zeros("000"), "0");
        assert_eq!(remove_leading_zeros("0.5"), ".5");
        assert_eq!(remove_leading_zeros("100"), "100");
        assert_eq!(remove_leading_zeros(""), "");
    }

    #[test]
    fn test_parse_token_atoms() {
        assert_eq!(parse_token_atoms("10012345").unwrap(), 10_012_345);
        assert_eq!(parse_token_atoms("1e6").unwrap(), 1_000_000);
        assert_eq!(parse_token_atoms("18446744073709551615").unwrap(), u64::MAX);
        assert!(matches!(
            parse_token_atoms("18446744073709551616"),
            Err(AmountError::Overflow(_))
        ));
        assert!(parse_token_atoms("1.5").is_err());
    }

    #[test]
    fn test_cmp_decimalized() {
        assert_eq!(cmp_decimalized("1000", "1000.0").unwrap(), Ordering::Equal);
        assert_eq!(cmp_decimalized("999.999", "1000").unwrap(), Ordering::Less);
        assert_eq!(cmp_decimalized("0010.5", "10.49").unwrap(), Ordering::Greater);
        assert_eq!(cmp_decimalized(".1", "0.10").unwrap(), Ordering::Equal);
        assert!(cmp_decimalized("abc", "1").is_err());
    }

    #[test]
    fn test_has_enough_token() {
        let mut balances = HashMap::new();
        balances.insert("aa".to_string(), "1000.5".to_string());
        balances.insert("bb".to_string(), "999.999999999".to_string());
        assert!(has_enough_token(&balances, "aa", "1000"));
        assert!(has_enough_token(&balances, "aa", "1000.50"));
        assert!(!has_enough_token(&balances, "aa", "1000.51"));
        assert!(!has_enough_token(&balances, "bb", "1000"));
        assert!(!has_enough_token(&balances, "cc", "1"));
    }

    proptest! {
        #[test]
        fn test_decimalize_roundtrip(x in "0|[1-9][0-9]{0,30}", d in 0u32..=18) {
            let decimalized = decimalize_token_amount(&x, d).unwrap();
            prop_assert_eq!(undecimalize_token_amount(&decimalized, d).unwrap(), x);
        }

        #[test]
        fn test_cmp_matches_integer_order(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let da = decimalize_token_amount(&a.to_string(), 3).unwrap();
            let db = decimalize_token_amount(&b.to_string(), 3).unwrap();
            prop_assert_eq!(cmp_decimalized(&da, &db).unwrap(), a.cmp(&b));
        }
    }
}
