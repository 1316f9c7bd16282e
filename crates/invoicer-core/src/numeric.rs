//! Currency and number formatting for invoices.
//!
//! Amounts use Indian digit grouping (3 digits, then groups of 2: `12,34,567`) and are never
//! rounded: the fractional digits are those of the shortest representation that round-trips
//! back to the same `f64`, padded to at least two places.

use crate::error::{Error, Result};

/// Currency glyph prefixed by [`format_currency`].
pub const CURRENCY_SYMBOL: &str = "₹";

/// Default GST rate, in percent.
pub const GST_RATE: f64 = 18.0;

/// Gujarati digits, indexed by their Latin value.
const TARGET_DIGITS: [char; 10] = ['૦', '૧', '૨', '૩', '૪', '૫', '૬', '૭', '૮', '૯'];

/// Minimum number of fractional digits shown for amounts (paise).
const MIN_FRACTION_DIGITS: usize = 2;

fn ensure_finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidNumber(format!("{value} is not a finite number")))
    }
}

/// Group an ASCII digit string using the 3-2-2 convention.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::with_capacity(head.len() / 2 + 2);
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    groups.push(tail);
    groups.join(",")
}

/// Format the absolute value of `amount` with grouping and at least two decimals.
fn format_magnitude(amount: f64) -> String {
    // f64 Display never uses exponent notation and is the shortest round-trip form
    let repr = format!("{}", amount.abs());
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut out = group_indian(int_part);
    out.push('.');
    out.push_str(frac_part);
    for _ in frac_part.len()..MIN_FRACTION_DIGITS {
        out.push('0');
    }
    out
}

const fn is_negative(amount: f64) -> bool {
    amount < 0.0
}

/// Format an amount with grouping but without the currency glyph: `1,64,983.50`.
pub fn format_amount(amount: f64) -> Result<String> {
    let amount = ensure_finite(amount)?;
    let sign = if is_negative(amount) { "-" } else { "" };
    Ok(format!("{sign}{}", format_magnitude(amount)))
}

/// Format an amount as currency: `₹1,64,983.50`, `-₹250.00`.
pub fn format_currency(amount: f64) -> Result<String> {
    let amount = ensure_finite(amount)?;
    let sign = if is_negative(amount) { "-" } else { "" };
    Ok(format!("{sign}{CURRENCY_SYMBOL}{}", format_magnitude(amount)))
}

/// Parse a number produced by [`format_currency`] or [`format_amount`].
///
/// Accepts the currency glyph, grouping commas, surrounding whitespace and target-script digits.
pub fn parse_formatted_number(text: &str) -> Result<f64> {
    let latin = from_target_script_digits(text);
    let cleaned: String = latin
        .trim()
        .replace(CURRENCY_SYMBOL, "")
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(Error::InvalidNumber(format!("{text:?} contains no number")));
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|e| Error::InvalidNumber(format!("{text:?}: {e}")))?;
    ensure_finite(value)
}

/// GST on `base` at `rate_percent` (18 means 18%, not 0.18).
pub fn compute_tax(base: f64, rate_percent: f64) -> f64 {
    base * rate_percent / 100.0
}

/// Replace every Latin digit with its target-script glyph. Other characters pass through.
pub fn to_target_script_digits(text: &str) -> String {
    text.chars()
        .map(|c| {
            c.to_digit(10)
                .filter(|_| c.is_ascii_digit())
                .and_then(|d| TARGET_DIGITS.get(d as usize).copied())
                .unwrap_or(c)
        })
        .collect()
}

/// Inverse of [`to_target_script_digits`].
pub fn from_target_script_digits(text: &str) -> String {
    text.chars()
        .map(|c| {
            TARGET_DIGITS
                .iter()
                .position(|&d| d == c)
                .and_then(|i| char::from_digit(u32::try_from(i).unwrap_or(0), 10))
                .unwrap_or(c)
        })
        .collect()
}

/// Render a number in target-script digits.
pub fn number_to_target_script(value: f64) -> Result<String> {
    let value = ensure_finite(value)?;
    Ok(to_target_script_digits(&value.to_string()))
}

/// Number of decimals shown for quantities of `unit`.
///
/// Countable units are whole numbers; measured units (area, length, weight, volume) show two.
pub fn unit_decimals(unit: &str) -> usize {
    match unit.trim().to_lowercase().as_str() {
        "pcs" | "pc" | "nos" | "no" | "set" | "sets" | "box" | "boxes" | "unit" | "units"
        | "pair" | "pairs" | "job" | "visit" => 0,
        _ => 2,
    }
}

/// Format a quantity for display according to its unit.
///
/// Display only: item totals are always computed from the unrounded quantity.
pub fn format_quantity(quantity: f64, unit: &str) -> Result<String> {
    let quantity = ensure_finite(quantity)?;
    let decimals = match unit_decimals(unit) {
        0 if quantity.fract() != 0.0 => MIN_FRACTION_DIGITS,
        d => d,
    };

    let formatted = format!("{quantity:.decimals$}");
    if formatted.contains('.') {
        Ok(formatted.trim_end_matches('0').trim_end_matches('.').to_string())
    } else {
        Ok(formatted)
    }
}
