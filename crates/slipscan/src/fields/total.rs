//! Total amount detection.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

// Longer labels come first so "TOTAL DUE" is not cut short at "TOTAL".
// The leading word boundary keeps "SUBTOTAL" from matching. The amount may
// run straight into a currency code but not into a third decimal digit.
static TOTAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:total\s+due|amount\s+due|grand\s+total|total\s+paid|net\s+amount|balance|total|sum)\b\s*:?\s*[$€£¥]?\s*(\d{1,3}(?:,\d{3})+\.\d{2}|\d+\.\d{2})(?:\D|$)",
    )
    .unwrap()
});

/// Returns the first labelled total in the text.
pub fn find_total(text: &str) -> Option<Decimal> {
    let caps = TOTAL_PATTERN.captures(text)?;
    let digits = caps.get(1)?.as_str().replace(',', "");
    Decimal::from_str(&digits).ok()
}
