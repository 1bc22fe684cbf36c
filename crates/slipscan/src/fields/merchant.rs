//! Merchant name detection.

use once_cell::sync::Lazy;
use regex::Regex;

/// Words that usually follow the merchant's name on a receipt header,
/// in the order they are tried.
pub const MERCHANT_KEYWORDS: &[&str] = &[
    "Receipt",
    "Invoice",
    "Bill",
    "Store",
    "Shop",
    "Market",
    "Restaurant",
    "Cafe",
    "Bar",
];

static KEYWORD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    MERCHANT_KEYWORDS
        .iter()
        .map(|k| Regex::new(&format!("(?i){}", regex::escape(k))).unwrap())
        .collect()
});

/// Returns the text just before the first keyword hit, or the first
/// non-empty line when no keyword yields a name.
pub fn find_merchant(text: &str) -> Option<String> {
    KEYWORD_PATTERNS
        .iter()
        .find_map(|pattern| {
            let hit = pattern.find(text)?;
            preceding_line(&text[..hit.start()])
        })
        .or_else(|| first_line(text))
}

/// Nearest non-blank line ending at the keyword, trimmed.
fn preceding_line(prefix: &str) -> Option<String> {
    let prefix = prefix.trim_end();
    let line = prefix.rsplit('\n').next().unwrap_or(prefix).trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
