//! Purchase date detection.
//!
//! Rules are tried in order and the first one whose match parses into a real
//! calendar date wins. Only the first match of each rule is considered.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTH_NAMES: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

/// One entry of the ordered date rule list.
pub struct DateRule {
    pub name: &'static str,
    pub pattern: Regex,
    /// Capture group holding the date text.
    pub group: usize,
    pub parse: fn(&str) -> Option<NaiveDate>,
}

impl DateRule {
    fn new(
        name: &'static str,
        pattern: &str,
        group: usize,
        parse: fn(&str) -> Option<NaiveDate>,
    ) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            group,
            parse,
        }
    }

    /// Applies the rule to the first match in `text`.
    pub fn apply(&self, text: &str) -> Option<NaiveDate> {
        let caps = self.pattern.captures(text)?;
        let raw = caps.get(self.group)?.as_str();
        (self.parse)(raw)
    }
}

/// Date rules in priority order.
pub static DATE_RULES: Lazy<Vec<DateRule>> = Lazy::new(|| {
    vec![
        DateRule::new(
            "slash_four_digit_year",
            r"\b(\d{1,2}/\d{1,2}/\d{4})\b",
            1,
            parse_numeric,
        ),
        DateRule::new(
            "slash_two_digit_year",
            r"\b(\d{1,2}/\d{1,2}/\d{2})\b",
            1,
            parse_numeric,
        ),
        DateRule::new("iso_8601", r"\b(\d{4}-\d{2}-\d{2})\b", 1, parse_iso),
        DateRule::new(
            "dash_two_digit_year",
            r"\b(\d{1,2}-\d{1,2}-\d{2})\b",
            1,
            parse_numeric,
        ),
        DateRule::new(
            "month_name_first",
            &format!(
                r"(?i)\b((?:{})[a-z]*\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}})\b",
                MONTH_NAMES
            ),
            1,
            parse_month_first,
        ),
        DateRule::new(
            "day_ordinal_month",
            &format!(
                r"(?i)\b(\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?(?:{})[a-z]*\.?,?\s+\d{{4}})\b",
                MONTH_NAMES
            ),
            1,
            parse_day_first,
        ),
        DateRule::new(
            "time_then_date",
            r"(?i)\b(\d{1,2}:\d{2}(?::\d{2})?\s*(?:am|pm)?)\s+(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})\b",
            2,
            parse_numeric,
        ),
    ]
});

/// Returns the purchase date at midnight, if any rule matches.
pub fn find_purchase_date(text: &str) -> Option<NaiveDateTime> {
    DATE_RULES.iter().find_map(|rule| {
        let date = rule.apply(text)?;
        log::trace!("Date rule '{}' matched {}", rule.name, date);
        date.and_hms_opt(0, 0, 0)
    })
}

/// Parses `a/b/y` style dates, month-first and then day-first.
fn parse_numeric(raw: &str) -> Option<NaiveDate> {
    let normalized: String = raw
        .chars()
        .map(|c| if c == '.' || c == '-' { '/' } else { c })
        .collect();
    let year_len = normalized.rsplit('/').next()?.len();
    let (month_first, day_first) = match year_len {
        2 => ("%m/%d/%y", "%d/%m/%y"),
        4 => ("%m/%d/%Y", "%d/%m/%Y"),
        _ => return None,
    };

    NaiveDate::parse_from_str(&normalized, month_first)
        .or_else(|_| NaiveDate::parse_from_str(&normalized, day_first))
        .ok()
}

fn parse_iso(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_month_first(raw: &str) -> Option<NaiveDate> {
    let mut parts = tokens(raw);
    let month = month_number(parts.next()?)?;
    let day = day_number(parts.next()?)?;
    let year = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let mut parts = tokens(raw).filter(|t| !t.eq_ignore_ascii_case("of"));
    let day = day_number(parts.next()?)?;
    let month = month_number(parts.next()?)?;
    let year = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .filter(|t| !t.is_empty())
}

fn month_number(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?.to_ascii_lowercase();
    MONTH_NAMES
        .split('|')
        .position(|m| m == prefix)
        .map(|idx| idx as u32 + 1)
}

fn day_number(token: &str) -> Option<u32> {
    token
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}
