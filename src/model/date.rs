//! Genealogical dates with a precision tag.
//!
//! Records carry dates like `1850`, `1850-03`, `abt 1850`, `1850s` or
//! `bet 1850 and 1860`. Each parses into a [`FuzzyDate`] holding the
//! earliest and latest calendar day the text allows, plus the original
//! text so the date can be written back unchanged.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How precisely a date is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Exact,
    Month,
    Year,
    Decade,
    Estimated,
    Range,
}

/// A date with precision and calendar bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuzzyDate {
    pub precision: DatePrecision,
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
    /// Text as authored.
    pub text: String,
}

const ESTIMATE_PREFIXES: &[&str] = &[
    "about ", "abt. ", "abt ", "circa ", "ca. ", "ca ", "c. ", "est. ", "est ", "~",
];

impl FuzzyDate {
    /// Parse a date string. Returns `None` for anything unrecognised.
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }
        let lower = text.to_ascii_lowercase();

        for prefix in ESTIMATE_PREFIXES {
            if let Some(rest) = lower.strip_prefix(prefix) {
                let (earliest, latest, _) = parse_point(rest.trim())?;
                return Some(Self::new(DatePrecision::Estimated, earliest, latest, text));
            }
        }

        if let Some((from, to)) = split_range(&lower) {
            let (earliest, _, _) = parse_point(from.trim())?;
            let (_, latest, _) = parse_point(to.trim())?;
            if earliest > latest {
                return None;
            }
            return Some(Self::new(DatePrecision::Range, earliest, latest, text));
        }

        if let Some(decade) = lower.strip_suffix('s') {
            let year = parse_year(decade)?;
            if year % 10 != 0 {
                return None;
            }
            let earliest = NaiveDate::from_ymd_opt(year, 1, 1)?;
            let latest = NaiveDate::from_ymd_opt(year + 9, 12, 31)?;
            return Some(Self::new(DatePrecision::Decade, earliest, latest, text));
        }

        let (earliest, latest, precision) = parse_point(&lower)?;
        Some(Self::new(precision, earliest, latest, text))
    }

    fn new(precision: DatePrecision, earliest: NaiveDate, latest: NaiveDate, text: &str) -> Self {
        Self { precision, earliest, latest, text: text.to_owned() }
    }

    pub fn year(&self) -> i32 {
        self.earliest.year()
    }

    pub fn is_exact(&self) -> bool {
        self.precision == DatePrecision::Exact
    }

    /// True when the two dates cannot describe the same day.
    pub fn disjoint(&self, other: &FuzzyDate) -> bool {
        self.latest < other.earliest || other.latest < self.earliest
    }
}

impl fmt::Display for FuzzyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `1850..1860`, `bet 1850 and 1860`, `between 1850 and 1860`, `1850-1860`.
fn split_range(lower: &str) -> Option<(&str, &str)> {
    if let Some((a, b)) = lower.split_once("..") {
        return Some((a, b));
    }
    for prefix in ["bet. ", "bet ", "between "] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return rest.split_once(" and ");
        }
    }
    let (a, b) = lower.split_once('-')?;
    (a.len() == 4 && b.len() == 4 && parse_year(a).is_some() && parse_year(b).is_some())
        .then_some((a, b))
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD` → (earliest, latest, precision).
fn parse_point(s: &str) -> Option<(NaiveDate, NaiveDate, DatePrecision)> {
    let mut parts = s.split('-');
    let year = parse_year(parts.next()?)?;
    let month = parts.next();
    let day = parts.next();
    if parts.next().is_some() {
        return None;
    }

    match (month, day) {
        (None, _) => Some((
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
            DatePrecision::Year,
        )),
        (Some(m), None) => {
            let month: u32 = m.parse().ok()?;
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some((first, last_day_of_month(first)?, DatePrecision::Month))
        }
        (Some(m), Some(d)) => {
            let date = NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)?;
            Some((date, date, DatePrecision::Exact))
        }
    }
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if first.month() == 12 { (first.year() + 1, 1) } else { (first.year(), first.month() + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_precisions() {
        let exact = FuzzyDate::parse("1901-06-15").unwrap();
        assert_eq!(exact.precision, DatePrecision::Exact);
        assert_eq!(exact.earliest, exact.latest);

        let month = FuzzyDate::parse("1900-02").unwrap();
        assert_eq!(month.precision, DatePrecision::Month);
        assert_eq!(month.latest, ymd(1900, 2, 28));

        let year = FuzzyDate::parse("1850").unwrap();
        assert_eq!(year.precision, DatePrecision::Year);
        assert_eq!(year.latest, ymd(1850, 12, 31));

        let decade = FuzzyDate::parse("1850s").unwrap();
        assert_eq!(decade.precision, DatePrecision::Decade);
        assert_eq!(decade.latest, ymd(1859, 12, 31));

        let est = FuzzyDate::parse("abt 1850").unwrap();
        assert_eq!(est.precision, DatePrecision::Estimated);
        assert_eq!(est.year(), 1850);
        assert_eq!(FuzzyDate::parse("~1850-03").unwrap().precision, DatePrecision::Estimated);
    }

    #[test]
    fn test_ranges() {
        for text in ["1850..1860", "bet 1850 and 1860", "1850-1860"] {
            let d = FuzzyDate::parse(text).unwrap();
            assert_eq!(d.precision, DatePrecision::Range, "{text}");
            assert_eq!(d.earliest, ymd(1850, 1, 1));
            assert_eq!(d.latest, ymd(1860, 12, 31));
            assert_eq!(d.to_string(), text);
        }
        assert!(FuzzyDate::parse("1860..1850").is_none());
    }

    #[test]
    fn test_invalid() {
        for text in ["", "yesterday", "1850-13", "1850-02-30", "185", "1855s", "1850-01-01-01"] {
            assert!(FuzzyDate::parse(text).is_none(), "{text:?} should not parse");
        }
    }

    #[test]
    fn test_disjoint() {
        let a = FuzzyDate::parse("1850").unwrap();
        let b = FuzzyDate::parse("1850-06").unwrap();
        let c = FuzzyDate::parse("1851").unwrap();
        assert!(!a.disjoint(&b));
        assert!(a.disjoint(&c));
    }
}
