//! Year-range text codec
//!
//! Converts between a set of survey years and the compact notation used in
//! worksheets and catalog display text, e.g. `"1986, 1988-1990, 1994, 1995"`.
//!
//! Runs of consecutive years are written as `start-end` only when they cover
//! three or more years. A two-year run is written as two comma-separated years
//! so that a genuine two-year span reads differently from a longer range.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Ranges spanning more years than this are treated as malformed input
const MAX_RANGE_SPAN: i32 = 10_000;

/// Leading `"1986, 1988-1990: "` display prefix
static YEAR_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(?:-\d{4})?(?:,\s*\d{4}(?:-\d{4})?)*:\s*").unwrap());

/// Parse year-range text into a set of years.
///
/// Splits on commas; each part is either a single year or an inclusive
/// `start-end` range. Malformed parts are skipped, never fatal.
///
/// # Examples
///
/// ```
/// use qlib_common::years::parse_years;
///
/// let years = parse_years("1986, 1988-1990");
/// assert_eq!(years.into_iter().collect::<Vec<_>>(), vec![1986, 1988, 1989, 1990]);
///
/// assert!(parse_years("unknown").is_empty());
/// ```
pub fn parse_years(text: &str) -> BTreeSet<i32> {
    let mut years = BTreeSet::new();

    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        match part.split_once('-') {
            Some((start, end)) => {
                let (Ok(start), Ok(end)) = (start.trim().parse::<i32>(), end.trim().parse::<i32>())
                else {
                    tracing::debug!(part = %part, "Skipping malformed year range");
                    continue;
                };
                if end < start || end - start > MAX_RANGE_SPAN {
                    tracing::debug!(start, end, "Skipping implausible year range");
                    continue;
                }
                years.extend(start..=end);
            }
            None => match part.parse::<i32>() {
                Ok(year) => {
                    years.insert(year);
                }
                Err(_) => tracing::debug!(part = %part, "Skipping malformed year"),
            },
        }
    }

    years
}

/// Format a set of years as compact range text.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use qlib_common::years::format_years;
///
/// let years: BTreeSet<i32> = [1999, 2000, 2001].into_iter().collect();
/// assert_eq!(format_years(&years), "1999-2001");
///
/// let years: BTreeSet<i32> = [1999, 2001].into_iter().collect();
/// assert_eq!(format_years(&years), "1999, 2001");
///
/// let years: BTreeSet<i32> = [1986, 1988, 1989, 1990].into_iter().collect();
/// assert_eq!(format_years(&years), "1986, 1988-1990");
/// ```
pub fn format_years(years: &BTreeSet<i32>) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut iter = years.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if next != end + 1 {
                break;
            }
            end = next;
            iter.next();
        }

        match end - start {
            0 => parts.push(start.to_string()),
            1 => {
                parts.push(start.to_string());
                parts.push(end.to_string());
            }
            _ => parts.push(format!("{}-{}", start, end)),
        }
    }

    parts.join(", ")
}

/// Convenience wrapper for any iterator of years
pub fn format_year_list<I: IntoIterator<Item = i32>>(years: I) -> String {
    format_years(&years.into_iter().collect())
}

/// Remove a leading year-list display prefix (`"2005, 2007: text"` -> `"text"`).
pub fn strip_year_prefix(text: &str) -> &str {
    match YEAR_PREFIX_RE.find(text) {
        Some(m) => text[m.end()..].trim(),
        None => text.trim(),
    }
}

/// Prefix `text` with its formatted years; unchanged when either is empty.
///
/// ```
/// use std::collections::BTreeSet;
/// use qlib_common::years::with_year_prefix;
///
/// let years: BTreeSet<i32> = [1986, 1988, 1989, 1990].into_iter().collect();
/// assert_eq!(with_year_prefix("aktuellt", &years), "1986, 1988-1990: aktuellt");
/// ```
pub fn with_year_prefix(text: &str, years: &BTreeSet<i32>) -> String {
    if text.is_empty() || years.is_empty() {
        return text.to_string();
    }
    format!("{}: {}", format_years(years), text)
}
