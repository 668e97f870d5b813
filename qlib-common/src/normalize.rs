//! Question text and response-scale normalization
//!
//! Pure functions producing the comparison forms used to decide question
//! identity:
//!
//! - [`normalize_text`]: soft form kept for display (case preserved). Removes
//!   source variable prefixes (`"F12a.: "`) and a leading year-list prefix.
//! - [`core_text`]: soft form with boilerplate lead-in phrases removed and
//!   time-period phrasing canonicalized. The textual half of a cluster key.
//! - [`match_text`]: lower-cased core text.
//! - [`normalize_alternatives`]: order-independent comparison form of a
//!   response scale.
//!
//! Every function is idempotent: each text pipeline is applied until its
//! output stops changing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::years::strip_year_prefix;

/// Separator used when a normalized scale is flattened to a single key
pub const ALTERNATIVES_SEPARATOR: &str = "|";

static LEADING_VARIABLE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z]+\d+[a-z]*[.:]{1,2}\s*").unwrap());

static EMBEDDED_VARIABLE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[a-z]+\d+[a-z]*[.:]{1,2}\s*").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// "12 månaderna", "månader" -> "mån"
static MONTHS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bmånader(?:na)?\b").unwrap());

/// Opinion-prompt and frequency lead-ins that carry no question identity.
/// Most specific first.
static BOILERPLATE_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^åsikt om förslag i den politiska debatten\s*[-–—]\s*",
        r"(?i)^åsikt om förslag i utrikesdebatten\s*[-–—]\s*",
        r"(?i)^åsikt om förslag\s*[-–—]\s*",
        r"(?i)^vilken är din åsikt\?\s*",
        r"(?i)^din åsikt:\s*",
        r"(?i)^din åsikt om:\s*",
        r"(?i)^åsikt om:\s*",
        r"(?i)^hur ofta under de senaste 12\s*[-:]\s*",
        r"(?i)^hur ofta under de senaste 12\s+mån\??\s*[-:]\s*",
        r"(?i)^de senaste 12 mån(?:aderna)?:\s*",
        r"(?i)^om:\s*",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Wording variants known to denote the same item: (trigger phrase, removable suffix)
static SUFFIX_EQUIVALENCES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![(
        "minska inkomstskillnaderna",
        Regex::new(r"(?i)\s+i\s+samhället\s*$").unwrap(),
    )]
});

/// Response labels that only record non-response
const PLACEHOLDER_PREFIXES: &[&str] = &["ej svar -", "ej svar –", "ej svar —"];

/// Known literal misspellings in response labels
const ALTERNATIVE_TYPOS: &[(&str, &str)] = &[("föslag", "förslag")];

fn to_fixpoint<F>(text: &str, step: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut current = text.to_string();
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Collapse internal whitespace runs to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn soft_pass(text: &str) -> String {
    let text = LEADING_VARIABLE_PREFIX_RE.replace(text.trim(), "");
    let text = EMBEDDED_VARIABLE_PREFIX_RE.replace_all(text.trim(), "");
    let text = strip_year_prefix(&text);
    collapse_whitespace(text)
}

fn core_pass(text: &str) -> String {
    let mut text = soft_pass(text);

    for prefix in BOILERPLATE_PREFIXES.iter() {
        text = prefix.replace(&text, "").trim().to_string();
    }

    text = MONTHS_RE.replace_all(&text, "mån").into_owned();

    let lowered = text.to_lowercase();
    for (trigger, suffix) in SUFFIX_EQUIVALENCES.iter() {
        if lowered.contains(trigger) {
            text = suffix.replace(&text, "").into_owned();
        }
    }

    collapse_whitespace(&text)
}

/// Soft-normalize question text for storage and display.
///
/// ```
/// use qlib_common::normalize::normalize_text;
///
/// assert_eq!(normalize_text("F77a.:  Hur ofta  läser du?"), "Hur ofta läser du?");
/// assert_eq!(normalize_text("1986, 1988-1990: Aktuellt"), "Aktuellt");
/// ```
pub fn normalize_text(raw: &str) -> String {
    to_fixpoint(raw, soft_pass)
}

/// Core question wording: soft form without boilerplate lead-ins.
///
/// ```
/// use qlib_common::normalize::core_text;
///
/// assert_eq!(
///     core_text("Åsikt om förslag i den politiska debatten - Minska inkomstskillnaderna i samhället"),
///     "Minska inkomstskillnaderna"
/// );
/// ```
pub fn core_text(raw: &str) -> String {
    to_fixpoint(raw, core_pass)
}

/// Lower-cased core text; the textual half of a cluster key.
pub fn match_text(raw: &str) -> String {
    core_text(raw).to_lowercase()
}

/// True when a response label only records non-response (`"Ej svar - ..."`).
pub fn is_placeholder_alternative(raw: &str) -> bool {
    let text = collapse_whitespace(&raw.to_lowercase());
    PLACEHOLDER_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

/// Normalize one response label. Placeholders normalize to an empty string,
/// which callers must filter out.
pub fn normalize_alternative(raw: &str) -> String {
    if is_placeholder_alternative(raw) {
        return String::new();
    }

    let mut text = collapse_whitespace(&raw.to_lowercase());
    for (typo, fixed) in ALTERNATIVE_TYPOS {
        text = text.replace(typo, fixed);
    }
    let text = MONTHS_RE.replace_all(&text, "mån");
    collapse_whitespace(&text)
}

/// Normalize a response scale: normalized, non-empty, unique, sorted.
///
/// Order of the input does not matter; extraction passes present the same
/// scale in different orders.
pub fn normalize_alternatives<S: AsRef<str>>(alternatives: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = alternatives
        .iter()
        .map(|alt| normalize_alternative(alt.as_ref()))
        .filter(|alt| !alt.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Single-string key of a normalized scale. Empty when nothing survives
/// normalization, which marks the scale as not matchable.
pub fn alternatives_key<S: AsRef<str>>(alternatives: &[S]) -> String {
    normalize_alternatives(alternatives).join(ALTERNATIVES_SEPARATOR)
}

/// Split worksheet pipe-separated alternatives, trimming and dropping blanks.
pub fn split_alternatives(text: &str) -> Vec<String> {
    text.split('|')
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ordered, de-duplicated display labels without non-response placeholders.
pub fn display_alternatives<S: AsRef<str>>(alternatives: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    alternatives
        .iter()
        .map(|alt| alt.as_ref().trim())
        .filter(|alt| !alt.is_empty() && !is_placeholder_alternative(alt))
        .filter(|alt| seen.insert(alt.to_string()))
        .map(str::to_string)
        .collect()
}

/// Natural ordering key for variable identifiers (`f2` before `f10`).
pub fn variable_sort_key(variable: &str) -> (String, u64, String) {
    static NATURAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-z]+)(\d+)(.*)$").unwrap());

    let lowered = variable.to_lowercase();
    match NATURAL_RE.captures(&lowered) {
        Some(caps) => (
            caps[1].to_string(),
            caps[2].parse().unwrap_or(u64::MAX),
            caps[3].to_string(),
        ),
        None => (lowered, 0, String::new()),
    }
}
