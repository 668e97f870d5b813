//! Battery detection
//!
//! Groups variable-level question records that share a naming root (`f12a`,
//! `f12b`, `f12c` share `f12`) into one multi-item [`Battery`] with a common
//! stem and per-item sub-labels.
//!
//! **Algorithm:**
//! 1. Group records by lower-cased variable root; roots with ≥2 siblings are candidates
//! 2. Order siblings by lower-cased variable identifier
//! 3. Split the siblings' soft-normalized texts into stem and sub-items
//!    (separator phrase at a shared offset, else longest common prefix)
//! 4. Pick the battery scale by plurality vote over the siblings' alternatives
//! 5. Record every sibling as consumed

use crate::models::{Battery, QuestionRecord};
use once_cell::sync::Lazy;
use qlib_common::config::ExtractionConfig;
use qlib_common::normalize::variable_sort_key;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Phrases ending a battery stem, tried in order
const STEM_SEPARATORS: &[&str] = &[" - ", ": ", ". ", "? ", " från ", " hos ", " om ", " gjort följande "];

static VARIABLE_ROOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([a-z]+\d+)[a-z]+").unwrap());

/// Result of one detection pass
#[derive(Debug, Clone, Default)]
pub struct BatteryDetection {
    pub batteries: Vec<Battery>,
    /// Lower-cased identifiers of every sibling variable
    pub consumed: HashSet<String>,
}

/// Lower-cased naming root of a variable; `None` without a trailing letter suffix.
///
/// ```
/// use qlib_catalog::services::battery_detector::variable_root;
///
/// assert_eq!(variable_root("F12a").as_deref(), Some("f12"));
/// assert_eq!(variable_root("f12"), None);
/// ```
pub fn variable_root(variable: &str) -> Option<String> {
    VARIABLE_ROOT_RE
        .captures(variable.trim())
        .map(|caps| caps[1].to_lowercase())
}

/// Detect batteries with default extraction settings
pub fn detect_batteries(records: &[QuestionRecord]) -> BatteryDetection {
    BatteryDetector::new(&ExtractionConfig::default()).detect(records)
}

/// Battery detector
pub struct BatteryDetector {
    open_question_threshold: usize,
    open_question_label: String,
}

impl BatteryDetector {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            open_question_threshold: config.open_question_threshold,
            open_question_label: config.open_question_label.clone(),
        }
    }

    /// Detect batteries among one extract's records.
    pub fn detect(&self, records: &[QuestionRecord]) -> BatteryDetection {
        let mut by_root: HashMap<String, Vec<&QuestionRecord>> = HashMap::new();
        for record in records {
            if let Some(root) = variable_root(&record.variable) {
                by_root.entry(root).or_default().push(record);
            }
        }

        let mut roots: Vec<String> = by_root
            .iter()
            .filter(|(_, siblings)| siblings.len() >= 2)
            .map(|(root, _)| root.clone())
            .collect();
        roots.sort_by_key(|root| variable_sort_key(root));

        let mut detection = BatteryDetection::default();
        for root in roots {
            let mut siblings = by_root.remove(&root).unwrap_or_default();
            siblings.sort_by_key(|record| record.variable.to_lowercase());

            let battery = self.build_battery(&root, &siblings);
            debug!(
                root = %root,
                siblings = siblings.len(),
                stem = %battery.stem,
                sub_items = battery.sub_items.len(),
                "Detected battery"
            );

            detection
                .consumed
                .extend(siblings.iter().map(|record| record.variable.to_lowercase()));
            detection.batteries.push(battery);
        }

        detection
    }

    fn build_battery(&self, root: &str, siblings: &[&QuestionRecord]) -> Battery {
        let texts: Vec<String> = siblings.iter().map(|record| record.normalized_text.clone()).collect();
        let (stem, items) = split_stem(&texts);

        let mut sub_items = Vec::new();
        let mut variables = Vec::new();
        for (record, item) in siblings.iter().zip(items) {
            if let Some(item) = item {
                sub_items.push(item);
                variables.push(record.variable.clone());
            }
        }

        Battery {
            stem,
            sub_items,
            alternatives: self.battery_scale(siblings),
            variable_root: root.to_string(),
            year: siblings.first().map(|record| record.year).unwrap_or_default(),
            variables,
        }
    }

    /// Plurality vote over exact alternative lists; ties go to the first seen
    fn battery_scale(&self, siblings: &[&QuestionRecord]) -> Vec<String> {
        let mut tally: Vec<(&Vec<String>, usize)> = Vec::new();
        for record in siblings {
            match tally.iter_mut().find(|(scale, _)| **scale == record.alternatives) {
                Some((_, count)) => *count += 1,
                None => tally.push((&record.alternatives, 1)),
            }
        }

        let mut best: Option<(&Vec<String>, usize)> = None;
        for (scale, count) in tally {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((scale, count));
            }
        }

        let scale = best.map(|(scale, _)| scale.clone()).unwrap_or_default();
        if scale.len() >= self.open_question_threshold {
            vec![self.open_question_label.clone()]
        } else {
            scale
        }
    }
}

/// Split sibling texts into a common stem and one sub-item per sibling.
///
/// Sub-items that come out empty are returned as `None` so callers can drop
/// them while keeping sibling alignment.
pub fn split_stem(texts: &[String]) -> (String, Vec<Option<String>>) {
    if texts.len() >= 3 {
        if let Some(split) = split_with_leading_sentence(texts) {
            return split;
        }
    }
    split_common(texts)
}

/// Lead item phrased as a full sentence while the rest share a separator pattern
fn split_with_leading_sentence(texts: &[String]) -> Option<(String, Vec<Option<String>>)> {
    let (first, rest) = texts.split_first()?;

    let patterns: Vec<&str> = STEM_SEPARATORS
        .iter()
        .copied()
        .filter(|sep| rest.iter().filter(|text| text.contains(sep)).count() >= 2)
        .collect();

    if patterns.is_empty() || patterns.iter().any(|sep| first.contains(sep)) {
        return None;
    }

    let (stem, rest_items) = split_common(rest);
    let mut items = Vec::with_capacity(texts.len());
    items.push(non_empty(first.trim()));
    items.extend(rest_items);
    Some((stem, items))
}

fn split_common(texts: &[String]) -> (String, Vec<Option<String>>) {
    let Some(first) = texts.first() else {
        return (String::new(), Vec::new());
    };

    // Separator at the same character offset in every text; the stem is
    // taken from the first text
    for sep in STEM_SEPARATORS {
        let Some(position) = first.find(sep) else {
            continue;
        };
        let offset = first[..position].chars().count();
        let cuts: Option<Vec<usize>> = texts
            .iter()
            .map(|text| {
                text.find(sep)
                    .filter(|&at| text[..at].chars().count() == offset)
                    .map(|at| at + sep.len())
            })
            .collect();
        if let Some(cuts) = cuts {
            let items = texts
                .iter()
                .zip(cuts)
                .map(|(text, cut)| non_empty(trim_item(&text[cut..])))
                .collect();
            return (first[..position + sep.len()].trim().to_string(), items);
        }
    }

    let cut = common_prefix_cut(texts);
    let stem = first[..cut].trim().to_string();
    let items = texts
        .iter()
        .map(|text| {
            let item = trim_item(&text[cut..]);
            // Text that is all stem stays whole
            if item.is_empty() {
                non_empty(text.trim())
            } else {
                Some(item.to_string())
            }
        })
        .collect();
    (stem, items)
}

/// Byte offset of the longest common prefix, moved back to a word start
fn common_prefix_cut(texts: &[String]) -> usize {
    let first = &texts[0];
    let mut cut = first.len();
    for text in &texts[1..] {
        let common = first
            .char_indices()
            .zip(text.chars())
            .find(|((_, a), b)| a != b)
            .map(|((index, _), _)| index)
            .unwrap_or_else(|| first.len().min(text.len()));
        cut = cut.min(common);
    }

    let prefix = &first[..cut];
    let ends_in_word = prefix.chars().last().map_or(false, |c| !c.is_whitespace());
    let continues_word = texts
        .iter()
        .any(|text| text[cut..].chars().next().map_or(false, |c| !c.is_whitespace()));

    if ends_in_word && continues_word {
        if let Some((index, space)) = prefix.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
            return index + space.len_utf8();
        }
    }
    cut
}

fn trim_item(text: &str) -> &str {
    text.trim_start_matches(|c: char| c == '-' || c == ':' || c.is_whitespace())
        .trim()
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
