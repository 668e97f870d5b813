//! Question extraction from raw extracts
//!
//! Turns one year's [`RawExtract`] into stand-alone [`QuestionRecord`]s and
//! detected [`Battery`]s.
//!
//! **Algorithm:**
//! 1. Drop technical variables, repeated variables and junk labels
//!    (empty, `-`, ≤3 characters, institutional affiliation lines)
//! 2. Keep value labels outside the missing-code band, ordered by code
//! 3. Detect batteries; their siblings are consumed
//! 4. Remaining variables become stand-alone questions; very wide scales
//!    collapse to the open-question label

use crate::models::{Battery, QuestionRecord, RawExtract, RawVariable};
use crate::services::battery_detector::BatteryDetector;
use once_cell::sync::Lazy;
use qlib_common::config::ExtractionConfig;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

/// Labels this short carry no question wording
const MIN_LABEL_CHARS: usize = 4;

const AFFILIATION_MARKERS: &[&str] = &["universitet", "institut", "göteborgs"];

static ITEM_LEAD_IN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^om:\s*").unwrap());

/// Questions and batteries of one extract
#[derive(Debug, Clone, Default)]
pub struct ExtractedYear {
    pub year: i32,
    pub source: String,
    pub questions: Vec<QuestionRecord>,
    pub batteries: Vec<Battery>,
    /// Variables dropped before detection
    pub skipped: usize,
}

impl ExtractedYear {
    /// Stand-alone questions followed by flattened battery items
    pub fn all_records(&self) -> Vec<QuestionRecord> {
        let mut records = self.questions.clone();
        for battery in &self.batteries {
            records.extend(flatten_battery(battery));
        }
        records
    }
}

pub struct QuestionExtractor {
    config: ExtractionConfig,
    detector: BatteryDetector,
}

impl QuestionExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let detector = BatteryDetector::new(&config);
        Self { config, detector }
    }

    pub fn extract(&self, extract: &RawExtract) -> ExtractedYear {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut skipped = 0;

        for variable in &extract.variables {
            let name = variable.variable.trim();
            if name.is_empty()
                || self.config.is_skipped_variable(name)
                || !seen.insert(name.to_lowercase())
                || !is_question_label(&variable.label)
            {
                debug!(variable = %variable.variable, "Skipping variable");
                skipped += 1;
                continue;
            }
            candidates.push(QuestionRecord::new(
                name,
                variable.label.trim(),
                self.response_labels(variable),
                extract.year,
            ));
        }

        let detection = self.detector.detect(&candidates);

        let questions: Vec<QuestionRecord> = candidates
            .into_iter()
            .filter(|record| !detection.consumed.contains(&record.variable.to_lowercase()))
            .map(|mut record| {
                if record.alternatives.len() >= self.config.open_question_threshold {
                    record = QuestionRecord::new(
                        record.variable,
                        record.raw_text,
                        vec![self.config.open_question_label.clone()],
                        record.year,
                    );
                }
                record
            })
            .collect();

        info!(
            year = extract.year,
            source = %extract.source,
            questions = questions.len(),
            batteries = detection.batteries.len(),
            skipped,
            "Extracted questions"
        );

        ExtractedYear {
            year: extract.year,
            source: extract.source.clone(),
            questions,
            batteries: detection.batteries,
            skipped,
        }
    }

    /// Non-missing value labels in code order
    fn response_labels(&self, variable: &RawVariable) -> Vec<String> {
        let mut labels: Vec<_> = variable
            .value_labels
            .iter()
            .filter(|value| {
                value
                    .integral_code()
                    .map_or(true, |code| !self.config.is_missing_code(code))
            })
            .filter(|value| !value.label.trim().is_empty())
            .collect();
        labels.sort_by(|a, b| a.code.total_cmp(&b.code));
        labels.into_iter().map(|value| value.label.trim().to_string()).collect()
    }
}

/// True for labels that carry question wording
fn is_question_label(label: &str) -> bool {
    let label = label.trim();
    if label.is_empty() || label == "-" || label.chars().count() < MIN_LABEL_CHARS {
        return false;
    }
    let lowered = label.to_lowercase();
    let affiliation = lowered.contains(',') && AFFILIATION_MARKERS.iter().any(|m| lowered.contains(m));
    !affiliation
}

/// Display text combining a battery stem and one item
pub fn combine_stem_and_item(stem: &str, item: &str) -> String {
    let stem = stem.trim();
    if stem.is_empty() {
        return item.to_string();
    }
    if stem.ends_with([':', '-', '?']) {
        format!("{} {}", stem, item)
    } else {
        format!("{}: {}", stem, item)
    }
}

/// Flatten a battery into one question record per item.
pub fn flatten_battery(battery: &Battery) -> Vec<QuestionRecord> {
    battery
        .items()
        .filter_map(|(variable, item)| {
            let item = ITEM_LEAD_IN_RE.replace(item.trim(), "").trim().to_string();
            if item.is_empty() {
                return None;
            }
            let full_text = combine_stem_and_item(&battery.stem, &item);
            Some(QuestionRecord::battery_item(
                variable,
                item,
                battery.stem.clone(),
                full_text,
                battery.alternatives.clone(),
                battery.year,
            ))
        })
        .collect()
}
