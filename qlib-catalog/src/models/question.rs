//! Question records
//!
//! A [`QuestionRecord`] is one observed question instance from one year's
//! extract. Normalized fields are computed once at construction and are pure
//! functions of the raw text and alternatives.

use qlib_common::normalize::{alternatives_key, core_text, match_text, normalize_alternatives, normalize_text};
use serde::{Deserialize, Serialize};

/// Where a record came from within its extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    /// Stand-alone question variable
    Standalone,
    /// One item of a detected battery, flattened to question shape
    BatteryItem,
}

/// One observed question instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Source variable identifier (unique within one year/source only)
    pub variable: String,

    /// Label as extracted (battery items: the item label)
    pub raw_text: String,

    /// Soft-normalized matching text, case preserved
    pub normalized_text: String,

    /// Matching text with boilerplate lead-ins removed
    pub core_text: String,

    /// Original response labels in source order
    pub alternatives: Vec<String>,

    /// Sorted, de-duplicated comparison forms of `alternatives`
    pub normalized_alternatives: Vec<String>,

    pub year: i32,

    /// Battery items: stem of the owning battery
    pub parent_stem: Option<String>,

    /// Battery items: stem and item combined for display
    pub full_text: Option<String>,

    pub origin: QuestionOrigin,
}

impl QuestionRecord {
    /// Create a stand-alone question record
    pub fn new(variable: impl Into<String>, raw_text: impl Into<String>, alternatives: Vec<String>, year: i32) -> Self {
        let raw_text = raw_text.into();
        let normalized_text = normalize_text(&raw_text);
        let core = core_text(&raw_text);
        let normalized_alternatives = normalize_alternatives(&alternatives);

        Self {
            variable: variable.into(),
            raw_text,
            normalized_text,
            core_text: core,
            alternatives,
            normalized_alternatives,
            year,
            parent_stem: None,
            full_text: None,
            origin: QuestionOrigin::Standalone,
        }
    }

    /// Create a record for one battery item.
    ///
    /// The item is matched on its combined wording so identical item labels
    /// under different stems stay distinct.
    pub fn battery_item(
        variable: impl Into<String>,
        item: impl Into<String>,
        parent_stem: impl Into<String>,
        full_text: impl Into<String>,
        alternatives: Vec<String>,
        year: i32,
    ) -> Self {
        let full_text = full_text.into();
        let mut record = Self::new(variable, item, alternatives, year);
        record.normalized_text = normalize_text(&full_text);
        record.core_text = core_text(&full_text);
        record.parent_stem = Some(parent_stem.into());
        record.full_text = Some(full_text);
        record.origin = QuestionOrigin::BatteryItem;
        record
    }

    /// Lower-cased core text (textual half of the cluster key)
    pub fn match_text(&self) -> String {
        match_text(&self.core_text)
    }

    /// Flattened normalized scale (scale half of the cluster key)
    pub fn alternatives_key(&self) -> String {
        alternatives_key(&self.normalized_alternatives)
    }

    /// Text shown in catalogs: combined wording for battery items
    pub fn display_text(&self) -> &str {
        self.full_text.as_deref().unwrap_or(&self.normalized_text)
    }
}
