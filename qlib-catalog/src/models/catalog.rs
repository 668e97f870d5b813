//! Catalog and library output models
//!
//! - [`Catalog`]: reconciled worksheet exported as JSON entries
//! - [`Library`]: cross-year question library built from raw extracts

use crate::models::Anomaly;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One merged worksheet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub question_id: u64,

    /// Text prefixed with the covered years (`"2001, 2005: ..."`)
    pub question_text: String,

    pub parent_question: Option<String>,
    pub item: Option<String>,

    /// Compact year text (`"1986, 1988-1990"`)
    pub years: String,
    pub years_list: Vec<i32>,
    pub num_years: usize,

    /// Ordered, de-duplicated display labels
    pub response_alternatives: Vec<String>,

    /// Identifiers merged into this entry, `None` when nothing was merged
    pub grouped_from: Option<Vec<u64>>,

    /// Year -> source variable
    pub variables: BTreeMap<i32, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub generated_at: String,
    pub total_questions: usize,
    pub questions: Vec<CatalogEntry>,
}

/// Whether a library question was observed in one or several years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    CrossYear,
    SingleYear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryQuestion {
    /// `"<years>: <core text>"`
    pub question_text: String,

    /// `"<years>: <display text>"`
    pub full_question_text: String,

    pub parent_question: Option<String>,
    pub response_alternatives: Vec<String>,

    /// Year -> source variable
    pub years: BTreeMap<i32, String>,

    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryBattery {
    /// `"<years>: <stem>"`
    pub question_text: String,
    pub sub_items: Vec<String>,
    pub response_alternatives: Vec<String>,

    /// Year -> variable root
    pub years: BTreeMap<i32, String>,

    /// Always `"battery"`
    #[serde(rename = "type")]
    pub entry_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Library {
    pub generated_at: String,
    pub years: Vec<i32>,
    pub total_unique_questions: usize,
    pub total_unique_batteries: usize,
    pub questions: Vec<LibraryQuestion>,
    pub batteries: Vec<LibraryBattery>,
    pub anomalies: Vec<Anomaly>,
}
