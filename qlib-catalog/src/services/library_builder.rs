//! Cross-year library build from raw extracts
//!
//! **Algorithm:**
//! 1. Extract each year's stand-alone questions and batteries
//! 2. Cluster all question records (battery items flattened) with the
//!    most-recent-year canonical policy; unmatchable records stay singletons
//! 3. Cluster batteries on stem, item list and scale
//! 4. Emit entries sorted case-insensitively by their year-prefixed text

use crate::models::{Anomaly, Library, LibraryBattery, LibraryQuestion, QuestionRecord, QuestionType, RawExtract, RunSummary};
use crate::services::cross_source_matcher::{cluster, group_batteries, CanonicalPolicy};
use crate::services::question_extractor::QuestionExtractor;
use chrono::Utc;
use qlib_common::config::ExtractionConfig;
use qlib_common::normalize::display_alternatives;
use qlib_common::years::with_year_prefix;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Library and run counts
#[derive(Debug, Clone)]
pub struct LibraryBuild {
    pub library: Library,
    pub summary: RunSummary,
}

pub struct LibraryBuilder {
    extractor: QuestionExtractor,
}

impl LibraryBuilder {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            extractor: QuestionExtractor::new(config),
        }
    }

    pub fn build(&self, extracts: &[RawExtract]) -> LibraryBuild {
        let mut records: Vec<QuestionRecord> = Vec::new();
        let mut batteries = Vec::new();
        let mut years = BTreeSet::new();
        let mut variables_loaded = 0;

        for extract in extracts {
            let extracted = self.extractor.extract(extract);
            records.extend(extracted.all_records());
            batteries.extend(extracted.batteries);
            years.insert(extract.year);
            variables_loaded += extract.variables.len();
        }

        let clusters = cluster(&records, CanonicalPolicy::MostRecentYear);

        let mut questions: Vec<LibraryQuestion> = clusters
            .clusters
            .iter()
            .map(|group| {
                let members: Vec<&QuestionRecord> = group.indices().map(|i| &records[i]).collect();
                library_question(&members)
            })
            .chain(
                clusters
                    .unmatchable
                    .iter()
                    .map(|&i| library_question(&[&records[i]])),
            )
            .collect();
        questions.sort_by_cached_key(|question| question.question_text.to_lowercase());

        let grouping = group_batteries(&batteries);
        let mut library_batteries: Vec<LibraryBattery> = grouping
            .batteries
            .iter()
            .map(|battery| LibraryBattery {
                question_text: with_year_prefix(&battery.stem, &battery.years),
                sub_items: battery.sub_items.clone(),
                response_alternatives: display_alternatives(&battery.alternatives),
                years: battery.variables.clone(),
                entry_type: "battery".to_string(),
            })
            .collect();
        library_batteries.sort_by_cached_key(|battery| battery.question_text.to_lowercase());

        let anomalies: Vec<Anomaly> = grouping.divergences;

        info!(
            extracts = extracts.len(),
            questions = questions.len(),
            batteries = library_batteries.len(),
            "Built library"
        );

        let summary = RunSummary {
            rows_loaded: variables_loaded,
            valid_rows: records.len(),
            clusters_found: clusters.groups().count(),
            rows_merged: clusters.clusters.iter().map(|group| group.members.len()).sum(),
            duplicates_removed: 0,
            unmatchable: clusters.unmatchable.len(),
            anomalies: anomalies.clone(),
        };

        let library = Library {
            generated_at: Utc::now().to_rfc3339(),
            years: years.into_iter().collect(),
            total_unique_questions: questions.len(),
            total_unique_batteries: library_batteries.len(),
            questions,
            batteries: library_batteries,
            anomalies,
        };

        LibraryBuild { library, summary }
    }
}

/// Entry for one cluster; `members[0]` is the canonical record
fn library_question(members: &[&QuestionRecord]) -> LibraryQuestion {
    let canonical = members[0];

    let mut years: BTreeMap<i32, String> = BTreeMap::new();
    for record in members {
        years.entry(record.year).or_insert_with(|| record.variable.clone());
    }
    let year_set: BTreeSet<i32> = years.keys().copied().collect();

    let core = if canonical.core_text.is_empty() {
        canonical.normalized_text.as_str()
    } else {
        canonical.core_text.as_str()
    };

    LibraryQuestion {
        question_text: with_year_prefix(core, &year_set),
        full_question_text: with_year_prefix(canonical.display_text(), &year_set),
        parent_question: canonical.parent_stem.clone(),
        response_alternatives: display_alternatives(&canonical.alternatives),
        question_type: if year_set.len() > 1 {
            QuestionType::CrossYear
        } else {
            QuestionType::SingleYear
        },
        years,
    }
}
