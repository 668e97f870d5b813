//! Catalog export from a reconciled worksheet

use crate::models::{Catalog, CatalogEntry, Worksheet, WorksheetRow};
use crate::services::grouping_reconciler::Reconciliation;
use chrono::Utc;
use qlib_common::normalize::{display_alternatives, normalize_text};
use qlib_common::years::{format_years, with_year_prefix};
use tracing::info;

/// Build catalog entries, one per remaining row with a valid identifier,
/// sorted by identifier. Entry text drops variable and year prefixes and is
/// re-prefixed with the row's merged years.
pub fn build_catalog(reconciliation: &Reconciliation) -> Catalog {
    let sheet = &reconciliation.worksheet;

    let mut questions: Vec<CatalogEntry> = sheet
        .rows
        .iter()
        .filter_map(|row| {
            let id = sheet.row_id(row)?;
            Some(catalog_entry(sheet, row, id, reconciliation))
        })
        .collect();
    questions.sort_by_key(|entry| entry.question_id);

    info!(entries = questions.len(), "Built catalog");

    Catalog {
        generated_at: Utc::now().to_rfc3339(),
        total_questions: questions.len(),
        questions,
    }
}

fn catalog_entry(sheet: &Worksheet, row: &WorksheetRow, id: u64, reconciliation: &Reconciliation) -> CatalogEntry {
    let years = sheet.years(row);
    let merge = reconciliation.merge_for(id);

    let variables = match merge {
        Some(merge) if !merge.variables.is_empty() => merge.variables.clone(),
        _ => sheet.variables_by_year(row),
    };

    CatalogEntry {
        question_id: id,
        question_text: with_year_prefix(&normalize_text(sheet.text(row)), &years),
        parent_question: non_empty(sheet.parent(row)),
        item: non_empty(sheet.item(row)),
        years: format_years(&years),
        years_list: years.iter().copied().collect(),
        num_years: years.len(),
        response_alternatives: display_alternatives(&sheet.alternatives(row)),
        grouped_from: merge.map(|merge| merge.sources.clone()),
        variables,
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
