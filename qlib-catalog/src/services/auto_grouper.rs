//! Worksheet auto-grouping
//!
//! Writes `Auto:` annotations into the override column for rows whose
//! question text and response scale normalize identically. The manual part of
//! every annotation is preserved; the `Auto:` part is regenerated from scratch
//! on every run.
//!
//! **Algorithm:**
//! 1. Strip existing `Auto:` parts
//! 2. Exclude rows named in some manual annotation
//! 3. Cluster the remaining rows with the lowest-row-id canonical policy
//! 4. Annotate each canonical row with its members, skipping members that
//!    carry their own manual annotation or are already listed manually

use crate::models::{Anomaly, OverrideAnnotation, RowIndex, RunSummary, Worksheet};
use crate::services::cross_source_matcher::{cluster, CanonicalPolicy, Clusterable, MatchKey};
use qlib_common::normalize::{alternatives_key, match_text};
use std::collections::HashSet;
use tracing::{debug, info};

/// Auto-grouped worksheet and run counts
#[derive(Debug, Clone)]
pub struct AutoGrouping {
    pub worksheet: Worksheet,
    pub summary: RunSummary,
}

struct RowKey {
    position: usize,
    id: u64,
    key: MatchKey,
}

impl Clusterable for RowKey {
    fn match_key(&self) -> MatchKey {
        self.key.clone()
    }

    fn row_id(&self) -> Option<u64> {
        Some(self.id)
    }
}

/// Regenerate `Auto:` annotations for a worksheet.
pub fn auto_group(sheet: &Worksheet) -> AutoGrouping {
    let original: Vec<OverrideAnnotation> = sheet.rows.iter().map(|row| sheet.annotation(row)).collect();
    let mut annotations: Vec<OverrideAnnotation> = original.iter().map(OverrideAnnotation::without_auto).collect();

    let manual_sources: HashSet<u64> = annotations
        .iter()
        .flat_map(|annotation| annotation.manual_ids())
        .collect();

    let candidates: Vec<RowKey> = sheet
        .rows
        .iter()
        .enumerate()
        .filter_map(|(position, row)| {
            let id = sheet.row_id(row)?;
            if manual_sources.contains(&id) {
                return None;
            }
            Some(RowKey {
                position,
                id,
                key: MatchKey {
                    text: match_text(sheet.text(row)),
                    alternatives: alternatives_key(&sheet.alternatives(row)),
                },
            })
        })
        .collect();

    let clusters = cluster(&candidates, CanonicalPolicy::LowestRowId);

    let mut clusters_found = 0;
    let mut rows_grouped = 0;
    for group in clusters.groups() {
        let canonical = &candidates[group.canonical];
        let listed: HashSet<u64> = annotations[canonical.position].manual_ids().into_iter().collect();

        let mut sources: Vec<u64> = group
            .members
            .iter()
            .map(|&member| &candidates[member])
            .filter(|member| !annotations[member.position].has_manual())
            .map(|member| member.id)
            .filter(|id| *id != canonical.id && !listed.contains(id))
            .collect();
        sources.sort_unstable();
        sources.dedup();

        if sources.is_empty() {
            continue;
        }

        debug!(canonical = canonical.id, sources = ?sources, "Auto-grouped rows");
        clusters_found += 1;
        rows_grouped += sources.len();
        annotations[canonical.position].auto = sources;
    }

    let rows = sheet
        .rows
        .iter()
        .zip(annotations.iter().zip(&original))
        .map(|(row, (annotation, before))| {
            let mut row = row.clone();
            if annotation != before {
                sheet.set_annotation(&mut row, annotation);
            }
            row
        })
        .collect();

    let anomalies = RowIndex::build(sheet)
        .duplicate_ids()
        .into_iter()
        .map(|(id, occurrences)| Anomaly::DuplicateRowId { id, occurrences })
        .collect();

    let summary = RunSummary {
        rows_loaded: sheet.rows.len(),
        valid_rows: sheet.valid_row_count(),
        clusters_found,
        rows_merged: rows_grouped,
        duplicates_removed: 0,
        unmatchable: clusters.unmatchable.len(),
        anomalies,
    };

    info!(
        groups = clusters_found,
        rows = rows_grouped,
        excluded = manual_sources.len(),
        "Auto-grouping complete"
    );

    AutoGrouping {
        worksheet: sheet.with_rows(rows),
        summary,
    }
}
