//! Grouping reconciliation
//!
//! Applies the override column of a review worksheet: every row listing
//! other row identifiers becomes the canonical row of a group, receives the
//! union of the group's years, and the listed rows are removed. A duplicate
//! pass then folds remaining rows with identical content.
//!
//! **Algorithm:**
//! 1. Single ownership pass in row order: each listed identifier is claimed
//!    by the first row naming it. Self references, unknown identifiers,
//!    repeated claims and claims closing a cycle are rejected and reported
//! 2. Claimed rows that list identifiers themselves form chains; their
//!    years flow up to the root canonical row
//! 3. Root rows get the year union and an empty override cell, so a second
//!    pass is a no-op; claimed rows are dropped
//! 4. Duplicate pass: rows with equal normalized text, parent, item and
//!    scale collapse into the lowest identifier
//!
//! Input worksheets are never modified; each phase returns a new one.

use crate::models::{Anomaly, OverrideAnnotation, RowIndex, RunSummary, Worksheet};
use qlib_common::normalize::{alternatives_key, normalize_text};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// One canonical row and everything folded into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRecord {
    pub canonical_id: u64,
    /// Identifiers removed in favor of the canonical row
    pub sources: Vec<u64>,
    /// Year union written to the canonical row
    pub years: BTreeSet<i32>,
    /// Year -> variable over canonical and source rows
    pub variables: BTreeMap<i32, String>,
}

impl MergeRecord {
    fn add_source(&mut self, id: u64) {
        if id != self.canonical_id && !self.sources.contains(&id) {
            self.sources.push(id);
        }
    }

    /// Fold another canonical row's record into this one
    fn absorb(&mut self, other: MergeRecord) {
        self.add_source(other.canonical_id);
        self.absorb_sources_of(other);
    }

    /// Fold a record for the same canonical row
    fn absorb_sources_of(&mut self, other: MergeRecord) {
        for id in other.sources {
            self.add_source(id);
        }
        self.years.extend(other.years);
        for (year, variable) in other.variables {
            self.variables.entry(year).or_insert(variable);
        }
    }
}

/// Result of the override phase
#[derive(Debug, Clone)]
pub struct OverrideMerge {
    pub worksheet: Worksheet,
    pub merges: Vec<MergeRecord>,
    pub rows_merged: usize,
    pub anomalies: Vec<Anomaly>,
}

/// Result of the duplicate phase
#[derive(Debug, Clone)]
pub struct DuplicateRemoval {
    pub worksheet: Worksheet,
    pub merges: Vec<MergeRecord>,
    pub removed: usize,
    /// Rows with an empty text or scale, never compared
    pub excluded: usize,
}

/// Result of a full reconciliation
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub worksheet: Worksheet,
    pub summary: RunSummary,
    /// One record per canonical row that absorbed others, by identifier
    pub merges: Vec<MergeRecord>,
}

impl Reconciliation {
    pub fn merge_for(&self, id: u64) -> Option<&MergeRecord> {
        self.merges.iter().find(|merge| merge.canonical_id == id)
    }
}

/// Grouping reconciler
pub struct GroupingReconciler {
    duplicate_pass: bool,
}

impl Default for GroupingReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupingReconciler {
    /// Reconciler running both phases
    pub fn new() -> Self {
        Self { duplicate_pass: true }
    }

    pub fn with_duplicate_pass(mut self, enabled: bool) -> Self {
        self.duplicate_pass = enabled;
        self
    }

    pub fn reconcile(&self, sheet: &Worksheet) -> Reconciliation {
        let merged = merge_overrides(sheet);

        let mut records: BTreeMap<u64, MergeRecord> = merged
            .merges
            .into_iter()
            .map(|merge| (merge.canonical_id, merge))
            .collect();

        let (worksheet, duplicates_removed, excluded) = if self.duplicate_pass {
            let removal = remove_duplicates(&merged.worksheet);
            for mut duplicate in removal.merges {
                for source in duplicate.sources.clone() {
                    if let Some(earlier) = records.remove(&source) {
                        duplicate.absorb(earlier);
                    }
                }
                match records.remove(&duplicate.canonical_id) {
                    Some(mut own) => {
                        own.absorb_sources_of(duplicate);
                        records.insert(own.canonical_id, own);
                    }
                    None => {
                        records.insert(duplicate.canonical_id, duplicate);
                    }
                }
            }
            (removal.worksheet, removal.removed, removal.excluded)
        } else {
            (merged.worksheet, 0, 0)
        };

        let summary = RunSummary {
            rows_loaded: sheet.rows.len(),
            valid_rows: sheet.valid_row_count(),
            clusters_found: records.len(),
            rows_merged: merged.rows_merged,
            duplicates_removed,
            unmatchable: excluded,
            anomalies: merged.anomalies,
        };

        Reconciliation {
            worksheet,
            summary,
            merges: records.into_values().collect(),
        }
    }
}

/// Reconcile with both phases enabled
pub fn reconcile(sheet: &Worksheet) -> Reconciliation {
    GroupingReconciler::new().reconcile(sheet)
}

/// Override phase: claim listed rows and fold them into their canonical rows.
pub fn merge_overrides(sheet: &Worksheet) -> OverrideMerge {
    let index = RowIndex::build(sheet);
    let mut anomalies: Vec<Anomaly> = index
        .duplicate_ids()
        .into_iter()
        .map(|(id, occurrences)| Anomaly::DuplicateRowId { id, occurrences })
        .collect();

    // claimed identifier -> position of the claiming row
    let mut owner: HashMap<u64, usize> = HashMap::new();

    for (position, row) in sheet.rows.iter().enumerate() {
        let Some(row_id) = sheet.row_id(row) else {
            continue;
        };

        for source in sheet.annotation(row).all_ids() {
            if source == row_id {
                anomalies.push(Anomaly::SelfReference { row: row_id });
                continue;
            }

            let Some(source_position) = index.get(source) else {
                anomalies.push(Anomaly::UnknownSource { row: row_id, source });
                continue;
            };

            if let Some(&claimant) = owner.get(&source) {
                if claimant != position {
                    let claimed_by = sheet.row_id(&sheet.rows[claimant]).unwrap_or_default();
                    anomalies.push(Anomaly::DoubleClaim {
                        source,
                        claimed_by,
                        rejected_claimant: row_id,
                    });
                }
                continue;
            }

            if is_owned_by(sheet, &owner, row_id, source) {
                anomalies.push(Anomaly::Cycle { row: row_id, source });
                continue;
            }

            if !sheet.annotation(&sheet.rows[source_position]).all_ids().is_empty() {
                anomalies.push(Anomaly::NestedCanonical { row: row_id, source });
            }

            debug!(canonical = row_id, source, "Claimed row");
            owner.insert(source, position);
        }
    }

    // Fold claimed rows into their roots
    let mut received: BTreeMap<usize, MergeRecord> = BTreeMap::new();
    for row in &sheet.rows {
        let Some(id) = sheet.row_id(row) else {
            continue;
        };
        if !owner.contains_key(&id) {
            continue;
        }
        let Some(root) = root_of(sheet, &owner, id) else {
            continue;
        };
        let root_row = &sheet.rows[root];
        let record = received.entry(root).or_insert_with(|| MergeRecord {
            canonical_id: sheet.row_id(root_row).unwrap_or_default(),
            sources: Vec::new(),
            years: sheet.years(root_row),
            variables: sheet.variables_by_year(root_row),
        });
        record.add_source(id);
        record.years.extend(sheet.years(row));
        for (year, variable) in sheet.variables_by_year(row) {
            record.variables.entry(year).or_insert(variable);
        }
    }

    let mut rows = Vec::with_capacity(sheet.rows.len());
    let mut rows_merged = 0;
    for (position, row) in sheet.rows.iter().enumerate() {
        if sheet.row_id(row).map_or(false, |id| owner.contains_key(&id)) {
            rows_merged += 1;
            continue;
        }
        let mut row = row.clone();
        if let Some(record) = received.get(&position) {
            sheet.set_years(&mut row, &record.years);
            sheet.set_annotation(&mut row, &OverrideAnnotation::default());
            info!(
                canonical = record.canonical_id,
                sources = ?record.sources,
                years = record.years.len(),
                "Merged group"
            );
        }
        rows.push(row);
    }

    OverrideMerge {
        worksheet: sheet.with_rows(rows),
        merges: received.into_values().collect(),
        rows_merged,
        anomalies,
    }
}

/// True when `ancestor` owns `id` directly or through a chain
fn is_owned_by(sheet: &Worksheet, owner: &HashMap<u64, usize>, id: u64, ancestor: u64) -> bool {
    let mut visited = HashSet::new();
    let mut current = id;
    while visited.insert(current) {
        let Some(&position) = owner.get(&current) else {
            return false;
        };
        let Some(parent) = sheet.row_id(&sheet.rows[position]) else {
            return false;
        };
        if parent == ancestor {
            return true;
        }
        current = parent;
    }
    false
}

/// Position of the unclaimed row at the top of `id`'s chain
fn root_of(sheet: &Worksheet, owner: &HashMap<u64, usize>, id: u64) -> Option<usize> {
    let mut visited = HashSet::new();
    let mut position = *owner.get(&id)?;
    loop {
        let parent = sheet.row_id(&sheet.rows[position])?;
        if !visited.insert(parent) {
            return None;
        }
        match owner.get(&parent) {
            Some(&next) => position = next,
            None => return Some(position),
        }
    }
}

type DuplicateKey = (String, String, String, String);

/// Lower-cased soft-normalized text; variable and year prefixes do not count
fn duplicate_text(text: &str) -> String {
    normalize_text(text).to_lowercase()
}

/// Duplicate phase: fold rows with identical text, parent, item and scale.
pub fn remove_duplicates(sheet: &Worksheet) -> DuplicateRemoval {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of: HashMap<DuplicateKey, usize> = HashMap::new();
    let mut excluded = 0;

    for (position, row) in sheet.rows.iter().enumerate() {
        if sheet.row_id(row).is_none() {
            continue;
        }
        let key: DuplicateKey = (
            duplicate_text(sheet.text(row)),
            duplicate_text(sheet.parent(row)),
            duplicate_text(sheet.item(row)),
            alternatives_key(&sheet.alternatives(row)),
        );
        if key.0.is_empty() || key.3.is_empty() {
            excluded += 1;
            continue;
        }
        match group_of.get(&key) {
            Some(&group) => groups[group].push(position),
            None => {
                group_of.insert(key, groups.len());
                groups.push(vec![position]);
            }
        }
    }

    let mut removed_positions = HashSet::new();
    let mut kept: HashMap<usize, MergeRecord> = HashMap::new();

    for group in groups.iter().filter(|group| group.len() > 1) {
        let id_at = |position: usize| sheet.row_id(&sheet.rows[position]).unwrap_or(u64::MAX);
        let keep = group
            .iter()
            .copied()
            .fold(group[0], |best, position| if id_at(position) < id_at(best) { position } else { best });

        let keep_row = &sheet.rows[keep];
        let mut record = MergeRecord {
            canonical_id: id_at(keep),
            sources: Vec::new(),
            years: sheet.years(keep_row),
            variables: sheet.variables_by_year(keep_row),
        };
        for &position in group.iter().filter(|&&position| position != keep) {
            let row = &sheet.rows[position];
            record.add_source(id_at(position));
            record.years.extend(sheet.years(row));
            for (year, variable) in sheet.variables_by_year(row) {
                record.variables.entry(year).or_insert(variable);
            }
            removed_positions.insert(position);
        }

        debug!(kept = record.canonical_id, removed = ?record.sources, "Removed duplicates");
        kept.insert(keep, record);
    }

    let mut rows = Vec::with_capacity(sheet.rows.len());
    let mut merges = Vec::new();
    for (position, row) in sheet.rows.iter().enumerate() {
        if removed_positions.contains(&position) {
            continue;
        }
        let mut row = row.clone();
        if let Some(record) = kept.remove(&position) {
            sheet.set_years(&mut row, &record.years);
            merges.push(record);
        }
        rows.push(row);
    }

    info!(
        groups = merges.len(),
        removed = removed_positions.len(),
        excluded,
        "Duplicate pass complete"
    );

    DuplicateRemoval {
        worksheet: sheet.with_rows(rows),
        merges,
        removed: removed_positions.len(),
        excluded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorksheetRow;
    use qlib_common::config::ColumnNames;

    const HEADERS: &[&str] = &[
        "question_id",
        "question_text",
        "parent_question",
        "item",
        "response_alternatives",
        "years",
        "num_years",
        "should_group_with",
        "variable",
    ];

    /// (id, text, alternatives, years, override, variable)
    fn sheet(rows: &[(&str, &str, &str, &str, &str, &str)]) -> Worksheet {
        let rows = rows
            .iter()
            .map(|(id, text, alternatives, years, overrides, variable)| {
                WorksheetRow::new(
                    [*id, *text, "", "", *alternatives, *years, "1", *overrides, *variable]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                )
            })
            .collect();
        let headers = HEADERS.iter().map(|s| s.to_string()).collect();
        Worksheet::new(headers, rows, &ColumnNames::default(), b';').unwrap()
    }

    fn ids(sheet: &Worksheet) -> Vec<String> {
        sheet.rows.iter().map(|row| row.get(0).to_string()).collect()
    }

    fn years_of(sheet: &Worksheet, id: &str) -> String {
        let row = sheet.rows.iter().find(|row| row.get(0) == id).unwrap();
        row.get(5).to_string()
    }

    #[test]
    fn test_dagstidning_override_merge() {
        let input = sheet(&[
            ("10", "Hur ofta har du läst en dagstidning?", "Varje dag|Aldrig", "2001", "25", "f2"),
            ("25", "Hur ofta har du läst en dagstidning?", "Varje dag|Aldrig", "2005", "", "f2b"),
        ]);
        let result = reconcile(&input);

        assert_eq!(ids(&result.worksheet), vec!["10"]);
        assert_eq!(years_of(&result.worksheet, "10"), "2001, 2005");
        assert_eq!(result.worksheet.rows[0].get(6), "2");
        assert_eq!(result.worksheet.rows[0].get(7), "");
        assert_eq!(result.summary.rows_merged, 1);

        let merge = result.merge_for(10).unwrap();
        assert_eq!(merge.sources, vec![25]);
        assert_eq!(merge.variables.get(&2005).map(String::as_str), Some("f2b"));

        // Input untouched
        assert_eq!(input.rows.len(), 2);
    }

    #[test]
    fn test_duplicate_pass_ignores_variable_prefixes() {
        let input = sheet(&[
            ("10", "f2: Hur ofta har du läst en dagstidning?", "Varje dag|Aldrig", "2001", "", "f2"),
            ("25", "f2b: Hur ofta har du  läst en dagstidning?", "Varje dag|Aldrig", "2005", "", "f2b"),
        ]);
        let result = reconcile(&input);

        assert_eq!(ids(&result.worksheet), vec!["10"]);
        assert_eq!(years_of(&result.worksheet, "10"), "2001, 2005");
        assert_eq!(result.summary.duplicates_removed, 1);
        assert_eq!(result.merge_for(10).unwrap().sources, vec![25]);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let input = sheet(&[
            ("1", "A", "Ja|Nej", "2001", "Auto: 2, 3", ""),
            ("2", "A", "Ja|Nej", "2002", "", ""),
            ("3", "B", "Ja|Nej", "2003", "", ""),
        ]);
        let first = reconcile(&input);
        let second = reconcile(&first.worksheet);
        assert_eq!(first.worksheet, second.worksheet);
        assert_eq!(years_of(&second.worksheet, "1"), "2001-2003");
        assert!(second.merges.is_empty());
    }

    #[test]
    fn test_double_claim_first_wins() {
        let input = sheet(&[
            ("1", "A", "Ja", "2001", "3", ""),
            ("2", "B", "Ja", "2002", "3", ""),
            ("3", "C", "Ja", "2003", "", ""),
        ]);
        let result = GroupingReconciler::new().with_duplicate_pass(false).reconcile(&input);

        assert_eq!(ids(&result.worksheet), vec!["1", "2"]);
        assert_eq!(years_of(&result.worksheet, "1"), "2001, 2003");
        assert_eq!(years_of(&result.worksheet, "2"), "2002");
        // Rejected claim leaves the override cell in place
        assert_eq!(result.worksheet.rows[1].get(7), "3");
        assert!(result.summary.anomalies.contains(&Anomaly::DoubleClaim {
            source: 3,
            claimed_by: 1,
            rejected_claimant: 2
        }));
    }

    #[test]
    fn test_self_unknown_and_cycle_rejected() {
        let input = sheet(&[
            ("1", "A", "Ja", "2001", "1, 2, 99", ""),
            ("2", "B", "Ja", "2002", "1", ""),
        ]);
        let result = reconcile(&input);

        assert_eq!(ids(&result.worksheet), vec!["1"]);
        assert_eq!(years_of(&result.worksheet, "1"), "2001, 2002");
        let anomalies = &result.summary.anomalies;
        assert!(anomalies.contains(&Anomaly::SelfReference { row: 1 }));
        assert!(anomalies.contains(&Anomaly::UnknownSource { row: 1, source: 99 }));
        assert!(anomalies.contains(&Anomaly::Cycle { row: 2, source: 1 }));
        assert!(anomalies.contains(&Anomaly::NestedCanonical { row: 1, source: 2 }));
    }

    #[test]
    fn test_chain_years_flow_to_root() {
        let input = sheet(&[
            ("1", "A", "Ja", "2001", "2", ""),
            ("2", "B", "Ja", "2002", "3", ""),
            ("3", "C", "Ja", "2003", "", ""),
        ]);
        let result = reconcile(&input);

        assert_eq!(ids(&result.worksheet), vec!["1"]);
        assert_eq!(years_of(&result.worksheet, "1"), "2001-2003");
        let merge = result.merge_for(1).unwrap();
        assert_eq!(merge.sources, vec![2, 3]);
        assert!(result
            .summary
            .anomalies
            .contains(&Anomaly::NestedCanonical { row: 1, source: 2 }));
    }

    #[test]
    fn test_no_source_survives() {
        let input = sheet(&[
            ("5", "A", "Ja", "2001", "6, 7", ""),
            ("6", "A", "Ja", "2002", "", ""),
            ("7", "B", "Ja", "2003", "6", ""),
            ("8", "C", "Ja", "2004", "7", ""),
        ]);
        let result = reconcile(&input);
        let remaining = ids(&result.worksheet);
        for merge in &result.merges {
            for source in &merge.sources {
                assert!(!remaining.contains(&source.to_string()), "source {} survived", source);
            }
        }
        assert_eq!(remaining, vec!["5", "8"]);
    }

    #[test]
    fn test_rows_without_id_pass_through() {
        let input = sheet(&[
            ("", "Rubrik", "", "", "", ""),
            ("x1", "Anteckning", "Ja", "2001", "", ""),
            ("1", "A", "Ja", "2001", "", ""),
        ]);
        let result = reconcile(&input);
        assert_eq!(ids(&result.worksheet), vec!["", "x1", "1"]);
        assert_eq!(result.summary.valid_rows, 1);
    }

    #[test]
    fn test_duplicate_pass_keeps_lowest_id() {
        let input = sheet(&[
            ("30", "Förtroende  för polisen", "Stort|Litet", "2005", "", "f30"),
            ("12", "förtroende för polisen", "litet|stort", "2001", "", "f12"),
            ("40", "Förtroende för polisen", "Stort", "2007", "", ""),
            ("50", "", "Stort", "2007", "", ""),
        ]);
        let result = reconcile(&input);

        assert_eq!(ids(&result.worksheet), vec!["12", "40", "50"]);
        assert_eq!(years_of(&result.worksheet, "12"), "2001, 2005");
        assert_eq!(result.summary.duplicates_removed, 1);
        assert_eq!(result.summary.unmatchable, 1);
        assert_eq!(result.merge_for(12).unwrap().sources, vec![30]);
    }

    #[test]
    fn test_skip_duplicate_pass() {
        let input = sheet(&[
            ("1", "A", "Ja", "2001", "", ""),
            ("2", "A", "Ja", "2002", "", ""),
        ]);
        let result = GroupingReconciler::new().with_duplicate_pass(false).reconcile(&input);
        assert_eq!(result.worksheet.rows.len(), 2);
    }

    #[test]
    fn test_override_then_duplicate_records_fold() {
        let input = sheet(&[
            ("1", "A", "Ja", "2001", "", ""),
            ("2", "A", "Ja", "2002", "3", ""),
            ("3", "Z", "Ja", "2003", "", ""),
        ]);
        let result = reconcile(&input);
        assert_eq!(ids(&result.worksheet), vec!["1"]);
        assert_eq!(years_of(&result.worksheet, "1"), "2001-2003");
        let merge = result.merge_for(1).unwrap();
        assert_eq!(merge.sources, vec![2, 3]);
        assert_eq!(result.merges.len(), 1);
    }

    #[test]
    fn test_duplicate_row_ids_reported() {
        let input = sheet(&[
            ("4", "A", "Ja", "2001", "", ""),
            ("4", "B", "Ja", "2002", "", ""),
        ]);
        let result = reconcile(&input);
        assert!(result
            .summary
            .anomalies
            .contains(&Anomaly::DuplicateRowId { id: 4, occurrences: 2 }));
    }
}
