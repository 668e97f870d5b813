//! Run summaries and data-quality anomalies

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Reportable data-quality anomaly found during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// `source` was already claimed by `claimed_by`; the later claim was rejected
    DoubleClaim {
        source: u64,
        claimed_by: u64,
        rejected_claimant: u64,
    },
    /// A row listed its own identifier
    SelfReference { row: u64 },
    /// A row listed an identifier no row carries
    UnknownSource { row: u64, source: u64 },
    /// Claim rejected because `source` (transitively) owns `row`
    Cycle { row: u64, source: u64 },
    /// A claimed row had its own claims; its years flow to the root canonical
    NestedCanonical { row: u64, source: u64 },
    /// Several rows share one identifier
    DuplicateRowId { id: u64, occurrences: usize },
    /// Batteries with one stem and scale but different item lists
    BatteryDivergence {
        stem: String,
        sub_item_variants: Vec<Vec<String>>,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DoubleClaim {
                source,
                claimed_by,
                rejected_claimant,
            } => write!(
                f,
                "row {} claimed by {} and {}; kept {}",
                source, claimed_by, rejected_claimant, claimed_by
            ),
            Anomaly::SelfReference { row } => write!(f, "row {} lists itself", row),
            Anomaly::UnknownSource { row, source } => {
                write!(f, "row {} lists unknown id {}", row, source)
            }
            Anomaly::Cycle { row, source } => {
                write!(f, "row {} listing {} would form a cycle", row, source)
            }
            Anomaly::NestedCanonical { row, source } => {
                write!(f, "row {} claims {} which has its own claims", row, source)
            }
            Anomaly::DuplicateRowId { id, occurrences } => {
                write!(f, "id {} used by {} rows", id, occurrences)
            }
            Anomaly::BatteryDivergence {
                stem,
                sub_item_variants,
            } => write!(
                f,
                "battery '{}' has {} different item lists",
                stem,
                sub_item_variants.len()
            ),
        }
    }
}

/// Counts and anomalies of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub valid_rows: usize,
    pub clusters_found: usize,
    pub rows_merged: usize,
    pub duplicates_removed: usize,
    pub unmatchable: usize,
    pub anomalies: Vec<Anomaly>,
}

impl RunSummary {
    /// Log counts at info level and each anomaly at warn level
    pub fn log(&self, operation: &str) {
        info!(
            operation,
            rows_loaded = self.rows_loaded,
            valid_rows = self.valid_rows,
            clusters_found = self.clusters_found,
            rows_merged = self.rows_merged,
            duplicates_removed = self.duplicates_removed,
            unmatchable = self.unmatchable,
            anomalies = self.anomalies.len(),
            "Run complete"
        );
        for anomaly in &self.anomalies {
            warn!(operation, "Anomaly: {}", anomaly);
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows loaded:        {}", self.rows_loaded)?;
        writeln!(f, "Valid rows:         {}", self.valid_rows)?;
        writeln!(f, "Clusters found:     {}", self.clusters_found)?;
        writeln!(f, "Rows merged:        {}", self.rows_merged)?;
        writeln!(f, "Duplicates removed: {}", self.duplicates_removed)?;
        writeln!(f, "Unmatchable:        {}", self.unmatchable)?;
        write!(f, "Anomalies:          {}", self.anomalies.len())?;
        for anomaly in &self.anomalies {
            write!(f, "\n  - {}", anomaly)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_serializes_with_kind_tag() {
        let json = serde_json::to_value(Anomaly::SelfReference { row: 4 }).unwrap();
        assert_eq!(json["kind"], "self_reference");
        assert_eq!(json["row"], 4);
    }

    #[test]
    fn test_summary_display_lists_anomalies() {
        let summary = RunSummary {
            rows_loaded: 3,
            anomalies: vec![Anomaly::UnknownSource { row: 1, source: 99 }],
            ..Default::default()
        };
        let text = summary.to_string();
        assert!(text.contains("Rows loaded:        3"));
        assert!(text.contains("row 1 lists unknown id 99"));
    }
}
