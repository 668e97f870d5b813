//! End-to-end worksheet pipeline: auto-group, merge, export

mod helpers;

use helpers::{capture_logs, write_fixture};
use qlib_catalog::files::{read_worksheet, write_json, write_worksheet};
use qlib_catalog::models::{Anomaly, Worksheet};
use qlib_catalog::services::{auto_group, build_catalog, reconcile, GroupingReconciler};
use qlib_common::config::WorksheetConfig;
use tracing::Level;

const WORKSHEET: &str = "\u{feff}question_id;question_text;parent_question;item;response_alternatives;years;num_years;should_group_with;variable;kommentar\n\
10;f2: Hur ofta har du läst en dagstidning?;;;Varje dag|Aldrig;2001;1;;f2;\n\
25;f2b: Hur ofta har du läst en dagstidning?;;;Aldrig|Varje dag;2005;1;;f2b;kontrollera\n\
31;Förtroende för polisen;;;Stort|Litet;1999-2001;3;;f7;\n\
40;Förtroende för polisen, ny formulering;;;Stort|Litet;2003;1;31;f7b;\n\
50;Intresse för politik;;;Ja|Nej;2001;1;;f9;\n";

fn load(dir: &std::path::Path) -> Worksheet {
    let path = write_fixture(dir, "frågor.csv", WORKSHEET);
    read_worksheet(&path, &WorksheetConfig::default()).unwrap()
}

fn row_by_id<'a>(sheet: &'a Worksheet, id: u64) -> Option<&'a qlib_catalog::models::WorksheetRow> {
    sheet.rows.iter().find(|row| sheet.row_id(row) == Some(id))
}

#[test]
fn test_auto_group_then_merge_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = load(dir.path());
    let config = WorksheetConfig::default();

    let grouping = auto_group(&sheet);
    assert_eq!(grouping.summary.clusters_found, 1);
    let grouped_path = dir.path().join("frågor_auto_grouped.csv");
    write_worksheet(&grouped_path, &grouping.worksheet, config.write_bom).unwrap();

    let grouped = read_worksheet(&grouped_path, &config).unwrap();
    assert_eq!(grouped.delimiter, b';');
    let canonical = row_by_id(&grouped, 10).unwrap();
    assert_eq!(grouped.annotation(canonical).render(), "Auto: 25");
    // Manual annotation untouched
    assert_eq!(grouped.annotation(row_by_id(&grouped, 40).unwrap()).render(), "31");

    let reconciliation = reconcile(&grouped);
    let merged = &reconciliation.worksheet;
    assert_eq!(merged.rows.len(), 3);
    assert!(row_by_id(merged, 25).is_none());
    assert!(row_by_id(merged, 31).is_none());

    let dagstidning = row_by_id(merged, 10).unwrap();
    assert_eq!(merged.years(dagstidning).into_iter().collect::<Vec<_>>(), vec![2001, 2005]);
    assert_eq!(dagstidning.get(6), "2");
    assert!(merged.annotation(dagstidning).is_empty());

    let polisen = row_by_id(merged, 40).unwrap();
    assert_eq!(polisen.get(5), "1999-2001, 2003");
    assert_eq!(polisen.get(6), "4");

    // Unknown column carried through
    assert_eq!(merged.headers.last().map(String::as_str), Some("kommentar"));

    assert_eq!(reconciliation.summary.rows_merged, 2);
    assert_eq!(reconciliation.summary.duplicates_removed, 0);
    assert!(reconciliation.summary.anomalies.is_empty());

    // A second merge pass is a no-op
    let again = reconcile(merged);
    assert_eq!(&again.worksheet, merged);
    assert_eq!(again.summary.rows_merged, 0);
}

#[test]
fn test_export_catalog_from_annotated_worksheet() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = load(dir.path());
    let grouped = auto_group(&sheet).worksheet;

    let catalog = build_catalog(&reconcile(&grouped));
    assert_eq!(catalog.total_questions, 3);

    let ids: Vec<u64> = catalog.questions.iter().map(|entry| entry.question_id).collect();
    assert_eq!(ids, vec![10, 40, 50]);

    let dagstidning = &catalog.questions[0];
    assert_eq!(dagstidning.question_text, "2001, 2005: Hur ofta har du läst en dagstidning?");
    assert_eq!(dagstidning.grouped_from, Some(vec![25]));
    assert_eq!(dagstidning.variables.get(&2005).map(String::as_str), Some("f2b"));

    let polisen = &catalog.questions[1];
    assert_eq!(polisen.years, "1999-2001, 2003");
    assert_eq!(polisen.num_years, 4);
    assert_eq!(polisen.grouped_from, Some(vec![31]));

    let path = dir.path().join("catalog.json");
    write_json(&path, &catalog).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["total_questions"], 3);
    assert_eq!(json["questions"][1]["years_list"], serde_json::json!([1999, 2000, 2001, 2003]));
}

#[test]
fn test_exact_duplicates_removed_unless_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let contents = "question_id,question_text,response_alternatives,years,should_group_with\n\
        7,Röstade du i valet?,Ja|Nej,2002,\n\
        3,Röstade du i valet?,Ja|Nej,2006,\n";
    let path = write_fixture(dir.path(), "val.csv", contents);
    let sheet = read_worksheet(&path, &WorksheetConfig::default()).unwrap();
    assert_eq!(sheet.delimiter, b',');

    let skipped = GroupingReconciler::new().with_duplicate_pass(false).reconcile(&sheet);
    assert_eq!(skipped.worksheet.rows.len(), 2);

    let folded = GroupingReconciler::new().reconcile(&sheet);
    assert_eq!(folded.worksheet.rows.len(), 1);
    assert_eq!(folded.summary.duplicates_removed, 1);
    let survivor = &folded.worksheet.rows[0];
    assert_eq!(folded.worksheet.row_id(survivor), Some(3));
    assert_eq!(survivor.get(3), "2002, 2006");
}

#[test]
fn test_conflicting_claims_reported_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let contents = "question_id;question_text;response_alternatives;years;should_group_with\n\
        1;A;Ja|Nej;2001;3\n\
        2;B;Ja|Nej;2002;3, 2, 99\n\
        3;C;Ja|Nej;2003;\n";
    let path = write_fixture(dir.path(), "konflikt.csv", contents);
    let sheet = read_worksheet(&path, &WorksheetConfig::default()).unwrap();

    let (reconciliation, logs) = capture_logs(|| {
        let reconciliation = reconcile(&sheet);
        reconciliation.summary.log("merge");
        reconciliation
    });

    let anomalies = &reconciliation.summary.anomalies;
    assert!(anomalies.contains(&Anomaly::DoubleClaim {
        source: 3,
        claimed_by: 1,
        rejected_claimant: 2,
    }));
    assert!(anomalies.contains(&Anomaly::SelfReference { row: 2 }));
    assert!(anomalies.contains(&Anomaly::UnknownSource { row: 2, source: 99 }));

    // Row 3 went to row 1 only
    let ids: Vec<u64> = reconciliation
        .worksheet
        .rows
        .iter()
        .filter_map(|row| reconciliation.worksheet.row_id(row))
        .collect();
    assert_eq!(ids, vec![1, 2]);

    assert_eq!(logs.at_level(Level::WARN).len(), anomalies.len());
    let summary = logs.find("Run complete").unwrap();
    assert_eq!(summary.fields.get("rows_merged").map(String::as_str), Some("1"));
    logs.assert_contains("Merged group");
}
