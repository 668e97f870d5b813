//! Catalog services
//!
//! Extraction side: raw extracts to question records, batteries and the
//! cross-year library. Worksheet side: auto-grouping, override/duplicate
//! reconciliation and catalog export.

pub mod auto_grouper;
pub mod battery_detector;
pub mod catalog_builder;
pub mod cross_source_matcher;
pub mod grouping_reconciler;
pub mod library_builder;
pub mod question_extractor;

pub use auto_grouper::{auto_group, AutoGrouping};
pub use battery_detector::{detect_batteries, split_stem, variable_root, BatteryDetection, BatteryDetector};
pub use catalog_builder::build_catalog;
pub use cross_source_matcher::{
    cluster, group_batteries, BatteryGrouping, CanonicalPolicy, Cluster, ClusterSet, Clusterable, MatchKey,
    MergedBattery,
};
pub use grouping_reconciler::{
    merge_overrides, reconcile, remove_duplicates, DuplicateRemoval, GroupingReconciler, MergeRecord, OverrideMerge,
    Reconciliation,
};
pub use library_builder::{LibraryBuild, LibraryBuilder};
pub use question_extractor::{combine_stem_and_item, flatten_battery, ExtractedYear, QuestionExtractor};
