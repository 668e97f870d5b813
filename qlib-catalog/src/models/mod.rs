//! Data models for question cataloging
//!
//! - Question records and batteries produced from raw extracts
//! - Review worksheet rows and override annotations
//! - Catalog/library output entries
//! - Run summaries and anomalies

pub mod battery;
pub mod catalog;
pub mod extract;
pub mod override_annotation;
pub mod question;
pub mod summary;
pub mod worksheet;

pub use battery::Battery;
pub use catalog::{Catalog, CatalogEntry, Library, LibraryBattery, LibraryQuestion, QuestionType};
pub use extract::{RawExtract, RawVariable, ValueLabel};
pub use override_annotation::OverrideAnnotation;
pub use question::{QuestionOrigin, QuestionRecord};
pub use summary::{Anomaly, RunSummary};
pub use worksheet::{parse_row_id, RowIndex, Worksheet, WorksheetColumns, WorksheetRow};
