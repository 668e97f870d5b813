//! qlib catalog library
//!
//! Builds a cross-year catalog of survey questions: extraction from raw
//! per-year extracts, battery detection, clustering of identical questions,
//! and reconciliation of a human-reviewed grouping worksheet.

pub mod files;
pub mod models;
pub mod services;
