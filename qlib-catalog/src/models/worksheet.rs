//! Review worksheet model
//!
//! A worksheet is a header list plus rows of string fields. Rows are never
//! patched in place by the services: each stage builds a new [`Worksheet`].
//! Column positions are resolved once from the header ([`WorksheetColumns`])
//! and an identifier lookup is built once per run ([`RowIndex`]).

use crate::models::OverrideAnnotation;
use qlib_common::config::ColumnNames;
use qlib_common::normalize::split_alternatives;
use qlib_common::years::{format_years, parse_years};
use qlib_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One worksheet row; field order follows the worksheet header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorksheetRow {
    pub fields: Vec<String>,
}

impl WorksheetRow {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Field value, empty for short rows
    pub fn get(&self, column: usize) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: usize, value: impl Into<String>) {
        if self.fields.len() <= column {
            self.fields.resize(column + 1, String::new());
        }
        self.fields[column] = value.into();
    }
}

/// Resolved column positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetColumns {
    pub id: usize,
    pub text: usize,
    pub parent: Option<usize>,
    pub item: Option<usize>,
    pub alternatives: usize,
    pub years: usize,
    pub year_count: Option<usize>,
    pub overrides: usize,
    pub variable: Option<usize>,
}

impl WorksheetColumns {
    /// Resolve configured column names against a header.
    ///
    /// Identifier, text, alternatives, years and override columns are
    /// required; the rest are optional.
    pub fn resolve(headers: &[String], names: &ColumnNames) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::InvalidInput(format!("Worksheet is missing required column '{}'", name)))
        };

        Ok(Self {
            id: require(names.id.as_str())?,
            text: require(names.text.as_str())?,
            parent: find(names.parent.as_str()),
            item: find(names.item.as_str()),
            alternatives: require(names.alternatives.as_str())?,
            years: require(names.years.as_str())?,
            year_count: find(names.year_count.as_str()),
            overrides: require(names.overrides.as_str())?,
            variable: find(names.variable.as_str()),
        })
    }
}

/// Parsed worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    pub headers: Vec<String>,
    pub rows: Vec<WorksheetRow>,
    pub columns: WorksheetColumns,
    /// Field delimiter used when the worksheet is written back
    pub delimiter: u8,
}

impl Worksheet {
    /// Build a worksheet, padding short rows to the header width
    pub fn new(headers: Vec<String>, rows: Vec<WorksheetRow>, names: &ColumnNames, delimiter: u8) -> Result<Self> {
        let columns = WorksheetColumns::resolve(&headers, names)?;
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.fields.len() < width {
                    row.fields.resize(width, String::new());
                }
                row
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            columns,
            delimiter,
        })
    }

    /// Same header, columns and delimiter with different rows
    pub fn with_rows(&self, rows: Vec<WorksheetRow>) -> Self {
        Self {
            headers: self.headers.clone(),
            rows,
            columns: self.columns.clone(),
            delimiter: self.delimiter,
        }
    }

    /// Numeric row identifier; `None` for blank or non-numeric cells
    pub fn row_id(&self, row: &WorksheetRow) -> Option<u64> {
        parse_row_id(row.get(self.columns.id))
    }

    pub fn text<'a>(&self, row: &'a WorksheetRow) -> &'a str {
        row.get(self.columns.text).trim()
    }

    pub fn parent<'a>(&self, row: &'a WorksheetRow) -> &'a str {
        self.columns.parent.map(|c| row.get(c).trim()).unwrap_or("")
    }

    pub fn item<'a>(&self, row: &'a WorksheetRow) -> &'a str {
        self.columns.item.map(|c| row.get(c).trim()).unwrap_or("")
    }

    pub fn variable<'a>(&self, row: &'a WorksheetRow) -> &'a str {
        self.columns.variable.map(|c| row.get(c).trim()).unwrap_or("")
    }

    pub fn alternatives(&self, row: &WorksheetRow) -> Vec<String> {
        split_alternatives(row.get(self.columns.alternatives))
    }

    pub fn years(&self, row: &WorksheetRow) -> BTreeSet<i32> {
        parse_years(row.get(self.columns.years))
    }

    pub fn annotation(&self, row: &WorksheetRow) -> OverrideAnnotation {
        OverrideAnnotation::parse(row.get(self.columns.overrides))
    }

    /// Write years back, updating the year-count column when present
    pub fn set_years(&self, row: &mut WorksheetRow, years: &BTreeSet<i32>) {
        row.set(self.columns.years, format_years(years));
        if let Some(column) = self.columns.year_count {
            row.set(column, years.len().to_string());
        }
    }

    pub fn set_annotation(&self, row: &mut WorksheetRow, annotation: &OverrideAnnotation) {
        row.set(self.columns.overrides, annotation.render());
    }

    /// Year -> variable mapping of one row (empty without a variable column)
    pub fn variables_by_year(&self, row: &WorksheetRow) -> BTreeMap<i32, String> {
        let variable = self.variable(row);
        if variable.is_empty() {
            return BTreeMap::new();
        }
        self.years(row)
            .into_iter()
            .map(|year| (year, variable.to_string()))
            .collect()
    }

    /// Rows carrying a valid identifier
    pub fn valid_row_count(&self) -> usize {
        self.rows.iter().filter(|row| self.row_id(row).is_some()).count()
    }
}

/// Parse a positive row identifier cell. Accepts spreadsheet float exports (`"12.0"`).
pub fn parse_row_id(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text.strip_suffix(".0").unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().filter(|&id| id > 0)
}

/// Identifier -> row index lookup, built once per run
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    by_id: HashMap<u64, usize>,
    occurrences: BTreeMap<u64, usize>,
}

impl RowIndex {
    /// Index rows by identifier. A repeated identifier maps to its first row.
    pub fn build(sheet: &Worksheet) -> Self {
        let mut index = Self::default();
        for (position, row) in sheet.rows.iter().enumerate() {
            if let Some(id) = sheet.row_id(row) {
                index.by_id.entry(id).or_insert(position);
                *index.occurrences.entry(id).or_insert(0) += 1;
            }
        }
        index
    }

    pub fn get(&self, id: u64) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Identifiers used by more than one row, with their occurrence counts
    pub fn duplicate_ids(&self) -> Vec<(u64, usize)> {
        self.occurrences
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(id, count)| (*id, *count))
            .collect()
    }
}
