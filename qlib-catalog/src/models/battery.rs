//! Battery (multi-item question) model

use serde::{Deserialize, Serialize};

/// A detected multi-item question sharing one stem and response scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    /// Shared question wording
    pub stem: String,

    /// Item-specific labels in sibling order
    pub sub_items: Vec<String>,

    /// Shared response scale (display labels)
    pub alternatives: Vec<String>,

    /// Lower-cased naming root shared by the siblings (`f12` for `f12a`, `f12b`)
    pub variable_root: String,

    pub year: i32,

    /// Sibling variable for each entry of `sub_items` (same length)
    pub variables: Vec<String>,
}

impl Battery {
    /// (variable, sub-item) pairs in order
    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(String::as_str)
            .zip(self.sub_items.iter().map(String::as_str))
    }
}
