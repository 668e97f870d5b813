//! Raw extract model
//!
//! One year's variable metadata as produced by the upstream statistical
//! package reader:
//!
//! ```json
//! {
//!   "year": 2001,
//!   "source": "som2001.sav",
//!   "variables": [
//!     {"variable": "f2", "label": "Hur ofta...?",
//!      "value_labels": [{"code": 1, "label": "Varje dag"}]}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtract {
    pub year: i32,

    /// Free-form origin description (file name, survey name)
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub variables: Vec<RawVariable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVariable {
    pub variable: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub value_labels: Vec<ValueLabel>,
}

/// Coded response label. Codes may be fractional in some sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueLabel {
    pub code: f64,
    pub label: String,
}

impl ValueLabel {
    /// Integral code, `None` for fractional codes
    pub fn integral_code(&self) -> Option<i64> {
        if self.code.fract() == 0.0 && self.code.is_finite() {
            Some(self.code as i64)
        } else {
            None
        }
    }
}
