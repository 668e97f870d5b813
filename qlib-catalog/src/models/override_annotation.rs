//! Override column annotation
//!
//! The override column of a worksheet row lists identifiers of rows to merge
//! into it. It has two parts:
//! - a manual part written by a reviewer, kept verbatim
//! - an `Auto:` part written by the auto-grouper, regenerated on every run
//!
//! Rendered as `"Auto: 12, 31"` or `"<manual text>, Auto: 12, 31"`.

use once_cell::sync::Lazy;
use regex::Regex;

const AUTO_MARKER: &str = "Auto:";

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideAnnotation {
    /// Reviewer-written text
    pub manual: String,

    /// Machine-generated identifiers
    pub auto: Vec<u64>,
}

fn digit_runs(text: &str) -> Vec<u64> {
    ID_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .collect()
}

impl OverrideAnnotation {
    /// Parse an override cell. Never fails: text without identifiers yields
    /// an annotation without identifiers.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.find(AUTO_MARKER) {
            Some(pos) => {
                let manual = text[..pos].trim().trim_end_matches(',').trim_end().to_string();
                let auto = digit_runs(&text[pos + AUTO_MARKER.len()..]);
                Self { manual, auto }
            }
            None => Self {
                manual: text.to_string(),
                auto: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.manual.is_empty() && self.auto.is_empty()
    }

    pub fn has_manual(&self) -> bool {
        !self.manual.is_empty()
    }

    /// Identifiers named in the manual part
    pub fn manual_ids(&self) -> Vec<u64> {
        digit_runs(&self.manual)
    }

    /// Manual then automatic identifiers, first occurrence kept
    pub fn all_ids(&self) -> Vec<u64> {
        let mut ids = self.manual_ids();
        ids.extend(self.auto.iter().copied());
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        ids
    }

    /// Drop the `Auto:` part, keeping manual text
    pub fn without_auto(&self) -> Self {
        Self {
            manual: self.manual.clone(),
            auto: Vec::new(),
        }
    }

    /// Cell text for the annotation
    pub fn render(&self) -> String {
        if self.auto.is_empty() {
            return self.manual.clone();
        }

        let ids = self
            .auto
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if self.manual.is_empty() {
            format!("{} {}", AUTO_MARKER, ids)
        } else {
            format!("{}, {} {}", self.manual, AUTO_MARKER, ids)
        }
    }
}
