//! Named data-quality fixes.
//!
//! Every correction to raw responses is declared in configuration, carries a
//! name for the audit trail, and is idempotent: applying it to already-fixed
//! values changes nothing.

use serde::{Deserialize, Serialize};

/// The value transformation a fix performs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixRule {
    /// Replace one response value with another.
    Recode { from: f64, to: f64 },
    /// Move out-of-range responses to the nearest valid bound.
    Clamp { min: f64, max: f64 },
}

/// A named fix applied to items of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFix {
    pub name: String,
    pub instrument: String,
    /// Items the fix touches; empty means every mapped item.
    #[serde(default)]
    pub items: Vec<String>,
    pub rule: FixRule,
}

impl DataFix {
    pub fn applies_to(&self, instrument: &str, item: &str) -> bool {
        self.instrument == instrument && (self.items.is_empty() || self.items.iter().any(|i| i == item))
    }

    /// Returns the fixed value, or `None` when the value is left unchanged.
    pub fn apply(&self, value: f64) -> Option<f64> {
        match self.rule {
            FixRule::Recode { from, to } => (value == from).then_some(to),
            FixRule::Clamp { min, max } => {
                let clamped = value.clamp(min, max);
                (clamped != value).then_some(clamped)
            }
        }
    }

    /// Whether two fixes can touch the same cell.
    pub fn overlaps(&self, other: &DataFix) -> bool {
        self.instrument == other.instrument
            && (self.items.is_empty()
                || other.items.is_empty()
                || self.items.iter().any(|item| other.items.contains(item)))
    }
}
