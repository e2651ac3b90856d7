//! Per-instrument table mappings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How one instrument's wide table maps onto the shared panel.
///
/// Column names differ between instrument exports, so nothing downstream
/// refers to a source column directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentMapping {
    pub name: String,
    pub participant_column: String,
    pub timepoint_column: String,
    /// Item name -> source column.
    pub items: BTreeMap<String, String>,
    /// Instrument-specific timepoint spelling -> canonical label.
    #[serde(default)]
    pub timepoint_labels: BTreeMap<String, String>,
}

impl InstrumentMapping {
    pub fn new(
        name: impl Into<String>,
        participant_column: impl Into<String>,
        timepoint_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            participant_column: participant_column.into(),
            timepoint_column: timepoint_column.into(),
            items: BTreeMap::new(),
            timepoint_labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>, column: impl Into<String>) -> Self {
        self.items.insert(item.into(), column.into());
        self
    }

    #[must_use]
    pub fn with_timepoint_label(
        mut self,
        raw: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Self {
        self.timepoint_labels.insert(raw.into(), canonical.into());
        self
    }

    pub fn column_for(&self, item: &str) -> Option<&str> {
        self.items.get(item).map(String::as_str)
    }
}
