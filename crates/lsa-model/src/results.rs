//! Contrast result rows and tables.
//!
//! A table never shrinks silently: a model or comparison that could not be
//! computed still produces a row, marked omitted with its reason.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The analyses in the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Each post-baseline timepoint vs baseline, within each arm.
    TimeCourse,
    /// Treatment minus control at each post-baseline timepoint.
    ArmDifference,
    /// Treatment minus control within each moderator level.
    Subgroup,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::TimeCourse,
        AnalysisKind::ArmDifference,
        AnalysisKind::Subgroup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::TimeCourse => "time_course",
            AnalysisKind::ArmDifference => "arm_difference",
            AnalysisKind::Subgroup => "subgroup",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics of one computed contrast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastStatistics {
    pub estimate: f64,
    pub standard_error: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
    pub t_ratio: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
}

/// Whether a row was computed or omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Computed(ContrastStatistics),
    Omitted { reason: String },
}

/// One comparison in one stratum of one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub outcome: String,
    pub analysis: AnalysisKind,
    /// Moderator that produced the row (subgroup analysis only).
    pub moderator: Option<String>,
    /// Analysis partition, e.g. an arm, a timepoint or a moderator level.
    pub stratum: String,
    /// Comparison label, always "later - earlier".
    pub comparison: String,
    pub status: RowStatus,
}

impl ResultRow {
    pub fn statistics(&self) -> Option<&ContrastStatistics> {
        match &self.status {
            RowStatus::Computed(stats) => Some(stats),
            RowStatus::Omitted { .. } => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.status, RowStatus::Computed(_))
    }

    pub fn omission_reason(&self) -> Option<&str> {
        match &self.status {
            RowStatus::Omitted { reason } => Some(reason),
            RowStatus::Computed(_) => None,
        }
    }
}

/// All rows of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub analysis: AnalysisKind,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(analysis: AnalysisKind) -> Self {
        Self {
            analysis,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    /// Rows of one outcome.
    pub fn for_outcome<'a>(&'a self, outcome: &'a str) -> impl Iterator<Item = &'a ResultRow> + 'a {
        self.rows.iter().filter(move |row| row.outcome == outcome)
    }

    /// Finds a row by outcome, stratum and comparison (moderator ignored).
    pub fn find(&self, outcome: &str, stratum: &str, comparison: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|row| {
            row.outcome == outcome && row.stratum == stratum && row.comparison == comparison
        })
    }

    pub fn computed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_computed()).count()
    }

    pub fn omitted_count(&self) -> usize {
        self.rows.len() - self.computed_count()
    }
}

/// Result tables of one run, in [`AnalysisKind`] order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub tables: Vec<ResultTable>,
}

impl AnalysisResults {
    pub fn table(&self, analysis: AnalysisKind) -> Option<&ResultTable> {
        self.tables.iter().find(|table| table.analysis == analysis)
    }

    /// Returns the table for `analysis`, creating it in order if absent.
    pub fn table_mut(&mut self, analysis: AnalysisKind) -> &mut ResultTable {
        let position = match self
            .tables
            .binary_search_by(|table| table.analysis.cmp(&analysis))
        {
            Ok(idx) => idx,
            Err(idx) => {
                self.tables.insert(idx, ResultTable::new(analysis));
                idx
            }
        };
        &mut self.tables[position]
    }

    pub fn rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.tables.iter().flat_map(|table| table.rows.iter())
    }

    pub fn computed_count(&self) -> usize {
        self.tables.iter().map(ResultTable::computed_count).sum()
    }

    pub fn omitted_count(&self) -> usize {
        self.tables.iter().map(ResultTable::omitted_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn omitted(outcome: &str) -> ResultRow {
        ResultRow {
            outcome: outcome.to_string(),
            analysis: AnalysisKind::ArmDifference,
            moderator: None,
            stratum: "Week 6".to_string(),
            comparison: "Intervention - Control".to_string(),
            status: RowStatus::Omitted {
                reason: "fewer than 2 distinct participants (1)".to_string(),
            },
        }
    }

    #[test]
    fn test_table_mut_keeps_kind_order() {
        let mut results = AnalysisResults::default();
        results.table_mut(AnalysisKind::Subgroup);
        results.table_mut(AnalysisKind::TimeCourse);
        results.table_mut(AnalysisKind::ArmDifference).push(omitted("distress"));
        let kinds: Vec<_> = results.tables.iter().map(|t| t.analysis).collect();
        assert_eq!(kinds, AnalysisKind::ALL.to_vec());
        assert_eq!(results.omitted_count(), 1);
        assert_eq!(results.computed_count(), 0);
    }

    #[test]
    fn test_omitted_row_serializes_reason() {
        let json = serde_json::to_value(omitted("distress")).unwrap();
        assert_eq!(json["status"]["status"], "omitted");
        assert_eq!(
            json["status"]["reason"],
            "fewer than 2 distinct participants (1)"
        );
        assert_eq!(json["analysis"], "arm_difference");
    }
}
