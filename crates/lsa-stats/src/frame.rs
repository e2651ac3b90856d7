//! Model frames: the observations one model is fitted to.

use std::collections::BTreeMap;

use lsa_model::{CovariateCoding, ModelingError};

/// A categorical column with reproducible level order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorColumn {
    /// Observed levels in factor order; the first is the reference.
    pub levels: Vec<String>,
    /// Per-observation index into `levels`.
    pub codes: Vec<usize>,
    pub coding: CovariateCoding,
}

impl FactorColumn {
    /// Builds a factor from per-observation labels.
    ///
    /// Level order is the declared order filtered to observed levels or,
    /// without a declaration, first-observed order. Labels outside a
    /// declaration are appended in first-observed order.
    pub fn from_labels<S: AsRef<str>>(
        labels: &[S],
        declared: Option<&[String]>,
        coding: CovariateCoding,
    ) -> Self {
        let mut levels: Vec<String> = Vec::new();
        if let Some(declared) = declared {
            for level in declared {
                if labels.iter().any(|l| l.as_ref() == level) {
                    levels.push(level.clone());
                }
            }
        }
        for label in labels {
            if !levels.iter().any(|l| l == label.as_ref()) {
                levels.push(label.as_ref().to_string());
            }
        }
        let codes = labels
            .iter()
            .map(|label| {
                levels
                    .iter()
                    .position(|l| l == label.as_ref())
                    .unwrap_or_default()
            })
            .collect();
        Self {
            levels,
            codes,
            coding,
        }
    }

    pub fn level_index(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == level)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Response, participant grouping and predictor columns of one model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelFrame {
    pub response: Vec<f64>,
    /// Participant id per observation (random-intercept grouping).
    pub groups: Vec<String>,
    pub factors: BTreeMap<String, FactorColumn>,
    pub numerics: BTreeMap<String, Vec<f64>>,
}

impl ModelFrame {
    pub fn new(response: Vec<f64>, groups: Vec<String>) -> Self {
        Self {
            response,
            groups,
            factors: BTreeMap::new(),
            numerics: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_factor(mut self, name: impl Into<String>, factor: FactorColumn) -> Self {
        self.factors.insert(name.into(), factor);
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.numerics.insert(name.into(), values);
        self
    }

    pub fn len(&self) -> usize {
        self.response.len()
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }

    /// Number of distinct participants.
    pub fn participant_count(&self) -> usize {
        let mut ids: Vec<&str> = self.groups.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Maps participant ids to dense group indices in first-seen order.
    pub fn group_indices(&self) -> (Vec<usize>, usize) {
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        let mut out = Vec::with_capacity(self.groups.len());
        for id in &self.groups {
            let next = index.len();
            out.push(*index.entry(id.as_str()).or_insert(next));
        }
        (out, index.len())
    }

    /// Checks column lengths and finiteness.
    pub fn validate(&self) -> Result<(), ModelingError> {
        let n = self.response.len();
        let mismatch = |what: &str, len: usize| ModelingError::InvalidInput {
            message: format!("column {what} has {len} values, expected {n}"),
        };
        if self.groups.len() != n {
            return Err(mismatch("participant", self.groups.len()));
        }
        for (name, factor) in &self.factors {
            if factor.len() != n {
                return Err(mismatch(name, factor.len()));
            }
        }
        for (name, values) in &self.numerics {
            if values.len() != n {
                return Err(mismatch(name, values.len()));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ModelingError::InvalidInput {
                    message: format!("column {name} has non-finite values"),
                });
            }
        }
        if self.response.iter().any(|v| !v.is_finite()) {
            return Err(ModelingError::InvalidInput {
                message: "response has non-finite values".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_declared_order_filtered_to_observed() {
        let declared = vec!["north".to_string(), "south".to_string(), "east".to_string()];
        let factor = FactorColumn::from_labels(
            &["east", "north", "east"],
            Some(declared.as_slice()),
            CovariateCoding::Treatment,
        );
        assert_eq!(factor.levels, vec!["north", "east"]);
        assert_eq!(factor.codes, vec![1, 0, 1]);
    }

    #[test]
    fn test_first_observed_order_without_declaration() {
        let factor = FactorColumn::from_labels(&["b", "a", "b"], None, CovariateCoding::Treatment);
        assert_eq!(factor.levels, vec!["b", "a"]);
    }

    #[test]
    fn test_group_indices_first_seen() {
        let frame = ModelFrame::new(
            vec![1.0, 2.0, 3.0],
            vec!["P2".to_string(), "P1".to_string(), "P2".to_string()],
        );
        assert_eq!(frame.group_indices(), (vec![0, 1, 0], 2));
        assert_eq!(frame.participant_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_codes_map_back_to_labels(raw in proptest::collection::vec(0usize..5, 0..40)) {
            let labels: Vec<String> = raw.iter().map(|i| format!("L{i}")).collect();
            let declared: Vec<String> = (0..3).rev().map(|i| format!("L{i}")).collect();
            let factor = FactorColumn::from_labels(
                &labels,
                Some(declared.as_slice()),
                CovariateCoding::Treatment,
            );
            for (label, &code) in labels.iter().zip(&factor.codes) {
                prop_assert_eq!(&factor.levels[code], label);
            }
            let declared_seen: Vec<&String> =
                factor.levels.iter().filter(|l| declared.contains(l)).collect();
            let expected: Vec<&String> =
                declared.iter().filter(|d| labels.contains(d)).collect();
            prop_assert_eq!(declared_seen, expected);
        }
    }

    #[test]
    fn test_validate_lengths() {
        let frame = ModelFrame::new(vec![1.0, 2.0], vec!["P1".to_string(), "P2".to_string()])
            .with_numeric("baseline_centered", vec![0.0]);
        assert!(matches!(
            frame.validate(),
            Err(ModelingError::InvalidInput { .. })
        ));
    }
}
