//! Outcome definitions and composite scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Valid response range of an instrument's items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemScale {
    pub min: f64,
    pub max: f64,
}

impl ItemScale {
    /// Mirrors a response around the scale midpoint.
    pub fn reverse(&self, value: f64) -> f64 {
        self.min + self.max - value
    }
}

/// A named composite measure built from instrument items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDefinition {
    pub name: String,
    /// Instrument whose table carries the items.
    pub instrument: String,
    pub items: Vec<String>,
    /// Items scored in the opposite direction; requires `scale`.
    #[serde(default)]
    pub reverse_items: Vec<String>,
    #[serde(default)]
    pub scale: Option<ItemScale>,
}

impl OutcomeDefinition {
    pub fn new<I, S>(name: impl Into<String>, instrument: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            instrument: instrument.into(),
            items: items.into_iter().map(Into::into).collect(),
            reverse_items: Vec::new(),
            scale: None,
        }
    }

    /// Mean of the non-missing items.
    ///
    /// Missing only when every constituent item is missing; partial response
    /// averages whatever is available.
    pub fn composite(&self, item_values: &BTreeMap<String, Option<f64>>) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for item in &self.items {
            let Some(value) = item_values.get(item).copied().flatten() else {
                continue;
            };
            let value = match self.scale {
                Some(scale) if self.reverse_items.contains(item) => scale.reverse(value),
                _ => value,
            };
            sum += value;
            count += 1;
        }
        (count > 0).then(|| sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(pairs: &[(&str, Option<f64>)]) -> BTreeMap<String, Option<f64>> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), *value))
            .collect()
    }

    #[test]
    fn test_composite_all_missing_is_missing() {
        let outcome = OutcomeDefinition::new("distress", "k6", ["k1", "k2", "k3"]);
        assert_eq!(
            outcome.composite(&values(&[("k1", None), ("k2", None)])),
            None
        );
    }

    #[test]
    fn test_composite_averages_available_items() {
        let outcome = OutcomeDefinition::new("distress", "k6", ["k1", "k2", "k3"]);
        let score = outcome.composite(&values(&[("k1", Some(2.0)), ("k2", None), ("k3", Some(4.0))]));
        assert_eq!(score, Some(3.0));
    }

    #[test]
    fn test_composite_reverses_declared_items() {
        let mut outcome = OutcomeDefinition::new("loneliness", "ucla", ["l1", "l2"]);
        outcome.reverse_items = vec!["l2".to_string()];
        outcome.scale = Some(ItemScale { min: 1.0, max: 4.0 });
        // l2 = 1 reverses to 4
        let score = outcome.composite(&values(&[("l1", Some(2.0)), ("l2", Some(1.0))]));
        assert_eq!(score, Some(3.0));
    }

    proptest! {
        #[test]
        fn prop_single_item_composite_equals_item(
            present in 0usize..4,
            value in -10.0f64..10.0,
        ) {
            let outcome = OutcomeDefinition::new("affect", "panas", ["a", "b", "c", "d"]);
            let mut items = BTreeMap::new();
            for (idx, name) in outcome.items.iter().enumerate() {
                items.insert(name.clone(), (idx == present).then_some(value));
            }
            prop_assert_eq!(outcome.composite(&items), Some(value));
        }
    }
}
