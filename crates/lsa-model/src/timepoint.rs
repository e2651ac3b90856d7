//! Canonical study timepoints.
//!
//! The scale's declaration order is the study order. The first label is the
//! baseline. Every instrument maps its own spellings onto this one scale, which
//! is what makes cross-outcome joins well defined.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Position of a timepoint on the canonical scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timepoint(pub usize);

impl Timepoint {
    /// The baseline timepoint (always first on the scale).
    pub const BASELINE: Timepoint = Timepoint(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_baseline(self) -> bool {
        self == Self::BASELINE
    }
}

impl fmt::Display for Timepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Ordered set of canonical timepoint labels plus global aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimepointScale {
    /// Canonical labels in study order; the first is the baseline.
    pub labels: Vec<String>,
    /// Alternative spellings shared by all instruments (alias -> canonical).
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Lowercases and strips everything but ASCII alphanumerics.
///
/// `"Week-6"`, `"week 6"` and `"WEEK6"` all normalize to `"week6"`.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl TimepointScale {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            aliases: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), canonical.into());
        self
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn baseline(&self) -> Timepoint {
        Timepoint::BASELINE
    }

    /// Canonical label of a timepoint; empty for out-of-range indices.
    pub fn label(&self, timepoint: Timepoint) -> &str {
        self.labels
            .get(timepoint.0)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// All timepoints in study order.
    pub fn timepoints(&self) -> impl Iterator<Item = Timepoint> + '_ {
        (0..self.labels.len()).map(Timepoint)
    }

    /// Non-baseline timepoints in study order.
    pub fn post_baseline(&self) -> impl Iterator<Item = Timepoint> + '_ {
        self.timepoints().filter(|tp| !tp.is_baseline())
    }

    /// Looks up a canonical label (normalized comparison).
    pub fn position(&self, label: &str) -> Option<Timepoint> {
        let key = normalize_label(label);
        self.labels
            .iter()
            .position(|l| normalize_label(l) == key)
            .map(Timepoint)
    }

    /// Resolves a raw label.
    ///
    /// Order: the instrument's own alias map (exact, then normalized), the
    /// canonical labels, then the global aliases.
    pub fn resolve(
        &self,
        raw: &str,
        instrument_aliases: &BTreeMap<String, String>,
    ) -> Option<Timepoint> {
        let trimmed = raw.trim();
        if let Some(canonical) = instrument_aliases.get(trimmed) {
            return self.position(canonical);
        }
        let key = normalize_label(trimmed);
        if key.is_empty() {
            return None;
        }
        if let Some((_, canonical)) = instrument_aliases
            .iter()
            .find(|(alias, _)| normalize_label(alias) == key)
        {
            return self.position(canonical);
        }
        if let Some(tp) = self.position(trimmed) {
            return Some(tp);
        }
        self.aliases
            .iter()
            .find(|(alias, _)| normalize_label(alias) == key)
            .and_then(|(_, canonical)| self.position(canonical))
    }

    /// Checks label uniqueness (after normalization) and alias targets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.labels.is_empty() {
            return Err(ConfigError::EmptyTimepoints);
        }
        let mut seen = BTreeSet::new();
        for label in &self.labels {
            let key = normalize_label(label);
            if key.is_empty() || !seen.insert(key) {
                return Err(ConfigError::DuplicateTimepoint {
                    label: label.clone(),
                });
            }
        }
        for (alias, canonical) in &self.aliases {
            if self.position(canonical).is_none() {
                return Err(ConfigError::UnknownTimepoint {
                    context: format!("timepoint alias '{alias}'"),
                    label: canonical.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> TimepointScale {
        TimepointScale::new(["Baseline", "Week 1", "Week 2", "Day 5", "Week 6"])
            .with_alias("T0", "Baseline")
    }

    #[test]
    fn test_resolve_canonical_is_identity() {
        let scale = scale();
        for tp in scale.timepoints() {
            let label = scale.label(tp).to_string();
            assert_eq!(scale.resolve(&label, &BTreeMap::new()), Some(tp));
        }
    }

    #[test]
    fn test_resolve_normalizes_spelling() {
        let scale = scale();
        assert_eq!(
            scale.resolve("WEEK-6", &BTreeMap::new()),
            Some(Timepoint(4))
        );
        assert_eq!(scale.resolve(" t0 ", &BTreeMap::new()), Some(Timepoint(0)));
    }

    #[test]
    fn test_instrument_alias_wins() {
        let scale = scale();
        let mut aliases = BTreeMap::new();
        aliases.insert("Follow-up".to_string(), "Week 6".to_string());
        assert_eq!(scale.resolve("follow up", &aliases), Some(Timepoint(4)));
    }

    #[test]
    fn test_unmapped_label() {
        assert_eq!(scale().resolve("Week 9", &BTreeMap::new()), None);
        assert_eq!(scale().resolve("", &BTreeMap::new()), None);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let scale = TimepointScale::new(["Baseline", "week 1", "Week-1"]);
        assert!(matches!(
            scale.validate(),
            Err(ConfigError::DuplicateTimepoint { .. })
        ));
    }

    #[test]
    fn test_post_baseline_excludes_first() {
        let post: Vec<_> = scale().post_baseline().collect();
        assert_eq!(post.first(), Some(&Timepoint(1)));
        assert_eq!(post.len(), 4);
    }
}
