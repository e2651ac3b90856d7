//! Fixed-effect formula specification.
//!
//! Every model has an intercept and one random intercept per participant;
//! the formula lists the remaining fixed-effect terms.

use std::fmt;

/// A fixed-effect term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Main effect of a factor or numeric covariate.
    Main(String),
    /// Two-way interaction.
    Interaction(String, String),
}

impl Term {
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Term::Main(name) => vec![name.as_str()],
            Term::Interaction(a, b) => vec![a.as_str(), b.as_str()],
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Main(name) => f.write_str(name),
            Term::Interaction(a, b) => write!(f, "{a}:{b}"),
        }
    }
}

/// Ordered fixed-effect terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaSpec {
    pub terms: Vec<Term>,
}

impl FormulaSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn main(mut self, name: impl Into<String>) -> Self {
        self.terms.push(Term::Main(name.into()));
        self
    }

    #[must_use]
    pub fn interaction(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.terms.push(Term::Interaction(a.into(), b.into()));
        self
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.terms.iter().any(|t| t.variables().contains(&name))
    }
}

impl fmt::Display for FormulaSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("y ~ 1")?;
        for term in &self.terms {
            write!(f, " + {term}")?;
        }
        f.write_str(" + (1 | participant)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let formula = FormulaSpec::new()
            .main("timepoint")
            .main("arm")
            .interaction("timepoint", "arm")
            .main("baseline_centered");
        assert_eq!(
            formula.to_string(),
            "y ~ 1 + timepoint + arm + timepoint:arm + baseline_centered + (1 | participant)"
        );
        assert!(formula.contains_variable("arm"));
        assert!(!formula.contains_variable("phase"));
    }
}
