//! Fixed-effect design matrices.
//!
//! A [`DesignLayout`] records how every formula variable is encoded. The
//! same layout encodes observed rows when the matrix is built and
//! hypothetical rows (marginal-mean grids) when contrasts are extracted.

use std::collections::BTreeMap;
use std::ops::Range;

use lsa_model::{CovariateCoding, ModelingError};
use nalgebra::{DMatrix, DVector};

use crate::formula::FormulaSpec;
use crate::frame::ModelFrame;

/// Encoding of one formula variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Factor {
        levels: Vec<String>,
        coding: CovariateCoding,
    },
    Numeric {
        mean: f64,
    },
}

/// Value a variable takes in one encoded row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    /// A factor level index.
    Level(usize),
    /// A numeric value.
    Value(f64),
    /// Equal-weight average over factor levels; numeric mean.
    Average,
}

impl Variable {
    fn column_names(&self, name: &str) -> Vec<String> {
        match self {
            Variable::Factor {
                levels,
                coding: CovariateCoding::Treatment,
            } => levels.iter().skip(1).map(|l| format!("{name}[{l}]")).collect(),
            Variable::Factor {
                levels,
                coding: CovariateCoding::Symmetric,
            } => vec![format!(
                "{name}[{}-{}]",
                levels.get(1).map_or("", String::as_str),
                levels.first().map_or("", String::as_str)
            )],
            Variable::Numeric { .. } => vec![name.to_string()],
        }
    }

    /// Encoded columns of this variable under `setting`.
    fn encode(&self, setting: Setting) -> Vec<f64> {
        match (self, setting) {
            (
                Variable::Factor {
                    levels,
                    coding: CovariateCoding::Treatment,
                },
                Setting::Level(level),
            ) => (1..levels.len())
                .map(|j| if j == level { 1.0 } else { 0.0 })
                .collect(),
            (
                Variable::Factor {
                    levels,
                    coding: CovariateCoding::Treatment,
                },
                _,
            ) => vec![1.0 / levels.len() as f64; levels.len().saturating_sub(1)],
            (
                Variable::Factor {
                    coding: CovariateCoding::Symmetric,
                    ..
                },
                Setting::Level(level),
            ) => vec![if level == 0 { -0.5 } else { 0.5 }],
            (
                Variable::Factor {
                    coding: CovariateCoding::Symmetric,
                    ..
                },
                _,
            ) => vec![0.0],
            (Variable::Numeric { .. }, Setting::Value(v)) => vec![v],
            (Variable::Numeric { mean }, _) => vec![*mean],
        }
    }
}

/// Columns a term occupies in the design.
#[derive(Debug, Clone, PartialEq)]
pub struct TermBlock {
    pub label: String,
    pub variables: Vec<String>,
    pub columns: Range<usize>,
}

/// How formula variables map to design columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignLayout {
    pub variables: BTreeMap<String, Variable>,
    pub terms: Vec<TermBlock>,
    pub column_names: Vec<String>,
}

impl DesignLayout {
    pub fn width(&self) -> usize {
        self.column_names.len()
    }

    pub fn factor_levels(&self, name: &str) -> Option<&[String]> {
        match self.variables.get(name)? {
            Variable::Factor { levels, .. } => Some(levels),
            Variable::Numeric { .. } => None,
        }
    }

    /// Encodes one row. Variables absent from `settings` are averaged.
    pub fn encode(&self, settings: &BTreeMap<&str, Setting>) -> DVector<f64> {
        let mut row = DVector::zeros(self.width());
        row[0] = 1.0;
        let encoded: BTreeMap<&str, Vec<f64>> = self
            .variables
            .iter()
            .map(|(name, variable)| {
                let setting = settings
                    .get(name.as_str())
                    .copied()
                    .unwrap_or(Setting::Average);
                (name.as_str(), variable.encode(setting))
            })
            .collect();
        for term in &self.terms {
            let mut values = vec![1.0];
            for variable in &term.variables {
                let columns = encoded.get(variable.as_str()).map_or(&[][..], Vec::as_slice);
                values = values
                    .iter()
                    .flat_map(|a| columns.iter().map(move |b| a * b))
                    .collect();
            }
            for (offset, value) in values.into_iter().enumerate() {
                row[term.columns.start + offset] = value;
            }
        }
        row
    }
}

/// A design matrix with its layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub layout: DesignLayout,
    pub matrix: DMatrix<f64>,
}

impl Design {
    /// Encodes `frame` under `formula` with an intercept column first.
    ///
    /// Every factor in the formula needs at least two observed levels.
    pub fn build(frame: &ModelFrame, formula: &FormulaSpec) -> Result<Self, ModelingError> {
        let mut variables = BTreeMap::new();
        for term in &formula.terms {
            for name in term.variables() {
                if variables.contains_key(name) {
                    continue;
                }
                let variable = if let Some(factor) = frame.factors.get(name) {
                    if factor.levels.len() < 2 {
                        return Err(ModelingError::InsufficientLevels {
                            factor: name.to_string(),
                            found: factor.levels.len(),
                        });
                    }
                    Variable::Factor {
                        levels: factor.levels.clone(),
                        coding: factor.coding,
                    }
                } else if let Some(values) = frame.numerics.get(name) {
                    let mean = if values.is_empty() {
                        0.0
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    };
                    Variable::Numeric { mean }
                } else {
                    return Err(ModelingError::UnknownTerm {
                        name: name.to_string(),
                    });
                };
                variables.insert(name.to_string(), variable);
            }
        }

        let mut column_names = vec!["(Intercept)".to_string()];
        let mut terms = Vec::with_capacity(formula.terms.len());
        for term in &formula.terms {
            let names = term.variables();
            let mut labels = vec![String::new()];
            for name in &names {
                let cols = variables
                    .get(*name)
                    .map(|v: &Variable| v.column_names(name))
                    .unwrap_or_default();
                labels = labels
                    .iter()
                    .flat_map(|prefix| {
                        cols.iter().map(move |c| {
                            if prefix.is_empty() {
                                c.clone()
                            } else {
                                format!("{prefix}:{c}")
                            }
                        })
                    })
                    .collect();
            }
            let start = column_names.len();
            column_names.extend(labels);
            terms.push(TermBlock {
                label: term.to_string(),
                variables: names.iter().map(|n| (*n).to_string()).collect(),
                columns: start..column_names.len(),
            });
        }

        let layout = DesignLayout {
            variables,
            terms,
            column_names,
        };

        let n = frame.len();
        let p = layout.width();
        let mut matrix = DMatrix::zeros(n, p);
        for i in 0..n {
            let mut settings = BTreeMap::new();
            for name in layout.variables.keys() {
                let setting = match (frame.factors.get(name), frame.numerics.get(name)) {
                    (Some(factor), _) => Setting::Level(factor.codes[i]),
                    (None, Some(values)) => Setting::Value(values[i]),
                    (None, None) => Setting::Average,
                };
                settings.insert(name.as_str(), setting);
            }
            matrix.set_row(i, &layout.encode(&settings).transpose());
        }
        Ok(Design { layout, matrix })
    }
}
