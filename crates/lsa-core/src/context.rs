use lsa_model::{AnalysisOptions, CovariateTable, Panel};
use lsa_stats::MixedModelSolver;
use lsa_transform::Phase;

/// Immutable inputs shared by every task of a run.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub panel: &'a Panel,
    pub covariates: &'a CovariateTable,
    pub options: &'a AnalysisOptions,
    /// Solver override; the REML reference solver is used when unset.
    pub solver: Option<&'a dyn MixedModelSolver>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        panel: &'a Panel,
        covariates: &'a CovariateTable,
        options: &'a AnalysisOptions,
    ) -> Self {
        Self {
            panel,
            covariates,
            options,
            solver: None,
        }
    }

    pub fn with_solver(mut self, solver: &'a dyn MixedModelSolver) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Phases of the run resolved against the panel's timepoint scale.
    pub fn phases(&self) -> Vec<Phase> {
        self.options
            .effective_phases(&self.panel.timepoints)
            .into_iter()
            .map(|(name, timepoints)| Phase::new(name, timepoints))
            .collect()
    }
}
