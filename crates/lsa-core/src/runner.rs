//! Plan execution on a rayon worker pool.

use lsa_model::{AnalysisResults, ResultRow};
use lsa_stats::{MixedModelSolver, RemlSolver};
use rayon::ThreadPoolBuilder;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::analyses::run_task;
use crate::context::AnalysisContext;
use crate::plan::{AnalysisTask, analysis_plan};

/// Runs the whole battery described by `ctx.options`.
///
/// Tasks run in parallel; rows are collected in plan order, so the result
/// does not depend on scheduling. Failed models and comparisons become
/// omitted rows.
pub fn run_analyses(ctx: &AnalysisContext<'_>) -> AnalysisResults {
    let plan = analysis_plan(ctx.panel, ctx.options);
    run_plan(ctx, &plan)
}

/// Runs an explicit list of tasks.
pub fn run_plan(ctx: &AnalysisContext<'_>, plan: &[AnalysisTask]) -> AnalysisResults {
    let reference = RemlSolver::default();
    let solver: &dyn MixedModelSolver = ctx.solver.unwrap_or(&reference);
    tracing::info!(
        tasks = plan.len(),
        workers = ?ctx.options.workers,
        "running analysis plan"
    );

    let execute = || -> Vec<Vec<ResultRow>> {
        plan.par_iter()
            .map(|task| {
                let _span = tracing::debug_span!("task", task = %task).entered();
                run_task(ctx, solver, task)
            })
            .collect()
    };
    let outputs = match ctx.options.workers {
        Some(workers) => match ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(execute),
            Err(error) => {
                tracing::warn!(workers, %error, "worker pool unavailable; using global pool");
                execute()
            }
        },
        None => execute(),
    };

    let mut results = AnalysisResults::default();
    for analysis in &ctx.options.analyses {
        results.table_mut(*analysis);
    }
    for (task, rows) in plan.iter().zip(outputs) {
        let table = results.table_mut(task.analysis);
        for row in rows {
            table.push(row);
        }
    }
    tracing::info!(
        computed = results.computed_count(),
        omitted = results.omitted_count(),
        "analysis plan finished"
    );
    results
}
