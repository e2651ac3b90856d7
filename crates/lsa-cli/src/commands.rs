use anyhow::Result;
use chrono::Utc;
use tracing::info;

use lsa_cli::output::{OutputFormat, ResultDocument, write_results};
use lsa_cli::pipeline::{prepare_study, run_battery};

use crate::cli::{HarmonizeArgs, ResultFormat, RunArgs};
use crate::summary::{print_harmonize_summary, print_run_summary};

/// Runs the battery; returns whether any comparison was omitted.
pub fn run_study(args: &RunArgs) -> Result<bool> {
    let study = prepare_study(&args.config)?;
    let results = run_battery(&study, args.workers);
    print_run_summary(&study, &results);

    if let Some(path) = &args.output {
        let document = ResultDocument::new(
            &study.config.study.name,
            &study.fingerprints,
            &results,
            Utc::now(),
        );
        let format = match args.format {
            ResultFormat::Json => OutputFormat::Json,
            ResultFormat::Csv => OutputFormat::Csv,
        };
        write_results(path, format, &document)?;
        println!("Results: {}", path.display());
    }
    info!(
        computed = results.computed_count(),
        omitted = results.omitted_count(),
        "run complete"
    );
    Ok(results.omitted_count() > 0)
}

pub fn run_harmonize(args: &HarmonizeArgs) -> Result<()> {
    let study = prepare_study(&args.config)?;
    print_harmonize_summary(&study);
    Ok(())
}
