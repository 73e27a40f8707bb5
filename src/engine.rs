use crate::backend::{CancelFlag, DisplayService, ExecutionRequest, ExecutionResult};
use crate::cases::{load_case, CaseRef, CaseStore};
use crate::normalize::normalize;
use crate::report::ReportResults;
use crate::types::{Outcome, RunSummary};
use anyhow::{anyhow, Result};
use colored::Colorize;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Opt out of the default parallel execution.
    pub serial: bool,
    /// Print a per-case outcome line as cases finish.
    pub announce: bool,
}

struct SweepState {
    report: ReportResults,
    summary: RunSummary,
}

/// Run every case in the store against one display service.
///
/// Transport failures become `error` outcomes and the sweep continues; a
/// malformed case file or a duplicate report aborts the whole run, as does
/// cancellation. Workers share one mutex-guarded accumulator.
pub fn run_store(
    store: &CaseStore,
    service: &DisplayService,
    opts: RunOptions,
    cancel: &CancelFlag,
) -> Result<(ReportResults, RunSummary)> {
    let state = Mutex::new(SweepState {
        report: ReportResults::new(&service.display, &service.config),
        summary: RunSummary::default(),
    });
    let refs: Vec<&CaseRef> = store.cases().collect();
    info!(
        display = %service.display,
        config = %service.config,
        cases = refs.len(),
        categories = store.categories().len(),
        "starting sweep"
    );

    let run_one = |case: &&CaseRef| run_case(service, case, opts, cancel, &state);
    if opts.serial {
        refs.iter().try_for_each(run_one)?;
    } else {
        refs.par_iter().try_for_each(run_one)?;
    }

    let state = state.into_inner().expect("poisoned sweep state lock");
    Ok((state.report, state.summary))
}

fn run_case(
    service: &DisplayService,
    case: &CaseRef,
    opts: RunOptions,
    cancel: &CancelFlag,
    state: &Mutex<SweepState>,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(anyhow!("run cancelled"));
    }
    let loaded = load_case(&case.file)?;
    let request = ExecutionRequest {
        category: case.category.clone(),
        test_name: case.test_name.clone(),
        app_code: loaded.app_code().to_string(),
        test_code: loaded.test_code().to_string(),
        extra_env: vec![],
    };
    let result = match service.execute(&request, cancel) {
        Ok(result) => result,
        Err(e) => ExecutionResult::TransportFailure(e.to_string()),
    };
    // A cancelled wait surfaces as a transport failure; don't record it.
    if cancel.is_cancelled() {
        return Err(anyhow!("run cancelled"));
    }
    if let ExecutionResult::TransportFailure(reason) = &result {
        warn!(
            category = %case.category,
            test = %case.test_name,
            %reason,
            "transport failure"
        );
    }
    let outcome = normalize(&result, &service.tags);

    let mut state = state.lock().expect("poisoned sweep state lock");
    state.summary.count(outcome);
    state
        .report
        .report(outcome, &case.test_name, &case.category)?;
    drop(state);

    if opts.announce {
        println!(
            "{} {} / {}",
            outcome_label(outcome),
            case.category,
            case.test_name
        );
    }
    Ok(())
}

/// Ad-hoc single-case run for debugging one fixture. The category is taken
/// from the file's parent directory name.
pub fn run_single(
    service: &DisplayService,
    case_file: &Path,
    cancel: &CancelFlag,
) -> Result<(Outcome, ExecutionResult)> {
    let loaded = load_case(case_file)?;
    let category = case_file
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let test_name = case_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let request = ExecutionRequest {
        category,
        test_name,
        app_code: loaded.app_code().to_string(),
        test_code: loaded.test_code().to_string(),
        extra_env: vec![],
    };
    let result = service.execute(&request, cancel)?;
    let outcome = normalize(&result, &service.tags);
    Ok((outcome, result))
}

fn outcome_label(outcome: Outcome) -> String {
    match outcome {
        Outcome::Pass => "[PASS]".green().bold().to_string(),
        Outcome::Fail => "[FAIL]".red().bold().to_string(),
        Outcome::Skip => "[SKIP]".yellow().bold().to_string(),
        Outcome::Error => "[ERROR]".red().bold().to_string(),
    }
}

pub fn render_summary(summary: &RunSummary) -> String {
    format!(
        "Total: {}, Passed: {}, Failed: {}, Skipped: {}, Errored: {}",
        summary.total,
        summary.passed.to_string().green(),
        if summary.failed > 0 {
            summary.failed.to_string().red().bold().to_string()
        } else {
            summary.failed.to_string().green().to_string()
        },
        summary.skipped.to_string().yellow(),
        if summary.errored > 0 {
            summary.errored.to_string().red().bold().to_string()
        } else {
            summary.errored.to_string().green().to_string()
        }
    )
}
