use anyhow::{anyhow, Result};
use clap::Parser;
use colored::control::set_override as set_color_override;
use colored::Colorize;
use sspec_harness::backend::{CancelFlag, DisplayService};
use sspec_harness::cases::CaseStore;
use sspec_harness::compare::{compare_stored, compare_stored_to_ideal, print_human};
use sspec_harness::engine::{render_summary, run_single, run_store, RunOptions};
use sspec_harness::types::Outcome;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Run sspec conformance cases against a display service and compare the results against its expected baseline"
)]
struct Cli {
    /// Root directory of the case store
    #[arg(value_name = "CASES_ROOT", default_value = "cases")]
    cases: PathBuf,

    /// Display service to run against
    #[arg(short = 'd', long, value_name = "NAME")]
    display: String,

    /// Configuration variant of the display service (default: the service's first)
    #[arg(short = 'C', long, value_name = "VARIANT")]
    config: Option<String>,

    /// Run a single case file ad hoc, print its outcome, and exit; no
    /// results file is written and no comparison runs
    #[arg(long, value_name = "FILE", conflicts_with = "no_compare")]
    one: Option<PathBuf>,

    /// Override the backend runner executable
    #[arg(long, value_name = "CMD")]
    runner: Option<String>,

    /// Override the interpreter the runner is launched through
    #[arg(long, value_name = "CMD", conflicts_with = "no_runtime")]
    runtime: Option<String>,

    /// Launch the runner directly, without an interpreter
    #[arg(long)]
    no_runtime: bool,

    /// Per-case timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout: u64,

    /// Run cases one at a time instead of in parallel
    #[arg(long)]
    serial: bool,

    /// Number of parallel workers (default: available parallelism)
    #[arg(short = 'j', long, value_name = "N", conflicts_with = "serial")]
    jobs: Option<usize>,

    /// Root directory for persisted results and baselines
    #[arg(long, value_name = "DIR", default_value = "results")]
    results_root: PathBuf,

    /// Write the results file but skip the baseline comparison
    #[arg(long)]
    no_compare: bool,

    /// Compare against the cross-backend ideal baseline instead of the
    /// display-specific expectation
    #[arg(long)]
    ideal: bool,

    /// Suppress per-case output and backend stdout/stderr
    #[arg(short = 'q', long = "silent")]
    silent: bool,

    #[arg(short = 'v', long)]
    verbose: bool,

    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "sspec_harness=info".to_string())
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "sspec_harness=warn".to_string())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Colors: default on, --no-color turns off
    set_color_override(!cli.no_color);

    let mut service = DisplayService::builtin(&cli.display, cli.config.as_deref())?;
    if let Some(runner) = &cli.runner {
        service.runner = runner.trim().to_string();
    }
    if cli.no_runtime {
        service.runtime = None;
    } else if let Some(runtime) = &cli.runtime {
        service.runtime = Some(runtime.trim().to_string());
    }
    service.timeout = Duration::from_secs(cli.timeout);
    service.quiet = cli.silent;

    // Fail fast on configuration errors instead of erroring every case
    if let Err(e) = service.validate() {
        error!("backend validation failed: {e:#}");
        std::process::exit(2);
    }

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|e| anyhow!("failed to size worker pool: {e}"))?;
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupt received, stopping in-flight backends...");
                cancel.cancel();
            }
        });
    }

    if let Some(case_file) = cli.one.clone() {
        let svc = service.clone();
        let flag = cancel.clone();
        let (outcome, result) =
            tokio::task::spawn_blocking(move || run_single(&svc, &case_file, &flag)).await??;
        if cli.verbose {
            info!(?result, "raw execution result");
        }
        println!("{outcome}");
        std::process::exit(if outcome == Outcome::Pass { 0 } else { 1 });
    }

    let store = CaseStore::discover(&cli.cases)?;
    if store.is_empty() {
        error!("no .sspec case files found under {}", cli.cases.display());
        std::process::exit(2);
    }

    let opts = RunOptions {
        serial: cli.serial,
        announce: !cli.silent,
    };
    let (report, summary) = {
        let svc = service.clone();
        let flag = cancel.clone();
        tokio::task::spawn_blocking(move || run_store(&store, &svc, opts, &flag)).await?
    }
    .map_err(|e| {
        if cancel.is_cancelled() {
            eprintln!("run cancelled");
            std::process::exit(130);
        }
        e
    })?;

    let path = report.complete(&cli.results_root)?;
    if !cli.silent {
        println!("{}", render_summary(&summary));
        println!("Wrote results to {}", path.display().to_string().bold());
    }

    if cli.no_compare {
        return Ok(());
    }
    let cmp = if cli.ideal {
        compare_stored_to_ideal(&cli.results_root, &service.display, &service.config)?
    } else {
        compare_stored(&cli.results_root, &service.display, &service.config)?
    };
    print_human(&cmp, &service.display, &service.config);
    if !cmp.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
