//! run-build-plan - run ordered build and deploy steps, stopping at the first failure.

use clap::Parser;
use run_build_plan::config::{ConfigLoader, StepConfig, env};
use run_build_plan::{PlannedRun, Result, RunReport};
use std::path::PathBuf;
use std::time::Duration;

/// Run ordered build and deploy steps, stopping at the first failure
#[derive(Parser)]
#[command(name = "run-build-plan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Plan file (.toml, or tab-separated for any other extension)
    #[arg(short, long, value_name = "FILE")]
    plan: Option<PathBuf>,

    /// Project root that step directories are relative to
    #[arg(short, long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Validate directories and print the steps without executing them
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print the plan as JSON
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// Run only the named step
    #[arg(long, value_name = "STEP")]
    only: Option<String>,

    /// Default per-step timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log each step as it runs
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(plan) = &cli.plan {
        loader = loader.plan_file(plan);
    }
    if let Some(root) = &cli.root {
        loader = loader.project_root(root);
    }
    let (config, project_root) = loader.load()?;

    init_tracing(cli.verbose || config.settings.verbose);

    let mut builder = run_build_plan::builder()
        .with_config(config)
        .project_root(project_root)
        .dry_run(cli.dry_run);
    if let Some(name) = &cli.only {
        builder = builder.only(name);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.default_timeout(Duration::from_secs(secs));
    }
    let planned = builder.build()?;

    if cli.dry_run {
        if cli.json {
            let steps: Vec<StepConfig> = planned.plan().steps().iter().map(StepConfig::from).collect();
            println!("{}", serde_json::to_string_pretty(&steps)?);
        } else {
            print_plan(&planned);
        }
        if cli.verbose {
            for (key, value) in env::detect_active_overrides() {
                eprintln!("override: {key}={value}");
            }
        }
    }

    let report = planned.run()?;
    report_success(&report);
    Ok(())
}

fn print_plan(planned: &PlannedRun) {
    let plan = planned.plan();
    println!(
        "Build plan: {} step(s), root {}",
        plan.len(),
        planned.context().project_root.display()
    );

    let width = plan
        .steps()
        .iter()
        .map(|s| s.label().len())
        .max()
        .unwrap_or(0);
    let mut ordinal = 0;
    for step in plan.steps() {
        let marker = if step.enabled {
            ordinal += 1;
            format!("{ordinal:>3}.")
        } else {
            "   -".to_string()
        };
        let disabled = if step.enabled { "" } else { "  (disabled)" };
        println!(
            "{marker} {:<width$}  [{}] {}{disabled}",
            step.label(),
            step.working_dir.display(),
            step.command_line(),
        );
    }
}

fn report_success(report: &RunReport) {
    if report.dry_run {
        tracing::info!("dry run: {} step(s) validated", report.steps.len());
    } else {
        tracing::info!(
            skipped = report.skipped.len(),
            "{} step(s) completed in {:?}",
            report.executed(),
            report.total_duration()
        );
    }
}

/// Initialize tracing/logging to stderr.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,run_build_plan=info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}
