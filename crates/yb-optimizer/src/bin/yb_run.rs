use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;
use yb_data::RunWriter;
use yb_geometry::{GridSpec, YBranchGeometry};
use yb_optimizer::{Optimization, OptimizationOutcome};
use yb_sim::{probe_dependencies, LumericalSession, SurrogateSession};
use yb_types::{to_um, GradientMode, RunConfig};

/// Optimize a Y-branch splitter outline.
#[derive(Debug, Parser)]
#[command(name = "yb-run", version, about)]
struct Args {
    /// JSON run configuration; every field is optional.
    #[arg(long, env = "YB_CONFIG")]
    config: Option<PathBuf>,

    /// Use the analytic surrogate instead of the external solver.
    #[arg(long)]
    surrogate: bool,

    /// Finite-difference gradients instead of adjoint solves.
    #[arg(long)]
    finite_difference: bool,

    /// Directory that receives the run directory.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    max_iterations: Option<u64>,

    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = RunConfig::load(args.config.as_deref())?;
    if let Some(output) = &args.output {
        config.output_root = output.clone();
    }
    if args.finite_difference {
        config.optimizer.gradient_mode = GradientMode::FiniteDifference;
    }
    if let Some(n) = args.max_iterations {
        config.optimizer.max_iterations = n;
    }
    config.validate()?;

    // a missing solver is reported before anything is written
    let installation = if args.surrogate {
        None
    } else {
        Some(probe_dependencies(&config.solver)?)
    };
    let grid = GridSpec::from_config(&config.grid)?;
    let writer = RunWriter::create(&config)?;

    let outcome = match installation {
        Some(install) => {
            info!(binary = %install.binary.display(), "solver found");
            let session = LumericalSession::new(install, writer.layout().solver_dir(), grid)?
                .with_extra_args(config.solver.extra_args.clone());
            Optimization::new(config, session, writer)?.run()?
        }
        None => {
            info!("running against the analytic surrogate");
            let geometry = YBranchGeometry::from_config(&config.geometry)?;
            let session =
                SurrogateSession::reference(&geometry, grid)?.with_kind(config.solver.kind);
            Optimization::new(config, session, writer)?.run()?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }
    Ok(())
}

fn print_summary(outcome: &OptimizationOutcome) {
    println!("run directory   {}", outcome.run_dir.display());
    println!(
        "figure of merit {:.6} -> {:.6} (iteration {})",
        outcome.initial_fom, outcome.best_fom, outcome.best_iteration
    );
    println!(
        "iterations      {} ({} evaluations, {} solver calls)",
        outcome.iterations,
        outcome.evaluations,
        outcome.stats.solves()
    );
    println!("termination     {}", outcome.termination);
    let params: Vec<String> = outcome
        .best_params
        .iter()
        .map(|p| format!("{:.4}", to_um(*p)))
        .collect();
    println!("offsets (um)    [{}]", params.join(", "));
}
