use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::prelude::*;
use yb_geometry::YBranchGeometry;
use yb_monitor::{
    render_plot, render_shape, resolve_run_dir, watch, MonitorReport, RunMonitor,
    DEFAULT_INTERVAL,
};
use yb_types::ENV_RUN_ROOT;

/// Report on the progress of an optimization run.
#[derive(Debug, Parser)]
#[command(name = "yb-monitor", version, about)]
struct Args {
    /// Run directory, or with --latest the folder holding run directories.
    #[arg(env = ENV_RUN_ROOT, default_value = "runs")]
    folder: PathBuf,

    /// Refresh until interrupted.
    #[arg(long)]
    watch: bool,

    /// Pick the most recently active run under FOLDER.
    #[arg(long)]
    latest: bool,

    /// Seconds between refreshes.
    #[arg(long, default_value_t = DEFAULT_INTERVAL.as_secs())]
    interval: u64,

    /// Write the figure-of-merit history PNG here.
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Write the outline of the latest recorded design here.
    #[arg(long)]
    shape: Option<PathBuf>,

    /// Print reports as JSON.
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let run_dir = resolve_run_dir(&args.folder, args.latest)?;
    let mut monitor = RunMonitor::open(&run_dir)?;
    let geometry = match &args.shape {
        Some(_) => Some(monitor.geometry()?),
        None => None,
    };

    if !args.watch {
        let report = monitor.poll();
        show(&report, args.json)?;
        if let Some(path) = &args.plot {
            render_plot(&report, path)?;
        }
        if let (Some(path), Some(geometry)) = (&args.shape, &geometry) {
            render_shape(&report, geometry, path)?;
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let period = Duration::from_secs(args.interval.max(1));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    runtime.block_on(watch(monitor, period, shutdown, |report| {
        if let Err(e) = show(report, args.json) {
            warn!(error = %e, "cannot print report");
        }
        if let Some(path) = &args.plot {
            refresh_plot(report, path);
        }
        if let (Some(path), Some(geometry)) = (&args.shape, &geometry) {
            refresh_shape(report, geometry, path);
        }
        ControlFlow::Continue(())
    }));
    Ok(())
}

fn show(report: &MonitorReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn refresh_plot(report: &MonitorReport, path: &Path) {
    if report.series.is_empty() {
        return;
    }
    if let Err(e) = render_plot(report, path) {
        warn!(error = %e, "plot not refreshed");
    }
}

fn refresh_shape(report: &MonitorReport, geometry: &YBranchGeometry, path: &Path) {
    if report.latest.is_none() {
        return;
    }
    if let Err(e) = render_shape(report, geometry, path) {
        warn!(error = %e, "shape plot not refreshed");
    }
}
