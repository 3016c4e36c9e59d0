//! L-BFGS shape optimization over a solver session.
//!
//! argmin drives the iterations. Every figure-of-merit evaluation is one
//! forward solve plus either one adjoint solve or one extra forward solve
//! per parameter. Results are cached by point, so the separate `cost` and
//! `gradient` calls argmin makes for the same point share one evaluation.
//! An observer persists a record after each accepted step, and the run
//! directory is finished off with the best design once the loop ends.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use argmin::core::observers::{Observe, ObserverMode};
use argmin::core::{
    CostFunction, Error, Executor, Gradient, OptimizationResult, State, TerminationReason, KV,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use yb_data::{plot_fom_history, plot_shape, RunLayout, RunWriter};
use yb_geometry::{write_gds, GridSpec, LayoutOptions, YBranchGeometry};
use yb_sim::{SessionStats, SimulationSetup, SolverSession};
use yb_types::{
    config_error, internal_error, GradientMode, IterationRecord, OptimizerConfig, RunConfig,
    RunStatus, YbError, YbResult,
};

use crate::gradient::{adjoint_gradient, finite_difference_gradient};
use crate::latent::LatentMap;
use crate::phase::{Phase, PhaseLog};

/// Evaluations kept for lookup; covers a full line search.
const RECENT_EVALUATIONS: usize = 32;

/// Figure of merit and its gradient at one design.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub latent: Vec<f64>,
    /// Offsets in metres.
    pub params: Vec<f64>,
    pub fom: f64,
    /// dFOM/dparam.
    pub gradient: Vec<f64>,
    pub transmission: Vec<f64>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationOutcome {
    pub run_dir: PathBuf,
    pub initial_fom: f64,
    pub best_fom: f64,
    pub best_iteration: u64,
    pub best_params: Vec<f64>,
    pub iterations: u64,
    pub evaluations: u64,
    pub converged: bool,
    pub termination: String,
    pub project: PathBuf,
    pub stats: SessionStats,
}

/// State shared between the cost function, the observer and the driver.
struct Progress {
    phases: PhaseLog,
    recent: VecDeque<Evaluation>,
    initial: Option<Evaluation>,
    evaluations: u64,
    series: Vec<(u64, f64)>,
    mode: GradientMode,
    writer: RunWriter,
    status: RunStatus,
}

impl Progress {
    fn lookup(&self, latent: &[f64]) -> Option<Evaluation> {
        self.recent
            .iter()
            .rev()
            .find(|e| e.latent.as_slice() == latent)
            .cloned()
    }

    fn remember(&mut self, evaluation: Evaluation) {
        self.evaluations += 1;
        if self.initial.is_none() {
            info!(fom = evaluation.fom, "initial design evaluated");
            self.series.push((0, evaluation.fom));
            self.initial = Some(evaluation.clone());
        }
        if self.recent.len() == RECENT_EVALUATIONS {
            self.recent.pop_front();
        }
        self.recent.push_back(evaluation);
    }

    /// Persist the step the optimizer just accepted.
    fn complete_iteration(&mut self, latent: &[f64]) -> YbResult<()> {
        self.phases.enter(Phase::UpdateParameters);
        let evaluation = self
            .lookup(latent)
            .ok_or_else(|| internal_error!("accepted point was never evaluated"))?;

        self.phases.enter(Phase::CheckConvergence);
        let iteration = self.status.iterations_completed + 1;
        let record = IterationRecord::new(
            iteration,
            evaluation.params.clone(),
            evaluation.fom,
            evaluation.gradient.clone(),
        )
        .with_evaluations(self.evaluations)
        .with_gradient_mode(self.mode);

        self.writer.append_iteration(&record)?;
        self.writer
            .write_parameters(iteration, record.fom, &record.params)?;
        self.status.record_iteration(&record);
        self.writer.write_status(&self.status)?;
        self.series.push((iteration, record.fom));

        info!(
            iteration,
            fom = record.fom,
            gradient_norm = record.gradient_norm(),
            evaluations = self.evaluations,
            "iteration complete"
        );
        Ok(())
    }
}

/// argmin problem: minimise `-FOM` over the latent coordinates.
struct FomProblem<'a, S: SolverSession> {
    session: RefCell<&'a mut S>,
    geometry: &'a YBranchGeometry,
    grid: &'a GridSpec,
    latent: &'a LatentMap,
    settings: &'a OptimizerConfig,
    progress: Arc<Mutex<Progress>>,
}

impl<S: SolverSession> FomProblem<'_, S> {
    fn enter(&self, phase: Phase) {
        self.progress.lock().phases.enter(phase);
    }

    fn ensure_evaluated(&self, latent: &[f64]) -> Result<Evaluation, Error> {
        if let Some(hit) = self.progress.lock().lookup(latent) {
            return Ok(hit);
        }
        let evaluation = self.evaluate(latent).map_err(Error::from)?;
        self.progress.lock().remember(evaluation.clone());
        Ok(evaluation)
    }

    fn evaluate(&self, latent: &[f64]) -> YbResult<Evaluation> {
        let params = self.latent.to_params(latent);
        let polygon = self.geometry.create_polygon(&params)?;
        let mut session = self.session.borrow_mut();

        self.enter(Phase::ForwardSimulate);
        session.update_geometry(&polygon, self.geometry.depth())?;
        let forward = session.forward_solve()?;

        let gradient = match self.settings.gradient_mode {
            GradientMode::Adjoint => {
                self.enter(Phase::AdjointSimulate);
                let sensitivity = session.adjoint_solve()?;
                sensitivity.ensure_matches(self.grid)?;
                self.enter(Phase::ComputeGradient);
                adjoint_gradient(
                    self.geometry,
                    self.grid,
                    &params,
                    &sensitivity,
                    self.settings.geometry_step,
                )?
            }
            GradientMode::FiniteDifference => {
                self.enter(Phase::ComputeGradient);
                finite_difference_gradient(
                    &mut **session,
                    self.geometry,
                    &params,
                    forward.fom,
                    self.settings.fd_step,
                )?
            }
        };
        debug!(fom = forward.fom, "design evaluated");

        Ok(Evaluation {
            latent: latent.to_vec(),
            params,
            fom: forward.fom,
            gradient,
            transmission: forward.transmission,
        })
    }
}

impl<S: SolverSession> CostFunction for FomProblem<'_, S> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, latent: &Self::Param) -> Result<Self::Output, Error> {
        Ok(-self.ensure_evaluated(latent)?.fom)
    }
}

impl<S: SolverSession> Gradient for FomProblem<'_, S> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, latent: &Self::Param) -> Result<Self::Gradient, Error> {
        let evaluation = self.ensure_evaluated(latent)?;
        Ok(self
            .latent
            .pull_back(latent, &evaluation.gradient)
            .into_iter()
            .map(|g| -g)
            .collect())
    }
}

struct IterationObserver {
    progress: Arc<Mutex<Progress>>,
}

impl<I> Observe<I> for IterationObserver
where
    I: State<Param = Vec<f64>, Float = f64>,
{
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        let latent = state
            .get_param()
            .ok_or_else(|| Error::msg("optimizer state carries no parameters"))?;
        self.progress
            .lock()
            .complete_iteration(latent)
            .map_err(Error::from)
    }
}

struct Termination {
    reason: String,
    converged: bool,
}

/// One optimization run: a solver session, a run directory and the
/// parameterisation connecting them.
pub struct Optimization<S: SolverSession> {
    config: RunConfig,
    geometry: YBranchGeometry,
    grid: GridSpec,
    latent: LatentMap,
    layout: RunLayout,
    session: S,
    progress: Arc<Mutex<Progress>>,
}

impl<S: SolverSession> Optimization<S> {
    pub fn new(config: RunConfig, session: S, writer: RunWriter) -> YbResult<Self> {
        config.validate()?;
        if session.kind() != config.solver.kind {
            return Err(config_error!(
                "session runs {} but the configuration asks for {}",
                session.kind(),
                config.solver.kind
            ));
        }
        let geometry = YBranchGeometry::from_config(&config.geometry)?;
        let grid = GridSpec::from_config(&config.grid)?;
        let latent = LatentMap::new(geometry.bounds());
        let layout = writer.layout().clone();

        let mode = config.optimizer.gradient_mode;
        let status = RunStatus::new(config.name.clone(), mode);
        writer.write_status(&status)?;

        Ok(Self {
            config,
            geometry,
            grid,
            latent,
            layout,
            session,
            progress: Arc::new(Mutex::new(Progress {
                phases: PhaseLog::default(),
                recent: VecDeque::with_capacity(RECENT_EVALUATIONS),
                initial: None,
                evaluations: 0,
                series: Vec::new(),
                mode,
                writer,
                status,
            })),
        })
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn status(&self) -> RunStatus {
        self.progress.lock().status.clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.progress.lock().phases.history().to_vec()
    }

    /// Run to termination. Solver and geometry errors abort the run
    /// unchanged; the status file is marked failed first.
    pub fn run(&mut self) -> YbResult<OptimizationOutcome> {
        match self.execute() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "optimization failed");
                let mut progress = self.progress.lock();
                progress.phases.enter(Phase::Terminate);
                progress.status.mark_failed(e.to_string());
                if let Err(write_err) = progress.writer.write_status(&progress.status) {
                    warn!(error = %write_err, "could not record failure");
                }
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> YbResult<OptimizationOutcome> {
        {
            let mut progress = self.progress.lock();
            progress.status.mark_running();
            progress.writer.write_status(&progress.status)?;
        }
        let settings = &self.config.optimizer;
        info!(
            name = %self.config.name,
            solver = %self.session.kind(),
            mode = %settings.gradient_mode,
            parameters = self.geometry.parameter_count(),
            max_iterations = settings.max_iterations,
            run_dir = %self.layout.root().display(),
            "starting optimization"
        );

        let setup = SimulationSetup::from_config(&self.config);
        self.session.load_base(&setup)?;
        let initial = self.geometry.check_params(self.geometry.initial_params())?;
        let start = self.latent.to_latent(&initial);

        let problem = FomProblem {
            session: RefCell::new(&mut self.session),
            geometry: &self.geometry,
            grid: &self.grid,
            latent: &self.latent,
            settings,
            progress: Arc::clone(&self.progress),
        };
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, settings.lbfgs_memory)
            .with_tolerance_cost(settings.fom_tolerance)
            .map_err(|e| YbError::Optimizer(e.to_string()))?;
        let observer = IterationObserver {
            progress: Arc::clone(&self.progress),
        };

        let result = Executor::new(problem, solver)
            .configure(|state| state.param(start).max_iters(settings.max_iterations))
            .add_observer(observer, ObserverMode::Always)
            .run();
        let termination = conclude(result, &self.progress)?;

        self.finish(termination)
    }

    /// Write the final artifacts for the best design seen.
    fn finish(&mut self, termination: Termination) -> YbResult<OptimizationOutcome> {
        let (best, initial_fom) = {
            let mut progress = self.progress.lock();
            progress.phases.enter(Phase::Terminate);
            let initial = progress
                .initial
                .clone()
                .ok_or_else(|| internal_error!("optimizer finished without evaluating"))?;
            let best = match &progress.status.best {
                Some(record) if record.fom >= initial.fom => {
                    (record.iteration, record.fom, record.params.clone())
                }
                _ => (0, initial.fom, initial.params.clone()),
            };
            (best, initial.fom)
        };
        let (best_iteration, best_fom, best_params) = best;

        let polygon = self.geometry.create_polygon(&best_params)?;
        self.session
            .update_geometry(&polygon, self.geometry.depth())?;
        let project = self
            .session
            .save_project(&self.layout.project_path(self.session.kind()))?;

        let options = LayoutOptions {
            layer: self.config.geometry.gds_layer,
            datatype: self.config.geometry.gds_datatype,
            ..LayoutOptions::default()
        };
        write_gds(&polygon, &self.layout.layout_path(), &options)?;

        let mut progress = self.progress.lock();
        progress
            .writer
            .write_parameters(best_iteration, best_fom, &best_params)?;
        let title = format!("{} figure of merit", self.config.name);
        if let Err(e) = plot_fom_history(&progress.series, &self.layout.plot_path(), &title) {
            warn!(error = %e, "skipping figure-of-merit plot");
        }
        let shape_title = format!("{} design, iteration {}", self.config.name, best_iteration);
        let knots = self.geometry.control_points(&best_params);
        if let Err(e) = plot_shape(&polygon, &knots, &self.layout.shape_plot_path(), &shape_title) {
            warn!(error = %e, "skipping shape plot");
        }
        progress.status.mark_completed();
        progress.writer.write_status(&progress.status)?;

        let outcome = OptimizationOutcome {
            run_dir: self.layout.root().to_path_buf(),
            initial_fom,
            best_fom,
            best_iteration,
            best_params,
            iterations: progress.status.iterations_completed,
            evaluations: progress.evaluations,
            converged: termination.converged,
            termination: termination.reason,
            project,
            stats: self.session.stats(),
        };
        info!(
            best_fom = outcome.best_fom,
            best_iteration = outcome.best_iteration,
            iterations = outcome.iterations,
            evaluations = outcome.evaluations,
            termination = %outcome.termination,
            "optimization finished"
        );
        Ok(outcome)
    }
}

/// Turn the executor result into a termination summary. Errors raised by
/// our own code come back as the original `YbError`. Failures inside the
/// optimizer itself (a line search that cannot make progress) end the run
/// normally once at least one iteration has been recorded.
fn conclude<O, Sv, I>(
    result: Result<OptimizationResult<O, Sv, I>, Error>,
    progress: &Mutex<Progress>,
) -> YbResult<Termination>
where
    I: State,
{
    match result {
        Ok(result) => {
            let reason = result.state().get_termination_reason();
            Ok(Termination {
                converged: matches!(reason, Some(TerminationReason::SolverConverged)),
                reason: reason
                    .map(|r| format!("{r:?}"))
                    .unwrap_or_else(|| "not terminated".to_string()),
            })
        }
        Err(err) => match err.downcast::<YbError>() {
            Ok(e) => Err(e),
            Err(other) => {
                if progress.lock().status.iterations_completed == 0 {
                    return Err(YbError::Optimizer(other.to_string()));
                }
                warn!(error = %other, "optimizer stopped early");
                Ok(Termination {
                    reason: other.to_string(),
                    converged: false,
                })
            }
        },
    }
}
