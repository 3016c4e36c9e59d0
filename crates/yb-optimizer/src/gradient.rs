//! Gradients of the figure of merit with respect to the shape parameters.

use tracing::debug;
use yb_geometry::{rasterize, GridSpec, YBranchGeometry};
use yb_sim::{SensitivityGrid, SolverSession};
use yb_types::{GeometryResult, YbResult};

/// Adjoint gradient.
///
/// The sensitivity grid holds dFOM/d(fill) per cell. Each parameter is
/// nudged by `step`, the outline is re-rasterized, and the change in fill
/// is projected onto the sensitivity. No solver calls are made.
pub fn adjoint_gradient(
    geometry: &YBranchGeometry,
    grid: &GridSpec,
    params: &[f64],
    sensitivity: &SensitivityGrid,
    step: f64,
) -> GeometryResult<Vec<f64>> {
    let base = rasterize(&geometry.outline(params)?, grid);
    let mut perturbed = params.to_vec();
    let mut gradient = Vec::with_capacity(params.len());
    for i in 0..params.len() {
        perturbed[i] = params[i] + step;
        let fill = rasterize(&geometry.outline(&perturbed)?, grid);
        gradient.push(sensitivity.project(&fill.difference_quotient(&base, step)));
        perturbed[i] = params[i];
    }
    Ok(gradient)
}

/// One-sided finite-difference gradient: one forward solve per parameter.
///
/// Steps backwards where a forward step would leave the upper bound. The
/// session is left holding the last perturbed geometry.
pub fn finite_difference_gradient<S: SolverSession + ?Sized>(
    session: &mut S,
    geometry: &YBranchGeometry,
    params: &[f64],
    base_fom: f64,
    step: f64,
) -> YbResult<Vec<f64>> {
    let upper = geometry.bounds().upper();
    let mut perturbed = params.to_vec();
    let mut gradient = Vec::with_capacity(params.len());
    for i in 0..params.len() {
        let h = if params[i] + step <= upper[i] { step } else { -step };
        perturbed[i] = params[i] + h;
        let polygon = geometry.create_polygon(&perturbed)?;
        session.update_geometry(&polygon, geometry.depth())?;
        let fom = session.forward_solve()?.fom;
        gradient.push((fom - base_fom) / h);
        debug!(index = i, fom, "finite-difference probe");
        perturbed[i] = params[i];
    }
    Ok(gradient)
}
