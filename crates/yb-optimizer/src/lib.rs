//! # yb-optimizer
//!
//! Gradient-based shape optimization of the Y-branch outline.
//!
//! [`Optimization`] connects a [`yb_sim::SolverSession`] to a run directory
//! and lets L-BFGS move the spline control points. Gradients come from one
//! adjoint solve per evaluation or, as a fallback, from forward finite
//! differences.

mod driver;
mod gradient;
mod latent;
mod phase;

pub use driver::{Evaluation, Optimization, OptimizationOutcome};
pub use gradient::{adjoint_gradient, finite_difference_gradient};
pub use latent::LatentMap;
pub use phase::{Phase, PhaseLog};
