//! Spline-parameterized Y-branch outline.
//!
//! The device is mirror-symmetric about `y = 0`. Only the upper half is
//! parameterized: an outer edge running from the input port to the outer
//! side of the upper output arm, and an inner (split) edge running from the
//! split point to the inner side of that arm. The lower half is the mirror
//! image.

use tracing::trace;
use yb_types::{
    linspace, BoundsPolicy, GeometryConfig, GeometryError, GeometryResult, InnerEdgeConfig,
    ParameterBounds, UM,
};

use crate::polygon::{Point, Polygon};
use crate::spline::{CubicSpline, SplineBoundary};

/// Flat extension of the outer edge beyond the first and last knot.
const OUTER_EXTENSION: f64 = 0.1 * UM;
/// Lead-in of the inner spline ahead of the split point.
const INNER_LEAD: f64 = 0.05 * UM;
/// Extension of the inner spline beyond its last knot.
const INNER_EXTENSION: f64 = 0.1 * UM;

const OUTER_SAMPLES: usize = 100;
const INNER_SAMPLES: usize = 50;

#[derive(Debug, Clone, PartialEq)]
enum InnerEdge {
    Linear { split_x: f64 },
    Spline { knots_x: Vec<f64> },
}

/// Maps a control-point vector to a closed Y-branch polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct YBranchGeometry {
    outer_x: Vec<f64>,
    inner: InnerEdge,
    bounds: ParameterBounds,
    policy: BoundsPolicy,
    initial: Vec<f64>,
    waveguide_width: f64,
    min_gap: f64,
    depth: f64,
    core_index: f64,
}

impl YBranchGeometry {
    pub fn from_config(config: &GeometryConfig) -> GeometryResult<Self> {
        if config.outer_points < 2 {
            return Err(GeometryError::InsufficientKnots {
                required: 2,
                actual: config.outer_points,
            });
        }
        let inner = match &config.inner {
            InnerEdgeConfig::Linear { split_x } => InnerEdge::Linear { split_x: *split_x },
            InnerEdgeConfig::Spline { points, x_max } => {
                if *points < 2 {
                    return Err(GeometryError::InsufficientKnots {
                        required: 2,
                        actual: *points,
                    });
                }
                InnerEdge::Spline {
                    knots_x: linspace(0.0, *x_max, *points),
                }
            }
        };

        let geometry = Self {
            outer_x: linspace(config.x_min, config.x_max, config.outer_points),
            inner,
            bounds: config.bounds.clone(),
            policy: config.bounds_policy,
            initial: config.initial_params.clone(),
            waveguide_width: config.waveguide_width,
            min_gap: config.min_gap,
            depth: config.depth,
            core_index: config.core_index,
        };

        if geometry.bounds.len() != geometry.parameter_count() {
            return Err(GeometryError::ParameterCount {
                expected: geometry.parameter_count(),
                actual: geometry.bounds.len(),
            });
        }
        Ok(geometry)
    }

    pub fn parameter_count(&self) -> usize {
        self.outer_x.len() + self.inner_count()
    }

    pub fn outer_count(&self) -> usize {
        self.outer_x.len()
    }

    fn inner_count(&self) -> usize {
        match &self.inner {
            InnerEdge::Linear { .. } => 0,
            InnerEdge::Spline { knots_x } => knots_x.len(),
        }
    }

    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    pub fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    pub fn initial_params(&self) -> &[f64] {
        &self.initial
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn core_index(&self) -> f64 {
        self.core_index
    }

    pub fn waveguide_width(&self) -> f64 {
        self.waveguide_width
    }

    /// x of the output-side end of the outline.
    pub fn output_x(&self) -> f64 {
        self.outer_x[self.outer_x.len() - 1] + OUTER_EXTENSION
    }

    /// x of the input-side end of the outline.
    pub fn input_x(&self) -> f64 {
        self.outer_x[0] - OUTER_EXTENSION
    }

    /// Apply the bounds policy to a raw parameter vector.
    pub fn check_params(&self, params: &[f64]) -> GeometryResult<Vec<f64>> {
        self.bounds.enforce(params, self.policy)
    }

    /// Validated polygon for a parameter vector: bounds enforced, outline
    /// built, and self-intersecting outlines refused.
    pub fn create_polygon(&self, params: &[f64]) -> GeometryResult<Polygon> {
        let params = self.check_params(params)?;
        let polygon = self.outline(&params)?;
        if let Some((first, second)) = polygon.find_self_intersection() {
            return Err(GeometryError::SelfIntersecting { first, second });
        }
        Ok(polygon)
    }

    /// Build the outline without bounds or simplicity checks. Used for
    /// small boundary perturbations when differentiating the fill pattern.
    pub fn outline(&self, params: &[f64]) -> GeometryResult<Polygon> {
        if params.len() != self.parameter_count() {
            return Err(GeometryError::ParameterCount {
                expected: self.parameter_count(),
                actual: params.len(),
            });
        }
        let (outer_params, inner_params) = params.split_at(self.outer_x.len());

        let upper_outer = self.outer_edge(outer_params)?;
        let upper_inner = self.inner_edge(outer_params, inner_params)?;

        trace!(
            outer = upper_outer.len(),
            inner = upper_inner.len(),
            "assembling y-branch outline"
        );

        let mut points = Vec::with_capacity(2 * (upper_outer.len() + upper_inner.len()));
        // upper outer, left to right
        points.extend(upper_outer.iter().copied());
        // upper inner, right to left
        points.extend(upper_inner.iter().rev().copied());
        // lower inner, left to right
        points.extend(upper_inner.iter().map(|p| Point::new(p.x, -p.y)));
        // lower outer, right to left
        points.extend(upper_outer.iter().rev().map(|p| Point::new(p.x, -p.y)));

        Ok(Polygon::new(points))
    }

    fn outer_edge(&self, outer_params: &[f64]) -> GeometryResult<Vec<Point>> {
        let spline = extended_spline(
            &self.outer_x,
            outer_params,
            OUTER_EXTENSION,
            OUTER_EXTENSION,
        )?;
        Ok(spline
            .sample(OUTER_SAMPLES)
            .into_iter()
            .map(Point::from)
            .collect())
    }

    fn inner_edge(&self, outer_params: &[f64], inner_params: &[f64]) -> GeometryResult<Vec<Point>> {
        let x_end = self.output_x();
        match &self.inner {
            InnerEdge::Linear { split_x } => {
                let y_end = self.linear_inner_end(outer_params);
                Ok(linspace(*split_x, x_end, INNER_SAMPLES)
                    .into_iter()
                    .zip(linspace(0.0, y_end, INNER_SAMPLES))
                    .map(Point::from)
                    .collect())
            }
            InnerEdge::Spline { knots_x } => {
                let spline = extended_spline(knots_x, inner_params, INNER_LEAD, INNER_EXTENSION)?;
                let x_stop = knots_x[knots_x.len() - 1] + INNER_EXTENSION;
                let mut edge: Vec<Point> = linspace(0.0, x_stop, INNER_SAMPLES)
                    .into_iter()
                    .map(|x| Point::new(x, spline.evaluate(x).max(0.0)))
                    .collect();
                // Below the axis the two arms overlap; the split moves to the
                // last point of the leading run on the axis.
                let merged = edge.iter().take_while(|p| p.y == 0.0).count();
                edge.drain(..merged.saturating_sub(1));
                Ok(edge)
            }
        }
    }

    /// Inner edge height at the output for the linear split: one waveguide
    /// width below the outer edge, but never closer than half the minimum
    /// gap to the symmetry axis.
    fn linear_inner_end(&self, outer_params: &[f64]) -> f64 {
        let outer_end = outer_params[outer_params.len() - 1];
        (outer_end - self.waveguide_width).max(0.5 * self.min_gap)
    }

    /// Width of the upper output arm at the output port.
    pub fn port_width(&self, params: &[f64]) -> GeometryResult<f64> {
        if params.len() != self.parameter_count() {
            return Err(GeometryError::ParameterCount {
                expected: self.parameter_count(),
                actual: params.len(),
            });
        }
        let (outer_params, inner_params) = params.split_at(self.outer_x.len());
        let outer_end = outer_params[outer_params.len() - 1];
        let inner_end = match &self.inner {
            InnerEdge::Linear { .. } => self.linear_inner_end(outer_params),
            InnerEdge::Spline { .. } => inner_params[inner_params.len() - 1],
        };
        Ok(outer_end - inner_end)
    }

    /// Control points `(x, y)` for plotting: outer knots, then inner knots.
    pub fn control_points(&self, params: &[f64]) -> Vec<Point> {
        let inner_x: &[f64] = match &self.inner {
            InnerEdge::Linear { .. } => &[],
            InnerEdge::Spline { knots_x } => knots_x,
        };
        self.outer_x
            .iter()
            .chain(inner_x)
            .zip(params)
            .map(|(&x, &y)| Point::new(x, y))
            .collect()
    }
}

/// Spline through `(knots, values)` with one extra flat knot on either side,
/// so the edge meets the adjoining straight waveguide without a kink.
fn extended_spline(
    knots: &[f64],
    values: &[f64],
    lead: f64,
    tail: f64,
) -> GeometryResult<CubicSpline> {
    let n = knots.len();
    let mut x = Vec::with_capacity(n + 2);
    x.push(knots[0] - lead);
    x.extend_from_slice(knots);
    x.push(knots[n - 1] + tail);

    let mut y = Vec::with_capacity(n + 2);
    y.push(values[0]);
    y.extend_from_slice(values);
    y.push(values[n - 1]);

    CubicSpline::new(&x, &y, SplineBoundary::NotAKnot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> YBranchGeometry {
        YBranchGeometry::from_config(&GeometryConfig::default()).unwrap()
    }

    fn linear_params() -> Vec<f64> {
        linspace(0.3 * UM, 0.7 * UM, 10)
    }

    #[test]
    fn output_port_width_matches_waveguide() {
        let g = geometry();
        let params = linear_params();
        assert!((g.port_width(&params).unwrap() - 0.5 * UM).abs() < 1e-12);

        // measured on the outline itself: the vertical edge at the output end
        let polygon = g.create_polygon(&params).unwrap();
        let x_end = g.output_x();
        let at_port: Vec<f64> = polygon
            .vertices()
            .iter()
            .filter(|p| (p.x - x_end).abs() < 1e-15 && p.y > 0.0)
            .map(|p| p.y)
            .collect();
        let top = at_port.iter().cloned().fold(f64::MIN, f64::max);
        let bottom = at_port.iter().cloned().fold(f64::MAX, f64::min);
        assert!((top - bottom - 0.5 * UM).abs() < 1e-3 * UM);
    }

    #[test]
    fn in_bounds_outline_is_simple_and_symmetric() {
        let g = geometry();
        let candidates = [
            linear_params(),
            vec![0.5 * UM; 10],
            linspace(0.25 * UM, 0.8 * UM, 10),
            vec![
                0.30, 0.33, 0.38, 0.45, 0.52, 0.58, 0.63, 0.67, 0.69, 0.70,
            ]
            .into_iter()
            .map(|v| v * UM)
            .collect(),
        ];
        for params in candidates {
            let polygon = g.create_polygon(&params).unwrap();
            assert!(polygon.is_simple());
            assert!(polygon.area() > 0.0);
            let bb = polygon.bounding_box().unwrap();
            assert!((bb.max.y + bb.min.y).abs() < 1e-18);
            assert!((bb.min.x - g.input_x()).abs() < 1e-15);
            assert!((bb.max.x - g.output_x()).abs() < 1e-15);
        }
    }

    #[test]
    fn outline_is_continuous() {
        let g = geometry();
        let polygon = g.create_polygon(&linear_params()).unwrap();
        // no edge longer than the widest step between adjacent samples
        let longest = polygon
            .edges()
            .map(|(a, b)| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt())
            .fold(0.0, f64::max);
        assert!(longest < 1.2 * UM, "longest edge {longest}");
        let outer_step = (g.output_x() - g.input_x()) / (OUTER_SAMPLES - 1) as f64;
        let inner_step = g.output_x() / (INNER_SAMPLES - 1) as f64;
        let interior_longest = polygon
            .edges()
            .filter(|(a, b)| a.x != b.x)
            .map(|(a, b)| (b.x - a.x).abs())
            .fold(0.0, f64::max);
        assert!(interior_longest <= outer_step.max(inner_step) * 1.0001);
    }

    #[test]
    fn identical_params_give_identical_polygons() {
        let g = geometry();
        let params = linear_params();
        let a = g.create_polygon(&params).unwrap();
        let b = g.create_polygon(&params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_bounds_rejected_or_clamped() {
        let mut params = linear_params();
        params[3] = 0.9 * UM;

        let g = geometry();
        assert!(matches!(
            g.create_polygon(&params),
            Err(GeometryError::OutOfBounds { index: 3, .. })
        ));

        let mut config = GeometryConfig::default();
        config.bounds_policy = BoundsPolicy::Clamp;
        let clamping = YBranchGeometry::from_config(&config).unwrap();
        let checked = clamping.check_params(&params).unwrap();
        assert_eq!(checked[3], 0.8 * UM);
        assert!(clamping.create_polygon(&params).is_ok());
    }

    #[test]
    fn narrow_outer_edge_keeps_minimum_gap() {
        let g = geometry();
        let params = vec![0.3 * UM; 10];
        // 0.3 - 0.5 would cross the axis; the inner edge stops at min_gap / 2
        let width = g.port_width(&params).unwrap();
        assert!((width - (0.3 - 0.05) * UM).abs() < 1e-12);
        assert!(g.create_polygon(&params).unwrap().is_simple());
    }

    #[test]
    fn dual_edge_design_uses_twenty_parameters() {
        let config = GeometryConfig::dual_edge();
        let g = YBranchGeometry::from_config(&config).unwrap();
        assert_eq!(g.parameter_count(), 20);
        let polygon = g.create_polygon(&config.initial_params).unwrap();
        assert!(polygon.is_simple());
        assert!((g.port_width(&config.initial_params).unwrap() - 0.5 * UM).abs() < 1e-12);
        assert_eq!(g.control_points(&config.initial_params).len(), 20);
    }

    #[test]
    fn negative_split_point_closes_on_the_axis() {
        let config = GeometryConfig::dual_edge();
        let g = YBranchGeometry::from_config(&config).unwrap();
        let split = g.outer_count();
        for y in [-0.01 * UM, -0.05 * UM] {
            let mut params = config.initial_params.clone();
            params[split] = y;
            let polygon = g.create_polygon(&params).unwrap();
            assert!(polygon.is_simple(), "split at {y}");
            assert!(polygon.area() > 0.0);
        }
    }

    #[test]
    fn wrong_parameter_count() {
        let g = geometry();
        assert_eq!(
            g.outline(&[0.5 * UM; 4]).unwrap_err(),
            GeometryError::ParameterCount {
                expected: 10,
                actual: 4
            }
        );
    }
}
