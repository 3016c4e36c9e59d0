//! Cubic spline interpolation.
//!
//! Each interval [x_i, x_{i+1}] carries a cubic
//!   S_i(x) = a_i + b_i*(x - x_i) + c_i*(x - x_i)^2 + d_i*(x - x_i)^3
//! with value, slope and curvature continuous across knots (C²). The `c`
//! coefficients come from a tridiagonal system solved with the Thomas
//! algorithm.

use serde::{Deserialize, Serialize};
use yb_types::{GeometryError, GeometryResult};

/// Boundary condition for cubic spline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SplineBoundary {
    /// Second derivative is zero at both ends.
    Natural,
    /// First derivative is specified at both ends.
    Clamped { left: f64, right: f64 },
    /// Third derivative continuous at the second and second-to-last knots.
    /// Three knots give the one parabola through them, two a straight line.
    #[default]
    NotAKnot,
}

/// Cubic spline through a set of knots.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    x: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline through `(x[i], y[i])`.
    ///
    /// # Errors
    ///
    /// - `x` and `y` differ in length
    /// - fewer than 2 knots
    /// - `x` not strictly increasing
    pub fn new(x: &[f64], y: &[f64], boundary: SplineBoundary) -> GeometryResult<Self> {
        if x.len() != y.len() {
            return Err(GeometryError::LengthMismatch {
                knots: x.len(),
                values: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(GeometryError::InsufficientKnots {
                required: 2,
                actual: x.len(),
            });
        }
        if let Some(index) = x.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(GeometryError::NonMonotonicKnots { index: index + 1 });
        }

        let n = x.len();
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let c = match boundary {
            SplineBoundary::NotAKnot if n >= 4 => not_a_knot_curvature(&h, y)?,
            SplineBoundary::NotAKnot if n == 3 => {
                let k = ((y[2] - y[1]) / h[1] - (y[1] - y[0]) / h[0]) / (h[0] + h[1]);
                vec![k; 3]
            }
            SplineBoundary::NotAKnot | SplineBoundary::Natural => {
                full_curvature(&h, y, None)?
            }
            SplineBoundary::Clamped { left, right } => full_curvature(&h, y, Some((left, right)))?,
        };

        let mut b = Vec::with_capacity(n - 1);
        let mut d = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            b.push((y[i + 1] - y[i]) / h[i] - h[i] * (2.0 * c[i] + c[i + 1]) / 3.0);
            d.push((c[i + 1] - c[i]) / (3.0 * h[i]));
        }

        Ok(Self {
            x: x.to_vec(),
            a: y.to_vec(),
            b,
            c,
            d,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    /// Interval index and offset for `x`. Points outside the knot range
    /// use the end intervals (the end cubics are extended).
    fn locate(&self, x: f64) -> (usize, f64) {
        let last = self.x.len() - 2;
        let i = self.x.partition_point(|&k| k <= x).saturating_sub(1).min(last);
        (i, x - self.x[i])
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let (i, dx) = self.locate(x);
        self.a[i] + dx * (self.b[i] + dx * (self.c[i] + dx * self.d[i]))
    }

    pub fn derivative(&self, x: f64) -> f64 {
        let (i, dx) = self.locate(x);
        self.b[i] + dx * (2.0 * self.c[i] + 3.0 * self.d[i] * dx)
    }

    pub fn second_derivative(&self, x: f64) -> f64 {
        let (i, dx) = self.locate(x);
        2.0 * self.c[i] + 6.0 * self.d[i] * dx
    }

    /// `count` evenly spaced `(x, S(x))` samples across the knot range.
    pub fn sample(&self, count: usize) -> Vec<(f64, f64)> {
        yb_types::linspace(self.x_min(), self.x_max(), count)
            .into_iter()
            .map(|x| (x, self.evaluate(x)))
            .collect()
    }
}

fn secant_jump(h: &[f64], y: &[f64], i: usize) -> f64 {
    3.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1])
}

/// Natural or clamped ends: solve for every `c_i` directly.
fn full_curvature(h: &[f64], y: &[f64], slopes: Option<(f64, f64)>) -> GeometryResult<Vec<f64>> {
    let n = y.len();
    let mut diag = vec![0.0; n];
    let mut upper = vec![0.0; n - 1];
    let mut lower = vec![0.0; n - 1];
    let mut rhs = vec![0.0; n];

    for i in 1..n - 1 {
        lower[i - 1] = h[i - 1];
        diag[i] = 2.0 * (h[i - 1] + h[i]);
        upper[i] = h[i];
        rhs[i] = secant_jump(h, y, i);
    }

    match slopes {
        None => {
            diag[0] = 1.0;
            diag[n - 1] = 1.0;
        }
        Some((left, right)) => {
            diag[0] = 2.0 * h[0];
            upper[0] = h[0];
            rhs[0] = 3.0 * ((y[1] - y[0]) / h[0] - left);

            diag[n - 1] = 2.0 * h[n - 2];
            lower[n - 2] = h[n - 2];
            rhs[n - 1] = 3.0 * (right - (y[n - 1] - y[n - 2]) / h[n - 2]);
        }
    }

    solve_tridiagonal(&lower, &diag, &upper, &rhs)
}

/// Not-a-knot ends: eliminate `c_0` and `c_{n-1}` through the end
/// conditions `d_0 = d_1`, `d_{n-3} = d_{n-2}`, solve the reduced system for
/// the interior, then recover the two ends.
fn not_a_knot_curvature(h: &[f64], y: &[f64]) -> GeometryResult<Vec<f64>> {
    let n = y.len();
    let m = n - 2;
    let mut diag = vec![0.0; m];
    let mut upper = vec![0.0; m - 1];
    let mut lower = vec![0.0; m - 1];
    let mut rhs = vec![0.0; m];

    for k in 0..m {
        let i = k + 1;
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        rhs[k] = secant_jump(h, y, i);
        if k > 0 {
            lower[k - 1] = h[i - 1];
        }
        if k + 1 < m {
            upper[k] = h[i];
        }
    }

    let (h0, h1) = (h[0], h[1]);
    diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
    upper[0] = (h1 * h1 - h0 * h0) / h1;

    let (ha, hb) = (h[n - 3], h[n - 2]);
    diag[m - 1] = (ha + hb) * (2.0 * ha + hb) / ha;
    lower[m - 2] = (ha * ha - hb * hb) / ha;

    let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;

    let mut c = Vec::with_capacity(n);
    c.push(((h0 + h1) * interior[0] - h0 * interior[1]) / h1);
    c.extend_from_slice(&interior);
    c.push(((ha + hb) * interior[m - 1] - hb * interior[m - 2]) / ha);
    Ok(c)
}

/// Thomas algorithm. `lower` and `upper` have one entry fewer than `diag`.
pub fn solve_tridiagonal(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
) -> GeometryResult<Vec<f64>> {
    let n = diag.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    for i in 0..n {
        let (sub, prev_c, prev_d) = if i == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (lower[i - 1], c_prime[i - 1], d_prime[i - 1])
        };
        let denom = diag[i] - sub * prev_c;
        if denom.abs() < f64::MIN_POSITIVE {
            return Err(GeometryError::SingularSystem);
        }
        if i + 1 < n {
            c_prime[i] = upper[i] / denom;
        }
        d_prime[i] = (rhs[i] - sub * prev_d) / denom;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d_prime[i] - c_prime[i] * x[i + 1];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(x: f64) -> f64 {
        0.5 * x * x * x - x * x + 2.0 * x - 1.0
    }

    #[test]
    fn three_knots_not_a_knot_is_a_parabola() {
        let parabola = |x: f64| 2.0 * x * x - 3.0 * x + 1.0;
        let x = [0.0, 0.4, 1.5];
        let y: Vec<f64> = x.iter().map(|&v| parabola(v)).collect();
        let spline = CubicSpline::new(&x, &y, SplineBoundary::NotAKnot).unwrap();
        for t in [-0.2, 0.1, 0.4, 0.9, 1.5, 1.8] {
            assert!((spline.evaluate(t) - parabola(t)).abs() < 1e-12, "x = {t}");
            assert!((spline.second_derivative(t) - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn interpolates_knots() {
        let x = vec![0.0, 1.0, 2.5, 3.0, 4.2];
        let y = vec![0.0, 1.0, -0.5, 0.3, 2.0];
        for boundary in [SplineBoundary::Natural, SplineBoundary::NotAKnot] {
            let spline = CubicSpline::new(&x, &y, boundary).unwrap();
            for (xi, yi) in x.iter().zip(&y) {
                assert!((spline.evaluate(*xi) - yi).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn not_a_knot_reproduces_a_cubic() {
        let x = vec![-1.1, -1.0, -0.6, 0.0, 0.4, 1.0, 1.1];
        let y: Vec<f64> = x.iter().map(|&v| cubic(v)).collect();
        let spline = CubicSpline::new(&x, &y, SplineBoundary::NotAKnot).unwrap();
        for probe in [-1.05, -0.8, -0.3, 0.2, 0.7, 1.05] {
            assert!(
                (spline.evaluate(probe) - cubic(probe)).abs() < 1e-10,
                "mismatch at {probe}"
            );
        }
    }

    #[test]
    fn natural_ends_have_zero_curvature() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let spline = CubicSpline::new(&x, &y, SplineBoundary::Natural).unwrap();
        assert!(spline.second_derivative(0.0).abs() < 1e-12);
        assert!(spline.second_derivative(3.0).abs() < 1e-10);
    }

    #[test]
    fn clamped_end_slopes() {
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![0.0, 1.0, 0.0];
        let spline = CubicSpline::new(
            &x,
            &y,
            SplineBoundary::Clamped {
                left: 2.0,
                right: -2.0,
            },
        )
        .unwrap();
        assert!((spline.derivative(0.0) - 2.0).abs() < 1e-12);
        assert!((spline.derivative(2.0) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn second_derivative_is_continuous_at_knots() {
        let x = vec![0.0, 0.3, 0.9, 1.4, 2.0, 2.2];
        let y = vec![0.2, 0.5, 0.4, 0.9, 0.7, 0.75];
        let spline = CubicSpline::new(&x, &y, SplineBoundary::NotAKnot).unwrap();
        let eps = 1e-9;
        for &k in &x[1..x.len() - 1] {
            let left = spline.second_derivative(k - eps);
            let right = spline.second_derivative(k + eps);
            assert!((left - right).abs() < 1e-6, "curvature jump at {k}");
            let slope_l = spline.derivative(k - eps);
            let slope_r = spline.derivative(k + eps);
            assert!((slope_l - slope_r).abs() < 1e-6, "slope jump at {k}");
        }
    }

    #[test]
    fn rejects_bad_knots() {
        assert_eq!(
            CubicSpline::new(&[0.0, 1.0, 1.0], &[0.0, 1.0, 2.0], SplineBoundary::Natural)
                .unwrap_err(),
            GeometryError::NonMonotonicKnots { index: 2 }
        );
        assert_eq!(
            CubicSpline::new(&[0.0], &[0.0], SplineBoundary::Natural).unwrap_err(),
            GeometryError::InsufficientKnots {
                required: 2,
                actual: 1
            }
        );
        assert!(matches!(
            CubicSpline::new(&[0.0, 1.0], &[0.0], SplineBoundary::Natural),
            Err(GeometryError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn two_knots_is_a_line() {
        let spline = CubicSpline::new(&[0.0, 2.0], &[1.0, 3.0], SplineBoundary::NotAKnot).unwrap();
        assert!((spline.evaluate(0.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn tridiagonal_solver() {
        let lower = vec![1.0, 1.0];
        let diag = vec![2.0, 2.0, 2.0];
        let upper = vec![1.0, 1.0];
        let rhs = vec![1.0, 2.0, 1.0];

        let x = solve_tridiagonal(&lower, &diag, &upper, &rhs).unwrap();

        assert!((diag[0] * x[0] + upper[0] * x[1] - rhs[0]).abs() < 1e-10);
        assert!((lower[0] * x[0] + diag[1] * x[1] + upper[1] * x[2] - rhs[1]).abs() < 1e-10);
        assert!((lower[1] * x[1] + diag[2] * x[2] - rhs[2]).abs() < 1e-10);
    }

    #[test]
    fn sample_spans_knot_range() {
        let spline =
            CubicSpline::new(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 4.0, 9.0], SplineBoundary::NotAKnot)
                .unwrap();
        let samples = spline.sample(7);
        assert_eq!(samples.len(), 7);
        assert_eq!(samples[0].0, 0.0);
        assert_eq!(samples[6].0, 3.0);
        assert!((samples[6].1 - 9.0).abs() < 1e-12);
    }
}
