//! Unconstrained coordinates for the bounded shape parameters.
//!
//! L-BFGS works on `z`, the solver sees `p = lower + width * sigmoid(z)`.
//! Every point the optimizer proposes therefore lies inside the bounds and
//! the line search never has to be clipped.

use yb_types::ParameterBounds;

/// Fraction of the interval the starting point is pulled away from an
/// active bound; `logit(0)` is not finite.
const EDGE_FRACTION: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct LatentMap {
    lower: Vec<f64>,
    width: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LatentMap {
    pub fn new(bounds: &ParameterBounds) -> Self {
        Self {
            lower: bounds.lower(),
            width: bounds.intervals().iter().map(|i| i.width()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Physical offsets in metres.
    pub fn to_params(&self, z: &[f64]) -> Vec<f64> {
        z.iter()
            .zip(self.lower.iter().zip(&self.width))
            .map(|(z, (lo, w))| lo + w * sigmoid(*z))
            .collect()
    }

    pub fn to_latent(&self, params: &[f64]) -> Vec<f64> {
        params
            .iter()
            .zip(self.lower.iter().zip(&self.width))
            .map(|(p, (lo, w))| {
                let frac = if *w > 0.0 { (p - lo) / w } else { 0.5 };
                let frac = frac.clamp(EDGE_FRACTION, 1.0 - EDGE_FRACTION);
                (frac / (1.0 - frac)).ln()
            })
            .collect()
    }

    /// Chain rule: `df/dz_i = df/dp_i * width_i * s (1 - s)` with `s = sigmoid(z_i)`.
    pub fn pull_back(&self, z: &[f64], grad_params: &[f64]) -> Vec<f64> {
        z.iter()
            .zip(grad_params)
            .zip(&self.width)
            .map(|((z, g), w)| {
                let s = sigmoid(*z);
                g * w * s * (1.0 - s)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> LatentMap {
        LatentMap::new(&ParameterBounds::uniform(3, 0.2e-6, 0.8e-6))
    }

    #[test]
    fn params_stay_inside_bounds() {
        let m = map();
        for z in [-50.0, -3.0, 0.0, 2.5, 40.0] {
            let p = m.to_params(&[z; 3]);
            assert!(p.iter().all(|p| (0.2e-6..=0.8e-6).contains(p)));
        }
        assert!((m.to_params(&[0.0])[0] - 0.5e-6).abs() < 1e-18);
    }

    #[test]
    fn latent_inverts_params() {
        let m = map();
        let p = vec![0.25e-6, 0.5e-6, 0.71e-6];
        let back = m.to_params(&m.to_latent(&p));
        for (a, b) in p.iter().zip(&back) {
            assert!((a - b).abs() < 1e-15);
        }
    }

    #[test]
    fn parameters_on_a_bound_get_finite_latents() {
        let m = map();
        let z = m.to_latent(&[0.2e-6, 0.8e-6, 0.5e-6]);
        assert!(z.iter().all(|z| z.is_finite()));
        assert!(z[0] < -10.0 && z[1] > 10.0);
    }

    #[test]
    fn pull_back_matches_numeric_derivative() {
        let m = map();
        let z = vec![-0.7, 0.3, 1.9];
        // f(p) = sum_i c_i p_i, so df/dp = c
        let c = [1e6, -2e6, 3e6];
        let f = |z: &[f64]| -> f64 { m.to_params(z).iter().zip(&c).map(|(p, c)| p * c).sum() };
        let analytic = m.pull_back(&z, &c);
        let h = 1e-6;
        for i in 0..3 {
            let mut zp = z.clone();
            zp[i] += h;
            let numeric = (f(&zp) - f(&z)) / h;
            assert!((numeric - analytic[i]).abs() < 1e-4 * analytic[i].abs().max(1.0));
        }
    }
}
