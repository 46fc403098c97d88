/*!
# Truncated Gaussian Proposal Kernel

Random-walk proposals for the adaptive Metropolis-Hastings sampler: a
multivariate normal centered on the current point, truncated component-wise to
per-parameter `[lower, upper]` bounds, restricted to the estimated parameters
(fixed parameters pass through every draw unchanged).

## Overview

- The kernel is built once per proposal covariance: the estimated sub-block is
  Cholesky-factored up front and every draw reuses the factor.
- Draws walk the estimated components in canonical order; each component is a
  univariate normal, conditional on the components already drawn, truncated to
  the interval that keeps the candidate inside its bounds.
- [`TruncatedProposal::log_density`] evaluates the log-density of exactly that
  construction, so the forward and reverse terms of the Hastings correction
  describe the same distribution. With infinite bounds both reduce to the
  untruncated multivariate normal and the correction cancels.

## Example Usage

```rust
use mhfit::params::{Bounds, ParamSet, ParamVector};
use mhfit::proposal::TruncatedProposal;
use ndarray::arr2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let theta = ParamVector::from_pairs([("r0", 15.0), ("reporting", 0.7)]).unwrap();
let set = theta.set().clone();
let bounds = Bounds::from_pairs(
    &set,
    &[("reporting".into(), 0.0)],
    &[("reporting".into(), 1.0)],
).unwrap();
let covmat = arr2(&[[1.0, 0.0], [0.0, 0.01]]);

let kernel = TruncatedProposal::new(&set, covmat.view(), &[0, 1], &bounds).unwrap();
let mut rng = SmallRng::seed_from_u64(42);
let candidate = kernel.draw(theta.values(), &mut rng);
assert!(candidate[1] >= 0.0 && candidate[1] <= 1.0);
```
*/

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;

use crate::error::{Error, Result};
use crate::norm;
use crate::params::{Bounds, ParamSet};

/// A truncated multivariate-normal kernel over the estimated sub-space,
/// factored once and reused for every draw until the adaptation controller
/// replaces the covariance.
#[derive(Debug, Clone)]
pub struct TruncatedProposal {
    /// Lower Cholesky factor of the estimated sub-block.
    chol: Array2<f64>,
    /// Indices of the estimated parameters in the canonical ordering.
    estimated: Vec<usize>,
    /// Truncation bounds restricted to the estimated sub-space.
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl TruncatedProposal {
    /// Validates and factors `covmat` for the given estimated parameters.
    ///
    /// Fails with [`Error::DegenerateCovariance`] if any estimated diagonal
    /// entry sits below machine epsilon, and with
    /// [`Error::NotPositiveDefinite`] if the estimated sub-block cannot be
    /// Cholesky-factored. Both are fatal: no draw can be made from such a
    /// kernel.
    pub fn new(
        set: &ParamSet,
        covmat: ArrayView2<'_, f64>,
        estimated: &[usize],
        bounds: &Bounds,
    ) -> Result<Self> {
        for &i in estimated {
            let variance = covmat[[i, i]];
            if !(variance >= f64::EPSILON) {
                return Err(Error::DegenerateCovariance {
                    name: set.name(i).to_string(),
                    value: variance,
                });
            }
        }

        let k = estimated.len();
        let mut block = Array2::<f64>::zeros((k, k));
        for (a, &i) in estimated.iter().enumerate() {
            for (b, &j) in estimated.iter().enumerate() {
                block[[a, b]] = covmat[[i, j]];
            }
        }
        let chol = cholesky(&block).map_err(|pivot| Error::NotPositiveDefinite {
            name: set.name(estimated[pivot]).to_string(),
        })?;

        let lower = estimated.iter().map(|&i| bounds.lower()[i]).collect();
        let upper = estimated.iter().map(|&i| bounds.upper()[i]).collect();
        Ok(Self {
            chol,
            estimated: estimated.to_vec(),
            lower,
            upper,
        })
    }

    /// Samples a candidate point centered on `current`.
    ///
    /// Fixed parameters are copied through; each estimated component is drawn
    /// from its truncated conditional, so the candidate always lies inside
    /// the bound box. With no estimated parameters the candidate equals
    /// `current`.
    pub fn draw<R: Rng + ?Sized>(&self, current: ArrayView1<'_, f64>, rng: &mut R) -> Array1<f64> {
        let mut candidate = current.to_owned();
        let k = self.estimated.len();
        let mut z = vec![0.0; k];
        for i in 0..k {
            let mut conditional_mean = current[self.estimated[i]];
            for j in 0..i {
                conditional_mean += self.chol[[i, j]] * z[j];
            }
            let l_ii = self.chol[[i, i]];
            let a = (self.lower[i] - conditional_mean) / l_ii;
            let b = (self.upper[i] - conditional_mean) / l_ii;
            let x = (conditional_mean + l_ii * norm::draw_truncated(rng, a, b))
                .clamp(self.lower[i], self.upper[i]);
            // Keep z consistent with the emitted (clamped) component.
            z[i] = (x - conditional_mean) / l_ii;
            candidate[self.estimated[i]] = x;
        }
        candidate
    }

    /// Log-density of the kernel centered at `mean`, evaluated at `x`, over
    /// the estimated sub-space. Returns -inf for points outside the bounds
    /// and 0 when there are no estimated parameters.
    pub fn log_density(&self, x: ArrayView1<'_, f64>, mean: ArrayView1<'_, f64>) -> f64 {
        let k = self.estimated.len();
        let mut z = vec![0.0; k];
        let mut lp = 0.0;
        for i in 0..k {
            let xi = x[self.estimated[i]];
            if xi < self.lower[i] || xi > self.upper[i] {
                return f64::NEG_INFINITY;
            }
            let mut conditional_mean = mean[self.estimated[i]];
            for j in 0..i {
                conditional_mean += self.chol[[i, j]] * z[j];
            }
            let l_ii = self.chol[[i, i]];
            let a = (self.lower[i] - conditional_mean) / l_ii;
            let b = (self.upper[i] - conditional_mean) / l_ii;
            z[i] = (xi - conditional_mean) / l_ii;
            let mass = norm::interval_mass(a, b);
            if mass <= 0.0 {
                return f64::NEG_INFINITY;
            }
            lp += norm::ln_phi(z[i]) - mass.ln() - l_ii.ln();
        }
        lp
    }

    /// Indices of the estimated parameters this kernel perturbs.
    pub fn estimated(&self) -> &[usize] {
        &self.estimated
    }
}

/// Lower Cholesky factor of a symmetric positive-definite matrix; reports the
/// failing pivot index otherwise.
fn cholesky(a: &Array2<f64>) -> std::result::Result<Array2<f64>, usize> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(i);
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}
