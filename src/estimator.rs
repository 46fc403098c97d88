/*!
# Online Covariance Estimator

A numerically stable one-pass estimator of the mean vector and covariance
matrix of a vector-valued stream, fed one labeled sample per chain iteration.
Shape adaptation reads it to replace the proposal covariance with the chain's
own empirical covariance.

The update is the Welford-style recurrence

```text
residual = sample - mean
covmat  <- (covmat * (n-1) + (n-1)/n * residual (x) residual) / n
mean    <- mean + residual / n
```

with `n` the number of samples seen including the current one. After `n`
samples the matrix equals the population (divide-by-n) covariance of the
stream; the first sample sets the mean and leaves the matrix at zero. No
history is stored.

## Example Usage

```rust
use mhfit::estimator::RunningCovariance;
use mhfit::params::ParamVector;

let first = ParamVector::from_pairs([("a", 1.0), ("b", 2.0)]).unwrap();
let mut estimator = RunningCovariance::new(first.set().clone());
estimator.update(&first).unwrap();
estimator.update(&first.with_values(ndarray::arr1(&[3.0, 6.0]))).unwrap();
assert_eq!(estimator.mean().to_vec(), vec![2.0, 4.0]);
assert_eq!(estimator.count(), 2);
```
*/

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::Result;
use crate::params::{ParamSet, ParamVector};

/// Running mean and covariance over the full parameter vector.
///
/// Fixed parameters never move, so their residuals are zero and their rows
/// and columns stay zero; the estimated sub-block is what shape adaptation
/// consumes. Labels are the contract: every update checks the sample against
/// the set fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningCovariance {
    set: ParamSet,
    covmat: Array2<f64>,
    mean: Array1<f64>,
    count: usize,
}

impl RunningCovariance {
    /// An empty estimator over `set`; the first update seeds the mean.
    pub fn new(set: ParamSet) -> Self {
        let d = set.len();
        Self {
            set,
            covmat: Array2::zeros((d, d)),
            mean: Array1::zeros(d),
            count: 0,
        }
    }

    /// Folds one labeled sample into the statistic.
    ///
    /// Fails with [`crate::error::Error::LabelMismatch`] when the sample was
    /// built over a different parameter set.
    pub fn update(&mut self, sample: &ParamVector) -> Result<()> {
        self.set.check_matches(sample.set())?;
        let values = sample.values();
        let n = (self.count + 1) as f64;
        let weight = (n - 1.0) / n;
        let residual = &values - &self.mean;
        // Mirrored writes keep the matrix symmetric bit-for-bit.
        for i in 0..residual.len() {
            for j in 0..=i {
                let updated =
                    (self.covmat[[i, j]] * (n - 1.0) + weight * residual[i] * residual[j]) / n;
                self.covmat[[i, j]] = updated;
                self.covmat[[j, i]] = updated;
            }
        }
        self.mean.scaled_add(1.0 / n, &residual);
        self.count += 1;
        Ok(())
    }

    /// The parameter set the estimator was built over.
    pub fn set(&self) -> &ParamSet {
        &self.set
    }

    /// Running mean, in set order.
    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    /// Running population covariance, in set order.
    pub fn covariance(&self) -> ArrayView2<'_, f64> {
        self.covmat.view()
    }

    /// Number of samples folded in so far.
    pub fn count(&self) -> usize {
        self.count
    }
}
