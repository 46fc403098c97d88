//! Distance metrics for comparing series, e.g. a simulated trajectory
//! against observations.

use num_traits::Float;

use crate::error::{Error, Result};

/**
Mean squared distance between two series, discounted by how often they cross.

Computes `sum((x - y)^2) / (len * n_osc)`, where `n_osc` is one plus the
number of sign changes of `x - y`. Two series that oscillate around each
other score lower than two series with the same pointwise gap held on one
side, so phase wiggle is penalized less than systematic bias.

Returns [`Error::LengthMismatch`] when the series differ in length. Two
empty series yield `NaN`.

# Examples

```rust
use mhfit::stats::oscillation_distance;

let x = [1.0, 2.0, 3.0];
let y = [0.0, 1.0, 2.0];
// Constant offset of 1, never crossing: 3 / (3 * 1).
assert_eq!(oscillation_distance(&x, &y).unwrap(), 1.0);
```
*/
pub fn oscillation_distance<F: Float>(x: &[F], y: &[F]) -> Result<F> {
    if x.len() != y.len() {
        return Err(Error::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    let mut sum_sq = F::zero();
    let mut len = F::zero();
    let mut n_osc = F::one();
    let mut prev_above: Option<bool> = None;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let diff = a - b;
        sum_sq = sum_sq + diff * diff;
        len = len + F::one();
        let above = diff > F::zero();
        if prev_above.is_some_and(|p| p != above) {
            n_osc = n_osc + F::one();
        }
        prev_above = Some(above);
    }
    Ok(sum_sq / (len * n_osc))
}
