/*!
# Trace Storage and Post-processing

A [`Trace`] is the dense record a chain leaves behind: one row per iteration,
one column per estimated parameter plus a trailing `log_density` column. A row
is appended whether or not the iteration accepted, so row `i` always holds the
state the chain occupied at iteration `i`.

Post-processing stays in memory. [`Trace::burn_and_thin`] drops a leading
transient and keeps every `(thin + 1)`-th remaining row:

```text
rows:   0 1 2 3 4 5 6 7 8 9
burn=3:       3 4 5 6 7 8 9
thin=1:       3   5   7   9
```

[`Trace::summary`] reduces the columns to means and standard deviations, and
[`Trace::covariance`] estimates the posterior covariance of the parameter
columns, which is what a follow-up run wants as its seed covariance.
*/

use std::fmt;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_stats::CorrelationExt;

/// Column label used for the log-density values.
pub(crate) const LOG_DENSITY_COLUMN: &str = "log_density";

/// Chain output: labeled columns over a dense row-per-iteration table.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    names: Vec<String>,
    data: Array2<f64>,
}

/// Per-column mean and standard deviation of a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSummary {
    /// Column labels, parameter columns first.
    pub names: Vec<String>,
    /// Column means.
    pub mean: Array1<f64>,
    /// Column sample standard deviations.
    pub sd: Array1<f64>,
}

impl Trace {
    pub(crate) fn from_parts(names: Vec<String>, data: Array2<f64>) -> Self {
        debug_assert_eq!(names.len(), data.ncols());
        Self { names, data }
    }

    /// Column labels; the last one is always `log_density`.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The full table, rows = iterations.
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// True when no rows survive (or none were recorded).
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// A single column by label.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.data.column(idx))
    }

    /**
    Drops the first `burn` rows, then keeps every `(thin + 1)`-th row of the
    remainder. `burn >= len()` yields an empty trace rather than an error,
    and `thin = 0` keeps everything after the burn-in.

    The result has `ceil((len() - burn) / (thin + 1))` rows.
    */
    pub fn burn_and_thin(&self, burn: usize, thin: usize) -> Trace {
        let kept = if burn >= self.data.nrows() {
            Array2::zeros((0, self.data.ncols()))
        } else {
            let step = (thin + 1) as isize;
            self.data.slice(s![burn..;step, ..]).to_owned()
        };
        Trace {
            names: self.names.clone(),
            data: kept,
        }
    }

    /// Mean and sample standard deviation of every column. `None` for traces
    /// with fewer than two rows, where the standard deviation is undefined.
    pub fn summary(&self) -> Option<TraceSummary> {
        if self.data.nrows() < 2 {
            return None;
        }
        Some(TraceSummary {
            names: self.names.clone(),
            mean: self.data.mean_axis(Axis(0))?,
            sd: self.data.std_axis(Axis(0), 1.0),
        })
    }

    /// Sample covariance of the parameter columns (the `log_density` column
    /// is excluded). `None` when fewer than two rows are available.
    pub fn covariance(&self) -> Option<Array2<f64>> {
        if self.data.nrows() < 2 {
            return None;
        }
        let params = self.data.slice(s![.., ..self.names.len() - 1]);
        params.t().cov(1.0).ok()
    }
}

/// Applies the same burn and thinning to every trace in a collection, e.g.
/// the outputs of independently run chains.
pub fn burn_and_thin_all(traces: &[Trace], burn: usize, thin: usize) -> Vec<Trace> {
    traces
        .iter()
        .map(|trace| trace.burn_and_thin(burn, thin))
        .collect()
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            writeln!(f, "{name}: mean {:.4}, sd {:.4}", self.mean[i], self.sd[i])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn ramp_trace(rows: usize) -> Trace {
        let data = Array2::from_shape_fn((rows, 2), |(i, j)| match j {
            0 => i as f64,
            _ => -(i as f64),
        });
        Trace::from_parts(vec!["a".to_string(), LOG_DENSITY_COLUMN.to_string()], data)
    }

    #[test]
    fn no_burn_no_thin_is_identity() {
        let trace = ramp_trace(10);
        assert_eq!(trace.burn_and_thin(0, 0), trace);
    }

    #[test]
    fn burn_and_thin_keeps_the_right_rows() {
        let trace = ramp_trace(10);
        let thinned = trace.burn_and_thin(3, 1);
        // ceil((10 - 3) / 2) = 4 rows: original indices 3, 5, 7, 9.
        assert_eq!(thinned.len(), 4);
        let col = thinned.column("a").unwrap();
        assert_eq!(col.to_vec(), vec![3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn overlong_burn_yields_an_empty_trace() {
        let trace = ramp_trace(5);
        let empty = trace.burn_and_thin(5, 0);
        assert!(empty.is_empty());
        assert_eq!(empty.names(), trace.names());

        let way_past = trace.burn_and_thin(100, 3);
        assert_eq!(way_past.len(), 0);
    }

    #[test]
    fn thin_larger_than_remainder_keeps_one_row() {
        let trace = ramp_trace(5);
        let thinned = trace.burn_and_thin(4, 9);
        assert_eq!(thinned.len(), 1);
        assert_eq!(thinned.column("a").unwrap()[0], 4.0);
    }

    #[test]
    fn thinned_row_count_matches_the_ceiling_formula() {
        let trace = ramp_trace(17);
        for burn in 0..20 {
            for thin in 0..5 {
                let expected = if burn >= 17 {
                    0
                } else {
                    (17usize - burn).div_ceil(thin + 1)
                };
                assert_eq!(trace.burn_and_thin(burn, thin).len(), expected);
            }
        }
    }

    #[test]
    fn column_lookup_by_label() {
        let trace = ramp_trace(3);
        assert_eq!(
            trace.column(LOG_DENSITY_COLUMN).unwrap().to_vec(),
            vec![0.0, -1.0, -2.0]
        );
        assert!(trace.column("nope").is_none());
    }

    #[test]
    fn summary_reports_mean_and_sd() {
        let data = arr2(&[[1.0, -1.0], [2.0, -2.0], [3.0, -3.0], [4.0, -4.0]]);
        let trace =
            Trace::from_parts(vec!["a".to_string(), LOG_DENSITY_COLUMN.to_string()], data);
        let summary = trace.summary().unwrap();
        assert_abs_diff_eq!(summary.mean[0], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.sd[0], (5.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean[1], -2.5, epsilon = 1e-12);
        assert!(format!("{summary}").contains("a: mean 2.5000"));
    }

    #[test]
    fn summary_needs_two_rows() {
        assert!(ramp_trace(1).summary().is_none());
        assert!(ramp_trace(0).summary().is_none());
    }

    #[test]
    fn covariance_skips_the_log_density_column() {
        let data = arr2(&[
            [1.0, 2.0, -1.0],
            [2.0, 4.0, -2.0],
            [3.0, 6.0, -3.0],
        ]);
        let trace = Trace::from_parts(
            vec![
                "a".to_string(),
                "b".to_string(),
                LOG_DENSITY_COLUMN.to_string(),
            ],
            data,
        );
        let cov = trace.covariance().unwrap();
        assert_eq!(cov.dim(), (2, 2));
        assert_abs_diff_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn collections_are_processed_independently() {
        let traces = vec![ramp_trace(10), ramp_trace(4)];
        let processed = burn_and_thin_all(&traces, 2, 1);
        assert_eq!(processed[0].len(), 4);
        assert_eq!(processed[1].len(), 1);
    }
}
