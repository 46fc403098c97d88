/*!
# Adaptation Controller

The state machine that tunes the proposal covariance while the chain runs.
Two mechanisms fire in sequence: **size** adaptation rescales the initial
covariance until the running acceptance rate approaches the optimal 0.234,
then **shape** adaptation replaces the covariance with a scaled copy of the
chain's empirical covariance once enough proposals have been accepted. An
optional window stops shape adaptation after a fixed number of iterations and
freezes the covariance for the rest of the run.

The controller owns the proposal covariance. The chain driver calls
[`Adaptation::update`] once per iteration, before proposing, and rebuilds its
proposal kernel whenever the call reports a replacement.
*/

use ndarray::{Array2, ArrayView2};

/// Target acceptance rate for random-walk Metropolis on a correlated
/// multivariate-normal target; fixed design constant.
pub const TARGET_ACCEPTANCE: f64 = 0.234;

/// Shape-phase scaling numerator: proposal covariance becomes
/// `(2.38 / sqrt(d))^2` times the empirical covariance.
const SHAPE_SCALE: f64 = 2.38;

/// Where the controller currently is. Phases only move forward:
/// `None -> Size -> Shape -> Stopped`, with `Size` skipped when size
/// adaptation is not configured and `Stopped` reached only through a
/// configured shape window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No threshold crossed yet (or none configured); covariance untouched.
    None,
    /// Rescaling the initial covariance toward [`TARGET_ACCEPTANCE`].
    Size,
    /// Tracking the scaled empirical covariance.
    Shape,
    /// Shape window elapsed; covariance frozen at its last value.
    Stopped,
}

/// Adaptation thresholds, normally filled in from the run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptOptions {
    /// Iteration at which size adaptation may begin; `None` disables it.
    pub size_start: Option<usize>,
    /// Cooling factor applied to the size multiplier exponent per iteration.
    pub size_cooling: f64,
    /// Number of *accepted* proposals after which shape adaptation begins;
    /// `None` disables it.
    pub shape_start: Option<usize>,
    /// Length of the shape window in iterations; `None` keeps shape
    /// adaptation running to the end.
    pub shape_stop: Option<usize>,
    /// Upper cap on the size-phase scaling factor.
    pub max_scaling_sd: f64,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            size_start: None,
            size_cooling: 0.99,
            shape_start: None,
            shape_stop: None,
            max_scaling_sd: 50.0,
        }
    }
}

/// The controller: phase machine plus the covariance it governs.
#[derive(Debug, Clone)]
pub struct Adaptation {
    options: AdaptOptions,
    /// Seed covariance; size adaptation always rescales this, not the
    /// current matrix, so repeated rescaling cannot drift.
    initial: Array2<f64>,
    covmat: Array2<f64>,
    estimated: Vec<usize>,
    scaling_sd: f64,
    scaling_multiplier: f64,
    phase: Phase,
    shape_started_at: Option<usize>,
}

impl Adaptation {
    /// Builds a controller around the validated seed covariance.
    pub fn new(initial: Array2<f64>, estimated: Vec<usize>, options: AdaptOptions) -> Self {
        Self {
            options,
            covmat: initial.clone(),
            initial,
            estimated,
            scaling_sd: 1.0,
            scaling_multiplier: 1.0,
            phase: Phase::None,
            shape_started_at: None,
        }
    }

    /// The covariance the proposal kernel should currently draw with.
    pub fn covariance(&self) -> ArrayView2<'_, f64> {
        self.covmat.view()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Size-phase scaling factor (1.0 until size adaptation first fires,
    /// `2.38/sqrt(d)` throughout shape adaptation).
    pub fn scaling_sd(&self) -> f64 {
        self.scaling_sd
    }

    /// Most recent size-phase multiplier, for diagnostics.
    pub fn scaling_multiplier(&self) -> f64 {
        self.scaling_multiplier
    }

    /// Advances the phase machine for `iteration` and applies the phase
    /// effect. Returns `true` when the covariance was replaced and the
    /// caller must re-factor its proposal kernel.
    ///
    /// `acceptance_rate` is the exact running mean of accepted iterations;
    /// `empirical` is the online estimate of the chain's own covariance,
    /// read only during the shape phase.
    pub fn update(
        &mut self,
        iteration: usize,
        acceptance_rate: f64,
        empirical: ArrayView2<'_, f64>,
    ) -> bool {
        let next = self.next_phase(iteration, acceptance_rate);
        let replaced = match next {
            Phase::Size => {
                let since_start =
                    (iteration - self.options.size_start.unwrap_or(iteration)) as f64;
                self.scaling_multiplier = (self.options.size_cooling.powf(since_start)
                    * (acceptance_rate - TARGET_ACCEPTANCE))
                    .exp();
                self.scaling_sd =
                    (self.scaling_sd * self.scaling_multiplier).min(self.options.max_scaling_sd);
                let candidate = &self.initial * (self.scaling_sd * self.scaling_sd);
                // Never let rescaling collapse an estimated variance to zero;
                // the scaling factor itself still cools.
                if self
                    .estimated
                    .iter()
                    .all(|&i| candidate[[i, i]] >= f64::EPSILON)
                {
                    self.covmat = candidate;
                    true
                } else {
                    false
                }
            }
            Phase::Shape => {
                if self.shape_started_at.is_none() {
                    self.shape_started_at = Some(iteration);
                }
                self.scaling_sd = SHAPE_SCALE / (self.estimated.len() as f64).sqrt();
                self.covmat = &empirical * (self.scaling_sd * self.scaling_sd);
                true
            }
            Phase::None | Phase::Stopped => false,
        };
        self.phase = next;
        replaced
    }

    /// Pure transition logic; the acceptance count `rate * iteration` is
    /// monotone, so phases can only move forward.
    fn next_phase(&self, iteration: usize, acceptance_rate: f64) -> Phase {
        if self.phase == Phase::Stopped || self.estimated.is_empty() {
            return self.phase;
        }
        let acceptances = acceptance_rate * iteration as f64;
        if let Some(threshold) = self.options.shape_start {
            if acceptances >= threshold as f64 {
                let window_open = match (self.shape_started_at, self.options.shape_stop) {
                    (Some(started), Some(stop)) => iteration < started + stop,
                    _ => true,
                };
                return if window_open { Phase::Shape } else { Phase::Stopped };
            }
        }
        if let Some(start) = self.options.size_start {
            if iteration >= start {
                return Phase::Size;
            }
        }
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn empirical_2d() -> Array2<f64> {
        arr2(&[[2.0, 0.5], [0.5, 1.0]])
    }

    #[test]
    fn no_thresholds_means_no_adaptation() {
        let initial = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let mut adapt = Adaptation::new(initial.clone(), vec![0, 1], AdaptOptions::default());
        for i in 1..=100 {
            assert!(!adapt.update(i, 0.9, empirical_2d().view()));
        }
        assert_eq!(adapt.phase(), Phase::None);
        assert_eq!(adapt.covariance(), initial);
    }

    #[test]
    fn size_phase_applies_the_cooled_multiplier() {
        let initial = arr2(&[[1.0]]);
        let options = AdaptOptions {
            size_start: Some(1),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(initial, vec![0], options);

        // First size iteration: cooling^0 = 1, so the multiplier is
        // exp(rate - 0.234) exactly.
        assert!(adapt.update(1, 1.0, empirical_2d().view()));
        assert_eq!(adapt.phase(), Phase::Size);
        let expected_sd = (1.0_f64 - TARGET_ACCEPTANCE).exp();
        assert_abs_diff_eq!(adapt.scaling_sd(), expected_sd, epsilon = 1e-12);
        assert_abs_diff_eq!(
            adapt.covariance()[[0, 0]],
            expected_sd * expected_sd,
            epsilon = 1e-12
        );
    }

    #[test]
    fn size_phase_shrinks_on_low_acceptance() {
        let initial = arr2(&[[4.0]]);
        let options = AdaptOptions {
            size_start: Some(1),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(initial, vec![0], options);
        adapt.update(1, 0.0, empirical_2d().view());
        assert!(adapt.scaling_sd() < 1.0);
        assert!(adapt.covariance()[[0, 0]] < 4.0);
    }

    #[test]
    fn scaling_sd_is_capped() {
        let initial = arr2(&[[1.0]]);
        let options = AdaptOptions {
            size_start: Some(1),
            max_scaling_sd: 1.5,
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(initial, vec![0], options);
        for i in 1..=50 {
            adapt.update(i, 1.0, empirical_2d().view());
        }
        assert!(adapt.scaling_sd() <= 1.5);
    }

    #[test]
    fn rescaling_never_collapses_the_covariance() {
        // Diagonal barely above machine epsilon: one shrinking step would
        // push it below, so the replacement is skipped but the scaling
        // factor still moves.
        let initial = arr2(&[[3e-16]]);
        let options = AdaptOptions {
            size_start: Some(1),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(initial.clone(), vec![0], options);
        let replaced = adapt.update(1, 0.0, empirical_2d().view());
        assert!(!replaced);
        assert_eq!(adapt.covariance(), initial);
        assert!(adapt.scaling_sd() < 1.0);
    }

    #[test]
    fn shape_phase_tracks_the_empirical_covariance() {
        let initial = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let options = AdaptOptions {
            shape_start: Some(5),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(initial, vec![0, 1], options);

        // 4 acceptances in 10 iterations: not enough yet.
        assert!(!adapt.update(10, 0.4, empirical_2d().view()));
        assert_eq!(adapt.phase(), Phase::None);

        // 6 acceptances in 12 iterations crosses the threshold.
        assert!(adapt.update(12, 0.5, empirical_2d().view()));
        assert_eq!(adapt.phase(), Phase::Shape);
        let sd = SHAPE_SCALE / 2.0_f64.sqrt();
        assert_abs_diff_eq!(adapt.scaling_sd(), sd, epsilon = 1e-12);
        assert_abs_diff_eq!(
            adapt.covariance().to_owned(),
            &empirical_2d() * (sd * sd),
            epsilon = 1e-12
        );
    }

    #[test]
    fn shape_window_elapses_into_stopped() {
        let options = AdaptOptions {
            shape_start: Some(1),
            shape_stop: Some(5),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(arr2(&[[1.0]]), vec![0], options);

        assert!(adapt.update(10, 0.5, empirical_2d().view()));
        assert_eq!(adapt.phase(), Phase::Shape);
        let frozen = adapt.covariance().to_owned();

        // Window is 10..15; iteration 15 closes it.
        for i in 11..15 {
            assert!(adapt.update(i, 0.5, empirical_2d().view()));
        }
        assert!(!adapt.update(15, 0.5, empirical_2d().view()));
        assert_eq!(adapt.phase(), Phase::Stopped);

        // Frozen thereafter, whatever the empirical matrix does.
        let other = arr2(&[[99.0]]);
        assert!(!adapt.update(16, 0.9, other.view()));
        assert_eq!(adapt.covariance()[[0, 0]], frozen[[0, 0]]);
        assert_eq!(adapt.phase(), Phase::Stopped);
    }

    #[test]
    fn size_yields_to_shape_once_acceptances_accumulate() {
        let options = AdaptOptions {
            size_start: Some(1),
            shape_start: Some(10),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(arr2(&[[1.0]]), vec![0], options);

        adapt.update(5, 0.5, empirical_2d().view());
        assert_eq!(adapt.phase(), Phase::Size);

        // 0.5 * 20 = 10 acceptances: shape takes over and never reverts.
        adapt.update(20, 0.5, empirical_2d().view());
        assert_eq!(adapt.phase(), Phase::Shape);
        adapt.update(21, 0.5, empirical_2d().view());
        assert_eq!(adapt.phase(), Phase::Shape);
    }

    #[test]
    fn all_fixed_parameters_disable_adaptation() {
        let options = AdaptOptions {
            size_start: Some(1),
            shape_start: Some(1),
            ..AdaptOptions::default()
        };
        let mut adapt = Adaptation::new(arr2(&[[0.0]]), vec![], options);
        assert!(!adapt.update(1, 1.0, arr2(&[[0.0]]).view()));
        assert_eq!(adapt.phase(), Phase::None);
    }
}
