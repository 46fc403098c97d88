/*!
# Adaptive Metropolis-Hastings Sampler

The chain driver: a random-walk Metropolis-Hastings loop over a named
parameter vector, drawing candidates from the truncated Gaussian kernel and
letting the adaptation controller retune the proposal covariance while the
chain runs. The target density is supplied by the caller through the
[`Target`] trait (any `Fn(&ParamVector) -> f64` closure works) and is the only
external call the loop makes.

## Overview

- **Per iteration**: consult the adaptation controller, draw a candidate,
  evaluate the target, accept or reject with the Hastings correction for the
  truncated kernel, record the post-decision state in the trace, update the
  running acceptance rate and the empirical covariance.
- **Validation up front**: labels, bounds, covariance shape and symmetry are
  all checked in [`MetropolisHastings::new`]; once `run` starts, the only
  errors left are adaptation driving the covariance degenerate.
- **Reproducibility**: `set_seed` fixes the RNG, so two runs over the same
  target and settings produce identical traces.

## Example Usage

```rust
use mhfit::params::ParamVector;
use mhfit::sampler::{MetropolisHastings, Settings};

// Un-normalized log-density of a Gaussian centered at 3.
let target = |theta: &ParamVector| {
    let mu = theta.get("mu").unwrap();
    -0.5 * (mu - 3.0) * (mu - 3.0)
};

let init = ParamVector::from_pairs([("mu", 1.0)]).unwrap();
let settings = Settings {
    iterations: 2_000,
    proposal_sd: vec![("mu".into(), 1.0)],
    ..Settings::default()
};

let output = MetropolisHastings::new(target, init, settings)
    .unwrap()
    .set_seed(42)
    .run()
    .unwrap();

let kept = output.trace.burn_and_thin(500, 0);
let mu = kept.column("mu").unwrap();
assert!((mu.mean().unwrap() - 3.0).abs() < 0.5);
```
*/

use std::fmt;

use approx::relative_eq;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;

use crate::adapt::{AdaptOptions, Adaptation, Phase};
use crate::error::{Error, Result};
use crate::estimator::RunningCovariance;
use crate::params::{Bounds, ParamSet, ParamVector};
use crate::proposal::TruncatedProposal;
use crate::trace::{Trace, LOG_DENSITY_COLUMN};

/// The distribution the chain samples from.
///
/// One method: the un-normalized log-density at a parameter vector.
/// `f64::NEG_INFINITY` marks zero density (out of support, impossible data);
/// the sampler treats such candidates as ordinary rejections. Evaluation must
/// be deterministic in `theta`; any model state belongs inside the
/// implementor.
pub trait Target {
    /// Un-normalized log-density at `theta`.
    fn log_density(&self, theta: &ParamVector) -> f64;
}

impl<F> Target for F
where
    F: Fn(&ParamVector) -> f64,
{
    fn log_density(&self, theta: &ParamVector) -> f64 {
        self(theta)
    }
}

/**
Run configuration. All fields have workable defaults except that a parameter
with zero proposal standard deviation stays fixed, so most callers set
`proposal_sd` or `covariance` explicitly; the fallback seeds each standard
deviation at a tenth of the initial value.

# Examples

```rust
use mhfit::sampler::Settings;

let settings = Settings {
    iterations: 10_000,
    adapt_size_start: Some(100),
    adapt_shape_start: Some(500),
    ..Settings::default()
};
assert_eq!(settings.adapt_size_cooling, 0.99);
assert_eq!(settings.max_scaling_sd, 50.0);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Number of iterations to run; must be positive.
    pub iterations: usize,
    /// Per-parameter proposal standard deviations. Parameters not listed
    /// default to a tenth of their initial value; an entry of `0.0` holds
    /// the parameter fixed for the whole run.
    pub proposal_sd: Vec<(String, f64)>,
    /// Full seed covariance in parameter order; takes precedence over
    /// `proposal_sd` when set. Must be square and symmetric.
    pub covariance: Option<Array2<f64>>,
    /// Partial lower truncation bounds; unlisted parameters get -inf.
    pub lower: Vec<(String, f64)>,
    /// Partial upper truncation bounds; unlisted parameters get +inf.
    pub upper: Vec<(String, f64)>,
    /// Iteration at which size adaptation may begin; `None` disables it.
    pub adapt_size_start: Option<usize>,
    /// Cooling factor for the size multiplier, in (0, 1].
    pub adapt_size_cooling: f64,
    /// Number of accepted proposals after which shape adaptation begins;
    /// `None` disables it.
    pub adapt_shape_start: Option<usize>,
    /// Length of the shape-adaptation window in iterations; `None` keeps it
    /// open to the end of the run.
    pub adapt_shape_stop: Option<usize>,
    /// Upper cap on the size-phase scaling factor.
    pub max_scaling_sd: f64,
    /// Cadence of the progress message in [`MetropolisHastings::run_progress`];
    /// display only, defaults to once per percent. Has no effect on sampling.
    pub print_every: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iterations: 1_000,
            proposal_sd: Vec::new(),
            covariance: None,
            lower: Vec::new(),
            upper: Vec::new(),
            adapt_size_start: None,
            adapt_size_cooling: 0.99,
            adapt_shape_start: None,
            adapt_shape_stop: None,
            max_scaling_sd: 50.0,
            print_every: None,
        }
    }
}

/// Snapshot handed to an observer after each completed iteration.
#[derive(Debug, Clone)]
pub struct IterationInfo<'a> {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Total number of iterations in this run.
    pub iterations: usize,
    /// Whether this iteration's candidate was accepted.
    pub accepted: bool,
    /// Exact running mean of accepted iterations so far.
    pub acceptance_rate: f64,
    /// Adaptation phase after this iteration's controller update.
    pub phase: Phase,
    /// Current size-phase scaling factor.
    pub scaling_sd: f64,
    /// The chain's post-decision position.
    pub theta: &'a ParamVector,
    /// Log-density at `theta`.
    pub log_density: f64,
}

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct SamplerOutput {
    /// One row per iteration: estimated parameters plus `log_density`.
    pub trace: Trace,
    /// Final running acceptance rate.
    pub acceptance_rate: f64,
    /// The proposal covariance the run ended on, after any adaptation.
    pub proposal_covariance: Array2<f64>,
    /// The chain's own covariance estimate, the usual seed for a follow-up
    /// run.
    pub empirical_covariance: Array2<f64>,
    /// The chain's final position, fixed parameters included.
    pub final_theta: ParamVector,
}

/**
The adaptive Metropolis-Hastings chain.

Built from a target, an initial parameter vector, and [`Settings`]; consumed
by one of the `run` methods. Construction validates the whole configuration
and evaluates the target once at the initial point, so a returned sampler is
ready to iterate.

# Examples

```rust
use mhfit::params::ParamVector;
use mhfit::sampler::{MetropolisHastings, Settings};

let init = ParamVector::from_pairs([("a", 5.0)]).unwrap();
let mh = MetropolisHastings::new(
    |theta: &ParamVector| -theta.get("a").unwrap().powi(2) / 2.0,
    init,
    Settings::default(),
)
.unwrap();
let output = mh.set_seed(7).run().unwrap();
assert_eq!(output.trace.len(), 1_000);
```
*/
#[derive(Clone)]
pub struct MetropolisHastings<T> {
    target: T,
    set: ParamSet,
    bounds: Bounds,
    estimated: Vec<usize>,
    theta: ParamVector,
    target_value: f64,
    adaptation: Adaptation,
    proposal: TruncatedProposal,
    estimator: RunningCovariance,
    acceptance_rate: f64,
    iterations: usize,
    print_every: Option<usize>,
    /// The seed the RNG was built from, for reporting.
    pub seed: u64,
    rng: SmallRng,
}

// Manual impl: deriving would bound `T: Debug`, which closure targets cannot
// meet. The target itself is the one field left out.
impl<T> fmt::Debug for MetropolisHastings<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetropolisHastings")
            .field("set", &self.set)
            .field("bounds", &self.bounds)
            .field("estimated", &self.estimated)
            .field("theta", &self.theta)
            .field("target_value", &self.target_value)
            .field("adaptation", &self.adaptation)
            .field("proposal", &self.proposal)
            .field("estimator", &self.estimator)
            .field("acceptance_rate", &self.acceptance_rate)
            .field("iterations", &self.iterations)
            .field("print_every", &self.print_every)
            .field("seed", &self.seed)
            .field("rng", &self.rng)
            .finish_non_exhaustive()
    }
}

impl<T: Target> MetropolisHastings<T> {
    /**
    Validates the configuration and builds a ready-to-run chain.

    Checks performed here, before any iteration: positive iteration count,
    adaptation constants in range, covariance shape/symmetry, known names in
    `proposal_sd` and bounds, `lower <= upper`, the initial point inside its
    bounds, and a factorizable seed covariance on the estimated block.

    # Arguments

    * `target` - The distribution to sample from.
    * `init` - Starting point; its names and their order define the
      parameter set for the whole run.
    * `settings` - Everything else; see [`Settings`].
    */
    pub fn new(target: T, init: ParamVector, settings: Settings) -> Result<Self> {
        if settings.iterations == 0 {
            return Err(Error::Config("iterations must be positive".into()));
        }
        if !(settings.adapt_size_cooling > 0.0 && settings.adapt_size_cooling <= 1.0) {
            return Err(Error::Config(format!(
                "adapt_size_cooling must lie in (0, 1], got {}",
                settings.adapt_size_cooling
            )));
        }
        if !(settings.max_scaling_sd > 0.0) {
            return Err(Error::Config(format!(
                "max_scaling_sd must be positive, got {}",
                settings.max_scaling_sd
            )));
        }

        let set = init.set().clone();
        let covmat = seed_covariance(&set, init.values(), &settings)?;
        let estimated: Vec<usize> = (0..set.len()).filter(|&i| covmat[[i, i]] > 0.0).collect();

        let bounds = Bounds::from_pairs(&set, &settings.lower, &settings.upper)?;
        for i in 0..set.len() {
            let value = init.values()[i];
            if value < bounds.lower()[i] || value > bounds.upper()[i] {
                return Err(Error::InitOutOfBounds {
                    name: set.name(i).to_string(),
                    value,
                    lower: bounds.lower()[i],
                    upper: bounds.upper()[i],
                });
            }
        }

        let adaptation = Adaptation::new(
            covmat,
            estimated.clone(),
            AdaptOptions {
                size_start: settings.adapt_size_start,
                size_cooling: settings.adapt_size_cooling,
                shape_start: settings.adapt_shape_start,
                shape_stop: settings.adapt_shape_stop,
                max_scaling_sd: settings.max_scaling_sd,
            },
        );
        let proposal =
            TruncatedProposal::new(&set, adaptation.covariance(), &estimated, &bounds)?;
        let estimator = RunningCovariance::new(set.clone());
        let target_value = target.log_density(&init);
        let seed = thread_rng().gen::<u64>();

        Ok(Self {
            target,
            set,
            bounds,
            estimated,
            theta: init,
            target_value,
            adaptation,
            proposal,
            estimator,
            acceptance_rate: 0.0,
            iterations: settings.iterations,
            print_every: settings.print_every,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Fixes the RNG seed, making the run reproducible.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Runs the chain to completion without any reporting.
    pub fn run(mut self) -> Result<SamplerOutput> {
        self.run_inner(|_| {})
    }

    /// Runs the chain with a progress bar showing the acceptance rate and
    /// the current position. Purely cosmetic; sampling is identical to
    /// [`MetropolisHastings::run`].
    pub fn run_progress(mut self) -> Result<SamplerOutput> {
        let every = self
            .print_every
            .unwrap_or_else(|| (self.iterations / 100).max(1))
            .max(1);
        let pb = ProgressBar::new(self.iterations as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let result = self.run_inner(|info| {
            if info.iteration % every == 0 || info.iteration == info.iterations {
                pb.set_position(info.iteration as u64);
                pb.set_message(format!("acc {:.3} | {}", info.acceptance_rate, info.theta));
            }
        });
        pb.finish_with_message("Done!");
        result
    }

    /// Runs the chain, invoking `observer` after every iteration with the
    /// post-decision state. The observer cannot influence sampling.
    pub fn run_with_observer<F>(mut self, observer: F) -> Result<SamplerOutput>
    where
        F: FnMut(&IterationInfo<'_>),
    {
        self.run_inner(observer)
    }

    fn run_inner<F>(&mut self, mut observe: F) -> Result<SamplerOutput>
    where
        F: FnMut(&IterationInfo<'_>),
    {
        let k = self.estimated.len();
        let mut names: Vec<String> = self
            .estimated
            .iter()
            .map(|&i| self.set.name(i).to_string())
            .collect();
        names.push(LOG_DENSITY_COLUMN.to_string());
        let mut data = Array2::<f64>::zeros((self.iterations, k + 1));

        for iteration in 1..=self.iterations {
            // Let the controller retune the covariance; it sees the rate of
            // the iterations completed so far.
            if self
                .adaptation
                .update(iteration, self.acceptance_rate, self.estimator.covariance())
            {
                self.proposal = TruncatedProposal::new(
                    &self.set,
                    self.adaptation.covariance(),
                    &self.estimated,
                    &self.bounds,
                )
                .map_err(|e| Error::at_iteration(iteration, e))?;
            }

            let candidate = self
                .theta
                .with_values(self.proposal.draw(self.theta.values(), &mut self.rng));
            let candidate_value = self.target.log_density(&candidate);

            // Zero-density candidates are plain rejections; the density
            // terms are skipped entirely.
            let log_acceptance = if !candidate_value.is_finite() {
                f64::NEG_INFINITY
            } else {
                candidate_value - self.target_value
                    + self
                        .proposal
                        .log_density(self.theta.values(), candidate.values())
                    - self
                        .proposal
                        .log_density(candidate.values(), self.theta.values())
            };
            let accepted = self.rng.gen::<f64>().ln() < log_acceptance;

            if accepted {
                self.theta = candidate;
                self.target_value = candidate_value;
            }
            for (col, &idx) in self.estimated.iter().enumerate() {
                data[[iteration - 1, col]] = self.theta.values()[idx];
            }
            data[[iteration - 1, k]] = self.target_value;

            let outcome = if accepted { 1.0 } else { 0.0 };
            self.acceptance_rate += (outcome - self.acceptance_rate) / iteration as f64;
            if self.adaptation.phase() != Phase::Stopped {
                self.estimator
                    .update(&self.theta)
                    .map_err(|e| Error::at_iteration(iteration, e))?;
            }

            observe(&IterationInfo {
                iteration,
                iterations: self.iterations,
                accepted,
                acceptance_rate: self.acceptance_rate,
                phase: self.adaptation.phase(),
                scaling_sd: self.adaptation.scaling_sd(),
                theta: &self.theta,
                log_density: self.target_value,
            });
        }

        Ok(SamplerOutput {
            trace: Trace::from_parts(names, data),
            acceptance_rate: self.acceptance_rate,
            proposal_covariance: self.adaptation.covariance().to_owned(),
            empirical_covariance: self.estimator.covariance().to_owned(),
            final_theta: self.theta.clone(),
        })
    }
}

/// Resolves the seed proposal covariance from the settings: an explicit
/// matrix wins, then per-parameter standard deviations, then the
/// tenth-of-initial fallback.
fn seed_covariance(
    set: &ParamSet,
    init: ArrayView1<'_, f64>,
    settings: &Settings,
) -> Result<Array2<f64>> {
    if let Some(cov) = &settings.covariance {
        let d = set.len();
        if cov.dim() != (d, d) {
            return Err(Error::Config(format!(
                "proposal covariance must be {d}x{d}, got {}x{}",
                cov.nrows(),
                cov.ncols()
            )));
        }
        for i in 0..d {
            for j in (i + 1)..d {
                if !relative_eq!(
                    cov[[i, j]],
                    cov[[j, i]],
                    max_relative = 1e-9,
                    epsilon = 1e-12
                ) {
                    return Err(Error::Config(format!(
                        "proposal covariance is not symmetric between `{}` and `{}`",
                        set.name(i),
                        set.name(j)
                    )));
                }
            }
        }
        return Ok(cov.clone());
    }

    let mut sd: Array1<f64> = init.mapv(|v| v.abs() / 10.0);
    for (name, value) in &settings.proposal_sd {
        let i = set
            .index_of(name)
            .ok_or_else(|| Error::UnknownParameter { name: name.clone() })?;
        if !(*value >= 0.0) {
            return Err(Error::Config(format!(
                "proposal standard deviation of `{name}` must be nonnegative, got {value}"
            )));
        }
        sd[i] = *value;
    }
    Ok(Array2::from_diag(&sd.mapv(|s| s * s)))
}
