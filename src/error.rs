//! Error types shared by the sampler, the proposal kernel, and the
//! supporting estimators.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while configuring or running a chain.
///
/// Configuration problems are reported before the first iteration; the two
/// covariance variants can also surface mid-run if adaptation drives the
/// proposal into a degenerate state. Non-finite target values are *not*
/// errors: the chain treats them as ordinary rejections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A diagonal entry of the proposal covariance is numerically zero on a
    /// parameter that is supposed to be estimated. Sampling cannot continue;
    /// the kernel would collapse to a point.
    #[error("degenerate proposal covariance: variance of `{name}` is {value:e}, below machine epsilon")]
    DegenerateCovariance { name: String, value: f64 },

    /// The estimated block of the proposal covariance is not positive
    /// definite; Cholesky factorization failed at the named parameter's
    /// pivot.
    #[error("proposal covariance is not positive definite (factorization failed at `{name}`)")]
    NotPositiveDefinite { name: String },

    /// A configuration entry refers to a parameter name that is not part of
    /// the initial parameter vector.
    #[error("unknown parameter `{name}`: not present in the initial parameter vector")]
    UnknownParameter { name: String },

    /// A labeled vector built over one parameter set was combined with a
    /// structure built over another; `name` is the first label that does not
    /// line up.
    #[error("parameter sets disagree at `{name}`")]
    LabelMismatch { name: String },

    /// The initial parameter vector starts outside the truncation bounds, so
    /// every reverse proposal density would be -inf and the chain could never
    /// move.
    #[error("initial value of `{name}` ({value}) lies outside its bounds [{lower}, {upper}]")]
    InitOutOfBounds {
        name: String,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// Any other configuration problem rejected before the first iteration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Two series handed to a distance metric have different lengths.
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// A fatal condition hit while the chain was already running, wrapped
    /// with the iteration it occurred at.
    #[error("iteration {iteration}: {source}")]
    AtIteration {
        iteration: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn at_iteration(iteration: usize, source: Error) -> Error {
        Error::AtIteration {
            iteration,
            source: Box::new(source),
        }
    }
}
