pub mod adapt;
pub mod error;
pub mod estimator;
pub mod io;
mod norm;
pub mod params;
pub mod proposal;
pub mod sampler;
pub mod stats;
pub mod trace;
