//! Stochastic sampling primitives.
//!
//! - `reservoir`: weighted sampling without replacement (A-ExpJ), used for rewiring
//! - `distributions`: power-law activities, log-normal reluctances, and their copula

pub mod distributions;
pub mod reservoir;

pub use distributions::{BivariateGaussianCopula, PowerLaw, TruncatedLogNormal};
pub use reservoir::{reservoir_sampling_a_expj, ReservoirSampler};
