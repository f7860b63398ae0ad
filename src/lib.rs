//! Activity-driven opinion dynamics.
//!
//! Agents hold a scalar opinion and an activity. Each iteration active agents
//! rewire their outgoing contacts by homophily-weighted sampling, contacts
//! are reciprocated at random, and opinions advance by one RK4 step of a
//! coupled tanh ODE on the resulting network. A DeGroot averaging model is
//! included for comparison.
//!
//! - [`network`]: weighted directed network with exact transpose
//! - [`sampling`]: A-ExpJ reservoir sampling and the initial-state distributions
//! - [`model`]: the activity-driven and DeGroot models
//! - [`simulation`]: driver, snapshot output and parallel ensembles
//! - [`config`]: TOML settings
//!
//! Python bindings are built with the `python` feature.

pub mod agent;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod network;
pub mod sampling;
pub mod simulation;
pub mod stats;

#[cfg(feature = "python")]
mod python;

pub use agent::Agent;
pub use config::{
    ActivityDrivenSettings, DeGrootSettings, ModelKind, ModelSettings, NetworkSettings,
    OutputSettings, SimulationOptions,
};
pub use error::{Result, SimulationError};
pub use model::{ActivityDrivenModel, DeGrootModel, Model};
pub use network::{EdgeDirection, Network};
pub use sampling::{reservoir_sampling_a_expj, ReservoirSampler};
pub use simulation::{simulate_ensemble_parallel, Simulation, SimulationState};
pub use stats::{IterationStats, OpinionTrajectory};
