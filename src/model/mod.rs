//! Opinion dynamics models.
//!
//! The driver picks one model at setup and then only talks to [`Model`].

pub mod activity_driven;
pub mod degroot;

pub use activity_driven::ActivityDrivenModel;
pub use degroot::DeGrootModel;

use rand::rngs::StdRng;

use crate::agent::Agent;
use crate::network::Network;

/// A configured model, dispatched by variant.
#[derive(Clone, Debug)]
pub enum Model {
    DeGroot(DeGrootModel),
    ActivityDriven(ActivityDrivenModel),
}

impl Model {
    /// Advance by one iteration.
    ///
    /// The DeGroot model is deterministic and never touches `rng`.
    pub fn iteration(&mut self, network: &mut Network, rng: &mut StdRng) {
        match self {
            Model::DeGroot(model) => model.iteration(network),
            Model::ActivityDriven(model) => model.iteration(network, rng),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Model::DeGroot(model) => model.is_finished(),
            Model::ActivityDriven(model) => model.is_finished(),
        }
    }

    pub fn n_iterations(&self) -> usize {
        match self {
            Model::DeGroot(model) => model.n_iterations(),
            Model::ActivityDriven(model) => model.n_iterations(),
        }
    }

    pub fn max_opinion_change(&self) -> Option<f64> {
        match self {
            Model::DeGroot(model) => model.max_opinion_change(),
            Model::ActivityDriven(model) => model.max_opinion_change(),
        }
    }

    /// Agents that acted in the last iteration; every agent for DeGroot.
    pub fn n_active(&self) -> usize {
        match self {
            Model::DeGroot(model) => model.opinions().len(),
            Model::ActivityDriven(model) => model.n_active(),
        }
    }

    pub fn opinions(&self) -> Vec<f64> {
        match self {
            Model::DeGroot(model) => model.opinions().to_vec(),
            Model::ActivityDriven(model) => model.opinions(),
        }
    }

    /// Full agent state for output.
    ///
    /// DeGroot agents carry only an opinion; the other columns take the
    /// `Agent` defaults.
    pub fn agent_records(&self) -> Vec<Agent> {
        match self {
            Model::DeGroot(model) => model
                .opinions()
                .iter()
                .map(|&opinion| Agent {
                    opinion,
                    ..Agent::default()
                })
                .collect(),
            Model::ActivityDriven(model) => model.agents().to_vec(),
        }
    }
}
