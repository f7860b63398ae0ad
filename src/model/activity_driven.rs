//! Activity-driven opinion dynamics on a rewiring network.
//!
//! One iteration runs five phases in order, each to completion:
//!
//! 1. Activation: agent i becomes active with probability a_i
//! 2. Rewiring: active agents pick contacts by homophily-weighted reservoir
//!    sampling; inactive agents lose all outgoing edges
//! 3. Reciprocity: unreciprocated contacts are returned with the configured
//!    reciprocity probability
//! 4. Transpose: outgoing edges become incoming edges
//! 5. Opinion update: one RK4 step of
//!    dx_i/dt = -x_i + (K / r_i) Σ_j w_ij tanh(α x_j), with r_i the reluctance
//!
//! Bots (the first `n_bots` agents) take part in phases 1-3 with their own
//! parameters and act as sources in phase 5, but their opinion never changes.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Distribution;
use rayon::prelude::*;
use tracing::warn;

use crate::agent::Agent;
use crate::config::ActivityDrivenSettings;
use crate::error::{Result, SimulationError};
use crate::network::{EdgeDirection, Network};
use crate::sampling::{BivariateGaussianCopula, PowerLaw, ReservoirSampler, TruncatedLogNormal};

/// Scratch arena for the four RK4 stages, one slope per agent.
#[derive(Clone, Debug, Default)]
struct Rk4Buffers {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
}

impl Rk4Buffers {
    /// Resize only when the agent count changed.
    fn ensure_len(&mut self, n_agents: usize) {
        if self.k1.len() != n_agents {
            self.k1.resize(n_agents, 0.0);
            self.k2.resize(n_agents, 0.0);
            self.k3.resize(n_agents, 0.0);
            self.k4.resize(n_agents, 0.0);
        }
    }
}

/// Coupling constants of the opinion ODE.
#[derive(Clone, Copy, Debug)]
struct OdeParameters {
    dt: f64,
    k: f64,
    alpha: f64,
    n_bots: usize,
}

/// Compute `dt · f(x + factor · k_prev)` for every agent.
///
/// Reads incoming edges of `network`. Bot slopes are pinned to zero so that
/// bots contribute their fixed opinion at every stage.
fn euler_slopes(
    agents: &[Agent],
    network: &Network,
    params: OdeParameters,
    previous: Option<(&[f64], f64)>,
    k_out: &mut [f64],
) {
    let opinion = |j: usize| match previous {
        Some((k_prev, factor)) => agents[j].opinion + factor * k_prev[j],
        None => agents[j].opinion,
    };

    k_out.par_iter_mut().enumerate().for_each(|(idx, k_i)| {
        if idx < params.n_bots {
            *k_i = 0.0;
            return;
        }

        let influence: f64 = network
            .edges(idx)
            .map(|(j, w)| w * (params.alpha * opinion(j)).tanh())
            .sum();

        let slope = -opinion(idx) + params.k / agents[idx].reluctance * influence;
        *k_i = params.dt * slope;
    });
}

/// Contact weight of `contacter` reaching `contacted`: |x_i - x_j|^(-β).
#[inline]
fn homophily_weight(agents: &[Agent], contacter: usize, contacted: usize, homophily: f64) -> f64 {
    if contacter == contacted {
        return 0.0;
    }
    (agents[contacter].opinion - agents[contacted].opinion)
        .abs()
        .powf(-homophily)
}

/// Activity-driven model state.
///
/// Owns the agents and all per-iteration scratch state; the network is owned
/// by the caller and lent mutably to each iteration.
#[derive(Clone, Debug)]
pub struct ActivityDrivenModel {
    agents: Vec<Agent>,
    settings: ActivityDrivenSettings,
    sampler: ReservoirSampler,
    contacted_agents: Vec<usize>,
    active: Vec<bool>,
    n_contacts: Vec<usize>,
    reciprocal_edge_buffer: HashSet<(usize, usize)>,
    rk4: Rk4Buffers,
    n_iterations: usize,
    n_active: usize,
    max_opinion_change: Option<f64>,
    reported_non_finite: bool,
}

impl ActivityDrivenModel {
    /// Create a model for `n_agents` agents.
    ///
    /// Fails if the settings are inconsistent with the agent count (`m` too
    /// large, bot arrays shorter than `n_bots`, degenerate power law, ...).
    /// Non-bot agents start at the `Agent` default; bots take their configured
    /// opinion and activity.
    pub fn new(n_agents: usize, settings: ActivityDrivenSettings) -> Result<Self> {
        settings.validate_for_agents(n_agents)?;

        let mut model = Self {
            agents: vec![Agent::default(); n_agents],
            settings,
            sampler: ReservoirSampler::new(),
            contacted_agents: Vec::new(),
            active: vec![false; n_agents],
            n_contacts: vec![0; n_agents],
            reciprocal_edge_buffer: HashSet::new(),
            rk4: Rk4Buffers::default(),
            n_iterations: 0,
            n_active: 0,
            max_opinion_change: None,
            reported_non_finite: false,
        };
        model.rk4.ensure_len(n_agents);
        model.pin_bots();
        Ok(model)
    }

    /// Apply the configured bot opinions and activities.
    fn pin_bots(&mut self) {
        let n_bots = self.settings.n_bots;
        for (idx, agent) in self.agents.iter_mut().take(n_bots).enumerate() {
            agent.opinion = self.settings.bot_opinion[idx];
            agent.activity = self.settings.bot_activity[idx];
        }
    }

    /// Draw initial agent state.
    ///
    /// Opinions are uniform on [-1, 1], activities follow the truncated power
    /// law, and reluctances (if enabled) come from the log-normal coupled to
    /// the activity through the copula. Bots are skipped.
    pub fn initialize_from_power_law(&mut self, rng: &mut StdRng) -> Result<()> {
        let power_law = PowerLaw::new(self.settings.eps, self.settings.gamma)?;
        let copula = if self.settings.use_reluctances {
            let reluctance = TruncatedLogNormal::new(
                self.settings.reluctance_mean,
                self.settings.reluctance_sigma,
                self.settings.reluctance_eps,
            )?;
            Some(BivariateGaussianCopula::new(
                self.settings.covariance_factor,
                power_law,
                reluctance,
            )?)
        } else {
            None
        };

        let n_bots = self.settings.n_bots;
        for agent in self.agents.iter_mut().skip(n_bots) {
            agent.opinion = rng.gen_range(-1.0..=1.0);
            match &copula {
                Some(copula) => {
                    let (activity, reluctance) = copula.sample(rng);
                    agent.activity = activity;
                    agent.reluctance = reluctance;
                }
                None => {
                    agent.activity = power_law.sample(rng);
                    agent.reluctance = 1.0;
                }
            }
        }

        Ok(())
    }

    /// Replace all agents, e.g. with state read from a file.
    ///
    /// Bots keep their configured opinion and activity.
    pub fn set_agents(&mut self, agents: Vec<Agent>) -> Result<()> {
        if agents.len() != self.agents.len() {
            return Err(SimulationError::Configuration(format!(
                "expected {} agents, got {}",
                self.agents.len(),
                agents.len()
            )));
        }
        self.agents = agents;
        self.pin_bots();
        Ok(())
    }

    /// Contacts per activation and homophily for agent `idx`.
    #[inline]
    fn contact_parameters(&self, idx: usize) -> (usize, f64) {
        if idx < self.settings.n_bots {
            (self.settings.bot_m[idx], self.settings.bot_homophily[idx])
        } else {
            (self.settings.m, self.settings.homophily)
        }
    }

    /// Run one full iteration (phases 1-5).
    ///
    /// # Panics
    ///
    /// Panics if `network` does not have one node per agent.
    pub fn iteration(&mut self, network: &mut Network, rng: &mut StdRng) {
        assert_eq!(
            network.n_agents(),
            self.agents.len(),
            "network and model disagree on the number of agents"
        );

        self.activate(rng);
        self.rewire(network, rng);
        self.reciprocate(network, rng);
        network.transpose();
        self.integrate_opinions(network);

        self.n_iterations += 1;
    }

    /// Phase 1: decide which agents act this iteration.
    fn activate(&mut self, rng: &mut StdRng) {
        let mean_activities = self.settings.mean_activities;
        for (active, agent) in self.active.iter_mut().zip(&self.agents) {
            *active = mean_activities || rng.gen::<f64>() < agent.activity;
        }
        self.n_active = self.active.iter().filter(|&&a| a).count();
    }

    /// Phase 2: replace the outgoing edges of every agent.
    fn rewire(&mut self, network: &mut Network, rng: &mut StdRng) {
        let n_agents = self.agents.len();
        network.set_direction(EdgeDirection::Outgoing);
        self.reciprocal_edge_buffer.clear();

        for idx in 0..n_agents {
            if !self.active[idx] {
                network.clear_edges(idx);
                self.n_contacts[idx] = 0;
                continue;
            }

            let (m, homophily) = self.contact_parameters(idx);
            let edge_weight = if self.settings.mean_activities {
                self.agents[idx].activity
            } else {
                1.0
            };

            let weight = if self.settings.mean_weights {
                // Expected number of contacts per potential neighbour
                self.contacted_agents.clear();
                self.contacted_agents
                    .extend((0..n_agents).filter(|&j| j != idx));
                if n_agents > 1 {
                    edge_weight * m as f64 / (n_agents - 1) as f64
                } else {
                    edge_weight
                }
            } else {
                let agents = &self.agents;
                self.sampler.sample(
                    m,
                    n_agents,
                    |j| homophily_weight(agents, idx, j, homophily),
                    &mut self.contacted_agents,
                    rng,
                );
                edge_weight
            };

            network.set_neighbours_uniform(idx, &self.contacted_agents, weight);
            self.n_contacts[idx] = self.contacted_agents.len();
            self.reciprocal_edge_buffer
                .extend(self.contacted_agents.iter().map(|&j| (idx, j)));
        }
    }

    /// Phase 3: return unreciprocated contacts.
    ///
    /// Only edges created during rewiring are considered; appended edges never
    /// trigger further reciprocation.
    fn reciprocate(&mut self, network: &mut Network, rng: &mut StdRng) {
        let reciprocity = self.settings.reciprocity;
        let mean_weights = self.settings.mean_weights;

        for idx in 0..self.agents.len() {
            let n_created = self.n_contacts[idx];
            if n_created == 0 {
                continue;
            }

            self.contacted_agents.clear();
            self.contacted_agents
                .extend_from_slice(&network.neighbours(idx)[..n_created]);
            let weight = network.weights(idx)[0];

            for &contacted in &self.contacted_agents {
                if self.reciprocal_edge_buffer.contains(&(contacted, idx)) {
                    continue;
                }

                if mean_weights {
                    network.push_back_neighbour_and_weight(contacted, idx, reciprocity * weight);
                } else if rng.gen::<f64>() < reciprocity {
                    network.push_back_neighbour_and_weight(contacted, idx, weight);
                }
            }
        }
    }

    /// Phase 5: one RK4 step over the incoming-edge network.
    fn integrate_opinions(&mut self, network: &Network) {
        let n_agents = self.agents.len();
        self.rk4.ensure_len(n_agents);

        let params = OdeParameters {
            dt: self.settings.dt,
            k: self.settings.k,
            alpha: self.settings.alpha,
            n_bots: self.settings.n_bots,
        };
        let agents = &self.agents;
        let rk4 = &mut self.rk4;

        // k1 = h f(x)
        euler_slopes(agents, network, params, None, &mut rk4.k1);
        // k2 = h f(x + k1/2)
        euler_slopes(agents, network, params, Some((rk4.k1.as_slice(), 0.5)), &mut rk4.k2);
        // k3 = h f(x + k2/2)
        euler_slopes(agents, network, params, Some((rk4.k2.as_slice(), 0.5)), &mut rk4.k3);
        // k4 = h f(x + k3)
        euler_slopes(agents, network, params, Some((rk4.k3.as_slice(), 1.0)), &mut rk4.k4);

        let mut max_change = 0.0_f64;
        for idx in params.n_bots..n_agents {
            let delta = (self.rk4.k1[idx]
                + 2.0 * self.rk4.k2[idx]
                + 2.0 * self.rk4.k3[idx]
                + self.rk4.k4[idx])
                / 6.0;
            self.agents[idx].opinion += delta;

            if delta.is_nan() || max_change.is_nan() {
                max_change = f64::NAN;
            } else {
                max_change = max_change.max(delta.abs());
            }
        }

        if !self.reported_non_finite && !max_change.is_finite() {
            warn!(
                iteration = self.n_iterations + 1,
                "non-finite opinion update; check dt, K and alpha"
            );
            self.reported_non_finite = true;
        }

        self.max_opinion_change = Some(max_change);
    }

    /// True once the iteration cap is reached or opinions stopped moving.
    pub fn is_finished(&self) -> bool {
        if let Some(max_iterations) = self.settings.max_iterations {
            if self.n_iterations >= max_iterations {
                return true;
            }
        }
        matches!(self.max_opinion_change, Some(change) if change < self.settings.convergence_tol)
    }

    /// Agent states.
    #[inline]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Current opinions, one per agent.
    pub fn opinions(&self) -> Vec<f64> {
        self.agents.iter().map(|a| a.opinion).collect()
    }

    /// Number of completed iterations.
    #[inline]
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// Number of agents active in the last iteration.
    #[inline]
    pub fn n_active(&self) -> usize {
        self.n_active
    }

    /// Largest |Δx| over non-bot agents in the last iteration.
    #[inline]
    pub fn max_opinion_change(&self) -> Option<f64> {
        self.max_opinion_change
    }

    /// Whether agent `idx` is a bot.
    #[inline]
    pub fn is_bot(&self, idx: usize) -> bool {
        idx < self.settings.n_bots
    }
}
