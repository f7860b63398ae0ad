//! DeGroot averaging: each agent adopts the weighted mean of its neighbours.
//!
//! x_i(t+1) = Σ_j w_ij x_j(t), read over incoming edges. With row-normalised
//! weights on a connected network all opinions converge to a common value.

use tracing::warn;

use crate::config::DeGrootSettings;
use crate::network::{EdgeDirection, Network};

/// DeGroot model state.
#[derive(Clone, Debug)]
pub struct DeGrootModel {
    opinions: Vec<f64>,
    buffer: Vec<f64>,
    settings: DeGrootSettings,
    n_iterations: usize,
    max_opinion_change: Option<f64>,
}

impl DeGrootModel {
    /// Create a model whose agent `i` starts at opinion `i / n_agents`.
    pub fn new(n_agents: usize, settings: DeGrootSettings) -> Self {
        let opinions = (0..n_agents)
            .map(|i| i as f64 / n_agents as f64)
            .collect();
        Self {
            opinions,
            buffer: vec![0.0; n_agents],
            settings,
            n_iterations: 0,
            max_opinion_change: None,
        }
    }

    /// Replace all opinions.
    ///
    /// Panics if the length differs from the agent count.
    pub fn set_opinions(&mut self, opinions: &[f64]) {
        assert_eq!(opinions.len(), self.opinions.len());
        self.opinions.copy_from_slice(opinions);
    }

    /// One synchronous averaging step over the incoming edges of `network`.
    pub fn iteration(&mut self, network: &Network) {
        if network.direction() != EdgeDirection::Incoming {
            warn!("DeGroot update on an outgoing network; averaging over contacted agents");
        }

        for (idx, next) in self.buffer.iter_mut().enumerate() {
            *next = network
                .edges(idx)
                .map(|(j, w)| w * self.opinions[j])
                .sum();
        }

        let max_change = self
            .buffer
            .iter()
            .zip(&self.opinions)
            .map(|(new, old)| (new - old).abs())
            .fold(0.0_f64, f64::max);

        std::mem::swap(&mut self.opinions, &mut self.buffer);
        self.max_opinion_change = Some(max_change);
        self.n_iterations += 1;
    }

    /// True once the iteration cap is reached or the update fell below tolerance.
    pub fn is_finished(&self) -> bool {
        if let Some(max_iterations) = self.settings.max_iterations {
            if self.n_iterations >= max_iterations {
                return true;
            }
        }
        matches!(self.max_opinion_change, Some(change) if change < self.settings.convergence_tol)
    }

    #[inline]
    pub fn opinions(&self) -> &[f64] {
        &self.opinions
    }

    #[inline]
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    #[inline]
    pub fn max_opinion_change(&self) -> Option<f64> {
        self.max_opinion_change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_opinions() {
        let model = DeGrootModel::new(4, DeGrootSettings::default());
        assert_eq!(model.opinions(), &[0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_complete_graph_reaches_mean_in_one_step() {
        let n_agents = 5;
        // Complete graph including self-loops, uniform row-stochastic weights
        let network = Network::from_adjacency(
            vec![(0..n_agents).collect::<Vec<usize>>(); n_agents],
            vec![vec![1.0 / n_agents as f64; n_agents]; n_agents],
            EdgeDirection::Incoming,
        )
        .unwrap();
        let mut model = DeGrootModel::new(n_agents, DeGrootSettings::default());

        model.iteration(&network);

        // Mean of 0, 0.2, ..., 0.8
        for &x in model.opinions() {
            assert!((x - 0.4).abs() < 1e-12);
        }
        model.iteration(&network);
        assert!(model.max_opinion_change().unwrap() < 1e-12);
        assert!(model.is_finished());
    }

    #[test]
    fn test_stops_at_max_iterations() {
        let settings = DeGrootSettings {
            max_iterations: Some(3),
            convergence_tol: 0.0,
        };
        let network = Network::from_adjacency(
            vec![vec![1], vec![0]],
            vec![vec![1.0], vec![1.0]],
            EdgeDirection::Incoming,
        )
        .unwrap();
        let mut model = DeGrootModel::new(2, settings);
        model.set_opinions(&[1.0, -1.0]);

        // Two agents copying each other oscillate forever
        while !model.is_finished() {
            model.iteration(&network);
        }
        assert_eq!(model.n_iterations(), 3);
        assert_eq!(model.opinions(), &[-1.0, 1.0]);
    }
}
