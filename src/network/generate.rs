//! Initial network construction.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;

use super::{EdgeDirection, Network};
use crate::error::{Result, SimulationError};

/// Every agent is connected to every other agent with the same weight.
///
/// Edges are stored as incoming edges; the graph is symmetric so the
/// orientation only matters for bookkeeping.
pub fn fully_connected(n_agents: usize, weight: f64) -> Network {
    let mut network = Network::new(n_agents, EdgeDirection::Incoming);
    let mut neighbours = Vec::with_capacity(n_agents.saturating_sub(1));

    for idx in 0..n_agents {
        neighbours.clear();
        neighbours.extend((0..n_agents).filter(|&j| j != idx));
        network.set_neighbours_uniform(idx, &neighbours, weight);
    }

    network
}

/// Each agent gets `n_connections` distinct random incoming neighbours.
///
/// Weights are drawn uniformly and normalised so that the incoming weights of
/// every agent sum to one (row-stochastic, as the DeGroot model expects).
///
/// # Arguments
/// * `n_agents` - Number of agents
/// * `n_connections` - Neighbours per agent
/// * `self_interaction` - Whether an agent may be its own neighbour
/// * `rng` - Simulation RNG
pub fn n_connections(
    n_agents: usize,
    n_connections: usize,
    self_interaction: bool,
    rng: &mut StdRng,
) -> Result<Network> {
    let n_candidates = if self_interaction {
        n_agents
    } else {
        n_agents.saturating_sub(1)
    };

    if n_connections > n_candidates {
        return Err(SimulationError::Configuration(format!(
            "cannot give each of {n_agents} agents {n_connections} distinct neighbours"
        )));
    }

    let mut network = Network::new(n_agents, EdgeDirection::Incoming);
    let mut weights = Vec::with_capacity(n_connections);

    for idx in 0..n_agents {
        // Sample from the candidate range, then shift past idx when self is excluded
        let neighbours: Vec<usize> = index::sample(rng, n_candidates, n_connections)
            .into_iter()
            .map(|j| if !self_interaction && j >= idx { j + 1 } else { j })
            .collect();

        weights.clear();
        weights.extend((0..n_connections).map(|_| rng.gen::<f64>()));
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        }

        network.set_neighbours_and_weights(idx, &neighbours, &weights);
    }

    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_fully_connected() {
        let network = fully_connected(4, 1.0);
        assert_eq!(network.n_agents(), 4);
        assert_eq!(network.n_edges(), 12);
        assert_eq!(network.neighbours(2), &[0, 1, 3]);
        assert!(network.weights(2).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_n_connections_structure() {
        let mut rng = StdRng::seed_from_u64(42);
        let network = n_connections(20, 5, false, &mut rng).unwrap();

        for idx in 0..20 {
            let neighbours = network.neighbours(idx);
            assert_eq!(neighbours.len(), 5);
            assert!(!neighbours.contains(&idx));

            let mut unique = neighbours.to_vec();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 5);

            let total: f64 = network.weights(idx).iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_n_connections_too_many() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(n_connections(3, 3, false, &mut rng).is_err());
        assert!(n_connections(3, 3, true, &mut rng).is_ok());
    }
}
