//! Directed weighted network of agents.
//!
//! Each agent owns an ordered list of neighbour indices and a parallel list of
//! edge weights. Whether those lists hold incoming or outgoing edges depends on
//! the phase of the iteration: rewiring writes outgoing edges, the opinion
//! update reads incoming ones. `transpose` switches between the two views.

pub mod generate;

pub use generate::{fully_connected, n_connections};

use crate::error::{Result, SimulationError};

/// Orientation of the stored edge lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeDirection {
    /// `neighbours(i)` are the agents influencing `i`.
    Incoming,
    /// `neighbours(i)` are the agents contacted by `i`.
    Outgoing,
}

impl EdgeDirection {
    fn flipped(self) -> Self {
        match self {
            EdgeDirection::Incoming => EdgeDirection::Outgoing,
            EdgeDirection::Outgoing => EdgeDirection::Incoming,
        }
    }
}

/// Adjacency-list network with per-edge weights.
///
/// Multi-edges between the same ordered pair are kept as separate entries.
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    neighbour_list: Vec<Vec<usize>>,
    weight_list: Vec<Vec<f64>>,
    direction: EdgeDirection,
}

impl Network {
    /// Create a network of `n_agents` isolated agents.
    pub fn new(n_agents: usize, direction: EdgeDirection) -> Self {
        Self {
            neighbour_list: vec![Vec::new(); n_agents],
            weight_list: vec![Vec::new(); n_agents],
            direction,
        }
    }

    /// Build a network from adjacency and weight lists.
    ///
    /// # Arguments
    /// * `neighbour_list` - Neighbour indices for each agent
    /// * `weight_list` - Weights parallel to `neighbour_list`
    /// * `direction` - Orientation of the supplied lists
    pub fn from_adjacency(
        neighbour_list: Vec<Vec<usize>>,
        weight_list: Vec<Vec<f64>>,
        direction: EdgeDirection,
    ) -> Result<Self> {
        let n_agents = neighbour_list.len();

        if weight_list.len() != n_agents {
            return Err(SimulationError::Configuration(format!(
                "neighbour list has {} agents but weight list has {}",
                n_agents,
                weight_list.len()
            )));
        }

        for (idx, (neighbours, weights)) in neighbour_list.iter().zip(&weight_list).enumerate() {
            if neighbours.len() != weights.len() {
                return Err(SimulationError::Configuration(format!(
                    "agent {idx} has {} neighbours but {} weights",
                    neighbours.len(),
                    weights.len()
                )));
            }
            if let Some(&bad) = neighbours.iter().find(|&&j| j >= n_agents) {
                return Err(SimulationError::Configuration(format!(
                    "agent {idx} references neighbour {bad} outside 0..{n_agents}"
                )));
            }
        }

        Ok(Self {
            neighbour_list,
            weight_list,
            direction,
        })
    }

    /// Number of agents.
    #[inline]
    pub fn n_agents(&self) -> usize {
        self.neighbour_list.len()
    }

    /// Total number of stored edges (multi-edges counted separately).
    pub fn n_edges(&self) -> usize {
        self.neighbour_list.iter().map(Vec::len).sum()
    }

    /// Current orientation of the edge lists.
    #[inline]
    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    /// Relabel the orientation without moving any edge.
    ///
    /// Only meaningful when every edge list is about to be rewritten.
    pub fn set_direction(&mut self, direction: EdgeDirection) {
        self.direction = direction;
    }

    /// Neighbour indices of agent `idx` in the current orientation.
    #[inline]
    pub fn neighbours(&self, idx: usize) -> &[usize] {
        &self.neighbour_list[idx]
    }

    /// Edge weights of agent `idx`, parallel to `neighbours(idx)`.
    #[inline]
    pub fn weights(&self, idx: usize) -> &[f64] {
        &self.weight_list[idx]
    }

    /// Iterate `(neighbour, weight)` pairs of agent `idx`.
    pub fn edges(&self, idx: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.neighbour_list[idx]
            .iter()
            .copied()
            .zip(self.weight_list[idx].iter().copied())
    }

    /// Replace all edges of agent `idx`.
    ///
    /// Panics if the slices differ in length.
    pub fn set_neighbours_and_weights(&mut self, idx: usize, neighbours: &[usize], weights: &[f64]) {
        assert_eq!(
            neighbours.len(),
            weights.len(),
            "neighbours and weights must have the same length"
        );
        self.neighbour_list[idx].clear();
        self.neighbour_list[idx].extend_from_slice(neighbours);
        self.weight_list[idx].clear();
        self.weight_list[idx].extend_from_slice(weights);
    }

    /// Replace all edges of agent `idx`, giving every edge the same weight.
    pub fn set_neighbours_uniform(&mut self, idx: usize, neighbours: &[usize], weight: f64) {
        self.neighbour_list[idx].clear();
        self.neighbour_list[idx].extend_from_slice(neighbours);
        self.weight_list[idx].clear();
        self.weight_list[idx].resize(neighbours.len(), weight);
    }

    /// Remove all edges of agent `idx`.
    pub fn clear_edges(&mut self, idx: usize) {
        self.neighbour_list[idx].clear();
        self.weight_list[idx].clear();
    }

    /// Append one edge to agent `idx` without touching existing ones.
    pub fn push_back_neighbour_and_weight(&mut self, idx: usize, neighbour: usize, weight: f64) {
        self.neighbour_list[idx].push(neighbour);
        self.weight_list[idx].push(weight);
    }

    /// Flip every edge so that `i -> j` stored at `i` becomes stored at `j`.
    ///
    /// Weights and multi-edges are preserved; the orientation flag toggles.
    /// Within each new list, entries appear in ascending order of the old
    /// owner index.
    pub fn transpose(&mut self) {
        let n_agents = self.n_agents();
        let mut in_degree = vec![0usize; n_agents];
        for neighbours in &self.neighbour_list {
            for &j in neighbours {
                in_degree[j] += 1;
            }
        }

        let mut neighbour_list: Vec<Vec<usize>> =
            in_degree.iter().map(|&d| Vec::with_capacity(d)).collect();
        let mut weight_list: Vec<Vec<f64>> =
            in_degree.iter().map(|&d| Vec::with_capacity(d)).collect();

        for (i, (neighbours, weights)) in
            self.neighbour_list.iter().zip(&self.weight_list).enumerate()
        {
            for (&j, &w) in neighbours.iter().zip(weights) {
                neighbour_list[j].push(i);
                weight_list[j].push(w);
            }
        }

        self.neighbour_list = neighbour_list;
        self.weight_list = weight_list;
        self.direction = self.direction.flipped();
    }

    /// All edges as `(owner, neighbour, weight)`, sorted.
    ///
    /// Two networks with the same edge multiset produce the same list
    /// regardless of the order edges were inserted in.
    pub fn sorted_edge_list(&self) -> Vec<(usize, usize, f64)> {
        let mut edges: Vec<(usize, usize, f64)> = (0..self.n_agents())
            .flat_map(|i| self.edges(i).map(move |(j, w)| (i, j, w)))
            .collect();
        edges.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.total_cmp(&b.2))
        });
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample_network() -> Network {
        // 0 -> 1 (0.5), 0 -> 2 (1.5), 2 -> 0 (2.0), 2 -> 1 twice
        Network::from_adjacency(
            vec![vec![2, 1], vec![], vec![1, 0, 1]],
            vec![vec![1.5, 0.5], vec![], vec![1.0, 2.0, 3.0]],
            EdgeDirection::Outgoing,
        )
        .unwrap()
    }

    #[test]
    fn test_from_adjacency_validation() {
        let mismatched = Network::from_adjacency(
            vec![vec![1], vec![]],
            vec![vec![], vec![]],
            EdgeDirection::Incoming,
        );
        assert!(mismatched.is_err());

        let out_of_range = Network::from_adjacency(
            vec![vec![5], vec![]],
            vec![vec![1.0], vec![]],
            EdgeDirection::Incoming,
        );
        assert!(out_of_range.is_err());
    }

    #[test]
    fn test_transpose_moves_edges() {
        let mut network = sample_network();
        network.transpose();

        assert_eq!(network.direction(), EdgeDirection::Incoming);
        assert_eq!(network.neighbours(0), &[2]);
        assert_eq!(network.weights(0), &[2.0]);
        // Incoming edges of 1: from 0 (0.5), from 2 twice (1.0, 3.0)
        assert_eq!(network.neighbours(1), &[0, 2, 2]);
        assert_eq!(network.weights(1), &[0.5, 1.0, 3.0]);
        assert_eq!(network.neighbours(2), &[0]);
        assert_eq!(network.weights(2), &[1.5]);
        assert_eq!(network.n_edges(), 5);
    }

    /// Random multigraph with duplicate edges, self-loops and empty rows.
    fn random_network(rng: &mut StdRng) -> Network {
        let n_agents = rng.gen_range(1..=12);
        let mut neighbour_list: Vec<Vec<usize>> = Vec::with_capacity(n_agents);
        let mut weight_list: Vec<Vec<f64>> = Vec::with_capacity(n_agents);
        for _ in 0..n_agents {
            let degree = rng.gen_range(0..=2 * n_agents);
            neighbour_list.push((0..degree).map(|_| rng.gen_range(0..n_agents)).collect());
            weight_list.push((0..degree).map(|_| rng.gen_range(-2.0..2.0)).collect());
        }
        Network::from_adjacency(neighbour_list, weight_list, EdgeDirection::Outgoing).unwrap()
    }

    #[test]
    fn test_double_transpose_preserves_edge_multiset() {
        let mut networks = vec![sample_network()];
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            networks.push(random_network(&mut rng));
        }

        for original in networks {
            let mut network = original.clone();
            network.transpose();
            assert_eq!(network.direction(), EdgeDirection::Incoming);
            assert_eq!(network.n_edges(), original.n_edges());

            // Each stored edge i <- j must be j -> i in the original
            let mut reversed: Vec<(usize, usize, f64)> = network
                .sorted_edge_list()
                .into_iter()
                .map(|(i, j, w)| (j, i, w))
                .collect();
            reversed.sort_by(|a, b| {
                a.0.cmp(&b.0)
                    .then(a.1.cmp(&b.1))
                    .then(a.2.total_cmp(&b.2))
            });
            assert_eq!(reversed, original.sorted_edge_list());

            network.transpose();
            assert_eq!(network.direction(), original.direction());
            assert_eq!(network.sorted_edge_list(), original.sorted_edge_list());
        }
    }

    #[test]
    fn test_set_and_push_edges() {
        let mut network = Network::new(3, EdgeDirection::Outgoing);
        network.set_neighbours_uniform(0, &[1, 2], 1.0);
        network.push_back_neighbour_and_weight(0, 1, 0.25);
        assert_eq!(network.neighbours(0), &[1, 2, 1]);
        assert_eq!(network.weights(0), &[1.0, 1.0, 0.25]);

        network.set_neighbours_and_weights(0, &[2], &[0.75]);
        assert_eq!(network.edges(0).collect::<Vec<_>>(), vec![(2, 0.75)]);

        network.clear_edges(0);
        assert!(network.neighbours(0).is_empty());
        assert_eq!(network.n_edges(), 0);
    }
}
