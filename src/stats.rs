//! Per-iteration summary statistics and opinion trajectories.

use ndarray::Array2;

/// Summary of one completed iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationStats {
    /// Iteration number, starting at 1.
    pub iteration: usize,
    /// Largest |Δx| over updated agents.
    pub max_opinion_change: f64,
    pub mean_opinion: f64,
    /// Population variance of the opinions.
    pub opinion_variance: f64,
    /// Agents that acted during the iteration.
    pub n_active: usize,
    /// Edges in the network after the iteration.
    pub n_edges: usize,
}

impl IterationStats {
    /// Collect statistics from the opinions after an iteration.
    pub fn from_opinions(
        iteration: usize,
        opinions: &[f64],
        max_opinion_change: f64,
        n_active: usize,
        n_edges: usize,
    ) -> Self {
        let (mean_opinion, opinion_variance) = mean_and_variance(opinions);
        Self {
            iteration,
            max_opinion_change,
            mean_opinion,
            opinion_variance,
            n_active,
            n_edges,
        }
    }
}

/// Mean and population variance; `(0, 0)` for an empty slice.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

/// Opinion snapshots stacked row by row.
///
/// Row `r` holds the opinions after `iterations()[r]` iterations; columns are
/// agents.
#[derive(Clone, Debug)]
pub struct OpinionTrajectory {
    n_agents: usize,
    iterations: Vec<usize>,
    data: Vec<f64>,
}

impl OpinionTrajectory {
    pub fn new(n_agents: usize) -> Self {
        Self {
            n_agents,
            iterations: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Append one snapshot.
    ///
    /// Panics if `opinions` does not have one entry per agent.
    pub fn record(&mut self, iteration: usize, opinions: &[f64]) {
        assert_eq!(opinions.len(), self.n_agents, "snapshot has the wrong number of agents");
        self.iterations.push(iteration);
        self.data.extend_from_slice(opinions);
    }

    /// Number of recorded snapshots.
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    /// Iteration numbers of the recorded rows.
    pub fn iterations(&self) -> &[usize] {
        &self.iterations
    }

    /// Consume the trajectory into its matrix form.
    pub fn into_array2(self) -> Array2<f64> {
        let shape = (self.iterations.len(), self.n_agents);
        Array2::from_shape_vec(shape, self.data).unwrap_or_else(|_| Array2::zeros((0, shape.1)))
    }
}
