//! Python bindings.
//!
//! Thin wrappers that build [`SimulationOptions`] from keyword arguments, run
//! the simulation in Rust and hand results back as numpy arrays.

use ndarray::Array2;
use numpy::{PyArray1, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;

use crate::config::{
    ActivityDrivenSettings, ModelSettings, NetworkSettings, OutputSettings, SimulationOptions,
};
use crate::error::SimulationError;
use crate::sampling::PowerLaw;
use crate::simulation::{simulate_ensemble_parallel, Simulation};
use crate::stats::OpinionTrajectory;

fn to_py_err(e: SimulationError) -> PyErr {
    PyErr::new::<PyValueError, _>(e.to_string())
}

/// Options for a seeded activity-driven run with generated network.
fn activity_driven_options(
    n_agents: usize,
    n_iterations: usize,
    seed: u64,
    mut settings: ActivityDrivenSettings,
) -> PyResult<SimulationOptions> {
    settings.max_iterations = Some(n_iterations);
    let n_connections = settings.m.min(n_agents.saturating_sub(1));

    let options = SimulationOptions {
        rng_seed: Some(seed),
        model_settings: ModelSettings::ActivityDriven(settings),
        network_settings: NetworkSettings {
            n_agents,
            n_connections,
            file: None,
        },
        output_settings: OutputSettings::default(),
    };
    options.validate().map_err(to_py_err)?;
    Ok(options)
}

/// Run the activity-driven model and return its opinion trajectory.
///
/// # Arguments
/// * `n_agents` - Number of agents
/// * `n_iterations` - Iteration cap (the run stops earlier on convergence)
/// * `seed` - RNG seed
/// * `record_every` - Keep every n-th opinion snapshot (iteration 0 is always kept)
///
/// The remaining keyword arguments are the model parameters.
///
/// # Returns
/// * Dict with `opinions` (snapshots x agents), `iterations`, `activities`,
///   `reluctances` and `max_opinion_change` (one entry per iteration)
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(signature = (n_agents, n_iterations, seed, dt=0.01, m=10, eps=0.01, gamma=2.1, alpha=3.0, homophily=0.5, reciprocity=0.5, k=3.0, mean_activities=false, mean_weights=false, use_reluctances=false, reluctance_mean=1.0, reluctance_sigma=0.25, reluctance_eps=0.01, covariance_factor=0.0, record_every=1))]
fn simulate_activity_driven<'py>(
    py: Python<'py>,
    n_agents: usize,
    n_iterations: usize,
    seed: u64,
    dt: f64,
    m: usize,
    eps: f64,
    gamma: f64,
    alpha: f64,
    homophily: f64,
    reciprocity: f64,
    k: f64,
    mean_activities: bool,
    mean_weights: bool,
    use_reluctances: bool,
    reluctance_mean: f64,
    reluctance_sigma: f64,
    reluctance_eps: f64,
    covariance_factor: f64,
    record_every: usize,
) -> PyResult<&'py PyDict> {
    let settings = ActivityDrivenSettings {
        dt,
        m,
        eps,
        gamma,
        alpha,
        homophily,
        reciprocity,
        k,
        mean_activities,
        mean_weights,
        use_reluctances,
        reluctance_mean,
        reluctance_sigma,
        reluctance_eps,
        covariance_factor,
        ..Default::default()
    };
    let options = activity_driven_options(n_agents, n_iterations, seed, settings)?;
    let record_every = record_every.max(1);

    let mut simulation = Simulation::new(options, None, None).map_err(to_py_err)?;
    let mut trajectory = OpinionTrajectory::new(simulation.network().n_agents());
    let mut max_changes = Vec::with_capacity(n_iterations);

    trajectory.record(0, &simulation.model().opinions());
    while !simulation.model().is_finished() {
        let stats = simulation.step();
        max_changes.push(stats.max_opinion_change);
        if stats.iteration % record_every == 0 {
            trajectory.record(stats.iteration, &simulation.model().opinions());
        }
    }

    let agents = simulation.model().agent_records();
    let iterations: Vec<usize> = trajectory.iterations().to_vec();

    let result = PyDict::new(py);
    result.set_item("opinions", PyArray2::from_owned_array(py, trajectory.into_array2()))?;
    result.set_item("iterations", PyArray1::from_vec(py, iterations))?;
    result.set_item(
        "activities",
        PyArray1::from_vec(py, agents.iter().map(|a| a.activity).collect()),
    )?;
    result.set_item(
        "reluctances",
        PyArray1::from_vec(py, agents.iter().map(|a| a.reluctance).collect()),
    )?;
    result.set_item("max_opinion_change", PyArray1::from_vec(py, max_changes))?;
    result.set_item("seed", seed)?;
    result.set_item("n_active_last", simulation.model().n_active())?;

    Ok(result)
}

/// Run independent activity-driven simulations in parallel.
///
/// Run `i` is seeded with `seed + i`.
///
/// # Returns
/// * (n_runs, n_agents) array of final opinions
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(signature = (n_agents, n_iterations, n_runs, seed, dt=0.01, m=10, alpha=3.0, homophily=0.5, reciprocity=0.5, k=3.0))]
fn simulate_activity_driven_ensemble<'py>(
    py: Python<'py>,
    n_agents: usize,
    n_iterations: usize,
    n_runs: usize,
    seed: u64,
    dt: f64,
    m: usize,
    alpha: f64,
    homophily: f64,
    reciprocity: f64,
    k: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let settings = ActivityDrivenSettings {
        dt,
        m,
        alpha,
        homophily,
        reciprocity,
        k,
        ..Default::default()
    };
    let options = activity_driven_options(n_agents, n_iterations, seed, settings)?;

    let finals = simulate_ensemble_parallel(&options, n_runs, seed).map_err(to_py_err)?;
    let flat: Vec<f64> = finals.into_iter().flatten().collect();
    let array = Array2::from_shape_vec((n_runs, n_agents), flat)
        .map_err(|e| PyErr::new::<PyValueError, _>(e.to_string()))?;

    Ok(PyArray2::from_owned_array(py, array))
}

/// Draw `n` activities from the truncated power law on [eps, 1].
#[pyfunction]
fn sample_power_law<'py>(
    py: Python<'py>,
    n: usize,
    eps: f64,
    gamma: f64,
    seed: u64,
) -> PyResult<&'py PyArray1<f64>> {
    let dist = PowerLaw::new(eps, gamma).map_err(to_py_err)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let samples: Vec<f64> = (0..n).map(|_| dist.sample(&mut rng)).collect();
    Ok(PyArray1::from_vec(py, samples))
}

#[pymodule]
fn opinion_dynamics(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(simulate_activity_driven, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_activity_driven_ensemble, m)?)?;
    m.add_function(wrap_pyfunction!(sample_power_law, m)?)?;
    Ok(())
}
