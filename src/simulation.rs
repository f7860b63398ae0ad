//! Simulation driver.
//!
//! Builds the RNG, network and model from [`SimulationOptions`], then runs
//! the model until it reports that it is finished, optionally writing
//! snapshots to an output directory.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ModelSettings, SimulationOptions};
use crate::error::{Result, SimulationError};
use crate::io;
use crate::model::{ActivityDrivenModel, DeGrootModel, Model};
use crate::network::{self, Network};
use crate::stats::IterationStats;

/// Lifecycle of a [`Simulation`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulationState {
    #[default]
    Uninitialized,
    /// Set up, no iteration run yet.
    Ready,
    Running,
    /// The model reported convergence or hit its iteration cap.
    Finished,
}

/// One simulation run: RNG, network and model.
#[derive(Debug)]
pub struct Simulation {
    options: SimulationOptions,
    seed: u64,
    rng: StdRng,
    network: Network,
    model: Model,
    state: SimulationState,
}

impl Simulation {
    /// Set up a run.
    ///
    /// # Arguments
    /// * `options` - Validated options
    /// * `network_file` - Network to load instead of generating one; overrides
    ///   `[network] file`
    /// * `agent_file` - Agent state to load after the model is initialised
    pub fn new(
        options: SimulationOptions,
        network_file: Option<&Path>,
        agent_file: Option<&Path>,
    ) -> Result<Self> {
        let mut state = SimulationState::Uninitialized;
        debug!(?state, "setting up simulation");

        let seed = match options.rng_seed {
            Some(seed) => {
                info!(seed, "seeding random number generator");
                seed
            }
            None => {
                let seed = rand::random::<u64>();
                warn!(seed, "no rng_seed configured, drew a fresh seed");
                seed
            }
        };
        let mut rng = StdRng::seed_from_u64(seed);

        info!(model = %options.model_kind(), "model type");

        let network_file: Option<PathBuf> = network_file
            .map(Path::to_path_buf)
            .or_else(|| options.network_settings.file.clone());
        let network = match &network_file {
            Some(path) => {
                info!(path = %path.display(), "reading network from file");
                io::network_from_file(path)?
            }
            None => build_network(&options, &mut rng)?,
        };
        let n_agents = network.n_agents();
        info!(n_agents, n_edges = network.n_edges(), "network ready");

        let mut model = match &options.model_settings {
            ModelSettings::DeGroot(settings) => {
                Model::DeGroot(DeGrootModel::new(n_agents, settings.clone()))
            }
            ModelSettings::ActivityDriven(settings) => {
                let mut model = ActivityDrivenModel::new(n_agents, settings.clone())?;
                model.initialize_from_power_law(&mut rng)?;
                if settings.bot_present() {
                    info!(
                        n_bots = settings.n_bots,
                        bot_opinion = ?&settings.bot_opinion[..settings.n_bots],
                        bot_m = ?&settings.bot_m[..settings.n_bots],
                        bot_activity = ?&settings.bot_activity[..settings.n_bots],
                        bot_homophily = ?&settings.bot_homophily[..settings.n_bots],
                        "bots configured"
                    );
                }
                Model::ActivityDriven(model)
            }
        };

        if let Some(path) = agent_file {
            info!(path = %path.display(), "reading agents from file");
            let agents = io::agents_from_file(path)?;
            match &mut model {
                Model::DeGroot(model) => {
                    if agents.len() != n_agents {
                        return Err(SimulationError::Configuration(format!(
                            "agent file has {} agents but the network has {n_agents}",
                            agents.len()
                        )));
                    }
                    let opinions: Vec<f64> = agents.iter().map(|a| a.opinion).collect();
                    model.set_opinions(&opinions);
                }
                Model::ActivityDriven(model) => model.set_agents(agents)?,
            }
        }

        state = SimulationState::Ready;
        info!("finished model setup");

        Ok(Self {
            options,
            seed,
            rng,
            network,
            model,
            state,
        })
    }

    #[inline]
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Seed actually used, for replaying unseeded runs.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn network(&self) -> &Network {
        &self.network
    }

    #[inline]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[inline]
    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Run one iteration and summarise it.
    pub fn step(&mut self) -> IterationStats {
        self.model.iteration(&mut self.network, &mut self.rng);

        let opinions = self.model.opinions();
        let stats = IterationStats::from_opinions(
            self.model.n_iterations(),
            &opinions,
            self.model.max_opinion_change().unwrap_or(0.0),
            self.model.n_active(),
            self.network.n_edges(),
        );

        if self.options.output_settings.print_progress {
            info!(
                iteration = stats.iteration,
                max_opinion_change = stats.max_opinion_change,
                mean_opinion = stats.mean_opinion,
                n_active = stats.n_active,
                "iteration"
            );
        } else {
            debug!(
                iteration = stats.iteration,
                max_opinion_change = stats.max_opinion_change,
                n_active = stats.n_active,
                n_edges = stats.n_edges,
                "iteration"
            );
        }

        self.state = if self.model.is_finished() {
            SimulationState::Finished
        } else {
            SimulationState::Running
        };

        stats
    }

    /// Iterate until the model is finished.
    ///
    /// With an output directory, writes `opinions_<i>.txt` and
    /// `network_<i>.txt` at the configured cadences (including iteration 0)
    /// and the final state as `opinions_finished.txt` / `network_finished.txt`.
    pub fn run(&mut self, output_dir: Option<&Path>) -> Result<Vec<IterationStats>> {
        if let Some(dir) = output_dir {
            fs::create_dir_all(dir)?;
            self.write_snapshots(dir, 0)?;
        }

        let mut history = Vec::new();
        while !self.model.is_finished() {
            let stats = self.step();
            if let Some(dir) = output_dir {
                self.write_snapshots(dir, stats.iteration)?;
            }
            history.push(stats);
        }
        self.state = SimulationState::Finished;

        info!(
            n_iterations = self.model.n_iterations(),
            max_opinion_change = ?self.model.max_opinion_change(),
            "simulation finished"
        );

        if let Some(dir) = output_dir {
            io::agents_to_file(&self.model.agent_records(), dir.join("opinions_finished.txt"))?;
            io::network_to_file(&self.network, dir.join("network_finished.txt"))?;
        }

        Ok(history)
    }

    /// Write whichever snapshots are due at `iteration`.
    fn write_snapshots(&self, dir: &Path, iteration: usize) -> Result<()> {
        let output = &self.options.output_settings;

        if matches!(output.n_output_agents, Some(n) if iteration % n == 0) {
            let path = dir.join(format!("opinions_{iteration}.txt"));
            io::agents_to_file(&self.model.agent_records(), path)?;
        }
        if matches!(output.n_output_network, Some(n) if iteration % n == 0) {
            let path = dir.join(format!("network_{iteration}.txt"));
            io::network_to_file(&self.network, path)?;
        }
        Ok(())
    }
}

/// Generate the initial network for the configured model.
///
/// A mean-weights activity-driven run starts fully connected; everything else
/// starts with `connections_per_agent` random neighbours per agent, where an
/// agent may draw itself.
fn build_network(options: &SimulationOptions, rng: &mut StdRng) -> Result<Network> {
    let n_agents = options.network_settings.n_agents;

    match &options.model_settings {
        ModelSettings::ActivityDriven(settings) if settings.mean_weights => {
            info!(n_agents, "generating fully connected network");
            Ok(network::fully_connected(n_agents, 1.0))
        }
        _ => {
            let n_connections = options.network_settings.n_connections;
            info!(n_agents, n_connections, "generating random network");
            network::n_connections(n_agents, n_connections, true, rng)
        }
    }
}

/// Run `n_runs` independent simulations in parallel.
///
/// Run `i` is seeded with `seed + i`; the configured `rng_seed` is ignored.
/// Returns the final opinions of every run, in run order.
pub fn simulate_ensemble_parallel(
    options: &SimulationOptions,
    n_runs: usize,
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    (0..n_runs)
        .into_par_iter()
        .map(|i| -> Result<Vec<f64>> {
            let mut run_options = options.clone();
            run_options.rng_seed = Some(seed.wrapping_add(i as u64));
            let mut simulation = Simulation::new(run_options, None, None)?;
            simulation.run(None)?;
            Ok(simulation.model().opinions())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn activity_driven_options(seed: Option<u64>) -> SimulationOptions {
        let seed_line = seed.map(|s| format!("rng_seed = {s}")).unwrap_or_default();
        let toml = format!(
            r#"
            [simulation]
            model = "ActivityDriven"
            {seed_line}

            [io]
            n_output_agents = 2
            n_output_network = 5

            [model]
            max_iterations = 5

            [ActivityDriven]
            m = 3
            K = 2.0

            [network]
            number_of_agents = 30
            connections_per_agent = 4
            "#
        );
        SimulationOptions::from_toml_str(&toml).unwrap()
    }

    #[test]
    fn test_setup_and_step() {
        let mut simulation = Simulation::new(activity_driven_options(Some(1)), None, None).unwrap();
        assert_eq!(simulation.state(), SimulationState::Ready);
        assert_eq!(simulation.seed(), 1);
        assert_eq!(simulation.network().n_agents(), 30);

        let stats = simulation.step();
        assert_eq!(stats.iteration, 1);
        assert_eq!(simulation.state(), SimulationState::Running);
        assert!(stats.opinion_variance > 0.0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut simulation =
                Simulation::new(activity_driven_options(Some(99)), None, None).unwrap();
            simulation.run(None).unwrap();
            (simulation.model().opinions(), simulation.network().sorted_edge_list())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_run_writes_snapshots() {
        let dir = TempDir::new().unwrap();
        let mut simulation = Simulation::new(activity_driven_options(Some(3)), None, None).unwrap();

        let history = simulation.run(Some(dir.path())).unwrap();

        assert_eq!(history.len(), 5);
        assert_eq!(simulation.state(), SimulationState::Finished);
        for name in [
            "opinions_0.txt",
            "opinions_2.txt",
            "opinions_4.txt",
            "network_0.txt",
            "network_5.txt",
            "opinions_finished.txt",
            "network_finished.txt",
        ] {
            assert!(dir.path().join(name).exists(), "missing {name}");
        }
        assert!(!dir.path().join("opinions_3.txt").exists());

        // Final snapshot reloads to the in-memory state
        let agents = io::agents_from_file(dir.path().join("opinions_finished.txt")).unwrap();
        assert_eq!(agents, simulation.model().agent_records());
    }

    #[test]
    fn test_agent_and_network_files_override() {
        let dir = TempDir::new().unwrap();
        let network_path = dir.path().join("network.txt");
        let agents_path = dir.path().join("agents.txt");

        let network = network::fully_connected(4, 1.0);
        io::network_to_file(&network, &network_path).unwrap();
        let agents = vec![
            crate::agent::Agent::new(0.1, 0.5, 1.0),
            crate::agent::Agent::new(0.2, 0.5, 1.0),
            crate::agent::Agent::new(0.3, 0.5, 1.0),
            crate::agent::Agent::new(0.4, 0.5, 1.0),
        ];
        io::agents_to_file(&agents, &agents_path).unwrap();

        let simulation = Simulation::new(
            activity_driven_options(Some(5)),
            Some(network_path.as_path()),
            Some(agents_path.as_path()),
        )
        .unwrap();
        assert_eq!(simulation.network().n_agents(), 4);
        assert_eq!(simulation.model().agent_records(), agents);

        // Agent count must match the network
        io::agents_to_file(&agents[..3], &agents_path).unwrap();
        let mismatch = Simulation::new(
            activity_driven_options(Some(5)),
            Some(network_path.as_path()),
            Some(agents_path.as_path()),
        );
        assert!(matches!(mismatch, Err(SimulationError::Configuration(_))));
    }

    #[test]
    fn test_degroot_converges() {
        let toml = r#"
            [simulation]
            model = "DeGroot"
            rng_seed = 4

            [model]
            max_iterations = 10000

            [DeGroot]
            convergence = 1e-6

            [network]
            number_of_agents = 20
            connections_per_agent = 5
        "#;
        let options = SimulationOptions::from_toml_str(toml).unwrap();
        let mut simulation = Simulation::new(options, None, None).unwrap();

        simulation.run(None).unwrap();

        let opinions = simulation.model().opinions();
        let spread = opinions.iter().cloned().fold(f64::MIN, f64::max)
            - opinions.iter().cloned().fold(f64::MAX, f64::min);
        assert!(spread < 1e-3, "spread {spread}");
    }

    #[test]
    fn test_random_network_allows_self_loops() {
        let toml = r#"
            [simulation]
            model = "DeGroot"
            rng_seed = 8

            [network]
            number_of_agents = 5
            connections_per_agent = 5
        "#;
        let options = SimulationOptions::from_toml_str(toml).unwrap();
        let simulation = Simulation::new(options, None, None).unwrap();

        let network = simulation.network();
        for idx in 0..5 {
            let mut neighbours = network.neighbours(idx).to_vec();
            neighbours.sort_unstable();
            assert_eq!(neighbours, vec![0, 1, 2, 3, 4]);
            let total: f64 = network.weights(idx).iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unseeded_run_records_seed() {
        let simulation = Simulation::new(activity_driven_options(None), None, None).unwrap();
        let replay = Simulation::new(
            activity_driven_options(Some(simulation.seed())),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            simulation.model().agent_records(),
            replay.model().agent_records()
        );
    }

    #[test]
    fn test_ensemble_parallel() {
        let options = activity_driven_options(None);
        let first = simulate_ensemble_parallel(&options, 4, 10).unwrap();
        let second = simulate_ensemble_parallel(&options, 4, 10).unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);

        // Run i matches a standalone run seeded with seed + i
        let mut single = Simulation::new(activity_driven_options(Some(12)), None, None).unwrap();
        single.run(None).unwrap();
        assert_eq!(single.model().opinions(), first[2]);
    }
}
