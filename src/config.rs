//! Simulation settings loaded from TOML.
//!
//! The file layout mirrors the simulation structure:
//!
//! ```toml
//! [simulation]
//! model = "ActivityDriven"
//! rng_seed = 120
//!
//! [io]
//! n_output_agents = 1
//!
//! [model]
//! max_iterations = 20
//!
//! [ActivityDriven]
//! dt = 0.01
//! m = 10
//! K = 3.0
//!
//! [network]
//! number_of_agents = 1000
//! connections_per_agent = 10
//! ```
//!
//! Missing keys fall back to the `Default` impls below. Parsed options are
//! validated before they are handed to the simulation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SimulationError};
use crate::sampling::{BivariateGaussianCopula, PowerLaw, TruncatedLogNormal};

/// Which opinion model drives the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum ModelKind {
    DeGroot,
    ActivityDriven,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::DeGroot => write!(f, "DeGroot"),
            ModelKind::ActivityDriven => write!(f, "ActivityDriven"),
        }
    }
}

/// Parameters of the activity-driven model.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivityDrivenSettings {
    /// Iteration cap, taken from the `[model]` table.
    #[serde(skip)]
    pub max_iterations: Option<usize>,
    /// Integration timestep.
    pub dt: f64,
    /// Agents contacted per activation.
    pub m: usize,
    /// Minimum activity; activities lie in [eps, 1].
    pub eps: f64,
    /// Exponent of the activity power law.
    pub gamma: f64,
    /// Controversialness of the issue.
    pub alpha: f64,
    /// Exponent biasing contacts toward similar opinions (beta).
    pub homophily: f64,
    /// Probability that a contacted agent returns the contact.
    pub reciprocity: f64,
    /// Social interaction strength.
    #[serde(rename = "K")]
    pub k: f64,
    /// Replace activation draws by expected activities.
    pub mean_activities: bool,
    /// Replace sampled contacts by the expected, fully connected structure.
    pub mean_weights: bool,
    /// Stop once the largest opinion change drops below this.
    #[serde(rename = "convergence")]
    pub convergence_tol: f64,
    /// Draw reluctances instead of fixing them at 1.
    pub use_reluctances: bool,
    pub reluctance_mean: f64,
    pub reluctance_sigma: f64,
    pub reluctance_eps: f64,
    /// Correlation between activity and reluctance draws.
    pub covariance_factor: f64,
    /// The first `n_bots` agents are bots.
    pub n_bots: usize,
    pub bot_m: Vec<usize>,
    pub bot_activity: Vec<f64>,
    pub bot_opinion: Vec<f64>,
    pub bot_homophily: Vec<f64>,
}

impl Default for ActivityDrivenSettings {
    fn default() -> Self {
        Self {
            max_iterations: None,
            dt: 0.01,
            m: 10,
            eps: 0.01,
            gamma: 2.1,
            alpha: 3.0,
            homophily: 0.5,
            reciprocity: 0.5,
            k: 3.0,
            mean_activities: false,
            mean_weights: false,
            convergence_tol: 1e-12,
            use_reluctances: false,
            reluctance_mean: 1.0,
            reluctance_sigma: 0.25,
            reluctance_eps: 0.01,
            covariance_factor: 0.0,
            n_bots: 0,
            bot_m: Vec::new(),
            bot_activity: Vec::new(),
            bot_opinion: Vec::new(),
            bot_homophily: Vec::new(),
        }
    }
}

impl ActivityDrivenSettings {
    /// Whether any bots are configured.
    #[inline]
    pub fn bot_present(&self) -> bool {
        self.n_bots > 0
    }

    /// Check parameter ranges that do not depend on the network size.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(config_error(format!("dt must be positive, got {}", self.dt)));
        }
        if !(self.k >= 0.0 && self.k.is_finite()) {
            return Err(config_error(format!("K must be non-negative, got {}", self.k)));
        }
        if !(0.0..=1.0).contains(&self.reciprocity) {
            return Err(config_error(format!(
                "reciprocity must lie in [0, 1], got {}",
                self.reciprocity
            )));
        }
        if !self.alpha.is_finite() || !self.homophily.is_finite() {
            return Err(config_error("alpha and homophily must be finite".to_string()));
        }
        if !(self.convergence_tol >= 0.0) {
            return Err(config_error(format!(
                "convergence tolerance must be non-negative, got {}",
                self.convergence_tol
            )));
        }

        PowerLaw::new(self.eps, self.gamma)?;

        if self.use_reluctances {
            let reluctance = TruncatedLogNormal::new(
                self.reluctance_mean,
                self.reluctance_sigma,
                self.reluctance_eps,
            )?;
            BivariateGaussianCopula::new(
                self.covariance_factor,
                PowerLaw::new(self.eps, self.gamma)?,
                reluctance,
            )?;
        }

        if self.bot_present() {
            let arrays = [
                ("bot_m", self.bot_m.len()),
                ("bot_activity", self.bot_activity.len()),
                ("bot_opinion", self.bot_opinion.len()),
                ("bot_homophily", self.bot_homophily.len()),
            ];
            for (name, len) in arrays {
                if len < self.n_bots {
                    return Err(config_error(format!(
                        "{name} has {len} entries but n_bots = {}",
                        self.n_bots
                    )));
                }
            }
            if let Some(a) = self.bot_activity[..self.n_bots]
                .iter()
                .find(|a| !(0.0..=1.0).contains(*a))
            {
                return Err(config_error(format!("bot activity {a} outside [0, 1]")));
            }
        }

        Ok(())
    }

    /// Check parameters against the number of agents in the network.
    pub fn validate_for_agents(&self, n_agents: usize) -> Result<()> {
        self.validate()?;

        if self.m > n_agents {
            return Err(config_error(format!(
                "m = {} exceeds the number of agents {n_agents}",
                self.m
            )));
        }
        if self.n_bots > n_agents {
            return Err(config_error(format!(
                "n_bots = {} exceeds the number of agents {n_agents}",
                self.n_bots
            )));
        }
        if let Some(m) = self.bot_m[..self.n_bots].iter().find(|&&m| m > n_agents) {
            return Err(config_error(format!(
                "bot_m = {m} exceeds the number of agents {n_agents}"
            )));
        }
        Ok(())
    }
}

/// Parameters of the DeGroot averaging model.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeGrootSettings {
    #[serde(skip)]
    pub max_iterations: Option<usize>,
    #[serde(rename = "convergence")]
    pub convergence_tol: f64,
}

impl Default for DeGrootSettings {
    fn default() -> Self {
        Self {
            max_iterations: None,
            convergence_tol: 1e-6,
        }
    }
}

/// Settings of the selected model.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSettings {
    DeGroot(DeGrootSettings),
    ActivityDriven(ActivityDrivenSettings),
}

impl ModelSettings {
    /// Kind tag of these settings.
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSettings::DeGroot(_) => ModelKind::DeGroot,
            ModelSettings::ActivityDriven(_) => ModelKind::ActivityDriven,
        }
    }

    /// Iteration cap shared by both models.
    pub fn max_iterations(&self) -> Option<usize> {
        match self {
            ModelSettings::DeGroot(s) => s.max_iterations,
            ModelSettings::ActivityDriven(s) => s.max_iterations,
        }
    }
}

/// Initial network construction.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    #[serde(rename = "number_of_agents")]
    pub n_agents: usize,
    #[serde(rename = "connections_per_agent")]
    pub n_connections: usize,
    /// Read the network from this file instead of generating it.
    pub file: Option<PathBuf>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            n_agents: 200,
            n_connections: 10,
            file: None,
        }
    }
}

/// Output cadence.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// Write the network every n iterations.
    pub n_output_network: Option<usize>,
    /// Write the agents every n iterations.
    pub n_output_agents: Option<usize>,
    /// Log every iteration at info level.
    pub print_progress: bool,
}

/// Fully validated simulation options.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationOptions {
    pub rng_seed: Option<u64>,
    pub model_settings: ModelSettings,
    pub network_settings: NetworkSettings,
    pub output_settings: OutputSettings,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSimulationTable {
    model: ModelKind,
    rng_seed: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawModelTable {
    max_iterations: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptions {
    simulation: RawSimulationTable,
    #[serde(default)]
    io: OutputSettings,
    #[serde(default)]
    model: RawModelTable,
    #[serde(rename = "DeGroot")]
    degroot: Option<DeGrootSettings>,
    #[serde(rename = "ActivityDriven")]
    activity_driven: Option<ActivityDrivenSettings>,
    #[serde(default)]
    network: NetworkSettings,
}

impl SimulationOptions {
    /// Parse and validate options from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawOptions = toml::from_str(content)?;
        let max_iterations = raw.model.max_iterations;

        let model_settings = match raw.simulation.model {
            ModelKind::DeGroot => {
                let mut settings = raw.degroot.unwrap_or_default();
                settings.max_iterations = max_iterations;
                ModelSettings::DeGroot(settings)
            }
            ModelKind::ActivityDriven => {
                let mut settings = raw.activity_driven.unwrap_or_default();
                settings.max_iterations = max_iterations;
                ModelSettings::ActivityDriven(settings)
            }
        };

        let options = Self {
            rng_seed: raw.simulation.rng_seed,
            model_settings,
            network_settings: raw.network,
            output_settings: raw.io,
        };
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Selected model.
    pub fn model_kind(&self) -> ModelKind {
        self.model_settings.kind()
    }

    /// Check option consistency.
    pub fn validate(&self) -> Result<()> {
        if let ModelSettings::ActivityDriven(settings) = &self.model_settings {
            settings.validate()?;
        }

        if let ModelSettings::DeGroot(settings) = &self.model_settings {
            if !(settings.convergence_tol >= 0.0) {
                return Err(config_error(format!(
                    "convergence tolerance must be non-negative, got {}",
                    settings.convergence_tol
                )));
            }
        }

        if self.network_settings.file.is_none() && self.network_settings.n_agents == 0 {
            return Err(config_error("number_of_agents must be positive".to_string()));
        }

        if self.output_settings.n_output_agents == Some(0)
            || self.output_settings.n_output_network == Some(0)
        {
            return Err(config_error("output cadence must be positive".to_string()));
        }

        Ok(())
    }
}

fn config_error(message: String) -> SimulationError {
    SimulationError::Configuration(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_driven_from_toml() {
        let toml = r#"
            [simulation]
            model = "ActivityDriven"
            rng_seed = 120

            [io]
            n_output_agents = 1

            [model]
            max_iterations = 20

            [ActivityDriven]
            dt = 0.02
            m = 5
            K = 2.0
            homophily = 0.0
            reciprocity = 1.0

            [network]
            number_of_agents = 50
            connections_per_agent = 4
        "#;

        let options = SimulationOptions::from_toml_str(toml).unwrap();
        assert_eq!(options.rng_seed, Some(120));
        assert_eq!(options.model_kind(), ModelKind::ActivityDriven);
        assert_eq!(options.network_settings.n_agents, 50);
        assert_eq!(options.output_settings.n_output_agents, Some(1));

        let ModelSettings::ActivityDriven(settings) = options.model_settings else {
            panic!("expected activity driven settings");
        };
        assert_eq!(settings.max_iterations, Some(20));
        assert_eq!(settings.dt, 0.02);
        assert_eq!(settings.m, 5);
        assert_eq!(settings.k, 2.0);
        // Untouched keys keep their defaults
        assert_eq!(settings.gamma, 2.1);
        assert_eq!(settings.alpha, 3.0);
    }

    #[test]
    fn test_degroot_defaults() {
        let toml = r#"
            [simulation]
            model = "DeGroot"
        "#;

        let options = SimulationOptions::from_toml_str(toml).unwrap();
        assert_eq!(options.model_kind(), ModelKind::DeGroot);
        assert_eq!(options.rng_seed, None);
        assert_eq!(options.network_settings, NetworkSettings::default());
        assert_eq!(options.model_settings.max_iterations(), None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let toml = r#"
            [simulation]
            model = "ActivityDriven"

            [ActivityDriven]
            not_a_parameter = 1.0
        "#;

        assert!(matches!(
            SimulationOptions::from_toml_str(toml),
            Err(SimulationError::Toml(_))
        ));
    }

    #[test]
    fn test_bot_arrays_too_short() {
        let toml = r#"
            [simulation]
            model = "ActivityDriven"

            [ActivityDriven]
            n_bots = 2
            bot_m = [1, 1]
            bot_activity = [0.5, 0.5]
            bot_opinion = [0.5]
            bot_homophily = [0.0, 0.0]
        "#;

        assert!(matches!(
            SimulationOptions::from_toml_str(toml),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn test_parameter_validation() {
        let degenerate_gamma = ActivityDrivenSettings {
            gamma: 1.0,
            ..Default::default()
        };
        assert!(degenerate_gamma.validate().is_err());

        let negative_k = ActivityDrivenSettings {
            k: -1.0,
            ..Default::default()
        };
        assert!(negative_k.validate().is_err());

        let bad_reluctance = ActivityDrivenSettings {
            use_reluctances: true,
            reluctance_mean: 0.0,
            ..Default::default()
        };
        assert!(bad_reluctance.validate().is_err());

        let too_many_contacts = ActivityDrivenSettings {
            m: 11,
            ..Default::default()
        };
        assert!(too_many_contacts.validate().is_ok());
        assert!(too_many_contacts.validate_for_agents(10).is_err());
    }
}
