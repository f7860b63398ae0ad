//! Distributions for drawing initial agent activities and reluctances.
//!
//! - **Activity**: truncated power law on [eps, 1], density ∝ a^(-gamma)
//! - **Reluctance**: log-normal truncated from below at `eps`
//! - **Joint draw**: Gaussian copula coupling the two with a correlation

use rand::Rng;
use rand_distr::{Distribution, LogNormal, StandardNormal};

use crate::error::{Result, SimulationError};

/// Truncated power law on [eps, 1] sampled by inverse CDF.
#[derive(Clone, Copy, Debug)]
pub struct PowerLaw {
    eps: f64,
    gamma: f64,
}

impl PowerLaw {
    /// Create a power law with lower cutoff `eps` and exponent `gamma`.
    ///
    /// `gamma == 1` has a logarithmic CDF and is rejected.
    pub fn new(eps: f64, gamma: f64) -> Result<Self> {
        if !(eps > 0.0 && eps <= 1.0) {
            return Err(SimulationError::Configuration(format!(
                "power law cutoff eps must lie in (0, 1], got {eps}"
            )));
        }
        if !gamma.is_finite() || (gamma - 1.0).abs() < f64::EPSILON {
            return Err(SimulationError::Configuration(format!(
                "power law exponent gamma must be finite and != 1, got {gamma}"
            )));
        }
        Ok(Self { eps, gamma })
    }

    /// Map a uniform quantile `u` in [0, 1] to an activity.
    ///
    /// a = (eps^(1-γ) + u·(1 - eps^(1-γ)))^(1/(1-γ))
    pub fn inverse_cdf(&self, u: f64) -> f64 {
        let one_minus_gamma = 1.0 - self.gamma;
        let eps_pow = self.eps.powf(one_minus_gamma);
        let a = (eps_pow + u * (1.0 - eps_pow)).powf(1.0 / one_minus_gamma);
        a.clamp(self.eps, 1.0)
    }
}

impl Distribution<f64> for PowerLaw {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.inverse_cdf(rng.gen::<f64>())
    }
}

/// Log-normal parameterised by its own mean and standard deviation,
/// rejecting draws below `eps`.
#[derive(Clone, Debug)]
pub struct TruncatedLogNormal {
    mu: f64,
    sigma: f64,
    eps: f64,
    dist: LogNormal<f64>,
}

impl TruncatedLogNormal {
    /// Create the distribution.
    ///
    /// # Arguments
    /// * `mean` - Mean of the (untruncated) log-normal, > 0
    /// * `stddev` - Standard deviation of the (untruncated) log-normal, >= 0
    /// * `eps` - Lower truncation point, 0 < eps < mean
    pub fn new(mean: f64, stddev: f64, eps: f64) -> Result<Self> {
        if !(mean > 0.0 && mean.is_finite()) {
            return Err(SimulationError::Configuration(format!(
                "reluctance mean must be positive, got {mean}"
            )));
        }
        if !(stddev >= 0.0 && stddev.is_finite()) {
            return Err(SimulationError::Configuration(format!(
                "reluctance sigma must be non-negative, got {stddev}"
            )));
        }
        if !(eps > 0.0 && eps < mean) {
            return Err(SimulationError::Configuration(format!(
                "reluctance eps must lie in (0, {mean}), got {eps}"
            )));
        }

        // mean = exp(μ + σ²/2), var = (exp(σ²) - 1)·exp(2μ + σ²)
        let sigma_sq = (1.0 + (stddev * stddev) / (mean * mean)).ln();
        let sigma = sigma_sq.sqrt();
        let mu = mean.ln() - sigma_sq / 2.0;

        let dist = LogNormal::new(mu, sigma)
            .map_err(|e| SimulationError::Configuration(format!("invalid log-normal: {e}")))?;

        Ok(Self {
            mu,
            sigma,
            eps,
            dist,
        })
    }

    /// Value of the untruncated log-normal at standard-normal quantile `z`.
    #[inline]
    fn from_standard_normal(&self, z: f64) -> f64 {
        (self.mu + self.sigma * z).exp()
    }
}

impl Distribution<f64> for TruncatedLogNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        loop {
            let x = self.dist.sample(rng);
            if x >= self.eps {
                return x;
            }
        }
    }
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Standard normal CDF.
pub fn standard_normal_cdf(z: f64) -> f64 {
    (0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))).clamp(0.0, 1.0)
}

/// Gaussian copula producing correlated `(activity, reluctance)` pairs.
///
/// Two standard normals with correlation `covariance_factor` are pushed
/// through the power-law inverse CDF and the log-normal quantile map.
#[derive(Clone, Debug)]
pub struct BivariateGaussianCopula {
    correlation: f64,
    activity: PowerLaw,
    reluctance: TruncatedLogNormal,
}

impl BivariateGaussianCopula {
    /// Create the copula; `covariance_factor` must lie in [-1, 1].
    pub fn new(
        covariance_factor: f64,
        activity: PowerLaw,
        reluctance: TruncatedLogNormal,
    ) -> Result<Self> {
        if !(-1.0..=1.0).contains(&covariance_factor) {
            return Err(SimulationError::Configuration(format!(
                "covariance_factor must lie in [-1, 1], got {covariance_factor}"
            )));
        }
        Ok(Self {
            correlation: covariance_factor,
            activity,
            reluctance,
        })
    }
}

impl Distribution<(f64, f64)> for BivariateGaussianCopula {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let rho = self.correlation;
        let rho_complement = (1.0 - rho * rho).max(0.0).sqrt();

        // Rejecting the whole pair keeps the joint law conditioned on the truncation
        loop {
            let z1: f64 = StandardNormal.sample(rng);
            let z2: f64 = StandardNormal.sample(rng);
            let z_reluctance = rho * z1 + rho_complement * z2;

            let reluctance = self.reluctance.from_standard_normal(z_reluctance);
            if reluctance < self.reluctance.eps {
                continue;
            }

            let activity = self.activity.inverse_cdf(standard_normal_cdf(z1));
            return (activity, reluctance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_power_law_bounds() {
        let dist = PowerLaw::new(0.01, 2.1).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..10_000 {
            let a = dist.sample(&mut rng);
            assert!((0.01..=1.0).contains(&a), "activity {a} out of bounds");
        }
    }

    #[test]
    fn test_power_law_inverse_cdf_endpoints() {
        let dist = PowerLaw::new(0.05, 2.5).unwrap();
        assert!((dist.inverse_cdf(0.0) - 0.05).abs() < 1e-12);
        assert!((dist.inverse_cdf(1.0) - 1.0).abs() < 1e-12);
        assert!(dist.inverse_cdf(0.3) < dist.inverse_cdf(0.6));
    }

    #[test]
    fn test_power_law_skews_small() {
        let dist = PowerLaw::new(0.01, 2.1).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let small = (0..5_000)
            .filter(|_| dist.sample(&mut rng) < 0.1)
            .count();
        // Most mass sits near the cutoff
        assert!(small > 4_000, "only {small} draws below 0.1");
    }

    #[test]
    fn test_power_law_rejects_degenerate_gamma() {
        assert!(PowerLaw::new(0.01, 1.0).is_err());
        assert!(PowerLaw::new(0.0, 2.1).is_err());
        assert!(PowerLaw::new(1.5, 2.1).is_err());
    }

    #[test]
    fn test_truncated_log_normal() {
        let dist = TruncatedLogNormal::new(1.0, 0.25, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<f64> = (0..5_000).map(|_| dist.sample(&mut rng)).collect();

        assert!(draws.iter().all(|&x| x >= 0.5));
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 1.0).abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_truncated_log_normal_validation() {
        assert!(TruncatedLogNormal::new(0.0, 0.25, 0.01).is_err());
        assert!(TruncatedLogNormal::new(1.0, -0.1, 0.01).is_err());
        assert!(TruncatedLogNormal::new(1.0, 0.25, 2.0).is_err());
    }

    #[test]
    fn test_standard_normal_cdf() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((standard_normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!(standard_normal_cdf(-8.0) < 1e-6);
    }

    #[test]
    fn test_copula_correlation_sign() {
        let activity = PowerLaw::new(0.01, 2.1).unwrap();
        let reluctance = TruncatedLogNormal::new(1.0, 0.5, 0.01).unwrap();
        let copula = BivariateGaussianCopula::new(0.9, activity, reluctance).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let pairs: Vec<(f64, f64)> = (0..5_000).map(|_| copula.sample(&mut rng)).collect();
        assert!(pairs.iter().all(|&(a, m)| (0.01..=1.0).contains(&a) && m >= 0.01));

        // Rank agreement: high activity should come with high reluctance
        let median_a = {
            let mut a: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            a.sort_by(f64::total_cmp);
            a[a.len() / 2]
        };
        let mean_m_high = mean_of(pairs.iter().filter(|p| p.0 > median_a).map(|p| p.1));
        let mean_m_low = mean_of(pairs.iter().filter(|p| p.0 <= median_a).map(|p| p.1));
        assert!(mean_m_high > mean_m_low);
    }

    fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
        let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        sum / count as f64
    }

    #[test]
    fn test_copula_rejects_bad_correlation() {
        let activity = PowerLaw::new(0.01, 2.1).unwrap();
        let reluctance = TruncatedLogNormal::new(1.0, 0.25, 0.01).unwrap();
        assert!(BivariateGaussianCopula::new(1.5, activity, reluctance).is_err());
    }
}
