// Message delay models

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use crate::le_interface::SimTime;

/// Largest mean sampled in a single Knuth pass. exp(-mean) underflows long
/// before f64 runs out of range, so bigger means are split into chunks and
/// the (additive) Poisson samples summed.
const POISSON_CHUNK: f64 = 500.0;

/// Delivery timing of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Synchrony {
    /// Every message arrives exactly one tick after it was sent
    #[default]
    Synchronous,
    /// Arrival is one tick plus a delay drawn from the run's delay model
    Asynchronous,
}

impl Synchrony {
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Synchrony::Synchronous)
    }
}

/// Source of extra (non-negative) transit ticks for asynchronous runs
pub trait DelayModel {
    fn sample(&mut self, rng: &mut StdRng) -> SimTime;
}

/// Poisson-distributed delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poisson {
    mean: f64,
}

impl Poisson {
    /// Negative or non-finite means collapse to zero
    pub fn new(mean: f64) -> Self {
        let mean = if mean.is_finite() && mean > 0.0 { mean } else { 0.0 };
        Self { mean }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    fn sample_knuth(mean: f64, rng: &mut StdRng) -> SimTime {
        let limit = (-mean).exp();
        let mut k = 0;
        let mut p: f64 = rng.gen();
        while p > limit {
            k += 1;
            p *= rng.gen::<f64>();
        }
        k
    }
}

impl DelayModel for Poisson {
    fn sample(&mut self, rng: &mut StdRng) -> SimTime {
        let mut remaining = self.mean;
        let mut total = 0;
        while remaining > 0.0 {
            let chunk = remaining.min(POISSON_CHUNK);
            total += Self::sample_knuth(chunk, rng);
            remaining -= chunk;
        }
        total
    }
}

/// Uniform delay over `min..=max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uniform {
    min: SimTime,
    max: SimTime,
}

impl Uniform {
    /// Bounds given in either order
    pub fn new(a: SimTime, b: SimTime) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

impl DelayModel for Uniform {
    fn sample(&mut self, rng: &mut StdRng) -> SimTime {
        rng.gen_range(self.min..=self.max)
    }
}

/// Same extra delay for every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant(pub SimTime);

impl DelayModel for Constant {
    fn sample(&mut self, _rng: &mut StdRng) -> SimTime {
        self.0
    }
}

/// Configurable delay distribution
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum DelayConfig {
    Poisson { mean: f64 },
    Uniform { min: SimTime, max: SimTime },
    Constant { ticks: SimTime },
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayConfig::Poisson { mean: 5.0 }
    }
}

impl DelayModel for DelayConfig {
    fn sample(&mut self, rng: &mut StdRng) -> SimTime {
        match *self {
            DelayConfig::Poisson { mean } => Poisson::new(mean).sample(rng),
            DelayConfig::Uniform { min, max } => Uniform::new(min, max).sample(rng),
            DelayConfig::Constant { ticks } => ticks,
        }
    }
}

impl<D: DelayModel + ?Sized> DelayModel for Box<D> {
    fn sample(&mut self, rng: &mut StdRng) -> SimTime {
        (**self).sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn average<D: DelayModel>(model: &mut D, samples: usize) -> f64 {
        let mut rng = StdRng::seed_from_u64(11);
        let total: SimTime = (0..samples).map(|_| model.sample(&mut rng)).sum();
        total as f64 / samples as f64
    }

    #[test]
    fn test_poisson_mean() {
        let avg = average(&mut Poisson::new(5.0), 20_000);
        assert!((avg - 5.0).abs() < 0.2, "average {} too far from 5", avg);
    }

    #[test]
    fn test_poisson_large_mean_does_not_underflow() {
        let avg = average(&mut Poisson::new(1200.0), 500);
        assert!((avg - 1200.0).abs() < 20.0, "average {} too far from 1200", avg);
    }

    #[test]
    fn test_poisson_zero_mean() {
        assert_eq!(average(&mut Poisson::new(0.0), 100), 0.0);
        assert_eq!(Poisson::new(-3.0).mean(), 0.0);
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = Uniform::new(4, 2);
        for _ in 0..1000 {
            let sample = model.sample(&mut rng);
            assert!((2..=4).contains(&sample));
        }
    }

    #[test]
    fn test_config_dispatch() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(DelayConfig::Constant { ticks: 7 }.sample(&mut rng), 7);
        assert_eq!(Constant(2).sample(&mut rng), 2);
    }

    #[test]
    fn test_config_from_yaml() {
        let config: DelayConfig = serde_yaml::from_str("distribution: uniform\nmin: 1\nmax: 3\n").unwrap();
        assert_eq!(config, DelayConfig::Uniform { min: 1, max: 3 });

        let synchrony: Synchrony = serde_yaml::from_str("asynchronous").unwrap();
        assert!(!synchrony.is_synchronous());
    }
}
