use crate::neutron::Neutron;
use crate::stats::{AngularDistribution, EnergyDistribution};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Point source with independent angle and energy distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndependentSource {
    pub space: [f64; 3],
    pub angle: AngularDistribution,
    pub energy: EnergyDistribution,
}

impl Default for IndependentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IndependentSource {
    /// Watt fission neutrons emitted isotropically from the origin.
    pub fn new() -> Self {
        Self {
            space: [0.0, 0.0, 0.0],
            angle: AngularDistribution::Isotropic,
            energy: EnergyDistribution::Watt,
        }
    }

    pub fn monoenergetic(energy: f64) -> Self {
        Self {
            energy: EnergyDistribution::Monoenergetic { energy },
            ..Self::new()
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Neutron {
        let direction = self.angle.sample(rng);
        let energy = self.energy.sample(rng);
        Neutron::new(self.space, direction, energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_source_construction() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = IndependentSource::monoenergetic(2e6);
        s.space = [1.0, 2.0, 3.0];
        s.angle = AngularDistribution::new_monodirectional(0.0, 0.0, 1.0).unwrap();

        let n = s.sample(&mut rng);
        assert_eq!(n.position, [1.0, 2.0, 3.0]);
        assert_eq!(n.direction, [0.0, 0.0, 1.0]);
        assert_eq!(n.energy, 2e6);
        assert_eq!(n.old_energy, 2e6);
        assert!(n.alive);
    }

    #[test]
    fn test_default_source_is_watt() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = IndependentSource::default();
        let energies: Vec<f64> = (0..200).map(|_| s.sample(&mut rng).energy).collect();
        assert!(energies.iter().all(|&e| e > 0.0 && e <= 2e7));
        assert!(energies.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_source_from_partial_json() {
        let s: IndependentSource =
            serde_json::from_str(r#"{"energy": {"monoenergetic": {"energy": 1e6}}}"#).unwrap();
        assert_eq!(s.space, [0.0; 3]);
        assert_eq!(s.angle, AngularDistribution::Isotropic);
        assert_eq!(s.energy, EnergyDistribution::Monoenergetic { energy: 1e6 });
    }
}
