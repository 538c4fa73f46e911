use crate::error::{Error, Result};
use crate::fissioner::WATT_SPECTRUM;
use crate::physics::isotropic_direction;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Direction of flight given to source neutrons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngularDistribution {
    Isotropic,
    Monodirectional { reference_uvw: [f64; 3] },
}

impl Default for AngularDistribution {
    fn default() -> Self {
        AngularDistribution::Isotropic
    }
}

impl AngularDistribution {
    /// Monodirectional along (u, v, w), normalised.
    pub fn new_monodirectional(u: f64, v: f64, w: f64) -> Result<Self> {
        let mag = (u * u + v * v + w * w).sqrt();
        if !(mag > 0.0 && mag.is_finite()) {
            return Err(Error::InvalidSettings(format!(
                "source direction ({}, {}, {}) cannot be normalised",
                u, v, w
            )));
        }
        Ok(Self::Monodirectional {
            reference_uvw: [u / mag, v / mag, w / mag],
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        match self {
            AngularDistribution::Isotropic => isotropic_direction(rng),
            AngularDistribution::Monodirectional { reference_uvw } => *reference_uvw,
        }
    }
}

/// Energy given to source neutrons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyDistribution {
    /// Fixed energy (eV)
    Monoenergetic { energy: f64 },
    /// Watt fission spectrum
    Watt,
}

impl Default for EnergyDistribution {
    fn default() -> Self {
        EnergyDistribution::Watt
    }
}

impl EnergyDistribution {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            EnergyDistribution::Monoenergetic { energy } => *energy,
            EnergyDistribution::Watt => WATT_SPECTRUM.emit_neutron_ev(rng),
        }
    }
}
