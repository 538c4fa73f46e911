//! Watt fission spectrum sampling.

use crate::utilities::{cumulative_trapezoid, linspace, lower_index};
use once_cell::sync::Lazy;
use rand::Rng;

/// Upper end of the tabulated fission spectrum (MeV)
pub const DEFAULT_MAX_ENERGY_MEV: f64 = 20.0;
pub const DEFAULT_NUM_BINS: usize = 100_000;

const EV_PER_MEV: f64 = 1e6;

/// Default spectrum shared by every source that does not build its own tables.
pub static WATT_SPECTRUM: Lazy<Fissioner> = Lazy::new(Fissioner::new);

/// Watt spectrum chi(E) = 0.453 exp(-1.036 E) sinh(sqrt(2.29 E)), E in MeV.
#[inline]
pub fn watt_chi(energy_mev: f64) -> f64 {
    0.453 * (-1.036 * energy_mev).exp() * (2.29 * energy_mev).sqrt().sinh()
}

#[derive(Debug, Clone)]
pub struct Fissioner {
    energies: Vec<f64>,
    cdf: Vec<f64>,
}

impl Default for Fissioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Fissioner {
    pub fn new() -> Self {
        Self::with_grid(DEFAULT_MAX_ENERGY_MEV, DEFAULT_NUM_BINS)
    }

    /// Tabulate the spectrum on `num_bins` equally spaced points from 0 to `max_energy_mev`.
    pub fn with_grid(max_energy_mev: f64, num_bins: usize) -> Self {
        let energies = linspace(0.0, max_energy_mev, num_bins.max(2));
        let chi: Vec<f64> = energies.iter().map(|&e| watt_chi(e)).collect();
        let mut cdf = cumulative_trapezoid(&energies, &chi);
        let norm = cdf.last().copied().unwrap_or(1.0);
        if norm > 0.0 {
            cdf.iter_mut().for_each(|c| *c /= norm);
        }
        log::debug!(
            "built fission spectrum CDF on {} points up to {} MeV",
            energies.len(),
            max_energy_mev
        );
        Fissioner { energies, cdf }
    }

    pub fn energies_mev(&self) -> &[f64] {
        &self.energies
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    /// Invert the CDF at `xi` in [0, 1), returning MeV.
    fn invert(&self, xi: f64) -> f64 {
        let i = lower_index(&self.cdf, xi);
        let (c1, c2) = (self.cdf[i], self.cdf[i + 1]);
        let (e1, e2) = (self.energies[i], self.energies[i + 1]);
        if c2 <= c1 {
            return e1;
        }
        e1 + (xi - c1) * (e2 - e1) / (c2 - c1)
    }

    pub fn emit_neutron_mev<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.invert(rng.gen::<f64>())
    }

    /// Sample a fission neutron energy in eV. Never returns zero.
    pub fn emit_neutron_ev<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        (self.emit_neutron_mev(rng) * EV_PER_MEV).max(f64::MIN_POSITIVE)
    }
}
