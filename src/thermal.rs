//! Free-gas thermal scattering kernel.
//!
//! Outgoing-energy distributions are tabulated at a set of logarithmically
//! spaced incident energies (in units of kT). Each distribution is integrated
//! into a CDF over the ratio E'/E; sampling inverts the CDFs at the two incident
//! energies bracketing the neutron and interpolates between them.

use crate::utilities::{cumulative_trapezoid, erf, find_upper_index, logspace};
use rand::Rng;

/// Boltzmann constant (eV / K)
pub const BOLTZMANN: f64 = 8.617332e-5;

const DEFAULT_START_ENERGY: f64 = 1e-6;
const DEFAULT_END_ENERGY: f64 = 15.0;
const DEFAULT_NUM_BINS: usize = 1000;
const DEFAULT_NUM_DISTRIBUTIONS: usize = 15;
/// Upscatter tail kept above the coldest tabulated incident energy (units of kT)
const UPSCATTER_TAIL_KT: f64 = 12.0;

#[derive(Debug, Clone)]
pub struct ThermalScattering {
    kt: f64,
    alpha: f64,
    eta: f64,
    rho: f64,
    e_to_kt: Vec<f64>,
    eprime_to_e: Vec<f64>,
    cdfs: Vec<Vec<f64>>,
}

impl ThermalScattering {
    /// Kernel for atomic mass `a` at `temperature` (K) with the default tables.
    pub fn new(a: f64, temperature: f64) -> Self {
        Self::with_tables(
            a,
            temperature,
            DEFAULT_START_ENERGY,
            DEFAULT_END_ENERGY,
            DEFAULT_NUM_BINS,
            DEFAULT_NUM_DISTRIBUTIONS,
        )
    }

    /// `start_energy` and `end_energy` are in eV.
    pub fn with_tables(
        a: f64,
        temperature: f64,
        start_energy: f64,
        end_energy: f64,
        num_bins: usize,
        num_distributions: usize,
    ) -> Self {
        let kt = BOLTZMANN * temperature;
        let sqrt_a = a.sqrt();
        let mut kernel = ThermalScattering {
            kt,
            alpha: crate::physics::alpha(a),
            eta: (a + 1.0) / (2.0 * sqrt_a),
            rho: (a - 1.0) / (2.0 * sqrt_a),
            e_to_kt: logspace(start_energy / kt, end_energy / kt, num_distributions),
            eprime_to_e: Vec::new(),
            cdfs: Vec::with_capacity(num_distributions),
        };

        let coldest = kernel.e_to_kt.first().copied().unwrap_or(1.0);
        let max_ratio = (coldest + UPSCATTER_TAIL_KT) / coldest;
        kernel.eprime_to_e = logspace(1e-5, max_ratio, num_bins);

        for i in 0..num_distributions {
            let pdf: Vec<f64> = kernel
                .eprime_to_e
                .iter()
                .map(|&ratio| kernel.probability(ratio, i))
                .collect();
            let mut cdf = cumulative_trapezoid(&kernel.eprime_to_e, &pdf);
            let norm = cdf.last().copied().unwrap_or(0.0);
            if norm > 0.0 {
                cdf.iter_mut().for_each(|c| *c /= norm);
            }
            kernel.cdfs.push(cdf);
        }
        log::debug!(
            "built {} thermal scattering CDFs over E'/E in [1e-5, {:.3e}]",
            num_distributions,
            max_ratio
        );
        kernel
    }

    /// Free-gas transfer density for the ratio E'/E at tabulated incident energy `dist`.
    fn probability(&self, eprime_to_e: f64, dist: usize) -> f64 {
        let e = self.e_to_kt[dist];
        let eprime = e * eprime_to_e;
        let a = e.sqrt();
        let b = eprime.sqrt();
        let c = erf(self.eta * b - self.rho * a);
        let d = erf(self.eta * b + self.rho * a);
        let f = erf(self.eta * a - self.rho * b);
        let g = erf(self.eta * a + self.rho * b);
        let h = (e - eprime).exp();
        let (direct, tail) = if eprime > e { (c - d, f + g) } else { (c + d, f - g) };
        // exp(E - E') overflows for cold outgoing energies at high E/kT
        let weighted = if tail == 0.0 { 0.0 } else { h * tail };
        let prob = (direct + weighted) * self.eta * self.eta / 2.0 * (1.0 - self.alpha);
        if prob.is_finite() && prob > 0.0 {
            prob
        } else {
            0.0
        }
    }

    pub fn num_distributions(&self) -> usize {
        self.cdfs.len()
    }

    pub fn incident_energies_kt(&self) -> &[f64] {
        &self.e_to_kt
    }

    pub fn cdf(&self, dist: usize) -> Option<&[f64]> {
        self.cdfs.get(dist).map(|c| c.as_slice())
    }

    /// Sample an outgoing energy (eV) for incident `energy` (eV).
    pub fn sample(&self, energy: f64, rng: &mut (impl Rng + ?Sized)) -> f64 {
        let e = energy / self.kt;
        let xi: f64 = rng.gen();
        let invert = |dist: usize| -> f64 {
            let idx = find_upper_index(&self.cdfs[dist], xi);
            self.eprime_to_e[idx] * e
        };

        let last = self.e_to_kt.len() - 1;
        let eprime = if e <= self.e_to_kt[0] {
            invert(0)
        } else if e >= self.e_to_kt[last] {
            invert(last)
        } else {
            let upper = find_upper_index(&self.e_to_kt, e);
            let lower = upper - 1;
            let ep_lower = invert(lower);
            let ep_upper = invert(upper);
            let slope = (ep_upper - ep_lower) / (self.e_to_kt[upper] - self.e_to_kt[lower]);
            ep_lower + slope * (e - self.e_to_kt[lower])
        };
        eprime * self.kt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cdfs_are_normalised_and_monotone() {
        let kernel = ThermalScattering::with_tables(1.0, 300.0, 1e-3, 4.0, 200, 5);
        assert_eq!(kernel.num_distributions(), 5);
        for i in 0..5 {
            let cdf = kernel.cdf(i).unwrap();
            assert_eq!(cdf[0], 0.0);
            assert!((cdf[cdf.len() - 1] - 1.0).abs() < 1e-12);
            assert!(cdf.windows(2).all(|w| w[1] >= w[0] - 1e-12));
        }
    }

    #[test]
    fn test_cold_neutrons_gain_energy() {
        // a 1 meV neutron in 300 K hydrogen gas is upscattered on average
        let kernel = ThermalScattering::with_tables(1.0, 300.0, 1e-4, 4.0, 400, 8);
        let mut rng = StdRng::seed_from_u64(17);
        let n = 5000;
        let mean: f64 = (0..n).map(|_| kernel.sample(1e-3, &mut rng)).sum::<f64>() / n as f64;
        assert!(mean > 1e-3, "mean outgoing energy {}", mean);
    }

    #[test]
    fn test_samples_are_positive_and_finite() {
        let kernel = ThermalScattering::new(16.0, 600.0);
        let mut rng = StdRng::seed_from_u64(2);
        for energy in [1e-5, 0.025, 0.5, 3.9, 20.0] {
            for _ in 0..200 {
                let e = kernel.sample(energy, &mut rng);
                assert!(e.is_finite() && e >= 0.0);
            }
        }
    }
}
