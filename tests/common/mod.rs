#![allow(dead_code)]

use pinspec::{DensityUnit, Isotope, Material};
use std::sync::Arc;

pub const GRID: [f64; 2] = [1e-5, 2e7];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Isotope with energy-independent cross sections.
pub fn flat_isotope(name: &str, a: f64, elastic: f64, capture: f64, fission: f64) -> Arc<Isotope> {
    let mut iso = Isotope::new(name, a).unwrap();
    if elastic > 0.0 {
        iso.set_elastic_xs(&GRID, &[elastic, elastic]).unwrap();
    }
    if capture > 0.0 {
        iso.set_capture_xs(&GRID, &[capture, capture]).unwrap();
    }
    if fission > 0.0 {
        iso.set_fission_xs(&GRID, &[fission, fission]).unwrap();
    }
    Arc::new(iso)
}

/// Single-isotope material at `density` atoms per barn-cm.
pub fn material(name: &str, isotope: Arc<Isotope>, density: f64) -> Arc<Material> {
    let mut m = Material::new(name);
    m.set_density(density, DensityUnit::AtomPerBarnCm).unwrap();
    m.add_isotope(isotope, 1.0).unwrap();
    Arc::new(m)
}

/// Hydrogen-like moderator: pure scatterer with a weak 1/v capture.
pub fn hydrogen() -> Arc<Isotope> {
    let energies = [1e-5, 1e-2, 1.0, 1e2, 1e4, 1e6, 2e7];
    let elastic = [20.0, 20.0, 20.0, 20.0, 19.5, 4.0, 0.5];
    let capture: Vec<f64> = energies.iter().map(|e| 0.332 * (0.0253f64 / e).sqrt()).collect();
    let mut h = Isotope::new("H1", 1.0).unwrap();
    h.set_elastic_xs(&energies, &elastic).unwrap();
    h.set_capture_xs(&energies, &capture).unwrap();
    Arc::new(h)
}

/// Heavy absorber with a single capture resonance near 6.67 eV.
pub fn resonant_absorber() -> Arc<Isotope> {
    let energies = [1e-5, 1.0, 6.0, 6.5, 6.67, 6.8, 7.5, 100.0, 2e7];
    let capture = [3.0, 2.7, 30.0, 2000.0, 7000.0, 2000.0, 20.0, 0.3, 0.1];
    let mut u = Isotope::new("U238", 238.0).unwrap();
    u.set_elastic_xs(&GRID, &[9.0, 9.0]).unwrap();
    u.set_capture_xs(&energies, &capture).unwrap();
    Arc::new(u)
}
