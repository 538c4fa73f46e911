use crate::error::{Error, Result};
use crate::isotope::{CrossSections, Isotope, XsChannel};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Avogadro's number scaled so that g/cc densities give atoms per barn-cm.
pub const AVOGADRO_BARN_CM: f64 = 0.6023;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DensityUnit {
    #[serde(rename = "g/cc")]
    GramPerCc,
    #[serde(rename = "at/cc")]
    AtomPerCc,
    #[serde(rename = "at/barn-cm")]
    AtomPerBarnCm,
}

impl DensityUnit {
    pub fn from_str_option(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(' ', "").as_str() {
            "g/cc" | "g/cm3" => Some(DensityUnit::GramPerCc),
            "at/cc" | "atom/cc" | "at/cm3" => Some(DensityUnit::AtomPerCc),
            "at/barn-cm" | "at/barncm" | "atom/b-cm" => Some(DensityUnit::AtomPerBarnCm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Constituent {
    isotope: Arc<Isotope>,
    atomic_ratio: f64,
    /// atoms / barn-cm
    number_density: f64,
}

/// A mixture of isotopes at a given density.
///
/// Isotopes are added with an atomic ratio (for UO2, one part U235 to two parts
/// O16). Each isotope's number density follows from the ratios and the material
/// density, whatever unit the density was given in:
///
/// * g/cc: `N = rho * N_A * ratio / sum(ratio_i * A_i)`
/// * at/cc and at/barn-cm: `N = ratio / sum(ratio_i) * N_total`
///
/// Number densities are kept in atoms per barn-cm so that macroscopic cross
/// sections come out in 1/cm directly from microscopic barns. Materials are
/// immutable once wrapped in an `Arc` and shared between regions.
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    density: f64,
    density_unit: DensityUnit,
    constituents: Vec<Constituent>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Material {
            name: name.into(),
            density: 0.0,
            density_unit: DensityUnit::GramPerCc,
            constituents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_density(&mut self, density: f64, unit: DensityUnit) -> Result<()> {
        if !(density > 0.0) || !density.is_finite() {
            return Err(Error::material(
                &self.name,
                format!("density must be positive and finite, got {}", density),
            ));
        }
        self.density = density;
        self.density_unit = unit;
        self.update_number_densities();
        Ok(())
    }

    /// Add `isotope` with the given atomic ratio, replacing any isotope of the same name.
    pub fn add_isotope(&mut self, isotope: Arc<Isotope>, atomic_ratio: f64) -> Result<()> {
        if !(atomic_ratio > 0.0) || !atomic_ratio.is_finite() {
            return Err(Error::material(
                &self.name,
                format!(
                    "atomic ratio for isotope {} must be positive, got {}",
                    isotope.name, atomic_ratio
                ),
            ));
        }
        self.constituents.retain(|c| c.isotope.name != isotope.name);
        self.constituents.push(Constituent {
            isotope,
            atomic_ratio,
            number_density: 0.0,
        });
        self.update_number_densities();
        Ok(())
    }

    fn total_atomic_ratio(&self) -> f64 {
        self.constituents.iter().map(|c| c.atomic_ratio).sum()
    }

    /// Ratio-weighted mass of one "molecule" of the mixture (amu).
    fn molecular_mass(&self) -> f64 {
        self.constituents
            .iter()
            .map(|c| c.atomic_ratio * c.isotope.a())
            .sum()
    }

    /// Mean atomic mass of the mixture (amu).
    pub fn atomic_mass(&self) -> f64 {
        let total = self.total_atomic_ratio();
        if total > 0.0 {
            self.molecular_mass() / total
        } else {
            0.0
        }
    }

    fn update_number_densities(&mut self) {
        let total_ratio = self.total_atomic_ratio();
        if total_ratio <= 0.0 || self.density <= 0.0 {
            self.constituents.iter_mut().for_each(|c| c.number_density = 0.0);
            return;
        }
        let total = match self.density_unit {
            DensityUnit::GramPerCc => {
                self.density * AVOGADRO_BARN_CM * total_ratio / self.molecular_mass()
            }
            DensityUnit::AtomPerCc => self.density / 1e24,
            DensityUnit::AtomPerBarnCm => self.density,
        };
        for c in self.constituents.iter_mut() {
            c.number_density = c.atomic_ratio / total_ratio * total;
            log::debug!(
                "isotope {} has number density {:.4e} at/cc in material {}",
                c.isotope.name,
                c.number_density * 1e24,
                self.name
            );
        }
    }

    /// Check the material can take part in transport.
    pub fn validate(&self) -> Result<()> {
        if self.constituents.is_empty() {
            return Err(Error::material(&self.name, "material contains no isotopes"));
        }
        if self.density <= 0.0 {
            return Err(Error::material(&self.name, "density has not been set"));
        }
        Ok(())
    }

    /// Mass density (g/cc), derived from the number density when given in atoms.
    pub fn density(&self) -> f64 {
        match self.density_unit {
            DensityUnit::GramPerCc => self.density,
            _ => {
                let total_ratio = self.total_atomic_ratio();
                if total_ratio <= 0.0 {
                    return 0.0;
                }
                self.number_density() * self.molecular_mass() / (total_ratio * AVOGADRO_BARN_CM)
            }
        }
    }

    pub fn density_unit(&self) -> DensityUnit {
        self.density_unit
    }

    /// Total number density (atoms / barn-cm).
    pub fn number_density(&self) -> f64 {
        self.constituents.iter().map(|c| c.number_density).sum()
    }

    pub fn num_isotopes(&self) -> usize {
        self.constituents.len()
    }

    /// Isotopes with their number densities (atoms / barn-cm), in insertion order.
    pub fn isotopes(&self) -> impl Iterator<Item = (&Arc<Isotope>, f64)> {
        self.constituents
            .iter()
            .map(|c| (&c.isotope, c.number_density))
    }

    pub fn isotope_number_density(&self, name: &str) -> Option<f64> {
        self.constituents
            .iter()
            .find(|c| c.isotope.name == name)
            .map(|c| c.number_density)
    }

    pub fn contains_isotope(&self, name: &str) -> bool {
        self.constituents.iter().any(|c| c.isotope.name == name)
    }

    pub fn is_fissionable(&self) -> bool {
        self.constituents.iter().any(|c| c.isotope.is_fissionable())
    }

    /// Macroscopic cross sections (1/cm) for every channel at `energy` (eV).
    pub fn macro_xs(&self, energy: f64) -> Result<CrossSections> {
        let mut sum = CrossSections::default();
        for c in &self.constituents {
            sum += c.isotope.cross_sections(energy)? * c.number_density;
        }
        Ok(sum)
    }

    pub fn macro_xs_channel(&self, channel: XsChannel, energy: f64) -> Result<f64> {
        Ok(self.macro_xs(energy)?.get(channel))
    }

    pub fn total_macro_xs(&self, energy: f64) -> Result<f64> {
        self.macro_xs_channel(XsChannel::Total, energy)
    }

    pub fn transport_macro_xs(&self, energy: f64) -> Result<f64> {
        self.macro_xs_channel(XsChannel::Transport, energy)
    }

    /// Number-density averaged microscopic cross section (barns).
    pub fn micro_xs_channel(&self, channel: XsChannel, energy: f64) -> Result<f64> {
        let n = self.number_density();
        if n <= 0.0 {
            return Ok(0.0);
        }
        Ok(self.macro_xs_channel(channel, energy)? / n)
    }

    /// Pick the isotope a neutron at `energy` collides with, with probability
    /// proportional to each isotope's macroscopic total cross section.
    pub fn sample_isotope<R: Rng + ?Sized>(&self, energy: f64, rng: &mut R) -> Result<&Arc<Isotope>> {
        let total = self.total_macro_xs(energy)?;
        Ok(self.sample_collision_isotope(energy, total, rng)?.0)
    }

    /// [`Material::sample_isotope`] given the macroscopic total `sigma_t` at
    /// `energy`. Also returns the chosen isotope's microscopic cross sections.
    pub fn sample_collision_isotope<R: Rng + ?Sized>(
        &self,
        energy: f64,
        sigma_t: f64,
        rng: &mut R,
    ) -> Result<(&Arc<Isotope>, CrossSections)> {
        if !(sigma_t > 0.0) {
            return Err(Error::NoValidReaction {
                context: format!("material {}", self.name),
                energy,
            });
        }
        let xi = rng.gen_range(0.0..sigma_t);
        let mut cumulative = 0.0;
        let mut last = None;
        for c in &self.constituents {
            let micro = c.isotope.cross_sections(energy)?;
            let weight = micro.total() * c.number_density;
            if weight > 0.0 {
                cumulative += weight;
                if xi < cumulative {
                    return Ok((&c.isotope, micro));
                }
                last = Some((&c.isotope, micro));
            }
        }
        // rounding left xi at the very top of the range
        last.ok_or_else(|| Error::NoValidReaction {
            context: format!("material {}", self.name),
            energy,
        })
    }

    /// Sample a free-flight distance (cm), `-ln(xi) / Sigma_t(E)`.
    pub fn sample_distance_to_collision<R: Rng + ?Sized>(&self, energy: f64, rng: &mut R) -> Result<f64> {
        let sigma_t = self.total_macro_xs(energy)?;
        self.sample_free_flight(energy, sigma_t, rng)
    }

    /// Free flight through a macroscopic total `sigma_t` already looked up at `energy`.
    pub fn sample_free_flight<R: Rng + ?Sized>(&self, energy: f64, sigma_t: f64, rng: &mut R) -> Result<f64> {
        if !(sigma_t > 0.0) {
            return Err(Error::NoValidReaction {
                context: format!("free flight in material {}", self.name),
                energy,
            });
        }
        let xi: f64 = rng.gen();
        Ok(-(1.0 - xi).ln() / sigma_t)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Material {} ({:.4} g/cc, {:.4e} at/barn-cm)",
            self.name,
            self.density(),
            self.number_density()
        )?;
        for c in &self.constituents {
            write!(f, "\n  {} N = {:.4e}", c.isotope.name, c.number_density)?;
        }
        Ok(())
    }
}
