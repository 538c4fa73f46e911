use crate::error::{Error, Result};
use crate::neutron::Neutron;
use crate::physics::{self, ScatterKinematics, THERMAL_CUTOFF};
use crate::thermal::ThermalScattering;
use crate::utilities::{lower_index, logspace, Interpolation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// Default temperature for thermal scattering (K)
pub const DEFAULT_TEMPERATURE: f64 = 300.0;

/// What happens when an energy outside the tabulated grid is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridPolicy {
    /// Use the cross section at the nearest end of the grid.
    #[default]
    Clamp,
    /// Fail with [`Error::EnergyOutOfRange`].
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Elastic,
    Capture,
    Fission,
}

impl Reaction {
    pub fn is_absorption(&self) -> bool {
        !matches!(self, Reaction::Elastic)
    }
}

/// Reaction channels exposed for both microscopic and macroscopic lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XsChannel {
    Total,
    Elastic,
    Absorption,
    Capture,
    Fission,
    Transport,
}

impl XsChannel {
    pub const ALL: [XsChannel; 6] = [
        XsChannel::Total,
        XsChannel::Elastic,
        XsChannel::Absorption,
        XsChannel::Capture,
        XsChannel::Fission,
        XsChannel::Transport,
    ];
}

/// Cross sections for every channel at one energy. Microscopic values are in
/// barns, macroscopic values in 1/cm.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrossSections {
    pub elastic: f64,
    pub capture: f64,
    pub fission: f64,
    pub transport: f64,
}

impl CrossSections {
    fn new(elastic: f64, capture: f64, fission: f64, mu_average: f64) -> Self {
        CrossSections {
            elastic,
            capture,
            fission,
            transport: elastic + capture + fission - mu_average * elastic,
        }
    }

    pub fn absorption(&self) -> f64 {
        self.capture + self.fission
    }

    pub fn total(&self) -> f64 {
        self.elastic + self.absorption()
    }

    pub fn get(&self, channel: XsChannel) -> f64 {
        match channel {
            XsChannel::Total => self.total(),
            XsChannel::Elastic => self.elastic,
            XsChannel::Absorption => self.absorption(),
            XsChannel::Capture => self.capture,
            XsChannel::Fission => self.fission,
            XsChannel::Transport => self.transport,
        }
    }
}

impl Add for CrossSections {
    type Output = CrossSections;

    fn add(self, rhs: CrossSections) -> CrossSections {
        CrossSections {
            elastic: self.elastic + rhs.elastic,
            capture: self.capture + rhs.capture,
            fission: self.fission + rhs.fission,
            transport: self.transport + rhs.transport,
        }
    }
}

impl AddAssign for CrossSections {
    fn add_assign(&mut self, rhs: CrossSections) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for CrossSections {
    type Output = CrossSections;

    fn mul(self, rhs: f64) -> CrossSections {
        CrossSections {
            elastic: self.elastic * rhs,
            capture: self.capture * rhs,
            fission: self.fission * rhs,
            transport: self.transport * rhs,
        }
    }
}

/// One reaction channel as supplied by the caller, before merging.
#[derive(Debug, Clone, Default)]
struct XsTable {
    energies: Vec<f64>,
    values: Vec<f64>,
}

impl XsTable {
    fn sample(&self, energy: f64, interpolation: Interpolation) -> f64 {
        if self.energies.is_empty() {
            return 0.0;
        }
        interpolation.interpolate(&self.energies, &self.values, energy)
    }
}

/// A nuclide with pointwise elastic, capture and fission cross sections.
///
/// Each channel is supplied on its own energy grid. The channels are merged onto
/// the union of their grids (or onto a uniform lethargy grid after
/// [`Isotope::rescale_xs`]); absorption, total and transport cross sections are
/// always derived from the merged channels, so `total = elastic + capture + fission`
/// holds at every energy.
#[derive(Debug, Clone)]
pub struct Isotope {
    pub name: String,
    a: f64,
    alpha: f64,
    mu_average: f64,
    temperature: f64,
    fissionable: bool,
    interpolation: Interpolation,
    grid_policy: GridPolicy,
    elastic_table: XsTable,
    capture_table: XsTable,
    fission_table: XsTable,
    energies: Vec<f64>,
    elastic: Vec<f64>,
    capture: Vec<f64>,
    fission: Vec<f64>,
    rescaled: bool,
    thermal_cutoff: f64,
    use_thermal_scattering: bool,
    thermal: Option<ThermalScattering>,
}

impl Isotope {
    /// Create an isotope with atomic mass `a` (amu) and no cross sections.
    /// Thermal scattering is off until [`Isotope::use_thermal_scattering`] is called.
    pub fn new(name: impl Into<String>, a: f64) -> Result<Self> {
        let name = name.into();
        if !(a >= 1.0) {
            return Err(Error::isotope(name, format!("atomic mass must be >= 1, got {}", a)));
        }
        Ok(Isotope {
            name,
            a,
            alpha: physics::alpha(a),
            mu_average: 2.0 / (3.0 * a),
            temperature: DEFAULT_TEMPERATURE,
            fissionable: false,
            interpolation: Interpolation::default(),
            grid_policy: GridPolicy::default(),
            elastic_table: XsTable::default(),
            capture_table: XsTable::default(),
            fission_table: XsTable::default(),
            energies: Vec::new(),
            elastic: Vec::new(),
            capture: Vec::new(),
            fission: Vec::new(),
            rescaled: false,
            thermal_cutoff: THERMAL_CUTOFF,
            use_thermal_scattering: false,
            thermal: None,
        })
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn mu_average(&self) -> f64 {
        self.mu_average
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn is_fissionable(&self) -> bool {
        self.fissionable
    }

    pub fn is_rescaled(&self) -> bool {
        self.rescaled
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn grid_policy(&self) -> GridPolicy {
        self.grid_policy
    }

    pub fn energy_grid(&self) -> &[f64] {
        &self.energies
    }

    pub fn make_fissionable(&mut self) {
        self.fissionable = true;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
        if !self.rescaled {
            self.merge_channels();
        }
    }

    pub fn set_grid_policy(&mut self, policy: GridPolicy) {
        self.grid_policy = policy;
    }

    pub fn set_elastic_xs(&mut self, energies: &[f64], xs: &[f64]) -> Result<()> {
        self.elastic_table = self.validate_table("elastic", energies, xs)?;
        self.merge_channels();
        Ok(())
    }

    pub fn set_capture_xs(&mut self, energies: &[f64], xs: &[f64]) -> Result<()> {
        self.capture_table = self.validate_table("capture", energies, xs)?;
        self.merge_channels();
        Ok(())
    }

    /// Setting a fission cross section with any positive value marks the isotope fissionable.
    pub fn set_fission_xs(&mut self, energies: &[f64], xs: &[f64]) -> Result<()> {
        self.fission_table = self.validate_table("fission", energies, xs)?;
        if xs.iter().any(|&v| v > 0.0) {
            self.fissionable = true;
        }
        self.merge_channels();
        Ok(())
    }

    fn validate_table(&self, channel: &str, energies: &[f64], xs: &[f64]) -> Result<XsTable> {
        if energies.len() != xs.len() {
            return Err(Error::isotope(
                &self.name,
                format!(
                    "{} table has {} energies but {} values",
                    channel,
                    energies.len(),
                    xs.len()
                ),
            ));
        }
        if energies.is_empty() {
            return Err(Error::isotope(&self.name, format!("{} table is empty", channel)));
        }
        if energies.iter().any(|&e| !(e > 0.0) || !e.is_finite()) {
            return Err(Error::isotope(
                &self.name,
                format!("{} energies must be positive and finite", channel),
            ));
        }
        if energies.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::isotope(
                &self.name,
                format!("{} energies must be strictly ascending", channel),
            ));
        }
        if xs.iter().any(|&v| !(v >= 0.0) || !v.is_finite()) {
            return Err(Error::isotope(
                &self.name,
                format!("{} cross sections must be non-negative and finite", channel),
            ));
        }
        Ok(XsTable {
            energies: energies.to_vec(),
            values: xs.to_vec(),
        })
    }

    fn tables(&self) -> [&XsTable; 3] {
        [&self.elastic_table, &self.capture_table, &self.fission_table]
    }

    /// Merge the channel tables onto the union of their energy grids.
    fn merge_channels(&mut self) {
        let mut grid: Vec<f64> = self
            .tables()
            .iter()
            .flat_map(|t| t.energies.iter().copied())
            .collect();
        grid.sort_by(|a, b| a.total_cmp(b));
        grid.dedup();
        self.resample_onto(grid);
        self.rescaled = false;
    }

    /// Resample every channel onto `num_energies` points evenly spaced in lethargy
    /// between `start_energy` and `end_energy` (eV).
    pub fn rescale_xs(&mut self, start_energy: f64, end_energy: f64, num_energies: usize) -> Result<()> {
        if !(start_energy > 0.0) || end_energy <= start_energy || num_energies < 2 {
            return Err(Error::isotope(
                &self.name,
                format!(
                    "cannot rescale onto {} points between {} and {} eV",
                    num_energies, start_energy, end_energy
                ),
            ));
        }
        self.resample_onto(logspace(start_energy, end_energy, num_energies));
        self.rescaled = true;
        log::debug!(
            "rescaled isotope {} onto {} energies in [{:e}, {:e}] eV",
            self.name,
            num_energies,
            start_energy,
            end_energy
        );
        Ok(())
    }

    fn resample_onto(&mut self, grid: Vec<f64>) {
        let interp = self.interpolation;
        let [elastic, capture, fission] = self
            .tables()
            .map(|table| grid.iter().map(|&e| table.sample(e, interp)).collect::<Vec<f64>>());
        self.elastic = elastic;
        self.capture = capture;
        self.fission = fission;
        self.energies = grid;
    }

    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        if !(temperature > 0.0) {
            return Err(Error::isotope(
                &self.name,
                format!("temperature must be positive, got {}", temperature),
            ));
        }
        self.temperature = temperature;
        if self.use_thermal_scattering {
            self.thermal = Some(ThermalScattering::new(self.a, temperature));
        }
        Ok(())
    }

    /// Enable the free-gas kernel below the thermal cutoff, building its tables.
    pub fn use_thermal_scattering(&mut self) {
        self.use_thermal_scattering = true;
        if self.thermal.is_none() {
            self.thermal = Some(ThermalScattering::new(self.a, self.temperature));
        }
    }

    pub fn neglect_thermal_scattering(&mut self) {
        self.use_thermal_scattering = false;
    }

    pub fn uses_thermal_scattering(&self) -> bool {
        self.use_thermal_scattering
    }

    pub fn thermal_scattering(&self) -> Option<&ThermalScattering> {
        self.thermal.as_ref()
    }

    pub fn thermal_cutoff(&self) -> f64 {
        self.thermal_cutoff
    }

    pub fn set_thermal_scattering_cutoff(&mut self, cutoff: f64) {
        self.thermal_cutoff = cutoff;
    }

    /// Cross sections at the `index`-th point of the merged energy grid.
    pub fn xs_at_index(&self, index: usize) -> Option<CrossSections> {
        Some(CrossSections::new(
            *self.elastic.get(index)?,
            *self.capture.get(index)?,
            *self.fission.get(index)?,
            self.mu_average,
        ))
    }

    /// Microscopic cross sections (barns) for every channel at `energy` (eV).
    pub fn cross_sections(&self, energy: f64) -> Result<CrossSections> {
        let n = self.energies.len();
        if n == 0 {
            return Err(Error::isotope(&self.name, "no cross sections have been set"));
        }
        let (first, last) = (self.energies[0], self.energies[n - 1]);
        if energy < first || energy > last || energy.is_nan() {
            if self.grid_policy == GridPolicy::Strict {
                return Err(Error::EnergyOutOfRange {
                    isotope: self.name.clone(),
                    energy,
                    min: first,
                    max: last,
                });
            }
            let index = if energy > last { n - 1 } else { 0 };
            return Ok(self.xs_at_index(index).unwrap_or_default());
        }
        if n == 1 {
            return Ok(self.xs_at_index(0).unwrap_or_default());
        }

        let i = lower_index(&self.energies, energy);
        let (e1, e2) = (self.energies[i], self.energies[i + 1]);
        let interp = |values: &[f64]| self.interpolation.between(e1, e2, values[i], values[i + 1], energy);
        Ok(CrossSections::new(
            interp(&self.elastic),
            interp(&self.capture),
            interp(&self.fission),
            self.mu_average,
        ))
    }

    pub fn xs(&self, channel: XsChannel, energy: f64) -> Result<f64> {
        Ok(self.cross_sections(energy)?.get(channel))
    }

    pub fn total_xs(&self, energy: f64) -> Result<f64> {
        self.xs(XsChannel::Total, energy)
    }

    pub fn elastic_xs(&self, energy: f64) -> Result<f64> {
        self.xs(XsChannel::Elastic, energy)
    }

    pub fn absorption_xs(&self, energy: f64) -> Result<f64> {
        self.xs(XsChannel::Absorption, energy)
    }

    pub fn capture_xs(&self, energy: f64) -> Result<f64> {
        self.xs(XsChannel::Capture, energy)
    }

    pub fn fission_xs(&self, energy: f64) -> Result<f64> {
        self.xs(XsChannel::Fission, energy)
    }

    pub fn transport_xs(&self, energy: f64) -> Result<f64> {
        self.xs(XsChannel::Transport, energy)
    }

    /// Pick a reaction channel with probability proportional to its cross section.
    pub fn sample_reaction<R: Rng + ?Sized>(&self, energy: f64, rng: &mut R) -> Result<Reaction> {
        let xs = self.cross_sections(energy)?;
        self.sample_reaction_from(&xs, energy, rng)
    }

    /// [`Isotope::sample_reaction`] from cross sections already looked up at `energy`.
    pub fn sample_reaction_from<R: Rng + ?Sized>(
        &self,
        xs: &CrossSections,
        energy: f64,
        rng: &mut R,
    ) -> Result<Reaction> {
        let total = xs.total();
        if !(total > 0.0) {
            return Err(Error::NoValidReaction {
                context: format!("isotope {}", self.name),
                energy,
            });
        }
        let xi = rng.gen_range(0.0..total);
        if xi < xs.elastic {
            Ok(Reaction::Elastic)
        } else if xi < xs.elastic + xs.capture || xs.fission == 0.0 {
            Ok(Reaction::Capture)
        } else {
            Ok(Reaction::Fission)
        }
    }

    /// Collide `neutron` with this isotope: absorptions end the history, elastic
    /// scatters update the neutron's energy (and direction for centre-of-mass kinematics).
    pub fn collide_neutron<R: Rng>(
        &self,
        neutron: &mut Neutron,
        kinematics: ScatterKinematics,
        rng: &mut R,
    ) -> Result<Reaction> {
        let xs = self.cross_sections(neutron.energy)?;
        self.collide_with_xs(neutron, &xs, kinematics, rng)
    }

    /// [`Isotope::collide_neutron`] with this isotope's cross sections at the
    /// neutron's energy already in hand.
    pub fn collide_with_xs<R: Rng>(
        &self,
        neutron: &mut Neutron,
        xs: &CrossSections,
        kinematics: ScatterKinematics,
        rng: &mut R,
    ) -> Result<Reaction> {
        neutron.old_energy = neutron.energy;
        let reaction = self.sample_reaction_from(xs, neutron.energy, rng)?;
        if reaction.is_absorption() {
            neutron.kill();
        } else {
            self.scatter(neutron, kinematics, rng);
        }
        Ok(reaction)
    }

    fn scatter<R: Rng>(&self, neutron: &mut Neutron, kinematics: ScatterKinematics, rng: &mut R) {
        let thermal = match &self.thermal {
            Some(kernel) if self.use_thermal_scattering && neutron.energy <= self.thermal_cutoff => {
                Some(kernel)
            }
            _ => None,
        };
        let energy = match kinematics {
            ScatterKinematics::Asymptotic => match thermal {
                Some(kernel) => kernel.sample(neutron.energy, rng),
                None => physics::asymptotic_energy(neutron.energy, self.alpha, rng),
            },
            ScatterKinematics::CenterOfMass => {
                let mu_cm = 2.0 * rng.gen::<f64>() - 1.0;
                let mu_lab = physics::lab_cosine(self.a, mu_cm);
                neutron.direction = physics::scatter_direction(neutron.direction, mu_lab, rng);
                match thermal {
                    Some(kernel) => kernel.sample(neutron.energy, rng),
                    None => neutron.energy * physics::cm_energy_ratio(self.a, mu_cm),
                }
            }
        };
        neutron.energy = energy.max(f64::MIN_POSITIVE);
    }
}

impl fmt::Display for Isotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Isotope {} (A = {}, alpha = {:.4}, {} energies{})",
            self.name,
            self.a,
            self.alpha,
            self.energies.len(),
            if self.fissionable { ", fissionable" } else { "" }
        )
    }
}
