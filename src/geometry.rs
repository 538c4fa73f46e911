use crate::error::{Error, Result};
use crate::material::Material;
use crate::neutron::Neutron;
use crate::physics::ScatterKinematics;
use crate::region::{Collision, Region, RegionEvent, RegionKind};
use crate::surface::BoundaryType;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialType {
    /// A single infinite region; no spatial tracking.
    InfiniteHomogeneous,
    /// Fuel and moderator coupled by rational collision probabilities.
    HomogeneousEquivalence,
    /// Bounded regions with explicit surface tracking.
    Heterogeneous,
}

/// Carlvik two-term rational approximation parameters for a fuel pin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceParameters {
    pub dancoff: f64,
    /// Escape cross section 1 / (2 r) (1/cm)
    pub sigma_e: f64,
    pub alpha1: f64,
    pub alpha2: f64,
    pub beta: f64,
}

impl EquivalenceParameters {
    pub fn carlvik(dancoff: f64, fuel_radius: f64) -> Result<Self> {
        if !(dancoff > 0.0 && dancoff < 1.0) {
            return Err(Error::InvalidGeometry(format!(
                "dancoff factor must lie in (0, 1), got {}",
                dancoff
            )));
        }
        if !(fuel_radius > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "fuel radius must be positive, got {}",
                fuel_radius
            )));
        }
        let a = (1.0 - dancoff) / dancoff;
        let root = (a * a + 36.0 * a + 36.0).sqrt();
        let alpha1 = ((5.0 * a + 6.0) - root) / (2.0 * (a + 1.0));
        let alpha2 = ((5.0 * a + 6.0) + root) / (2.0 * (a + 1.0));
        let beta = ((4.0 * a + 6.0) / (a + 1.0) - alpha1) / (alpha2 - alpha1);
        Ok(EquivalenceParameters {
            dancoff,
            sigma_e: 1.0 / (2.0 * fuel_radius),
            alpha1,
            alpha2,
            beta,
        })
    }

    /// Fuel-to-fuel collision probability for a fuel total cross section `sigma_t`.
    pub fn fuel_fuel_probability(&self, sigma_t: f64) -> f64 {
        self.beta * sigma_t / (self.alpha1 * self.sigma_e + sigma_t)
            + (1.0 - self.beta) * sigma_t / (self.alpha2 * self.sigma_e + sigma_t)
    }
}

/// Summary of one completed history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryOutcome {
    pub collisions: u64,
    pub leaked: bool,
    /// The history hit the event cap and was stopped.
    pub truncated: bool,
}

/// The pin cell: a set of regions of one spatial type and the transport loop
/// that moves a neutron through them.
#[derive(Debug, Clone)]
pub struct Geometry {
    spatial_type: SpatialType,
    regions: Vec<Arc<Region>>,
    buckling_squared: f64,
    dancoff: Option<f64>,
}

impl Geometry {
    pub fn new(spatial_type: SpatialType) -> Self {
        Geometry {
            spatial_type,
            regions: Vec::new(),
            buckling_squared: 0.0,
            dancoff: None,
        }
    }

    pub fn spatial_type(&self) -> SpatialType {
        self.spatial_type
    }

    /// Add a region, rejecting kinds that do not belong to this spatial type.
    pub fn add_region(&mut self, region: Arc<Region>) -> Result<()> {
        if self.regions.iter().any(|r| r.name() == region.name()) {
            return Err(Error::InvalidGeometry(format!(
                "a region named {} already exists",
                region.name()
            )));
        }
        let kind = region.kind();
        let allowed = match self.spatial_type {
            SpatialType::InfiniteHomogeneous => {
                if !self.regions.is_empty() {
                    return Err(Error::InvalidGeometry(format!(
                        "cannot add region {}: an infinite homogeneous geometry holds one region",
                        region.name()
                    )));
                }
                *kind == RegionKind::InfiniteMedium
            }
            SpatialType::HomogeneousEquivalence => {
                let duplicate = self.regions.iter().any(|r| {
                    (r.kind().is_fuel() && kind.is_fuel())
                        || (r.kind().is_moderator() && kind.is_moderator())
                });
                if duplicate {
                    return Err(Error::InvalidGeometry(format!(
                        "cannot add region {}: the geometry already has a {} region",
                        region.name(),
                        if kind.is_fuel() { "fuel" } else { "moderator" }
                    )));
                }
                kind.is_equivalence()
            }
            SpatialType::Heterogeneous => kind.is_bounded(),
        };
        if !allowed {
            return Err(Error::InvalidGeometry(format!(
                "region {} of kind {:?} cannot be used in a {:?} geometry",
                region.name(),
                kind,
                self.spatial_type
            )));
        }
        log::debug!("added {}", region);
        self.regions.push(region);
        Ok(())
    }

    pub fn regions(&self) -> &[Arc<Region>] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Arc<Region>> {
        self.regions.iter().find(|r| r.name() == name)
    }

    pub fn fuel(&self) -> Option<&Arc<Region>> {
        self.regions.iter().find(|r| r.kind().is_fuel())
    }

    pub fn moderator(&self) -> Option<&Arc<Region>> {
        self.regions.iter().find(|r| r.kind().is_moderator())
    }

    pub fn set_buckling_squared(&mut self, buckling_squared: f64) {
        self.buckling_squared = buckling_squared;
    }

    /// Geometry-wide buckling squared; regions may override it.
    pub fn buckling_squared(&self) -> f64 {
        self.buckling_squared
    }

    pub fn region_buckling_squared(&self, region: &Region) -> f64 {
        region.buckling_squared().unwrap_or(self.buckling_squared)
    }

    pub fn set_dancoff_factor(&mut self, dancoff: f64) -> Result<()> {
        if !(dancoff > 0.0 && dancoff < 1.0) {
            return Err(Error::InvalidGeometry(format!(
                "dancoff factor must lie in (0, 1), got {}",
                dancoff
            )));
        }
        self.dancoff = Some(dancoff);
        Ok(())
    }

    pub fn dancoff_factor(&self) -> Option<f64> {
        self.dancoff
    }

    pub fn equivalence_parameters(&self) -> Result<EquivalenceParameters> {
        let dancoff = self.dancoff.ok_or_else(|| {
            Error::InvalidGeometry("the dancoff factor has not been set".to_string())
        })?;
        let radius = self
            .fuel()
            .and_then(|f| f.fuel_radius())
            .ok_or_else(|| Error::InvalidGeometry("no equivalence fuel region".to_string()))?;
        EquivalenceParameters::carlvik(dancoff, radius)
    }

    /// Total volume of all regions.
    pub fn volume(&self) -> f64 {
        self.regions.iter().map(|r| r.volume()).sum()
    }

    /// Volume filled by `material`, summed over every region it backs.
    pub fn material_volume(&self, material: &Arc<Material>) -> f64 {
        self.regions
            .iter()
            .filter(|r| Arc::ptr_eq(r.material(), material))
            .map(|r| r.volume())
            .sum()
    }

    /// Check the geometry is complete enough to run.
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(Error::InvalidGeometry("the geometry contains no regions".to_string()));
        }
        if self.spatial_type == SpatialType::HomogeneousEquivalence {
            let (fuel, moderator) = match (self.fuel(), self.moderator()) {
                (Some(f), Some(m)) => (f, m),
                _ => {
                    return Err(Error::InvalidGeometry(
                        "an equivalence geometry needs a fuel and a moderator region".to_string(),
                    ))
                }
            };
            if fuel.fuel_radius() != moderator.fuel_radius() || fuel.pitch() != moderator.pitch() {
                return Err(Error::InvalidGeometry(format!(
                    "regions {} and {} disagree on the pin dimensions",
                    fuel.name(),
                    moderator.name()
                )));
            }
            self.equivalence_parameters()?;
        }
        if self.spatial_type == SpatialType::Heterogeneous {
            let mut ids = HashSet::new();
            for surface in self.regions.iter().flat_map(|r| r.halfspaces().iter().map(|h| h.surface())) {
                // the same surface may bound several regions
                ids.insert((surface.surface_id, Arc::as_ptr(surface)));
            }
            let unique: HashSet<usize> = ids.iter().map(|(id, _)| *id).collect();
            if unique.len() != ids.len() {
                return Err(Error::InvalidGeometry(
                    "distinct surfaces share a surface id".to_string(),
                ));
            }
            for region in &self.regions {
                for hs in region.halfspaces() {
                    let surface = hs.surface();
                    if surface.boundary_type != BoundaryType::Interface {
                        continue;
                    }
                    // the far side of an interface must belong to another region
                    let neighbour = self.regions.iter().any(|other| {
                        other.halfspaces().iter().any(|o| {
                            o.surface().surface_id == surface.surface_id && o.sense() != hs.sense()
                        })
                    });
                    if !neighbour {
                        return Err(Error::InvalidGeometry(format!(
                            "interface surface {} of region {} has no region on its other side",
                            surface.surface_id,
                            region.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Index of the region containing `point`.
    pub fn locate(&self, point: [f64; 3]) -> Result<usize> {
        self.regions
            .iter()
            .position(|r| r.contains(point))
            .ok_or_else(|| Error::lost(point, "point is not inside any region"))
    }

    pub fn fuel_fuel_collision_probability(&self, params: &EquivalenceParameters, energy: f64) -> Result<f64> {
        let fuel = self
            .fuel()
            .ok_or_else(|| Error::InvalidGeometry("no fuel region".to_string()))?;
        let sigma_t = fuel.material().total_macro_xs(energy)?;
        Ok(params.fuel_fuel_probability(sigma_t).clamp(0.0, 1.0))
    }

    /// Moderator-to-fuel probability from reciprocity,
    /// `(1 - p_ff) * Sigma_t,f V_f / (Sigma_t,m V_m)`.
    pub fn moderator_fuel_collision_probability(&self, params: &EquivalenceParameters, energy: f64) -> Result<f64> {
        let (fuel, moderator) = match (self.fuel(), self.moderator()) {
            (Some(f), Some(m)) => (f, m),
            _ => {
                return Err(Error::InvalidGeometry(
                    "an equivalence geometry needs a fuel and a moderator region".to_string(),
                ))
            }
        };
        let p_ff = self.fuel_fuel_collision_probability(params, energy)?;
        let fuel_rate = fuel.material().total_macro_xs(energy)? * fuel.volume();
        let moderator_rate = moderator.material().total_macro_xs(energy)? * moderator.volume();
        if moderator_rate <= 0.0 {
            return Ok(1.0);
        }
        Ok(((1.0 - p_ff) * fuel_rate / moderator_rate).clamp(0.0, 1.0))
    }

    /// Follow `neutron` until it is absorbed, leaks or reaches `max_events`,
    /// calling `on_collision` after every collision with the region it occurred in.
    pub fn transport<R, F>(
        &self,
        neutron: &mut Neutron,
        rng: &mut R,
        max_events: u64,
        mut on_collision: F,
    ) -> Result<HistoryOutcome>
    where
        R: Rng,
        F: FnMut(&Arc<Region>, &Collision, &Neutron),
    {
        let mut outcome = HistoryOutcome::default();
        match self.spatial_type {
            SpatialType::InfiniteHomogeneous => {
                let region = self.regions.first().ok_or_else(|| {
                    Error::InvalidGeometry("the geometry contains no regions".to_string())
                })?;
                while neutron.alive {
                    if truncate(neutron, max_events, &mut outcome) {
                        break;
                    }
                    let collision = region.collide_at_point(neutron, ScatterKinematics::Asymptotic, rng)?;
                    outcome.collisions += 1;
                    on_collision(region, &collision, neutron);
                }
            }
            SpatialType::HomogeneousEquivalence => {
                let params = self.equivalence_parameters()?;
                let (fuel, moderator) = match (self.fuel(), self.moderator()) {
                    (Some(f), Some(m)) => (f, m),
                    _ => {
                        return Err(Error::InvalidGeometry(
                            "an equivalence geometry needs a fuel and a moderator region".to_string(),
                        ))
                    }
                };
                // histories are born in the fuel
                let mut in_fuel = true;
                while neutron.alive {
                    if truncate(neutron, max_events, &mut outcome) {
                        break;
                    }
                    let xi: f64 = rng.gen();
                    if in_fuel {
                        let p_ff = self.fuel_fuel_collision_probability(&params, neutron.energy)?;
                        in_fuel = xi <= p_ff;
                    } else {
                        let p_mf = self.moderator_fuel_collision_probability(&params, neutron.energy)?;
                        in_fuel = xi < p_mf;
                    }
                    let region = if in_fuel { fuel } else { moderator };
                    let collision = region.collide_at_point(neutron, ScatterKinematics::Asymptotic, rng)?;
                    outcome.collisions += 1;
                    on_collision(region, &collision, neutron);
                }
            }
            SpatialType::Heterogeneous => {
                let mut current = self.locate(neutron.position)?;
                while neutron.alive {
                    if truncate(neutron, max_events, &mut outcome) {
                        break;
                    }
                    let region = &self.regions[current];
                    match region.collide_neutron(neutron, rng)? {
                        RegionEvent::Collision(collision) => {
                            outcome.collisions += 1;
                            on_collision(region, &collision, neutron);
                        }
                        RegionEvent::Crossed => current = self.locate(neutron.position)?,
                        RegionEvent::Reflected => {}
                        RegionEvent::Leaked => outcome.leaked = true,
                    }
                }
            }
        }
        Ok(outcome)
    }
}

fn truncate(neutron: &mut Neutron, max_events: u64, outcome: &mut HistoryOutcome) -> bool {
    if neutron.events < max_events {
        return false;
    }
    log::warn!(
        "history stopped after {} events at {:.4e} eV",
        neutron.events,
        neutron.energy
    );
    neutron.kill();
    outcome.truncated = true;
    true
}
