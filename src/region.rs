use crate::error::{Error, Result};
use crate::isotope::{CrossSections, Isotope, Reaction};
use crate::material::Material;
use crate::neutron::Neutron;
use crate::physics::ScatterKinematics;
use crate::surface::{BoundaryType, Surface, SurfaceKind, ON_SURFACE_THRESHOLD, TINY_MOVE};
use rand::Rng;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Side of a surface a bounded region lies on.
#[derive(Clone, Debug)]
pub enum HalfspaceType {
    /// Positive side: `surface.evaluate(p) >= 0`
    Above(Arc<Surface>),
    /// Negative side: `surface.evaluate(p) <= 0`
    Below(Arc<Surface>),
}

impl HalfspaceType {
    pub fn surface(&self) -> &Arc<Surface> {
        match self {
            HalfspaceType::Above(s) | HalfspaceType::Below(s) => s,
        }
    }

    pub fn sense(&self) -> f64 {
        match self {
            HalfspaceType::Above(_) => 1.0,
            HalfspaceType::Below(_) => -1.0,
        }
    }

    pub fn contains(&self, point: [f64; 3]) -> bool {
        self.sense() * self.surface().evaluate(point) >= -ON_SURFACE_THRESHOLD
    }

    /// True when travelling along `direction` from `point` heads out of this halfspace.
    pub fn is_leaving(&self, point: [f64; 3], direction: [f64; 3]) -> bool {
        let n = self.surface().normal(point);
        self.sense() * (n[0] * direction[0] + n[1] * direction[1] + n[2] * direction[2]) < 0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RegionKind {
    InfiniteMedium,
    EquivalenceFuel { fuel_radius: f64, pitch: f64 },
    EquivalenceModerator { fuel_radius: f64, pitch: f64 },
    BoundedFuel,
    BoundedModerator,
    BoundedGeneral,
}

impl RegionKind {
    pub fn is_bounded(&self) -> bool {
        matches!(
            self,
            RegionKind::BoundedFuel | RegionKind::BoundedModerator | RegionKind::BoundedGeneral
        )
    }

    pub fn is_equivalence(&self) -> bool {
        matches!(
            self,
            RegionKind::EquivalenceFuel { .. } | RegionKind::EquivalenceModerator { .. }
        )
    }

    pub fn is_fuel(&self) -> bool {
        matches!(self, RegionKind::EquivalenceFuel { .. } | RegionKind::BoundedFuel)
    }

    pub fn is_moderator(&self) -> bool {
        matches!(
            self,
            RegionKind::EquivalenceModerator { .. } | RegionKind::BoundedModerator
        )
    }
}

/// Result of one collision: what was hit and the cross sections that applied.
#[derive(Debug, Clone)]
pub struct Collision {
    pub isotope: Arc<Isotope>,
    pub reaction: Reaction,
    /// Neutron energy entering the collision (eV)
    pub energy: f64,
    /// Macroscopic cross sections of the collision material at `energy`
    pub macro_xs: CrossSections,
    /// Microscopic cross sections of the struck isotope at `energy`
    pub micro_xs: CrossSections,
}

/// What happened to a neutron during one call to [`Region::collide_neutron`].
#[derive(Debug, Clone)]
pub enum RegionEvent {
    Collision(Collision),
    /// Crossed an interface; the neutron now sits just inside the neighbour.
    Crossed,
    Reflected,
    /// Left through a vacuum boundary and was killed.
    Leaked,
}

/// A sub-volume of the pin cell filled with one material.
#[derive(Debug, Clone)]
pub struct Region {
    name: String,
    kind: RegionKind,
    material: Arc<Material>,
    halfspaces: Vec<HalfspaceType>,
    volume: Option<f64>,
    buckling_squared: Option<f64>,
}

impl Region {
    fn build(name: String, kind: RegionKind, material: Arc<Material>) -> Result<Self> {
        material
            .validate()
            .map_err(|e| Error::region(&name, e.to_string()))?;
        Ok(Region {
            name,
            kind,
            material,
            halfspaces: Vec::new(),
            volume: None,
            buckling_squared: None,
        })
    }

    pub fn infinite(name: impl Into<String>, material: Arc<Material>) -> Result<Self> {
        Self::build(name.into(), RegionKind::InfiniteMedium, material)
    }

    pub fn equivalence_fuel(
        name: impl Into<String>,
        material: Arc<Material>,
        fuel_radius: f64,
        pitch: f64,
    ) -> Result<Self> {
        let name = name.into();
        check_pin_dimensions(&name, fuel_radius, pitch)?;
        Self::build(name, RegionKind::EquivalenceFuel { fuel_radius, pitch }, material)
    }

    pub fn equivalence_moderator(
        name: impl Into<String>,
        material: Arc<Material>,
        fuel_radius: f64,
        pitch: f64,
    ) -> Result<Self> {
        let name = name.into();
        check_pin_dimensions(&name, fuel_radius, pitch)?;
        Self::build(
            name,
            RegionKind::EquivalenceModerator { fuel_radius, pitch },
            material,
        )
    }

    /// Bounded region delimited by `halfspaces`. At least one halfspace is required.
    pub fn bounded(
        name: impl Into<String>,
        kind: RegionKind,
        material: Arc<Material>,
        halfspaces: Vec<HalfspaceType>,
    ) -> Result<Self> {
        let name = name.into();
        if !kind.is_bounded() {
            return Err(Error::region(
                name,
                format!("{:?} is not a bounded region kind", kind),
            ));
        }
        if halfspaces.is_empty() {
            return Err(Error::region(
                name,
                "a bounded region needs at least one bounding surface",
            ));
        }
        let mut region = Self::build(name, kind, material)?;
        region.halfspaces = halfspaces;
        Ok(region)
    }

    pub fn add_halfspace(&mut self, halfspace: HalfspaceType) -> Result<()> {
        if !self.kind.is_bounded() {
            return Err(Error::region(
                &self.name,
                "only bounded regions can have bounding surfaces",
            ));
        }
        self.halfspaces.push(halfspace);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &RegionKind {
        &self.kind
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn halfspaces(&self) -> &[HalfspaceType] {
        &self.halfspaces
    }

    pub fn fuel_radius(&self) -> Option<f64> {
        match self.kind {
            RegionKind::EquivalenceFuel { fuel_radius, .. }
            | RegionKind::EquivalenceModerator { fuel_radius, .. } => Some(fuel_radius),
            _ => None,
        }
    }

    pub fn pitch(&self) -> Option<f64> {
        match self.kind {
            RegionKind::EquivalenceFuel { pitch, .. }
            | RegionKind::EquivalenceModerator { pitch, .. } => Some(pitch),
            _ => None,
        }
    }

    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        if !(volume > 0.0) {
            return Err(Error::region(
                &self.name,
                format!("volume must be positive, got {}", volume),
            ));
        }
        self.volume = Some(volume);
        Ok(())
    }

    /// Volume per unit height (cm^2 for pin-cell regions, 1 unless set for an
    /// infinite medium). Zero when it cannot be determined.
    pub fn volume(&self) -> f64 {
        if let Some(v) = self.volume {
            return v;
        }
        match self.kind {
            RegionKind::InfiniteMedium => 1.0,
            RegionKind::EquivalenceFuel { fuel_radius, .. } => PI * fuel_radius * fuel_radius,
            RegionKind::EquivalenceModerator { fuel_radius, pitch } => {
                pitch * pitch - PI * fuel_radius * fuel_radius
            }
            _ => self.bounded_area().unwrap_or(0.0),
        }
    }

    /// Cross-sectional area of a region built from planes and z-cylinders.
    fn bounded_area(&self) -> Option<f64> {
        let (mut x_lo, mut x_hi) = (f64::NEG_INFINITY, f64::INFINITY);
        let (mut y_lo, mut y_hi) = (f64::NEG_INFINITY, f64::INFINITY);
        let mut excluded = 0.0;
        for hs in &self.halfspaces {
            match (&hs.surface().kind, hs) {
                (SurfaceKind::XPlane { x0 }, HalfspaceType::Above(_)) => x_lo = x_lo.max(*x0),
                (SurfaceKind::XPlane { x0 }, HalfspaceType::Below(_)) => x_hi = x_hi.min(*x0),
                (SurfaceKind::YPlane { y0 }, HalfspaceType::Above(_)) => y_lo = y_lo.max(*y0),
                (SurfaceKind::YPlane { y0 }, HalfspaceType::Below(_)) => y_hi = y_hi.min(*y0),
                (SurfaceKind::ZCylinder { radius, .. }, HalfspaceType::Below(_)) => {
                    return Some(PI * radius * radius);
                }
                (SurfaceKind::ZCylinder { radius, .. }, HalfspaceType::Above(_)) => {
                    excluded += PI * radius * radius;
                }
            }
        }
        let area = (x_hi - x_lo) * (y_hi - y_lo) - excluded;
        if area.is_finite() && area > 0.0 {
            Some(area)
        } else {
            None
        }
    }

    pub fn set_buckling_squared(&mut self, buckling_squared: f64) {
        self.buckling_squared = Some(buckling_squared);
    }

    pub fn buckling_squared(&self) -> Option<f64> {
        self.buckling_squared
    }

    pub fn contains_isotope(&self, name: &str) -> bool {
        self.material.contains_isotope(name)
    }

    /// Unbounded regions contain every point.
    pub fn contains(&self, point: [f64; 3]) -> bool {
        self.halfspaces.iter().all(|hs| hs.contains(point))
    }

    pub fn on_boundary(&self, point: [f64; 3]) -> bool {
        self.halfspaces
            .iter()
            .any(|hs| hs.surface().on_surface(point))
    }

    /// Nearest bounding surface along `direction` from `point`.
    pub fn distance_to_boundary(&self, point: [f64; 3], direction: [f64; 3]) -> Option<(f64, &Arc<Surface>)> {
        self.halfspaces
            .iter()
            .filter_map(|hs| {
                hs.surface()
                    .distance_to_surface(point, direction)
                    .map(|d| (d, hs.surface()))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Collide `neutron` with this region's material at its current position.
    pub fn collide_at_point<R: Rng>(
        &self,
        neutron: &mut Neutron,
        kinematics: ScatterKinematics,
        rng: &mut R,
    ) -> Result<Collision> {
        let macro_xs = self.material.macro_xs(neutron.energy)?;
        self.collide_with_macro_xs(neutron, macro_xs, kinematics, rng)
    }

    fn collide_with_macro_xs<R: Rng>(
        &self,
        neutron: &mut Neutron,
        macro_xs: CrossSections,
        kinematics: ScatterKinematics,
        rng: &mut R,
    ) -> Result<Collision> {
        let energy = neutron.energy;
        let (isotope, micro_xs) = self
            .material
            .sample_collision_isotope(energy, macro_xs.total(), rng)?;
        let isotope = isotope.clone();
        let reaction = isotope.collide_with_xs(neutron, &micro_xs, kinematics, rng)?;
        neutron.events += 1;
        log::trace!(
            "{:?} with {} in region {} at {:.4e} eV",
            reaction,
            isotope.name,
            self.name,
            energy
        );
        Ok(Collision {
            isotope,
            reaction,
            energy,
            macro_xs,
            micro_xs,
        })
    }

    /// Advance `neutron` to its next event inside this region.
    ///
    /// Unbounded regions collide immediately with target-at-rest energy-only
    /// kinematics. Bounded regions sample a free flight and compare it against
    /// the nearest bounding surface, applying that surface's boundary condition
    /// when it is reached first.
    pub fn collide_neutron<R: Rng>(&self, neutron: &mut Neutron, rng: &mut R) -> Result<RegionEvent> {
        if !self.kind.is_bounded() {
            return self
                .collide_at_point(neutron, ScatterKinematics::Asymptotic, rng)
                .map(RegionEvent::Collision);
        }

        let macro_xs = self.material.macro_xs(neutron.energy)?;
        let flight = self
            .material
            .sample_free_flight(neutron.energy, macro_xs.total(), rng)?;
        let boundary = self
            .distance_to_boundary(neutron.position, neutron.direction)
            .map(|(d, s)| (d, s.clone()));

        match boundary {
            Some((distance, surface)) if distance < flight => {
                neutron.events += 1;
                match surface.boundary_type {
                    BoundaryType::Interface => {
                        neutron.advance(distance + TINY_MOVE);
                        Ok(RegionEvent::Crossed)
                    }
                    BoundaryType::Reflective => {
                        neutron.advance(distance);
                        neutron.direction = surface.reflect(neutron.position, neutron.direction);
                        self.reflect_off_neighbours(neutron);
                        neutron.advance(TINY_MOVE);
                        Ok(RegionEvent::Reflected)
                    }
                    BoundaryType::Vacuum => {
                        neutron.advance(distance);
                        neutron.kill();
                        Ok(RegionEvent::Leaked)
                    }
                }
            }
            _ => {
                neutron.advance(flight);
                self.collide_with_macro_xs(neutron, macro_xs, ScatterKinematics::CenterOfMass, rng)
                    .map(RegionEvent::Collision)
            }
        }
    }

    /// At a corner the nudge off one reflective surface would carry the neutron
    /// through the next one, so mirror off every reflective surface it would cross.
    fn reflect_off_neighbours(&self, neutron: &mut Neutron) {
        for hs in &self.halfspaces {
            let surface = hs.surface();
            if surface.boundary_type != BoundaryType::Reflective {
                continue;
            }
            let (p, d) = (neutron.position, neutron.direction);
            let nudged = [p[0] + TINY_MOVE * d[0], p[1] + TINY_MOVE * d[1], p[2] + TINY_MOVE * d[2]];
            if hs.sense() * surface.evaluate(nudged) < 0.0 && hs.is_leaving(p, d) {
                neutron.direction = surface.reflect(p, d);
            }
        }
    }
}

fn check_pin_dimensions(name: &str, fuel_radius: f64, pitch: f64) -> Result<()> {
    if !(fuel_radius > 0.0) {
        return Err(Error::region(
            name,
            format!("fuel radius must be positive, got {}", fuel_radius),
        ));
    }
    if !(pitch > 2.0 * fuel_radius) {
        return Err(Error::region(
            name,
            format!(
                "pitch {} must exceed the fuel diameter {}",
                pitch,
                2.0 * fuel_radius
            ),
        ));
    }
    Ok(())
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Region {} ({:?}, material {}, volume {:.4})",
            self.name,
            self.kind,
            self.material.name(),
            self.volume()
        )
    }
}
