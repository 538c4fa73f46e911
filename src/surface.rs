use serde::{Deserialize, Serialize};

/// Distance a neutron is pushed past an interface after crossing it.
pub const TINY_MOVE: f64 = 1e-5;
/// Points closer than this to a surface are treated as lying on it.
pub const ON_SURFACE_THRESHOLD: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryType {
    Reflective,
    Vacuum,
    Interface,
}

impl Default for BoundaryType {
    fn default() -> Self {
        BoundaryType::Vacuum
    }
}

impl BoundaryType {
    /// Parse a boundary type from a string, returning None for invalid strings
    pub fn from_str_option(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reflective" => Some(BoundaryType::Reflective),
            "vacuum" => Some(BoundaryType::Vacuum),
            "interface" => Some(BoundaryType::Interface),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceKind {
    XPlane { x0: f64 },
    YPlane { y0: f64 },
    ZCylinder { x0: f64, y0: f64, radius: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub surface_id: usize,
    pub kind: SurfaceKind,
    pub boundary_type: BoundaryType,
}

impl Surface {
    pub fn x_plane(x0: f64, surface_id: usize, boundary_type: Option<BoundaryType>) -> Self {
        Surface {
            surface_id,
            kind: SurfaceKind::XPlane { x0 },
            boundary_type: boundary_type.unwrap_or_default(),
        }
    }

    pub fn y_plane(y0: f64, surface_id: usize, boundary_type: Option<BoundaryType>) -> Self {
        Surface {
            surface_id,
            kind: SurfaceKind::YPlane { y0 },
            boundary_type: boundary_type.unwrap_or_default(),
        }
    }

    /// Create a cylinder oriented along the Z axis, centered at (x0, y0)
    pub fn z_cylinder(
        x0: f64,
        y0: f64,
        radius: f64,
        surface_id: usize,
        boundary_type: Option<BoundaryType>,
    ) -> Self {
        Surface {
            surface_id,
            kind: SurfaceKind::ZCylinder { x0, y0, radius },
            boundary_type: boundary_type.unwrap_or_default(),
        }
    }

    /// Signed surface function: positive on the outside / greater-coordinate side.
    pub fn evaluate(&self, point: [f64; 3]) -> f64 {
        match self.kind {
            SurfaceKind::XPlane { x0 } => point[0] - x0,
            SurfaceKind::YPlane { y0 } => point[1] - y0,
            SurfaceKind::ZCylinder { x0, y0, radius } => {
                let dx = point[0] - x0;
                let dy = point[1] - y0;
                dx * dx + dy * dy - radius * radius
            }
        }
    }

    pub fn on_surface(&self, point: [f64; 3]) -> bool {
        let gap = match self.kind {
            SurfaceKind::XPlane { .. } | SurfaceKind::YPlane { .. } => self.evaluate(point),
            SurfaceKind::ZCylinder { x0, y0, radius } => {
                let dx = point[0] - x0;
                let dy = point[1] - y0;
                (dx * dx + dy * dy).sqrt() - radius
            }
        };
        gap.abs() < ON_SURFACE_THRESHOLD
    }

    /// Distance along `direction` from `point` to the surface.
    /// Returns None if the ray never reaches it or is already sitting on it.
    pub fn distance_to_surface(&self, point: [f64; 3], direction: [f64; 3]) -> Option<f64> {
        match self.kind {
            SurfaceKind::XPlane { x0 } => plane_distance(x0 - point[0], direction[0]),
            SurfaceKind::YPlane { y0 } => plane_distance(y0 - point[1], direction[1]),
            SurfaceKind::ZCylinder { x0, y0, radius } => {
                // (x + t u - x0)^2 + (y + t v - y0)^2 = r^2
                let dx = point[0] - x0;
                let dy = point[1] - y0;
                let a = direction[0] * direction[0] + direction[1] * direction[1];
                if a < 1e-12 {
                    return None;
                }
                let b = 2.0 * (dx * direction[0] + dy * direction[1]);
                let c = dx * dx + dy * dy - radius * radius;
                let disc = b * b - 4.0 * a * c;
                if disc < 0.0 {
                    return None;
                }
                let sqrt_disc = disc.sqrt();
                let t1 = (-b - sqrt_disc) / (2.0 * a);
                let t2 = (-b + sqrt_disc) / (2.0 * a);
                if t1 > ON_SURFACE_THRESHOLD {
                    Some(t1)
                } else if t2 > ON_SURFACE_THRESHOLD {
                    Some(t2)
                } else {
                    None
                }
            }
        }
    }

    /// Gradient of [`Surface::evaluate`] at `point`, pointing to the positive side.
    pub fn normal(&self, point: [f64; 3]) -> [f64; 3] {
        match self.kind {
            SurfaceKind::XPlane { .. } => [1.0, 0.0, 0.0],
            SurfaceKind::YPlane { .. } => [0.0, 1.0, 0.0],
            SurfaceKind::ZCylinder { x0, y0, .. } => [point[0] - x0, point[1] - y0, 0.0],
        }
    }

    /// Mirror `direction` about the surface normal at `point`.
    pub fn reflect(&self, point: [f64; 3], direction: [f64; 3]) -> [f64; 3] {
        match self.kind {
            SurfaceKind::XPlane { .. } => [-direction[0], direction[1], direction[2]],
            SurfaceKind::YPlane { .. } => [direction[0], -direction[1], direction[2]],
            SurfaceKind::ZCylinder { x0, y0, .. } => {
                let nx = point[0] - x0;
                let ny = point[1] - y0;
                let norm = (nx * nx + ny * ny).sqrt();
                if norm == 0.0 {
                    return direction;
                }
                let (nx, ny) = (nx / norm, ny / norm);
                let dot = direction[0] * nx + direction[1] * ny;
                [
                    direction[0] - 2.0 * dot * nx,
                    direction[1] - 2.0 * dot * ny,
                    direction[2],
                ]
            }
        }
    }

    pub fn radius(&self) -> Option<f64> {
        match self.kind {
            SurfaceKind::ZCylinder { radius, .. } => Some(radius),
            _ => None,
        }
    }
}

#[inline]
fn plane_distance(gap: f64, cosine: f64) -> Option<f64> {
    if cosine.abs() < 1e-12 {
        return None;
    }
    let t = gap / cosine;
    if t > ON_SURFACE_THRESHOLD {
        Some(t)
    } else {
        None
    }
}
