// Elastic scattering kinematics for a target at rest

use nalgebra::Vector3;
use rand::Rng;
use std::f64::consts::PI;

/// Energy below which the free-gas thermal kernel replaces target-at-rest scattering (eV)
pub const THERMAL_CUTOFF: f64 = 4.0;

/// How an elastic collision updates the neutron.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatterKinematics {
    /// Energy only: E' uniform on [alpha E, E]. Used where no spatial state is tracked.
    Asymptotic,
    /// Isotropic in the centre-of-mass frame, updating energy and direction.
    CenterOfMass,
}

/// Collision parameter alpha = ((A - 1) / (A + 1))^2
pub fn alpha(a: f64) -> f64 {
    ((a - 1.0) / (a + 1.0)).powi(2)
}

/// Lab-frame scattering cosine for a centre-of-mass cosine `mu_cm`.
pub fn lab_cosine(a: f64, mu_cm: f64) -> f64 {
    let denom = (a * a + 2.0 * a * mu_cm + 1.0).sqrt();
    if denom == 0.0 {
        // A = 1 head-on: the neutron stops, direction is irrelevant
        return 0.0;
    }
    ((1.0 + a * mu_cm) / denom).clamp(-1.0, 1.0)
}

/// Ratio E'/E for target-at-rest elastic scattering with centre-of-mass cosine `mu_cm`.
pub fn cm_energy_ratio(a: f64, mu_cm: f64) -> f64 {
    (a * a + 2.0 * a * mu_cm + 1.0) / ((a + 1.0) * (a + 1.0))
}

/// Outgoing energy uniform on [alpha E, E].
pub fn asymptotic_energy(energy: f64, alpha: f64, rng: &mut (impl Rng + ?Sized)) -> f64 {
    let xi: f64 = rng.gen();
    energy * (alpha + (1.0 - alpha) * xi)
}

/// Rotate a direction vector so the new direction has cosine `mu` with the old one
/// and azimuth `phi` about it.
pub fn rotate_direction_3d(u_old: &Vector3<f64>, mu: f64, phi: f64) -> Vector3<f64> {
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();

    let perp = if u_old.x.abs() < 0.99 {
        Vector3::new(1.0, 0.0, 0.0).cross(u_old).normalize()
    } else {
        Vector3::new(0.0, 1.0, 0.0).cross(u_old).normalize()
    };
    let ortho = u_old.cross(&perp);

    mu * u_old + sin_theta * phi.cos() * perp + sin_theta * phi.sin() * ortho
}

/// Scatter `direction` through a lab cosine `mu_lab` with a uniformly sampled azimuth.
pub fn scatter_direction(direction: [f64; 3], mu_lab: f64, rng: &mut (impl Rng + ?Sized)) -> [f64; 3] {
    let phi = 2.0 * PI * rng.gen::<f64>();
    let old = Vector3::from_row_slice(&direction);
    let new = rotate_direction_3d(&old, mu_lab, phi).normalize();
    [new.x, new.y, new.z]
}

/// Isotropically distributed unit vector.
pub fn isotropic_direction(rng: &mut (impl Rng + ?Sized)) -> [f64; 3] {
    let mu = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = 2.0 * PI * rng.gen::<f64>();
    let sin_theta = (1.0 - mu * mu).sqrt();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), mu]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rotate_preserves_norm_and_cosine() {
        let u = Vector3::new(0.0, 0.0, 1.0);
        let v = rotate_direction_3d(&u, 0.5, 1.3);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.dot(&u), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_scatter_direction_keeps_unit_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut dir = [1.0, 0.0, 0.0];
        for _ in 0..100 {
            let mu: f64 = rng.gen_range(-1.0..1.0);
            let new = scatter_direction(dir, mu, &mut rng);
            let dot = new[0] * dir[0] + new[1] * dir[1] + new[2] * dir[2];
            assert_relative_eq!(dot, mu, epsilon = 1e-9);
            dir = new;
        }
    }

    #[test]
    fn test_kinematics_limits() {
        // forward scattering loses no energy, backscatter leaves alpha E
        let a = 12.0;
        assert_relative_eq!(cm_energy_ratio(a, 1.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cm_energy_ratio(a, -1.0), alpha(a), epsilon = 1e-12);
        assert_relative_eq!(lab_cosine(a, 1.0), 1.0, epsilon = 1e-12);
        // hydrogen never scatters backwards in the lab
        assert!(lab_cosine(1.0, -0.999) >= 0.0);
        assert_eq!(alpha(1.0), 0.0);
    }

    #[test]
    fn test_asymptotic_energy_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let alpha = alpha(16.0);
        for _ in 0..1000 {
            let e = asymptotic_energy(100.0, alpha, &mut rng);
            assert!(e >= alpha * 100.0 && e <= 100.0);
        }
    }

    #[test]
    fn test_isotropic_direction_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        let n = 20000;
        let mut sum = [0.0; 3];
        for _ in 0..n {
            let d = isotropic_direction(&mut rng);
            let norm = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
            for k in 0..3 {
                sum[k] += d[k];
            }
        }
        for s in sum {
            assert!((s / n as f64).abs() < 0.02);
        }
    }
}
