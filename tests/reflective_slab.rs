mod common;

use common::{flat_isotope, material};
use pinspec::{
    BoundaryType, Geometry, HalfspaceType, Neutron, Region, RegionEvent, RegionKind,
    SpatialType, Surface,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn slab(boundary: BoundaryType) -> Geometry {
    let scatterer = material("graphite", flat_isotope("C12", 12.0, 4.8, 0.0, 0.0), 0.08);
    let left = Arc::new(Surface::x_plane(0.0, 1, Some(boundary)));
    let right = Arc::new(Surface::x_plane(1.0, 2, Some(boundary)));
    let region = Region::bounded(
        "slab",
        RegionKind::BoundedGeneral,
        scatterer,
        vec![HalfspaceType::Above(left), HalfspaceType::Below(right)],
    )
    .unwrap();
    let mut geometry = Geometry::new(SpatialType::Heterogeneous);
    geometry.add_region(Arc::new(region)).unwrap();
    geometry.validate().unwrap();
    geometry
}

#[test]
fn test_reflective_slab_never_leaks() {
    let geometry = slab(BoundaryType::Reflective);
    let mut rng = StdRng::seed_from_u64(99);
    for i in 0..200 {
        let direction = pinspec::physics::isotropic_direction(&mut rng);
        let mut neutron = Neutron::new([0.5, 0.0, 0.0], direction, 1e6);
        let mut collisions = 0;
        let outcome = geometry
            .transport(&mut neutron, &mut rng, 400, |_, _, n| {
                collisions += 1;
                assert!(n.position[0] > -1e-4 && n.position[0] < 1.0 + 1e-4);
            })
            .unwrap();
        assert!(!outcome.leaked, "history {} leaked", i);
        assert!(outcome.truncated);
        assert_eq!(outcome.collisions, collisions);
    }
}

#[test]
fn test_vacuum_slab_leaks() {
    let geometry = slab(BoundaryType::Vacuum);
    let mut rng = StdRng::seed_from_u64(5);
    let mut leaked = 0;
    for _ in 0..200 {
        let direction = pinspec::physics::isotropic_direction(&mut rng);
        let mut neutron = Neutron::new([0.5, 0.0, 0.0], direction, 1e6);
        let outcome = geometry.transport(&mut neutron, &mut rng, 100_000, |_, _, _| {}).unwrap();
        assert!(!neutron.alive);
        if outcome.leaked {
            leaked += 1;
        }
    }
    // a scattering-only slab loses every neutron through its faces
    assert_eq!(leaked, 200);
}

#[test]
fn test_reflection_mirrors_normal_component() {
    let plane = Surface::x_plane(1.0, 1, Some(BoundaryType::Reflective));
    let d = [0.6, 0.48, 0.64];
    let r = plane.reflect([1.0, 0.2, 0.3], d);
    assert!((r[0] + 0.6).abs() < 1e-12);
    assert!((r[1] - 0.48).abs() < 1e-12);
    assert!((r[2] - 0.64).abs() < 1e-12);

    let cylinder = Surface::z_cylinder(0.0, 0.0, 1.0, 2, Some(BoundaryType::Reflective));
    let r = cylinder.reflect([1.0, 0.0, 0.0], d);
    assert!((r[0] + 0.6).abs() < 1e-12);
    assert!((r[1] - 0.48).abs() < 1e-12);
    assert!((r[2] - 0.64).abs() < 1e-12);
}

#[test]
fn test_region_reflects_at_boundary() {
    // thin, nearly transparent slab so the wall is reached before a collision
    let thin = material("thin", flat_isotope("He4", 4.0, 1e-6, 0.0, 0.0), 1e-6);
    let left = Arc::new(Surface::x_plane(0.0, 1, Some(BoundaryType::Reflective)));
    let right = Arc::new(Surface::x_plane(1.0, 2, Some(BoundaryType::Reflective)));
    let region = Region::bounded(
        "gap",
        RegionKind::BoundedGeneral,
        thin,
        vec![HalfspaceType::Above(left), HalfspaceType::Below(right)],
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let mut neutron = Neutron::new([0.5, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0);
    let event = region.collide_neutron(&mut neutron, &mut rng).unwrap();
    assert!(matches!(event, RegionEvent::Reflected));
    assert!(neutron.direction[0] < 0.0);
    assert!(region.contains(neutron.position));
}

fn reflective_box(scatterer: std::sync::Arc<pinspec::Material>) -> Region {
    let reflective = Some(BoundaryType::Reflective);
    Region::bounded(
        "box",
        RegionKind::BoundedGeneral,
        scatterer,
        vec![
            HalfspaceType::Above(Arc::new(Surface::x_plane(0.0, 1, reflective))),
            HalfspaceType::Below(Arc::new(Surface::x_plane(1.0, 2, reflective))),
            HalfspaceType::Above(Arc::new(Surface::y_plane(0.0, 3, reflective))),
            HalfspaceType::Below(Arc::new(Surface::y_plane(1.0, 4, reflective))),
        ],
    )
    .unwrap()
}

#[test]
fn test_corner_reflection_stays_inside_box() {
    let thin = material("thin", flat_isotope("He4", 4.0, 1e-6, 0.0, 0.0), 1e-6);
    let region = reflective_box(thin);
    let mut rng = StdRng::seed_from_u64(4);
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let mut neutron = Neutron::new([0.5, 0.5, 0.0], [h, h, 0.0], 1.0);

    let event = region.collide_neutron(&mut neutron, &mut rng).unwrap();
    assert!(matches!(event, RegionEvent::Reflected));
    // both walls meet at the corner, so both components flip
    assert!(neutron.direction[0] < 0.0 && neutron.direction[1] < 0.0);
    for _ in 0..40 {
        let event = region.collide_neutron(&mut neutron, &mut rng).unwrap();
        assert!(matches!(event, RegionEvent::Reflected));
        assert!(region.contains(neutron.position), "escaped to {:?}", neutron.position);
    }
}

#[test]
fn test_reflective_box_never_leaks() {
    let scatterer = material("graphite", flat_isotope("C12", 12.0, 4.8, 0.0, 0.0), 0.08);
    let mut geometry = Geometry::new(SpatialType::Heterogeneous);
    geometry.add_region(Arc::new(reflective_box(scatterer))).unwrap();
    geometry.validate().unwrap();
    let mut rng = StdRng::seed_from_u64(21);
    for _ in 0..200 {
        let direction = pinspec::physics::isotropic_direction(&mut rng);
        let mut neutron = Neutron::new([0.5, 0.5, 0.0], direction, 1e6);
        let outcome = geometry
            .transport(&mut neutron, &mut rng, 400, |region, _, n| {
                assert!(region.contains(n.position));
            })
            .unwrap();
        assert!(!outcome.leaked);
        assert!(outcome.truncated);
    }
}
