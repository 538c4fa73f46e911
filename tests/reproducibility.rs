mod common;

use common::{flat_isotope, hydrogen, material, resonant_absorber};
use pinspec::fast_rng::STREAM_STRIDE;
use pinspec::settings::DEFAULT_MAX_EVENTS;
use pinspec::{
    BoundaryType, FastRng, Geometry, HalfspaceType, Material, Model, Neutron, Region,
    RegionKind, Settings, SpatialType, Surface, TallyDomain, TallyFactory, TallyType,
};
use rand::RngCore;
use std::sync::Arc;

/// Counts the draws a history takes from its stream.
struct CountingRng {
    inner: FastRng,
    draws: u64,
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.draws += 1;
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws += (dest.len() as u64 + 7) / 8;
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn run(seed: u64, threads: Option<usize>) -> (Vec<f64>, Vec<f64>) {
    let mut mixture = Material::new("homogenized");
    mixture
        .set_density(0.05, pinspec::DensityUnit::AtomPerBarnCm)
        .unwrap();
    mixture.add_isotope(hydrogen(), 2.0).unwrap();
    mixture.add_isotope(resonant_absorber(), 0.01).unwrap();
    let mut geometry = Geometry::new(SpatialType::InfiniteHomogeneous);
    geometry
        .add_region(Arc::new(Region::infinite("mix", Arc::new(mixture)).unwrap()))
        .unwrap();

    let settings = Settings {
        particles: 700,
        batches: 3,
        max_batches: 3,
        seed,
        threads,
        ..Settings::default()
    };
    let mut model = Model::new(geometry, settings);
    let flux = model
        .add_tally(
            TallyFactory::create_logarithmic(
                "flux",
                TallyDomain::Geometry,
                TallyType::Flux,
                1e-2,
                1e7,
                50,
            )
            .unwrap(),
        )
        .unwrap();
    let capture = model
        .add_tally(
            TallyFactory::create_logarithmic(
                "capture",
                TallyDomain::Geometry,
                TallyType::CaptureRate,
                1e-2,
                1e7,
                50,
            )
            .unwrap(),
        )
        .unwrap();
    model.run().unwrap();
    (
        model.tally(flux).unwrap().batch_mu().unwrap().to_vec(),
        model.tally(capture).unwrap().batch_mu().unwrap().to_vec(),
    )
}

#[test]
fn test_same_seed_gives_identical_results() {
    let first = run(42, None);
    let second = run(42, None);
    assert_eq!(first, second);
}

#[test]
fn test_thread_count_does_not_change_results() {
    assert_eq!(run(42, Some(1)), run(42, Some(4)));
}

#[test]
fn test_different_seeds_differ() {
    let (a, _) = run(1, None);
    let (b, _) = run(2, None);
    assert_ne!(a, b);
}

#[test]
fn test_capped_history_stays_inside_its_stream() {
    let reflective = Some(BoundaryType::Reflective);
    let slab = Region::bounded(
        "slab",
        RegionKind::BoundedGeneral,
        material("graphite", flat_isotope("C12", 12.0, 4.8, 0.0, 0.0), 0.08),
        vec![
            HalfspaceType::Above(Arc::new(Surface::x_plane(0.0, 1, reflective))),
            HalfspaceType::Below(Arc::new(Surface::x_plane(1.0, 2, reflective))),
        ],
    )
    .unwrap();
    let mut geometry = Geometry::new(SpatialType::Heterogeneous);
    geometry.add_region(Arc::new(slab)).unwrap();

    let mut rng = CountingRng {
        inner: FastRng::for_history(1, 0),
        draws: 0,
    };
    let mut neutron = Neutron::new([0.5, 0.0, 0.0], [0.6, 0.8, 0.0], 1e6);
    let outcome = geometry
        .transport(&mut neutron, &mut rng, DEFAULT_MAX_EVENTS, |_, _, _| {})
        .unwrap();
    assert!(outcome.truncated);
    assert!(rng.draws < STREAM_STRIDE / 1000, "{} draws", rng.draws);
    assert!(Settings::default().validate().is_ok());
}
