use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::region::{Collision, Region};
use crate::tallies::tally::{Tally, TallyDomain, TallyType};
use std::sync::Arc;

/// One collision, as seen by the tallies.
#[derive(Debug, Clone, Copy)]
pub struct ScoreEvent<'a> {
    pub region: &'a Arc<Region>,
    pub collision: &'a Collision,
    pub buckling_squared: f64,
}

/// Handle to a tally registered in a [`TallyBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TallyId(pub usize);

/// Worker-private per-bin sums for every registered tally.
///
/// Workers score into their own accumulator without touching the bank and the
/// accumulators are merged at the end of the batch.
#[derive(Debug, Clone)]
pub struct BatchAccumulator {
    sums: Vec<Vec<f64>>,
}

impl BatchAccumulator {
    pub fn is_empty(&self) -> bool {
        self.sums.iter().all(|s| s.iter().all(|&v| v == 0.0))
    }

    /// Sums held for `id` in the batch in progress.
    pub fn sums(&self, id: TallyId) -> Option<&[f64]> {
        self.sums.get(id.0).map(|s| s.as_slice())
    }
}

/// Registry of tallies for one run. Fans collisions out to every tally whose
/// domain matches and drives batch statistics across all of them.
#[derive(Debug, Default)]
pub struct TallyBank {
    slots: Vec<Option<Tally>>,
}

impl TallyBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tally: Tally) -> Result<TallyId> {
        if tally.is_derived() {
            return Err(Error::tally(
                tally.name(),
                "derived tallies cannot be registered for scoring",
            ));
        }
        if self.iter().any(|(_, t)| t.name() == tally.name()) {
            return Err(Error::tally(tally.name(), "a tally with this name is already registered"));
        }
        log::debug!("registered tally {} ({})", tally.name(), tally.tally_type());
        self.slots.push(Some(tally));
        Ok(TallyId(self.slots.len() - 1))
    }

    /// Remove a tally, handing it back. Other ids stay valid.
    pub fn deregister(&mut self, id: TallyId) -> Option<Tally> {
        self.slots.get_mut(id.0).and_then(|slot| slot.take())
    }

    pub fn get(&self, id: TallyId) -> Option<&Tally> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: TallyId) -> Option<&mut Tally> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    pub fn find(&self, name: &str) -> Option<(TallyId, &Tally)> {
        self.iter().find(|(_, t)| t.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TallyId, &Tally)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|t| (TallyId(i), t)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed batches, taken from the first registered tally.
    pub fn num_batches(&self) -> usize {
        self.iter().next().map(|(_, t)| t.num_batches()).unwrap_or(0)
    }

    pub fn new_accumulator(&self) -> BatchAccumulator {
        BatchAccumulator {
            sums: self
                .slots
                .iter()
                .map(|slot| slot.as_ref().map(|t| vec![0.0; t.num_bins()]).unwrap_or_default())
                .collect(),
        }
    }

    /// Score `event` into `acc` for every matching tally. Bins are chosen by the
    /// energy the neutron carried into the collision.
    pub fn score(&self, acc: &mut BatchAccumulator, event: &ScoreEvent<'_>) {
        let energy = event.collision.energy;
        for (slot, sums) in self.slots.iter().zip(acc.sums.iter_mut()) {
            let Some(tally) = slot else { continue };
            let Some(weight) = tally.score_weight(event) else {
                continue;
            };
            if let Some(bin) = tally.bin_index(energy) {
                sums[bin] += weight;
            }
        }
    }

    /// Score `event` straight into the tallies' current batch.
    pub fn tally(&mut self, event: &ScoreEvent<'_>) {
        for tally in self.slots.iter_mut().flatten() {
            if let Some(weight) = tally.score_weight(event) {
                tally.tally(event.collision.energy, weight);
            }
        }
    }

    /// Fold a worker's accumulator into the current batch.
    pub fn merge(&mut self, acc: BatchAccumulator) -> Result<()> {
        if acc.sums.len() > self.slots.len() {
            return Err(Error::tally(
                "bank",
                "accumulator was created for a different set of tallies",
            ));
        }
        for (slot, sums) in self.slots.iter_mut().zip(acc.sums) {
            if let Some(tally) = slot {
                tally.merge_batch_sums(&sums)?;
            }
        }
        Ok(())
    }

    /// Close the batch in progress for every tally.
    pub fn end_batch(&mut self) {
        for tally in self.slots.iter_mut().flatten() {
            tally.end_batch();
        }
    }

    pub fn reset(&mut self) {
        for tally in self.slots.iter_mut().flatten() {
            tally.reset();
        }
    }

    pub fn compute_batch_statistics(&mut self) {
        for tally in self.slots.iter_mut().flatten() {
            tally.compute_batch_statistics();
        }
    }

    /// Statistics per source history and, for spatial domains, per unit volume.
    pub fn compute_scaled_batch_statistics(&mut self, histories: usize, geometry: &Geometry) {
        let histories = histories.max(1) as f64;
        for tally in self.slots.iter_mut().flatten() {
            let volume = tally_volume(tally, geometry);
            tally.compute_scaled_batch_statistics(1.0 / (histories * volume));
        }
    }

    /// True while any tally with a trigger has not converged.
    pub fn is_precision_triggered(&self) -> bool {
        self.iter().any(|(_, t)| t.is_precision_triggered())
    }

    pub fn has_triggers(&self) -> bool {
        self.iter().any(|(_, t)| t.precision_trigger().is_some())
    }

    pub fn into_tallies(self) -> Vec<Tally> {
        self.slots.into_iter().flatten().collect()
    }
}

fn tally_volume(tally: &Tally, geometry: &Geometry) -> f64 {
    if tally.tally_type() == TallyType::IntercollisionTime {
        return 1.0;
    }
    let volume = match tally.domain() {
        TallyDomain::Geometry => geometry.volume(),
        TallyDomain::Region(region) => region.volume(),
        TallyDomain::Material(material) => geometry.material_volume(material),
        TallyDomain::Isotope(_) | TallyDomain::Derived => 1.0,
    };
    if volume > 0.0 {
        volume
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SpatialType;
    use crate::isotope::{Isotope, Reaction};
    use crate::material::{DensityUnit, Material};
    use crate::tallies::binning::BinEdges;
    use crate::tallies::statistics::{Trigger, TriggerType};
    use approx::assert_relative_eq;

    struct Fixture {
        hydrogen: Arc<Isotope>,
        oxygen: Arc<Isotope>,
        water: Arc<Material>,
        region: Arc<Region>,
    }

    fn fixture() -> Fixture {
        let mut h = Isotope::new("H1", 1.0).unwrap();
        h.set_elastic_xs(&[1e-5, 2e7], &[20.0, 20.0]).unwrap();
        h.set_capture_xs(&[1e-5, 2e7], &[0.3, 0.3]).unwrap();
        let mut o = Isotope::new("O16", 16.0).unwrap();
        o.set_elastic_xs(&[1e-5, 2e7], &[4.0, 4.0]).unwrap();
        let (hydrogen, oxygen) = (Arc::new(h), Arc::new(o));
        let mut water = Material::new("water");
        water.set_density(0.1, DensityUnit::AtomPerBarnCm).unwrap();
        water.add_isotope(hydrogen.clone(), 2.0).unwrap();
        water.add_isotope(oxygen.clone(), 1.0).unwrap();
        let water = Arc::new(water);
        let mut region = Region::infinite("moderator", water.clone()).unwrap();
        region.set_volume(2.0).unwrap();
        Fixture {
            hydrogen,
            oxygen,
            water,
            region: Arc::new(region),
        }
    }

    fn collision(f: &Fixture, isotope: &Arc<Isotope>, energy: f64) -> Collision {
        Collision {
            isotope: isotope.clone(),
            reaction: Reaction::Elastic,
            energy,
            macro_xs: f.water.macro_xs(energy).unwrap(),
            micro_xs: isotope.cross_sections(energy).unwrap(),
        }
    }

    fn bins() -> BinEdges {
        BinEdges::logarithmic(1e-2, 1e7, 9).unwrap()
    }

    #[test]
    fn test_register_and_deregister() {
        let f = fixture();
        let mut bank = TallyBank::new();
        let a = bank
            .register(Tally::new("a", TallyDomain::Geometry, TallyType::Flux, bins()).unwrap())
            .unwrap();
        let b = bank
            .register(
                Tally::new("b", TallyDomain::Region(f.region.clone()), TallyType::Flux, bins())
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(bank.len(), 2);
        assert!(bank
            .register(Tally::new("a", TallyDomain::Geometry, TallyType::Flux, bins()).unwrap())
            .is_err());

        let removed = bank.deregister(a).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(bank.get(a).is_none());
        assert_eq!(bank.get(b).unwrap().name(), "b");
        assert_eq!(bank.len(), 1);
        assert!(bank.deregister(a).is_none());
    }

    #[test]
    fn test_derived_tallies_are_refused() {
        let mut t = Tally::new("a", TallyDomain::Geometry, TallyType::Flux, bins()).unwrap();
        t.end_batch();
        t.compute_batch_statistics();
        let derived = t.multiply_scalar(2.0).unwrap();
        let mut bank = TallyBank::new();
        assert!(bank.register(derived).is_err());
    }

    #[test]
    fn test_domain_fan_out() {
        let f = fixture();
        let mut bank = TallyBank::new();
        let geometry = bank
            .register(Tally::new("geo", TallyDomain::Geometry, TallyType::CollisionRate, bins()).unwrap())
            .unwrap();
        let material = bank
            .register(
                Tally::new(
                    "mat",
                    TallyDomain::Material(f.water.clone()),
                    TallyType::CollisionRate,
                    bins(),
                )
                .unwrap(),
            )
            .unwrap();
        let hydrogen = bank
            .register(
                Tally::new(
                    "h",
                    TallyDomain::Isotope(f.hydrogen.clone()),
                    TallyType::ElasticRate,
                    bins(),
                )
                .unwrap(),
            )
            .unwrap();
        let other = Arc::new(Material::new("other"));
        let unrelated = bank
            .register(
                Tally::new("other", TallyDomain::Material(other), TallyType::CollisionRate, bins())
                    .unwrap(),
            )
            .unwrap();

        let mut acc = bank.new_accumulator();
        let hit_h = collision(&f, &f.hydrogen, 1.0);
        let hit_o = collision(&f, &f.oxygen, 1.0);
        for c in [&hit_h, &hit_o] {
            bank.score(
                &mut acc,
                &ScoreEvent {
                    region: &f.region,
                    collision: c,
                    buckling_squared: 0.0,
                },
            );
        }
        let bin = bins().bin_index(1.0).unwrap();
        assert_eq!(acc.sums(geometry).unwrap()[bin], 2.0);
        assert_eq!(acc.sums(material).unwrap()[bin], 2.0);
        let expected = 20.0 / hit_h.macro_xs.total();
        assert_relative_eq!(acc.sums(hydrogen).unwrap()[bin], expected);
        assert!(acc.sums(unrelated).unwrap().iter().all(|&v| v == 0.0));

        bank.merge(acc).unwrap();
        assert_eq!(bank.get(geometry).unwrap().batch_sums()[bin], 2.0);
    }

    #[test]
    fn test_merge_matches_direct_scoring() {
        let f = fixture();
        let make = || {
            let mut bank = TallyBank::new();
            bank.register(Tally::new("flux", TallyDomain::Geometry, TallyType::Flux, bins()).unwrap())
                .unwrap();
            bank
        };
        let events: Vec<Collision> = [0.1, 5.0, 3e3, 1e6]
            .iter()
            .map(|&e| collision(&f, &f.hydrogen, e))
            .collect();

        let mut direct = make();
        let mut merged = make();
        let mut first = merged.new_accumulator();
        let mut second = merged.new_accumulator();
        for (i, c) in events.iter().enumerate() {
            let event = ScoreEvent {
                region: &f.region,
                collision: c,
                buckling_squared: 0.0,
            };
            direct.tally(&event);
            if i % 2 == 0 {
                merged.score(&mut first, &event);
            } else {
                merged.score(&mut second, &event);
            }
        }
        merged.merge(first).unwrap();
        merged.merge(second).unwrap();
        let id = TallyId(0);
        assert_eq!(
            direct.get(id).unwrap().batch_sums(),
            merged.get(id).unwrap().batch_sums()
        );
    }

    #[test]
    fn test_volume_scaling() {
        let f = fixture();
        let mut geometry = Geometry::new(SpatialType::InfiniteHomogeneous);
        geometry.add_region(f.region.clone()).unwrap();

        let mut bank = TallyBank::new();
        let region = bank
            .register(
                Tally::new(
                    "region",
                    TallyDomain::Region(f.region.clone()),
                    TallyType::CollisionRate,
                    bins(),
                )
                .unwrap(),
            )
            .unwrap();
        let isotope = bank
            .register(
                Tally::new(
                    "iso",
                    TallyDomain::Isotope(f.oxygen.clone()),
                    TallyType::CollisionRate,
                    bins(),
                )
                .unwrap(),
            )
            .unwrap();
        let c = collision(&f, &f.oxygen, 1.0);
        for _ in 0..2 {
            bank.tally(&ScoreEvent {
                region: &f.region,
                collision: &c,
                buckling_squared: 0.0,
            });
            bank.end_batch();
        }
        bank.compute_scaled_batch_statistics(10, &geometry);
        let bin = bins().bin_index(1.0).unwrap();
        // one collision per batch over 10 histories in a volume of 2
        assert_relative_eq!(bank.get(region).unwrap().batch_mu().unwrap()[bin], 0.05);
        assert_relative_eq!(bank.get(isotope).unwrap().batch_mu().unwrap()[bin], 0.1);
        assert_eq!(bank.num_batches(), 2);
    }

    #[test]
    fn test_any_pending_trigger_keeps_running() {
        let f = fixture();
        let mut bank = TallyBank::new();
        let mut quiet = Tally::new("quiet", TallyDomain::Geometry, TallyType::CollisionRate, bins()).unwrap();
        quiet.set_precision_trigger(Trigger::new(TriggerType::RelativeError, 2.0)).unwrap();
        let mut noisy = Tally::new("noisy", TallyDomain::Geometry, TallyType::Flux, bins()).unwrap();
        noisy.set_precision_trigger(Trigger::new(TriggerType::RelativeError, 1e-6)).unwrap();
        bank.register(quiet).unwrap();
        bank.register(noisy).unwrap();
        assert!(bank.has_triggers());
        assert!(bank.is_precision_triggered());

        for energy in [1.0, 1.0, 1e5] {
            let c = collision(&f, &f.hydrogen, energy);
            bank.tally(&ScoreEvent {
                region: &f.region,
                collision: &c,
                buckling_squared: 0.0,
            });
            bank.end_batch();
        }
        bank.compute_batch_statistics();
        assert!(bank.is_precision_triggered());
        bank.deregister(TallyId(1));
        assert!(!bank.is_precision_triggered());
    }
}
