use crate::bank::ParticleBank;
use crate::error::{Error, Result};
use crate::fast_rng::FastRng;
use crate::fissioner::WATT_SPECTRUM;
use crate::geometry::Geometry;
use crate::isotope::Reaction;
use crate::neutron::Neutron;
use crate::physics::isotropic_direction;
use crate::region::Region;
use crate::settings::Settings;
use crate::tallies::bank::{BatchAccumulator, ScoreEvent, TallyBank, TallyId};
use crate::tallies::tally::Tally;
use crate::timer::Timer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Histories handed to one rayon task. Fixed so that results do not depend
/// on the number of worker threads.
const HISTORIES_PER_TASK: usize = 256;

/// Counters gathered over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTotals {
    pub histories: u64,
    pub secondaries: u64,
    pub collisions: u64,
    pub leaked: u64,
    pub truncated: u64,
}

impl AddAssign for HistoryTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.histories += rhs.histories;
        self.secondaries += rhs.secondaries;
        self.collisions += rhs.collisions;
        self.leaked += rhs.leaked;
        self.truncated += rhs.truncated;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub batches: usize,
    /// False when the run stopped at `max_batches` with a trigger still pending.
    pub converged: bool,
    pub totals: HistoryTotals,
    pub elapsed_seconds: f64,
    pub neutrons_per_second: f64,
}

/// A pin cell, its run settings and the tallies scored while it runs.
pub struct Model {
    pub geometry: Geometry,
    pub settings: Settings,
    pub tallies: TallyBank,
}

impl Model {
    pub fn new(geometry: Geometry, settings: Settings) -> Self {
        Model {
            geometry,
            settings,
            tallies: TallyBank::new(),
        }
    }

    pub fn add_tally(&mut self, tally: Tally) -> Result<TallyId> {
        self.tallies.register(tally)
    }

    pub fn tally(&self, id: TallyId) -> Option<&Tally> {
        self.tallies.get(id)
    }

    /// Run rounds of batches until every triggered tally converges or
    /// `max_batches` is reached. Statistics left on the tallies are per source
    /// history and, for spatial domains, per unit volume.
    ///
    /// Every run starts from empty tallies, so running twice with the same
    /// settings reproduces the same results.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.settings.validate()?;
        self.geometry.validate()?;
        if self.tallies.num_batches() > 0 {
            log::debug!("clearing tallies left by a previous run");
        }
        self.tallies.reset();
        if let Some(trigger) = self.settings.trigger {
            let ids: Vec<TallyId> = self.tallies.iter().map(|(id, _)| id).collect();
            for id in ids {
                if let Some(tally) = self.tallies.get_mut(id) {
                    if tally.precision_trigger().is_none() {
                        tally.set_precision_trigger(trigger)?;
                    }
                }
            }
        }

        match self.settings.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::InvalidSettings(format!("cannot build thread pool: {}", e)))?;
                pool.install(|| self.run_rounds())
            }
            None => self.run_rounds(),
        }
    }

    fn run_rounds(&mut self) -> Result<RunSummary> {
        let settings = self.settings.clone();
        log::info!(
            "running {} histories per batch, {} batches (max {}) on {} threads",
            settings.particles,
            settings.batches,
            settings.max_batches,
            rayon::current_num_threads()
        );

        let mut timer = Timer::new();
        timer.start();
        let mut totals = HistoryTotals::default();
        let mut batch = 0;
        let mut target = settings.batches;
        let converged = loop {
            while batch < target {
                let batch_totals = self.run_batch(batch)?;
                log::debug!(
                    "batch {} done: {} collisions, {} leaked",
                    batch + 1,
                    batch_totals.collisions,
                    batch_totals.leaked
                );
                totals += batch_totals;
                batch += 1;
            }
            timer.record_split(format!("{} batches", batch));
            self.tallies
                .compute_scaled_batch_statistics(settings.particles, &self.geometry);
            if !self.tallies.is_precision_triggered() {
                break true;
            }
            if batch >= settings.max_batches {
                log::warn!(
                    "precision trigger still pending at the limit of {} batches",
                    settings.max_batches
                );
                break false;
            }
            target = (target + settings.batches).min(settings.max_batches);
            log::info!(
                "precision trigger pending after {} batches, running to {}",
                batch,
                target
            );
        };
        timer.stop();

        let neutrons = totals.histories + totals.secondaries;
        let summary = RunSummary {
            batches: batch,
            converged,
            totals,
            elapsed_seconds: timer.seconds(),
            neutrons_per_second: timer.rate(neutrons as usize),
        };
        log::info!(
            "finished {} batches in {:.3} s ({:.0} neutrons/s)",
            summary.batches,
            summary.elapsed_seconds,
            summary.neutrons_per_second
        );
        Ok(summary)
    }

    /// Run one batch in parallel and fold the worker sums into the tallies.
    fn run_batch(&mut self, batch: usize) -> Result<HistoryTotals> {
        let particles = self.settings.particles;
        let tasks: Vec<(usize, usize)> = (0..particles)
            .step_by(HISTORIES_PER_TASK)
            .map(|start| (start, (start + HISTORIES_PER_TASK).min(particles)))
            .collect();

        let results = {
            let this = &*self;
            tasks
                .par_iter()
                .map(|&(start, end)| this.run_histories(batch, start, end))
                .collect::<Result<Vec<_>>>()?
        };

        let mut totals = HistoryTotals::default();
        for (acc, task_totals) in results {
            self.tallies.merge(acc)?;
            totals += task_totals;
        }
        self.tallies.end_batch();
        Ok(totals)
    }

    fn run_histories(&self, batch: usize, start: usize, end: usize) -> Result<(BatchAccumulator, HistoryTotals)> {
        let mut acc = self.tallies.new_accumulator();
        let mut totals = HistoryTotals::default();
        let first_id = (batch * self.settings.particles) as u64;
        for h in start..end {
            let mut rng = FastRng::for_history(self.settings.seed, first_id + h as u64);
            totals += self.run_history(batch, &mut rng, &mut acc)?;
        }
        Ok((acc, totals))
    }

    fn run_history(&self, batch: usize, rng: &mut FastRng, acc: &mut BatchAccumulator) -> Result<HistoryTotals> {
        let mut totals = HistoryTotals {
            histories: 1,
            ..HistoryTotals::default()
        };
        let mut bank = ParticleBank::new();
        let mut source = self.settings.source.sample(rng);
        source.batch = batch;
        bank.add_source_neutron(source);

        let emission = self.settings.fission_emission;
        let mut fission_sites: Vec<[f64; 3]> = Vec::new();
        while let Some(mut neutron) = bank.pop_neutron() {
            let outcome = self.geometry.transport(
                &mut neutron,
                rng,
                self.settings.max_events,
                |region, collision, n| {
                    let event = ScoreEvent {
                        region,
                        collision,
                        buckling_squared: self.buckling_squared(region),
                    };
                    self.tallies.score(acc, &event);
                    if emission && collision.reaction == Reaction::Fission {
                        fission_sites.push(n.position);
                    }
                },
            )?;
            totals.collisions += outcome.collisions;
            totals.leaked += outcome.leaked as u64;
            totals.truncated += outcome.truncated as u64;

            for site in fission_sites.drain(..) {
                let direction = isotropic_direction(rng);
                let energy = WATT_SPECTRUM.emit_neutron_ev(rng);
                let mut secondary = Neutron::new(site, direction, energy);
                secondary.batch = batch;
                bank.bank_secondary(secondary);
                totals.secondaries += 1;
            }
        }
        Ok(totals)
    }

    /// Region buckling, else the run setting when non-zero, else the geometry's.
    fn buckling_squared(&self, region: &Region) -> f64 {
        region.buckling_squared().unwrap_or(if self.settings.buckling_squared > 0.0 {
            self.settings.buckling_squared
        } else {
            self.geometry.buckling_squared()
        })
    }
}
