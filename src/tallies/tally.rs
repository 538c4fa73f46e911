use crate::error::{Error, Result};
use crate::isotope::{CrossSections, Isotope, XsChannel};
use crate::material::Material;
use crate::region::Region;
use crate::tallies::bank::ScoreEvent;
use crate::tallies::binning::{BinEdges, BinSpacing};
use crate::tallies::statistics::{BatchStatistics, Statistics, Trigger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Speed of light (m/s)
pub const LIGHT_SPEED: f64 = 299_792_458.0;
/// Neutron rest mass energy (eV)
pub const NEUTRON_MASS: f64 = 939_565_378.0;

/// What a tally scores at each collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyType {
    CollisionRate,
    Flux,
    ElasticRate,
    AbsorptionRate,
    CaptureRate,
    FissionRate,
    TransportRate,
    DiffusionRate,
    LeakageRate,
    IntercollisionTime,
}

impl TallyType {
    pub const ALL: [TallyType; 10] = [
        TallyType::CollisionRate,
        TallyType::Flux,
        TallyType::ElasticRate,
        TallyType::AbsorptionRate,
        TallyType::CaptureRate,
        TallyType::FissionRate,
        TallyType::TransportRate,
        TallyType::DiffusionRate,
        TallyType::LeakageRate,
        TallyType::IntercollisionTime,
    ];

    fn channel(&self) -> Option<XsChannel> {
        match self {
            TallyType::ElasticRate => Some(XsChannel::Elastic),
            TallyType::AbsorptionRate => Some(XsChannel::Absorption),
            TallyType::CaptureRate => Some(XsChannel::Capture),
            TallyType::FissionRate => Some(XsChannel::Fission),
            TallyType::TransportRate => Some(XsChannel::Transport),
            _ => None,
        }
    }

    /// Collision-estimator weight for a collision at `energy` where the collision
    /// material has cross sections `macro_xs` and the scored domain has `domain_xs`.
    pub fn weight(&self, energy: f64, macro_xs: &CrossSections, domain_xs: &CrossSections, buckling_squared: f64) -> f64 {
        let sigma_t = macro_xs.total();
        if sigma_t <= 0.0 {
            return 0.0;
        }
        match self {
            TallyType::CollisionRate => 1.0,
            TallyType::Flux => 1.0 / sigma_t,
            TallyType::DiffusionRate => {
                if domain_xs.transport <= 0.0 {
                    0.0
                } else {
                    1.0 / (3.0 * domain_xs.transport) / sigma_t
                }
            }
            TallyType::LeakageRate => {
                if macro_xs.transport <= 0.0 {
                    0.0
                } else {
                    buckling_squared / (3.0 * macro_xs.transport * sigma_t)
                }
            }
            TallyType::IntercollisionTime => {
                // mean free path in metres over speed in m/s
                let distance = (1.0 / sigma_t) * 1e-2;
                let velocity = LIGHT_SPEED * (2.0 * energy / NEUTRON_MASS).sqrt();
                if velocity > 0.0 {
                    distance / velocity
                } else {
                    0.0
                }
            }
            rate => rate
                .channel()
                .map(|c| domain_xs.get(c) / sigma_t)
                .unwrap_or(0.0),
        }
    }
}

impl fmt::Display for TallyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TallyType::CollisionRate => "collision rate",
            TallyType::Flux => "flux",
            TallyType::ElasticRate => "elastic rate",
            TallyType::AbsorptionRate => "absorption rate",
            TallyType::CaptureRate => "capture rate",
            TallyType::FissionRate => "fission rate",
            TallyType::TransportRate => "transport rate",
            TallyType::DiffusionRate => "diffusion rate",
            TallyType::LeakageRate => "leakage rate",
            TallyType::IntercollisionTime => "intercollision time",
        };
        f.write_str(name)
    }
}

/// The part of the problem a tally listens to.
#[derive(Debug, Clone)]
pub enum TallyDomain {
    Geometry,
    Region(Arc<Region>),
    Material(Arc<Material>),
    Isotope(Arc<Isotope>),
    /// Result of tally arithmetic; never scored directly.
    Derived,
}

impl TallyDomain {
    pub fn matches(&self, event: &ScoreEvent<'_>) -> bool {
        match self {
            TallyDomain::Geometry => true,
            TallyDomain::Region(r) => Arc::ptr_eq(r, event.region),
            TallyDomain::Material(m) => Arc::ptr_eq(m, event.region.material()),
            TallyDomain::Isotope(i) => Arc::ptr_eq(i, &event.collision.isotope),
            TallyDomain::Derived => false,
        }
    }

    pub fn label(&self) -> String {
        match self {
            TallyDomain::Geometry => "geometry".to_string(),
            TallyDomain::Region(r) => format!("region {}", r.name()),
            TallyDomain::Material(m) => format!("material {}", m.name()),
            TallyDomain::Isotope(i) => format!("isotope {}", i.name),
            TallyDomain::Derived => "derived".to_string(),
        }
    }
}

/// Serializable snapshot of a tally's layout and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallySummary {
    pub name: String,
    pub domain: String,
    pub tally_type: TallyType,
    pub spacing: BinSpacing,
    pub edges: Vec<f64>,
    pub centers: Vec<f64>,
    pub num_batches: usize,
    pub mu: Vec<f64>,
    pub variance: Vec<f64>,
    pub std_dev: Vec<f64>,
    pub rel_err: Vec<f64>,
}

/// An energy-binned collision estimator over one domain.
///
/// Scores land in the current batch's per-bin sums. [`Tally::end_batch`] folds
/// those sums into running batch moments and clears them; statistics are then
/// produced on demand by [`Tally::compute_batch_statistics`] or
/// [`Tally::compute_scaled_batch_statistics`].
#[derive(Debug, Clone)]
pub struct Tally {
    name: String,
    domain: TallyDomain,
    tally_type: TallyType,
    bins: BinEdges,
    trigger: Option<Trigger>,
    batch_sums: Vec<f64>,
    moments: BatchStatistics,
    statistics: Option<Statistics>,
}

impl Tally {
    pub fn new(name: impl Into<String>, domain: TallyDomain, tally_type: TallyType, bins: BinEdges) -> Result<Self> {
        let name = name.into();
        match (&domain, tally_type) {
            (TallyDomain::Derived, _) => {
                return Err(Error::tally(
                    name,
                    "derived tallies are produced by tally arithmetic only",
                ))
            }
            (
                TallyDomain::Isotope(_),
                TallyType::Flux | TallyType::LeakageRate | TallyType::IntercollisionTime,
            ) => {
                return Err(Error::tally(
                    name,
                    format!("an isotope tally cannot score {}", tally_type),
                ))
            }
            _ => {}
        }
        let num_bins = bins.num_bins();
        Ok(Tally {
            name,
            domain,
            tally_type,
            bins,
            trigger: None,
            batch_sums: vec![0.0; num_bins],
            moments: BatchStatistics::new(num_bins),
            statistics: None,
        })
    }

    fn derived(name: String, tally_type: TallyType, bins: BinEdges, statistics: Statistics) -> Self {
        let num_bins = bins.num_bins();
        Tally {
            name,
            domain: TallyDomain::Derived,
            tally_type,
            bins,
            trigger: None,
            batch_sums: vec![0.0; num_bins],
            moments: BatchStatistics::new(num_bins),
            statistics: Some(statistics),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &TallyDomain {
        &self.domain
    }

    pub fn tally_type(&self) -> TallyType {
        self.tally_type
    }

    pub fn bins(&self) -> &BinEdges {
        &self.bins
    }

    pub fn num_bins(&self) -> usize {
        self.bins.num_bins()
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        self.bins.centers()
    }

    pub fn bin_index(&self, value: f64) -> Option<usize> {
        self.bins.bin_index(value)
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.domain, TallyDomain::Derived)
    }

    /// Stop the run only once this tally's worst bin is below `trigger.precision`.
    pub fn set_precision_trigger(&mut self, trigger: Trigger) -> Result<()> {
        if !(trigger.precision > 0.0 && trigger.precision.is_finite()) {
            return Err(Error::tally(
                &self.name,
                format!("trigger precision must be positive and finite, got {}", trigger.precision),
            ));
        }
        self.trigger = Some(trigger);
        Ok(())
    }

    pub fn clear_precision_trigger(&mut self) {
        self.trigger = None;
    }

    pub fn precision_trigger(&self) -> Option<Trigger> {
        self.trigger
    }

    /// Number of completed batches.
    pub fn num_batches(&self) -> usize {
        match &self.statistics {
            Some(s) if self.is_derived() => s.num_batches,
            _ => self.moments.num_batches(),
        }
    }

    /// Score `weight` into the bin holding `value` for the current batch.
    /// Values outside the bins are dropped.
    pub fn tally(&mut self, value: f64, weight: f64) {
        if weight < 0.0 {
            log::warn!("negative weight {} scored in tally {}", weight, self.name);
        }
        if let Some(i) = self.bins.bin_index(value) {
            self.batch_sums[i] += weight;
        }
    }

    /// Weight this tally assigns to `event`, or None when the event is outside its domain.
    pub fn score_weight(&self, event: &ScoreEvent<'_>) -> Option<f64> {
        if !self.domain.matches(event) {
            return None;
        }
        let collision = event.collision;
        let domain_xs = match self.domain {
            TallyDomain::Isotope(_) => &collision.micro_xs,
            _ => &collision.macro_xs,
        };
        Some(self.tally_type.weight(
            collision.energy,
            &collision.macro_xs,
            domain_xs,
            event.buckling_squared,
        ))
    }

    /// Per-bin sums of the batch in progress.
    pub fn batch_sums(&self) -> &[f64] {
        &self.batch_sums
    }

    /// Add a worker's per-bin sums for the current batch.
    pub fn merge_batch_sums(&mut self, sums: &[f64]) -> Result<()> {
        if sums.len() != self.batch_sums.len() {
            return Err(Error::IncompatibleLayout {
                left: self.name.clone(),
                right: "batch accumulator".to_string(),
                reason: format!("{} bins against {}", self.batch_sums.len(), sums.len()),
            });
        }
        for (total, s) in self.batch_sums.iter_mut().zip(sums) {
            *total += s;
        }
        Ok(())
    }

    /// Close the current batch: fold its sums into the batch moments and reset them.
    pub fn end_batch(&mut self) {
        self.moments.push(&self.batch_sums);
        self.batch_sums.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Discard all scores and statistics.
    pub fn reset(&mut self) {
        self.batch_sums.iter_mut().for_each(|s| *s = 0.0);
        self.moments.reset();
        if !self.is_derived() {
            self.statistics = None;
        }
    }

    /// Mean, variance, standard deviation and relative error of the batch totals.
    pub fn compute_batch_statistics(&mut self) -> &Statistics {
        if !self.is_derived() {
            self.statistics = Some(self.moments.compute());
        }
        self.statistics.get_or_insert_with(Statistics::default)
    }

    /// As [`Tally::compute_batch_statistics`], with means multiplied by `scale`
    /// and variances by `scale^2`.
    pub fn compute_scaled_batch_statistics(&mut self, scale: f64) -> &Statistics {
        if !self.is_derived() {
            self.statistics = Some(self.moments.compute().scaled(scale));
        }
        self.statistics.get_or_insert_with(Statistics::default)
    }

    /// Statistics from the most recent computation, if any.
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    fn require_statistics(&self) -> Result<&Statistics> {
        self.statistics.as_ref().ok_or_else(|| {
            Error::tally(&self.name, "batch statistics have not been computed")
        })
    }

    pub fn batch_mu(&self) -> Option<&[f64]> {
        self.statistics.as_ref().map(|s| s.mu.as_slice())
    }

    pub fn batch_variance(&self) -> Option<&[f64]> {
        self.statistics.as_ref().map(|s| s.variance.as_slice())
    }

    pub fn batch_std_dev(&self) -> Option<&[f64]> {
        self.statistics.as_ref().map(|s| s.std_dev.as_slice())
    }

    pub fn batch_rel_err(&self) -> Option<&[f64]> {
        self.statistics.as_ref().map(|s| s.rel_err.as_slice())
    }

    pub fn max_mu(&self) -> f64 {
        max_of(self.batch_mu())
    }

    pub fn max_variance(&self) -> f64 {
        max_of(self.batch_variance())
    }

    pub fn max_std_dev(&self) -> f64 {
        max_of(self.batch_std_dev())
    }

    pub fn max_rel_err(&self) -> f64 {
        max_of(self.batch_rel_err())
    }

    /// Divide every mean by the largest one, scaling the spread to match.
    pub fn normalize_batch_mu(&mut self) -> Result<()> {
        let max = self.max_mu();
        if max <= 0.0 {
            return Err(Error::tally(
                &self.name,
                "cannot normalise a tally whose largest mean is not positive",
            ));
        }
        let stats = self.require_statistics()?;
        self.statistics = Some(stats.scaled(1.0 / max));
        Ok(())
    }

    /// True while this tally's trigger is set and not yet satisfied. Tallies
    /// without statistics have not converged.
    pub fn is_precision_triggered(&self) -> bool {
        match (&self.trigger, &self.statistics) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(trigger), Some(stats)) => trigger.is_triggered(stats),
        }
    }

    fn check_layout(&self, other: &Tally) -> Result<()> {
        let incompatible = |reason: String| Error::IncompatibleLayout {
            left: self.name.clone(),
            right: other.name.clone(),
            reason,
        };
        if self.bins.num_bins() != other.bins.num_bins() {
            return Err(incompatible(format!(
                "{} bins against {}",
                self.bins.num_bins(),
                other.bins.num_bins()
            )));
        }
        if self.bins.spacing() != other.bins.spacing() {
            return Err(incompatible(format!(
                "{:?} spacing against {:?}",
                self.bins.spacing(),
                other.bins.spacing()
            )));
        }
        if !self.bins.same_layout(&other.bins) {
            return Err(incompatible("bin edges differ".to_string()));
        }
        Ok(())
    }

    fn combine<F>(&self, other: &Tally, symbol: &str, op: F) -> Result<Tally>
    where
        F: Fn(f64, f64, f64, f64) -> (f64, f64),
    {
        self.check_layout(other)?;
        let (a, b) = (self.require_statistics()?, other.require_statistics()?);
        let (mu, variance): (Vec<f64>, Vec<f64>) = (0..a.num_bins())
            .map(|i| op(a.mu[i], a.variance[i], b.mu[i], b.variance[i]))
            .unzip();
        let stats = Statistics::from_moments(a.num_batches.min(b.num_batches), mu, variance);
        Ok(Tally::derived(
            format!("{} {} {}", self.name, symbol, other.name),
            self.tally_type,
            self.bins.clone(),
            stats,
        ))
    }

    fn combine_scalar<F>(&self, scalar: f64, symbol: &str, op: F) -> Result<Tally>
    where
        F: Fn(f64, f64) -> (f64, f64),
    {
        let a = self.require_statistics()?;
        let (mu, variance): (Vec<f64>, Vec<f64>) =
            a.mu.iter().zip(&a.variance).map(|(&m, &v)| op(m, v)).unzip();
        Ok(Tally::derived(
            format!("{} {} {}", self.name, symbol, scalar),
            self.tally_type,
            self.bins.clone(),
            Statistics::from_moments(a.num_batches, mu, variance),
        ))
    }

    /// Bin-wise sum; variances add.
    pub fn add(&self, other: &Tally) -> Result<Tally> {
        self.combine(other, "+", |m1, v1, m2, v2| (m1 + m2, v1 + v2))
    }

    /// Bin-wise difference; variances add.
    pub fn subtract(&self, other: &Tally) -> Result<Tally> {
        self.combine(other, "-", |m1, v1, m2, v2| (m1 - m2, v1 + v2))
    }

    /// Bin-wise product with first-order error propagation.
    pub fn multiply(&self, other: &Tally) -> Result<Tally> {
        self.combine(other, "*", |m1, v1, m2, v2| {
            (m1 * m2, m1 * m1 * v2 + m2 * m2 * v1 + v1 * v2)
        })
    }

    /// Bin-wise quotient with second-order bias correction on the mean.
    /// Bins where the divisor mean is zero come out as zero.
    pub fn divide(&self, other: &Tally) -> Result<Tally> {
        self.combine(other, "/", |m1, v1, m2, v2| {
            if m2 == 0.0 {
                log::warn!("zero divisor mean in tally division, bin set to zero");
                return (0.0, 0.0);
            }
            (
                m1 / m2 + m1 * v2 / m2.powi(3),
                v1 / (m2 * m2) + m1 * m1 * v2 / m2.powi(4),
            )
        })
    }

    pub fn add_scalar(&self, scalar: f64) -> Result<Tally> {
        self.combine_scalar(scalar, "+", |m, v| (m + scalar, v))
    }

    pub fn subtract_scalar(&self, scalar: f64) -> Result<Tally> {
        self.combine_scalar(scalar, "-", |m, v| (m - scalar, v))
    }

    pub fn multiply_scalar(&self, scalar: f64) -> Result<Tally> {
        self.combine_scalar(scalar, "*", |m, v| (m * scalar, v * scalar * scalar))
    }

    pub fn divide_scalar(&self, scalar: f64) -> Result<Tally> {
        if scalar == 0.0 {
            return Err(Error::tally(&self.name, "cannot divide a tally by zero"));
        }
        self.combine_scalar(scalar, "/", |m, v| (m / scalar, v / (scalar * scalar)))
    }

    pub fn summary(&self) -> TallySummary {
        let stats = self.statistics.clone().unwrap_or_else(|| Statistics {
            num_batches: self.num_batches(),
            ..Statistics::default()
        });
        TallySummary {
            name: self.name.clone(),
            domain: self.domain.label(),
            tally_type: self.tally_type,
            spacing: self.bins.spacing(),
            edges: self.bins.edges().to_vec(),
            centers: self.bins.centers(),
            num_batches: stats.num_batches,
            mu: stats.mu,
            variance: stats.variance,
            std_dev: stats.std_dev,
            rel_err: stats.rel_err,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Whitespace separated columns: bin center, mean, variance, std-dev, relative error.
    pub fn to_text(&self) -> Result<String> {
        let stats = self.require_statistics()?;
        let mut out = String::new();
        let _ = writeln!(out, "# {} ({}, {})", self.name, self.domain.label(), self.tally_type);
        let _ = writeln!(out, "# batches: {}", stats.num_batches);
        let _ = writeln!(out, "# center mu variance std_dev rel_err");
        for (i, center) in self.bins.centers().iter().enumerate() {
            let _ = writeln!(
                out,
                "{:.6e} {:.6e} {:.6e} {:.6e} {:.6e}",
                center, stats.mu[i], stats.variance[i], stats.std_dev[i], stats.rel_err[i]
            );
        }
        Ok(out)
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_text()?)?;
        Ok(())
    }
}

fn max_of(values: Option<&[f64]>) -> f64 {
    values
        .map(|v| v.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .filter(|m| m.is_finite())
        .unwrap_or(0.0)
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tally {}: {} over {}, {} {:?} bins in [{:e}, {:e}]",
            self.name,
            self.tally_type,
            self.domain.label(),
            self.num_bins(),
            self.bins.spacing(),
            self.bins.edges()[0],
            self.bins.edges()[self.num_bins()]
        )?;
        match &self.statistics {
            Some(stats) => {
                writeln!(f, "  batches: {}", stats.num_batches)?;
                write!(
                    f,
                    "  max mu {:.4e}, max std-dev {:.4e}, max rel-err {:.4e}",
                    self.max_mu(),
                    self.max_std_dev(),
                    self.max_rel_err()
                )
            }
            None => write!(f, "  no statistics computed"),
        }
    }
}
