//! Monte Carlo slowing-down spectra for a single fuel pin, with batch
//! statistics on energy-binned tallies.

pub mod bank;
pub mod error;
pub mod fast_rng;
pub mod fissioner;
pub mod geometry;
pub mod isotope;
pub mod material;
pub mod model;
pub mod neutron;
pub mod physics;
pub mod region;
pub mod settings;
pub mod source;
pub mod stats;
pub mod surface;
pub mod tallies;
pub mod thermal;
pub mod timer;
pub mod utilities;
pub mod xs_reader;

pub use bank::ParticleBank;
pub use error::{Error, Result};
pub use fast_rng::FastRng;
pub use fissioner::{Fissioner, WATT_SPECTRUM};
pub use geometry::{EquivalenceParameters, Geometry, HistoryOutcome, SpatialType};
pub use isotope::{CrossSections, GridPolicy, Isotope, Reaction, XsChannel};
pub use material::{DensityUnit, Material};
pub use model::{HistoryTotals, Model, RunSummary};
pub use neutron::Neutron;
pub use physics::ScatterKinematics;
pub use region::{Collision, HalfspaceType, Region, RegionEvent, RegionKind};
pub use settings::Settings;
pub use source::IndependentSource;
pub use stats::{AngularDistribution, EnergyDistribution};
pub use surface::{BoundaryType, Surface, SurfaceKind};
pub use tallies::{
    BatchAccumulator, BinEdges, BinSpacing, BinSpec, ScoreEvent, Statistics, Tally, TallyBank,
    TallyDomain, TallyFactory, TallyId, TallySummary, TallyType, Trigger, TriggerType,
};
pub use thermal::ThermalScattering;
pub use timer::Timer;
pub use utilities::Interpolation;
pub use xs_reader::IsotopeData;
