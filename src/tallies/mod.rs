pub mod bank;
pub mod binning;
pub mod factory;
pub mod statistics;
pub mod tally;

pub use bank::{BatchAccumulator, ScoreEvent, TallyBank, TallyId};
pub use binning::{BinEdges, BinSpacing};
pub use factory::{BinSpec, TallyFactory};
pub use statistics::{BatchStatistics, Statistics, Trigger, TriggerType};
pub use tally::{Tally, TallyDomain, TallySummary, TallyType};
