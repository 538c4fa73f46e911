use crate::error::{Error, Result};
use crate::fast_rng::STREAM_STRIDE;
use crate::source::IndependentSource;
use crate::tallies::statistics::Trigger;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_HISTORIES: usize = 10_000;
pub const DEFAULT_BATCHES: usize = 10;
pub const DEFAULT_MAX_BATCHES: usize = 1000;
pub const DEFAULT_SEED: u64 = 1;
/// Collisions plus surface crossings allowed in one history
pub const DEFAULT_MAX_EVENTS: u64 = 100_000;
/// Largest event cap whose random draws fit inside one history's stream, allowing
/// generously for the draws of each event and for fission secondaries
pub const MAX_EVENTS_LIMIT: u64 = STREAM_STRIDE / 1024;
/// Histories a run may start before their streams wrap the generator period
pub const MAX_RUN_HISTORIES: u64 = u64::MAX / STREAM_STRIDE;

/// Run control for a [`crate::model::Model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Source histories per batch
    pub particles: usize,
    /// Batches per round; further rounds run while a trigger is pending
    pub batches: usize,
    pub max_batches: usize,
    pub seed: u64,
    /// Worker threads; None uses rayon's global pool
    pub threads: Option<usize>,
    /// Applied to regions that carry no buckling of their own
    pub buckling_squared: f64,
    pub source: IndependentSource,
    /// Follow fission neutrons as secondaries of the history that produced them
    pub fission_emission: bool,
    pub max_events: u64,
    /// Applied to every registered tally that has no trigger of its own
    pub trigger: Option<Trigger>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            particles: DEFAULT_HISTORIES,
            batches: DEFAULT_BATCHES,
            max_batches: DEFAULT_MAX_BATCHES,
            seed: DEFAULT_SEED,
            threads: None,
            buckling_squared: 0.0,
            source: IndependentSource::default(),
            fission_emission: false,
            max_events: DEFAULT_MAX_EVENTS,
            trigger: None,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.particles == 0 {
            return Err(Error::InvalidSettings(
                "at least one history per batch is required".to_string(),
            ));
        }
        if self.batches < 2 {
            return Err(Error::InvalidSettings(format!(
                "at least 2 batches are needed for batch statistics, got {}",
                self.batches
            )));
        }
        if self.max_batches < self.batches {
            return Err(Error::InvalidSettings(format!(
                "max_batches ({}) is below batches ({})",
                self.max_batches, self.batches
            )));
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidSettings("threads must be positive".to_string()));
        }
        if self.max_events == 0 || self.max_events > MAX_EVENTS_LIMIT {
            return Err(Error::InvalidSettings(format!(
                "max_events must lie in 1..={}, got {}",
                MAX_EVENTS_LIMIT, self.max_events
            )));
        }
        let histories = (self.particles as u64).saturating_mul(self.max_batches as u64);
        if histories > MAX_RUN_HISTORIES {
            return Err(Error::InvalidSettings(format!(
                "{} histories per batch over {} batches exceed the {} independent random streams",
                self.particles, self.max_batches, MAX_RUN_HISTORIES
            )));
        }
        if !self.buckling_squared.is_finite() || self.buckling_squared < 0.0 {
            return Err(Error::InvalidSettings(format!(
                "buckling squared must be finite and non-negative, got {}",
                self.buckling_squared
            )));
        }
        if let Some(trigger) = &self.trigger {
            if !(trigger.precision > 0.0) {
                return Err(Error::InvalidSettings(format!(
                    "trigger precision must be positive, got {}",
                    trigger.precision
                )));
            }
        }
        Ok(())
    }
}
