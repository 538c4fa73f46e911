use thiserror::Error;

/// Errors raised while building or running a pin-cell simulation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("energy {energy:e} eV is outside the tabulated range [{min:e}, {max:e}] of isotope {isotope}")]
    EnergyOutOfRange {
        isotope: String,
        energy: f64,
        min: f64,
        max: f64,
    },

    #[error("tallies {left} and {right} do not share a bin layout: {reason}")]
    IncompatibleLayout {
        left: String,
        right: String,
        reason: String,
    },

    #[error("no valid reaction in {context} at {energy:e} eV (total cross section is zero)")]
    NoValidReaction { context: String, energy: f64 },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid region {name}: {message}")]
    InvalidRegion { name: String, message: String },

    #[error("invalid material {name}: {message}")]
    InvalidMaterial { name: String, message: String },

    #[error("invalid isotope {name}: {message}")]
    InvalidIsotope { name: String, message: String },

    #[error("invalid tally bins: {0}")]
    InvalidBins(String),

    #[error("invalid tally {name}: {message}")]
    InvalidTally { name: String, message: String },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("neutron lost at ({x}, {y}, {z}): {message}")]
    LostNeutron {
        x: f64,
        y: f64,
        z: f64,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn region(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidRegion {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn material(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidMaterial {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn isotope(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidIsotope {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn tally(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidTally {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn lost(position: [f64; 3], message: impl Into<String>) -> Self {
        Error::LostNeutron {
            x: position[0],
            y: position[1],
            z: position[2],
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
