use crate::error::Result;
use crate::geometry::Geometry;
use crate::tallies::binning::{BinEdges, BinSpacing};
use crate::tallies::tally::{Tally, TallyDomain, TallyType};
use serde::{Deserialize, Serialize};

/// How a tally's bin edges are laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "spacing", rename_all = "lowercase")]
pub enum BinSpec {
    Equal { start: f64, end: f64, num_bins: usize },
    Logarithmic { start: f64, end: f64, num_bins: usize },
    Other { edges: Vec<f64> },
}

impl BinSpec {
    pub fn spacing(&self) -> BinSpacing {
        match self {
            BinSpec::Equal { .. } => BinSpacing::Equal,
            BinSpec::Logarithmic { .. } => BinSpacing::Logarithmic,
            BinSpec::Other { .. } => BinSpacing::Other,
        }
    }

    pub fn build(&self) -> Result<BinEdges> {
        match self {
            BinSpec::Equal {
                start,
                end,
                num_bins,
            } => BinEdges::equal(*start, *end, *num_bins),
            BinSpec::Logarithmic {
                start,
                end,
                num_bins,
            } => BinEdges::logarithmic(*start, *end, *num_bins),
            BinSpec::Other { edges } => BinEdges::from_edges(edges.clone()),
        }
    }
}

/// Builds tallies for a (domain, quantity) pair, rejecting combinations that
/// cannot be scored.
pub struct TallyFactory;

impl TallyFactory {
    pub fn create(
        name: impl Into<String>,
        domain: TallyDomain,
        tally_type: TallyType,
        bins: &BinSpec,
    ) -> Result<Tally> {
        Tally::new(name, domain, tally_type, bins.build()?)
    }

    pub fn create_equal(
        name: impl Into<String>,
        domain: TallyDomain,
        tally_type: TallyType,
        start: f64,
        end: f64,
        num_bins: usize,
    ) -> Result<Tally> {
        Tally::new(name, domain, tally_type, BinEdges::equal(start, end, num_bins)?)
    }

    pub fn create_logarithmic(
        name: impl Into<String>,
        domain: TallyDomain,
        tally_type: TallyType,
        start: f64,
        end: f64,
        num_bins: usize,
    ) -> Result<Tally> {
        Tally::new(
            name,
            domain,
            tally_type,
            BinEdges::logarithmic(start, end, num_bins)?,
        )
    }

    pub fn create_with_edges(
        name: impl Into<String>,
        domain: TallyDomain,
        tally_type: TallyType,
        edges: Vec<f64>,
    ) -> Result<Tally> {
        Tally::new(name, domain, tally_type, BinEdges::from_edges(edges)?)
    }

    /// One tally per region of `geometry`, named `<prefix> <region>`.
    pub fn create_for_regions(
        prefix: &str,
        geometry: &Geometry,
        tally_type: TallyType,
        bins: &BinSpec,
    ) -> Result<Vec<Tally>> {
        geometry
            .regions()
            .iter()
            .map(|region| {
                TallyFactory::create(
                    format!("{} {}", prefix, region.name()),
                    TallyDomain::Region(region.clone()),
                    tally_type,
                    bins,
                )
            })
            .collect()
    }
}
