use crate::error::{Error, Result};
use crate::utilities::{linspace, logspace};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinSpacing {
    Equal,
    Logarithmic,
    Other,
}

/// Bin edges `[E0, E1, ..., En]` defining the bins `[E0, E1), [E1, E2), ..., [En-1, En]`.
///
/// Equal and logarithmic spacings locate a bin in constant time; arbitrary
/// edges fall back to a binary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SerializedBinEdges")]
pub struct BinEdges {
    edges: Vec<f64>,
    spacing: BinSpacing,
    /// Bin width, in log10 units for logarithmic spacing
    delta: f64,
}

/// Wire form of [`BinEdges`]; the bin width is recomputed on load.
#[derive(Deserialize)]
struct SerializedBinEdges {
    edges: Vec<f64>,
    spacing: BinSpacing,
}

impl TryFrom<SerializedBinEdges> for BinEdges {
    type Error = Error;

    fn try_from(raw: SerializedBinEdges) -> Result<Self> {
        let mut bins = BinEdges::from_edges(raw.edges)?;
        let n = bins.num_bins() as f64;
        let (first, last) = (bins.edges[0], bins.edges[bins.edges.len() - 1]);
        bins.delta = match raw.spacing {
            BinSpacing::Equal => (last - first) / n,
            BinSpacing::Logarithmic => {
                if !(first > 0.0) {
                    return Err(Error::InvalidBins(
                        "logarithmic bin edges must be positive".to_string(),
                    ));
                }
                (last.log10() - first.log10()) / n
            }
            BinSpacing::Other => 0.0,
        };
        bins.spacing = raw.spacing;
        Ok(bins)
    }
}

impl BinEdges {
    /// `num_bins` bins of equal width between `start` and `end`.
    pub fn equal(start: f64, end: f64, num_bins: usize) -> Result<Self> {
        check_range(start, end, num_bins)?;
        Ok(BinEdges {
            edges: linspace(start, end, num_bins + 1),
            spacing: BinSpacing::Equal,
            delta: (end - start) / num_bins as f64,
        })
    }

    /// `num_bins` bins of equal width in log10 between `start` and `end`.
    pub fn logarithmic(start: f64, end: f64, num_bins: usize) -> Result<Self> {
        check_range(start, end, num_bins)?;
        if start <= 0.0 {
            return Err(Error::InvalidBins(format!(
                "logarithmic bins need a positive start, got {}",
                start
            )));
        }
        Ok(BinEdges {
            edges: logspace(start, end, num_bins + 1),
            spacing: BinSpacing::Logarithmic,
            delta: (end.log10() - start.log10()) / num_bins as f64,
        })
    }

    /// Arbitrary strictly ascending edges.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidBins(
                "at least 2 bin edges are required to create a bin".to_string(),
            ));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::InvalidBins("bin edges must be finite".to_string()));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidBins(
                "bin edges must be in strictly ascending order".to_string(),
            ));
        }
        Ok(BinEdges {
            edges,
            spacing: BinSpacing::Other,
            delta: 0.0,
        })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn spacing(&self) -> BinSpacing {
        self.spacing
    }

    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin midpoints; geometric midpoints for logarithmic bins.
    pub fn centers(&self) -> Vec<f64> {
        self.edges
            .windows(2)
            .map(|w| match self.spacing {
                BinSpacing::Logarithmic => (w[0] * w[1]).sqrt(),
                _ => 0.5 * (w[0] + w[1]),
            })
            .collect()
    }

    /// Bin holding `value`, or None outside `[E0, En]`. The last edge belongs to the last bin.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        let n = self.num_bins();
        let (first, last) = (self.edges[0], self.edges[n]);
        if !(value >= first && value <= last) {
            return None;
        }
        if value == last {
            return Some(n - 1);
        }
        let guess = match self.spacing {
            BinSpacing::Equal => ((value - first) / self.delta) as usize,
            BinSpacing::Logarithmic => ((value.log10() - first.log10()) / self.delta) as usize,
            BinSpacing::Other => {
                return Some(self.edges.partition_point(|&e| e <= value) - 1);
            }
        };
        // rounding in the closed-form index can land one bin off at an edge
        let mut i = guess.min(n - 1);
        if value < self.edges[i] {
            i -= 1;
        } else if value >= self.edges[i + 1] {
            i += 1;
        }
        Some(i)
    }

    /// True when both layouts have identical edges.
    pub fn same_layout(&self, other: &BinEdges) -> bool {
        self.edges == other.edges
    }
}

fn check_range(start: f64, end: f64, num_bins: usize) -> Result<()> {
    if num_bins == 0 {
        return Err(Error::InvalidBins("at least one bin is required".to_string()));
    }
    if !(start.is_finite() && end.is_finite() && end > start) {
        return Err(Error::InvalidBins(format!(
            "bin range [{}, {}] is empty or not finite",
            start, end
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_edges_validation() {
        assert!(BinEdges::from_edges(vec![1e6]).is_err());
        assert!(BinEdges::from_edges(vec![1e6, 10e6, 5e6]).is_err());
        assert!(BinEdges::from_edges(vec![1e6, 10e6, 10e6, 20e6]).is_err());
        let bins = BinEdges::from_edges(vec![0.0, 1e6, 10e6, 20e6]).unwrap();
        assert_eq!(bins.num_bins(), 3);
        assert_eq!(bins.spacing(), BinSpacing::Other);
    }

    #[test]
    fn test_deserialization_validates_edges() {
        let empty = r#"{"edges": [], "spacing": "other", "delta": 0.0}"#;
        assert!(serde_json::from_str::<BinEdges>(empty).is_err());
        let descending = r#"{"edges": [3.0, 2.0, 1.0], "spacing": "equal"}"#;
        assert!(serde_json::from_str::<BinEdges>(descending).is_err());
        let negative_log = r#"{"edges": [-1.0, 1.0], "spacing": "logarithmic"}"#;
        assert!(serde_json::from_str::<BinEdges>(negative_log).is_err());

        let bins = BinEdges::logarithmic(1e-2, 1e7, 45).unwrap();
        let back: BinEdges = serde_json::from_str(&serde_json::to_string(&bins).unwrap()).unwrap();
        assert_eq!(back.spacing(), BinSpacing::Logarithmic);
        assert_eq!(back.edges(), bins.edges());
        for value in [1e-2, 0.37, 6.67, 1e3, 2.5e6, 1e7] {
            assert_eq!(back.bin_index(value), bins.bin_index(value));
        }
    }

    #[test]
    fn test_other_bin_index() {
        let bins = BinEdges::from_edges(vec![0.0, 1e6, 10e6, 20e6]).unwrap();
        assert_eq!(bins.bin_index(0.0), Some(0));
        assert_eq!(bins.bin_index(5e5), Some(0));
        assert_eq!(bins.bin_index(1e6), Some(1));
        assert_eq!(bins.bin_index(15e6), Some(2));
        assert_eq!(bins.bin_index(20e6), Some(2));
        assert_eq!(bins.bin_index(-1.0), None);
        assert_eq!(bins.bin_index(25e6), None);
        assert_eq!(bins.bin_index(f64::NAN), None);
    }

    #[test]
    fn test_equal_bins() {
        let bins = BinEdges::equal(0.0, 10.0, 10).unwrap();
        assert_eq!(bins.num_bins(), 10);
        assert_eq!(bins.bin_index(0.0), Some(0));
        assert_eq!(bins.bin_index(3.0), Some(3));
        assert_eq!(bins.bin_index(9.99), Some(9));
        assert_eq!(bins.bin_index(10.0), Some(9));
        assert_relative_eq!(bins.centers()[0], 0.5);
    }

    #[test]
    fn test_logarithmic_bins() {
        let bins = BinEdges::logarithmic(1e-2, 1e7, 9).unwrap();
        assert_eq!(bins.num_bins(), 9);
        assert_relative_eq!(bins.edges()[1], 1e-1, epsilon = 1e-12);
        assert_eq!(bins.bin_index(1e-2), Some(0));
        assert_eq!(bins.bin_index(0.5), Some(1));
        assert_eq!(bins.bin_index(1e7), Some(8));
        assert_relative_eq!(bins.centers()[0], (1e-3f64).sqrt(), epsilon = 1e-12);
        assert!(BinEdges::logarithmic(0.0, 1.0, 3).is_err());
    }

    #[test]
    fn test_index_agrees_with_edges_everywhere() {
        for bins in [
            BinEdges::equal(0.0, 3.0, 7).unwrap(),
            BinEdges::logarithmic(1e-3, 2e7, 113).unwrap(),
        ] {
            let edges = bins.edges().to_vec();
            for (i, &e) in edges.iter().enumerate().take(edges.len() - 1) {
                assert_eq!(bins.bin_index(e), Some(i));
                let mid = 0.5 * (e + edges[i + 1]);
                assert_eq!(bins.bin_index(mid), Some(i));
            }
        }
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(BinEdges::equal(1.0, 1.0, 4).is_err());
        assert!(BinEdges::equal(0.0, 1.0, 0).is_err());
        assert!(BinEdges::equal(0.0, f64::INFINITY, 3).is_err());
    }
}
