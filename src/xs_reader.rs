//! Cross-section table input.
//!
//! Two formats are read:
//! * two-column text tables (`energy_MeV xs_barns`, first line a header), one
//!   file per channel
//! * a JSON document holding an isotope's mass and all of its channel tables,
//!   energies in eV

use crate::error::{Error, Result};
use crate::isotope::Isotope;
use crate::utilities::Interpolation;
use serde::{Deserialize, Serialize};
use std::path::Path;

const EV_PER_MEV: f64 = 1e6;

/// Parse a two-column text table, skipping the header line. Energies are
/// converted from MeV to eV.
pub fn parse_cross_sections(source: &str, text: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut energies = Vec::new();
    let mut xs = Vec::new();
    for (line_no, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut columns = line.split_whitespace().map(str::parse::<f64>);
        match (columns.next(), columns.next()) {
            (Some(Ok(e)), Some(Ok(s))) => {
                energies.push(e * EV_PER_MEV);
                xs.push(s);
            }
            _ => {
                return Err(Error::isotope(
                    source,
                    format!("line {} is not an `energy xs` pair: {:?}", line_no + 1, line),
                ))
            }
        }
    }
    if energies.is_empty() {
        return Err(Error::isotope(source, "cross section table holds no data"));
    }
    Ok((energies, xs))
}

pub fn read_cross_sections<P: AsRef<Path>>(path: P) -> Result<(Vec<f64>, Vec<f64>)> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    log::debug!("read cross sections from {}", path.display());
    parse_cross_sections(&path.display().to_string(), &text)
}

/// One channel of tabulated data, energies in eV and cross sections in barns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XsTableData {
    pub energies: Vec<f64>,
    pub xs: Vec<f64>,
}

/// Serialized isotope: mass plus the channel tables it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotopeData {
    pub name: String,
    /// Atomic mass ratio A
    pub a: f64,
    #[serde(default)]
    pub interpolation: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    pub elastic: Option<XsTableData>,
    pub capture: Option<XsTableData>,
    pub fission: Option<XsTableData>,
}

impl IsotopeData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn into_isotope(self) -> Result<Isotope> {
        let mut isotope = Isotope::new(self.name.clone(), self.a)?;
        if let Some(name) = &self.interpolation {
            let interpolation = Interpolation::from_str_option(name).ok_or_else(|| {
                Error::isotope(&self.name, format!("unknown interpolation {:?}", name))
            })?;
            isotope.set_interpolation(interpolation);
        }
        if let Some(t) = self.temperature {
            isotope.set_temperature(t)?;
        }
        if self.elastic.is_none() && self.capture.is_none() && self.fission.is_none() {
            return Err(Error::isotope(&self.name, "no cross section tables given"));
        }
        if let Some(table) = &self.elastic {
            isotope.set_elastic_xs(&table.energies, &table.xs)?;
        }
        if let Some(table) = &self.capture {
            isotope.set_capture_xs(&table.energies, &table.xs)?;
        }
        if let Some(table) = &self.fission {
            isotope.set_fission_xs(&table.energies, &table.xs)?;
        }
        Ok(isotope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_parse_text_table() {
        let text = "energy xs\n1e-11 20.0\n1.0e-6 20.5\n\n2.0e1 1.0\n";
        let (e, xs) = parse_cross_sections("h1-elastic", text).unwrap();
        assert_eq!(e.len(), 3);
        assert_relative_eq!(e[0], 1e-5);
        assert_relative_eq!(e[2], 2e7);
        assert_eq!(xs, vec![20.0, 20.5, 1.0]);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(parse_cross_sections("x", "header\n1.0 abc\n").is_err());
        assert!(parse_cross_sections("x", "header only\n").is_err());
    }

    #[test]
    fn test_read_table_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "E(MeV) sigma(b)").unwrap();
        writeln!(file, "1e-11 3.0").unwrap();
        writeln!(file, "20 3.0").unwrap();
        let (e, xs) = read_cross_sections(file.path()).unwrap();
        assert_eq!(e.len(), 2);
        assert_eq!(xs, vec![3.0, 3.0]);
    }

    #[test]
    fn test_isotope_from_json() {
        let json = r#"{
            "name": "U235",
            "a": 235.0,
            "interpolation": "log-log",
            "elastic": {"energies": [1e-5, 2e7], "xs": [15.0, 4.0]},
            "capture": {"energies": [1e-5, 2e7], "xs": [90.0, 0.1]},
            "fission": {"energies": [1e-5, 2e7], "xs": [500.0, 1.2]}
        }"#;
        let iso = IsotopeData::from_json_str(json).unwrap().into_isotope().unwrap();
        assert_eq!(iso.name, "U235");
        assert!(iso.is_fissionable());
        assert_eq!(iso.interpolation(), Interpolation::LogLog);
        assert_relative_eq!(iso.total_xs(1e-5).unwrap(), 605.0, epsilon = 1e-9);
    }

    #[test]
    fn test_isotope_json_needs_tables() {
        let json = r#"{"name": "void", "a": 1.0, "elastic": null, "capture": null, "fission": null}"#;
        let err = IsotopeData::from_json_str(json).unwrap().into_isotope();
        assert!(matches!(err, Err(Error::InvalidIsotope { .. })));
    }
}
