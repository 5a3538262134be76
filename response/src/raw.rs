//! Readers for the on-disk calibration formats.
//!
//! Two layouts are supported:
//!
//! - **Curve tables** (`.csv`): a header of `name[unit]` fields followed by
//!   numeric rows. The energy axis is either an `energy` column of sample
//!   energies or an `energy_lo` / `energy_hi` pair of bin edges.
//! - **JSON documents**: [`FamilyDocument`] for curves tabulated against a
//!   parameter (off-axis angle, flight time) and [`MatrixDocument`] for
//!   redistribution matrices keyed by detector region.
//!
//! These readers only return plain arrays with unit strings attached; turning
//! them into typed responses is the loaders' job.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{LoadError, ResponseAxis};
use crate::grid::EnergyGrid;
use crate::units::Unit;

/// One named column of a curve table
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub unit: Unit,
    pub values: Vec<f64>,
}

/// A parsed delimited-text curve table
#[derive(Debug, Clone)]
pub struct CurveTable {
    origin: String,
    columns: Vec<Column>,
}

/// Split a `name[unit]` header field
fn parse_header(field: &str, origin: &str) -> Result<(String, Unit), LoadError> {
    let field = field.trim();
    match field.split_once('[') {
        Some((name, rest)) => {
            let unit = rest
                .strip_suffix(']')
                .ok_or_else(|| LoadError::malformed(origin, format!("bad header '{field}'")))?;
            let unit = Unit::parse(unit).map_err(|e| LoadError::from_unit(origin, e))?;
            Ok((name.trim().to_string(), unit))
        }
        None => Ok((field.to_string(), Unit::dimensionless())),
    }
}

impl CurveTable {
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|e| LoadError::from_io(path, e))?;
        Self::from_reader(file, &path.display().to_string())
    }

    pub fn from_reader<R: std::io::Read>(reader: R, origin: &str) -> Result<Self, LoadError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| LoadError::malformed(origin, e))?
            .clone();
        let mut columns = headers
            .iter()
            .map(|h| {
                parse_header(h, origin).map(|(name, unit)| Column {
                    name,
                    unit,
                    values: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (row, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| LoadError::malformed(origin, e))?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                let value = field.parse::<f64>().map_err(|_| {
                    LoadError::malformed(
                        origin,
                        format!(
                            "row {} column '{}': '{field}' is not a number",
                            row + 1,
                            column.name
                        ),
                    )
                })?;
                column.values.push(value);
            }
        }

        if columns.first().map_or(true, |c| c.values.is_empty()) {
            return Err(LoadError::malformed(origin, "table has no rows"));
        }

        Ok(Self {
            origin: origin.to_string(),
            columns,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn is_energy(name: &str) -> bool {
        matches!(name, "energy" | "energy_lo" | "energy_hi")
    }

    /// The energy axis of the table.
    ///
    /// A single tabulated energy cannot bound a bin, so such a table is read
    /// as an energy-independent value.
    pub fn energy_axis(&self) -> Result<ResponseAxis, LoadError> {
        if let Some(energy) = self.column("energy") {
            return sampled_axis(&energy.values, &energy.unit, &self.origin);
        }
        match (self.column("energy_lo"), self.column("energy_hi")) {
            (Some(lo), Some(hi)) => {
                if lo.unit != hi.unit {
                    return Err(LoadError::malformed(
                        &self.origin,
                        format!("energy_lo in {} but energy_hi in {}", lo.unit, hi.unit),
                    ));
                }
                EnergyGrid::from_lo_hi(&lo.values, &hi.values, lo.unit.clone())
                    .map(ResponseAxis::Energy)
                    .map_err(|e| LoadError::from_grid(&self.origin, e))
            }
            _ => Err(LoadError::malformed(&self.origin, "no energy column")),
        }
    }

    /// The value column, choosing between measured and modelled variants.
    ///
    /// Returns the column and whether it holds modelled values. A table with
    /// a single value column returns it regardless of `use_model`.
    pub fn value_column(&self, use_model: bool) -> Result<(&Column, bool), LoadError> {
        let values: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| !Self::is_energy(&c.name))
            .collect();

        let modelled = values.iter().find(|c| c.name.starts_with("modeled"));
        let measured = values.iter().find(|c| c.name.starts_with("measured"));
        match (measured, modelled, values.as_slice()) {
            (Some(_), Some(m), _) if use_model => Ok((*m, true)),
            (Some(m), Some(_), _) => Ok((*m, false)),
            (_, _, [only]) => {
                if use_model && !only.name.starts_with("modeled") {
                    log::debug!("{}: no modelled column, using '{}'", self.origin, only.name);
                }
                Ok((*only, only.name.starts_with("modeled")))
            }
            _ => Err(LoadError::malformed(
                &self.origin,
                format!("expected one value column, found {}", values.len()),
            )),
        }
    }
}

/// Energy axis of a JSON document, given as samples or as bin edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyAxis {
    pub unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midpoints: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<f64>>,
}

impl EnergyAxis {
    /// Energy sampling of the document; one sample means energy independent
    pub fn to_axis(&self, origin: &str) -> Result<ResponseAxis, LoadError> {
        match (&self.midpoints, &self.edges) {
            (None, Some(edges)) => EnergyGrid::from_edges(edges.clone(), self.unit.clone())
                .map(ResponseAxis::Energy)
                .map_err(|e| LoadError::from_grid(origin, e)),
            (Some(mids), None) => sampled_axis(mids, &self.unit, origin),
            _ => Err(LoadError::malformed(
                origin,
                "energy axis needs exactly one of 'midpoints' or 'edges'",
            )),
        }
    }
}

fn sampled_axis(energies: &[f64], unit: &Unit, origin: &str) -> Result<ResponseAxis, LoadError> {
    if energies.len() == 1 {
        return Ok(ResponseAxis::Flat);
    }
    EnergyGrid::from_midpoints(energies.to_vec(), unit.clone())
        .map(ResponseAxis::Energy)
        .map_err(|e| LoadError::from_grid(origin, e))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub unit: Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub parameter: f64,
    pub values: Vec<f64>,
    /// Modelled variant of `values`, if the file carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modeled: Option<Vec<f64>>,
}

/// A curve tabulated against a selection parameter.
///
/// Without an `energy` axis every member holds a single energy-independent
/// value, as for collimator aperture ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyDocument {
    pub parameter: Parameter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyAxis>,
    pub unit: Unit,
    pub members: Vec<FamilyMember>,
}

impl FamilyMember {
    /// The values to use and whether they are modelled
    pub fn values_for(&self, use_model: bool) -> (&[f64], bool) {
        match (&self.modeled, use_model) {
            (Some(modeled), true) => (modeled, true),
            _ => (&self.values, false),
        }
    }
}

impl FamilyDocument {
    pub fn parameter_values(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.parameter).collect()
    }
}

/// Which CdTe side a matrix was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorSide {
    /// Both sides combined
    #[default]
    Merged,
    /// Platinum side only
    Pt,
}

/// Trigger class of events included in a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    #[serde(rename = "all", alias = "mix")]
    All,
    #[serde(rename = "1hit")]
    OneHit,
    #[serde(rename = "2hit")]
    TwoHit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixMember {
    #[serde(default)]
    pub region: u8,
    #[serde(default)]
    pub side: DetectorSide,
    #[serde(default)]
    pub event_type: EventType,
    /// Rows over input energy bins, columns over output channels
    pub matrix: Vec<Vec<f64>>,
}

/// Redistribution matrices for one detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDocument {
    pub energy_unit: Unit,
    pub input_edges: Vec<f64>,
    pub output_edges: Vec<f64>,
    pub unit: Unit,
    pub members: Vec<MatrixMember>,
}

/// Read any JSON calibration document
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::from_io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| LoadError::malformed(path.display(), e))
}
