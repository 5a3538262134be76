//! Per-component calibration products.
//!
//! Every loader takes a resolved local path plus the physical selection it
//! needs and returns a [`ComponentResponse`]: either an energy-dependent (or
//! flat) scalar curve, or a redistribution matrix. Loaders never fetch files
//! and never resample; curves keep their native grid until the reconciler
//! puts them on a common one.

pub mod attenuation;
pub mod detector;
pub mod optics;
pub mod quantum_efficiency;
pub mod selection;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{EnergyGrid, GridError};
use crate::quantity::{Quantity1, Quantity2};
use crate::units::{Unit, UnitError};

pub use selection::{AngleSelection, Chosen, RegionSelection, Requested, SelectedParameter};

/// Errors raised while turning calibration files into responses
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Calibration file not found: {}", .path.display())]
    MissingFile { path: PathBuf },

    #[error("Malformed calibration data in {origin}: {reason}")]
    MalformedData { origin: String, reason: String },

    #[error("Requested {parameter} = {requested} is outside the calibrated range {available}")]
    ParameterOutOfRange {
        parameter: String,
        requested: String,
        available: String,
    },
}

impl LoadError {
    /// A file that was read but could not be interpreted
    pub fn malformed(origin: impl fmt::Display, reason: impl fmt::Display) -> Self {
        LoadError::MalformedData {
            origin: origin.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::malformed(path.display(), err)
        }
    }

    pub(crate) fn from_grid(origin: impl fmt::Display, err: GridError) -> Self {
        LoadError::malformed(origin, err)
    }

    pub(crate) fn from_unit(origin: impl fmt::Display, err: UnitError) -> Self {
        LoadError::malformed(origin, err)
    }
}

/// What part of the photon path a response describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Optic,
    Attenuator,
    Collimator,
    Atmosphere,
    Detector,
    QuantumEfficiency,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Optic => "optic",
            ComponentKind::Attenuator => "attenuator",
            ComponentKind::Collimator => "collimator",
            ComponentKind::Atmosphere => "atmosphere",
            ComponentKind::Detector => "detector",
            ComponentKind::QuantumEfficiency => "quantum efficiency",
        };
        write!(f, "{name}")
    }
}

/// Where a response came from and how it was picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMeta {
    pub kind: ComponentKind,
    /// Human-readable name, e.g. "MSFC X-7 heritage optic"
    pub label: String,
    /// File path or analytic model name
    pub source: String,
    /// True when the values are modelled rather than measured
    pub model: bool,
    pub selection: Option<SelectedParameter>,
}

impl ComponentMeta {
    /// Metadata for measured values with no parameter selection
    pub fn new(kind: ComponentKind, label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            source: source.into(),
            model: false,
            selection: None,
        }
    }

    /// Mark the values as modelled (or measured)
    pub fn modelled(mut self, model: bool) -> Self {
        self.model = model;
        self
    }

    /// Record which member of a parameter family was used
    pub fn with_selection(mut self, selection: SelectedParameter) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// Sampling of a scalar response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseAxis {
    /// One value per energy bin
    Energy(EnergyGrid),
    /// A single energy-independent value, valid on any grid
    Flat,
}

impl ResponseAxis {
    /// Number of values a response on this axis holds
    pub fn len(&self) -> usize {
        match self {
            ResponseAxis::Energy(grid) => grid.len(),
            ResponseAxis::Flat => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn grid(&self) -> Option<&EnergyGrid> {
        match self {
            ResponseAxis::Energy(grid) => Some(grid),
            ResponseAxis::Flat => None,
        }
    }
}

/// A transmission, efficiency, aperture ratio or effective area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalarRepr")]
pub struct ScalarResponse {
    axis: ResponseAxis,
    values: Quantity1,
    meta: ComponentMeta,
}

#[derive(Deserialize)]
struct ScalarRepr {
    axis: ResponseAxis,
    values: Quantity1,
    meta: ComponentMeta,
}

impl TryFrom<ScalarRepr> for ScalarResponse {
    type Error = LoadError;

    fn try_from(repr: ScalarRepr) -> Result<Self, Self::Error> {
        ScalarResponse::new(repr.axis, repr.values, repr.meta)
    }
}

impl ScalarResponse {
    /// Response with one value per axis sample.
    ///
    /// Fails with [`LoadError::MalformedData`] when the value count does not
    /// match the axis.
    pub fn new(
        axis: ResponseAxis,
        values: Quantity1,
        meta: ComponentMeta,
    ) -> Result<Self, LoadError> {
        let expected = axis.len();
        if values.len() != expected {
            return Err(LoadError::malformed(
                &meta.source,
                format!("expected {expected} values, got {}", values.len()),
            ));
        }
        Ok(Self { axis, values, meta })
    }

    /// Energy-independent response
    pub fn flat(value: f64, unit: Unit, meta: ComponentMeta) -> Self {
        Self {
            axis: ResponseAxis::Flat,
            values: Quantity1::from_vec(vec![value], unit),
            meta,
        }
    }

    pub fn axis(&self) -> &ResponseAxis {
        &self.axis
    }

    /// The native energy grid, `None` for a flat response
    pub fn grid(&self) -> Option<&EnergyGrid> {
        self.axis.grid()
    }

    pub fn values(&self) -> &Quantity1 {
        &self.values
    }

    pub fn meta(&self) -> &ComponentMeta {
        &self.meta
    }
}

/// A redistribution matrix mapping photon energy bins to count channels.
///
/// Rows follow the input (photon) grid, columns the output (count) grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr")]
pub struct MatrixResponse {
    input: EnergyGrid,
    output: EnergyGrid,
    values: Quantity2,
    meta: ComponentMeta,
}

#[derive(Deserialize)]
struct MatrixRepr {
    input: EnergyGrid,
    output: EnergyGrid,
    values: Quantity2,
    meta: ComponentMeta,
}

impl TryFrom<MatrixRepr> for MatrixResponse {
    type Error = LoadError;

    fn try_from(repr: MatrixRepr) -> Result<Self, Self::Error> {
        MatrixResponse::new(repr.input, repr.output, repr.values, repr.meta)
    }
}

impl MatrixResponse {
    /// Matrix of shape (input bins, output bins)
    pub fn new(
        input: EnergyGrid,
        output: EnergyGrid,
        values: Quantity2,
        meta: ComponentMeta,
    ) -> Result<Self, LoadError> {
        let shape = [input.len(), output.len()];
        if values.shape() != shape {
            return Err(LoadError::malformed(
                &meta.source,
                format!("matrix shape {:?} does not match grids {shape:?}", values.shape()),
            ));
        }
        Ok(Self {
            input,
            output,
            values,
            meta,
        })
    }

    /// Photon energy grid (rows)
    pub fn input(&self) -> &EnergyGrid {
        &self.input
    }

    /// Count channel grid (columns)
    pub fn output(&self) -> &EnergyGrid {
        &self.output
    }

    pub fn values(&self) -> &Quantity2 {
        &self.values
    }

    pub fn meta(&self) -> &ComponentMeta {
        &self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentResponse {
    Scalar1D(ScalarResponse),
    Matrix2D(MatrixResponse),
}

impl ComponentResponse {
    pub fn meta(&self) -> &ComponentMeta {
        match self {
            ComponentResponse::Scalar1D(s) => s.meta(),
            ComponentResponse::Matrix2D(m) => m.meta(),
        }
    }
}

impl From<ScalarResponse> for ComponentResponse {
    fn from(value: ScalarResponse) -> Self {
        ComponentResponse::Scalar1D(value)
    }
}

impl From<MatrixResponse> for ComponentResponse {
    fn from(value: MatrixResponse) -> Self {
        ComponentResponse::Matrix2D(value)
    }
}
