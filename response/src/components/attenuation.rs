//! Transmissive elements in the photon path.
//!
//! Thermal blankets, filters and attenuators are tabulated transmission
//! curves. Collimators contribute an energy-independent aperture ratio that
//! depends on off-axis angle, and the residual atmosphere contributes a
//! transmission that depends on flight time. A sigmoid model and a constant
//! transmission are also available for studies without a calibration file.

use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use uom::si::f64::Time;

use super::selection::{select_angle, select_time_range, AngleSelection};
use super::{ComponentKind, ComponentMeta, LoadError, ResponseAxis, ScalarResponse};
use crate::grid::EnergyGrid;
use crate::quantity::Quantity1;
use crate::raw::{read_json, CurveTable, FamilyDocument};
use crate::units::Unit;

/// Load a tabulated transmission.
///
/// A table with no energy column and a single row is an energy-independent
/// transmission.
pub fn load_transmission(
    path: &Path,
    kind: ComponentKind,
    label: &str,
    use_model: bool,
) -> Result<ScalarResponse, LoadError> {
    let table = CurveTable::read(path)?;
    let (column, model) = table.value_column(use_model)?;
    let meta = ComponentMeta::new(kind, label, table.origin()).modelled(model);

    let has_energy = table.columns().iter().any(|c| c.name.starts_with("energy"));
    if !has_energy {
        if column.values.len() != 1 {
            return Err(LoadError::malformed(
                table.origin(),
                "a table without energies must hold exactly one value",
            ));
        }
        return ScalarResponse::new(
            ResponseAxis::Flat,
            Quantity1::from_vec(column.values.clone(), column.unit.clone()),
            meta,
        );
    }

    ScalarResponse::new(
        table.energy_axis()?,
        Quantity1::from_vec(column.values.clone(), column.unit.clone()),
        meta,
    )
}

/// Load a collimator aperture ratio at the requested pointing
pub fn load_collimator(
    path: &Path,
    label: &str,
    off_axis: AngleSelection,
) -> Result<ScalarResponse, LoadError> {
    let doc: FamilyDocument = read_json(path)?;
    collimator_from_family(&doc, &path.display().to_string(), label, off_axis)
}

pub fn collimator_from_family(
    doc: &FamilyDocument,
    origin: &str,
    label: &str,
    off_axis: AngleSelection,
) -> Result<ScalarResponse, LoadError> {
    if doc.energy.is_some() {
        return Err(LoadError::malformed(origin, "collimator ratios are energy independent"));
    }
    let (index, selection) = select_angle(
        &doc.parameter.name,
        &doc.parameter_values(),
        &doc.parameter.unit,
        off_axis,
    )?;
    let member = &doc.members[index];
    let meta =
        ComponentMeta::new(ComponentKind::Collimator, label, origin).with_selection(selection);
    ScalarResponse::new(
        ResponseAxis::Flat,
        Quantity1::from_vec(member.values.clone(), doc.unit.clone()),
        meta,
    )
}

/// Load the atmospheric transmission averaged over a flight-time range
pub fn load_atmosphere(
    path: &Path,
    label: &str,
    time_range: (Time, Time),
) -> Result<ScalarResponse, LoadError> {
    let doc: FamilyDocument = read_json(path)?;
    atmosphere_from_family(&doc, &path.display().to_string(), label, time_range)
}

pub fn atmosphere_from_family(
    doc: &FamilyDocument,
    origin: &str,
    label: &str,
    time_range: (Time, Time),
) -> Result<ScalarResponse, LoadError> {
    let axis = doc
        .energy
        .as_ref()
        .ok_or_else(|| LoadError::malformed(origin, "atmosphere family has no energy axis"))?;
    let axis = axis.to_axis(origin)?;

    let (indices, selection) = select_time_range(
        &doc.parameter.name,
        &doc.parameter_values(),
        &doc.parameter.unit,
        time_range,
    )?;

    let mut sum = Array1::<f64>::zeros(axis.len());
    for &index in &indices {
        let values = &doc.members[index].values;
        if values.len() != axis.len() {
            return Err(LoadError::malformed(
                origin,
                format!(
                    "member {index} has {} values for {} bins",
                    values.len(),
                    axis.len()
                ),
            ));
        }
        sum.zip_mut_with(&Array1::from(values.clone()), |s, v| *s += v);
    }
    let mean = sum / indices.len() as f64;

    let meta =
        ComponentMeta::new(ComponentKind::Atmosphere, label, origin).with_selection(selection);
    ScalarResponse::new(axis, Quantity1::new(mean, doc.unit.clone()), meta)
}

/// Parameters of `T(E) = l / (1 + exp(-k (E - x0))) + b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidParams {
    /// Amplitude
    pub l: f64,
    /// Midpoint energy, in the grid's unit
    pub x0: f64,
    /// Steepness
    pub k: f64,
    /// Offset
    pub b: f64,
}

/// Analytic sigmoid transmission evaluated at the grid midpoints
pub fn sigmoid(grid: &EnergyGrid, params: SigmoidParams, label: &str) -> ScalarResponse {
    let SigmoidParams { l, x0, k, b } = params;
    let values = grid
        .midpoints()
        .mapv(|e| l / (1.0 + (-k * (e - x0)).exp()) + b);
    let source = format!("sigmoid(l={l}, x0={x0}, k={k}, b={b})");
    ScalarResponse {
        axis: ResponseAxis::Energy(grid.clone()),
        values: Quantity1::new(values, Unit::dimensionless()),
        meta: ComponentMeta::new(ComponentKind::Attenuator, label, source).modelled(true),
    }
}

/// Constant transmission on any grid
pub fn uniform(transmission: f64, label: &str) -> ScalarResponse {
    ScalarResponse::flat(
        transmission,
        Unit::dimensionless(),
        ComponentMeta::new(
            ComponentKind::Attenuator,
            label,
            format!("uniform({transmission})"),
        )
        .modelled(true),
    )
}
