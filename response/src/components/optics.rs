//! X-ray optic effective areas.
//!
//! Two file layouts are in use. Optics with off-axis calibration (the MSFC
//! heritage modules) ship a [`FamilyDocument`] of area curves keyed by
//! off-axis angle. The remaining optics ship a single on-axis curve table,
//! optionally with measured and modelled columns.

use std::path::Path;

use super::selection::{select_angle, AngleSelection, ON_AXIS_TOLERANCE_ARCMIN};
use super::{ComponentKind, ComponentMeta, LoadError, ScalarResponse};
use crate::quantity::Quantity1;
use crate::raw::{read_json, CurveTable, FamilyDocument};
use crate::units::AngleExt;

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load an optic's effective area at the requested pointing
pub fn load_optic(
    path: &Path,
    label: &str,
    off_axis: AngleSelection,
    use_model: bool,
) -> Result<ScalarResponse, LoadError> {
    if is_json(path) {
        let doc: FamilyDocument = read_json(path)?;
        let origin = path.display().to_string();
        return optic_from_family(&doc, &origin, label, off_axis, use_model);
    }

    if let AngleSelection::At(angle) = off_axis {
        if angle.as_arcmin().abs() > ON_AXIS_TOLERANCE_ARCMIN {
            return Err(LoadError::ParameterOutOfRange {
                parameter: "off_axis".to_string(),
                requested: format!("{} arcmin", angle.as_arcmin()),
                available: format!("on-axis only ({label})"),
            });
        }
    }

    let table = CurveTable::read(path)?;
    let axis = table.energy_axis()?;
    let (column, model) = table.value_column(use_model)?;
    let meta = ComponentMeta::new(ComponentKind::Optic, label, table.origin()).modelled(model);
    ScalarResponse::new(
        axis,
        Quantity1::from_vec(column.values.clone(), column.unit.clone()),
        meta,
    )
}

/// Pick one member of an off-axis family
pub fn optic_from_family(
    doc: &FamilyDocument,
    origin: &str,
    label: &str,
    off_axis: AngleSelection,
    use_model: bool,
) -> Result<ScalarResponse, LoadError> {
    let axis = doc
        .energy
        .as_ref()
        .ok_or_else(|| LoadError::malformed(origin, "optic family has no energy axis"))?;
    let axis = axis.to_axis(origin)?;

    let (index, selection) = select_angle(
        &doc.parameter.name,
        &doc.parameter_values(),
        &doc.parameter.unit,
        off_axis,
    )?;
    let (values, model) = doc.members[index].values_for(use_model);
    log::debug!(
        "{label}: using off-axis member {} {}",
        doc.members[index].parameter,
        doc.parameter.unit
    );

    let meta = ComponentMeta::new(ComponentKind::Optic, label, origin)
        .modelled(model)
        .with_selection(selection);
    ScalarResponse::new(axis, Quantity1::from_vec(values.to_vec(), doc.unit.clone()), meta)
}
