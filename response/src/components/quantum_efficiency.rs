//! Detector quantum efficiency curves.
//!
//! QE is the probability that a photon reaching the sensor is registered, so
//! every tabulated value must be a dimensionless number in [0, 1].

use std::path::Path;

use super::{ComponentKind, ComponentMeta, LoadError, ScalarResponse};
use crate::quantity::Quantity1;
use crate::raw::CurveTable;

/// Load a quantum efficiency curve
pub fn load_quantum_efficiency(path: &Path, label: &str) -> Result<ScalarResponse, LoadError> {
    let table = CurveTable::read(path)?;
    let axis = table.energy_axis()?;
    let (column, model) = table.value_column(false)?;

    if !column.unit.is_dimensionless() {
        return Err(LoadError::malformed(
            table.origin(),
            format!("quantum efficiency must be dimensionless, got {}", column.unit),
        ));
    }
    if let Some((index, value)) = column
        .values
        .iter()
        .enumerate()
        .find(|(_, v)| !(0.0..=1.0).contains(*v))
    {
        return Err(LoadError::malformed(
            table.origin(),
            format!("efficiency {value} at row {} is outside [0, 1]", index + 1),
        ));
    }

    let meta =
        ComponentMeta::new(ComponentKind::QuantumEfficiency, label, table.origin()).modelled(model);
    ScalarResponse::new(
        axis,
        Quantity1::from_vec(column.values.clone(), column.unit.clone()),
        meta,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{text}").unwrap();
        file
    }

    #[test]
    fn test_valid_curve() {
        let file = csv("energy[keV],qe\n0.8,0.1\n2,0.9\n10,0.3\n");
        let qe = load_quantum_efficiency(file.path(), "CMOS 0 QE").unwrap();
        assert_eq!(qe.meta().kind, ComponentKind::QuantumEfficiency);
        assert_eq!(qe.values().len(), 3);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let file = csv("energy[keV],qe\n1,0.5\n2,1.2\n");
        let err = load_quantum_efficiency(file.path(), "bad").unwrap_err();
        assert!(matches!(err, LoadError::MalformedData { .. }));
    }

    #[test]
    fn test_units_rejected() {
        let file = csv("energy[keV],qe[cm^2]\n1,0.5\n2,0.6\n");
        assert!(load_quantum_efficiency(file.path(), "bad").is_err());
    }
}
