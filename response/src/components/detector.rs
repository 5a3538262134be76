//! Detector redistribution matrices.
//!
//! A matrix document holds one matrix per (region, side, event type). CMOS
//! detectors ship a single member; the CdTe strip detectors ship one member
//! per strip-pitch region and may split them by side and trigger class.

use std::path::Path;

use ndarray::Array2;

use super::selection::{select_region, RegionSelection};
use super::{ComponentKind, ComponentMeta, LoadError, MatrixResponse};
use crate::grid::EnergyGrid;
use crate::quantity::Quantity2;
use crate::raw::{read_json, DetectorSide, EventType, MatrixDocument};

/// Which matrix to take from a detector file
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectorSelection {
    pub region: RegionSelection,
    pub side: DetectorSide,
    pub event_type: EventType,
}

pub fn load_detector(
    path: &Path,
    label: &str,
    selection: DetectorSelection,
) -> Result<MatrixResponse, LoadError> {
    let doc: MatrixDocument = read_json(path)?;
    detector_from_document(&doc, &path.display().to_string(), label, selection)
}

pub fn detector_from_document(
    doc: &MatrixDocument,
    origin: &str,
    label: &str,
    selection: DetectorSelection,
) -> Result<MatrixResponse, LoadError> {
    let candidates: Vec<_> = doc
        .members
        .iter()
        .filter(|m| m.side == selection.side && m.event_type == selection.event_type)
        .collect();
    if candidates.is_empty() {
        return Err(LoadError::ParameterOutOfRange {
            parameter: "side/event type".to_string(),
            requested: format!("{:?}/{:?}", selection.side, selection.event_type),
            available: doc
                .members
                .iter()
                .map(|m| format!("{:?}/{:?}", m.side, m.event_type))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let regions: Vec<u8> = candidates.iter().map(|m| m.region).collect();
    let (region, record) = select_region(&regions, selection.region)?;
    let member = candidates
        .iter()
        .find(|m| m.region == region)
        .ok_or_else(|| LoadError::malformed(origin, format!("region {region} vanished")))?;

    let input = EnergyGrid::from_edges(doc.input_edges.clone(), doc.energy_unit.clone())
        .map_err(|e| LoadError::from_grid(origin, e))?;
    let output = EnergyGrid::from_edges(doc.output_edges.clone(), doc.energy_unit.clone())
        .map_err(|e| LoadError::from_grid(origin, e))?;

    let rows = member.matrix.len();
    let cols = member.matrix.first().map_or(0, Vec::len);
    if member.matrix.iter().any(|row| row.len() != cols) {
        return Err(LoadError::malformed(origin, "matrix rows have unequal lengths"));
    }
    let flat: Vec<f64> = member.matrix.iter().flatten().copied().collect();
    let values = Array2::from_shape_vec((rows, cols), flat)
        .map_err(|e| LoadError::malformed(origin, e))?;

    let meta = ComponentMeta::new(ComponentKind::Detector, label, origin).with_selection(record);
    MatrixResponse::new(input, output, Quantity2::from_array(values, doc.unit.clone()), meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::MatrixMember;
    use crate::units::{LengthExt, Unit};
    use uom::si::f64::Length;

    fn member(region: u8, side: DetectorSide, fill: f64) -> MatrixMember {
        MatrixMember {
            region,
            side,
            event_type: EventType::All,
            matrix: vec![vec![fill, 0.0], vec![0.0, fill]],
        }
    }

    fn doc() -> MatrixDocument {
        MatrixDocument {
            energy_unit: Unit::kev(),
            input_edges: vec![1.0, 2.0, 3.0],
            output_edges: vec![1.0, 2.0, 3.0],
            unit: Unit::counts_per_photon(),
            members: vec![
                member(0, DetectorSide::Merged, 0.9),
                member(1, DetectorSide::Merged, 0.8),
                member(2, DetectorSide::Merged, 0.7),
                member(0, DetectorSide::Pt, 0.5),
            ],
        }
    }

    #[test]
    fn test_default_region() {
        let m =
            detector_from_document(&doc(), "mem", "CdTe2", DetectorSelection::default()).unwrap();
        assert_eq!(m.values().values()[[0, 0]], 0.9);
        assert_eq!(m.input().len(), 2);
    }

    #[test]
    fn test_region_by_pitch() {
        let selection = DetectorSelection {
            region: RegionSelection::Pitch(Length::from_micrometers(100.0)),
            ..Default::default()
        };
        let m = detector_from_document(&doc(), "mem", "CdTe2", selection).unwrap();
        assert_eq!(m.values().values()[[1, 1]], 0.7);
    }

    #[test]
    fn test_side_selection() {
        let selection = DetectorSelection {
            side: DetectorSide::Pt,
            ..Default::default()
        };
        let m = detector_from_document(&doc(), "mem", "CdTe2", selection).unwrap();
        assert_eq!(m.values().values()[[0, 0]], 0.5);

        let missing = DetectorSelection {
            side: DetectorSide::Pt,
            region: RegionSelection::Region(2),
            ..Default::default()
        };
        assert!(matches!(
            detector_from_document(&doc(), "mem", "CdTe2", missing),
            Err(LoadError::ParameterOutOfRange { .. })
        ));

        let two_hit = DetectorSelection {
            event_type: EventType::TwoHit,
            ..Default::default()
        };
        assert!(detector_from_document(&doc(), "mem", "CdTe2", two_hit).is_err());
    }

    #[test]
    fn test_ragged_matrix() {
        let mut d = doc();
        d.members[0].matrix = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(matches!(
            detector_from_document(&d, "mem", "CdTe2", DetectorSelection::default()),
            Err(LoadError::MalformedData { .. })
        ));
    }
}
