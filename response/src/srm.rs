//! Combining effective area and redistribution into a spectral response.
//!
//! The spectral response matrix is `SRM[a, b] = ARF[a] * RMF[a, b]`: each
//! photon-energy row of the redistribution matrix is scaled by the effective
//! area at that energy. Folding a photon spectrum through the SRM gives the
//! expected counts per channel. Neither operation resamples; grids must
//! already agree.

use log::warn;
use ndarray::Axis;
use thiserror::Error;

use crate::grid::EnergyGrid;
use crate::product::{Arf, ResponseMatrix};
use crate::quantity::{Quantity1, Quantity2};
use crate::units::Unit;

/// Why two grids that should agree do not
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MismatchReason {
    #[error("expected {expected} bins, got {found}")]
    BinCount { expected: usize, found: usize },

    #[error("expected energies in {expected}, got {found}")]
    Unit { expected: Unit, found: Unit },

    #[error("both grids have {bins} bins but their edges differ")]
    Edges { bins: usize },
}

/// Two products that must share an energy grid do not
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{context}: {reason}")]
pub struct GridMismatchError {
    /// Which pair of grids was compared
    pub context: String,
    pub reason: MismatchReason,
}

impl GridMismatchError {
    /// Describe how `found` differs from `expected`
    pub(crate) fn grids(context: &str, expected: &EnergyGrid, found: &EnergyGrid) -> Self {
        let reason = if expected.len() != found.len() {
            MismatchReason::BinCount {
                expected: expected.len(),
                found: found.len(),
            }
        } else if expected.unit() != found.unit() {
            MismatchReason::Unit {
                expected: expected.unit().clone(),
                found: found.unit().clone(),
            }
        } else {
            MismatchReason::Edges {
                bins: expected.len(),
            }
        };
        Self {
            context: context.to_string(),
            reason,
        }
    }

    fn count(context: &str, expected: usize, found: usize) -> Self {
        Self {
            context: context.to_string(),
            reason: MismatchReason::BinCount { expected, found },
        }
    }
}

/// Compose an SRM from an ARF and an RMF on the same photon grid
pub fn compose(arf: &Arf, rmf: &ResponseMatrix) -> Result<ResponseMatrix, GridMismatchError> {
    if arf.grid() != rmf.input() {
        return Err(GridMismatchError::grids(
            "ARF grid vs RMF input grid",
            rmf.input(),
            arf.grid(),
        ));
    }
    if arf.telescope() != rmf.telescope() {
        warn!(
            "composing ARF for '{}' with RMF for '{}'",
            arf.telescope(),
            rmf.telescope()
        );
    }

    let area = arf.values().values().view().insert_axis(Axis(1));
    let srm = rmf.values().values() * &area;
    let unit = arf.values().unit().multiply(rmf.values().unit());

    Ok(rmf.with_values(arf.telescope(), Quantity2::from_array(srm, unit)))
}

/// Expected counts per output channel for a photon spectrum.
///
/// `observable[b] = Σ_a spectrum[a] * SRM[a, b]`. The spectrum must be binned
/// on the SRM input grid.
pub fn fold(
    srm: &ResponseMatrix,
    grid: &EnergyGrid,
    spectrum: &Quantity1,
) -> Result<Quantity1, GridMismatchError> {
    if grid != srm.input() {
        return Err(GridMismatchError::grids(
            "spectrum grid vs SRM input grid",
            srm.input(),
            grid,
        ));
    }
    if spectrum.len() != grid.len() {
        return Err(GridMismatchError::count(
            "spectrum values vs SRM input grid",
            grid.len(),
            spectrum.len(),
        ));
    }
    let observable = spectrum.values().dot(srm.values().values());
    let unit = spectrum.unit().multiply(srm.values().unit());
    Ok(Quantity1::new(observable, unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn grid(edges: Vec<f64>) -> EnergyGrid {
        EnergyGrid::from_edges(edges, Unit::kev()).unwrap()
    }

    fn pair() -> (Arf, ResponseMatrix) {
        let photon = grid(vec![1.0, 2.0, 3.0]);
        let arf = Arf::new(
            "pos3",
            photon.clone(),
            Quantity1::from_vec(vec![10.0, 20.0], Unit::square_centimeter()),
        )
        .unwrap();
        let rmf = ResponseMatrix::new(
            "pos3",
            photon.clone(),
            photon,
            Quantity2::from_array(array![[0.5, 0.5], [0.2, 0.8]], Unit::counts_per_photon()),
        )
        .unwrap();
        (arf, rmf)
    }

    #[test]
    fn test_compose_scales_rows() {
        let (arf, rmf) = pair();
        let srm = compose(&arf, &rmf).unwrap();
        let expected = array![[5.0, 5.0], [4.0, 16.0]];
        for (a, b) in srm.values().values().iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_eq!(srm.values().unit().to_string(), "cm^2 ct/ph");
    }

    #[test]
    fn test_compose_grid_mismatch() {
        let (_, rmf) = pair();
        let other = Arf::new(
            "pos3",
            grid(vec![1.0, 2.5, 3.0]),
            Quantity1::from_vec(vec![10.0, 20.0], Unit::square_centimeter()),
        )
        .unwrap();
        let err = compose(&other, &rmf).unwrap_err();
        assert_eq!(err.reason, MismatchReason::Edges { bins: 2 });
        assert!(err.to_string().contains("edges differ"));

        let longer = Arf::new(
            "pos3",
            grid(vec![1.0, 2.0, 3.0, 4.0]),
            Quantity1::from_vec(vec![10.0, 20.0, 30.0], Unit::square_centimeter()),
        )
        .unwrap();
        let err = compose(&longer, &rmf).unwrap_err();
        assert_eq!(
            err.reason,
            MismatchReason::BinCount {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_compose_with_other_telescope_still_works() {
        let (arf, rmf) = pair();
        let foreign = ResponseMatrix::new(
            "pos5",
            rmf.input().clone(),
            rmf.output().clone(),
            rmf.values().clone(),
        )
        .unwrap();
        let srm = compose(&arf, &foreign).unwrap();
        assert_eq!(srm.telescope(), "pos3");
    }

    #[test]
    fn test_fold_is_linear() {
        let (arf, rmf) = pair();
        let srm = compose(&arf, &rmf).unwrap();
        let flux = Unit::parse("ph/(cm^2 s)").unwrap();
        let s1 = Quantity1::from_vec(vec![1.0, 2.0], flux.clone());
        let s2 = Quantity1::from_vec(vec![3.0, -1.0], flux.clone());
        let combined = s1.scale(2.0).add(&s2.scale(0.5)).unwrap();

        let f1 = fold(&srm, rmf.input(), &s1).unwrap();
        let f2 = fold(&srm, rmf.input(), &s2).unwrap();
        let fc = fold(&srm, rmf.input(), &combined).unwrap();
        for i in 0..2 {
            let expected = 2.0 * f1.values()[i] + 0.5 * f2.values()[i];
            assert_relative_eq!(fc.values()[i], expected, epsilon = 1e-9);
        }
        assert_eq!(f1.unit(), &Unit::parse("ct/s").unwrap());
    }

    #[test]
    fn test_fold_requires_exact_grid() {
        let (arf, rmf) = pair();
        let srm = compose(&arf, &rmf).unwrap();
        let spectrum = Quantity1::from_vec(vec![1.0, 1.0], Unit::dimensionless());
        let err = fold(&srm, &grid(vec![1.0, 2.0, 4.0]), &spectrum).unwrap_err();
        assert_eq!(err.reason, MismatchReason::Edges { bins: 2 });

        let short = Quantity1::from_vec(vec![1.0], Unit::dimensionless());
        let err = fold(&srm, rmf.input(), &short).unwrap_err();
        assert_eq!(
            err.reason,
            MismatchReason::BinCount {
                expected: 2,
                found: 1
            }
        );
    }
}
