//! Energy binning shared by every energy-dependent response.
//!
//! An [`EnergyGrid`] holds N+1 strictly increasing bin edges, the N nominal
//! sample energies (midpoints) and the energy unit. Calibration curves are
//! usually tabulated at sample energies, while response matrices carry bin
//! edges; both constructors are provided.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::{Unit, UnitError};

/// Relative tolerance used when comparing grids
pub const GRID_RTOL: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Energy values must be strictly increasing (index {index})")]
    NonMonotonic { index: usize },

    #[error("An energy grid needs at least {required} points, got {got}")]
    TooFewPoints { required: usize, got: usize },

    #[error("Lower and upper edge columns differ in length: {lo} vs {hi}")]
    ColumnLengths { lo: usize, hi: usize },

    #[error("{edges} edges cannot bound {midpoints} bins")]
    EdgeCount { edges: usize, midpoints: usize },

    #[error("Midpoint {midpoint} lies outside bin {index}")]
    MidpointOutsideBin { index: usize, midpoint: f64 },

    #[error(
        "Source range [{source_lo}, {source_hi}] does not overlap \
         target range [{target_lo}, {target_hi}]"
    )]
    DisjointRanges {
        source_lo: f64,
        source_hi: f64,
        target_lo: f64,
        target_hi: f64,
    },

    #[error("Bin {index} upper edge {hi} does not meet next lower edge {next_lo}")]
    NotContiguous { index: usize, hi: f64, next_lo: f64 },

    #[error("Energy grid unit mismatch: {0}")]
    UnitMismatch(#[from] UnitError),
}

/// Binned energy axis.
///
/// Deserialization goes through the same checks as the constructors, so a
/// decoded grid always has strictly increasing edges and one midpoint inside
/// each bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GridRepr")]
pub struct EnergyGrid {
    edges: Array1<f64>,
    midpoints: Array1<f64>,
    unit: Unit,
}

/// Serialized layout of an [`EnergyGrid`], validated on the way in
#[derive(Deserialize)]
struct GridRepr {
    edges: Array1<f64>,
    midpoints: Array1<f64>,
    unit: Unit,
}

impl TryFrom<GridRepr> for EnergyGrid {
    type Error = GridError;

    fn try_from(repr: GridRepr) -> Result<Self, Self::Error> {
        EnergyGrid::from_parts(repr.edges.to_vec(), repr.midpoints.to_vec(), repr.unit)
    }
}

fn check_increasing(values: &[f64]) -> Result<(), GridError> {
    for (index, pair) in values.windows(2).enumerate() {
        if !(pair[1] > pair[0]) {
            return Err(GridError::NonMonotonic { index: index + 1 });
        }
    }
    Ok(())
}

impl EnergyGrid {
    /// Grid from N+1 bin edges; midpoints are the arithmetic bin centres
    pub fn from_edges(edges: Vec<f64>, unit: Unit) -> Result<Self, GridError> {
        if edges.len() < 2 {
            return Err(GridError::TooFewPoints {
                required: 2,
                got: edges.len(),
            });
        }
        check_increasing(&edges)?;
        let midpoints: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        Ok(Self {
            edges: Array1::from(edges),
            midpoints: Array1::from(midpoints),
            unit,
        })
    }

    /// Grid from sample energies.
    ///
    /// The samples are kept as midpoints. Inner edges sit halfway between
    /// neighbouring samples and the outer edges mirror the first and last
    /// half-widths, so at least two samples are needed.
    pub fn from_midpoints(midpoints: Vec<f64>, unit: Unit) -> Result<Self, GridError> {
        if midpoints.len() < 2 {
            return Err(GridError::TooFewPoints {
                required: 2,
                got: midpoints.len(),
            });
        }
        check_increasing(&midpoints)?;
        let n = midpoints.len();
        let mut edges = Vec::with_capacity(n + 1);
        edges.push(midpoints[0] - 0.5 * (midpoints[1] - midpoints[0]));
        edges.extend(midpoints.windows(2).map(|w| 0.5 * (w[0] + w[1])));
        edges.push(midpoints[n - 1] + 0.5 * (midpoints[n - 1] - midpoints[n - 2]));
        Ok(Self {
            edges: Array1::from(edges),
            midpoints: Array1::from(midpoints),
            unit,
        })
    }

    /// Grid from separate lower/upper edge columns, which must be contiguous
    pub fn from_lo_hi(lo: &[f64], hi: &[f64], unit: Unit) -> Result<Self, GridError> {
        if lo.len() != hi.len() {
            return Err(GridError::ColumnLengths {
                lo: lo.len(),
                hi: hi.len(),
            });
        }
        if lo.is_empty() {
            return Err(GridError::TooFewPoints {
                required: 1,
                got: 0,
            });
        }
        for index in 0..lo.len() - 1 {
            let scale = hi[index].abs().max(lo[index + 1].abs()).max(f64::MIN_POSITIVE);
            if (hi[index] - lo[index + 1]).abs() > GRID_RTOL * scale {
                return Err(GridError::NotContiguous {
                    index,
                    hi: hi[index],
                    next_lo: lo[index + 1],
                });
            }
        }
        let mut edges = lo.to_vec();
        edges.push(hi[hi.len() - 1]);
        Self::from_edges(edges, unit)
    }

    /// Grid from explicit edges and midpoints.
    ///
    /// Needs N+1 strictly increasing edges and N midpoints, each inside its
    /// own bin.
    pub fn from_parts(
        edges: Vec<f64>,
        midpoints: Vec<f64>,
        unit: Unit,
    ) -> Result<Self, GridError> {
        if edges.len() < 2 {
            return Err(GridError::TooFewPoints {
                required: 2,
                got: edges.len(),
            });
        }
        if midpoints.len() + 1 != edges.len() {
            return Err(GridError::EdgeCount {
                edges: edges.len(),
                midpoints: midpoints.len(),
            });
        }
        check_increasing(&edges)?;
        for (index, (&midpoint, bin)) in midpoints.iter().zip(edges.windows(2)).enumerate() {
            if !(bin[0] <= midpoint && midpoint <= bin[1]) {
                return Err(GridError::MidpointOutsideBin { index, midpoint });
            }
        }
        Ok(Self {
            edges: Array1::from(edges),
            midpoints: Array1::from(midpoints),
            unit,
        })
    }

    /// Uniform bins of width `step` from `start` up to (at least) `stop`
    pub fn uniform(start: f64, stop: f64, step: f64, unit: Unit) -> Result<Self, GridError> {
        if !(step > 0.0) || !(stop > start) {
            return Err(GridError::NonMonotonic { index: 1 });
        }
        let n = ((stop - start) / step).ceil() as usize;
        let edges = (0..=n).map(|i| start + step * i as f64).collect();
        Self::from_edges(edges, unit)
    }

    /// The analysis binning used for spectral fits: 0.5-100 keV in 44.5 eV bins
    pub fn analysis_default() -> Self {
        let n = ((100.0 - 0.5) / 0.0445_f64).ceil() as usize;
        let edges: Vec<f64> = (0..=n).map(|i| 0.5 + 0.0445 * i as f64).collect();
        let midpoints: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        Self {
            edges: Array1::from(edges),
            midpoints: Array1::from(midpoints),
            unit: Unit::kev(),
        }
    }

    /// The N+1 bin edges
    pub fn edges(&self) -> &Array1<f64> {
        &self.edges
    }

    /// The N nominal sample energies
    pub fn midpoints(&self) -> &Array1<f64> {
        &self.midpoints
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Width of each bin, in the grid's unit
    pub fn widths(&self) -> Array1<f64> {
        self.edges
            .windows(2)
            .into_iter()
            .map(|w| w[1] - w[0])
            .collect()
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.midpoints.len()
    }

    /// Always false for a constructed grid; kept for the `len` convention
    pub fn is_empty(&self) -> bool {
        self.midpoints.is_empty()
    }

    /// Lowest and highest bin edge
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// Average bin width over the whole range
    pub fn mean_width(&self) -> f64 {
        let (lo, hi) = self.range();
        (hi - lo) / self.len() as f64
    }

    /// The same bins expressed in another energy unit
    pub fn to_unit(&self, target: &Unit) -> Result<Self, GridError> {
        if &self.unit == target {
            return Ok(self.clone());
        }
        let factor = self.unit.conversion_factor(target)?;
        Ok(Self {
            edges: self.edges.mapv(|e| e * factor),
            midpoints: self.midpoints.mapv(|m| m * factor),
            unit: target.clone(),
        })
    }
}

fn close(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            let scale = x.abs().max(y.abs());
            (x - y).abs() <= GRID_RTOL * scale
        })
}

impl PartialEq for EnergyGrid {
    fn eq(&self, other: &Self) -> bool {
        self.unit == other.unit
            && close(&self.edges, &other.edges)
            && close(&self.midpoints, &other.midpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_from_edges() {
        let grid = EnergyGrid::from_edges(vec![1.0, 2.0, 4.0], Unit::kev()).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.midpoints(), &array![1.5, 3.0]);
        assert_eq!(grid.widths(), array![1.0, 2.0]);
        assert_relative_eq!(grid.mean_width(), 1.5);
    }

    #[test]
    fn test_from_midpoints_mirrors_outer_edges() {
        let mids = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let grid = EnergyGrid::from_midpoints(mids, Unit::kev()).unwrap();
        assert_eq!(grid.edges(), &array![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);
        assert_eq!(grid.midpoints(), &array![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(grid.range(), (0.5, 5.5));
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let err = EnergyGrid::from_edges(vec![1.0, 3.0, 2.0], Unit::kev()).unwrap_err();
        assert_eq!(err, GridError::NonMonotonic { index: 2 });
        assert!(EnergyGrid::from_midpoints(vec![1.0, 1.0], Unit::kev()).is_err());
        assert!(matches!(
            EnergyGrid::from_edges(vec![1.0], Unit::kev()),
            Err(GridError::TooFewPoints { .. })
        ));
    }

    #[test]
    fn test_from_lo_hi() {
        let grid =
            EnergyGrid::from_lo_hi(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0], Unit::kev()).unwrap();
        assert_eq!(grid.edges(), &array![1.0, 2.0, 3.0, 4.0]);

        let gap = EnergyGrid::from_lo_hi(&[1.0, 2.5], &[2.0, 3.0], Unit::kev());
        assert!(matches!(gap, Err(GridError::NotContiguous { index: 0, .. })));

        let ragged = EnergyGrid::from_lo_hi(&[1.0, 2.0], &[2.0], Unit::kev());
        assert_eq!(ragged.unwrap_err(), GridError::ColumnLengths { lo: 2, hi: 1 });
    }

    #[test]
    fn test_single_sample_needs_two_points() {
        assert_eq!(
            EnergyGrid::from_midpoints(vec![3.0], Unit::kev()).unwrap_err(),
            GridError::TooFewPoints {
                required: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_from_parts_checks_midpoints() {
        let grid =
            EnergyGrid::from_parts(vec![1.0, 2.0, 4.0], vec![1.2, 3.9], Unit::kev()).unwrap();
        assert_eq!(grid.midpoints(), &array![1.2, 3.9]);

        let outside = EnergyGrid::from_parts(vec![1.0, 2.0, 4.0], vec![1.5, 4.5], Unit::kev());
        assert!(matches!(outside, Err(GridError::MidpointOutsideBin { index: 1, .. })));

        let count = EnergyGrid::from_parts(vec![1.0, 2.0, 4.0], vec![1.5], Unit::kev());
        assert!(matches!(count, Err(GridError::EdgeCount { edges: 3, midpoints: 1 })));
    }

    #[test]
    fn test_serde_round_trip() {
        let grid = EnergyGrid::from_midpoints(vec![1.0, 2.0, 4.0], Unit::kev()).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let back: EnergyGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn test_deserialize_rejects_invalid_grid() {
        let decreasing = r#"{
            "edges": {"v": 1, "dim": [3], "data": [3.0, 2.0, 1.0]},
            "midpoints": {"v": 1, "dim": [2], "data": [2.5, 1.5]},
            "unit": "keV"
        }"#;
        assert!(serde_json::from_str::<EnergyGrid>(decreasing).is_err());

        let miscounted = r#"{
            "edges": {"v": 1, "dim": [3], "data": [1.0, 2.0, 3.0]},
            "midpoints": {"v": 1, "dim": [1], "data": [9.0]},
            "unit": "keV"
        }"#;
        assert!(serde_json::from_str::<EnergyGrid>(miscounted).is_err());

        let empty = r#"{
            "edges": {"v": 1, "dim": [0], "data": []},
            "midpoints": {"v": 1, "dim": [0], "data": []},
            "unit": "keV"
        }"#;
        assert!(serde_json::from_str::<EnergyGrid>(empty).is_err());
    }

    #[test]
    fn test_equality_tolerance_and_unit() {
        let a = EnergyGrid::from_edges(vec![1.0, 2.0, 3.0], Unit::kev()).unwrap();
        let b = EnergyGrid::from_edges(vec![1.0, 2.0 + 1e-12, 3.0], Unit::kev()).unwrap();
        let c = EnergyGrid::from_edges(vec![1.0, 2.1, 3.0], Unit::kev()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let ev = a.to_unit(&Unit::parse("eV").unwrap()).unwrap();
        assert_ne!(a, ev);
        assert_eq!(ev.to_unit(&Unit::kev()).unwrap(), a);
    }

    #[test]
    fn test_uniform_and_analysis_default() {
        let grid = EnergyGrid::uniform(1.0, 2.0, 0.25, Unit::kev()).unwrap();
        assert_eq!(grid.len(), 4);

        let default = EnergyGrid::analysis_default();
        assert_relative_eq!(default.range().0, 0.5);
        assert!(default.range().1 >= 100.0);
        assert_relative_eq!(default.widths()[10], 0.0445, epsilon = 1e-12);
    }

    #[test]
    fn test_to_unit_rejects_non_energy() {
        let grid = EnergyGrid::from_edges(vec![1.0, 2.0], Unit::kev()).unwrap();
        assert!(matches!(
            grid.to_unit(&Unit::square_centimeter()),
            Err(GridError::UnitMismatch(_))
        ));
    }
}
