//! Putting scalar responses on a common energy grid.
//!
//! Each curve is sampled at the target grid's midpoints by linear
//! interpolation over its own midpoints. Outside the curve's sampled range
//! the [`Extrapolation`] policy decides the value; the default holds the
//! boundary value flat on both sides. Curves whose grid already equals the
//! target pass through untouched.

use log::debug;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::components::{ResponseAxis, ScalarResponse};
use crate::grid::{EnergyGrid, GridError};
use crate::quantity::Quantity1;

/// What to do with a target energy outside a curve's sampled range
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeFill {
    /// Repeat the nearest sampled value
    #[default]
    Hold,
    /// Use a fixed value
    Fill(f64),
}

/// Edge handling below and above a curve's sampled range
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extrapolation {
    #[serde(default)]
    pub below: EdgeFill,
    #[serde(default)]
    pub above: EdgeFill,
}

impl Extrapolation {
    /// Zero outside the sampled range on both sides
    pub fn zero() -> Self {
        Self {
            below: EdgeFill::Fill(0.0),
            above: EdgeFill::Fill(0.0),
        }
    }
}

/// Sample `(xs, ys)` at each of `targets`.
///
/// `xs` must be strictly increasing and non-empty; this is guaranteed for
/// midpoints of an [`EnergyGrid`].
pub fn resample(xs: &[f64], ys: &[f64], targets: &[f64], policy: Extrapolation) -> Array1<f64> {
    let n = xs.len();
    targets
        .iter()
        .map(|&x| {
            if x < xs[0] {
                return match policy.below {
                    EdgeFill::Hold => ys[0],
                    EdgeFill::Fill(v) => v,
                };
            }
            if x > xs[n - 1] {
                return match policy.above {
                    EdgeFill::Hold => ys[n - 1],
                    EdgeFill::Fill(v) => v,
                };
            }

            // partition_point returns the index of the first element > x
            let idx = xs.partition_point(|&val| val <= x);
            if idx == 0 {
                return ys[0];
            }
            if idx == n {
                return ys[n - 1];
            }

            let (x1, x2) = (xs[idx - 1], xs[idx]);
            let (y1, y2) = (ys[idx - 1], ys[idx]);
            let t = (x - x1) / (x2 - x1);
            y1 + t * (y2 - y1)
        })
        .collect()
}

/// Evaluate one scalar response on `target`.
///
/// Flat responses broadcast; energy curves are resampled after converting
/// their grid into the target's energy unit.
pub fn reconcile_one(
    response: &ScalarResponse,
    target: &EnergyGrid,
    policy: Extrapolation,
) -> Result<Quantity1, GridError> {
    let values = response.values();
    let grid = match response.axis() {
        ResponseAxis::Flat => {
            let value = values.values()[0];
            return Ok(Quantity1::new(
                Array1::from_elem(target.len(), value),
                values.unit().clone(),
            ));
        }
        ResponseAxis::Energy(grid) => grid,
    };

    if grid == target {
        return Ok(values.clone());
    }

    let source = grid.to_unit(target.unit())?;
    let xs = source.midpoints().to_vec();
    let ys = values.values().to_vec();
    if let Some(index) = xs.windows(2).position(|w| !(w[1] > w[0])) {
        return Err(GridError::NonMonotonic { index: index + 1 });
    }

    let (source_lo, source_hi) = source.range();
    let (target_lo, target_hi) = target.range();
    if source_hi < target_lo || source_lo > target_hi {
        return Err(GridError::DisjointRanges {
            source_lo,
            source_hi,
            target_lo,
            target_hi,
        });
    }

    let targets = target.midpoints().to_vec();
    debug!(
        "resampling '{}' from {} to {} bins",
        response.meta().label,
        xs.len(),
        targets.len()
    );
    Ok(Quantity1::new(
        resample(&xs, &ys, &targets, policy),
        values.unit().clone(),
    ))
}

/// Evaluate every scalar response on `target`, preserving order
pub fn reconcile(
    components: &[ScalarResponse],
    target: &EnergyGrid,
    policy: Extrapolation,
) -> Result<Vec<Quantity1>, GridError> {
    components
        .iter()
        .map(|c| reconcile_one(c, target, policy))
        .collect()
}

/// The grid with the smallest mean bin width, first in order on ties.
///
/// Flat responses never define the grid.
pub fn finest_grid(components: &[ScalarResponse]) -> Option<&EnergyGrid> {
    let mut best: Option<&EnergyGrid> = None;
    for grid in components.iter().filter_map(ScalarResponse::grid) {
        match best {
            Some(b) if b.mean_width() <= grid.mean_width() => {}
            _ => best = Some(grid),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComponentKind, ComponentMeta};
    use crate::units::Unit;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn curve(mids: Vec<f64>, values: Vec<f64>) -> ScalarResponse {
        let grid = EnergyGrid::from_midpoints(mids, Unit::kev()).unwrap();
        ScalarResponse::new(
            ResponseAxis::Energy(grid),
            Quantity1::from_vec(values, Unit::square_centimeter()),
            ComponentMeta::new(ComponentKind::Optic, "optic", "test"),
        )
        .unwrap()
    }

    fn grid_a() -> EnergyGrid {
        EnergyGrid::from_midpoints(vec![1.0, 2.0, 3.0, 4.0, 5.0], Unit::kev()).unwrap()
    }

    #[test]
    fn test_resample_linear_and_hold() {
        let out = resample(
            &[1.0, 3.0, 5.0],
            &[50.0, 40.0, 30.0],
            &[0.0, 1.0, 2.0, 4.0, 6.0],
            Extrapolation::default(),
        );
        assert_eq!(out, array![50.0, 50.0, 45.0, 35.0, 30.0]);
    }

    #[test]
    fn test_resample_fill() {
        let out = resample(&[1.0, 2.0], &[1.0, 2.0], &[0.5, 1.5, 2.5], Extrapolation::zero());
        assert_eq!(out, array![0.0, 1.5, 0.0]);
    }

    #[test]
    fn test_identity_is_bit_identical() {
        let c = curve(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![0.1, 0.2, 0.3, 0.4, 0.5]);
        let out = reconcile_one(&c, &grid_a(), Extrapolation::default()).unwrap();
        assert_eq!(&out, c.values());
    }

    #[test]
    fn test_interpolates_optic_onto_finer_grid() {
        let optic = curve(vec![1.0, 3.0, 5.0], vec![50.0, 40.0, 30.0]);
        let out = reconcile_one(&optic, &grid_a(), Extrapolation::default()).unwrap();
        assert_eq!(out.values(), &array![50.0, 45.0, 40.0, 35.0, 30.0]);
        assert_eq!(out.unit(), &Unit::square_centimeter());
    }

    #[test]
    fn test_converts_grid_units() {
        let ev = Unit::parse("eV").unwrap();
        let grid = EnergyGrid::from_midpoints(vec![1000.0, 3000.0], ev).unwrap();
        let c = ScalarResponse::new(
            ResponseAxis::Energy(grid),
            Quantity1::from_vec(vec![1.0, 3.0], Unit::dimensionless()),
            ComponentMeta::new(ComponentKind::Attenuator, "filter", "test"),
        )
        .unwrap();
        let target = EnergyGrid::from_midpoints(vec![1.0, 2.0, 3.0], Unit::kev()).unwrap();
        let out = reconcile_one(&c, &target, Extrapolation::default()).unwrap();
        assert_relative_eq!(out.values()[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disjoint_ranges() {
        let c = curve(vec![50.0, 60.0], vec![1.0, 1.0]);
        let err = reconcile_one(&c, &grid_a(), Extrapolation::default()).unwrap_err();
        assert!(matches!(err, GridError::DisjointRanges { .. }));
    }

    #[test]
    fn test_flat_broadcasts() {
        let flat = ScalarResponse::flat(
            0.8,
            Unit::dimensionless(),
            ComponentMeta::new(ComponentKind::Attenuator, "Al", "uniform"),
        );
        let out = reconcile_one(&flat, &grid_a(), Extrapolation::default()).unwrap();
        assert_eq!(out.values(), &Array1::from_elem(5, 0.8));
    }

    #[test]
    fn test_finest_grid() {
        let coarse = curve(vec![1.0, 3.0, 5.0], vec![1.0, 1.0, 1.0]);
        let fine = curve(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![1.0; 5]);
        let also_fine = curve(vec![2.0, 3.0, 4.0], vec![1.0; 3]);
        let components = vec![coarse, fine.clone(), also_fine];
        assert_eq!(finest_grid(&components), fine.grid());
        assert!(finest_grid(&[]).is_none());
    }

    #[test]
    fn test_incompatible_grid_unit() {
        let c = curve(vec![1.0, 2.0], vec![1.0, 2.0]);
        let target = EnergyGrid::from_midpoints(vec![1.0, 2.0], Unit::second()).unwrap();
        assert!(matches!(
            reconcile_one(&c, &target, Extrapolation::default()),
            Err(GridError::UnitMismatch(_))
        ));
    }
}
