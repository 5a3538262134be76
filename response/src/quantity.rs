//! Unit-tagged numeric arrays.
//!
//! A [`Quantity`] pairs an `ndarray` array with a runtime [`Unit`]. All
//! operations return new values; nothing mutates in place. Multiplication and
//! division compose units, addition and subtraction require identical units.
//! Shapes must be equal or one operand must hold a single element, which is
//! then broadcast.

use ndarray::{arr0, Array, Array1, Array2, Dimension, Ix0, Ix1, Ix2};
use serde::{Deserialize, Serialize};

use crate::units::{Unit, UnitError};

/// Array of values sharing one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "D: Dimension + Serialize",
    deserialize = "D: Dimension + Deserialize<'de>"
))]
pub struct Quantity<D: Dimension = Ix1> {
    values: Array<f64, D>,
    unit: Unit,
}

/// Single value with a unit, e.g. an exposure time
pub type Scalar = Quantity<Ix0>;
/// Per-bin values such as an ARF or a transmission curve
pub type Quantity1 = Quantity<Ix1>;
/// Matrix values such as a redistribution matrix, indexed `[photon, channel]`
pub type Quantity2 = Quantity<Ix2>;

impl<D: Dimension> Quantity<D> {
    /// Tag `values` with `unit`; no conversion happens
    pub fn new(values: Array<f64, D>, unit: Unit) -> Self {
        Self { values, unit }
    }

    pub fn values(&self) -> &Array<f64, D> {
        &self.values
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Split into the raw array and its unit
    pub fn into_parts(self) -> (Array<f64, D>, Unit) {
        (self.values, self.unit)
    }

    /// Express the same physical quantity in another unit
    pub fn convert(&self, target: &Unit) -> Result<Self, UnitError> {
        if &self.unit == target {
            return Ok(self.clone());
        }
        let factor = self.unit.conversion_factor(target)?;
        Ok(Self {
            values: self.values.mapv(|v| v * factor),
            unit: target.clone(),
        })
    }

    /// Multiply every element by a dimensionless factor
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            values: self.values.mapv(|v| v * factor),
            unit: self.unit.clone(),
        }
    }

    /// Relabel without touching the numbers, for identical units spelled differently
    pub fn with_unit(self, unit: Unit) -> Self {
        Self { unit, ..self }
    }

    /// Element-wise product; the result unit is the product of both units.
    ///
    /// Fails with [`UnitError::ShapeMismatch`] unless the shapes agree or one
    /// side holds a single element.
    pub fn multiply(&self, other: &Self) -> Result<Self, UnitError> {
        let values = broadcast_with(&self.values, &other.values, |a, b| a * b)?;
        Ok(Self {
            values,
            unit: self.unit.multiply(&other.unit),
        })
    }

    /// Element-wise quotient; the result unit is `self.unit / other.unit`.
    /// Division by zero follows IEEE rules and yields `inf` or `NaN`.
    pub fn divide(&self, other: &Self) -> Result<Self, UnitError> {
        let values = broadcast_with(&self.values, &other.values, |a, b| a / b)?;
        Ok(Self {
            values,
            unit: self.unit.divide(&other.unit),
        })
    }

    /// Element-wise sum of two quantities in the same unit.
    ///
    /// Units must be identical, not merely convertible; call
    /// [`convert`](Self::convert) first when they differ.
    pub fn add(&self, other: &Self) -> Result<Self, UnitError> {
        self.require_identical(other)?;
        let values = broadcast_with(&self.values, &other.values, |a, b| a + b)?;
        Ok(Self {
            values,
            unit: self.unit.clone(),
        })
    }

    /// Element-wise difference, with the same unit rule as [`add`](Self::add)
    pub fn subtract(&self, other: &Self) -> Result<Self, UnitError> {
        self.require_identical(other)?;
        let values = broadcast_with(&self.values, &other.values, |a, b| a - b)?;
        Ok(Self {
            values,
            unit: self.unit.clone(),
        })
    }

    fn require_identical(&self, other: &Self) -> Result<(), UnitError> {
        if self.unit != other.unit {
            return Err(UnitError::NotIdentical {
                left: self.unit.to_string(),
                right: other.unit.to_string(),
            });
        }
        Ok(())
    }
}

impl Quantity<Ix0> {
    /// Rank-0 quantity holding `value`
    pub fn scalar(value: f64, unit: Unit) -> Self {
        Self::new(arr0(value), unit)
    }

    pub fn value(&self) -> f64 {
        self.values[()]
    }
}

impl Quantity<Ix1> {
    /// One-dimensional quantity from owned values
    pub fn from_vec(values: Vec<f64>, unit: Unit) -> Self {
        Self::new(Array1::from(values), unit)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Multiply every element by a rank-0 quantity, composing units
    pub fn multiply_scalar(&self, other: &Scalar) -> Self {
        Self {
            values: self.values.mapv(|v| v * other.value()),
            unit: self.unit.multiply(other.unit()),
        }
    }
}

impl Quantity<Ix2> {
    /// Matrix quantity, rows along the first axis
    pub fn from_array(values: Array2<f64>, unit: Unit) -> Self {
        Self::new(values, unit)
    }
}

/// Apply `op` element-wise, broadcasting a single-element operand
fn broadcast_with<D, F>(
    left: &Array<f64, D>,
    right: &Array<f64, D>,
    op: F,
) -> Result<Array<f64, D>, UnitError>
where
    D: Dimension,
    F: Fn(f64, f64) -> f64,
{
    if left.shape() == right.shape() {
        let mut out = left.clone();
        out.zip_mut_with(right, |a, b| *a = op(*a, *b));
        return Ok(out);
    }
    if right.len() == 1 {
        let b = right.iter().next().copied().unwrap_or(0.0);
        return Ok(left.mapv(|a| op(a, b)));
    }
    if left.len() == 1 {
        let a = left.iter().next().copied().unwrap_or(0.0);
        return Ok(right.mapv(|b| op(a, b)));
    }
    Err(UnitError::ShapeMismatch {
        left: left.shape().to_vec(),
        right: right.shape().to_vec(),
    })
}
