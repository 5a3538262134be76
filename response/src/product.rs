//! Telescope-level response products.
//!
//! Products are plain values: built once by the assembler, compared by value
//! and round-tripped through JSON. Decoding re-runs the constructor checks,
//! so a decoded product satisfies the same shape and grid invariants as a
//! built one.

use serde::{Deserialize, Serialize};

use crate::error::ResponseError;
use crate::grid::EnergyGrid;
use crate::provenance::Provenance;
use crate::quantity::{Quantity1, Quantity2};
use crate::srm::GridMismatchError;
use crate::units::{Unit, UnitError};

/// Ancillary response: effective area per photon energy bin, in cm²
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArfRepr")]
pub struct Arf {
    telescope: String,
    grid: EnergyGrid,
    values: Quantity1,
}

#[derive(Deserialize)]
struct ArfRepr {
    telescope: String,
    grid: EnergyGrid,
    values: Quantity1,
}

impl TryFrom<ArfRepr> for Arf {
    type Error = UnitError;

    fn try_from(repr: ArfRepr) -> Result<Self, Self::Error> {
        Arf::new(repr.telescope, repr.grid, repr.values)
    }
}

impl Arf {
    /// Build an ARF, expressing the area in cm².
    ///
    /// Fails when the values are not an area or their count does not match
    /// the grid.
    pub fn new(
        telescope: impl Into<String>,
        grid: EnergyGrid,
        values: Quantity1,
    ) -> Result<Self, UnitError> {
        if values.len() != grid.len() {
            return Err(UnitError::ShapeMismatch {
                left: vec![grid.len()],
                right: values.shape().to_vec(),
            });
        }
        let values = values.convert(&Unit::square_centimeter())?;
        Ok(Self {
            telescope: telescope.into(),
            grid,
            values,
        })
    }

    /// Label of the telescope the ARF was built for
    pub fn telescope(&self) -> &str {
        &self.telescope
    }

    /// Photon energy grid
    pub fn grid(&self) -> &EnergyGrid {
        &self.grid
    }

    /// Effective area per bin, in cm²
    pub fn values(&self) -> &Quantity1 {
        &self.values
    }
}

/// A matrix over (photon energy bin, count channel): an RMF or an SRM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr")]
pub struct ResponseMatrix {
    telescope: String,
    input: EnergyGrid,
    output: EnergyGrid,
    values: Quantity2,
}

#[derive(Deserialize)]
struct MatrixRepr {
    telescope: String,
    input: EnergyGrid,
    output: EnergyGrid,
    values: Quantity2,
}

impl TryFrom<MatrixRepr> for ResponseMatrix {
    type Error = UnitError;

    fn try_from(repr: MatrixRepr) -> Result<Self, Self::Error> {
        ResponseMatrix::new(repr.telescope, repr.input, repr.output, repr.values)
    }
}

impl ResponseMatrix {
    /// Matrix of shape (input bins, output bins)
    pub fn new(
        telescope: impl Into<String>,
        input: EnergyGrid,
        output: EnergyGrid,
        values: Quantity2,
    ) -> Result<Self, UnitError> {
        let expected = [input.len(), output.len()];
        if values.shape() != expected {
            return Err(UnitError::ShapeMismatch {
                left: expected.to_vec(),
                right: values.shape().to_vec(),
            });
        }
        Ok(Self {
            telescope: telescope.into(),
            input,
            output,
            values,
        })
    }

    /// Same grids, new values of the same shape
    pub(crate) fn with_values(&self, telescope: &str, values: Quantity2) -> Self {
        debug_assert_eq!(values.shape(), self.values.shape());
        Self {
            telescope: telescope.to_string(),
            input: self.input.clone(),
            output: self.output.clone(),
            values,
        }
    }

    pub fn telescope(&self) -> &str {
        &self.telescope
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
}

/// Everything known about one telescope's response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProductRepr")]
pub struct ResponseProduct {
    telescope: String,
    arf: Arf,
    rmf: Option<ResponseMatrix>,
    srm: Option<ResponseMatrix>,
    provenance: Provenance,
}

#[derive(Deserialize)]
struct ProductRepr {
    telescope: String,
    arf: Arf,
    rmf: Option<ResponseMatrix>,
    srm: Option<ResponseMatrix>,
    provenance: Provenance,
}

impl TryFrom<ProductRepr> for ResponseProduct {
    type Error = ResponseError;

    fn try_from(repr: ProductRepr) -> Result<Self, Self::Error> {
        let product = ResponseProduct::new(
            repr.telescope,
            repr.arf,
            repr.rmf,
            repr.srm,
            repr.provenance,
        );
        product.check_grids()?;
        Ok(product)
    }
}

impl ResponseProduct {
    pub(crate) fn new(
        telescope: String,
        arf: Arf,
        rmf: Option<ResponseMatrix>,
        srm: Option<ResponseMatrix>,
        provenance: Provenance,
    ) -> Self {
        Self {
            telescope,
            arf,
            rmf,
            srm,
            provenance,
        }
    }

    /// The RMF and SRM come together and share the ARF's photon grid
    fn check_grids(&self) -> Result<(), ResponseError> {
        match (&self.rmf, &self.srm) {
            (None, None) => Ok(()),
            (Some(rmf), Some(srm)) => {
                let photon = self.arf.grid();
                for (context, expected, found) in [
                    ("RMF input grid vs ARF grid", photon, rmf.input()),
                    ("SRM input grid vs ARF grid", photon, srm.input()),
                    ("SRM output grid vs RMF output grid", rmf.output(), srm.output()),
                ] {
                    if expected != found {
                        return Err(GridMismatchError::grids(context, expected, found).into());
                    }
                }
                Ok(())
            }
            _ => Err(ResponseError::InvalidChain(format!(
                "{}: an RMF and an SRM must be present together",
                self.telescope
            ))),
        }
    }

    pub fn telescope(&self) -> &str {
        &self.telescope
    }

    /// Effective area on the photon grid
    pub fn arf(&self) -> &Arf {
        &self.arf
    }

    /// Absent for telescopes without a detector response
    pub fn rmf(&self) -> Option<&ResponseMatrix> {
        self.rmf.as_ref()
    }

    /// ARF-weighted RMF, present exactly when the RMF is
    pub fn srm(&self) -> Option<&ResponseMatrix> {
        self.srm.as_ref()
    }

    /// Photon energy grid shared by the ARF and, when present, the matrices
    pub fn photon_grid(&self) -> &EnergyGrid {
        self.arf.grid()
    }

    /// Count-channel grid, when a detector response is present
    pub fn count_grid(&self) -> Option<&EnergyGrid> {
        self.rmf.as_ref().map(ResponseMatrix::output)
    }

    /// Components in photon-path order, with their selections
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Pretty-printed JSON for downstream tooling
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Decode a product written by [`ResponseProduct::to_json`].
    ///
    /// Grids, value counts and matrix shapes are validated while decoding.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::GridOrigin;
    use crate::reconcile::Extrapolation;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn grid() -> EnergyGrid {
        EnergyGrid::from_edges(vec![1.0, 2.0, 3.0], Unit::kev()).unwrap()
    }

    #[test]
    fn test_arf_converts_to_cm2() {
        let m2 = Unit::parse("m^2").unwrap();
        let arf = Arf::new("pos2", grid(), Quantity1::from_vec(vec![1e-3, 2e-3], m2)).unwrap();
        assert_eq!(arf.values().unit(), &Unit::square_centimeter());
        assert_relative_eq!(arf.values().values()[0], 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_arf_rejects_non_area() {
        let values = Quantity1::from_vec(vec![1.0, 2.0], Unit::kev());
        assert!(matches!(
            Arf::new("pos2", grid(), values),
            Err(UnitError::Incompatible { .. })
        ));
        let short = Quantity1::from_vec(vec![1.0], Unit::square_centimeter());
        assert!(matches!(
            Arf::new("pos2", grid(), short),
            Err(UnitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_matrix_shape() {
        let values = Quantity2::from_array(array![[1.0, 0.0]], Unit::counts_per_photon());
        assert!(ResponseMatrix::new("pos2", grid(), grid(), values).is_err());
    }

    fn product() -> ResponseProduct {
        let arf = Arf::new(
            "pos2",
            grid(),
            Quantity1::from_vec(vec![10.0, 20.0], Unit::square_centimeter()),
        )
        .unwrap();
        let rmf = ResponseMatrix::new(
            "pos2",
            grid(),
            grid(),
            Quantity2::from_array(array![[1.0, 0.0], [0.0, 1.0]], Unit::counts_per_photon()),
        )
        .unwrap();
        let srm = crate::srm::compose(&arf, &rmf).unwrap();
        let provenance = Provenance {
            entries: Vec::new(),
            grid_origin: GridOrigin::Detector,
            extrapolation: Extrapolation::default(),
        };
        ResponseProduct::new("pos2".to_string(), arf, Some(rmf), Some(srm), provenance)
    }

    #[test]
    fn test_json_round_trip() {
        let product = product();
        let back = ResponseProduct::from_json(&product.to_json().unwrap()).unwrap();
        assert_eq!(back, product);
    }

    #[test]
    fn test_decoding_rejects_bad_arf() {
        let mut json = serde_json::to_value(product()).unwrap();
        json["arf"]["values"]["values"] = serde_json::json!({"v": 1, "dim": [1], "data": [5.0]});
        assert!(serde_json::from_value::<ResponseProduct>(json).is_err());

        let mut json = serde_json::to_value(product()).unwrap();
        json["arf"]["grid"]["edges"]["data"] = serde_json::json!([3.0, 2.0, 1.0]);
        assert!(serde_json::from_value::<ResponseProduct>(json).is_err());
    }

    #[test]
    fn test_decoding_rejects_inconsistent_matrices() {
        let mut json = serde_json::to_value(product()).unwrap();
        json["srm"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<ResponseProduct>(json).is_err());

        let mut json = serde_json::to_value(product()).unwrap();
        json["rmf"]["values"]["values"] =
            serde_json::json!({"v": 1, "dim": [1, 2], "data": [1.0, 0.0]});
        assert!(serde_json::from_value::<ResponseProduct>(json).is_err());

        let mut json = serde_json::to_value(product()).unwrap();
        json["rmf"]["input"]["edges"]["data"] = serde_json::json!([1.0, 2.5, 3.0]);
        json["rmf"]["input"]["midpoints"]["data"] = serde_json::json!([1.75, 2.75]);
        assert!(serde_json::from_value::<ResponseProduct>(json).is_err());
    }
}
