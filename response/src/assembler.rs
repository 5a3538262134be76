//! Building telescope response products.
//!
//! The [`Assembler`] resolves each stage of a telescope chain to a local
//! file, loads it, and hands the loaded components to [`assemble`], which is
//! pure: it picks the common photon grid, reconciles every scalar curve onto
//! it, multiplies them into the ARF, and composes the SRM when a detector
//! matrix is present.
//!
//! The photon grid is chosen in this order:
//!
//! 1. the detector matrix's input grid, when the chain has a detector;
//! 2. the caller's `mid_energies`;
//! 3. the finest grid among the scalar components.

use std::collections::BTreeMap;

use log::{info, warn};
use ndarray::Array1;
use rayon::prelude::*;

use crate::components::{ComponentResponse, MatrixResponse, ScalarResponse};
use crate::config::ResponseConfig;
use crate::error::{ResponseError, Result};
use crate::grid::EnergyGrid;
use crate::product::{Arf, ResponseMatrix, ResponseProduct};
use crate::provenance::{GridOrigin, Provenance, ProvenanceEntry};
use crate::quantity::Quantity1;
use crate::reconcile::{finest_grid, reconcile, Extrapolation};
use crate::resolver::CalibrationResolver;
use crate::srm::compose;
use crate::telescope::{ObservingConfig, TelescopeChain};
use crate::units::Unit;

/// Split a chain's components into scalar curves and the terminal matrix
fn split_components(
    components: Vec<ComponentResponse>,
) -> Result<(Vec<ScalarResponse>, Option<MatrixResponse>)> {
    let total = components.len();
    let mut scalars = Vec::with_capacity(total);
    let mut matrix = None;
    for (index, component) in components.into_iter().enumerate() {
        match component {
            ComponentResponse::Scalar1D(s) => scalars.push(s),
            ComponentResponse::Matrix2D(m) => {
                if matrix.is_some() {
                    return Err(ResponseError::InvalidChain(
                        "more than one detector matrix".to_string(),
                    ));
                }
                if index + 1 != total {
                    return Err(ResponseError::InvalidChain(format!(
                        "detector matrix '{}' is not the last component",
                        m.meta().label
                    )));
                }
                matrix = Some(m);
            }
        }
    }
    Ok((scalars, matrix))
}

/// Product of the reconciled curves, expressed as an ARF.
///
/// A chain with no scalar components yields nothing to multiply, which is
/// reported as an invalid chain.
fn multiply_onto(
    telescope: &str,
    scalars: &[ScalarResponse],
    grid: &EnergyGrid,
    policy: Extrapolation,
) -> Result<Arf> {
    if scalars.is_empty() {
        return Err(ResponseError::InvalidChain(format!(
            "{telescope} has no effective-area components"
        )));
    }
    let reconciled = reconcile(scalars, grid, policy)?;
    let identity = Quantity1::new(Array1::ones(grid.len()), Unit::dimensionless());
    let product = reconciled
        .iter()
        .try_fold(identity, |acc, q| acc.multiply(q))?;
    Ok(Arf::new(telescope, grid.clone(), product)?)
}

fn choose_grid(
    scalars: &[ScalarResponse],
    matrix: Option<&MatrixResponse>,
    mid_energies: Option<&EnergyGrid>,
) -> Result<(EnergyGrid, GridOrigin)> {
    if let Some(matrix) = matrix {
        if mid_energies.is_some() {
            warn!(
                "ignoring requested energies: photon grid follows detector '{}'",
                matrix.meta().label
            );
        }
        return Ok((matrix.input().clone(), GridOrigin::Detector));
    }
    if let Some(grid) = mid_energies {
        return Ok((grid.clone(), GridOrigin::Requested));
    }
    let finest = finest_grid(scalars).ok_or_else(|| {
        ResponseError::InvalidChain("no energy-dependent component defines a grid".to_string())
    })?;
    let label = scalars
        .iter()
        .find(|s| s.grid() == Some(finest))
        .map(|s| s.meta().label.clone())
        .unwrap_or_default();
    Ok((finest.clone(), GridOrigin::Finest(label)))
}

/// Combine loaded components into a response product.
///
/// `components` are in photon-path order. At most one matrix is allowed and
/// it must come last.
pub fn assemble(
    telescope: &str,
    components: Vec<ComponentResponse>,
    mid_energies: Option<&EnergyGrid>,
    policy: Extrapolation,
) -> Result<ResponseProduct> {
    let entries: Vec<ProvenanceEntry> = components
        .iter()
        .map(|c| ProvenanceEntry::from(c.meta()))
        .collect();
    let (scalars, matrix) = split_components(components)?;
    let (grid, grid_origin) = choose_grid(&scalars, matrix.as_ref(), mid_energies)?;

    let arf = multiply_onto(telescope, &scalars, &grid, policy)?;

    let (rmf, srm) = match matrix {
        Some(m) => {
            let rmf = ResponseMatrix::new(
                telescope,
                m.input().clone(),
                m.output().clone(),
                m.values().clone(),
            )?;
            let srm = compose(&arf, &rmf)?;
            (Some(rmf), Some(srm))
        }
        None => (None, None),
    };

    info!(
        "assembled {telescope}: {} components on {} bins ({:?})",
        entries.len(),
        grid.len(),
        grid_origin
    );
    let provenance = Provenance {
        entries,
        grid_origin,
        extrapolation: policy,
    };
    Ok(ResponseProduct::new(
        telescope.to_string(),
        arf,
        rmf,
        srm,
        provenance,
    ))
}

/// Loads calibration files and assembles telescope responses
pub struct Assembler {
    resolver: Box<dyn CalibrationResolver + Send + Sync>,
    default_version: String,
    versions: BTreeMap<String, String>,
    extrapolation: Extrapolation,
}

impl Assembler {
    /// Assembler using version "1" of every calibration file
    pub fn new(resolver: impl CalibrationResolver + Send + Sync + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            default_version: "1".to_string(),
            versions: BTreeMap::new(),
            extrapolation: Extrapolation::default(),
        }
    }

    /// Assembler reading from `config.data_dir` with its versions and
    /// extrapolation policy
    pub fn from_config(config: &ResponseConfig) -> Self {
        Self {
            resolver: Box::new(config.resolver()),
            default_version: config.default_version.clone(),
            versions: config.versions.clone(),
            extrapolation: config.extrapolation,
        }
    }

    /// Override the edge policy used when resampling curves
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Pin one calibration key to a version
    pub fn with_version(mut self, key: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(key.into(), version.into());
        self
    }

    fn version_for(&self, key: &str) -> &str {
        self.versions
            .get(key)
            .map(String::as_str)
            .unwrap_or(&self.default_version)
    }

    fn chain(position: u8) -> Result<TelescopeChain> {
        TelescopeChain::foxsi4(position).ok_or(ResponseError::UnknownPosition(position))
    }

    fn load_scalars(
        &self,
        chain: &TelescopeChain,
        config: &ObservingConfig,
    ) -> Result<Vec<ScalarResponse>> {
        chain
            .stages_for(config)
            .iter()
            .map(|stage| -> Result<ScalarResponse> {
                let path = self.resolver.resolve(stage.key, self.version_for(stage.key))?;
                Ok(stage.load(&path, config)?)
            })
            .collect()
    }

    fn load_matrix(
        &self,
        chain: &TelescopeChain,
        config: &ObservingConfig,
    ) -> Result<Option<MatrixResponse>> {
        let Some(detector) = &chain.detector else {
            return Ok(None);
        };
        let path = self
            .resolver
            .resolve(detector.key, self.version_for(detector.key))?;
        Ok(Some(detector.load(&path, config)?))
    }

    /// Full product for one telescope position
    pub fn build(&self, position: u8, config: &ObservingConfig) -> Result<ResponseProduct> {
        let chain = Self::chain(position)?;
        let mut components: Vec<ComponentResponse> = self
            .load_scalars(&chain, config)?
            .into_iter()
            .map(ComponentResponse::from)
            .collect();
        if let Some(matrix) = self.load_matrix(&chain, config)? {
            components.push(matrix.into());
        }
        assemble(
            &chain.label,
            components,
            config.mid_energies.as_ref(),
            self.extrapolation,
        )
    }

    /// Effective area only.
    ///
    /// Unlike [`Assembler::build`] this honours `mid_energies` even when the
    /// telescope has a detector, and never opens the detector file.
    pub fn arf(&self, position: u8, config: &ObservingConfig) -> Result<Arf> {
        let chain = Self::chain(position)?;
        let scalars = self.load_scalars(&chain, config)?;
        let (grid, _) = choose_grid(&scalars, None, config.mid_energies.as_ref())?;
        multiply_onto(&chain.label, &scalars, &grid, self.extrapolation)
    }

    /// Detector redistribution matrix only; `None` for telescopes without one
    pub fn rmf(&self, position: u8, config: &ObservingConfig) -> Result<Option<ResponseMatrix>> {
        let chain = Self::chain(position)?;
        let Some(matrix) = self.load_matrix(&chain, config)? else {
            return Ok(None);
        };
        Ok(Some(ResponseMatrix::new(
            &chain.label,
            matrix.input().clone(),
            matrix.output().clone(),
            matrix.values().clone(),
        )?))
    }

    /// Build several positions in parallel, one result per position
    pub fn build_many(
        &self,
        positions: &[u8],
        config: &ObservingConfig,
    ) -> Vec<Result<ResponseProduct>> {
        positions
            .par_iter()
            .map(|&position| self.build(position, config))
            .collect()
    }
}
