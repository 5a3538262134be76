//! FOXSI-4 telescope positions and their photon paths.
//!
//! Each of the seven positions is an ordered chain of components from the
//! entrance aperture to the focal plane. Scalar stages multiply into the
//! effective area; the optional detector stage is always last.
//!
//! | Position | Optic               | Focal plane |
//! |----------|---------------------|-------------|
//! | 0        | MSFC hi-res X10/FM2 | CMOS 0      |
//! | 1        | Nagoya SXT          | CMOS 1      |
//! | 2        | MSFC heritage X-7   | CdTe 4      |
//! | 3        | MSFC hi-res X09/FM1 | CdTe 2      |
//! | 4        | Nagoya HXT          | CdTe 3      |
//! | 5        | MSFC heritage X-8   | CdTe 1      |
//! | 6        | MSFC hi-res X11/FM3 | none        |

use std::path::Path;

use uom::si::f64::Time;

use crate::components::attenuation::{load_atmosphere, load_collimator, load_transmission};
use crate::components::detector::{load_detector, DetectorSelection};
use crate::components::optics::load_optic;
use crate::components::quantum_efficiency::load_quantum_efficiency;
use crate::components::{
    AngleSelection, ComponentKind, LoadError, MatrixResponse, RegionSelection, ScalarResponse,
};
use crate::grid::EnergyGrid;
use crate::raw::{DetectorSide, EventType};

/// Number of telescope positions on the payload
pub const N_POSITIONS: u8 = 7;

/// Calibration key of the residual-atmosphere transmission
pub const ATMOSPHERE_KEY: &str = "atmosphere";

/// Physical configuration a response is requested for
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservingConfig {
    pub off_axis: AngleSelection,
    pub region: RegionSelection,
    /// Flight-time window; adds the residual atmosphere to every chain
    pub time_range: Option<(Time, Time)>,
    /// Photon grid for ARF-only products
    pub mid_energies: Option<EnergyGrid>,
    /// Prefer modelled curves where a file carries both
    pub use_model: bool,
    pub side: DetectorSide,
    pub event_type: EventType,
}

impl ObservingConfig {
    /// The detector-matrix part of this configuration
    pub fn detector_selection(&self) -> DetectorSelection {
        DetectorSelection {
            region: self.region,
            side: self.side,
            event_type: self.event_type,
        }
    }
}

/// How a scalar stage's file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLoader {
    Transmission,
    Optic,
    Collimator,
    QuantumEfficiency,
    Atmosphere,
}

/// One energy-dependent element of a photon path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarStage {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: ComponentKind,
    pub loader: StageLoader,
}

impl ScalarStage {
    const fn new(
        key: &'static str,
        label: &'static str,
        kind: ComponentKind,
        loader: StageLoader,
    ) -> Self {
        Self {
            key,
            label,
            kind,
            loader,
        }
    }

    pub fn load(&self, path: &Path, config: &ObservingConfig) -> Result<ScalarResponse, LoadError> {
        match self.loader {
            StageLoader::Transmission => {
                load_transmission(path, self.kind, self.label, config.use_model)
            }
            StageLoader::Optic => load_optic(path, self.label, config.off_axis, config.use_model),
            StageLoader::Collimator => load_collimator(path, self.label, config.off_axis),
            StageLoader::QuantumEfficiency => load_quantum_efficiency(path, self.label),
            StageLoader::Atmosphere => {
                let range = config.time_range.ok_or_else(|| {
                    LoadError::malformed(self.label, "atmosphere requested without a time range")
                })?;
                load_atmosphere(path, self.label, range)
            }
        }
    }
}

/// The detector at the end of a photon path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorStage {
    pub key: &'static str,
    pub label: &'static str,
}

impl DetectorStage {
    pub fn load(&self, path: &Path, config: &ObservingConfig) -> Result<MatrixResponse, LoadError> {
        load_detector(path, self.label, config.detector_selection())
    }
}

/// Ordered photon path of one telescope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelescopeChain {
    pub position: u8,
    pub label: String,
    pub stages: Vec<ScalarStage>,
    pub detector: Option<DetectorStage>,
}

const fn stage(
    key: &'static str,
    label: &'static str,
    kind: ComponentKind,
    loader: StageLoader,
) -> ScalarStage {
    ScalarStage::new(key, label, kind, loader)
}

const fn filter(key: &'static str, label: &'static str) -> ScalarStage {
    stage(key, label, ComponentKind::Attenuator, StageLoader::Transmission)
}

const fn optic(key: &'static str, label: &'static str) -> ScalarStage {
    stage(key, label, ComponentKind::Optic, StageLoader::Optic)
}

const THERMAL_BLANKET: ScalarStage = filter("thermal_blanket", "thermal blanket");
const AL_MYLAR: ScalarStage = filter("al_mylar", "Al-Mylar attenuator");
const PIXELATED: ScalarStage = filter("pixelated_attenuator", "pixelated attenuator");

fn detector(key: &'static str, label: &'static str) -> Option<DetectorStage> {
    Some(DetectorStage { key, label })
}

impl TelescopeChain {
    /// The hardcoded chain for a payload position
    pub fn foxsi4(position: u8) -> Option<Self> {
        use ComponentKind::{Collimator, QuantumEfficiency};
        use StageLoader as L;

        let (stages, detector) = match position {
            0 => (
                vec![
                    filter("cmos_prefilter_0", "CMOS 0 pre-filter"),
                    stage("cmos_collimator_0", "CMOS 0 collimator", Collimator, L::Collimator),
                    optic("optic_msfc_x10_fm2", "MSFC hi-res X10/FM2"),
                    filter("cmos_obf_0", "CMOS 0 optical blocking filter"),
                    stage("cmos_qe_0", "CMOS 0 QE", QuantumEfficiency, L::QuantumEfficiency),
                ],
                detector("cmos_rmf_0", "CMOS 0"),
            ),
            1 => (
                vec![
                    filter("cmos_prefilter_1", "CMOS 1 pre-filter"),
                    stage("cmos_collimator_1", "CMOS 1 collimator", Collimator, L::Collimator),
                    optic("optic_nagoya_sxt", "Nagoya SXT"),
                    filter("cmos_obf_1", "CMOS 1 optical blocking filter"),
                    stage("cmos_qe_1", "CMOS 1 QE", QuantumEfficiency, L::QuantumEfficiency),
                ],
                detector("cmos_rmf_1", "CMOS 1"),
            ),
            2 => (
                vec![
                    THERMAL_BLANKET,
                    optic("optic_msfc_x7", "MSFC heritage X-7"),
                    filter("uniform_al_2", "position 2 uniform Al"),
                ],
                detector("cdte4_rmf", "CdTe 4"),
            ),
            3 => (
                vec![
                    THERMAL_BLANKET,
                    optic("optic_msfc_x09_fm1", "MSFC hi-res X09/FM1"),
                    AL_MYLAR,
                    PIXELATED,
                ],
                detector("cdte2_rmf", "CdTe 2"),
            ),
            4 => (
                vec![
                    THERMAL_BLANKET,
                    optic("optic_nagoya_hxt", "Nagoya HXT"),
                    filter("uniform_al_4", "position 4 uniform Al"),
                ],
                detector("cdte3_rmf", "CdTe 3"),
            ),
            5 => (
                vec![
                    THERMAL_BLANKET,
                    optic("optic_msfc_x8", "MSFC heritage X-8"),
                    AL_MYLAR,
                    PIXELATED,
                ],
                detector("cdte1_rmf", "CdTe 1"),
            ),
            6 => (
                vec![
                    THERMAL_BLANKET,
                    optic("optic_msfc_x11_fm3", "MSFC hi-res X11/FM3"),
                    AL_MYLAR,
                ],
                None,
            ),
            _ => return None,
        };

        Some(Self {
            position,
            label: format!("foxsi4 position {position}"),
            stages,
            detector,
        })
    }

    /// Stages to load for a configuration, entrance first
    pub fn stages_for(&self, config: &ObservingConfig) -> Vec<ScalarStage> {
        let mut stages = Vec::with_capacity(self.stages.len() + 1);
        if config.time_range.is_some() {
            stages.push(stage(
                ATMOSPHERE_KEY,
                "residual atmosphere",
                ComponentKind::Atmosphere,
                StageLoader::Atmosphere,
            ));
        }
        stages.extend(self.stages.iter().cloned());
        stages
    }

    /// Every calibration key this chain can touch
    pub fn keys(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .map(|s| s.key)
            .chain(self.detector.as_ref().map(|d| d.key))
            .collect()
    }
}
