//! Test helpers for the response workspace.
//!
//! Provides a temporary calibration tree populated with small synthetic
//! files for every FOXSI-4 component, plus a location for test artifacts.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),

    #[error("Failed to write fixture: {0}")]
    Io(#[from] std::io::Error),
}

/// Returns the path to the project root directory.
///
/// Walks up from the current directory until it finds the Cargo.toml that
/// defines the workspace.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {e}"))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {e}"))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

/// Lazily initialized project root path
static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Directory for test artifacts such as serialized products, created on demand
pub fn get_output_dir() -> PathBuf {
    let output_dir = PROJECT_ROOT.join("test_output");
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }
    output_dir
}

/// Path of a file inside the artifact directory
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// Sample energies (keV) shared by the synthetic transmission curves
pub const CURVE_ENERGIES_KEV: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];

/// Sample energies (keV) of the synthetic optic curves
pub const OPTIC_ENERGIES_KEV: [f64; 3] = [1.0, 3.0, 5.0];

/// On-axis optic effective area (cm²) at [`OPTIC_ENERGIES_KEV`]
pub const OPTIC_AREA_CM2: [f64; 3] = [50.0, 40.0, 30.0];

/// Off-axis angles (arcmin) of the synthetic optic families
pub const OPTIC_OFF_AXIS_ARCMIN: [f64; 5] = [-6.0, -3.0, 0.0, 3.0, 6.0];

/// Area scale for each member of [`OPTIC_OFF_AXIS_ARCMIN`]
pub const OPTIC_OFF_AXIS_SCALE: [f64; 5] = [0.5, 0.8, 1.0, 0.8, 0.5];

pub const THERMAL_BLANKET: f64 = 0.9;
pub const AL_MYLAR: f64 = 0.5;
pub const UNIFORM_AL: f64 = 0.8;
pub const PIXELATED_MEASURED: f64 = 0.4;
pub const PIXELATED_MODELED: f64 = 0.6;
pub const CMOS_FILTER: f64 = 0.95;
pub const CMOS_QE: f64 = 0.8;

/// Collimator aperture ratio against off-axis angle (arcmin)
pub const COLLIMATOR: [(f64, f64); 3] = [(0.0, 1.0), (5.0, 0.7), (10.0, 0.3)];

/// Atmospheric transmission against flight time (s)
pub const ATMOSPHERE: [(f64, f64); 3] = [(100.0, 0.5), (200.0, 0.7), (300.0, 0.9)];

/// A temporary calibration tree laid out as `<key>_v<version>.<ext>`
pub struct CalibrationDir {
    dir: TempDir,
}

impl CalibrationDir {
    /// An empty calibration tree
    pub fn empty() -> Result<Self, TestHelperError> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// A tree holding version 1 of every FOXSI-4 calibration key
    pub fn foxsi4() -> Result<Self, TestHelperError> {
        let cal = Self::empty()?;
        cal.write_all_foxsi4("1")?;
        Ok(cal)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_text(
        &self,
        key: &str,
        version: &str,
        ext: &str,
        text: &str,
    ) -> Result<PathBuf, TestHelperError> {
        let path = self.dir.path().join(format!("{key}_v{version}.{ext}"));
        std::fs::write(&path, text)?;
        Ok(path)
    }

    pub fn write_csv(
        &self,
        key: &str,
        version: &str,
        text: &str,
    ) -> Result<PathBuf, TestHelperError> {
        self.write_text(key, version, "csv", text)
    }

    pub fn write_json(
        &self,
        key: &str,
        version: &str,
        value: &Value,
    ) -> Result<PathBuf, TestHelperError> {
        let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
        self.write_text(key, version, "json", &text)
    }

    /// Remove a fixture file, to exercise missing-file handling
    pub fn remove(&self, key: &str, version: &str) -> Result<(), TestHelperError> {
        for ext in ["csv", "json"] {
            let path = self.dir.path().join(format!("{key}_v{version}.{ext}"));
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn write_all_foxsi4(&self, version: &str) -> Result<(), TestHelperError> {
        let blanket = constant_curve("transmission", THERMAL_BLANKET);
        self.write_csv("thermal_blanket", version, &blanket)?;
        self.write_csv("al_mylar", version, &constant_curve("transmission", AL_MYLAR))?;
        self.write_csv("pixelated_attenuator", version, &pixelated_curve())?;
        for key in ["uniform_al_2", "uniform_al_4"] {
            self.write_csv(key, version, &format!("transmission\n{UNIFORM_AL}\n"))?;
        }

        for key in ["optic_msfc_x7", "optic_msfc_x8"] {
            self.write_json(key, version, &optic_family())?;
        }
        for key in [
            "optic_msfc_x09_fm1",
            "optic_msfc_x10_fm2",
            "optic_msfc_x11_fm3",
            "optic_nagoya_sxt",
            "optic_nagoya_hxt",
        ] {
            self.write_csv(key, version, &optic_curve())?;
        }

        let cmos_filter = constant_curve("transmission", CMOS_FILTER);
        for n in 0..2 {
            self.write_csv(&format!("cmos_prefilter_{n}"), version, &cmos_filter)?;
            self.write_csv(&format!("cmos_obf_{n}"), version, &cmos_filter)?;
            self.write_csv(&format!("cmos_qe_{n}"), version, &constant_curve("qe", CMOS_QE))?;
            self.write_json(&format!("cmos_collimator_{n}"), version, &collimator_family())?;
            self.write_json(&format!("cmos_rmf_{n}"), version, &identity_matrix(&[0]))?;
        }

        for key in ["cdte1_rmf", "cdte2_rmf", "cdte3_rmf", "cdte4_rmf"] {
            self.write_json(key, version, &identity_matrix(&[0, 1, 2]))?;
        }

        self.write_json("atmosphere", version, &atmosphere_family())?;
        Ok(())
    }
}

/// Curve table with the same value at every [`CURVE_ENERGIES_KEV`]
pub fn constant_curve(column: &str, value: f64) -> String {
    let mut text = format!("energy[keV],{column}\n");
    for e in CURVE_ENERGIES_KEV {
        text.push_str(&format!("{e},{value}\n"));
    }
    text
}

fn pixelated_curve() -> String {
    let mut text = "energy[keV],measured_transmission,modeled_transmission\n".to_string();
    for e in CURVE_ENERGIES_KEV {
        text.push_str(&format!("{e},{PIXELATED_MEASURED},{PIXELATED_MODELED}\n"));
    }
    text
}

/// On-axis optic effective-area table
pub fn optic_curve() -> String {
    let mut text = "energy[keV],area[cm^2]\n".to_string();
    for (e, a) in OPTIC_ENERGIES_KEV.iter().zip(OPTIC_AREA_CM2) {
        text.push_str(&format!("{e},{a}\n"));
    }
    text
}

/// Off-axis optic family document
pub fn optic_family() -> Value {
    let members: Vec<Value> = OPTIC_OFF_AXIS_ARCMIN
        .iter()
        .zip(OPTIC_OFF_AXIS_SCALE)
        .map(|(angle, scale)| {
            let values: Vec<f64> = OPTIC_AREA_CM2.iter().map(|a| a * scale).collect();
            json!({ "parameter": angle, "values": values })
        })
        .collect();
    json!({
        "parameter": { "name": "off_axis", "unit": "arcmin" },
        "energy": { "unit": "keV", "midpoints": OPTIC_ENERGIES_KEV },
        "unit": "cm^2",
        "members": members,
    })
}

fn collimator_family() -> Value {
    let members: Vec<Value> = COLLIMATOR
        .iter()
        .map(|(angle, ratio)| json!({ "parameter": angle, "values": [ratio] }))
        .collect();
    json!({
        "parameter": { "name": "off_axis", "unit": "arcmin" },
        "unit": "",
        "members": members,
    })
}

fn atmosphere_family() -> Value {
    let members: Vec<Value> = ATMOSPHERE
        .iter()
        .map(|(time, t)| json!({ "parameter": time, "values": vec![*t; CURVE_ENERGIES_KEV.len()] }))
        .collect();
    json!({
        "parameter": { "name": "time", "unit": "s" },
        "energy": { "unit": "keV", "midpoints": CURVE_ENERGIES_KEV },
        "unit": "",
        "members": members,
    })
}

/// Bin edges whose midpoints are [`CURVE_ENERGIES_KEV`]
pub fn curve_edges_kev() -> Vec<f64> {
    let mut edges: Vec<f64> = CURVE_ENERGIES_KEV.iter().map(|e| e - 0.5).collect();
    edges.push(CURVE_ENERGIES_KEV[CURVE_ENERGIES_KEV.len() - 1] + 0.5);
    edges
}

/// Identity redistribution on the curve grid, one member per region.
///
/// Region `r` has diagonal `1 - 0.1 r` so tests can tell regions apart.
pub fn identity_matrix(regions: &[u8]) -> Value {
    let n = CURVE_ENERGIES_KEV.len();
    let members: Vec<Value> = regions
        .iter()
        .map(|&region| {
            let diagonal = 1.0 - 0.1 * f64::from(region);
            let matrix: Vec<Vec<f64>> = (0..n)
                .map(|i| (0..n).map(|j| if i == j { diagonal } else { 0.0 }).collect())
                .collect();
            json!({ "region": region, "matrix": matrix })
        })
        .collect();
    json!({
        "energy_unit": "keV",
        "input_edges": curve_edges_kev(),
        "output_edges": curve_edges_kev(),
        "unit": "ct/ph",
        "members": members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_exists() {
        let root = find_project_root().expect("Failed to find project root");
        assert!(root.exists());
        assert!(root.join("Cargo.toml").exists());
    }

    #[test]
    fn test_output_path() {
        let path = output_path("product.json");
        assert_eq!(path, get_output_dir().join("product.json"));
    }

    #[test]
    fn test_foxsi4_tree_written() {
        let cal = CalibrationDir::foxsi4().unwrap();
        assert!(cal.path().join("thermal_blanket_v1.csv").is_file());
        assert!(cal.path().join("optic_msfc_x7_v1.json").is_file());
        assert!(cal.path().join("cdte2_rmf_v1.json").is_file());

        cal.remove("cdte2_rmf", "1").unwrap();
        assert!(!cal.path().join("cdte2_rmf_v1.json").exists());
    }

    #[test]
    fn test_curve_edges() {
        assert_eq!(curve_edges_kev(), vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);
    }
}
