//! Config-driven assembly and folding photon spectra through the SRM.

use approx::assert_relative_eq;
use response::components::RegionSelection;
use response::quantity::{Quantity1, Scalar};
use response::{
    fold, Assembler, EdgeFill, Extrapolation, ObservingConfig, ResponseConfig, ResponseError, Unit,
};
use test_helpers::{constant_curve, CalibrationDir, AL_MYLAR, PIXELATED_MEASURED, THERMAL_BLANKET};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_fold_counts_per_channel() {
    init();
    let cal = CalibrationDir::foxsi4().unwrap();
    let assembler = Assembler::from_config(&ResponseConfig::new(cal.path()));
    let config = ObservingConfig {
        region: RegionSelection::Region(1),
        ..Default::default()
    };
    let product = assembler.build(3, &config).unwrap();
    let srm = product.srm().unwrap();

    let flux = Unit::parse("ph/cm^2").unwrap();
    let spectrum = Quantity1::from_vec(vec![1.0, 0.0, 2.0, 0.0, 0.0], flux.clone());
    let counts = fold(srm, product.photon_grid(), &spectrum).unwrap();
    assert_eq!(counts.unit(), &Unit::parse("ct").unwrap());

    let arf = product.arf().values().values();
    let expected = [arf[0] * 0.9, 0.0, 2.0 * arf[2] * 0.9, 0.0, 0.0];
    for (got, want) in counts.values().iter().zip(expected) {
        assert_relative_eq!(*got, want, epsilon = 1e-9);
    }

    // Folding is linear in the spectrum
    let doubled = spectrum.multiply_scalar(&Scalar::scalar(2.0, Unit::dimensionless()));
    let twice = fold(srm, product.photon_grid(), &doubled).unwrap();
    for (a, b) in twice.values().iter().zip(counts.values().iter()) {
        assert_relative_eq!(*a, 2.0 * b, epsilon = 1e-9);
    }

    let short = Quantity1::from_vec(vec![1.0, 2.0], flux);
    assert!(fold(srm, product.photon_grid(), &short).is_err());
}

#[test]
fn test_config_file_drives_versions() {
    init();
    let cal = CalibrationDir::foxsi4().unwrap();
    cal.write_csv("al_mylar", "2", &constant_curve("transmission", 0.25))
        .unwrap();

    let mut config = ResponseConfig::new(cal.path());
    config
        .versions
        .insert("al_mylar".to_string(), "2".to_string());
    config.extrapolation = Extrapolation {
        below: EdgeFill::Fill(0.0),
        above: EdgeFill::Hold,
    };
    let path = cal.path().join("response.json");
    config.save_to_file(&path).unwrap();

    let loaded = ResponseConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let assembler = Assembler::from_config(&loaded);
    let product = assembler.build(3, &ObservingConfig::default()).unwrap();
    let v1_factor = THERMAL_BLANKET * AL_MYLAR * PIXELATED_MEASURED;
    let v2_factor = THERMAL_BLANKET * 0.25 * PIXELATED_MEASURED;
    assert_relative_eq!(
        product.arf().values().values()[0],
        50.0 * v2_factor,
        max_relative = 1e-9
    );
    assert!(v1_factor > v2_factor);

    // An override pointing at a missing version fails to resolve
    let missing = Assembler::from_config(&loaded).with_version("thermal_blanket", "9");
    assert!(matches!(
        missing.build(3, &ObservingConfig::default()),
        Err(ResponseError::NotFound(_))
    ));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ResponseConfig::load_from_file(&dir.path().join("absent.json")).is_err());
}
