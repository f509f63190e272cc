use sdrmosaic::core::{ThresholdVariant, UncertaintyMode};
use sdrmosaic::{AccumulationPeriod, MosaicError, ObservationBatch, SensorConfigReader, Status, TileCompositor};
use std::io::Write;

const PROBA_V_LIKE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sensorConfig>
    <sensor>PROBA-V</sensor>
    <resolution>333</resolution>
    <bands>
        <band>sr_blue</band>
        <band>sr_red</band>
        <band>sr_nir</band>
        <band>sr_swir</band>
    </bands>
    <derivedIndex>ndvi</derivedIndex>
    <primaryBand>sr_nir</primaryBand>
    <statuses>
        <status>invalid</status>
        <status>land</status>
        <status>water</status>
        <status>snow</status>
        <status>cloud</status>
        <status>cloud_shadow</status>
        <status>temporal_cloud</status>
    </statuses>
    <uncertainty mode="population_sigma">
        <band>sr_blue</band>
        <band>sr_red</band>
        <band>sr_nir</band>
        <band>sr_swir</band>
    </uncertainty>
    <threshold variant="elevated_tail">
        <brightnessBand>sr_blue</brightnessBand>
        <clearStatus>land</clearStatus>
        <clearStatus>water</clearStatus>
    </threshold>
</sensorConfig>
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_read_sensor_config_file() {
    let _ = env_logger::builder().is_test(true).try_init();

    let file = write_config(PROBA_V_LIKE);
    let config = SensorConfigReader::from_file(file.path()).unwrap();

    assert_eq!(config.sensor, "PROBA-V");
    assert_eq!(config.resolution, 333);
    assert_eq!(config.band_names, vec!["sr_blue", "sr_red", "sr_nir", "sr_swir"]);
    assert_eq!(config.primary_band, 2);
    assert_eq!(config.uncertainty_mode, UncertaintyMode::PopulationSigma);
    assert!(config.best_pixel.is_none());
    assert_eq!(config.threshold.as_ref().unwrap().variant, ThresholdVariant::ElevatedTail);
    assert!(config.policy().is_supported(Status::TemporalCloud));
    assert!(!config.policy().is_supported(Status::Haze));
}

#[test]
fn test_feature_names_match_stack() {
    let file = write_config(PROBA_V_LIKE);
    let config = SensorConfigReader::from_file(file.path()).unwrap();

    let period = AccumulationPeriod::monthly(2018, 2).unwrap();
    let t = period.start_day() + 0.5;
    let mut compositor = TileCompositor::new(&config, 3, 9, period, (2, 2)).unwrap();
    let pass = ObservationBatch::with_pass_time(
        ndarray::Array2::from_elem((2, 2), Status::Land),
        ndarray::Array3::from_elem((4, 2, 2), 0.1f32),
        ndarray::Array2::from_elem((2, 2), 0.4f32),
        t,
    )
    .unwrap();
    compositor.add_pass(&pass).unwrap();

    let result = compositor.finish();
    let names = config.output_feature_names();
    let stack = result.tile.to_feature_stack();

    assert_eq!(stack.dim().0, names.len());
    assert_eq!(names[0], "status");
    assert!(!names.contains(&"temporal_cloud_count".to_string()));
    assert!(names.contains(&"cloud_count".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("sr_swir_uncertainty"));

    let land = names.iter().position(|n| n == "land_count").unwrap();
    assert_eq!(stack[[0, 1, 1]], Status::Land.code() as f32);
    assert_eq!(stack[[land, 1, 1]], 1.0);

    // one observation per pixel: no spread
    let first_uncertainty = names.len() - config.uncertainty_bands.len();
    for layer in first_uncertainty..names.len() {
        assert_eq!(stack[[layer, 0, 0]], 0.0, "{}", names[layer]);
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no_such_sensor.xml");

    assert!(matches!(
        SensorConfigReader::from_file(&missing),
        Err(MosaicError::Io(_))
    ));
}

#[test]
fn test_inconsistent_config_rejected() {
    // threshold band that the sensor does not have
    let broken = PROBA_V_LIKE.replace(
        "<brightnessBand>sr_blue</brightnessBand>",
        "<brightnessBand>sr_green</brightnessBand>",
    );
    let file = write_config(&broken);

    assert!(matches!(
        SensorConfigReader::from_file(file.path()),
        Err(MosaicError::InvalidConfig(_))
    ));
}

#[test]
fn test_unknown_preset() {
    let xml = "<sensorConfig><sensor>OLCI</sensor><resolution>300</resolution></sensorConfig>";

    match SensorConfigReader::from_xml_str(xml) {
        Err(MosaicError::UnknownSensor { sensor, resolution }) => {
            assert_eq!(sensor, "OLCI");
            assert_eq!(resolution, 300);
        }
        other => panic!("expected unknown sensor, got {:?}", other),
    }
}
