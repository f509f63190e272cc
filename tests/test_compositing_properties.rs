use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, Array3};
use sdrmosaic::core::{AccumulationState, CompositingAggregator, Finalizer};
use sdrmosaic::{AccumulationPeriod, Observation, ObservationBatch, SensorConfig, Status, TileCompositor};

fn period() -> AccumulationPeriod {
    AccumulationPeriod::monthly(2019, 5).unwrap()
}

/// Single-pixel pass
fn pixel_pass(status: Status, bands: &[f32], ndvi: f32, t: f64) -> ObservationBatch {
    let cube = Array3::from_shape_vec((bands.len(), 1, 1), bands.to_vec()).unwrap();
    ObservationBatch::with_pass_time(
        Array2::from_elem((1, 1), status),
        cube,
        Array2::from_elem((1, 1), ndvi),
        t,
    )
    .unwrap()
}

fn composite_pixel(config: &SensorConfig, passes: &[ObservationBatch]) -> sdrmosaic::CompositeResult {
    let mut compositor = TileCompositor::new(config, 1, 1, period(), (1, 1)).unwrap();
    for pass in passes {
        compositor.add_pass(pass).unwrap();
    }
    compositor.finish()
}

#[test]
fn test_single_observation_idempotence() {
    let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
    let t = period().start_day() + 4.25;
    let bands = [0.05, 0.08, 0.31, 0.22];

    let result = composite_pixel(&config, &[pixel_pass(Status::Land, &bands, 0.59, t)]);
    let px = result.tile.pixel(0, 0);

    assert_eq!(px.status, Status::Land);
    assert_eq!(px.weight, 1);
    for (mean, expected) in px.band_mean.iter().zip(bands.iter()) {
        assert_abs_diff_eq!(*mean, *expected, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(px.derived_index_mean, 0.59, epsilon = 1e-6);
    for sigma in &px.band_uncertainty {
        assert_abs_diff_eq!(*sigma, 0.0, epsilon = 1e-4);
    }
}

#[test]
fn test_single_observation_has_zero_uncertainty_for_every_preset() {
    let presets = [
        ("MERIS", 300),
        ("SPOT-VGT", 1000),
        ("PROBA-V", 300),
        ("PROBA-V", 1000),
        ("AVHRR", 1000),
        ("MSI", 20),
    ];
    let t = period().start_day() + 6.0;

    for (sensor, resolution) in presets {
        let config = SensorConfig::for_sensor(sensor, resolution).unwrap();
        let bands: Vec<f32> = (0..config.band_count()).map(|b| 0.05 + 0.03 * b as f32).collect();

        let result = composite_pixel(&config, &[pixel_pass(Status::Land, &bands, 0.4, t)]);
        let px = result.tile.pixel(0, 0);

        assert_eq!(px.weight, 1, "{}", sensor);
        assert_eq!(px.band_uncertainty.len(), config.uncertainty_bands.len());
        for sigma in &px.band_uncertainty {
            assert_abs_diff_eq!(*sigma, 0.0, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_any_land_wins() {
    let config = SensorConfig::for_sensor("MSI", 20).unwrap();
    let t = period().start_day() + 1.0;
    let others = [
        Status::Water,
        Status::Snow,
        Status::Cloud,
        Status::CloudShadow,
        Status::Haze,
        Status::Bright,
        Status::Dark,
        Status::Invalid,
    ];

    let clear = [0.04, 0.06, 0.05, 0.1, 0.2, 0.25, 0.3, 0.31, 0.2, 0.12];
    let mut deep = clear;
    deep[config.primary_band] = f32::NAN;

    for land_position in 0..=others.len() {
        let mut passes: Vec<ObservationBatch> = others
            .iter()
            .map(|s| pixel_pass(*s, &clear, 0.3, t))
            .collect();
        passes.push(pixel_pass(Status::Water, &deep, f32::NAN, t));
        passes.insert(land_position, pixel_pass(Status::Land, &clear, 0.5, t));

        let result = composite_pixel(&config, &passes);
        assert_eq!(
            result.tile.status[[0, 0]],
            Status::Land,
            "land inserted at position {}",
            land_position
        );
    }
}

#[test]
fn test_deep_water_leaves_sums_untouched() {
    let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
    let aggregator = CompositingAggregator::new(&config);
    let mut state = AccumulationState::new(config.value_count());

    let land = Observation::new(Status::Land, vec![0.1, 0.2, 0.3, 0.4], 0.5, 10.0);
    aggregator.apply(&mut state.view_mut(), &land.view());
    let sum_before: Array1<f64> = state.sum.clone();
    let sum_sq_before: Array1<f64> = state.sum_sq.clone();

    let deep = Observation::new(Status::Water, vec![0.02, 0.01, f32::NAN, 0.0], 0.0, 11.0);
    aggregator.apply(&mut state.view_mut(), &deep.view());

    assert_eq!(state.deep_water, 1);
    assert_eq!(state.sum, sum_before);
    assert_eq!(state.sum_sq, sum_sq_before);
    assert_eq!(state.status, Status::Land);
}

#[test]
fn test_deep_water_only_pixel() {
    let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
    let t = period().start_day();
    let deep = [0.02, 0.01, f32::NAN, 0.0];

    let result = composite_pixel(
        &config,
        &[
            pixel_pass(Status::Cloud, &[0.6; 4], 0.0, t),
            pixel_pass(Status::Water, &deep, f32::NAN, t + 1.0),
            pixel_pass(Status::Water, &deep, f32::NAN, t + 2.0),
        ],
    );
    let px = result.tile.pixel(0, 0);

    assert_eq!(px.status, Status::Water);
    assert_eq!(px.weight, 2);
    assert_eq!(result.tile.count_of(Status::Water).unwrap()[[0, 0]], 2);
    assert!(px.band_mean.iter().all(|v| v.is_nan()));
}

#[test]
fn test_same_orbit_guard() {
    let config = SensorConfig::for_sensor("PROBA-V", 300).unwrap();
    let t = period().start_day() + 12.0;
    let bands = |blue: f32| [blue, 0.08, 0.3, 0.2];

    let split = composite_pixel(
        &config,
        &[
            pixel_pass(Status::Land, &bands(0.05), 0.6, t),
            pixel_pass(Status::Land, &bands(0.07), 0.5, t + 1.5),
        ],
    );
    assert!(split.thresholds.cloud[[0, 0]].is_nan());
    assert!(split.thresholds.shadow[[0, 0]].is_nan());

    let same = composite_pixel(
        &config,
        &[
            pixel_pass(Status::Land, &bands(0.05), 0.6, t),
            pixel_pass(Status::Land, &bands(0.07), 0.5, t + 0.5),
        ],
    );
    assert!(same.thresholds.cloud[[0, 0]].is_finite());
    assert!(same.thresholds.shadow[[0, 0]].is_finite());
}

#[test]
fn test_weighted_statistics() {
    let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
    let t = period().start_day() + 2.0;

    let passes: Vec<_> = [0.2f32, 0.4, 0.6]
        .iter()
        .map(|v| pixel_pass(Status::Land, &[*v; 4], *v, t))
        .collect();
    let px = composite_pixel(&config, &passes).tile.pixel(0, 0);

    assert_eq!(px.weight, 3);
    assert_abs_diff_eq!(px.band_mean[0], 0.4, epsilon = 1e-6);
    assert_abs_diff_eq!(px.band_uncertainty[0], 0.163_30, epsilon = 1e-5);
}

#[test]
fn test_clearing_on_transition() {
    let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
    let t = period().start_day() + 2.0;

    let result = composite_pixel(
        &config,
        &[
            pixel_pass(Status::Water, &[0.1; 4], -0.2, t),
            pixel_pass(Status::Land, &[0.9; 4], 0.4, t + 3.0),
        ],
    );
    let px = result.tile.pixel(0, 0);

    assert_eq!(px.status, Status::Land);
    assert_eq!(px.weight, 1);
    assert_abs_diff_eq!(px.band_mean[0], 0.9, epsilon = 1e-6);
    assert_eq!(result.tile.count_of(Status::Water).unwrap()[[0, 0]], 1);
}

#[test]
fn test_ancillary_rank_tie_break() {
    let config = SensorConfig::for_sensor("MSI", 60).unwrap();
    let t = period().start_day() + 2.0;

    let result = composite_pixel(
        &config,
        &[
            pixel_pass(Status::Haze, &[0.15; 10], 0.1, t),
            pixel_pass(Status::Bright, &[0.45; 10], 0.05, t + 5.0),
        ],
    );
    let px = result.tile.pixel(0, 0);

    assert_eq!(px.status, Status::Bright);
    assert_eq!(px.weight, 1);
    assert!(px.band_mean.iter().all(|v| (v - 0.45).abs() < 1e-6));
    assert_eq!(result.tile.count_of(Status::Haze).unwrap()[[0, 0]], 0);
    assert_eq!(result.tile.count_of(Status::Bright).unwrap()[[0, 0]], 1);
}

#[test]
fn test_finalizer_is_read_only() {
    let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
    let aggregator = CompositingAggregator::new(&config);
    let finalizer = Finalizer::new(&config);
    let mut state = AccumulationState::new(config.value_count());

    for v in [0.2f32, 0.4] {
        let obs = Observation::new(Status::Land, vec![v; 4], v, 0.0);
        aggregator.apply(&mut state.view_mut(), &obs.view());
    }

    let before = state.clone();
    let first = finalizer.finalize_pixel(&state.view());
    let second = finalizer.finalize_pixel(&state.view());

    assert_eq!(first, second);
    assert_eq!(state.sum, before.sum);
    assert_eq!(state.count(Status::Land), 2);
}
