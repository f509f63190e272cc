use crate::core::priority::StatusPolicy;
use crate::types::{MosaicError, MosaicResult, ObservationBatch, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How per-band uncertainty is derived from the accumulated squares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyMode {
    /// sqrt(sum_sq / n - mean^2) of the reflectances themselves
    PopulationSigma,
    /// sqrt(sum_sq) / n, for inputs that are per-observation uncertainties
    PropagatedError,
}

/// Band selection and thresholds for the best-pixel heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPixelParams {
    /// Three visible bands averaged into a brightness value
    pub brightness_bands: Vec<usize>,
    pub green_band: usize,
    pub red_band: usize,
    pub nir_band: usize,
    /// Band compared when the darker candidate is preferred
    pub dark_band: usize,
    /// Pairwise-mean NDWI above this means water
    pub water_index_threshold: f32,
    pub low_brightness: f32,
    pub low_vegetation_index: f32,
    pub low_nir: f32,
}

impl BestPixelParams {
    /// Heuristic thresholds used with visible/NIR band indices
    pub fn with_bands(brightness_bands: [usize; 3], green: usize, red: usize, nir: usize, dark: usize) -> Self {
        Self {
            brightness_bands: brightness_bands.to_vec(),
            green_band: green,
            red_band: red,
            nir_band: nir,
            dark_band: dark,
            water_index_threshold: 0.1,
            low_brightness: 0.08,
            low_vegetation_index: 0.1,
            low_nir: 0.1,
        }
    }
}

/// Threshold formula applied by the temporal threshold detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdVariant {
    /// Cloud and shadow thresholds bounded by the elevated tail
    ElevatedTail,
    /// Cloud threshold only
    OneSided,
}

/// Temporal threshold detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub variant: ThresholdVariant,
    /// Band whose statistics drive the thresholds
    pub brightness_band: usize,
    /// Statuses considered clear enough to contribute
    pub clear_statuses: Vec<Status>,
}

/// Immutable per-job sensor configuration threaded through every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub sensor: String,
    /// Spatial resolution in meters
    pub resolution: u32,
    pub band_names: Vec<String>,
    pub derived_index_name: String,
    /// Band whose absence marks a water observation as deep water
    pub primary_band: usize,
    /// Statuses the classifier produces for this sensor
    pub statuses: Vec<Status>,
    pub uncertainty_mode: UncertaintyMode,
    /// Bands for which an uncertainty output is produced
    pub uncertainty_bands: Vec<usize>,
    pub best_pixel: Option<BestPixelParams>,
    pub threshold: Option<ThresholdParams>,
}

const BASIC_STATUSES: [Status; 6] = [
    Status::Invalid,
    Status::Land,
    Status::Water,
    Status::Snow,
    Status::Cloud,
    Status::CloudShadow,
];

fn names(prefix: &str, suffixes: &[&str]) -> Vec<String> {
    suffixes.iter().map(|s| format!("{}{}", prefix, s)).collect()
}

fn with_temporal_cloud() -> Vec<Status> {
    let mut statuses = BASIC_STATUSES.to_vec();
    statuses.push(Status::TemporalCloud);
    statuses
}

impl SensorConfig {
    /// Preset for a known sensor and resolution
    pub fn for_sensor(sensor: &str, resolution: u32) -> MosaicResult<Self> {
        let sensor_key = sensor.to_uppercase();
        let unknown = || MosaicError::UnknownSensor {
            sensor: sensor.to_string(),
            resolution,
        };

        let config = match (sensor_key.as_str(), resolution) {
            ("MERIS", 300) | ("MERIS", 1000) => Self {
                sensor: "MERIS".to_string(),
                resolution,
                band_names: names(
                    "sr_",
                    &["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "12", "13", "14"],
                ),
                derived_index_name: "ndvi".to_string(),
                primary_band: 11, // sr_13
                statuses: BASIC_STATUSES.to_vec(),
                uncertainty_mode: UncertaintyMode::PopulationSigma,
                uncertainty_bands: (0..13).collect(),
                best_pixel: None,
                threshold: None,
            },
            ("SPOT-VGT", 1000) | ("VEGETATION", 1000) => Self {
                sensor: "SPOT-VGT".to_string(),
                resolution,
                band_names: names("sr_", &["B0", "B2", "B3", "MIR"]),
                derived_index_name: "ndvi".to_string(),
                primary_band: 2, // sr_B3
                statuses: BASIC_STATUSES.to_vec(),
                uncertainty_mode: UncertaintyMode::PopulationSigma,
                uncertainty_bands: (0..4).collect(),
                best_pixel: None,
                threshold: None,
            },
            ("PROBA-V", 300) | ("PROBA-V", 1000) => Self {
                sensor: "PROBA-V".to_string(),
                resolution,
                band_names: names("sr_", &["1", "2", "3", "4"]),
                derived_index_name: "ndvi".to_string(),
                primary_band: 2, // NIR
                statuses: with_temporal_cloud(),
                uncertainty_mode: UncertaintyMode::PopulationSigma,
                uncertainty_bands: (0..4).collect(),
                best_pixel: None,
                threshold: Some(ThresholdParams {
                    variant: ThresholdVariant::ElevatedTail,
                    brightness_band: 0, // blue
                    clear_statuses: vec![Status::Land, Status::Water],
                }),
            },
            ("AVHRR", 1000) => Self {
                sensor: "AVHRR".to_string(),
                resolution,
                band_names: names("sr_", &["1", "2", "3"]),
                derived_index_name: "ndvi".to_string(),
                primary_band: 1,
                statuses: with_temporal_cloud(),
                uncertainty_mode: UncertaintyMode::PopulationSigma,
                uncertainty_bands: vec![0, 1],
                best_pixel: None,
                threshold: None,
            },
            ("MSI", 20) | ("MSI", 60) => Self {
                sensor: "MSI".to_string(),
                resolution,
                band_names: names(
                    "sr_",
                    &["B2", "B3", "B4", "B5", "B6", "B7", "B8", "B8A", "B11", "B12"],
                ),
                derived_index_name: "ndvi".to_string(),
                primary_band: 7, // B8A
                statuses: Status::ALL.to_vec(),
                uncertainty_mode: UncertaintyMode::PopulationSigma,
                uncertainty_bands: vec![0, 1, 2, 7, 8, 9],
                best_pixel: Some(BestPixelParams::with_bands([0, 1, 2], 1, 2, 7, 0)),
                threshold: Some(ThresholdParams {
                    variant: ThresholdVariant::OneSided,
                    brightness_band: 0,
                    clear_statuses: vec![
                        Status::Land,
                        Status::Bright,
                        Status::Haze,
                        Status::Dark,
                        Status::Water,
                    ],
                }),
            },
            _ => return Err(unknown()),
        };

        log::debug!("Sensor configuration {} @ {} m: {} bands", config.sensor, resolution, config.band_count());
        Ok(config)
    }

    /// Number of sensor bands
    pub fn band_count(&self) -> usize {
        self.band_names.len()
    }

    /// Number of accumulated values per pixel (bands plus derived index)
    pub fn value_count(&self) -> usize {
        self.band_count() + 1
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.band_names.iter().position(|b| b == name)
    }

    pub fn policy(&self) -> StatusPolicy {
        StatusPolicy::new(&self.statuses)
    }

    /// Check internal consistency, failing fast at setup time
    pub fn validate(&self) -> MosaicResult<()> {
        let band_count = self.band_count();
        let invalid = |msg: String| Err(MosaicError::InvalidConfig(format!("{}: {}", self.sensor, msg)));

        if band_count == 0 {
            return invalid("no bands configured".to_string());
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.band_names.iter().find(|b| !seen.insert(b.as_str())) {
            return invalid(format!("duplicate band name {}", dup));
        }

        if self.primary_band >= band_count {
            return invalid(format!("primary band {} out of range", self.primary_band));
        }

        if !self.statuses.contains(&Status::Land) {
            return invalid("status set must include land".to_string());
        }

        if let Some(band) = self.uncertainty_bands.iter().find(|b| **b >= band_count) {
            return invalid(format!("uncertainty band {} out of range", band));
        }

        if let Some(best) = &self.best_pixel {
            if best.brightness_bands.len() != 3 {
                return invalid(format!(
                    "best pixel needs 3 brightness bands, got {}",
                    best.brightness_bands.len()
                ));
            }
            let bands = best
                .brightness_bands
                .iter()
                .chain([&best.green_band, &best.red_band, &best.nir_band, &best.dark_band]);
            for band in bands {
                if *band >= band_count {
                    return invalid(format!("best pixel band {} out of range", band));
                }
            }
        }

        if let Some(threshold) = &self.threshold {
            if threshold.brightness_band >= band_count {
                return invalid(format!(
                    "threshold brightness band {} out of range",
                    threshold.brightness_band
                ));
            }
            for status in &threshold.clear_statuses {
                if !StatusPolicy::contributes_bands(*status) {
                    return invalid(format!("{} cannot be a clear status", status));
                }
                if !self.statuses.contains(status) {
                    return invalid(format!("clear status {} not produced by this sensor", status));
                }
            }
        }

        Ok(())
    }

    /// Reject a batch whose band layout does not match this sensor
    pub fn check_batch(&self, batch: &ObservationBatch) -> MosaicResult<()> {
        if batch.band_count() != self.band_count() {
            return Err(MosaicError::BandCountMismatch {
                expected: self.band_count(),
                actual: batch.band_count(),
            });
        }
        Ok(())
    }

    /// Ordered feature names matching `FinalizedTile::to_feature_stack`
    pub fn output_feature_names(&self) -> Vec<String> {
        let mut features = vec!["status".to_string()];
        features.extend(self.policy().reported().map(|s| format!("{}_count", s.name())));
        features.extend(self.band_names.iter().map(|b| format!("{}_mean", b)));
        features.push(format!("{}_mean", self.derived_index_name));
        features.extend(
            self.uncertainty_bands
                .iter()
                .map(|i| format!("{}_uncertainty", self.band_names[*i])),
        );
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        let presets = [
            ("MERIS", 300),
            ("MERIS", 1000),
            ("SPOT-VGT", 1000),
            ("PROBA-V", 300),
            ("PROBA-V", 1000),
            ("AVHRR", 1000),
            ("MSI", 20),
            ("MSI", 60),
        ];

        for (sensor, resolution) in presets {
            let config = SensorConfig::for_sensor(sensor, resolution).unwrap();
            assert!(config.validate().is_ok(), "{} {}", sensor, resolution);
        }
    }

    #[test]
    fn test_unknown_sensor_resolution() {
        let result = SensorConfig::for_sensor("MERIS", 20);
        assert!(matches!(result, Err(MosaicError::UnknownSensor { resolution: 20, .. })));

        assert!(SensorConfig::for_sensor("OLCI", 300).is_err());
    }

    #[test]
    fn test_sensor_name_case_insensitive() {
        let config = SensorConfig::for_sensor("proba-v", 1000).unwrap();
        assert_eq!(config.sensor, "PROBA-V");
        assert_eq!(config.band_index("sr_3"), Some(2));
    }

    #[test]
    fn test_validation_rejects_bad_indices() {
        let mut config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
        config.primary_band = 4;
        assert!(matches!(config.validate(), Err(MosaicError::InvalidConfig(_))));

        let mut config = SensorConfig::for_sensor("MSI", 20).unwrap();
        if let Some(best) = config.best_pixel.as_mut() {
            best.brightness_bands.pop();
        }
        assert!(config.validate().is_err());

        let mut config = SensorConfig::for_sensor("PROBA-V", 300).unwrap();
        if let Some(threshold) = config.threshold.as_mut() {
            threshold.clear_statuses.push(Status::Cloud);
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_feature_names() {
        let config = SensorConfig::for_sensor("SPOT-VGT", 1000).unwrap();
        let names = config.output_feature_names();

        assert_eq!(
            names,
            vec![
                "status",
                "land_count",
                "water_count",
                "snow_count",
                "cloud_count",
                "cloud_shadow_count",
                "sr_B0_mean",
                "sr_B2_mean",
                "sr_B3_mean",
                "sr_MIR_mean",
                "ndvi_mean",
                "sr_B0_uncertainty",
                "sr_B2_uncertainty",
                "sr_B3_uncertainty",
                "sr_MIR_uncertainty",
            ]
        );
    }
}
