use crate::core::sensor::{SensorConfig, ThresholdParams, ThresholdVariant};
use crate::core::stats::mean_and_sigma;
use crate::types::{BandImage, PixelObservation, Status};
use ndarray::{Array2, Zip};

/// Observations further apart than this (days) are not from the same orbit
const SAME_ORBIT_WINDOW_DAYS: f64 = 1.0;

/// Per-pixel statistics of the clear-sky brightness band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdState {
    pub count: u32,
    pub sum: f64,
    pub sum_sq: f64,
    pub first_timestamp: f64,
    pub orbit_consistent: bool,
    pub max_vegetation_index: f32,
    /// Brightness value of the observation with the highest vegetation index
    pub sdr_at_max_vegetation_index: f64,
}

impl Default for ThresholdState {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            first_timestamp: f64::NAN,
            orbit_consistent: true,
            max_vegetation_index: f32::NEG_INFINITY,
            sdr_at_max_vegetation_index: f64::NAN,
        }
    }
}

/// Thresholds handed to the classifier for the next pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdResult {
    pub cloud: f32,
    pub shadow: f32,
}

impl ThresholdResult {
    pub const UNDEFINED: ThresholdResult = ThresholdResult {
        cloud: f32::NAN,
        shadow: f32::NAN,
    };
}

/// Cloud and shadow threshold maps of one tile
#[derive(Debug, Clone)]
pub struct ThresholdMaps {
    pub cloud: BandImage,
    pub shadow: BandImage,
}

/// Adaptive cloud / cloud-shadow brightness thresholds from clear observations
#[derive(Debug, Clone)]
pub struct TemporalThresholdDetector {
    params: ThresholdParams,
    clear: [bool; Status::COUNT],
}

impl TemporalThresholdDetector {
    pub fn new(params: ThresholdParams) -> Self {
        let mut clear = [false; Status::COUNT];
        for status in &params.clear_statuses {
            clear[status.index()] = true;
        }
        Self { params, clear }
    }

    /// Detector configured for the sensor, if it has one
    pub fn from_config(config: &SensorConfig) -> Option<Self> {
        config.threshold.clone().map(Self::new)
    }

    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }

    pub fn observe(&self, state: &mut ThresholdState, obs: &PixelObservation<'_>) {
        if !self.clear[obs.status.index()] {
            return;
        }
        let value = match obs.bands.get(self.params.brightness_band) {
            Some(v) if !v.is_nan() => *v as f64,
            _ => return,
        };

        // an observation without a usable time cannot be placed on an orbit
        if !obs.timestamp.is_finite() {
            state.orbit_consistent = false;
        } else if state.first_timestamp.is_nan() {
            state.first_timestamp = obs.timestamp;
        } else if (obs.timestamp - state.first_timestamp).abs() >= SAME_ORBIT_WINDOW_DAYS {
            state.orbit_consistent = false;
        }

        state.sum += value;
        state.sum_sq += value * value;
        state.count += 1;

        if obs.derived_index > state.max_vegetation_index {
            state.max_vegetation_index = obs.derived_index;
            state.sdr_at_max_vegetation_index = value;
        }
    }

    pub fn finalize(&self, state: &ThresholdState) -> ThresholdResult {
        if state.count < 2 || !state.orbit_consistent {
            return ThresholdResult::UNDEFINED;
        }

        let (mean, sigma) = mean_and_sigma(state.sum, state.sum_sq, state.count as f64);
        match self.params.variant {
            ThresholdVariant::ElevatedTail => {
                let cloud = (mean * 1.35)
                    .min(mean + sigma)
                    .min(state.sdr_at_max_vegetation_index + 2.0 * sigma);
                let shadow = (mean - sigma).min(mean * 0.65);
                ThresholdResult {
                    cloud: cloud as f32,
                    shadow: shadow as f32,
                }
            }
            ThresholdVariant::OneSided => ThresholdResult {
                cloud: (mean - 1.4 * sigma).min(mean * 1.4) as f32,
                shadow: f32::NAN,
            },
        }
    }
}

/// Threshold state of every pixel of a tile
#[derive(Debug, Clone)]
pub struct ThresholdGrid {
    states: Array2<ThresholdState>,
}

impl ThresholdGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            states: Array2::from_elem((rows, cols), ThresholdState::default()),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.states.dim()
    }

    pub fn state(&self, row: usize, col: usize) -> &ThresholdState {
        &self.states[[row, col]]
    }

    pub fn state_mut(&mut self, row: usize, col: usize) -> &mut ThresholdState {
        &mut self.states[[row, col]]
    }

    /// Per-pixel thresholds, computed in parallel when enabled
    #[cfg(feature = "parallel")]
    pub fn finalize(&self, detector: &TemporalThresholdDetector) -> ThresholdMaps {
        let results = Zip::from(&self.states).par_map_collect(|state| detector.finalize(state));
        Self::split(&results)
    }

    #[cfg(not(feature = "parallel"))]
    pub fn finalize(&self, detector: &TemporalThresholdDetector) -> ThresholdMaps {
        let results = Zip::from(&self.states).map_collect(|state| detector.finalize(state));
        Self::split(&results)
    }

    /// Maps for a tile without a detector
    pub fn undefined(rows: usize, cols: usize) -> ThresholdMaps {
        ThresholdMaps {
            cloud: Array2::from_elem((rows, cols), f32::NAN),
            shadow: Array2::from_elem((rows, cols), f32::NAN),
        }
    }

    fn split(results: &Array2<ThresholdResult>) -> ThresholdMaps {
        let maps = ThresholdMaps {
            cloud: results.mapv(|r| r.cloud),
            shadow: results.mapv(|r| r.shadow),
        };
        log::debug!(
            "Threshold maps: {} of {} pixels with a cloud threshold",
            maps.cloud.iter().filter(|v| v.is_finite()).count(),
            maps.cloud.len()
        );
        maps
    }
}
