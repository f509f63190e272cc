use crate::core::accumulator::TileAccumulator;
use crate::core::aggregator::CompositingAggregator;
use crate::core::finalize::{FinalizedTile, Finalizer};
use crate::core::sensor::SensorConfig;
use crate::core::spatial::SpatialBinner;
use crate::core::threshold::{TemporalThresholdDetector, ThresholdGrid, ThresholdMaps};
use crate::types::{AccumulationPeriod, MosaicError, MosaicResult, ObservationBatch, TileId};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What happened to the pixels of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStatistics {
    /// Pixels applied to the accumulator
    pub applied: usize,
    /// Pixels skipped for a timestamp outside the accumulation period
    pub outside_period: usize,
    /// Applied pixels whose status the sensor does not produce (counted as invalid)
    pub unsupported: usize,
}

/// Composited tile plus the thresholds for the next classification run
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub tile: FinalizedTile,
    pub thresholds: ThresholdMaps,
}

/// Temporal compositing of one tile over one accumulation period.
///
/// Passes are applied in the order they are added.
pub struct TileCompositor<'a> {
    config: &'a SensorConfig,
    period: AccumulationPeriod,
    aggregator: CompositingAggregator,
    detector: Option<TemporalThresholdDetector>,
    accumulator: TileAccumulator,
    thresholds: ThresholdGrid,
    passes: usize,
}

impl<'a> TileCompositor<'a> {
    pub fn new(
        config: &'a SensorConfig,
        tile_x: i32,
        tile_y: i32,
        period: AccumulationPeriod,
        dim: (usize, usize),
    ) -> MosaicResult<Self> {
        config.validate()?;

        let (rows, cols) = dim;
        if rows == 0 || cols == 0 {
            return Err(MosaicError::InvalidConfig(format!(
                "Tile grid must not be empty, got {}x{}",
                rows, cols
            )));
        }

        let tile = TileId {
            tile_x,
            tile_y,
            period_id: period.id,
        };
        log::debug!(
            "New tile compositor {} for {} ({} to {})",
            tile, config.sensor, period.start, period.end
        );

        Ok(Self {
            config,
            period,
            aggregator: CompositingAggregator::new(config),
            detector: TemporalThresholdDetector::from_config(config),
            accumulator: TileAccumulator::new(tile, rows, cols, config.value_count()),
            thresholds: ThresholdGrid::new(rows, cols),
            passes: 0,
        })
    }

    pub fn tile(&self) -> TileId {
        self.accumulator.tile()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.accumulator.dim()
    }

    /// Number of passes added so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn accumulator(&self) -> &TileAccumulator {
        &self.accumulator
    }

    /// Apply every in-period pixel of a pass to the accumulator and the
    /// threshold detector
    pub fn add_pass(&mut self, batch: &ObservationBatch) -> MosaicResult<PassStatistics> {
        self.config.check_batch(batch)?;

        let expected = self.accumulator.dim();
        if batch.dim() != expected {
            return Err(MosaicError::DimensionMismatch {
                expected,
                actual: batch.dim(),
            });
        }

        let (rows, cols) = expected;
        let mut stats = PassStatistics::default();

        for row in 0..rows {
            for col in 0..cols {
                let obs = batch.pixel(row, col);

                // NaN timestamps carry no date and are accepted
                if !obs.timestamp.is_nan() && !self.period.contains(obs.timestamp) {
                    stats.outside_period += 1;
                    continue;
                }
                if !self.aggregator.policy().is_supported(obs.status) {
                    stats.unsupported += 1;
                }

                self.aggregator.apply(&mut self.accumulator.pixel_mut(row, col), &obs);
                if let Some(detector) = &self.detector {
                    detector.observe(self.thresholds.state_mut(row, col), &obs);
                }
                stats.applied += 1;
            }
        }

        self.passes += 1;

        if stats.unsupported > 0 {
            log::warn!(
                "Tile {} pass {}: {} pixels with a status {} does not produce, counted as invalid",
                self.tile(),
                self.passes,
                stats.unsupported,
                self.config.sensor
            );
        }
        log::debug!(
            "Tile {} pass {}: {} applied, {} outside period",
            self.tile(),
            self.passes,
            stats.applied,
            stats.outside_period
        );

        Ok(stats)
    }

    /// Close the period
    pub fn finish(self) -> CompositeResult {
        let (rows, cols) = self.accumulator.dim();
        log::info!(
            "Closing tile {} after {} passes ({} of {} pixels observed)",
            self.accumulator.tile(),
            self.passes,
            self.accumulator.contributing_pixels(),
            rows * cols
        );

        let thresholds = match &self.detector {
            Some(detector) => self.thresholds.finalize(detector),
            None => ThresholdGrid::undefined(rows, cols),
        };
        let tile = Finalizer::new(self.config).finalize(self.accumulator);

        CompositeResult { tile, thresholds }
    }
}

/// Work for one tile: its passes in acquisition order
#[derive(Debug, Clone)]
pub struct TileJob {
    pub tile_x: i32,
    pub tile_y: i32,
    pub period: AccumulationPeriod,
    /// Grid the passes are composited on (after binning)
    pub dim: (usize, usize),
    /// Spatial binning factor applied to each pass, 1 for none
    pub supersampling: usize,
    pub batches: Vec<ObservationBatch>,
}

impl TileJob {
    pub fn new(tile_x: i32, tile_y: i32, period: AccumulationPeriod, dim: (usize, usize)) -> Self {
        Self {
            tile_x,
            tile_y,
            period,
            dim,
            supersampling: 1,
            batches: Vec::new(),
        }
    }

    pub fn with_supersampling(mut self, supersampling: usize) -> Self {
        self.supersampling = supersampling;
        self
    }

    pub fn push(&mut self, batch: ObservationBatch) {
        self.batches.push(batch);
    }

    fn run(&self, config: &SensorConfig) -> MosaicResult<CompositeResult> {
        let mut compositor =
            TileCompositor::new(config, self.tile_x, self.tile_y, self.period.clone(), self.dim)?;

        if self.supersampling > 1 {
            let binner = SpatialBinner::new(config);
            for batch in &self.batches {
                let binned = binner.bin_pass(batch, self.supersampling)?;
                compositor.add_pass(&binned)?;
            }
        } else {
            for batch in &self.batches {
                compositor.add_pass(batch)?;
            }
        }

        Ok(compositor.finish())
    }
}

/// Composite independent tiles, in parallel when enabled.
///
/// Results come back in job order; the first failing job fails the call.
#[cfg(feature = "parallel")]
pub fn composite_tiles(config: &SensorConfig, jobs: &[TileJob]) -> MosaicResult<Vec<CompositeResult>> {
    config.validate()?;
    log::info!("Compositing {} tiles for {} in parallel", jobs.len(), config.sensor);
    jobs.par_iter().map(|job| job.run(config)).collect()
}

#[cfg(not(feature = "parallel"))]
pub fn composite_tiles(config: &SensorConfig, jobs: &[TileJob]) -> MosaicResult<Vec<CompositeResult>> {
    config.validate()?;
    log::info!("Compositing {} tiles for {}", jobs.len(), config.sensor);
    jobs.iter().map(|job| job.run(config)).collect()
}
