use crate::core::accumulator::AccumulationState;
use crate::core::aggregator::CompositingAggregator;
use crate::core::finalize::Finalizer;
use crate::core::sensor::SensorConfig;
use crate::core::stats::finite_mean;
use crate::types::{MosaicError, MosaicResult, ObservationBatch, Status};
use ndarray::{s, Array2, Array3};

/// Spatial compositing of one pass onto a coarser grid.
///
/// Every output cell covers `supersampling x supersampling` input pixels,
/// applied in row-major order through the same aggregator the temporal stage
/// uses, then finalized into a single observation.
#[derive(Debug, Clone)]
pub struct SpatialBinner {
    band_count: usize,
    value_count: usize,
    aggregator: CompositingAggregator,
    finalizer: Finalizer,
}

impl SpatialBinner {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            band_count: config.band_count(),
            value_count: config.value_count(),
            aggregator: CompositingAggregator::new(config),
            finalizer: Finalizer::new(config),
        }
    }

    /// Bin a pass by `supersampling` in both directions.
    ///
    /// Trailing rows and columns that do not fill a whole cell are dropped.
    pub fn bin_pass(&self, batch: &ObservationBatch, supersampling: usize) -> MosaicResult<ObservationBatch> {
        if batch.band_count() != self.band_count {
            return Err(MosaicError::BandCountMismatch {
                expected: self.band_count,
                actual: batch.band_count(),
            });
        }
        if supersampling == 0 {
            return Err(MosaicError::InvalidConfig(
                "Supersampling factor must be at least 1".to_string(),
            ));
        }

        let (rows, cols) = batch.dim();
        let out_rows = rows / supersampling;
        let out_cols = cols / supersampling;

        if out_rows == 0 || out_cols == 0 {
            return Err(MosaicError::Processing(format!(
                "Supersampling factor {} too large for {}x{} pass",
                supersampling, rows, cols
            )));
        }

        log::debug!(
            "Binning pass: {}x{} pixels -> {}x{} cells",
            rows, cols, out_rows, out_cols
        );

        let mut status = Array2::from_elem((out_rows, out_cols), Status::Invalid);
        let mut bands = Array3::<f32>::from_elem((self.band_count, out_rows, out_cols), f32::NAN);
        let mut derived_index = Array2::<f32>::from_elem((out_rows, out_cols), f32::NAN);
        let mut timestamp = Array2::<f64>::from_elem((out_rows, out_cols), f64::NAN);

        let mut state = AccumulationState::new(self.value_count);

        for out_row in 0..out_rows {
            for out_col in 0..out_cols {
                state.reset();

                let row0 = out_row * supersampling;
                let col0 = out_col * supersampling;
                for row in row0..row0 + supersampling {
                    for col in col0..col0 + supersampling {
                        self.aggregator.apply(&mut state.view_mut(), &batch.pixel(row, col));
                    }
                }

                let px = state.view();
                let (cell_status, weight) = self.finalizer.resolve(&px);
                status[[out_row, out_col]] = cell_status;
                for band in 0..self.band_count {
                    bands[[band, out_row, out_col]] = self.finalizer.mean(&px, cell_status, weight, band);
                }
                derived_index[[out_row, out_col]] =
                    self.finalizer.mean(&px, cell_status, weight, self.band_count);

                let block = batch
                    .timestamp
                    .slice(s![row0..row0 + supersampling, col0..col0 + supersampling]);
                timestamp[[out_row, out_col]] = finite_mean(block.iter().copied());
            }
        }

        ObservationBatch::new(status, bands, derived_index, timestamp)
    }
}
