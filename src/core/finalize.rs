use crate::core::accumulator::{PixelState, TileAccumulator};
use crate::core::sensor::{SensorConfig, UncertaintyMode};
use crate::core::stats::{mean_and_sigma, propagated_error};
use crate::types::{BandCube, BandImage, Status, StatusImage, TileId};
use ndarray::{s, Array2, Array3, ArrayView2};

/// Finalized values of a single pixel
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedPixel {
    pub status: Status,
    /// Observation count backing the mean
    pub weight: u32,
    /// Counts in the order of `SensorConfig::output_feature_names`
    pub counts: Vec<u32>,
    pub band_mean: Vec<f32>,
    pub derived_index_mean: f32,
    /// Uncertainty for the configured uncertainty bands
    pub band_uncertainty: Vec<f32>,
}

/// Composited output of one tile for one period
#[derive(Debug, Clone)]
pub struct FinalizedTile {
    pub tile: TileId,
    pub status: StatusImage,
    pub weight: Array2<u32>,
    /// Statuses in `counts`, along its first axis
    pub reported_statuses: Vec<Status>,
    /// (status, row, col)
    pub counts: Array3<u32>,
    /// (band, row, col)
    pub band_mean: BandCube,
    pub derived_index_mean: BandImage,
    /// Band indices in `band_uncertainty`, along its first axis
    pub uncertainty_bands: Vec<usize>,
    pub band_uncertainty: BandCube,
}

impl FinalizedTile {
    pub fn dim(&self) -> (usize, usize) {
        self.status.dim()
    }

    /// Count layer of a reported status
    pub fn count_of(&self, status: Status) -> Option<ArrayView2<'_, u32>> {
        self.reported_statuses
            .iter()
            .position(|s| *s == status)
            .map(|i| self.counts.slice(s![i, .., ..]))
    }

    pub fn pixel(&self, row: usize, col: usize) -> FinalizedPixel {
        FinalizedPixel {
            status: self.status[[row, col]],
            weight: self.weight[[row, col]],
            counts: self.counts.slice(s![.., row, col]).to_vec(),
            band_mean: self.band_mean.slice(s![.., row, col]).to_vec(),
            derived_index_mean: self.derived_index_mean[[row, col]],
            band_uncertainty: self.band_uncertainty.slice(s![.., row, col]).to_vec(),
        }
    }

    /// All output layers stacked in feature order:
    /// status code, counts, band means, derived index mean, uncertainties.
    pub fn to_feature_stack(&self) -> BandCube {
        let (rows, cols) = self.dim();
        let n_counts = self.reported_statuses.len();
        let n_bands = self.band_mean.dim().0;
        let n_unc = self.uncertainty_bands.len();
        let mut stack = Array3::<f32>::zeros((1 + n_counts + n_bands + 1 + n_unc, rows, cols));

        stack
            .slice_mut(s![0, .., ..])
            .assign(&self.status.mapv(|st| st.code() as f32));

        let mut layer = 1;
        stack
            .slice_mut(s![layer..layer + n_counts, .., ..])
            .assign(&self.counts.mapv(|c| c as f32));
        layer += n_counts;

        stack
            .slice_mut(s![layer..layer + n_bands, .., ..])
            .assign(&self.band_mean);
        layer += n_bands;

        stack.slice_mut(s![layer, .., ..]).assign(&self.derived_index_mean);
        layer += 1;

        stack.slice_mut(s![layer.., .., ..]).assign(&self.band_uncertainty);

        stack
    }
}

/// Converts accumulation state into output values at period close
#[derive(Debug, Clone)]
pub struct Finalizer {
    band_count: usize,
    uncertainty_mode: UncertaintyMode,
    uncertainty_bands: Vec<usize>,
    reported_statuses: Vec<Status>,
}

impl Finalizer {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            band_count: config.band_count(),
            uncertainty_mode: config.uncertainty_mode,
            uncertainty_bands: config.uncertainty_bands.clone(),
            reported_statuses: config.policy().reported().collect(),
        }
    }

    pub fn reported_statuses(&self) -> &[Status] {
        &self.reported_statuses
    }

    /// Winning status and weight after deep-water resolution.
    ///
    /// Deep water overrides everything below snow: those observations never
    /// produced bands that could justify another label.
    pub fn resolve(&self, px: &PixelState<'_>) -> (Status, u32) {
        let land_or_snow = px.count(Status::Land) > 0 || px.count(Status::Snow) > 0;
        let status = if px.deep_water > 0 && !land_or_snow {
            Status::Water
        } else {
            px.status
        };

        let weight = match status {
            Status::Water => px.count(Status::Water) + px.deep_water,
            other => px.count(other),
        };
        (status, weight)
    }

    /// Reported count of a status, deep water included with water
    fn reported_count(px: &PixelState<'_>, status: Status) -> u32 {
        match status {
            Status::Water => px.count(Status::Water) + px.deep_water,
            other => px.count(other),
        }
    }

    /// Mean and uncertainty of accumulated value `i`, NaN when the winning
    /// status holds no sums
    fn statistics(&self, px: &PixelState<'_>, status: Status, weight: u32, i: usize) -> (f32, f32) {
        if weight == 0 || px.band_owner != Some(status) {
            return (f32::NAN, f32::NAN);
        }

        let n = weight as f64;
        let (mean, sigma) = mean_and_sigma(px.sum[i], px.sum_sq[i], n);
        let uncertainty = match self.uncertainty_mode {
            UncertaintyMode::PopulationSigma => sigma,
            UncertaintyMode::PropagatedError => propagated_error(px.sum_sq[i], n),
        };
        (mean as f32, uncertainty as f32)
    }

    /// Mean of accumulated value `i` (bands, then the derived index)
    pub fn mean(&self, px: &PixelState<'_>, status: Status, weight: u32, i: usize) -> f32 {
        self.statistics(px, status, weight, i).0
    }

    pub fn finalize_pixel(&self, px: &PixelState<'_>) -> FinalizedPixel {
        let (status, weight) = self.resolve(px);

        let band_mean = (0..self.band_count)
            .map(|i| self.statistics(px, status, weight, i).0)
            .collect();
        let derived_index_mean = self.statistics(px, status, weight, self.band_count).0;
        let band_uncertainty = self
            .uncertainty_bands
            .iter()
            .map(|i| self.statistics(px, status, weight, *i).1)
            .collect();

        FinalizedPixel {
            status,
            weight,
            counts: self
                .reported_statuses
                .iter()
                .map(|s| Self::reported_count(px, *s))
                .collect(),
            band_mean,
            derived_index_mean,
            band_uncertainty,
        }
    }

    /// Consume a tile accumulator at period end
    pub fn finalize(&self, accumulator: TileAccumulator) -> FinalizedTile {
        let (rows, cols) = accumulator.dim();
        let tile = accumulator.tile();
        log::info!("Finalizing tile {} ({}x{} pixels)", tile, rows, cols);

        let mut status = Array2::from_elem((rows, cols), Status::Invalid);
        let mut weight = Array2::<u32>::zeros((rows, cols));
        let mut counts = Array3::<u32>::zeros((self.reported_statuses.len(), rows, cols));
        let mut band_mean = Array3::<f32>::from_elem((self.band_count, rows, cols), f32::NAN);
        let mut derived_index_mean = Array2::<f32>::from_elem((rows, cols), f32::NAN);
        let mut band_uncertainty =
            Array3::<f32>::from_elem((self.uncertainty_bands.len(), rows, cols), f32::NAN);

        let mut with_bands = 0usize;
        for row in 0..rows {
            for col in 0..cols {
                let px = accumulator.pixel(row, col);
                let (pixel_status, pixel_weight) = self.resolve(&px);

                status[[row, col]] = pixel_status;
                weight[[row, col]] = pixel_weight;
                for (k, s) in self.reported_statuses.iter().enumerate() {
                    counts[[k, row, col]] = Self::reported_count(&px, *s);
                }

                if pixel_weight == 0 || px.band_owner != Some(pixel_status) {
                    continue;
                }
                with_bands += 1;

                for band in 0..self.band_count {
                    band_mean[[band, row, col]] =
                        self.statistics(&px, pixel_status, pixel_weight, band).0;
                }
                derived_index_mean[[row, col]] =
                    self.statistics(&px, pixel_status, pixel_weight, self.band_count).0;
                for (k, band) in self.uncertainty_bands.iter().enumerate() {
                    band_uncertainty[[k, row, col]] =
                        self.statistics(&px, pixel_status, pixel_weight, *band).1;
                }
            }
        }

        log::debug!(
            "Tile {}: {} of {} pixels carry band values",
            tile,
            with_bands,
            rows * cols
        );

        FinalizedTile {
            tile,
            status,
            weight,
            reported_statuses: self.reported_statuses.clone(),
            counts,
            band_mean,
            derived_index_mean,
            uncertainty_bands: self.uncertainty_bands.clone(),
            band_uncertainty,
        }
    }
}
