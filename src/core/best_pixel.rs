use crate::core::sensor::BestPixelParams;
use crate::core::stats::normalized_difference;
use crate::types::PixelObservation;
use ndarray::ArrayView1;

/// Outcome of comparing an incoming observation with the accumulated pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Candidate wins: sums re-seeded with the candidate at the new weight
    Replace,
    /// Existing pixel wins: sums rescaled to the new weight, mean unchanged
    Keep,
    /// No preference: candidate added to the running sums
    Merge,
}

/// Per-band values the heuristic can look at
pub trait BandValues {
    fn band(&self, index: usize) -> f64;
}

impl BandValues for [f64] {
    fn band(&self, index: usize) -> f64 {
        self[index]
    }
}

impl BandValues for [f32] {
    fn band(&self, index: usize) -> f64 {
        self[index] as f64
    }
}

impl<'a> BandValues for PixelObservation<'a> {
    fn band(&self, index: usize) -> f64 {
        self.value(index) as f64
    }
}

/// Mean bands of an accumulated pixel, computed on demand from the sums
#[derive(Debug, Clone, Copy)]
pub struct MeanOf<'a> {
    pub sum: ArrayView1<'a, f64>,
    pub weight: u32,
}

impl<'a> BandValues for MeanOf<'a> {
    fn band(&self, index: usize) -> f64 {
        self.sum[index] / self.weight as f64
    }
}

#[derive(Debug, Clone, Copy)]
struct Indicators {
    brightness: f64,
    vegetation_index: f64,
    water_index: f64,
    nir: f64,
    dark: f64,
}

impl Indicators {
    fn is_finite(&self) -> bool {
        [self.brightness, self.vegetation_index, self.water_index, self.nir, self.dark]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Brightness / vegetation / water-index heuristic for best-pixel compositing
#[derive(Debug, Clone)]
pub struct BestPixelSelector {
    params: BestPixelParams,
}

impl BestPixelSelector {
    pub fn new(params: BestPixelParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BestPixelParams {
        &self.params
    }

    /// Decide how a candidate combines with the existing mean of `existing_weight` observations
    pub fn select<E, C>(&self, existing_mean: &E, candidate: &C, existing_weight: u32) -> Selection
    where
        E: BandValues + ?Sized,
        C: BandValues + ?Sized,
    {
        if existing_weight == 0 {
            return Selection::Merge;
        }

        let existing = self.indicators(existing_mean);
        let new = self.indicators(candidate);
        if !existing.is_finite() || !new.is_finite() {
            return Selection::Merge;
        }

        let p = &self.params;
        let brightness = 0.5 * (existing.brightness + new.brightness);
        let vegetation_index = 0.5 * (existing.vegetation_index + new.vegetation_index);
        let water_index = 0.5 * (existing.water_index + new.water_index);
        let nir = 0.5 * (existing.nir + new.nir);

        let likely_water = water_index > p.water_index_threshold as f64
            || (brightness < p.low_brightness as f64
                && vegetation_index < p.low_vegetation_index as f64
                && nir < p.low_nir as f64);

        let (candidate_better, existing_better) = if likely_water {
            (new.dark < existing.dark, existing.dark < new.dark)
        } else {
            (
                new.vegetation_index > existing.vegetation_index,
                existing.vegetation_index > new.vegetation_index,
            )
        };

        if candidate_better {
            Selection::Replace
        } else if existing_better {
            Selection::Keep
        } else {
            Selection::Merge
        }
    }

    fn indicators<B: BandValues + ?Sized>(&self, values: &B) -> Indicators {
        let p = &self.params;
        let brightness = p.brightness_bands.iter().map(|b| values.band(*b)).sum::<f64>()
            / p.brightness_bands.len() as f64;
        let green = values.band(p.green_band);
        let red = values.band(p.red_band);
        let nir = values.band(p.nir_band);

        Indicators {
            brightness,
            vegetation_index: normalized_difference(nir, red),
            water_index: normalized_difference(green, nir),
            nir,
            dark: values.band(p.dark_band),
        }
    }
}
