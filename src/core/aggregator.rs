use crate::core::accumulator::PixelStateMut;
use crate::core::best_pixel::{BestPixelSelector, MeanOf, Selection};
use crate::core::priority::StatusPolicy;
use crate::core::sensor::SensorConfig;
use crate::types::{PixelObservation, Status};

/// Applies classified observations to per-pixel accumulation state.
///
/// The same aggregator serves the spatial stage (pixels of one pass binned
/// into a cell) and the temporal stage (cells of successive passes). The
/// result depends on the order observations are applied in: the first
/// observation of a higher-priority status discards the sums gathered for a
/// lower-priority one.
#[derive(Debug, Clone)]
pub struct CompositingAggregator {
    policy: StatusPolicy,
    primary_band: usize,
    best_pixel: Option<BestPixelSelector>,
}

impl CompositingAggregator {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            policy: config.policy(),
            primary_band: config.primary_band,
            best_pixel: config.best_pixel.clone().map(BestPixelSelector::new),
        }
    }

    /// Plain additive aggregator with the full status set
    pub fn plain(primary_band: usize) -> Self {
        Self {
            policy: StatusPolicy::all(),
            primary_band,
            best_pixel: None,
        }
    }

    pub fn with_best_pixel(mut self, selector: BestPixelSelector) -> Self {
        self.best_pixel = Some(selector);
        self
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    pub fn is_best_pixel(&self) -> bool {
        self.best_pixel.is_some()
    }

    /// Apply one observation to one pixel. Statuses the sensor does not
    /// produce, and observations whose band layout does not match the
    /// accumulated values, are counted as invalid.
    pub fn apply(&self, px: &mut PixelStateMut<'_>, obs: &PixelObservation<'_>) {
        let status = if obs.value_count() != px.sum.len() || !self.policy.is_supported(obs.status) {
            Status::Invalid
        } else {
            obs.status
        };

        match status {
            Status::Invalid => px.increment(Status::Invalid),

            Status::Land => {
                self.take_over(px, Status::Land);
                self.accumulate(px, Status::Land, obs);
                *px.status = Status::Land;
            }

            Status::Snow => {
                if px.count(Status::Land) > 0 {
                    return;
                }
                self.take_over(px, Status::Snow);
                self.accumulate(px, Status::Snow, obs);
                *px.status = Status::Snow;
            }

            Status::Water => {
                let outranked = px.count(Status::Land) > 0 || px.count(Status::Snow) > 0;
                let primary = obs.bands.get(self.primary_band).copied().unwrap_or(f32::NAN);

                if primary.is_nan() {
                    // deep water: counted, never accumulated
                    *px.deep_water += 1;
                    if !outranked {
                        *px.status = Status::Water;
                    }
                } else if !outranked {
                    self.take_over(px, Status::Water);
                    self.accumulate(px, Status::Water, obs);
                    *px.status = Status::Water;
                }
            }

            Status::CloudShadow => {
                if px.count(Status::Land) > 0
                    || px.count(Status::Snow) > 0
                    || px.count(Status::Water) > 0
                {
                    return;
                }
                self.take_over(px, Status::CloudShadow);
                self.accumulate(px, Status::CloudShadow, obs);
                *px.status = Status::CloudShadow;
            }

            Status::Cloud | Status::TemporalCloud => {
                px.increment(status);
                if !self.policy.dominates(*px.status, status) {
                    *px.status = status;
                }
            }

            Status::Bright | Status::Dark | Status::Haze => {
                if px.count(Status::Land) > 0
                    || px.count(Status::Snow) > 0
                    || px.count(Status::Water) > 0
                    || px.count(Status::CloudShadow) > 0
                {
                    return;
                }
                if let Some(owner) = *px.band_owner {
                    if StatusPolicy::is_ancillary(owner) && self.policy.dominates(owner, status) {
                        return;
                    }
                }
                self.take_over(px, status);
                self.accumulate(px, status, obs);
                *px.status = status;
            }
        }
    }

    /// Hand the band sums to `status`, discarding sums owned by another status.
    ///
    /// Within the cloud-shadow / ancillary group the superseded counter is
    /// reset as well, and the incoming status starts counting from zero.
    fn take_over(&self, px: &mut PixelStateMut<'_>, status: Status) {
        match *px.band_owner {
            Some(owner) if owner == status => return,
            Some(owner) => {
                px.clear_sums();
                if StatusPolicy::shares_override_group(owner)
                    && StatusPolicy::shares_override_group(status)
                {
                    px.reset_count(owner);
                }
            }
            None => {}
        }

        if StatusPolicy::shares_override_group(status) {
            px.reset_count(status);
        }
        *px.band_owner = Some(status);
    }

    /// Add the observation's values to the sums owned by `status` and count it
    fn accumulate(&self, px: &mut PixelStateMut<'_>, status: Status, obs: &PixelObservation<'_>) {
        let weight = px.count(status);

        let selection = match &self.best_pixel {
            Some(selector) if weight > 0 => {
                let existing = MeanOf {
                    sum: px.sum.view(),
                    weight,
                };
                selector.select(&existing, obs, weight)
            }
            _ => Selection::Merge,
        };

        let new_weight = (weight + 1) as f64;
        match selection {
            Selection::Merge => {
                for i in 0..px.sum.len() {
                    let value = obs.value(i) as f64;
                    px.sum[i] += value;
                    px.sum_sq[i] += value * value;
                }
            }
            Selection::Replace => {
                for i in 0..px.sum.len() {
                    let value = obs.value(i) as f64;
                    px.sum[i] = value * new_weight;
                    px.sum_sq[i] = value * value * new_weight;
                }
            }
            Selection::Keep => {
                let scale = new_weight / weight as f64;
                px.sum.mapv_inplace(|v| v * scale);
                px.sum_sq.mapv_inplace(|v| v * scale);
            }
        }

        px.increment(status);
    }
}
