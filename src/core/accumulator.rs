use crate::core::priority::StatusPolicy;
use crate::types::{Status, StatusImage, TileId};
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayViewMut1};

/// Read-only view of one pixel's accumulation state
#[derive(Debug, Clone, Copy)]
pub struct PixelState<'a> {
    pub status: Status,
    /// Status whose observations are currently held in the sums
    pub band_owner: Option<Status>,
    pub counts: ArrayView1<'a, u32>,
    pub deep_water: u32,
    pub sum: ArrayView1<'a, f64>,
    pub sum_sq: ArrayView1<'a, f64>,
}

impl<'a> PixelState<'a> {
    /// Counter value for a status, resolving shared slots
    pub fn count(&self, status: Status) -> u32 {
        self.counts[StatusPolicy::counter_slot(status).index()]
    }
}

/// Mutable view of one pixel's accumulation state
#[derive(Debug)]
pub struct PixelStateMut<'a> {
    pub status: &'a mut Status,
    pub band_owner: &'a mut Option<Status>,
    pub counts: ArrayViewMut1<'a, u32>,
    pub deep_water: &'a mut u32,
    pub sum: ArrayViewMut1<'a, f64>,
    pub sum_sq: ArrayViewMut1<'a, f64>,
}

impl<'a> PixelStateMut<'a> {
    pub fn count(&self, status: Status) -> u32 {
        self.counts[StatusPolicy::counter_slot(status).index()]
    }

    pub fn increment(&mut self, status: Status) {
        self.counts[StatusPolicy::counter_slot(status).index()] += 1;
    }

    pub fn reset_count(&mut self, status: Status) {
        self.counts[StatusPolicy::counter_slot(status).index()] = 0;
    }

    /// Drop the accumulated band values and their owner
    pub fn clear_sums(&mut self) {
        self.sum.fill(0.0);
        self.sum_sq.fill(0.0);
        *self.band_owner = None;
    }

    pub fn as_view(&self) -> PixelState<'_> {
        PixelState {
            status: *self.status,
            band_owner: *self.band_owner,
            counts: self.counts.view(),
            deep_water: *self.deep_water,
            sum: self.sum.view(),
            sum_sq: self.sum_sq.view(),
        }
    }
}

/// Accumulation state of a single pixel, owned
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationState {
    pub status: Status,
    pub band_owner: Option<Status>,
    pub counts: Array1<u32>,
    pub deep_water: u32,
    pub sum: Array1<f64>,
    pub sum_sq: Array1<f64>,
}

impl AccumulationState {
    /// Empty state for `value_count` accumulated values (bands + derived index)
    pub fn new(value_count: usize) -> Self {
        Self {
            status: Status::Invalid,
            band_owner: None,
            counts: Array1::zeros(Status::COUNT),
            deep_water: 0,
            sum: Array1::zeros(value_count),
            sum_sq: Array1::zeros(value_count),
        }
    }

    pub fn count(&self, status: Status) -> u32 {
        self.counts[StatusPolicy::counter_slot(status).index()]
    }

    /// Return to the empty state without reallocating
    pub fn reset(&mut self) {
        self.status = Status::Invalid;
        self.band_owner = None;
        self.counts.fill(0);
        self.deep_water = 0;
        self.sum.fill(0.0);
        self.sum_sq.fill(0.0);
    }

    pub fn view(&self) -> PixelState<'_> {
        PixelState {
            status: self.status,
            band_owner: self.band_owner,
            counts: self.counts.view(),
            deep_water: self.deep_water,
            sum: self.sum.view(),
            sum_sq: self.sum_sq.view(),
        }
    }

    pub fn view_mut(&mut self) -> PixelStateMut<'_> {
        PixelStateMut {
            status: &mut self.status,
            band_owner: &mut self.band_owner,
            counts: self.counts.view_mut(),
            deep_water: &mut self.deep_water,
            sum: self.sum.view_mut(),
            sum_sq: self.sum_sq.view_mut(),
        }
    }
}

/// Accumulation state of every pixel of one tile for one period.
///
/// Stored as one array per field; per-pixel vectors live along the last
/// axis so each pixel's counters and sums are contiguous.
#[derive(Debug, Clone)]
pub struct TileAccumulator {
    tile: TileId,
    status: StatusImage,
    band_owner: Array2<Option<Status>>,
    /// (row, col, status)
    counts: Array3<u32>,
    deep_water: Array2<u32>,
    /// (row, col, value)
    sum: Array3<f64>,
    sum_sq: Array3<f64>,
}

impl TileAccumulator {
    /// Empty accumulator created at period start
    pub fn new(tile: TileId, rows: usize, cols: usize, value_count: usize) -> Self {
        log::debug!(
            "Creating tile accumulator {} ({}x{} pixels, {} values)",
            tile, rows, cols, value_count
        );

        Self {
            tile,
            status: Array2::from_elem((rows, cols), Status::Invalid),
            band_owner: Array2::from_elem((rows, cols), None),
            counts: Array3::zeros((rows, cols, Status::COUNT)),
            deep_water: Array2::zeros((rows, cols)),
            sum: Array3::zeros((rows, cols, value_count)),
            sum_sq: Array3::zeros((rows, cols, value_count)),
        }
    }

    pub fn tile(&self) -> TileId {
        self.tile
    }

    /// Grid shape (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.status.dim()
    }

    pub fn value_count(&self) -> usize {
        self.sum.dim().2
    }

    pub fn pixel(&self, row: usize, col: usize) -> PixelState<'_> {
        PixelState {
            status: self.status[[row, col]],
            band_owner: self.band_owner[[row, col]],
            counts: self.counts.slice(s![row, col, ..]),
            deep_water: self.deep_water[[row, col]],
            sum: self.sum.slice(s![row, col, ..]),
            sum_sq: self.sum_sq.slice(s![row, col, ..]),
        }
    }

    pub fn pixel_mut(&mut self, row: usize, col: usize) -> PixelStateMut<'_> {
        PixelStateMut {
            status: &mut self.status[[row, col]],
            band_owner: &mut self.band_owner[[row, col]],
            counts: self.counts.slice_mut(s![row, col, ..]),
            deep_water: &mut self.deep_water[[row, col]],
            sum: self.sum.slice_mut(s![row, col, ..]),
            sum_sq: self.sum_sq.slice_mut(s![row, col, ..]),
        }
    }

    /// Number of pixels currently holding band sums
    pub fn contributing_pixels(&self) -> usize {
        self.band_owner.iter().filter(|o| o.is_some()).count()
    }
}
