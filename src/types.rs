use chrono::{DateTime, Datelike, NaiveDate, Utc};
use ndarray::{s, Array2, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

/// Real-valued reflectance or index data
pub type SdrReal = f32;

/// 2D real raster (row x col)
pub type BandImage = Array2<SdrReal>;

/// 3D band stack (band x row x col)
pub type BandCube = Array3<SdrReal>;

/// 2D grid of per-pixel classification results
pub type StatusImage = Array2<Status>;

/// Unix time of 2000-01-01T00:00:00Z in milliseconds
const EPOCH_2000_UNIX_MILLIS: i64 = 946_684_800_000;

/// `num_days_from_ce()` of 2000-01-01
const EPOCH_2000_DAYS_FROM_CE: i32 = 730_120;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Per-observation classification assigned by the upstream classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Invalid,
    Land,
    Water,
    Snow,
    Cloud,
    CloudShadow,
    TemporalCloud,
    Bright,
    Dark,
    Haze,
}

impl Status {
    /// Number of status categories
    pub const COUNT: usize = 10;

    /// All statuses in code order
    pub const ALL: [Status; Status::COUNT] = [
        Status::Invalid,
        Status::Land,
        Status::Water,
        Status::Snow,
        Status::Cloud,
        Status::CloudShadow,
        Status::TemporalCloud,
        Status::Bright,
        Status::Dark,
        Status::Haze,
    ];

    /// Numeric code used at the raster boundary
    pub fn code(self) -> u8 {
        match self {
            Status::Invalid => 0,
            Status::Land => 1,
            Status::Water => 2,
            Status::Snow => 3,
            Status::Cloud => 4,
            Status::CloudShadow => 5,
            Status::TemporalCloud => 6,
            Status::Bright => 7,
            Status::Dark => 8,
            Status::Haze => 9,
        }
    }

    /// Inverse of [`Status::code`]
    pub fn from_code(code: u8) -> Option<Status> {
        Status::ALL.get(code as usize).copied()
    }

    /// Position of this status in per-status tables
    pub fn index(self) -> usize {
        self.code() as usize
    }

    /// Lower-case name used in output feature names
    pub fn name(self) -> &'static str {
        match self {
            Status::Invalid => "invalid",
            Status::Land => "land",
            Status::Water => "water",
            Status::Snow => "snow",
            Status::Cloud => "cloud",
            Status::CloudShadow => "cloud_shadow",
            Status::TemporalCloud => "temporal_cloud",
            Status::Bright => "bright",
            Status::Dark => "dark",
            Status::Haze => "haze",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Invalid
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single classified observation of one pixel
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub status: Status,
    /// Surface reflectance per sensor band, NaN where missing
    pub bands: Vec<SdrReal>,
    /// Vegetation index derived upstream from the bands
    pub derived_index: SdrReal,
    /// Acquisition time in fractional days since 2000-01-01
    pub timestamp: f64,
}

impl Observation {
    pub fn new(status: Status, bands: Vec<SdrReal>, derived_index: SdrReal, timestamp: f64) -> Self {
        Self {
            status,
            bands,
            derived_index,
            timestamp,
        }
    }

    /// Borrowed per-pixel form consumed by the engine
    pub fn view(&self) -> PixelObservation<'_> {
        PixelObservation {
            status: self.status,
            bands: ArrayView1::from(&self.bands[..]),
            derived_index: self.derived_index,
            timestamp: self.timestamp,
        }
    }
}

/// Borrowed view of one pixel of an observation, either from an owned
/// [`Observation`] or from a column of an [`ObservationBatch`].
#[derive(Debug, Clone, Copy)]
pub struct PixelObservation<'a> {
    pub status: Status,
    pub bands: ArrayView1<'a, SdrReal>,
    pub derived_index: SdrReal,
    pub timestamp: f64,
}

impl<'a> PixelObservation<'a> {
    /// Number of accumulated values: every band plus the derived index
    pub fn value_count(&self) -> usize {
        self.bands.len() + 1
    }

    /// Band `i`, or the derived index for `i == bands.len()`
    pub fn value(&self, i: usize) -> SdrReal {
        if i < self.bands.len() {
            self.bands[i]
        } else {
            self.derived_index
        }
    }
}

/// All observations of one tile from one acquisition pass
#[derive(Debug, Clone)]
pub struct ObservationBatch {
    /// Classification per pixel (row x col)
    pub status: StatusImage,
    /// Reflectance cube (band x row x col)
    pub bands: BandCube,
    /// Derived index per pixel (row x col)
    pub derived_index: BandImage,
    /// Fractional-day acquisition time per pixel (row x col)
    pub timestamp: Array2<f64>,
}

impl ObservationBatch {
    /// Assemble a batch, checking that every layer has the same grid shape
    pub fn new(
        status: StatusImage,
        bands: BandCube,
        derived_index: BandImage,
        timestamp: Array2<f64>,
    ) -> MosaicResult<Self> {
        let expected = status.dim();
        let (_, band_rows, band_cols) = bands.dim();

        for actual in [(band_rows, band_cols), derived_index.dim(), timestamp.dim()] {
            if actual != expected {
                return Err(MosaicError::DimensionMismatch { expected, actual });
            }
        }

        Ok(Self {
            status,
            bands,
            derived_index,
            timestamp,
        })
    }

    /// Assemble a batch where every pixel shares the pass acquisition time
    pub fn with_pass_time(
        status: StatusImage,
        bands: BandCube,
        derived_index: BandImage,
        timestamp: f64,
    ) -> MosaicResult<Self> {
        let timestamps = Array2::from_elem(status.dim(), timestamp);
        Self::new(status, bands, derived_index, timestamps)
    }

    /// Grid shape (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.status.dim()
    }

    pub fn band_count(&self) -> usize {
        self.bands.dim().0
    }

    /// Per-pixel view without copying the band values
    pub fn pixel(&self, row: usize, col: usize) -> PixelObservation<'_> {
        PixelObservation {
            status: self.status[[row, col]],
            bands: self.bands.slice(s![.., row, col]),
            derived_index: self.derived_index[[row, col]],
            timestamp: self.timestamp[[row, col]],
        }
    }
}

/// Identifies one tile accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub tile_x: i32,
    pub tile_y: i32,
    pub period_id: u32,
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{:02}v{:02}/p{}", self.tile_x, self.tile_y, self.period_id)
    }
}

/// Date range [start, end) observations are composited over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulationPeriod {
    pub id: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AccumulationPeriod {
    pub fn new(id: u32, start: NaiveDate, end: NaiveDate) -> MosaicResult<Self> {
        if end <= start {
            return Err(MosaicError::InvalidConfig(format!(
                "Accumulation period {} ends ({}) before it starts ({})",
                id, end, start
            )));
        }
        Ok(Self { id, start, end })
    }

    /// Calendar month, identified as `yyyymm`
    pub fn monthly(year: i32, month: u32) -> MosaicResult<Self> {
        let invalid = || MosaicError::InvalidConfig(format!("Invalid month {}-{}", year, month));

        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;

        let id = u32::try_from(year).map_err(|_| invalid())? * 100 + month;
        Self::new(id, start, end)
    }

    /// First day of the period as fractional days since 2000-01-01
    pub fn start_day(&self) -> f64 {
        day_number(self.start)
    }

    /// Exclusive end of the period as fractional days since 2000-01-01
    pub fn end_day(&self) -> f64 {
        day_number(self.end)
    }

    /// Whether a fractional-day timestamp falls inside the period
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start_day() && timestamp < self.end_day()
    }
}

/// Convert a UTC acquisition time into fractional days since 2000-01-01
pub fn fractional_day(time: DateTime<Utc>) -> f64 {
    (time.timestamp_millis() - EPOCH_2000_UNIX_MILLIS) as f64 / MILLIS_PER_DAY
}

fn day_number(date: NaiveDate) -> f64 {
    (date.num_days_from_ce() - EPOCH_2000_DAYS_FROM_CE) as f64
}

/// Error types for compositing
#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown sensor/resolution combination: {sensor} at {resolution} m")]
    UnknownSensor { sensor: String, resolution: u32 },

    #[error("Band count mismatch: configuration expects {expected} bands, batch has {actual}")]
    BandCountMismatch { expected: usize, actual: usize },

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for compositing operations
pub type MosaicResult<T> = Result<T, MosaicError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_codes_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(10), None);
    }

    #[test]
    fn test_fractional_day() {
        let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(fractional_day(epoch), 0.0);

        let noon = Utc.with_ymd_and_hms(2000, 1, 2, 12, 0, 0).unwrap();
        assert_eq!(fractional_day(noon), 1.5);
    }

    #[test]
    fn test_monthly_period() {
        let period = AccumulationPeriod::monthly(2000, 2).unwrap();
        assert_eq!(period.id, 200002);
        assert_eq!(period.start_day(), 31.0);
        assert_eq!(period.end_day(), 60.0); // leap year

        assert!(period.contains(31.0));
        assert!(period.contains(59.99));
        assert!(!period.contains(60.0));

        let december = AccumulationPeriod::monthly(2003, 12).unwrap();
        assert_eq!(december.end, NaiveDate::from_ymd_opt(2004, 1, 1).unwrap());

        assert!(AccumulationPeriod::monthly(2003, 13).is_err());
    }

    #[test]
    fn test_batch_dimension_check() {
        let status = Array2::from_elem((2, 3), Status::Land);
        let bands = Array3::<f32>::zeros((4, 2, 3));
        let bad_index = Array2::<f32>::zeros((3, 2));

        let result = ObservationBatch::with_pass_time(status, bands, bad_index, 10.0);
        assert!(matches!(result, Err(MosaicError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_pixel_view() {
        let status = Array2::from_elem((1, 2), Status::Water);
        let mut bands = Array3::<f32>::zeros((2, 1, 2));
        bands[[0, 0, 1]] = 0.25;
        bands[[1, 0, 1]] = 0.5;
        let index = Array2::from_elem((1, 2), 0.1);

        let batch = ObservationBatch::with_pass_time(status, bands, index, 3.0).unwrap();
        let pixel = batch.pixel(0, 1);

        assert_eq!(pixel.status, Status::Water);
        assert_eq!(pixel.value_count(), 3);
        assert_eq!(pixel.value(0), 0.25);
        assert_eq!(pixel.value(1), 0.5);
        assert_eq!(pixel.value(2), 0.1);
        assert_eq!(pixel.timestamp, 3.0);
    }
}
