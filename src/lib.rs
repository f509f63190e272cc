//! sdrmosaic: per-pixel compositing of classified surface reflectance
//!
//! Observations of a tile arrive pass by pass, each pixel carrying a
//! classification status, per-band reflectances and a derived vegetation
//! index. The engine keeps a running, status-priority-aware accumulation per
//! pixel and at the end of the accumulation period reduces it to a status
//! map, per-status counts, band means and band uncertainties. A temporal
//! threshold detector runs alongside and produces per-pixel cloud and cloud
//! shadow brightness thresholds for the next classification run.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    fractional_day, AccumulationPeriod, BandCube, BandImage, MosaicError, MosaicResult, Observation,
    ObservationBatch, PixelObservation, Status, StatusImage, TileId,
};

pub use io::SensorConfigReader;

pub use crate::core::{
    composite_tiles, CompositeResult, CompositingAggregator, FinalizedTile, Finalizer, PassStatistics,
    SensorConfig, SpatialBinner, TemporalThresholdDetector, ThresholdMaps, TileCompositor, TileJob,
};
