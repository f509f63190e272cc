//! Core compositing modules

pub mod priority;
pub mod sensor;
pub mod stats;
pub mod accumulator;
pub mod best_pixel;
pub mod aggregator;
pub mod finalize;
pub mod threshold;
pub mod spatial;
pub mod compositor;

// Re-export main types
pub use priority::StatusPolicy;
pub use sensor::{BestPixelParams, SensorConfig, ThresholdParams, ThresholdVariant, UncertaintyMode};
pub use accumulator::{AccumulationState, PixelState, PixelStateMut, TileAccumulator};
pub use best_pixel::{BandValues, BestPixelSelector, MeanOf, Selection};
pub use aggregator::CompositingAggregator;
pub use finalize::{FinalizedPixel, FinalizedTile, Finalizer};
pub use threshold::{TemporalThresholdDetector, ThresholdGrid, ThresholdMaps, ThresholdResult, ThresholdState};
pub use spatial::SpatialBinner;
pub use compositor::{composite_tiles, CompositeResult, PassStatistics, TileCompositor, TileJob};
