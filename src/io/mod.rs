//! I/O modules for reading compositing configuration

pub mod sensor_config;

pub use sensor_config::SensorConfigReader;
