use crate::core::sensor::{BestPixelParams, SensorConfig, ThresholdParams, ThresholdVariant, UncertaintyMode};
use crate::types::{MosaicError, MosaicResult, Status};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

/// Root `<sensorConfig>` element.
///
/// Only `sensor` and `resolution` are required; a document that omits the
/// band list describes the built-in preset for that sensor.
#[derive(Debug, Deserialize)]
pub struct SensorConfigRoot {
    #[serde(rename = "sensor")]
    pub sensor: String,
    #[serde(rename = "resolution")]
    pub resolution: u32,
    #[serde(rename = "bands", default)]
    pub bands: Option<BandList>,
    #[serde(rename = "derivedIndex", default)]
    pub derived_index: Option<String>,
    #[serde(rename = "primaryBand", default)]
    pub primary_band: Option<String>,
    #[serde(rename = "statuses", default)]
    pub statuses: Option<StatusList>,
    #[serde(rename = "uncertainty", default)]
    pub uncertainty: Option<UncertaintyElement>,
    #[serde(rename = "bestPixel", default)]
    pub best_pixel: Option<BestPixelElement>,
    #[serde(rename = "threshold", default)]
    pub threshold: Option<ThresholdElement>,
}

#[derive(Debug, Deserialize)]
pub struct BandList {
    #[serde(rename = "band", default)]
    pub bands: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusList {
    #[serde(rename = "status", default)]
    pub statuses: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UncertaintyElement {
    #[serde(rename = "@mode")]
    pub mode: String,
    #[serde(rename = "band", default)]
    pub bands: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BestPixelElement {
    #[serde(rename = "brightnessBand", default)]
    pub brightness_bands: Vec<String>,
    #[serde(rename = "greenBand")]
    pub green_band: String,
    #[serde(rename = "redBand")]
    pub red_band: String,
    #[serde(rename = "nirBand")]
    pub nir_band: String,
    #[serde(rename = "darkBand")]
    pub dark_band: String,
    #[serde(rename = "waterIndexThreshold", default)]
    pub water_index_threshold: Option<f32>,
    #[serde(rename = "lowBrightness", default)]
    pub low_brightness: Option<f32>,
    #[serde(rename = "lowVegetationIndex", default)]
    pub low_vegetation_index: Option<f32>,
    #[serde(rename = "lowNir", default)]
    pub low_nir: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdElement {
    #[serde(rename = "@variant")]
    pub variant: String,
    #[serde(rename = "brightnessBand")]
    pub brightness_band: String,
    #[serde(rename = "clearStatus", default)]
    pub clear_statuses: Vec<String>,
}

/// Reader for sensor configuration XML
pub struct SensorConfigReader;

impl SensorConfigReader {
    /// Parse and validate a sensor configuration document
    pub fn from_xml_str(xml_content: &str) -> MosaicResult<SensorConfig> {
        let root = from_str::<SensorConfigRoot>(xml_content)
            .map_err(|e| MosaicError::XmlParsing(format!("Failed to parse sensor XML: {}", e)))?;

        let config = Self::build(root)?;
        config.validate()?;

        log::debug!(
            "Parsed sensor configuration {} @ {} m ({} bands)",
            config.sensor,
            config.resolution,
            config.band_count()
        );
        Ok(config)
    }

    /// Read a sensor configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> MosaicResult<SensorConfig> {
        let path = path.as_ref();
        log::info!("Reading sensor configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        Self::from_xml_str(&content)
    }

    fn build(root: SensorConfigRoot) -> MosaicResult<SensorConfig> {
        let band_names = match root.bands {
            Some(list) => list.bands,
            None => return Self::preset(root),
        };

        let band_index = |name: &str| -> MosaicResult<usize> {
            band_names
                .iter()
                .position(|b| b == name.trim())
                .ok_or_else(|| MosaicError::InvalidConfig(format!("Unknown band {} in {}", name, root.sensor)))
        };

        let primary_name = root.primary_band.as_deref().ok_or_else(|| {
            MosaicError::InvalidConfig(format!("{}: primaryBand is required with an explicit band list", root.sensor))
        })?;
        let primary_band = band_index(primary_name)?;

        let statuses = match &root.statuses {
            Some(list) => list
                .statuses
                .iter()
                .map(|s| parse_status(s))
                .collect::<MosaicResult<Vec<_>>>()?,
            None => Status::ALL.to_vec(),
        };

        let (uncertainty_mode, uncertainty_bands) = match &root.uncertainty {
            Some(element) => (
                parse_uncertainty_mode(&element.mode)?,
                element
                    .bands
                    .iter()
                    .map(|b| band_index(b))
                    .collect::<MosaicResult<Vec<_>>>()?,
            ),
            None => (UncertaintyMode::PopulationSigma, (0..band_names.len()).collect()),
        };

        let best_pixel = match &root.best_pixel {
            Some(element) => {
                let brightness = element
                    .brightness_bands
                    .iter()
                    .map(|b| band_index(b))
                    .collect::<MosaicResult<Vec<_>>>()?;
                let mut params = BestPixelParams::with_bands(
                    [0, 0, 0],
                    band_index(&element.green_band)?,
                    band_index(&element.red_band)?,
                    band_index(&element.nir_band)?,
                    band_index(&element.dark_band)?,
                );
                params.brightness_bands = brightness;
                if let Some(v) = element.water_index_threshold {
                    params.water_index_threshold = v;
                }
                if let Some(v) = element.low_brightness {
                    params.low_brightness = v;
                }
                if let Some(v) = element.low_vegetation_index {
                    params.low_vegetation_index = v;
                }
                if let Some(v) = element.low_nir {
                    params.low_nir = v;
                }
                Some(params)
            }
            None => None,
        };

        let threshold = match &root.threshold {
            Some(element) => Some(ThresholdParams {
                variant: parse_threshold_variant(&element.variant)?,
                brightness_band: band_index(&element.brightness_band)?,
                clear_statuses: element
                    .clear_statuses
                    .iter()
                    .map(|s| parse_status(s))
                    .collect::<MosaicResult<Vec<_>>>()?,
            }),
            None => None,
        };

        Ok(SensorConfig {
            sensor: root.sensor.trim().to_string(),
            resolution: root.resolution,
            derived_index_name: root.derived_index.unwrap_or_else(|| "ndvi".to_string()),
            primary_band,
            statuses,
            uncertainty_mode,
            uncertainty_bands,
            best_pixel,
            threshold,
            band_names,
        })
    }

    /// Built-in preset, with the document's optional overrides ignored
    fn preset(root: SensorConfigRoot) -> MosaicResult<SensorConfig> {
        if root.primary_band.is_some() || root.statuses.is_some() || root.uncertainty.is_some() {
            log::warn!(
                "Sensor XML for {} has no band list; using the built-in preset and ignoring its overrides",
                root.sensor
            );
        }
        SensorConfig::for_sensor(root.sensor.trim(), root.resolution)
    }
}

fn parse_status(text: &str) -> MosaicResult<Status> {
    let key = text.trim().to_lowercase().replace(['-', ' '], "_");
    Status::ALL
        .iter()
        .copied()
        .find(|s| s.name() == key)
        .ok_or_else(|| MosaicError::InvalidConfig(format!("Unknown status: {}", text)))
}

fn parse_uncertainty_mode(text: &str) -> MosaicResult<UncertaintyMode> {
    match text.trim().to_lowercase().as_str() {
        "population_sigma" | "sigma" => Ok(UncertaintyMode::PopulationSigma),
        "propagated_error" | "propagated" => Ok(UncertaintyMode::PropagatedError),
        other => Err(MosaicError::InvalidConfig(format!("Unknown uncertainty mode: {}", other))),
    }
}

fn parse_threshold_variant(text: &str) -> MosaicResult<ThresholdVariant> {
    match text.trim().to_lowercase().as_str() {
        "elevated_tail" => Ok(ThresholdVariant::ElevatedTail),
        "one_sided" => Ok(ThresholdVariant::OneSided),
        other => Err(MosaicError::InvalidConfig(format!("Unknown threshold variant: {}", other))),
    }
}
